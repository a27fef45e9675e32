//! In-memory automation target.
//!
//! `SimulatedDevice` keeps a small model of installed applications and their
//! run state, and records the most recent [`CALL_LOG_CAPACITY`] input
//! operations in order.  It backs the
//! headless binary and the tests, where a [`DeviceHandle`] clone is used to
//! inspect recorded calls or inject failures after the device itself has been
//! moved onto the automation thread.
//!
//! # Usage in tests
//!
//! ```ignore
//! let device = SimulatedDevice::new(SimulatedDevice::default_info(), &["com.example.app"]);
//! let handle = device.handle();
//! let (_executor, executor) = AutomationExecutor::spawn(router_with(device), None)?;
//!
//! // ... send commands ...
//!
//! assert_eq!(handle.calls().len(), 1);
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use driver_core::{protocol::route::PropertySetting, DeviceInfo, Orientation, SystemButton, Vector};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::{AppInfo, AutomationError, AutomationTarget, TargetState};

/// Recorded operations kept per device; older ones are dropped first.
pub const CALL_LOG_CAPACITY: usize = 1024;

/// One recorded automation operation.
#[derive(Debug, Clone, PartialEq)]
pub enum AutomationCall {
    Launch(String),
    Terminate(String),
    Activate(String),
    Tap { at: Vector, count: u32 },
    LongPress { at: Vector, duration: Duration },
    Swipe { from: Vector, to: Vector },
    TypeText(String),
    PressButton(SystemButton),
    SetProperty(PropertySetting),
}

#[derive(Debug, Clone)]
struct AppRecord {
    label: String,
    version: String,
    state: TargetState,
}

#[derive(Debug)]
struct DeviceState {
    apps: BTreeMap<String, AppRecord>,
    active: Option<String>,
    orientation: Orientation,
    toggles: BTreeMap<&'static str, bool>,
    calls: VecDeque<AutomationCall>,
    failing: bool,
}

/// Shared view of a [`SimulatedDevice`] for inspection from other threads.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceHandle {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The retained recorded operations, oldest first.
    pub fn calls(&self) -> Vec<AutomationCall> {
        self.lock().calls.iter().cloned().collect()
    }

    /// When `true`, every input operation fails with
    /// [`AutomationError::Framework`].
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Moves the active application to the background, as if the user had
    /// switched away from it.
    pub fn send_active_to_background(&self) {
        let mut state = self.lock();
        if let Some(id) = state.active.clone() {
            if let Some(app) = state.apps.get_mut(&id) {
                app.state = TargetState::RunningBackground;
            }
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.lock().orientation
    }

    pub fn toggle(&self, name: &str) -> Option<bool> {
        self.lock().toggles.get(name).copied()
    }
}

/// An automation target that only exists in memory.
#[derive(Debug)]
pub struct SimulatedDevice {
    info: DeviceInfo,
    handle: DeviceHandle,
}

impl SimulatedDevice {
    /// Creates a device with `installed` applications, none of them running.
    pub fn new<S: AsRef<str>>(info: DeviceInfo, installed: &[S]) -> Self {
        let apps = installed
            .iter()
            .map(|id| {
                let id = id.as_ref().to_string();
                let label = id.rsplit('.').next().unwrap_or(&id).to_string();
                let record = AppRecord {
                    label,
                    version: "1.0".to_string(),
                    state: TargetState::NotRunning,
                };
                (id, record)
            })
            .collect();

        let state = DeviceState {
            apps,
            active: None,
            orientation: Orientation::Portrait,
            toggles: BTreeMap::from([("bluetooth", true), ("wifi", true), ("airplane", false)]),
            calls: VecDeque::with_capacity(CALL_LOG_CAPACITY),
            failing: false,
        };

        Self {
            info,
            handle: DeviceHandle {
                state: Arc::new(Mutex::new(state)),
            },
        }
    }

    /// A phone-sized device: 1170x2532 pixels at scale 3.
    pub fn default_info() -> DeviceInfo {
        DeviceInfo {
            name: "Simulated Phone".to_string(),
            model: "simulator".to_string(),
            os_name: "SimOS".to_string(),
            os_version: "1.0".to_string(),
            native_width: 1170,
            native_height: 2532,
            scale: 3.0,
        }
    }

    pub fn handle(&self) -> DeviceHandle {
        self.handle.clone()
    }

    /// Records `call`, or fails if the device is set to fail.
    fn record(&self, call: AutomationCall) -> Result<(), AutomationError> {
        let mut state = self.handle.lock();
        if state.failing {
            return Err(AutomationError::Framework("simulated failure".to_string()));
        }
        debug!("simulated automation call: {call:?}");
        if state.calls.len() == CALL_LOG_CAPACITY {
            state.calls.pop_front();
        }
        state.calls.push_back(call);
        Ok(())
    }

    fn info_for(state: &DeviceState, bundle_id: &str) -> Result<AppInfo, AutomationError> {
        let app = state
            .apps
            .get(bundle_id)
            .ok_or_else(|| AutomationError::UnknownApplication(bundle_id.to_string()))?;
        Ok(AppInfo {
            id: bundle_id.to_string(),
            label: app.label.clone(),
            version: app.version.clone(),
            state: app.state,
        })
    }

    /// Puts `bundle_id` in the foreground and every other running app in the
    /// background.
    fn bring_to_front(state: &mut DeviceState, bundle_id: &str) -> Result<(), AutomationError> {
        if !state.apps.contains_key(bundle_id) {
            return Err(AutomationError::UnknownApplication(bundle_id.to_string()));
        }
        for (id, app) in state.apps.iter_mut() {
            if id == bundle_id {
                app.state = TargetState::RunningForeground;
            } else if app.state == TargetState::RunningForeground {
                app.state = TargetState::RunningBackground;
            }
        }
        state.active = Some(bundle_id.to_string());
        Ok(())
    }
}

impl AutomationTarget for SimulatedDevice {
    fn device_info(&self) -> Result<DeviceInfo, AutomationError> {
        Ok(self.info.clone())
    }

    fn state(&self) -> TargetState {
        let state = self.handle.lock();
        state
            .active
            .as_ref()
            .and_then(|id| state.apps.get(id))
            .map_or(TargetState::NotRunning, |app| app.state)
    }

    fn active_app(&self) -> Option<String> {
        self.handle.lock().active.clone()
    }

    fn launch_app(&mut self, bundle_id: &str) -> Result<AppInfo, AutomationError> {
        self.record(AutomationCall::Launch(bundle_id.to_string()))?;
        let mut state = self.handle.lock();
        Self::bring_to_front(&mut state, bundle_id)?;
        Self::info_for(&state, bundle_id)
    }

    fn terminate_app(&mut self, bundle_id: &str) -> Result<(), AutomationError> {
        self.record(AutomationCall::Terminate(bundle_id.to_string()))?;
        let mut state = self.handle.lock();
        let app = state
            .apps
            .get_mut(bundle_id)
            .ok_or_else(|| AutomationError::UnknownApplication(bundle_id.to_string()))?;
        app.state = TargetState::NotRunning;
        if state.active.as_deref() == Some(bundle_id) {
            state.active = None;
        }
        Ok(())
    }

    fn activate_app(&mut self, bundle_id: &str) -> Result<AppInfo, AutomationError> {
        self.record(AutomationCall::Activate(bundle_id.to_string()))?;
        let mut state = self.handle.lock();
        Self::bring_to_front(&mut state, bundle_id)?;
        Self::info_for(&state, bundle_id)
    }

    fn app_info(&self, bundle_id: &str) -> Result<AppInfo, AutomationError> {
        Self::info_for(&self.handle.lock(), bundle_id)
    }

    fn tap(&mut self, at: Vector, count: u32) -> Result<(), AutomationError> {
        self.record(AutomationCall::Tap { at, count })
    }

    fn long_press(&mut self, at: Vector, duration: Duration) -> Result<(), AutomationError> {
        self.record(AutomationCall::LongPress { at, duration })
    }

    fn swipe(&mut self, from: Vector, to: Vector) -> Result<(), AutomationError> {
        self.record(AutomationCall::Swipe { from, to })
    }

    fn type_text(&mut self, text: &str) -> Result<(), AutomationError> {
        self.record(AutomationCall::TypeText(text.to_string()))
    }

    fn element_tree(&self) -> Result<serde_json::Value, AutomationError> {
        let state = self.handle.lock();
        let id = state.active.clone().ok_or(AutomationError::NoActiveApplication)?;
        let app = Self::info_for(&state, &id)?;
        let width = f64::from(self.info.native_width) / self.info.scale;
        let height = f64::from(self.info.native_height) / self.info.scale;

        Ok(json!({
            "type": "application",
            "identifier": app.id,
            "label": app.label,
            "frame": { "x": 0.0, "y": 0.0, "width": width, "height": height },
            "children": [{
                "type": "window",
                "identifier": Uuid::new_v4().to_string(),
                "frame": { "x": 0.0, "y": 0.0, "width": width, "height": height },
                "children": []
            }]
        }))
    }

    fn press_button(&mut self, button: SystemButton) -> Result<(), AutomationError> {
        self.record(AutomationCall::PressButton(button))?;
        if button == SystemButton::Home {
            self.handle.send_active_to_background();
        }
        Ok(())
    }

    fn set_property(&mut self, setting: PropertySetting) -> Result<(), AutomationError> {
        self.record(AutomationCall::SetProperty(setting))?;
        let mut state = self.handle.lock();
        match setting {
            PropertySetting::Orientation(o) => state.orientation = o,
            PropertySetting::Bluetooth(on) => {
                state.toggles.insert("bluetooth", on);
            }
            PropertySetting::Wifi(on) => {
                state.toggles.insert("wifi", on);
            }
            PropertySetting::Airplane(on) => {
                state.toggles.insert("airplane", on);
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
