//! The automation collaborator: whatever actually drives the device.
//!
//! The command router only ever talks to an [`AutomationTarget`].  Real
//! platform bindings live behind this trait; [`simulated::SimulatedDevice`]
//! is an in-memory implementation used by the headless binary and the tests.
//!
//! Implementations are **not** required to be reentrant.  The executor owns
//! the single instance on one thread and calls it strictly one request at a
//! time, which is why the mutating methods take `&mut self` and the trait only
//! requires `Send`.

pub mod simulated;

use std::time::Duration;

use driver_core::{protocol::route::PropertySetting, CommandError, DeviceInfo, SystemButton, Vector};
use serde::Serialize;
use thiserror::Error;

/// Error type for automation calls.
#[derive(Debug, Error, PartialEq)]
pub enum AutomationError {
    /// The application identifier is not installed on the device.
    #[error("application '{0}' is not installed")]
    UnknownApplication(String),

    /// The operation needs a running application and there is none.
    #[error("no application is running")]
    NoActiveApplication,

    /// The underlying framework reported a failure.
    #[error("automation framework error: {0}")]
    Framework(String),
}

impl From<AutomationError> for CommandError {
    fn from(err: AutomationError) -> Self {
        CommandError::AutomationCallFailed(err.to_string())
    }
}

/// Run state of the active application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetState {
    NotRunning,
    RunningBackground,
    RunningForeground,
}

/// What the automation target reports about one application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppInfo {
    pub id: String,
    pub label: String,
    pub version: String,
    pub state: TargetState,
}

/// Device automation operations.
///
/// Coordinates are device points (see [`driver_core::CoordinateMapper`]).
#[cfg_attr(test, mockall::automock)]
pub trait AutomationTarget: Send {
    /// Static device description, read once at startup.
    fn device_info(&self) -> Result<DeviceInfo, AutomationError>;

    /// State of the active application; `NotRunning` when there is none.
    fn state(&self) -> TargetState;

    /// Identifier of the application commands currently act on.
    fn active_app(&self) -> Option<String>;

    /// Launches (or relaunches) an application and makes it active.
    fn launch_app(&mut self, bundle_id: &str) -> Result<AppInfo, AutomationError>;

    fn terminate_app(&mut self, bundle_id: &str) -> Result<(), AutomationError>;

    /// Brings an already running application to the foreground and makes it
    /// active.
    fn activate_app(&mut self, bundle_id: &str) -> Result<AppInfo, AutomationError>;

    fn app_info(&self, bundle_id: &str) -> Result<AppInfo, AutomationError>;

    /// Taps `count` times at `at`.
    fn tap(&mut self, at: Vector, count: u32) -> Result<(), AutomationError>;

    fn long_press(&mut self, at: Vector, duration: Duration) -> Result<(), AutomationError>;

    /// Drags from `from` to `to`.
    fn swipe(&mut self, from: Vector, to: Vector) -> Result<(), AutomationError>;

    /// Types into the focused element.
    fn type_text(&mut self, text: &str) -> Result<(), AutomationError>;

    /// The active application's element hierarchy as a JSON document.
    fn element_tree(&self) -> Result<serde_json::Value, AutomationError>;

    fn press_button(&mut self, button: SystemButton) -> Result<(), AutomationError>;

    fn set_property(&mut self, setting: PropertySetting) -> Result<(), AutomationError>;
}
