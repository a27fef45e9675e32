//! CommandRouter: turns one command request into one response.
//!
//! The router owns everything a command can touch: the session state, the
//! automation target and the screen source.  It is not `Sync` and is never
//! shared; the executor moves it onto the automation thread, so every
//! `dispatch` runs strictly after the previous one returned.
//!
//! # Dispatch order
//!
//! 1. Parse the route name and body into a typed action.  Unknown routes and
//!    unknown actions are reported separately.
//! 2. Check the session token, except for `driver start|stop|quit`.
//! 3. For `element`, `alert` and `capture`: if the active application is not
//!    in the foreground, answer success with an informational message and do
//!    nothing else.
//! 4. Run the action against the automation target and wrap the outcome.
//!
//! Every failure becomes a [`CommandResponse`] with a negative status; nothing
//! here can bring the transport down.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use driver_core::{
    protocol::route::{
        AlertAction, AppAction, CaptureAction, DriverAction, ElementAction, ElementTarget,
        InfoAction, ScreenshotFormat,
    },
    protocol::script::ScriptInstruction,
    CommandError, CommandResponse, DeviceCapabilities, RouteAction, SessionError, SessionManager,
    Vector,
};
use tracing::{debug, info, warn};

use crate::infrastructure::automation::{AutomationTarget, TargetState};
use crate::infrastructure::network::stream_server::StreamControl;
use crate::infrastructure::screen_capture::{FrameEncoder, ImageKind, ScreenCapture};

/// Message of the soft no-op answered while the application is not in front.
pub const NOT_FOREGROUND_MESSAGE: &str = "application is not running in foreground";

/// One command as received from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Route name, i.e. the endpoint path without the leading `/`.
    pub route: String,
    pub body: String,
    /// Session token presented with the request, if any.
    pub token: Option<String>,
    /// Who is asking; recorded as the owner by `driver start`.
    pub client_identity: String,
}

impl CommandRequest {
    pub fn new(route: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            body: body.into(),
            token: None,
            client_identity: "unknown".to_string(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.client_identity = identity.into();
        self
    }
}

/// Routes commands to the automation target.
pub struct CommandRouter {
    sessions: SessionManager,
    capabilities: Arc<DeviceCapabilities>,
    target: Box<dyn AutomationTarget>,
    screen: Arc<dyn ScreenCapture>,
    encoder: FrameEncoder,
    applications: Vec<String>,
    stream: StreamControl,
}

impl CommandRouter {
    pub fn new(
        capabilities: Arc<DeviceCapabilities>,
        target: Box<dyn AutomationTarget>,
        screen: Arc<dyn ScreenCapture>,
        encoder: FrameEncoder,
        applications: Vec<String>,
        stream: StreamControl,
    ) -> Self {
        Self {
            sessions: SessionManager::new(),
            capabilities,
            target,
            screen,
            encoder,
            applications,
            stream,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Executes one command and always produces a response.
    pub fn dispatch(&mut self, request: &CommandRequest) -> CommandResponse {
        match self.try_dispatch(request) {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    CommandError::AutomationCallFailed(_) | CommandError::CaptureFailed => {
                        warn!("/{} failed: {err}", request.route);
                    }
                    CommandError::Unauthorized { .. } => info!("/{} rejected: {err}", request.route),
                    _ => debug!("/{} rejected: {err}", request.route),
                }
                err.into()
            }
        }
    }

    fn try_dispatch(&mut self, request: &CommandRequest) -> Result<CommandResponse, CommandError> {
        let action = RouteAction::parse(&request.route, &request.body)?;
        debug!("dispatch {} {}", action.route(), action.action_name());

        if action.requires_session() {
            self.sessions
                .authorize(request.token.as_deref())
                .map_err(|SessionError::DeviceInUse { owner }| CommandError::Unauthorized { owner })?;
        }

        if action.needs_foreground() && self.target.state() != TargetState::RunningForeground {
            debug!(
                "{} {} skipped: {NOT_FOREGROUND_MESSAGE}",
                action.route(),
                action.action_name()
            );
            return Ok(CommandResponse::ok(NOT_FOREGROUND_MESSAGE));
        }

        match action {
            RouteAction::Driver(action) => Ok(self.driver(action, request)),
            RouteAction::App(action) => self.app(action),
            RouteAction::Element(action) => self.element(action),
            RouteAction::Alert(action) => self.alert(action),
            RouteAction::Capture(CaptureAction::Reload) => {
                let root = self.target.element_tree()?;
                Ok(CommandResponse::ok("element tree captured").with("root", root))
            }
            RouteAction::Info(InfoAction::Device) => {
                Ok(CommandResponse::ok("device info").with_fields(self.capabilities.to_fields()))
            }
            RouteAction::Screenshot(format) => self.screenshot(format),
            RouteAction::SysButton(button) => {
                self.target.press_button(button)?;
                Ok(CommandResponse::ok(format!("{} pressed", button.as_str())))
            }
            RouteAction::PropertySet(setting) => {
                self.target.set_property(setting)?;
                Ok(CommandResponse::ok(format!("{} set", setting.property().as_str())))
            }
        }
    }

    // ── driver ────────────────────────────────────────────────────────────────

    fn driver(&mut self, action: DriverAction, request: &CommandRequest) -> CommandResponse {
        match action {
            DriverAction::Start => {
                let token = self
                    .sessions
                    .start(request.client_identity.as_str())
                    .token()
                    .to_string();
                CommandResponse::ok("session started")
                    .with("token", token)
                    .with_fields(self.capabilities.to_fields())
            }
            DriverAction::Stop | DriverAction::Quit => {
                self.sessions.stop();
                self.stream.reset_peer();
                self.terminate_active_app();
                CommandResponse::ok(if action == DriverAction::Quit {
                    "driver quit"
                } else {
                    "session stopped"
                })
            }
        }
    }

    /// Terminates the active application if it is running.  Failures are
    /// logged; stopping a session never fails.
    fn terminate_active_app(&mut self) {
        if self.target.state() == TargetState::NotRunning {
            return;
        }
        if let Some(app) = self.target.active_app() {
            match self.target.terminate_app(&app) {
                Ok(()) => info!("terminated '{app}' on session stop"),
                Err(e) => warn!("failed to terminate '{app}' on session stop: {e}"),
            }
        }
    }

    // ── app ───────────────────────────────────────────────────────────────────

    fn app(&mut self, action: AppAction) -> Result<CommandResponse, CommandError> {
        Ok(match action {
            AppAction::Start(id) => {
                let app = self.target.launch_app(&id)?;
                CommandResponse::ok("application started").with("app", app)
            }
            AppAction::Stop(id) => {
                self.target.terminate_app(&id)?;
                CommandResponse::ok("application stopped")
            }
            AppAction::Switch(id) => {
                let app = self.target.activate_app(&id)?;
                CommandResponse::ok("application activated").with("app", app)
            }
            AppAction::Info(id) => {
                let app = self.target.app_info(&id)?;
                CommandResponse::ok("application info").with("app", app)
            }
            AppAction::List => {
                CommandResponse::ok("installable applications").with("applications", &self.applications)
            }
        })
    }

    // ── element / alert ───────────────────────────────────────────────────────

    fn raw_vector(&self, target: &ElementTarget) -> Vector {
        self.capabilities
            .mapper()
            .raw(target.offset_x, target.offset_y, &target.frame)
    }

    fn element(&mut self, action: ElementAction) -> Result<CommandResponse, CommandError> {
        Ok(match action {
            ElementAction::Tap(target) => {
                let at = self.raw_vector(&target);
                self.target.tap(at, 1)?;
                CommandResponse::ok("tap done").with("x", at.x).with("y", at.y)
            }
            ElementAction::Swipe {
                target,
                direction_x,
                direction_y,
            } => {
                let press = self.raw_vector(&target);
                let (from, to) = self.capabilities.mapper().swipe(press, direction_x, direction_y);
                self.target.swipe(from, to)?;
                CommandResponse::ok("swipe done").with("x", press.x).with("y", press.y)
            }
            ElementAction::Input(text) => {
                self.target.type_text(&text)?;
                CommandResponse::ok("text entered")
            }
            ElementAction::Script {
                target,
                instructions,
            } => {
                let origin = self.raw_vector(&target);
                let executed = self.run_script(origin, &instructions)?;
                CommandResponse::ok("script done").with("executed", executed)
            }
        })
    }

    /// Runs `instructions` in order at `origin`, stopping at the first failure.
    fn run_script(
        &mut self,
        origin: Vector,
        instructions: &[ScriptInstruction],
    ) -> Result<usize, CommandError> {
        let mapper = self.capabilities.mapper();
        for (i, instruction) in instructions.iter().enumerate() {
            let outcome = match *instruction {
                ScriptInstruction::Tap { count } => self.target.tap(origin, count),
                ScriptInstruction::LongPress { duration } => self.target.long_press(origin, duration),
                ScriptInstruction::Swipe { dx, dy } => {
                    let (from, to) = mapper.swipe(origin, dx, dy);
                    self.target.swipe(from, to)
                }
            };
            outcome.map_err(|e| {
                CommandError::AutomationCallFailed(format!(
                    "script stopped at instruction {} ({}): {e}",
                    i + 1,
                    instruction.name()
                ))
            })?;
        }
        Ok(instructions.len())
    }

    fn alert(&mut self, action: AlertAction) -> Result<CommandResponse, CommandError> {
        Ok(match action {
            AlertAction::Tap(frame) => {
                let at = self.capabilities.mapper().centered(0.0, 0.0, &frame);
                self.target.tap(at, 1)?;
                CommandResponse::ok("alert tapped").with("x", at.x).with("y", at.y)
            }
            AlertAction::Input(text) => {
                self.target.type_text(&text)?;
                CommandResponse::ok("alert text entered")
            }
        })
    }

    // ── screenshot ────────────────────────────────────────────────────────────

    fn screenshot(&self, format: ScreenshotFormat) -> Result<CommandResponse, CommandError> {
        let frame = self.screen.capture().ok_or(CommandError::CaptureFailed)?;
        let kind = match format {
            ScreenshotFormat::Png => ImageKind::Png,
            ScreenshotFormat::Jpeg => ImageKind::Jpeg,
        };
        let bytes = self.encoder.encode_native(&frame, kind).map_err(|e| {
            warn!("screenshot encoding failed: {e}");
            CommandError::CaptureFailed
        })?;

        Ok(CommandResponse::ok("screenshot taken")
            .with("format", format.as_str())
            .with("width", frame.width)
            .with("height", frame.height)
            .with("data", STANDARD.encode(bytes)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::automation::{AutomationError, MockAutomationTarget};
    use crate::infrastructure::screen_capture::{MockScreenCapture, RawFrame};
    use driver_core::{DeviceInfo, SystemButton};
    use std::time::Duration;

    fn capabilities() -> Arc<DeviceCapabilities> {
        let info = DeviceInfo {
            name: "Test Phone".to_string(),
            model: "test".to_string(),
            os_name: "TestOS".to_string(),
            os_version: "1".to_string(),
            native_width: 200,
            native_height: 400,
            scale: 2.0,
        };
        Arc::new(DeviceCapabilities::compute(&info, 47000).expect("caps"))
    }

    fn router_with(target: MockAutomationTarget, screen: MockScreenCapture) -> CommandRouter {
        CommandRouter::new(
            capabilities(),
            Box::new(target),
            Arc::new(screen),
            FrameEncoder::new(60, 100, 200),
            vec!["com.example.app".to_string()],
            StreamControl::new(),
        )
    }

    fn foreground_target() -> MockAutomationTarget {
        let mut target = MockAutomationTarget::new();
        target
            .expect_state()
            .returning(|| TargetState::RunningForeground);
        target
    }

    #[test]
    fn test_element_tap_sends_raw_vector() {
        // Arrange
        let mut target = foreground_target();
        target
            .expect_tap()
            .withf(|at, count| *at == Vector::new(7.0, 13.0) && *count == 1)
            .times(1)
            .returning(|_, _| Ok(()));
        let mut router = router_with(target, MockScreenCapture::new());

        // Act
        let response =
            router.dispatch(&CommandRequest::new("element", "tap\npixel\n4\n6\n10;20;100;50"));

        // Assert
        assert!(response.is_success(), "{response:?}");
        assert_eq!(response.field("x"), Some(&serde_json::json!(7.0)));
        assert_eq!(response.field("y"), Some(&serde_json::json!(13.0)));
    }

    #[test]
    fn test_alert_tap_sends_centered_vector() {
        let mut target = foreground_target();
        target
            .expect_tap()
            .withf(|at, _| *at == Vector::new(30.0, 22.5))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut router = router_with(target, MockScreenCapture::new());

        let response = router.dispatch(&CommandRequest::new("alert", "tap\npixel\n10;20;100;50"));

        assert!(response.is_success(), "{response:?}");
    }

    #[test]
    fn test_swipe_release_is_press_plus_unscaled_direction() {
        let mut target = foreground_target();
        target
            .expect_swipe()
            .withf(|from, to| *from == Vector::new(5.0, 10.0) && *to == Vector::new(5.0, -90.0))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut router = router_with(target, MockScreenCapture::new());

        let response = router.dispatch(&CommandRequest::new(
            "element",
            "swipe\npixel\n0\n0\n10;20;4;4\n0\n-100",
        ));

        assert!(response.is_success(), "{response:?}");
    }

    #[test]
    fn test_background_target_is_soft_no_op() {
        // Arrange: no tap expectation, so any tap call would panic
        let mut target = MockAutomationTarget::new();
        target
            .expect_state()
            .returning(|| TargetState::RunningBackground);
        let mut router = router_with(target, MockScreenCapture::new());

        // Act
        let response =
            router.dispatch(&CommandRequest::new("element", "tap\npixel\n0\n0\n0;0;1;1"));

        // Assert
        assert_eq!(response, CommandResponse::ok(NOT_FOREGROUND_MESSAGE));
    }

    #[test]
    fn test_device_routes_ignore_foreground_state() {
        let mut target = MockAutomationTarget::new();
        target.expect_state().returning(|| TargetState::NotRunning);
        target
            .expect_press_button()
            .withf(|b| *b == SystemButton::Home)
            .times(1)
            .returning(|_| Ok(()));
        let mut router = router_with(target, MockScreenCapture::new());

        let response = router.dispatch(&CommandRequest::new("sysbutton", "home"));

        assert!(response.is_success());
        assert_eq!(response.message, "home pressed");
    }

    #[test]
    fn test_automation_failure_is_reported() {
        let mut target = foreground_target();
        target
            .expect_type_text()
            .returning(|_| Err(AutomationError::Framework("keyboard gone".to_string())));
        let mut router = router_with(target, MockScreenCapture::new());

        let response = router.dispatch(&CommandRequest::new("element", "input\npixel\nhello"));

        assert_eq!(response.status, "-30");
        assert!(response.message.contains("keyboard gone"));
    }

    #[test]
    fn test_script_runs_in_order_and_reports_count() {
        // Arrange
        let mut target = foreground_target();
        let mut seq = mockall::Sequence::new();
        target
            .expect_tap()
            .withf(|_, count| *count == 2)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        target
            .expect_long_press()
            .withf(|_, d| *d == Duration::from_millis(500))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let mut router = router_with(target, MockScreenCapture::new());

        // Act
        let response = router.dispatch(&CommandRequest::new(
            "element",
            "script\npixel\n0\n0\n0;0;2;2\ntap(2)\nlongpress(0.5)",
        ));

        // Assert
        assert!(response.is_success(), "{response:?}");
        assert_eq!(response.field("executed"), Some(&serde_json::json!(2)));
    }

    #[test]
    fn test_script_stops_at_first_failure() {
        let mut target = foreground_target();
        target
            .expect_tap()
            .times(1)
            .returning(|_, _| Err(AutomationError::Framework("stuck".to_string())));
        let mut router = router_with(target, MockScreenCapture::new());

        let response = router.dispatch(&CommandRequest::new(
            "element",
            "script\npixel\n0\n0\n0;0;2;2\ntap\nswipe(1,1)",
        ));

        assert_eq!(response.status, "-30");
        assert!(response.message.contains("instruction 1"));
    }

    #[test]
    fn test_screenshot_without_frame_is_capture_failed() {
        let mut screen = MockScreenCapture::new();
        screen.expect_capture().returning(|| None);
        let mut router = router_with(MockAutomationTarget::new(), screen);

        let response = router.dispatch(&CommandRequest::new("screenshot", "png"));

        assert_eq!(response.status, "-40");
    }

    #[test]
    fn test_screenshot_returns_base64_image() {
        let mut screen = MockScreenCapture::new();
        screen.expect_capture().returning(|| {
            Some(RawFrame {
                width: 2,
                height: 2,
                rgba: vec![255; 16],
            })
        });
        let mut router = router_with(MockAutomationTarget::new(), screen);

        let response = router.dispatch(&CommandRequest::new("screenshot", "jpeg"));

        assert!(response.is_success(), "{response:?}");
        assert_eq!(response.field("format"), Some(&serde_json::json!("jpeg")));
        let data = response.field("data").and_then(|v| v.as_str()).expect("data");
        let bytes = STANDARD.decode(data).expect("base64");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_stop_terminates_running_app_without_token() {
        // Arrange
        let mut target = foreground_target();
        target
            .expect_active_app()
            .returning(|| Some("com.example.app".to_string()));
        target
            .expect_terminate_app()
            .withf(|id: &str| id == "com.example.app")
            .times(1)
            .returning(|_| Ok(()));
        let mut router = router_with(target, MockScreenCapture::new());
        router.dispatch(&CommandRequest::new("driver", "start").with_identity("client-a"));

        // Act
        let response = router.dispatch(&CommandRequest::new("driver", "stop"));

        // Assert
        assert!(response.is_success());
        assert!(!router.sessions().is_bound());
    }

    #[test]
    fn test_wrong_token_is_unauthorized_with_owner() {
        let mut router = router_with(MockAutomationTarget::new(), MockScreenCapture::new());
        router.dispatch(&CommandRequest::new("driver", "start").with_identity("client-a"));

        let response = router.dispatch(&CommandRequest::new("info", "device").with_token("nope"));

        assert_eq!(response.status, "-20");
        assert_eq!(response.field("owner"), Some(&serde_json::json!("client-a")));
    }
}
