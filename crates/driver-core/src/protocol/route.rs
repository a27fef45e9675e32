//! Route names, request bodies and the typed actions they parse into.
//!
//! A command request is a route name (the endpoint path) plus a text body:
//!
//! ```text
//! <action>
//! [<coordinate-system tag>]   (element and alert routes only, discarded)
//! <parameter 1>
//! <parameter 2>
//! ...
//! ```
//!
//! Parsing happens in two steps:
//!
//! 1. [`RawRouteAction::parse`] splits the body into `(route, action,
//!    parameters)` and rejects unknown routes.
//! 2. [`RouteAction::from_raw`] resolves the action against the route's fixed
//!    action set and converts the positional parameters into typed values.
//!
//! Both steps fail closed: anything not in the table is an error, and unknown
//! routes ([`CommandError::BadRoute`]) are reported separately from unknown
//! actions ([`CommandError::UnknownAction`]).

use std::fmt;

use crate::domain::capabilities::{DeviceProperty, Orientation, SystemButton};
use crate::domain::geometry::ElementFrame;
use crate::protocol::response::CommandError;
use crate::protocol::script::{parse_script, ScriptInstruction};

// ── Route names ───────────────────────────────────────────────────────────────

/// One named command endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Driver,
    App,
    Element,
    Alert,
    Capture,
    Info,
    Screenshot,
    SysButton,
    PropertySet,
}

impl RouteName {
    pub const ALL: [RouteName; 9] = [
        Self::Driver,
        Self::App,
        Self::Element,
        Self::Alert,
        Self::Capture,
        Self::Info,
        Self::Screenshot,
        Self::SysButton,
        Self::PropertySet,
    ];

    /// The endpoint path segment of this route.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::App => "app",
            Self::Element => "element",
            Self::Alert => "alert",
            Self::Capture => "capture",
            Self::Info => "info",
            Self::Screenshot => "screenshot",
            Self::SysButton => "sysbutton",
            Self::PropertySet => "property-set",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(name))
    }

    /// Element and alert bodies carry a coordinate-system tag line right
    /// after the action.
    fn has_coordinate_tag(self) -> bool {
        matches!(self, Self::Element | Self::Alert)
    }

    /// Every `(route, action)` pair this route accepts.
    pub fn actions(self) -> &'static [&'static str] {
        match self {
            Self::Driver => &["start", "stop", "quit"],
            Self::App => &["start", "stop", "switch", "info", "list"],
            Self::Element => &["tap", "swipe", "input", "script"],
            Self::Alert => &["tap", "input"],
            Self::Capture => &["reload"],
            Self::Info => &["device"],
            Self::Screenshot => &["png", "jpeg"],
            Self::SysButton => &["home", "soundup", "sounddown"],
            Self::PropertySet => &["orientation", "bluetooth", "wifi", "airplane"],
        }
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Raw requests ──────────────────────────────────────────────────────────────

/// The smallest parsed unit of a command request.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRouteAction {
    pub route: RouteName,
    /// Lower-cased action name.
    pub action: String,
    /// Positional parameters, coordinate tag already removed.
    pub parameters: Vec<String>,
}

impl RawRouteAction {
    /// Splits a request body for `route`.
    ///
    /// Lines are separated by `\n`; a trailing `\r` on each line and trailing
    /// empty lines are removed.
    ///
    /// # Errors
    ///
    /// - [`CommandError::BadRoute`] if `route` is not a known route name.
    /// - [`CommandError::MissingParameter`] if the action line (or, for
    ///   element/alert, the coordinate tag line) is absent.
    pub fn parse(route: &str, body: &str) -> Result<Self, CommandError> {
        let route =
            RouteName::from_name(route).ok_or_else(|| CommandError::BadRoute(route.to_string()))?;

        let mut lines: Vec<&str> = body
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .collect();
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        let mut lines = lines.into_iter();
        let action = lines
            .next()
            .map(|a| a.trim().to_ascii_lowercase())
            .filter(|a| !a.is_empty())
            .ok_or(CommandError::MissingParameter("action"))?;

        if route.has_coordinate_tag() && lines.next().is_none() {
            return Err(CommandError::MissingParameter("coordinate system"));
        }

        Ok(Self {
            route,
            action,
            parameters: lines.map(str::to_string).collect(),
        })
    }

    fn unknown_action(&self) -> CommandError {
        CommandError::UnknownAction {
            route: self.route.as_str().to_string(),
            action: self.action.clone(),
        }
    }
}

// ── Typed actions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAction {
    Start,
    Stop,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Start(String),
    Stop(String),
    Switch(String),
    Info(String),
    List,
}

/// A point inside an element: the element frame plus an offset from its origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementTarget {
    pub offset_x: f64,
    pub offset_y: f64,
    pub frame: ElementFrame,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementAction {
    Tap(ElementTarget),
    Swipe {
        target: ElementTarget,
        direction_x: f64,
        direction_y: f64,
    },
    Input(String),
    Script {
        target: ElementTarget,
        instructions: Vec<ScriptInstruction>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertAction {
    Tap(ElementFrame),
    Input(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAction {
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoAction {
    Device,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenshotFormat {
    Png,
    Jpeg,
}

impl ScreenshotFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// A device setting together with its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySetting {
    Orientation(Orientation),
    Bluetooth(bool),
    Wifi(bool),
    Airplane(bool),
}

impl PropertySetting {
    pub fn property(&self) -> DeviceProperty {
        match self {
            Self::Orientation(_) => DeviceProperty::Orientation,
            Self::Bluetooth(_) => DeviceProperty::Bluetooth,
            Self::Wifi(_) => DeviceProperty::Wifi,
            Self::Airplane(_) => DeviceProperty::Airplane,
        }
    }
}

/// A fully parsed command.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteAction {
    Driver(DriverAction),
    App(AppAction),
    Element(ElementAction),
    Alert(AlertAction),
    Capture(CaptureAction),
    Info(InfoAction),
    Screenshot(ScreenshotFormat),
    SysButton(SystemButton),
    PropertySet(PropertySetting),
}

impl RouteAction {
    /// Parses a request body for `route` in one step.
    ///
    /// # Errors
    ///
    /// See [`RawRouteAction::parse`] and [`RouteAction::from_raw`].
    pub fn parse(route: &str, body: &str) -> Result<Self, CommandError> {
        Self::from_raw(RawRouteAction::parse(route, body)?)
    }

    /// Resolves a raw request against the route's action table.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownAction`] for an action the route does not have.
    /// - [`CommandError::MissingParameter`] / [`CommandError::InvalidParameter`]
    ///   for absent or unparsable positional parameters.
    pub fn from_raw(raw: RawRouteAction) -> Result<Self, CommandError> {
        let mut params = Params::new(&raw.parameters);

        let action = match raw.route {
            RouteName::Driver => Self::Driver(match raw.action.as_str() {
                "start" => DriverAction::Start,
                "stop" => DriverAction::Stop,
                "quit" => DriverAction::Quit,
                _ => return Err(raw.unknown_action()),
            }),

            RouteName::App => Self::App(match raw.action.as_str() {
                "start" => AppAction::Start(params.text("bundle id")?),
                "stop" => AppAction::Stop(params.text("bundle id")?),
                "switch" => AppAction::Switch(params.text("bundle id")?),
                "info" => AppAction::Info(params.text("bundle id")?),
                "list" => AppAction::List,
                _ => return Err(raw.unknown_action()),
            }),

            RouteName::Element => Self::Element(match raw.action.as_str() {
                "tap" => ElementAction::Tap(params.element_target()?),
                "swipe" => ElementAction::Swipe {
                    target: params.element_target()?,
                    direction_x: params.number("directionX")?,
                    direction_y: params.number("directionY")?,
                },
                "input" => ElementAction::Input(params.remaining_text("text")?),
                "script" => {
                    let target = params.element_target()?;
                    let instructions = parse_script(params.remaining())
                        .map_err(|e| CommandError::invalid("script", e.to_string()))?;
                    ElementAction::Script {
                        target,
                        instructions,
                    }
                }
                _ => return Err(raw.unknown_action()),
            }),

            RouteName::Alert => Self::Alert(match raw.action.as_str() {
                "tap" => AlertAction::Tap(params.frame("frame")?),
                "input" => AlertAction::Input(params.remaining_text("text")?),
                _ => return Err(raw.unknown_action()),
            }),

            RouteName::Capture => match raw.action.as_str() {
                "reload" => Self::Capture(CaptureAction::Reload),
                _ => return Err(raw.unknown_action()),
            },

            RouteName::Info => match raw.action.as_str() {
                "device" => Self::Info(InfoAction::Device),
                _ => return Err(raw.unknown_action()),
            },

            RouteName::Screenshot => Self::Screenshot(match raw.action.as_str() {
                "png" => ScreenshotFormat::Png,
                "jpeg" => ScreenshotFormat::Jpeg,
                _ => return Err(raw.unknown_action()),
            }),

            RouteName::SysButton => Self::SysButton(
                SystemButton::from_name(&raw.action).ok_or_else(|| raw.unknown_action())?,
            ),

            RouteName::PropertySet => {
                let property =
                    DeviceProperty::from_name(&raw.action).ok_or_else(|| raw.unknown_action())?;
                let value = params.text("value")?;
                Self::PropertySet(parse_setting(property, &value)?)
            }
        };

        Ok(action)
    }

    pub fn route(&self) -> RouteName {
        match self {
            Self::Driver(_) => RouteName::Driver,
            Self::App(_) => RouteName::App,
            Self::Element(_) => RouteName::Element,
            Self::Alert(_) => RouteName::Alert,
            Self::Capture(_) => RouteName::Capture,
            Self::Info(_) => RouteName::Info,
            Self::Screenshot(_) => RouteName::Screenshot,
            Self::SysButton(_) => RouteName::SysButton,
            Self::PropertySet(_) => RouteName::PropertySet,
        }
    }

    /// The action name as it appears on the wire.
    pub fn action_name(&self) -> &'static str {
        match self {
            Self::Driver(DriverAction::Start) => "start",
            Self::Driver(DriverAction::Stop) => "stop",
            Self::Driver(DriverAction::Quit) => "quit",
            Self::App(AppAction::Start(_)) => "start",
            Self::App(AppAction::Stop(_)) => "stop",
            Self::App(AppAction::Switch(_)) => "switch",
            Self::App(AppAction::Info(_)) => "info",
            Self::App(AppAction::List) => "list",
            Self::Element(ElementAction::Tap(_)) => "tap",
            Self::Element(ElementAction::Swipe { .. }) => "swipe",
            Self::Element(ElementAction::Input(_)) => "input",
            Self::Element(ElementAction::Script { .. }) => "script",
            Self::Alert(AlertAction::Tap(_)) => "tap",
            Self::Alert(AlertAction::Input(_)) => "input",
            Self::Capture(CaptureAction::Reload) => "reload",
            Self::Info(InfoAction::Device) => "device",
            Self::Screenshot(format) => format.as_str(),
            Self::SysButton(button) => button.as_str(),
            Self::PropertySet(setting) => setting.property().as_str(),
        }
    }

    /// Whether the session token must be checked before running this action.
    ///
    /// `driver start` binds a new session; `driver stop` and `driver quit`
    /// unbind unconditionally.
    pub fn requires_session(&self) -> bool {
        !matches!(self, Self::Driver(_))
    }

    /// Whether this action needs the application to be in the foreground.
    pub fn needs_foreground(&self) -> bool {
        matches!(self, Self::Element(_) | Self::Alert(_) | Self::Capture(_))
    }
}

fn parse_setting(property: DeviceProperty, value: &str) -> Result<PropertySetting, CommandError> {
    let toggle = || parse_toggle(value).ok_or_else(|| CommandError::invalid("value", format!("'{value}' is not on/off")));

    Ok(match property {
        DeviceProperty::Orientation => PropertySetting::Orientation(
            Orientation::from_name(value.trim()).ok_or_else(|| {
                CommandError::invalid("value", format!("unknown orientation '{value}'"))
            })?,
        ),
        DeviceProperty::Bluetooth => PropertySetting::Bluetooth(toggle()?),
        DeviceProperty::Wifi => PropertySetting::Wifi(toggle()?),
        DeviceProperty::Airplane => PropertySetting::Airplane(toggle()?),
    })
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

// ── Positional parameter cursor ───────────────────────────────────────────────

struct Params<'a> {
    items: &'a [String],
    next: usize,
}

impl<'a> Params<'a> {
    fn new(items: &'a [String]) -> Self {
        Self { items, next: 0 }
    }

    fn take(&mut self, name: &'static str) -> Result<&'a str, CommandError> {
        let item = self
            .items
            .get(self.next)
            .ok_or(CommandError::MissingParameter(name))?;
        self.next += 1;
        Ok(item.as_str())
    }

    /// A non-empty, trimmed single-line value.
    fn text(&mut self, name: &'static str) -> Result<String, CommandError> {
        let value = self.take(name)?.trim();
        if value.is_empty() {
            return Err(CommandError::MissingParameter(name));
        }
        Ok(value.to_string())
    }

    fn number(&mut self, name: &'static str) -> Result<f64, CommandError> {
        let raw = self.take(name)?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CommandError::invalid(name, format!("'{raw}' is not a number")))
    }

    fn frame(&mut self, name: &'static str) -> Result<ElementFrame, CommandError> {
        self.take(name)?
            .parse::<ElementFrame>()
            .map_err(|e| CommandError::invalid(name, e.to_string()))
    }

    fn element_target(&mut self) -> Result<ElementTarget, CommandError> {
        Ok(ElementTarget {
            offset_x: self.number("offsetX")?,
            offset_y: self.number("offsetY")?,
            frame: self.frame("frame")?,
        })
    }

    fn remaining(&mut self) -> &'a [String] {
        let rest = &self.items[self.next.min(self.items.len())..];
        self.next = self.items.len();
        rest
    }

    /// All remaining lines joined by `\n`; must not be empty.
    fn remaining_text(&mut self, name: &'static str) -> Result<String, CommandError> {
        let text = self.remaining().join("\n");
        if text.is_empty() {
            return Err(CommandError::MissingParameter(name));
        }
        Ok(text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
