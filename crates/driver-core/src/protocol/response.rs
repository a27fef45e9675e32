//! Uniform command responses and the command error taxonomy.
//!
//! Every command, whatever its route, answers with the same flat JSON shape:
//!
//! ```json
//! { "status": "0", "message": "tap done", "x": 30.0, "y": 22.5 }
//! ```
//!
//! `status` is `"0"` on success and a negative numeric string for each
//! distinct failure kind (see [`CommandError::status`]).  Route-specific
//! fields are flattened next to `status` and `message`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Status string of a successful response.
pub const STATUS_OK: &str = "0";

/// Every failure a command can produce before or while it runs.
///
/// All of these are converted to a [`CommandResponse`] at the router
/// boundary; none of them tear the transport connection down.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommandError {
    /// The route name is not in the route table.
    #[error("unknown route '{0}'")]
    BadRoute(String),

    /// The route exists but does not know this action.
    #[error("unknown action '{action}' for route '{route}'")]
    UnknownAction { route: String, action: String },

    /// A required positional parameter is absent.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    /// A parameter is present but cannot be parsed.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The presented session token does not match the bound session.
    #[error("device already in use by {owner}")]
    Unauthorized { owner: String },

    /// The automation collaborator reported a failure.
    #[error("automation call failed: {0}")]
    AutomationCallFailed(String),

    /// The automation worker did not answer in time.
    #[error("automation target did not answer within {0:?}")]
    AutomationTimeout(Duration),

    /// The automation worker thread is gone.
    #[error("automation worker is not running")]
    ExecutorUnavailable,

    /// The screen capture collaborator returned no frame.
    #[error("screen capture returned no frame")]
    CaptureFailed,
}

impl CommandError {
    /// The wire status code of this failure kind.
    pub fn status(&self) -> &'static str {
        match self {
            Self::BadRoute(_) => "-10",
            Self::UnknownAction { .. } => "-11",
            Self::MissingParameter(_) => "-12",
            Self::InvalidParameter { .. } => "-13",
            Self::Unauthorized { .. } => "-20",
            Self::AutomationCallFailed(_) => "-30",
            Self::AutomationTimeout(_) => "-31",
            Self::ExecutorUnavailable => "-32",
            Self::CaptureFailed => "-40",
        }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// The reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: String,
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CommandResponse {
    /// A success response with `message`.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Adds one route-specific field.
    ///
    /// `status` and `message` cannot be overwritten through this method.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if key != "status" && key != "message" {
            let value = serde_json::to_value(value).unwrap_or(Value::Null);
            self.fields.insert(key.to_string(), value);
        }
        self
    }

    /// Adds every entry of `fields`.
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        for (key, value) in fields {
            if key != "status" && key != "message" {
                self.fields.insert(key, value);
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl From<CommandError> for CommandResponse {
    fn from(err: CommandError) -> Self {
        let response = Self {
            status: err.status().to_string(),
            message: err.to_string(),
            fields: Map::new(),
        };
        match err {
            CommandError::Unauthorized { owner } => response.with("owner", owner),
            _ => response,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
