//! Exclusive-control session state.
//!
//! At most one [`Session`] is bound at any time.  Every command except
//! `driver start` must present the bound session's token; a mismatch is
//! reported together with the identity of the client that currently owns the
//! device.
//!
//! `start` is permissive: it always succeeds and replaces whatever session was
//! bound before.  There is no reject-if-already-bound path.
//!
//! The manager has no internal locking.  It is owned by the command router,
//! which runs on the single automation worker, so all mutations are already
//! serialized.

use std::time::SystemTime;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Error returned when a presented token does not match the bound session.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("device already in use by {owner}")]
    DeviceInUse { owner: String },
}

/// One client's exclusive ownership of the automation target.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    token: String,
    client_identity: String,
    created_at: SystemTime,
}

impl Session {
    fn new(client_identity: String) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            client_identity,
            created_at: SystemTime::now(),
        }
    }

    /// The opaque token the client must echo on every later command.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The identity the client declared when it started the session.
    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// Owns the single, optional bound session.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: Option<Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a fresh session for `client_identity` and returns it.
    ///
    /// Any previously bound session is replaced; its token stops validating
    /// immediately.
    pub fn start(&mut self, client_identity: impl Into<String>) -> &Session {
        let session = Session::new(client_identity.into());
        if let Some(previous) = self.current.as_ref() {
            info!(
                "session of '{}' replaced by '{}'",
                previous.client_identity, session.client_identity
            );
        } else {
            info!("session started by '{}'", session.client_identity);
        }
        self.current.insert(session)
    }

    /// Returns `true` when no session is bound or `presented` equals the bound
    /// token exactly.
    pub fn validate(&self, presented: Option<&str>) -> bool {
        match &self.current {
            None => true,
            Some(session) => presented == Some(session.token.as_str()),
        }
    }

    /// Like [`validate`](Self::validate) but reports the current owner on
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::DeviceInUse`] when the token does not match.
    pub fn authorize(&self, presented: Option<&str>) -> Result<(), SessionError> {
        if self.validate(presented) {
            return Ok(());
        }
        let owner = self
            .current
            .as_ref()
            .map(|s| s.client_identity.clone())
            .unwrap_or_default();
        Err(SessionError::DeviceInUse { owner })
    }

    /// Unbinds the current session without any token check.
    ///
    /// Returns the session that was bound, if any.
    pub fn stop(&mut self) -> Option<Session> {
        let previous = self.current.take();
        if let Some(session) = &previous {
            info!("session of '{}' ended", session.client_identity);
        }
        previous
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.current.is_some()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
