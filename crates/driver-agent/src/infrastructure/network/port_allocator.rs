//! Picks the ports the command and stream servers bind to.
//!
//! A port is probed by binding a throwaway TCP listener (or UDP socket, for
//! [`Protocol::Udp`]) on the configured address and dropping it immediately.
//!
//! # Known limitation
//!
//! Probe-then-release is racy: another process can take the port between the
//! probe and the real bind.  The real bind then fails and startup aborts with
//! the bind error.  For a single driver per host this is accepted.

use std::net::{IpAddr, SocketAddr, TcpListener, UdpSocket};
use std::ops::RangeInclusive;

use thiserror::Error;
use tracing::debug;

/// Default scan range when no port is requested.
pub const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 8080..=65000;

/// Error type for port allocation.
#[derive(Debug, Error, PartialEq)]
pub enum PortError {
    /// The explicitly requested port cannot be bound.
    #[error("port {0} is already in use")]
    PortInUse(u16),

    /// Every port of the scan range is taken.
    #[error("no free port in {start}..={end}")]
    NoPortAvailable { start: u16, end: u16 },
}

/// Socket kind a port is probed for.  TCP and UDP port spaces are separate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

/// Finds bindable ports on one address.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    ip: IpAddr,
    range: RangeInclusive<u16>,
    protocol: Protocol,
}

impl PortAllocator {
    pub fn new(ip: IpAddr) -> Self {
        Self::with_range(ip, DEFAULT_PORT_RANGE)
    }

    /// Creates a TCP allocator scanning `range`.
    pub fn with_range(ip: IpAddr, range: RangeInclusive<u16>) -> Self {
        Self {
            ip,
            range,
            protocol: Protocol::Tcp,
        }
    }

    /// Returns a copy of this allocator that probes for `protocol`.
    pub fn with_protocol(&self, protocol: Protocol) -> Self {
        Self {
            protocol,
            ..self.clone()
        }
    }

    /// Returns `requested` if it is bindable, or else the first bindable port
    /// of the scan range in ascending order.
    ///
    /// `Some(0)` is treated like `None`.
    ///
    /// # Errors
    ///
    /// - [`PortError::PortInUse`] if `requested` is taken.
    /// - [`PortError::NoPortAvailable`] if the whole range is taken.
    pub fn allocate(&self, requested: Option<u16>) -> Result<u16, PortError> {
        if let Some(port) = requested.filter(|p| *p != 0) {
            return if self.is_free(port) {
                Ok(port)
            } else {
                Err(PortError::PortInUse(port))
            };
        }

        self.range
            .clone()
            .find(|port| self.is_free(*port))
            .ok_or(PortError::NoPortAvailable {
                start: *self.range.start(),
                end: *self.range.end(),
            })
    }

    /// Binds and immediately releases a listener (or UDP socket) on `port`.
    pub fn is_free(&self, port: u16) -> bool {
        let addr = SocketAddr::new(self.ip, port);
        let bound = match self.protocol {
            Protocol::Tcp => TcpListener::bind(addr).map(drop),
            Protocol::Udp => UdpSocket::bind(addr).map(drop),
        };
        match bound {
            Ok(()) => true,
            Err(e) => {
                debug!("{:?} port probe {addr} failed: {e}", self.protocol);
                false
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
