//! # driver-core
//!
//! Shared library for the remote automation driver containing the session
//! rules, coordinate geometry, the command route table and the frame datagram
//! protocol.
//!
//! The crate has no dependencies on sockets, threads or the automation
//! framework itself.  Everything here is plain data and pure functions, so it
//! can be tested on any machine.
//!
//! # Architecture overview
//!
//! The driver runs next to a device under test and lets a remote client steer
//! it.  The client sends text commands over HTTP (one endpoint per route) and
//! pulls live screen frames over UDP.
//!
//! - **`domain`** – Exclusive-control sessions, the point/pixel geometry used
//!   to turn element frames into tap vectors, and the device capabilities
//!   announced when a session starts.
//!
//! - **`protocol`** – How commands and frames look on the wire.  Request
//!   bodies are parsed into a typed [`RouteAction`], every reply is a flat
//!   [`CommandResponse`], and frames are cut into bounded datagrams with an
//!   8-byte offset/remaining header.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `driver_core::SessionManager` instead of the full module path.
pub use domain::capabilities::{
    CapabilitiesError, DeviceCapabilities, DeviceInfo, DeviceProperty, Orientation, SystemButton,
};
pub use domain::geometry::{CoordinateMapper, ElementFrame, GeometryError, ScreenScale, Vector};
pub use domain::session::{Session, SessionError, SessionManager};
pub use protocol::datagram::{split_frame, DatagramError, DatagramHeader, MAX_PAYLOAD};
pub use protocol::response::{CommandError, CommandResponse};
pub use protocol::route::{RouteAction, RouteName};
