//! Infrastructure layer for the driver agent.
//!
//! Contains the adapters around the command logic: the automation and screen
//! capture collaborators, the HTTP and UDP sockets, and the config file.
//!
//! The collaborator traits ([`automation::AutomationTarget`] and
//! [`screen_capture::ScreenCapture`]) are defined here next to their
//! simulated implementations; the application layer depends on the traits
//! only.

pub mod automation;
pub mod network;
pub mod screen_capture;
pub mod storage;
