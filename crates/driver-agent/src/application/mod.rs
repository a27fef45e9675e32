//! Application layer for the driver agent.
//!
//! - **`command_router`** – Parses one command, enforces the session and
//!   foreground rules, and turns it into automation calls.  Runs only on the
//!   automation thread.
//!
//! - **`executor`** – Owns that thread and hands out the cloneable handle the
//!   transports use to submit commands.

pub mod command_router;
pub mod executor;
