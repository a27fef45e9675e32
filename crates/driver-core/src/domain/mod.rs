//! Domain entities for the automation driver.
//!
//! Pure rules with no infrastructure dependencies: who owns the device, how
//! element frames map to screen points, and what the device can do.

/// Device description and the capabilities derived from it.
pub mod capabilities;

/// Points, pixels and the element-to-vector mapping.
pub mod geometry;

/// The single exclusive-control session.
pub mod session;
