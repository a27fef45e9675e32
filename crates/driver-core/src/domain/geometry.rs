//! Coordinate mapping from client pixel coordinates to device automation vectors.
//!
//! Clients describe a tap target as an element frame in device pixels plus an
//! offset inside that frame.  The automation target works in device *points*,
//! so every coordinate is divided by the display scale factor reported by the
//! device.
//!
//! Two mapping modes exist:
//!
//! - **centered** – the vector points at the middle of the frame (plus offset).
//!   Used for alert buttons.
//! - **raw** – the vector points at the frame origin (plus offset).  Used for
//!   direct element taps, swipes and scripts.
//!
//! The scale factor is validated once, when [`ScreenScale`] is constructed at
//! startup; the mapping functions themselves cannot fail.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Errors produced while building geometry values.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// The display scale factor is zero, negative, below 1 or not finite.
    #[error("invalid display scale factor {0}: must be a finite number >= 1")]
    InvalidScale(f64),

    /// A `x;y;width;height` frame parameter could not be parsed.
    #[error("malformed element frame '{0}': expected x;y;width;height")]
    MalformedFrame(String),
}

/// The device's display scale factor (device pixels per point).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenScale(f64);

impl ScreenScale {
    /// Validates and wraps a raw scale factor.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::InvalidScale`] when `value` is not finite or is
    /// smaller than 1.
    pub fn new(value: f64) -> Result<Self, GeometryError> {
        if !value.is_finite() || value < 1.0 {
            return Err(GeometryError::InvalidScale(value));
        }
        Ok(Self(value))
    }

    /// Returns the scale factor.
    pub fn get(self) -> f64 {
        self.0
    }
}

/// A point in the automation target's coordinate space (device points).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

impl Vector {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns this vector translated by `(dx, dy)`.
    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An element's bounding box in device pixels, as sent by the client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementFrame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ElementFrame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl FromStr for ElementFrame {
    type Err = GeometryError;

    /// Parses the `x;y;width;height` wire form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || GeometryError::MalformedFrame(s.to_string());

        let fields = s
            .split(';')
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed())?;

        match fields.as_slice() {
            [x, y, width, height] if fields.iter().all(|v| v.is_finite()) => {
                Ok(Self::new(*x, *y, *width, *height))
            }
            _ => Err(malformed()),
        }
    }
}

/// Converts client coordinates into device vectors for one display scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale: ScreenScale,
}

impl CoordinateMapper {
    pub fn new(scale: ScreenScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> ScreenScale {
        self.scale
    }

    /// Maps to the center of `frame`, shifted by the offset.
    ///
    /// `((frame.x + offset_x) + frame.width / 2) / scale`, likewise for y.
    pub fn centered(&self, offset_x: f64, offset_y: f64, frame: &ElementFrame) -> Vector {
        let s = self.scale.get();
        Vector {
            x: ((frame.x + offset_x) + frame.width / 2.0) / s,
            y: ((frame.y + offset_y) + frame.height / 2.0) / s,
        }
    }

    /// Maps to the origin of `frame`, shifted by the offset.
    pub fn raw(&self, offset_x: f64, offset_y: f64, frame: &ElementFrame) -> Vector {
        let s = self.scale.get();
        Vector {
            x: (frame.x + offset_x) / s,
            y: (frame.y + offset_y) / s,
        }
    }

    /// Returns the `(press, release)` pair of a swipe.
    ///
    /// The direction delta is added to the press vector as-is; it is already
    /// expressed in device points.
    pub fn swipe(&self, press: Vector, direction_x: f64, direction_y: f64) -> (Vector, Vector) {
        (press, press.translate(direction_x, direction_y))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
