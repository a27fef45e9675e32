//! Device capabilities announced to the controlling client.
//!
//! [`DeviceCapabilities`] is computed once at startup from the automation
//! target's [`DeviceInfo`] and the chosen streaming port, then shared
//! read-only for the life of the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::geometry::{CoordinateMapper, GeometryError, ScreenScale};

/// Errors that make the capabilities impossible to compute.  All are fatal at
/// startup.
#[derive(Debug, Error, PartialEq)]
pub enum CapabilitiesError {
    #[error(transparent)]
    InvalidScale(#[from] GeometryError),

    #[error("device reported an empty screen ({width}x{height})")]
    EmptyScreen { width: u32, height: u32 },
}

/// Static description of the device as reported by the automation target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub model: String,
    pub os_name: String,
    pub os_version: String,
    /// Native screen width in device pixels.
    pub native_width: u32,
    /// Native screen height in device pixels.
    pub native_height: u32,
    /// Device pixels per point.
    pub scale: f64,
}

/// Hardware buttons the automation target can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemButton {
    Home,
    SoundUp,
    SoundDown,
}

impl SystemButton {
    pub const ALL: [SystemButton; 3] = [Self::Home, Self::SoundUp, Self::SoundDown];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::SoundUp => "soundup",
            Self::SoundDown => "sounddown",
        }
    }

    /// Case-insensitive lookup by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(name))
    }
}

/// Device settings that can be changed through `property-set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProperty {
    Orientation,
    Bluetooth,
    Wifi,
    Airplane,
}

impl DeviceProperty {
    pub const ALL: [DeviceProperty; 4] = [
        Self::Orientation,
        Self::Bluetooth,
        Self::Wifi,
        Self::Airplane,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Orientation => "orientation",
            Self::Bluetooth => "bluetooth",
            Self::Wifi => "wifi",
            Self::Airplane => "airplane",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
    }
}

/// Interface orientation values accepted by `property-set orientation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Portrait,
    LandscapeLeft,
    LandscapeRight,
    UpsideDown,
}

impl Orientation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "portrait" => Some(Self::Portrait),
            "landscape-left" => Some(Self::LandscapeLeft),
            "landscape-right" => Some(Self::LandscapeRight),
            "upside-down" => Some(Self::UpsideDown),
            _ => None,
        }
    }
}

/// Everything the client needs to know about the device, sent in the
/// `driver start` and `info device` responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub driver_version: String,
    pub device_name: String,
    pub device_model: String,
    pub os_name: String,
    pub os_version: String,
    /// Native screen size in device pixels.
    pub device_width: u32,
    pub device_height: u32,
    pub screen_scale: f64,
    /// Size of the frames pushed on the streaming channel.
    pub channel_width: u32,
    pub channel_height: u32,
    pub system_buttons: Vec<SystemButton>,
    pub system_properties: Vec<DeviceProperty>,
    /// UDP port of the screen stream.
    pub screen_capture_port: u16,
    #[serde(skip)]
    scale: ScreenScale,
}

impl DeviceCapabilities {
    /// Derives the capabilities from the device description.
    ///
    /// The streaming channel uses point dimensions: native size divided by
    /// the scale factor, rounded to the nearest pixel.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilitiesError::InvalidScale`] for a scale that is not a
    /// finite number >= 1, and [`CapabilitiesError::EmptyScreen`] when either
    /// native dimension is zero.
    pub fn compute(info: &DeviceInfo, stream_port: u16) -> Result<Self, CapabilitiesError> {
        let scale = ScreenScale::new(info.scale)?;
        if info.native_width == 0 || info.native_height == 0 {
            return Err(CapabilitiesError::EmptyScreen {
                width: info.native_width,
                height: info.native_height,
            });
        }

        let channel = |native: u32| ((f64::from(native) / scale.get()).round() as u32).max(1);

        Ok(Self {
            driver_version: env!("CARGO_PKG_VERSION").to_string(),
            device_name: info.name.clone(),
            device_model: info.model.clone(),
            os_name: info.os_name.clone(),
            os_version: info.os_version.clone(),
            device_width: info.native_width,
            device_height: info.native_height,
            screen_scale: scale.get(),
            channel_width: channel(info.native_width),
            channel_height: channel(info.native_height),
            system_buttons: SystemButton::ALL.to_vec(),
            system_properties: DeviceProperty::ALL.to_vec(),
            screen_capture_port: stream_port,
            scale,
        })
    }

    /// Returns the coordinate mapper for this device's scale.
    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.scale)
    }

    /// Serializes the capabilities as a JSON object map.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
