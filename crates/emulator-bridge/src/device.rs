//! Bridge Device Types
//!
//! Devices as reported by `adb devices -l`.

use serde::{Deserialize, Serialize};

/// Device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// Device is online and ready
    Online,
    /// Device is offline
    Offline,
    /// Device is not authorized
    Unauthorized,
    /// Unknown state
    Unknown,
}

impl DeviceState {
    /// Parse the state column of `adb devices`
    pub fn parse(value: &str) -> Self {
        match value {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            _ => DeviceState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Online => "device",
            DeviceState::Offline => "offline",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Unknown => "unknown",
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceState::Online)
    }
}

/// Device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    /// Emulator console transport (`emulator-5554`)
    Emulator,
    /// TCP transport (`127.0.0.1:5555`)
    Network,
    /// Anything else, usually a USB device
    Physical,
}

/// A device connection exposed by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Device serial
    pub serial: String,
    /// Device state
    pub state: DeviceState,
    /// Transport kind, derived from the serial
    pub device_type: DeviceType,
    /// Device model
    pub model: Option<String>,
    /// Transport ID
    pub transport_id: Option<u32>,
}

impl Device {
    /// Create a device from a serial and state
    pub fn new(serial: impl Into<String>, state: DeviceState) -> Self {
        let serial = serial.into();
        let device_type = if serial.starts_with("emulator-") {
            DeviceType::Emulator
        } else if serial.contains(':') {
            DeviceType::Network
        } else {
            DeviceType::Physical
        };

        Self {
            serial,
            state,
            device_type,
            model: None,
            transport_id: None,
        }
    }

    /// Parse one line of `adb devices -l`
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let serial = parts.next()?;
        let state = DeviceState::parse(parts.next()?);

        let mut device = Device::new(serial, state);
        for part in parts {
            if let Some(value) = part.strip_prefix("model:") {
                device.model = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("transport_id:") {
                device.transport_id = value.parse().ok();
            }
        }
        Some(device)
    }

    /// Check if device is online and usable
    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }

    /// Console port of the emulator behind this device, if the serial
    /// identifies one.
    ///
    /// `emulator-5554` names the console port directly, `127.0.0.1:5555`
    /// names the adb port, which is always console port + 1.
    pub fn console_port(&self) -> Option<u16> {
        match self.device_type {
            DeviceType::Emulator => self.serial.strip_prefix("emulator-")?.parse().ok(),
            DeviceType::Network => {
                let (host, port) = self.serial.rsplit_once(':')?;
                if host != "127.0.0.1" && host != "localhost" {
                    return None;
                }
                let adb_port: u16 = port.parse().ok()?;
                adb_port.checked_sub(1)
            }
            DeviceType::Physical => None,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> String {
        match self.model {
            Some(ref model) => format!("{} ({})", model.replace('_', " "), self.serial),
            None => self.serial.clone(),
        }
    }
}
