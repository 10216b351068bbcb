//! Emulator Bridge
//!
//! Talks to the emulator manager console (instance registry, launch,
//! settings) and to the device bridge (device list, shell, input).

pub mod adb;
pub mod console;
pub mod device;
pub mod instance;

use async_trait::async_trait;

pub use adb::{launcher_intent, tap_args, AdbClient, AdbError, ACTIVITY_DUMP, ADB_EXE};
pub use console::{ConsoleClient, ConsoleError, CONSOLE_EXE};
pub use device::{Device, DeviceState, DeviceType};
pub use instance::{Instance, InstanceSettings, InstanceStatus, Resolution};

/// Console port of instance 0
pub const DEFAULT_CONSOLE_PORT: u16 = 5554;

/// Console port an instance listens on, derived from its manager index.
///
/// Each instance takes a console/adb port pair, so instance `n` sits at
/// `5554 + 2n`. Returns `None` only when that does not fit a port number.
pub fn console_port_for(index: u32) -> Option<u16> {
    let port = index.checked_mul(2)?.checked_add(u32::from(DEFAULT_CONSOLE_PORT))?;
    u16::try_from(port).ok()
}

/// Emulator manager operations used by the workflow.
#[async_trait]
pub trait EmulatorConsole: Send + Sync {
    /// Configured instances, in manager order
    async fn list_instances(&self) -> Result<Vec<Instance>, ConsoleError>;

    /// Launch an instance by display name
    async fn launch(&self, name: &str) -> Result<(), ConsoleError>;

    /// Apply resource settings to an instance
    async fn modify(&self, id: u32, settings: &InstanceSettings) -> Result<(), ConsoleError>;
}

/// Device bridge operations used by the workflow.
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Snapshot of connected devices. Order is not stable across calls.
    async fn list_devices(&self) -> Result<Vec<Device>, AdbError>;

    /// Run a shell command on a device and return its stdout
    async fn shell(&self, serial: &str, command: &str) -> Result<String, AdbError>;

    /// Send a tap at screen coordinates
    async fn tap(&self, serial: &str, x: u32, y: u32) -> Result<(), AdbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_port_for() {
        assert_eq!(console_port_for(0), Some(5554));
        assert_eq!(console_port_for(3), Some(5560));
        assert_eq!(console_port_for(64), Some(5682));
        assert_eq!(console_port_for(65), Some(5684));
        assert_eq!(console_port_for(200), Some(5954));
        assert_eq!(console_port_for(30_000), None);
        assert_eq!(console_port_for(u32::MAX), None);
    }
}
