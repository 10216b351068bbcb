//! ADB (Android Debug Bridge) Client
//!
//! Communicates with running instances via the bridge executable shipped
//! next to the emulator manager.

use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::device::Device;
use crate::DeviceBridge;

/// Bridge executable name inside the manager's install directory
pub const ADB_EXE: &str = if cfg!(windows) { "adb.exe" } else { "adb" };

/// Shell command dumping the activity stack
pub const ACTIVITY_DUMP: &str = "dumpsys activity activities";

/// Shell command firing the launcher intent of `package`
pub fn launcher_intent(package: &str) -> String {
    format!("monkey -p {} -c android.intent.category.LAUNCHER 1", package)
}

/// Arguments of an input tap at screen coordinates
pub fn tap_args(x: u32, y: u32) -> Vec<String> {
    vec![
        "shell".into(),
        "input".into(),
        "tap".into(),
        x.to_string(),
        y.to_string(),
    ]
}

/// ADB errors
#[derive(Debug, thiserror::Error)]
pub enum AdbError {
    #[error("ADB not found at {0}")]
    NotFound(PathBuf),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("ADB command failed: {0}")]
    CommandFailed(String),
    #[error("ADB command timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// ADB Client
#[derive(Debug, Clone)]
pub struct AdbClient {
    adb_path: PathBuf,
    timeout: Duration,
}

impl AdbClient {
    /// Create a client for an explicit executable path
    pub fn new(adb_path: PathBuf, timeout: Duration) -> Self {
        Self { adb_path, timeout }
    }

    /// Get the ADB executable path
    pub fn adb_path(&self) -> &Path {
        &self.adb_path
    }

    /// Check if ADB is available
    pub fn is_available(&self) -> bool {
        self.adb_path.exists()
    }

    /// Run an ADB command
    async fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        if !self.adb_path.exists() {
            return Err(AdbError::NotFound(self.adb_path.clone()));
        }

        debug!("adb {:?}", args);

        let mut command = Command::new(&self.adb_path);
        command.args(args).kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(crate::console::CREATE_NO_WINDOW);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| AdbError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run an ADB command for a specific device
    async fn run_for_device(&self, serial: &str, args: &[&str]) -> Result<String, AdbError> {
        let mut full_args = vec!["-s", serial];
        full_args.extend(args);
        self.run(&full_args).await
    }

    /// Start the ADB server
    pub async fn start_server(&self) -> Result<(), AdbError> {
        self.run(&["start-server"]).await?;
        Ok(())
    }

    /// List connected devices in the order the server reports them
    pub async fn list_devices(&self) -> Result<Vec<Device>, AdbError> {
        let output = self.run(&["devices", "-l"]).await?;
        Ok(parse_devices(&output))
    }

    /// Run a shell command on device
    pub async fn shell(&self, serial: &str, command: &str) -> Result<String, AdbError> {
        self.run_for_device(serial, &["shell", command]).await
    }

    /// Send a tap event
    pub async fn tap(&self, serial: &str, x: u32, y: u32) -> Result<(), AdbError> {
        let args = tap_args(x, y);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_for_device(serial, &args).await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceBridge for AdbClient {
    async fn list_devices(&self) -> Result<Vec<Device>, AdbError> {
        AdbClient::list_devices(self).await
    }

    async fn shell(&self, serial: &str, command: &str) -> Result<String, AdbError> {
        AdbClient::shell(self, serial, command).await
    }

    async fn tap(&self, serial: &str, x: u32, y: u32) -> Result<(), AdbError> {
        AdbClient::tap(self, serial, x, y).await
    }
}

/// Parse the output of `adb devices -l`.
///
/// Skips the header and the daemon start-up chatter (`* daemon ...`).
pub fn parse_devices(output: &str) -> Vec<Device> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(Device::parse_line)
        .collect()
}
