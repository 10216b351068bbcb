//! Emulator Manager Console
//!
//! Lists, launches and reconfigures instances through the manager's
//! console executable.

use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::instance::{parse_list2, Instance, InstanceSettings};
use crate::EmulatorConsole;

/// Console executable name inside the manager's install directory
pub const CONSOLE_EXE: &str = if cfg!(windows) { "ldconsole.exe" } else { "ldconsole" };

/// Keeps console invocations from flashing a terminal window.
#[cfg(windows)]
pub(crate) const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Console errors
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Emulator console not found at {0}")]
    NotFound(PathBuf),
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),
    #[error("Console command failed: {0}")]
    CommandFailed(String),
    #[error("Invalid instance settings: {0}")]
    InvalidSettings(String),
    #[error("Console command timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for the emulator manager console
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    console_path: PathBuf,
    timeout: Duration,
}

impl ConsoleClient {
    /// Create a client for an explicit executable path
    pub fn new(console_path: PathBuf, timeout: Duration) -> Self {
        Self { console_path, timeout }
    }

    /// Get the console executable path
    pub fn console_path(&self) -> &Path {
        &self.console_path
    }

    /// Check if the console is available
    pub fn is_available(&self) -> bool {
        self.console_path.exists()
    }

    async fn run(&self, args: &[&str]) -> Result<String, ConsoleError> {
        if !self.console_path.exists() {
            return Err(ConsoleError::NotFound(self.console_path.clone()));
        }

        debug!("ldconsole {:?}", args);

        let mut command = Command::new(&self.console_path);
        command.args(args).kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ConsoleError::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(ConsoleError::CommandFailed(format!(
                "{} ({})",
                detail.trim(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// List configured instances
    pub async fn list_instances(&self) -> Result<Vec<Instance>, ConsoleError> {
        let output = self.run(&["list2"]).await?;
        Ok(parse_list2(&output))
    }

    /// Launch an instance by display name
    pub async fn launch(&self, name: &str) -> Result<(), ConsoleError> {
        info!("Launching instance {}", name);
        self.run(&["launch", "--name", name]).await?;
        Ok(())
    }

    /// Apply resource settings, one console command per changed field
    pub async fn modify(&self, id: u32, settings: &InstanceSettings) -> Result<(), ConsoleError> {
        for command in settings.to_commands(id)? {
            let args: Vec<&str> = command.iter().map(String::as_str).collect();
            self.run(&args).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EmulatorConsole for ConsoleClient {
    async fn list_instances(&self) -> Result<Vec<Instance>, ConsoleError> {
        ConsoleClient::list_instances(self).await
    }

    async fn launch(&self, name: &str) -> Result<(), ConsoleError> {
        ConsoleClient::launch(self, name).await
    }

    async fn modify(&self, id: u32, settings: &InstanceSettings) -> Result<(), ConsoleError> {
        ConsoleClient::modify(self, id, settings).await
    }
}
