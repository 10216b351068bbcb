//! Error types for ld-dock
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use ld_dock_emulator_bridge::{AdbError, ConsoleError};

use crate::readiness::FailureReason;

/// Main error type for ld-dock
#[derive(Error, Debug)]
pub enum DockError {
    #[error("Launch error: {0}")]
    Launch(String),

    #[error("Bridge unavailable: {0}")]
    BridgeUnavailable(String),

    #[error("Readiness timeout: {0}")]
    ReadinessTimeout(String),

    #[error("Console error: {0}")]
    Console(#[from] ConsoleError),

    #[error("Bridge error: {0}")]
    Adb(#[from] AdbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cancelled")]
    Cancelled,
}

/// Result type alias for ld-dock operations
pub type Result<T> = std::result::Result<T, DockError>;

impl DockError {
    /// Stable reason code for reporting
    pub fn code(&self) -> &'static str {
        match self {
            DockError::Launch(_) => "launch_error",
            DockError::BridgeUnavailable(_) => "no_device",
            DockError::ReadinessTimeout(_) => "home_timeout",
            DockError::Console(_) => "console_error",
            DockError::Adb(_) => "bridge_error",
            DockError::Io(_) => "io_error",
            DockError::Config(_)
            | DockError::TomlParse(_)
            | DockError::TomlSerialize(_)
            | DockError::Json(_) => "config_error",
            DockError::InvalidState(_) => "invalid_state",
            DockError::Cancelled => "cancelled",
        }
    }

    /// The job failure a per-job error ends in
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            DockError::Launch(_) | DockError::Console(_) => Some(FailureReason::LaunchError),
            DockError::BridgeUnavailable(_) => Some(FailureReason::NoDevice),
            DockError::ReadinessTimeout(_) => Some(FailureReason::HomeTimeout),
            _ => None,
        }
    }

    /// Errors that end only the current attempt; the operator can simply
    /// run again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DockError::BridgeUnavailable(_)
                | DockError::ReadinessTimeout(_)
                | DockError::Cancelled
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            DockError::Launch(msg) => format!("The emulator could not be started: {}", msg),
            DockError::BridgeUnavailable(msg) => format!("The instance never connected to the bridge: {}", msg),
            DockError::ReadinessTimeout(msg) => format!("The home screen never appeared: {}", msg),
            DockError::Console(ConsoleError::NotFound(path)) => {
                format!("Emulator console not found at {}. Check the install directory.", path.display())
            }
            DockError::Adb(AdbError::NotFound(path)) => {
                format!("Bridge executable not found at {}. Check the install directory.", path.display())
            }
            DockError::Config(msg) => format!("Configuration error: {}", msg),
            DockError::Cancelled => "Operation was cancelled".to_string(),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_codes() {
        assert_eq!(DockError::Launch("x".into()).code(), "launch_error");
        assert_eq!(DockError::BridgeUnavailable("x".into()).code(), "no_device");
        assert_eq!(DockError::ReadinessTimeout("x".into()).code(), "home_timeout");
        assert_eq!(DockError::Cancelled.code(), "cancelled");
    }

    #[test]
    fn test_failure_reason() {
        assert_eq!(
            DockError::BridgeUnavailable("x".into()).failure_reason(),
            Some(FailureReason::NoDevice)
        );
        assert_eq!(DockError::Config("x".into()).failure_reason(), None);
    }

    #[test]
    fn test_recoverable() {
        assert!(DockError::ReadinessTimeout("x".into()).is_recoverable());
        assert!(!DockError::Launch("x".into()).is_recoverable());
        assert!(!DockError::Config("x".into()).is_recoverable());
    }

    #[test]
    fn test_user_message_names_missing_console() {
        let err: DockError = ConsoleError::NotFound(PathBuf::from("C:/LDPlayer/ldconsole.exe")).into();
        assert!(err.user_message().contains("ldconsole.exe"));
    }
}
