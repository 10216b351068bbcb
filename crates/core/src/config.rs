//! Application Configuration
//!
//! Manages all ld-dock settings:
//! - Emulator manager install location
//! - Workflow parallelism and target package
//! - Readiness polling budgets
//! - Per-instance resource settings
//! - Slot grid geometry

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use ld_dock_emulator_bridge::{InstanceSettings, Resolution, ADB_EXE, CONSOLE_EXE};

use crate::error::{DockError, Result};

/// Emulator manager location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Directory holding the console and bridge executables
    pub install_dir: Option<PathBuf>,
    /// Explicit console executable, overrides `install_dir`
    pub console_path: Option<PathBuf>,
    /// Explicit bridge executable, overrides `install_dir`
    pub adb_path: Option<PathBuf>,
    /// Timeout for a single external command
    pub command_timeout_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            install_dir: None,
            console_path: None,
            adb_path: None,
            command_timeout_secs: 10,
        }
    }
}

impl ConsoleConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// How a job finds its bridge device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMatch {
    /// Match the serial against the instance's console port
    InstancePort,
    /// Take the device at the job index of the online-device snapshot
    Positional,
}

impl Default for DeviceMatch {
    fn default() -> Self {
        DeviceMatch::InstancePort
    }
}

/// Workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Number of instances to drive in parallel
    pub threads: usize,
    /// Package launched once the home screen is up
    pub target_package: String,
    /// Job to device mapping
    pub device_match: DeviceMatch,
    /// Activity-dump substrings that identify a launcher on screen
    pub home_signatures: Vec<String>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            target_package: "com.instagram.android".to_string(),
            device_match: DeviceMatch::default(),
            home_signatures: vec![
                "com.android.launcher3".to_string(),
                "com.miui.home".to_string(),
            ],
        }
    }
}

/// Readiness polling budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Wait after the launch command before polling the bridge
    pub launch_settle_secs: u64,
    /// Interval between polls
    pub poll_interval_secs: u64,
    /// Polls per phase before giving up
    pub max_attempts: u32,
    /// Wait after the app launch trigger
    pub app_settle_secs: u64,
    /// Emit a "still waiting" line every this many attempts
    pub progress_every: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            launch_settle_secs: 15,
            poll_interval_secs: 5,
            max_attempts: 60,
            app_settle_secs: 3,
            progress_every: 5,
        }
    }
}

impl ReadinessConfig {
    pub fn launch_settle(&self) -> Duration {
        Duration::from_secs(self.launch_settle_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn app_settle(&self) -> Duration {
        Duration::from_secs(self.app_settle_secs)
    }

    /// Total time one polling phase may take
    pub fn phase_budget(&self) -> Duration {
        self.poll_interval() * self.max_attempts
    }
}

/// Resource settings applied to instances before launch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub cpu: Option<u32>,
    pub memory_mb: Option<u32>,
    /// `WIDTHxHEIGHT`
    pub resolution: Option<String>,
    pub dpi: Option<u32>,
    pub fps: Option<u32>,
    /// Push these settings to every selected instance before launching it
    pub apply_before_launch: bool,
}

impl InstanceConfig {
    /// Convert into console settings
    pub fn to_settings(&self) -> Result<InstanceSettings> {
        let resolution = self
            .resolution
            .as_deref()
            .map(str::parse::<Resolution>)
            .transpose()
            .map_err(DockError::Config)?;

        let settings = InstanceSettings {
            cpu: self.cpu,
            memory_mb: self.memory_mb,
            resolution,
            dpi: self.dpi,
            fps: self.fps,
            title: None,
        };
        settings
            .check()
            .map_err(|e| DockError::Config(format!("instance: {}", e)))?;
        Ok(settings)
    }
}

/// Slot grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockConfig {
    /// Number of slots in the pool
    pub slot_count: usize,
    /// Slot width in pixels
    pub slot_width: u32,
    /// Slot height in pixels, header included
    pub slot_height: u32,
    /// Header strip height in pixels
    pub header_height: u32,
    /// Columns in the grid
    pub slots_per_row: usize,
    /// Title substring of the host's own windows, never embedded
    pub host_marker: String,
    /// Pause between consecutive binds of a batch
    pub embed_interval_ms: u64,
    /// Delay between starting a run and its automatic embedding pass
    pub auto_embed_delay_secs: u64,
    /// Period of the keep-visible check
    pub keep_visible_interval_ms: u64,
}

impl Default for DockConfig {
    fn default() -> Self {
        Self {
            slot_count: 6,
            slot_width: 320,
            slot_height: 580,
            header_height: 30,
            slots_per_row: 3,
            host_marker: "ld-dock".to_string(),
            embed_interval_ms: 500,
            auto_embed_delay_secs: 20,
            keep_visible_interval_ms: 1000,
        }
    }
}

impl DockConfig {
    pub fn embed_interval(&self) -> Duration {
        Duration::from_millis(self.embed_interval_ms)
    }

    pub fn auto_embed_delay(&self) -> Duration {
        Duration::from_secs(self.auto_embed_delay_secs)
    }

    pub fn keep_visible_interval(&self) -> Duration {
        Duration::from_millis(self.keep_visible_interval_ms)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Emulator manager settings
    pub console: ConsoleConfig,
    /// Workflow settings
    pub workflow: WorkflowConfig,
    /// Readiness budgets
    pub readiness: ReadinessConfig,
    /// Instance resource settings
    pub instance: InstanceConfig,
    /// Slot grid settings
    pub dock: DockConfig,
}

impl AppConfig {
    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "lddock", "ld-dock")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load configuration from the default location, writing defaults on
    /// first use
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| DockError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from a file, writing defaults if it is missing
    pub async fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            info!("Config file {:?} not found, using defaults", path);
            let config = AppConfig::default();
            config.save_to(path).await?;
            Ok(config)
        }
    }

    /// Save configuration to a file
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Console executable, explicit path first
    pub fn console_path(&self) -> Option<PathBuf> {
        self.console
            .console_path
            .clone()
            .or_else(|| self.console.install_dir.as_ref().map(|d| d.join(CONSOLE_EXE)))
    }

    /// Bridge executable, explicit path first
    pub fn adb_path(&self) -> Option<PathBuf> {
        self.console
            .adb_path
            .clone()
            .or_else(|| self.console.install_dir.as_ref().map(|d| d.join(ADB_EXE)))
    }

    /// Presence checks for everything a run needs
    pub fn validate(&self) -> Result<()> {
        if self.console_path().is_none() || self.adb_path().is_none() {
            return Err(DockError::Config(
                "console.install_dir is not set".into(),
            ));
        }
        if self.workflow.target_package.trim().is_empty() {
            return Err(DockError::Config("workflow.target_package is empty".into()));
        }
        if self.workflow.threads == 0 {
            return Err(DockError::Config("workflow.threads must be at least 1".into()));
        }
        if self.dock.slot_count == 0 {
            return Err(DockError::Config("dock.slot_count must be at least 1".into()));
        }
        self.instance.to_settings()?;
        Ok(())
    }

    /// Effective run settings as pretty JSON, for the run log
    pub fn summary_json(&self) -> Result<String> {
        let summary = serde_json::json!({
            "instance_settings": &self.instance,
            "workflow": &self.workflow,
            "readiness": &self.readiness,
            "console": {
                "console_path": self.console_path(),
                "adb_path": self.adb_path(),
            },
        });
        Ok(serde_json::to_string_pretty(&summary)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.readiness.max_attempts, 60);
        assert_eq!(config.readiness.phase_budget(), Duration::from_secs(300));
        assert_eq!(config.dock.slot_count, 6);
        assert_eq!(config.workflow.device_match, DeviceMatch::InstancePort);
    }

    #[test]
    fn test_validate_requires_install_dir() {
        let mut config = AppConfig::default();
        assert!(matches!(config.validate(), Err(DockError::Config(_))));

        config.console.install_dir = Some(PathBuf::from("C:/LDPlayer/LDPlayer9"));
        assert!(config.validate().is_ok());

        config.workflow.threads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_resolution() {
        let mut config = AppConfig::default();
        config.console.install_dir = Some(PathBuf::from("ld"));
        config.instance.resolution = Some("wide".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_dpi_without_resolution() {
        let mut config = AppConfig::default();
        config.console.install_dir = Some(PathBuf::from("ld"));
        config.instance.dpi = Some(320);
        assert!(matches!(config.validate(), Err(DockError::Config(_))));
    }

    #[test]
    fn test_explicit_paths_win() {
        let mut config = AppConfig::default();
        config.console.install_dir = Some(PathBuf::from("ld"));
        config.console.adb_path = Some(PathBuf::from("platform-tools/adb"));
        assert_eq!(config.adb_path(), Some(PathBuf::from("platform-tools/adb")));
        assert!(config.console_path().unwrap().starts_with("ld"));
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [workflow]
            threads = 4
            device_match = "positional"

            [dock]
            slots_per_row = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.workflow.threads, 4);
        assert_eq!(config.workflow.device_match, DeviceMatch::Positional);
        assert_eq!(config.workflow.target_package, "com.instagram.android");
        assert_eq!(config.dock.slots_per_row, 2);
        assert_eq!(config.dock.slot_width, 320);
    }

    #[test]
    fn test_instance_settings() {
        let config = InstanceConfig {
            cpu: Some(2),
            resolution: Some("540x960".into()),
            dpi: Some(240),
            ..Default::default()
        };
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.cpu, Some(2));
        assert_eq!(settings.resolution, Some(Resolution { width: 540, height: 960 }));
    }

    #[test]
    fn test_summary_json() {
        let config = AppConfig::default();
        let json = config.summary_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["workflow"]["target_package"], "com.instagram.android");
        assert_eq!(value["readiness"]["max_attempts"], 60);
    }

    #[tokio::test]
    async fn test_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = AppConfig::load_from(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.dock.slot_height, 580);

        let mut changed = config.clone();
        changed.workflow.threads = 3;
        changed.save_to(&path).await.unwrap();

        let reloaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(reloaded.workflow.threads, 3);
    }
}
