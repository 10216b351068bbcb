//! ld-dock core - instance readiness workflow and orchestration
//!
//! Drives emulator instances from launch to a running target app,
//! several at a time, and reports progress as typed events.

pub mod config;
pub mod error;
pub mod events;
pub mod locks;
pub mod orchestrator;
pub mod readiness;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, DeviceMatch};
pub use error::{DockError, Result};
pub use events::{Event, EventBus, EventSubscription, RunSummary};
pub use locks::ResourceLocks;
pub use orchestrator::{JobInfo, Orchestrator, RunHandle};
pub use readiness::{AppLaunch, FailureReason, JobOutcome, JobState, ReadinessJob};

/// ld-dock version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ld-dock";
