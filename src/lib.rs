//! ld-dock
//!
//! Drives a fleet of LDPlayer emulator instances from cold start to a
//! launched target app, and docks their windows into a fixed grid of
//! host slots.
//!
//! ## Architecture
//!
//! - `ld-dock-emulator-bridge`: emulator manager console and device bridge clients
//! - `ld-dock-core`: configuration, readiness state machine and run orchestration
//! - `ld-dock-window-dock`: window location and slot embedding

#![warn(clippy::all)]

pub mod commands;

// Re-export main components for library usage
pub use ld_dock_core as core;
pub use ld_dock_emulator_bridge as bridge;
pub use ld_dock_window_dock as dock;

/// Prelude module for convenient imports
pub mod prelude {
    pub use ld_dock_core::{AppConfig, Event, JobOutcome, JobState, Orchestrator, RunSummary};
    pub use ld_dock_emulator_bridge::{AdbClient, ConsoleClient, DeviceBridge, EmulatorConsole};
    pub use ld_dock_window_dock::{SlotGrid, WindowId, WindowLocator, WindowSystem};
}
