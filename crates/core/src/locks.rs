//! Process-wide locks around shared emulator resources.
//!
//! The manager console misbehaves when several launch commands land at
//! once, and device snapshots are consumed positionally, so both
//! operations are serialized across every running job.

use std::sync::Arc;
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, MutexGuard};

static GLOBAL: Lazy<Arc<ResourceLocks>> = Lazy::new(|| Arc::new(ResourceLocks::new()));

/// Mutual exclusion for launch commands and device enumeration
#[derive(Debug, Default)]
pub struct ResourceLocks {
    launch: Mutex<()>,
    enumerate: Mutex<()>,
}

impl ResourceLocks {
    /// Fresh, unshared locks
    pub fn new() -> Self {
        Self::default()
    }

    /// The locks shared by every orchestrator in the process
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Hold while issuing a launch (or other console write) command
    pub async fn launch(&self) -> MutexGuard<'_, ()> {
        self.launch.lock().await
    }

    /// Hold while taking a device snapshot
    pub async fn enumerate(&self) -> MutexGuard<'_, ()> {
        self.enumerate.lock().await
    }
}
