//! Window Locator
//!
//! Finds the desktop windows belonging to emulator instances by title.

use serde::Serialize;
use tracing::{debug, info};

use crate::desktop::{WindowError, WindowId, WindowSystem};

/// A located instance window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowMatch {
    pub window: WindowId,
    pub title: String,
}

/// Matches top-level windows against instance names
#[derive(Debug, Clone)]
pub struct WindowLocator {
    host_marker: String,
}

impl WindowLocator {
    /// Windows whose title contains `host_marker` belong to this
    /// application and are never matched
    pub fn new(host_marker: impl Into<String>) -> Self {
        Self {
            host_marker: host_marker.into(),
        }
    }

    pub fn host_marker(&self) -> &str {
        &self.host_marker
    }

    /// Visible, non-child windows whose title contains one of `names`,
    /// sorted by title
    ///
    /// Windows that vanish during the scan are skipped.
    pub fn locate(
        &self,
        system: &dyn WindowSystem,
        names: &[String],
    ) -> Result<Vec<WindowMatch>, WindowError> {
        let names: Vec<&str> = names
            .iter()
            .map(|n| n.as_str())
            .filter(|n| !n.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for window in system.top_level_windows()? {
            match self.inspect(system, window, &names) {
                Ok(Some(found)) => matches.push(found),
                Ok(None) => {}
                Err(e) => debug!("Skipping window {}: {}", window, e),
            }
        }

        matches.sort_by(|a, b| a.title.cmp(&b.title).then(a.window.cmp(&b.window)));
        info!("Located {} instance window(s)", matches.len());
        Ok(matches)
    }

    fn inspect(
        &self,
        system: &dyn WindowSystem,
        window: WindowId,
        names: &[&str],
    ) -> Result<Option<WindowMatch>, WindowError> {
        if !system.is_visible(window) {
            return Ok(None);
        }

        let title = system.title(window)?;
        if !self.host_marker.is_empty() && title.contains(&self.host_marker) {
            return Ok(None);
        }
        if !names.iter().any(|name| title.contains(name)) {
            return Ok(None);
        }
        if system.style(window)?.is_child() {
            return Ok(None);
        }

        Ok(Some(WindowMatch { window, title }))
    }
}
