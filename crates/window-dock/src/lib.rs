//! ld-dock Window Dock
//!
//! Finds emulator windows on the desktop and hosts them inside fixed-size
//! slots by reparenting them under native container surfaces.

pub mod batch;
pub mod desktop;
pub mod grid;
pub mod locator;
pub mod slot;

#[cfg(windows)]
pub mod win32;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use batch::{spawn_batch_embed, BatchRequest};
pub use desktop::{Rect, WindowError, WindowId, WindowStyle, WindowSystem};
pub use grid::{DockEvent, SlotGeometry, SlotGrid, MAX_SLOTS_PER_ROW};
pub use locator::{WindowLocator, WindowMatch};
pub use slot::{Slot, SlotStatus, SlotSurface};

/// The desktop of the running platform
#[cfg(windows)]
pub fn native() -> Result<Arc<dyn WindowSystem>, WindowError> {
    Ok(Arc::new(win32::Win32Desktop::new()))
}

/// The desktop of the running platform
#[cfg(not(windows))]
pub fn native() -> Result<Arc<dyn WindowSystem>, WindowError> {
    Err(WindowError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn test_native_unsupported() {
        assert!(matches!(native(), Err(WindowError::Unsupported)));
    }
}
