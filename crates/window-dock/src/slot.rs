//! Slot and Embedding Controller
//!
//! A slot is a fixed-size host region with a header line and a native
//! container surface. Binding turns a top-level emulator window into a
//! child of that container; releasing hands it back to the desktop with
//! its original style.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::desktop::{Rect, WindowError, WindowId, WindowStyle, WindowSystem};

/// Longest embedded title shown in a slot header
pub const HEADER_TITLE_CHARS: usize = 25;

/// Native surface a slot hosts windows in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSurface {
    pub container: WindowId,
    pub width: i32,
    pub height: i32,
    pub header_height: i32,
}

impl SlotSurface {
    /// Area an embedded window fills: the slot minus its header
    pub fn client_rect(&self) -> Rect {
        Rect::new(0, 0, self.width, (self.height - self.header_height).max(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Empty,
    Embedded,
    Error,
}

/// A window currently hosted by a slot, with what is needed to give it back
#[derive(Debug, Clone)]
struct Binding {
    window: WindowId,
    title: String,
    original_style: WindowStyle,
    original_parent: Option<WindowId>,
}

impl Binding {
    /// Best effort: the window may already be gone
    fn restore(&self, system: &dyn WindowSystem) {
        if !system.is_window(self.window) {
            debug!("Window {} closed before release", self.window);
            return;
        }
        let result = system
            .set_style(self.window, self.original_style)
            .and_then(|_| system.set_parent(self.window, self.original_parent))
            .and_then(|_| system.show(self.window));
        if let Err(e) = result {
            warn!("Could not restore window {}: {}", self.window, e);
        }
    }
}

/// One host slot
#[derive(Debug)]
pub struct Slot {
    index: usize,
    surface: SlotSurface,
    binding: Option<Binding>,
    status: SlotStatus,
}

impl Slot {
    pub fn new(index: usize, surface: SlotSurface) -> Self {
        Self {
            index,
            surface,
            binding: None,
            status: SlotStatus::Empty,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn surface(&self) -> &SlotSurface {
        &self.surface
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    /// Handle of the hosted window
    pub fn window(&self) -> Option<WindowId> {
        self.binding.as_ref().map(|b| b.window)
    }

    pub fn title(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.title.as_str())
    }

    pub fn header_text(&self) -> String {
        match (&self.status, &self.binding) {
            (SlotStatus::Embedded, Some(binding)) => {
                binding.title.chars().take(HEADER_TITLE_CHARS).collect()
            }
            (SlotStatus::Error, _) => format!("Slot {}: Error", self.index + 1),
            _ => format!("Slot {}: Empty", self.index + 1),
        }
    }

    /// Embed `window` into this slot
    ///
    /// A previously hosted window is released first. On failure the slot is
    /// marked as errored, the window gets its original style and parent
    /// back, and the slot stays usable for a later bind. Input to the
    /// embedded window is left enabled.
    pub fn bind(
        &mut self,
        system: &dyn WindowSystem,
        window: WindowId,
        title: &str,
    ) -> Result<(), WindowError> {
        if self.binding.is_some() {
            self.release(system);
        }

        info!("Embedding {} ({}) into slot {}", title, window, self.index + 1);

        let result = self.capture(system, window).and_then(|binding| {
            match self.attach(system, window) {
                Ok(()) => Ok(binding),
                Err(e) => {
                    binding.restore(system);
                    Err(e)
                }
            }
        });

        match result {
            Ok(mut binding) => {
                binding.title = title.to_string();
                self.binding = Some(binding);
                self.status = SlotStatus::Embedded;
                info!("Slot {}: embedded {}", self.index + 1, window);
                Ok(())
            }
            Err(e) => {
                warn!("Slot {}: embedding {} failed: {}", self.index + 1, window, e);
                self.status = SlotStatus::Error;
                Err(e)
            }
        }
    }

    fn capture(&self, system: &dyn WindowSystem, window: WindowId) -> Result<Binding, WindowError> {
        if !system.is_window(self.surface.container) {
            return Err(WindowError::InvalidHandle(self.surface.container));
        }
        Ok(Binding {
            window,
            title: String::new(),
            original_style: system.style(window)?,
            original_parent: system.parent(window),
        })
    }

    fn attach(&self, system: &dyn WindowSystem, window: WindowId) -> Result<(), WindowError> {
        let rect = self.surface.client_rect();

        let style = system.style(window)?;
        system.set_style(window, style.embedded())?;

        system.set_parent(window, Some(self.surface.container))?;
        system.move_window(window, rect)?;

        // Emulator renderers often stay blank after a bare reparent
        system.show(window)?;
        system.update(window)?;
        system.invalidate(window)?;
        system.redraw(window)?;

        system.set_position(window, rect)
    }

    /// Re-assert that the hosted window is parented and visible
    ///
    /// Returns whether anything had to be repaired.
    pub fn keep_visible(&self, system: &dyn WindowSystem) -> Result<bool, WindowError> {
        let window = match (&self.status, &self.binding) {
            (SlotStatus::Embedded, Some(binding)) => binding.window,
            _ => return Ok(false),
        };
        if !system.is_window(window) {
            return Ok(false);
        }

        if system.parent(window) != Some(self.surface.container) {
            debug!("Slot {}: reclaiming {}", self.index + 1, window);
            system.set_parent(window, Some(self.surface.container))?;
            system.move_window(window, self.surface.client_rect())?;
            system.show(window)?;
            return Ok(true);
        }

        if !system.is_visible(window) {
            debug!("Slot {}: re-showing {}", self.index + 1, window);
            system.show(window)?;
            system.invalidate(window)?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Hand the hosted window back to the desktop and empty the slot
    pub fn release(&mut self, system: &dyn WindowSystem) -> Option<WindowId> {
        self.status = SlotStatus::Empty;
        let binding = self.binding.take()?;
        binding.restore(system);
        debug!("Slot {}: released {}", self.index + 1, binding.window);
        Some(binding.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDesktop, TOP_LEVEL};

    fn slot(desktop: &FakeDesktop, container: isize) -> Slot {
        let container = desktop.open_container(container);
        Slot::new(
            0,
            SlotSurface {
                container,
                width: 320,
                height: 580,
                header_height: 30,
            },
        )
    }

    #[test]
    fn test_bind_embeds_window() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);
        let window = desktop.open(1, "LDPlayer-1");

        slot.bind(&desktop, window, "LDPlayer-1").unwrap();

        let state = desktop.get(window).unwrap();
        assert_eq!(state.parent, Some(WindowId(100)));
        assert!(state.style.is_child());
        assert!(!state.style.contains(WindowStyle::CAPTION));
        assert_eq!(state.rect, Rect::new(0, 0, 320, 550));
        assert_eq!(state.redraws, 1);
        assert_eq!(slot.status(), SlotStatus::Embedded);
        assert_eq!(slot.header_text(), "LDPlayer-1");
    }

    #[test]
    fn test_rebind_releases_previous_window() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);
        let first = desktop.open(1, "LDPlayer-1");
        let second = desktop.open(2, "LDPlayer-2");

        slot.bind(&desktop, first, "LDPlayer-1").unwrap();
        slot.bind(&desktop, second, "LDPlayer-2").unwrap();

        assert_eq!(slot.window(), Some(second));
        let first_state = desktop.get(first).unwrap();
        assert_eq!(first_state.parent, None);
        assert_eq!(first_state.style, TOP_LEVEL);
        assert_eq!(desktop.get(second).unwrap().parent, Some(WindowId(100)));
    }

    #[test]
    fn test_bind_failure_marks_error_and_restores() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);
        let window = desktop.open(1, "LDPlayer-1");
        desktop.refuse_parent.lock().push(window);

        assert!(slot.bind(&desktop, window, "LDPlayer-1").is_err());
        assert_eq!(slot.status(), SlotStatus::Error);
        assert_eq!(slot.header_text(), "Slot 1: Error");
        assert_eq!(slot.window(), None);
        assert_eq!(desktop.get(window).unwrap().style, TOP_LEVEL);

        // The slot stays usable
        let other = desktop.open(2, "LDPlayer-2");
        slot.bind(&desktop, other, "LDPlayer-2").unwrap();
        assert_eq!(slot.status(), SlotStatus::Embedded);
    }

    #[test]
    fn test_bind_vanished_window() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);

        let err = slot.bind(&desktop, WindowId(9), "gone").unwrap_err();
        assert_eq!(err, WindowError::InvalidHandle(WindowId(9)));
        assert_eq!(slot.status(), SlotStatus::Error);
    }

    #[test]
    fn test_keep_visible_reclaims_window() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);
        let window = desktop.open(1, "LDPlayer-1");
        slot.bind(&desktop, window, "LDPlayer-1").unwrap();

        desktop.detach(window);
        desktop.hide(window);
        assert!(slot.keep_visible(&desktop).unwrap());

        let state = desktop.get(window).unwrap();
        assert_eq!(state.parent, Some(WindowId(100)));
        assert!(state.visible);
        assert_eq!(state.rect, Rect::new(0, 0, 320, 550));

        assert!(!slot.keep_visible(&desktop).unwrap());
    }

    #[test]
    fn test_keep_visible_reshows_hidden_window() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);
        let window = desktop.open(1, "LDPlayer-1");
        slot.bind(&desktop, window, "LDPlayer-1").unwrap();

        desktop.hide(window);
        assert!(slot.keep_visible(&desktop).unwrap());
        assert!(desktop.get(window).unwrap().visible);
    }

    #[test]
    fn test_keep_visible_closed_window_is_noop() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);
        let window = desktop.open(1, "LDPlayer-1");
        slot.bind(&desktop, window, "LDPlayer-1").unwrap();

        desktop.close(window);
        assert!(!slot.keep_visible(&desktop).unwrap());
    }

    #[test]
    fn test_header_truncates_title() {
        let desktop = FakeDesktop::new();
        let mut slot = slot(&desktop, 100);
        assert_eq!(slot.header_text(), "Slot 1: Empty");

        let title = "LDPlayer-1 very long window title here";
        let window = desktop.open(1, title);
        slot.bind(&desktop, window, title).unwrap();
        assert_eq!(slot.header_text().chars().count(), HEADER_TITLE_CHARS);

        assert_eq!(slot.release(&desktop), Some(window));
        assert_eq!(slot.header_text(), "Slot 1: Empty");
    }
}
