//! In-memory desktop for tests.

use std::collections::BTreeMap;
use parking_lot::Mutex;

use crate::desktop::{Rect, WindowError, WindowId, WindowStyle, WindowSystem};

/// Default style of a freshly opened top-level window
pub const TOP_LEVEL: WindowStyle = WindowStyle(
    WindowStyle::CAPTION.0
        | WindowStyle::THICKFRAME.0
        | WindowStyle::SYSMENU.0
        | WindowStyle::MINIMIZEBOX.0
        | WindowStyle::MAXIMIZEBOX.0
        | WindowStyle::VISIBLE.0,
);

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub title: String,
    pub style: WindowStyle,
    pub parent: Option<WindowId>,
    pub visible: bool,
    pub rect: Rect,
    pub redraws: u32,
}

/// Scriptable window system
#[derive(Default)]
pub struct FakeDesktop {
    windows: Mutex<BTreeMap<WindowId, FakeWindow>>,
    /// Windows whose reparenting is refused
    pub refuse_parent: Mutex<Vec<WindowId>>,
    /// Windows that close as soon as their title is read
    pub vanishing: Mutex<Vec<WindowId>>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a visible top-level window
    pub fn open(&self, raw: isize, title: &str) -> WindowId {
        self.insert(raw, title, TOP_LEVEL, None)
    }

    /// Open a container window that hosts slots
    pub fn open_container(&self, raw: isize) -> WindowId {
        self.insert(raw, "container", WindowStyle::VISIBLE, None)
    }

    pub fn insert(
        &self,
        raw: isize,
        title: &str,
        style: WindowStyle,
        parent: Option<WindowId>,
    ) -> WindowId {
        let id = WindowId(raw);
        self.windows.lock().insert(
            id,
            FakeWindow {
                title: title.to_string(),
                style,
                parent,
                visible: style.contains(WindowStyle::VISIBLE),
                rect: Rect::default(),
                redraws: 0,
            },
        );
        id
    }

    pub fn close(&self, window: WindowId) {
        self.windows.lock().remove(&window);
    }

    pub fn hide(&self, window: WindowId) {
        if let Some(w) = self.windows.lock().get_mut(&window) {
            w.visible = false;
        }
    }

    /// Reparent without going through the trait, as another process would
    pub fn detach(&self, window: WindowId) {
        if let Some(w) = self.windows.lock().get_mut(&window) {
            w.parent = None;
        }
    }

    pub fn get(&self, window: WindowId) -> Option<FakeWindow> {
        self.windows.lock().get(&window).cloned()
    }

    fn with<T>(
        &self,
        window: WindowId,
        f: impl FnOnce(&mut FakeWindow) -> T,
    ) -> Result<T, WindowError> {
        self.windows
            .lock()
            .get_mut(&window)
            .map(f)
            .ok_or(WindowError::InvalidHandle(window))
    }
}

impl WindowSystem for FakeDesktop {
    fn top_level_windows(&self) -> Result<Vec<WindowId>, WindowError> {
        Ok(self
            .windows
            .lock()
            .iter()
            .filter(|(_, w)| w.parent.is_none())
            .map(|(id, _)| *id)
            .collect())
    }

    fn is_window(&self, window: WindowId) -> bool {
        self.windows.lock().contains_key(&window)
    }

    fn is_visible(&self, window: WindowId) -> bool {
        self.get(window).map(|w| w.visible).unwrap_or(false)
    }

    fn title(&self, window: WindowId) -> Result<String, WindowError> {
        if self.vanishing.lock().contains(&window) {
            self.close(window);
        }
        self.with(window, |w| w.title.clone())
    }

    fn style(&self, window: WindowId) -> Result<WindowStyle, WindowError> {
        self.with(window, |w| w.style)
    }

    fn set_style(&self, window: WindowId, style: WindowStyle) -> Result<(), WindowError> {
        self.with(window, |w| w.style = style)
    }

    fn parent(&self, window: WindowId) -> Option<WindowId> {
        self.get(window).and_then(|w| w.parent)
    }

    fn set_parent(&self, window: WindowId, parent: Option<WindowId>) -> Result<(), WindowError> {
        if self.refuse_parent.lock().contains(&window) {
            return Err(WindowError::api("SetParent", "access denied"));
        }
        if let Some(parent) = parent {
            if !self.is_window(parent) {
                return Err(WindowError::InvalidHandle(parent));
            }
        }
        self.with(window, |w| w.parent = parent)
    }

    fn move_window(&self, window: WindowId, rect: Rect) -> Result<(), WindowError> {
        self.with(window, |w| w.rect = rect)
    }

    fn show(&self, window: WindowId) -> Result<(), WindowError> {
        self.with(window, |w| w.visible = true)
    }

    fn update(&self, window: WindowId) -> Result<(), WindowError> {
        self.with(window, |_| ())
    }

    fn invalidate(&self, window: WindowId) -> Result<(), WindowError> {
        self.with(window, |_| ())
    }

    fn redraw(&self, window: WindowId) -> Result<(), WindowError> {
        self.with(window, |w| w.redraws += 1)
    }

    fn set_position(&self, window: WindowId, rect: Rect) -> Result<(), WindowError> {
        self.with(window, |w| {
            w.rect = rect;
            w.visible = true;
        })
    }
}
