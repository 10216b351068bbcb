//! Desktop window seam.
//!
//! Window handles are weak references owned by other processes: any call
//! may find the window gone, so every operation re-checks and reports
//! `WindowError::InvalidHandle` instead of assuming liveness.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Window-system errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Window {0} no longer exists")]
    InvalidHandle(WindowId),

    #[error("{op} failed: {detail}")]
    Api { op: &'static str, detail: String },

    #[error("Window embedding is not supported on this platform")]
    Unsupported,
}

impl WindowError {
    pub fn api(op: &'static str, detail: impl Into<String>) -> Self {
        WindowError::Api {
            op,
            detail: detail.into(),
        }
    }
}

/// Opaque native window handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub isize);

impl WindowId {
    pub fn raw(self) -> isize {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl FromStr for WindowId {
    type Err = String;

    /// Accepts decimal or `0x`-prefixed hex
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => isize::from_str_radix(hex, 16),
            None => s.parse::<isize>(),
        };
        match parsed {
            Ok(0) => Err("window handle must be non-zero".to_string()),
            Ok(raw) => Ok(WindowId(raw)),
            Err(e) => Err(format!("invalid window handle '{}': {}", s, e)),
        }
    }
}

/// Window style bits (Win32 `GWL_STYLE` layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WindowStyle(pub u32);

impl WindowStyle {
    pub const POPUP: Self = Self(0x8000_0000);
    pub const CHILD: Self = Self(0x4000_0000);
    pub const VISIBLE: Self = Self(0x1000_0000);
    pub const CAPTION: Self = Self(0x00C0_0000);
    pub const SYSMENU: Self = Self(0x0008_0000);
    pub const THICKFRAME: Self = Self(0x0004_0000);
    pub const MINIMIZEBOX: Self = Self(0x0002_0000);
    pub const MAXIMIZEBOX: Self = Self(0x0001_0000);

    /// Frame decorations removed from an embedded window
    pub const DECORATIONS: Self = Self(
        Self::CAPTION.0 | Self::THICKFRAME.0 | Self::SYSMENU.0 | Self::MINIMIZEBOX.0 | Self::MAXIMIZEBOX.0,
    );

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_child(self) -> bool {
        self.contains(Self::CHILD)
    }

    /// Style for a window hosted inside a slot container
    pub fn embedded(self) -> Self {
        (self & !Self::DECORATIONS) | Self::CHILD | Self::VISIBLE
    }
}

impl BitOr for WindowStyle {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for WindowStyle {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for WindowStyle {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

/// Client-relative rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

/// Native window operations used for locating and embedding
pub trait WindowSystem: Send + Sync {
    /// Handles of every top-level window
    fn top_level_windows(&self) -> Result<Vec<WindowId>, WindowError>;

    fn is_window(&self, window: WindowId) -> bool;

    fn is_visible(&self, window: WindowId) -> bool;

    fn title(&self, window: WindowId) -> Result<String, WindowError>;

    fn style(&self, window: WindowId) -> Result<WindowStyle, WindowError>;

    fn set_style(&self, window: WindowId, style: WindowStyle) -> Result<(), WindowError>;

    /// Owning container, `None` for top-level windows
    fn parent(&self, window: WindowId) -> Option<WindowId>;

    /// Reparent, `None` returns the window to the desktop
    fn set_parent(&self, window: WindowId, parent: Option<WindowId>) -> Result<(), WindowError>;

    fn move_window(&self, window: WindowId, rect: Rect) -> Result<(), WindowError>;

    fn show(&self, window: WindowId) -> Result<(), WindowError>;

    fn update(&self, window: WindowId) -> Result<(), WindowError>;

    fn invalidate(&self, window: WindowId) -> Result<(), WindowError>;

    /// Full redraw including child windows
    fn redraw(&self, window: WindowId) -> Result<(), WindowError>;

    /// Z-order aware placement that also refreshes the frame
    fn set_position(&self, window: WindowId, rect: Rect) -> Result<(), WindowError>;
}
