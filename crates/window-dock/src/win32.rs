//! Win32 implementation of the window seam.

use std::ffi::c_void;
use tracing::trace;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
use windows::Win32::Graphics::Gdi::{
    InvalidateRect, RedrawWindow, UpdateWindow, HRGN, RDW_ALLCHILDREN, RDW_INVALIDATE,
    RDW_UPDATENOW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetAncestor, GetDesktopWindow, GetWindowLongW, GetWindowTextW, IsWindow,
    IsWindowVisible, MoveWindow, SetParent, SetWindowLongW, SetWindowPos, ShowWindow, GA_PARENT,
    GWL_STYLE, HWND_TOP, SWP_FRAMECHANGED, SWP_SHOWWINDOW, SW_SHOW,
};

use crate::desktop::{Rect, WindowError, WindowId, WindowStyle, WindowSystem};

const TITLE_CAPACITY: usize = 512;

fn hwnd(window: WindowId) -> HWND {
    HWND(window.raw() as *mut c_void)
}

fn window_id(hwnd: HWND) -> WindowId {
    WindowId(hwnd.0 as isize)
}

unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam is the `Vec` borrowed by `top_level_windows` for the
    // duration of the EnumWindows call.
    let windows = &mut *(lparam.0 as *mut Vec<WindowId>);
    windows.push(window_id(hwnd));
    BOOL::from(true)
}

/// The interactive Windows desktop
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Desktop;

impl Win32Desktop {
    pub fn new() -> Self {
        Self
    }

    fn checked(&self, window: WindowId) -> Result<HWND, WindowError> {
        if self.is_window(window) {
            Ok(hwnd(window))
        } else {
            Err(WindowError::InvalidHandle(window))
        }
    }
}

impl WindowSystem for Win32Desktop {
    fn top_level_windows(&self) -> Result<Vec<WindowId>, WindowError> {
        let mut windows: Vec<WindowId> = Vec::new();
        // SAFETY: the callback only touches `windows`, which outlives the call.
        unsafe {
            EnumWindows(
                Some(collect_window),
                LPARAM(&mut windows as *mut Vec<WindowId> as isize),
            )
        }
        .map_err(|e| WindowError::api("EnumWindows", e.to_string()))?;

        trace!("Enumerated {} top-level windows", windows.len());
        Ok(windows)
    }

    fn is_window(&self, window: WindowId) -> bool {
        // SAFETY: IsWindow accepts any handle value.
        !window.is_null() && unsafe { IsWindow(hwnd(window)) }.as_bool()
    }

    fn is_visible(&self, window: WindowId) -> bool {
        // SAFETY: IsWindowVisible accepts any handle value.
        unsafe { IsWindowVisible(hwnd(window)) }.as_bool()
    }

    fn title(&self, window: WindowId) -> Result<String, WindowError> {
        let handle = self.checked(window)?;
        let mut buffer = [0u16; TITLE_CAPACITY];
        // SAFETY: the buffer length is passed along with the pointer.
        let len = unsafe { GetWindowTextW(handle, &mut buffer) };
        Ok(String::from_utf16_lossy(&buffer[..len.max(0) as usize]))
    }

    fn style(&self, window: WindowId) -> Result<WindowStyle, WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: handle was validated above; a stale handle yields 0.
        let bits = unsafe { GetWindowLongW(handle, GWL_STYLE) };
        if bits == 0 && !self.is_window(window) {
            return Err(WindowError::InvalidHandle(window));
        }
        Ok(WindowStyle(bits as u32))
    }

    fn set_style(&self, window: WindowId, style: WindowStyle) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: GWL_STYLE is a valid index for every window class.
        unsafe { SetWindowLongW(handle, GWL_STYLE, style.bits() as i32) };
        Ok(())
    }

    fn parent(&self, window: WindowId) -> Option<WindowId> {
        if !self.is_window(window) {
            return None;
        }
        // SAFETY: both calls accept any handle and return null on failure.
        let (parent, desktop) = unsafe { (GetAncestor(hwnd(window), GA_PARENT), GetDesktopWindow()) };
        if parent.0.is_null() || parent == desktop {
            None
        } else {
            Some(window_id(parent))
        }
    }

    fn set_parent(&self, window: WindowId, parent: Option<WindowId>) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        let new_parent = parent.map(hwnd).unwrap_or_default();
        // SAFETY: a null parent returns the window to the desktop.
        match unsafe { SetParent(handle, new_parent) } {
            Ok(_) => Ok(()),
            // A null previous parent is reported as failure even when the call succeeded
            Err(_) if self.parent(window) == parent => Ok(()),
            Err(e) => Err(WindowError::api("SetParent", e.to_string())),
        }
    }

    fn move_window(&self, window: WindowId, rect: Rect) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: plain geometry call on a validated handle.
        unsafe { MoveWindow(handle, rect.x, rect.y, rect.width, rect.height, BOOL::from(true)) }
            .map_err(|e| WindowError::api("MoveWindow", e.to_string()))
    }

    fn show(&self, window: WindowId) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: the return value is the previous visibility, not an error.
        let _ = unsafe { ShowWindow(handle, SW_SHOW) };
        Ok(())
    }

    fn update(&self, window: WindowId) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: validated handle.
        if unsafe { UpdateWindow(handle) }.as_bool() {
            Ok(())
        } else {
            Err(WindowError::api("UpdateWindow", format!("window {}", window)))
        }
    }

    fn invalidate(&self, window: WindowId) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: a null rect invalidates the whole client area.
        if unsafe { InvalidateRect(handle, None, BOOL::from(true)) }.as_bool() {
            Ok(())
        } else {
            Err(WindowError::api("InvalidateRect", format!("window {}", window)))
        }
    }

    fn redraw(&self, window: WindowId) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: null rect and region redraw the whole window.
        let ok = unsafe {
            RedrawWindow(
                handle,
                None,
                HRGN::default(),
                RDW_INVALIDATE | RDW_UPDATENOW | RDW_ALLCHILDREN,
            )
        };
        if ok.as_bool() {
            Ok(())
        } else {
            Err(WindowError::api("RedrawWindow", format!("window {}", window)))
        }
    }

    fn set_position(&self, window: WindowId, rect: Rect) -> Result<(), WindowError> {
        let handle = self.checked(window)?;
        // SAFETY: validated handle, HWND_TOP is a documented sentinel.
        unsafe {
            SetWindowPos(
                handle,
                HWND_TOP,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                SWP_SHOWWINDOW | SWP_FRAMECHANGED,
            )
        }
        .map_err(|e| WindowError::api("SetWindowPos", e.to_string()))
    }
}
