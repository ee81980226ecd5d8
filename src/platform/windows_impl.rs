//! Windows window-system backend.
//!
//! Posts WM_KEYDOWN/WM_KEYUP messages with real scan codes straight to the
//! target HWND, so the game receives input without ever holding keyboard
//! focus. Activation raises the window through the window manager rather
//! than synthesizing any input.

use anyhow::{Context, Result};
use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, WPARAM};
use windows::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, MAPVK_VK_TO_VSC};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, FindWindowW, GetWindowTextLengthW, GetWindowTextW, IsWindow, IsWindowVisible,
    PostMessageW, SetForegroundWindow, ShowWindow, SW_RESTORE, WM_KEYDOWN, WM_KEYUP,
};

use crate::keys::KeyCode;
use crate::window::{WindowHandle, WindowSystem};

pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Win32WindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn hwnd_of(handle: WindowHandle) -> HWND {
    HWND(handle.raw() as isize)
}

/// Build the key-event lParam: repeat count 1, the hardware scan code in
/// bits 16..24, and for key-up the previous-state and transition bits.
fn key_lparam(code: KeyCode, down: bool) -> LPARAM {
    let scan = unsafe { MapVirtualKeyW(u32::from(code.value()), MAPVK_VK_TO_VSC) };
    let mut bits: u32 = 1 | (scan << 16);
    if !down {
        bits |= 1 << 30 | 1 << 31;
    }
    LPARAM(bits as i32 as isize)
}

unsafe extern "system" fn collect_windows(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam.0 as *mut Vec<(WindowHandle, String)>);

    if IsWindowVisible(hwnd).as_bool() {
        let len = GetWindowTextLengthW(hwnd);
        if len > 0 {
            let mut buf = vec![0u16; len as usize + 1];
            let copied = GetWindowTextW(hwnd, &mut buf);
            if copied > 0 {
                let title = String::from_utf16_lossy(&buf[..copied as usize]);
                windows.push((WindowHandle::new(hwnd.0 as u64), title));
            }
        }
    }

    BOOL::from(true)
}

impl WindowSystem for Win32WindowSystem {
    fn find_exact(&self, title: &str) -> Option<WindowHandle> {
        let title_w = wide(title);
        let hwnd = unsafe { FindWindowW(PCWSTR::null(), PCWSTR::from_raw(title_w.as_ptr())) };
        if hwnd.0 != 0 && unsafe { IsWindow(hwnd) }.as_bool() {
            Some(WindowHandle::new(hwnd.0 as u64))
        } else {
            None
        }
    }

    fn list_windows(&self) -> Result<Vec<(WindowHandle, String)>> {
        let mut windows: Vec<(WindowHandle, String)> = Vec::new();
        unsafe {
            EnumWindows(
                Some(collect_windows),
                LPARAM(&mut windows as *mut _ as isize),
            )
        }
        .context("EnumWindows failed")?;
        debug!("[Win32WindowSystem] Found {} windows", windows.len());
        Ok(windows)
    }

    fn is_live(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindow(hwnd_of(handle)) }.as_bool()
    }

    fn post_key(&self, handle: WindowHandle, code: KeyCode, down: bool) -> Result<()> {
        let msg = if down { WM_KEYDOWN } else { WM_KEYUP };
        unsafe {
            PostMessageW(
                hwnd_of(handle),
                msg,
                WPARAM(code.value() as usize),
                key_lparam(code, down),
            )
        }
        .with_context(|| format!("PostMessageW({}) to {} failed", code, handle))?;
        Ok(())
    }

    fn activate(&self, handle: WindowHandle) -> Result<()> {
        debug!("[Win32WindowSystem] Activating {}", handle);
        let hwnd = hwnd_of(handle);
        unsafe {
            // Restore first in case the window is minimized; a minimized
            // window silently drops foreground requests.
            ShowWindow(hwnd, SW_RESTORE);
            if !SetForegroundWindow(hwnd).as_bool() {
                anyhow::bail!("SetForegroundWindow refused for {}", handle);
            }
        }
        Ok(())
    }
}
