/// Native window-system backends

// Windows implementation (PostMessage key events against an HWND)
#[cfg(windows)]
pub mod windows_impl;

// Linux/X11 implementation (xdotool + wmctrl)
#[cfg(target_os = "linux")]
pub mod linux;

use std::sync::Arc;

use crate::window::WindowSystem;

/// Build the window system for the current platform.
pub fn native_window_system() -> anyhow::Result<Arc<dyn WindowSystem>> {
    #[cfg(windows)]
    {
        Ok(Arc::new(windows_impl::Win32WindowSystem::new()))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(linux::X11WindowSystem::new()))
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        anyhow::bail!("no window-system backend for this platform")
    }
}
