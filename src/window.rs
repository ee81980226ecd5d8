//! Window resolution against the platform window system.
//!
//! A `WindowHandle` is a weak lookup key for an OS window that may vanish at
//! any moment; it is never owned and is revalidated before risky use.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{GestureError, Result};
use crate::keys::KeyCode;

/// Opaque platform identifier of one on-screen window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(u64);

impl WindowHandle {
    pub const fn new(raw: u64) -> Self {
        WindowHandle(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Platform window-system seam.
///
/// Implemented by the native backends under `platform/` and by test mocks.
/// Key posts are fire-and-forget: success means the message was queued, not
/// that the target application processed it.
pub trait WindowSystem: Send + Sync {
    /// Exact-title lookup. Returns only live windows.
    fn find_exact(&self, title: &str) -> Option<WindowHandle>;

    /// Enumerate visible top-level windows with their titles, in the
    /// platform's enumeration order.
    fn list_windows(&self) -> anyhow::Result<Vec<(WindowHandle, String)>>;

    /// Whether the handle still refers to a live window.
    fn is_live(&self, handle: WindowHandle) -> bool;

    /// Post a key-down or key-up message to the window.
    fn post_key(&self, handle: WindowHandle, code: KeyCode, down: bool) -> anyhow::Result<()>;

    /// Raise/focus the window without synthesizing keyboard input.
    fn activate(&self, handle: WindowHandle) -> anyhow::Result<()>;
}

/// Built-in candidate titles of the game client, covering both the CN and
/// EN localizations. Used when no list is configured.
pub fn default_window_titles() -> Vec<String> {
    vec!["二重螺旋".to_string(), "Duet Night Abyss".to_string()]
}

/// Resolves the target window from an ordered list of candidate titles.
pub struct WindowResolver;

impl WindowResolver {
    /// Exact-title pass over the candidates in order, then a substring pass
    /// over all visible windows (candidates tried in order per window,
    /// windows in enumeration order). Exact matches always win. `NotFound`
    /// is a hard failure for the invoking operation; it is not retried here.
    pub fn resolve(system: &Arc<dyn WindowSystem>, candidates: &[String]) -> Result<WindowHandle> {
        if candidates.is_empty() {
            return Err(GestureError::invalid_params(
                "window title candidate list is empty",
            ));
        }

        for title in candidates {
            if let Some(handle) = system.find_exact(title) {
                info!("[WindowResolver] Exact match '{}': {}", title, handle);
                return Ok(handle);
            }
        }

        let windows = match system.list_windows() {
            Ok(windows) => windows,
            Err(e) => {
                warn!("[WindowResolver] Window enumeration failed: {}", e);
                Vec::new()
            }
        };
        debug!("[WindowResolver] Substring pass over {} windows", windows.len());

        for (handle, title) in &windows {
            for candidate in candidates {
                if title.contains(candidate.as_str()) {
                    info!(
                        "[WindowResolver] Substring match '{}' in '{}': {}",
                        candidate, title, handle
                    );
                    return Ok(*handle);
                }
            }
        }

        warn!(
            "[WindowResolver] No window matched any of {:?} ({} windows enumerated)",
            candidates,
            windows.len()
        );
        Err(GestureError::WindowNotFound {
            candidates: candidates.to_vec(),
        })
    }
}
