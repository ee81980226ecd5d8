//! Linux/X11 window-system backend.
//!
//! Drives `wmctrl` for window enumeration and `xdotool` for key events and
//! activation. Key posts go to a specific window id, so the target never
//! needs input focus. Virtual-key codes are mapped to X11 keysyms at the
//! point of injection.

use std::process::Command;

use anyhow::{Context, Result};
use tracing::debug;

use crate::keys::KeyCode;
use crate::window::{WindowHandle, WindowSystem};

pub struct X11WindowSystem;

impl X11WindowSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for X11WindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a virtual-key code to the X11 keysym xdotool expects.
fn keysym_for(code: KeyCode) -> Result<String> {
    let sym = match code.value() {
        0x10 => "Shift_L".to_string(),
        0x11 => "Control_L".to_string(),
        0x12 => "Alt_L".to_string(),
        0x20 => "space".to_string(),
        0x25 => "Left".to_string(),
        0x26 => "Up".to_string(),
        0x27 => "Right".to_string(),
        0x28 => "Down".to_string(),
        v @ 0x30..=0x39 => char::from(v as u8).to_string(),
        v @ 0x41..=0x5A => char::from(v as u8).to_ascii_lowercase().to_string(),
        other => anyhow::bail!("no X11 keysym for VK=0x{:02X}", other),
    };
    Ok(sym)
}

/// Run a tool and return stdout; non-zero exit is an error with stderr.
fn run_tool(tool: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute {}", tool))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{} {} failed: {}", tool, args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl WindowSystem for X11WindowSystem {
    fn find_exact(&self, title: &str) -> Option<WindowHandle> {
        let windows = self.list_windows().ok()?;
        windows
            .into_iter()
            .find(|(_, t)| t == title)
            .map(|(handle, _)| handle)
    }

    fn list_windows(&self) -> Result<Vec<(WindowHandle, String)>> {
        let stdout = run_tool("wmctrl", &["-l"])?;

        // Format: "0x04600003  0 hostname Window Title Here"
        let windows: Vec<(WindowHandle, String)> = stdout
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() > 3 {
                    let raw = parts[0].strip_prefix("0x")?;
                    let id = u64::from_str_radix(raw, 16).ok()?;
                    Some((WindowHandle::new(id), parts[3..].join(" ")))
                } else {
                    None
                }
            })
            .filter(|(_, title)| !title.is_empty())
            .collect();

        debug!("[X11WindowSystem] Found {} windows", windows.len());
        Ok(windows)
    }

    fn is_live(&self, handle: WindowHandle) -> bool {
        run_tool("xdotool", &["getwindowname", &handle.raw().to_string()]).is_ok()
    }

    fn post_key(&self, handle: WindowHandle, code: KeyCode, down: bool) -> Result<()> {
        let sym = keysym_for(code)?;
        let verb = if down { "keydown" } else { "keyup" };
        let id = handle.raw().to_string();
        run_tool(
            "xdotool",
            &[verb, "--window", &id, "--clearmodifiers", &sym],
        )?;
        Ok(())
    }

    fn activate(&self, handle: WindowHandle) -> Result<()> {
        debug!("[X11WindowSystem] Activating {}", handle);
        run_tool("xdotool", &["windowactivate", &handle.raw().to_string()])?;
        Ok(())
    }
}
