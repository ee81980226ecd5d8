//! Key-event synthesis against one resolved window handle.
//!
//! All posts are fire-and-forget: nothing blocks on the target application
//! processing the message. The gesture engine's own sleeps are the only
//! synchronization. `PressedKeys` keeps the ordered record of keys pressed
//! but not yet released, and its `Drop` releases whatever is left so every
//! exit path, including unwinding, lifts the keys again.

use std::cell::Cell;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GestureError, Result};
use crate::keys::KeyCode;
use crate::window::{WindowHandle, WindowSystem};

/// Posts key-down/key-up events to a specific window.
pub struct InputSynthesizer {
    system: Arc<dyn WindowSystem>,
    window: WindowHandle,
    activated: Cell<bool>,
}

impl InputSynthesizer {
    pub fn new(system: Arc<dyn WindowSystem>, window: WindowHandle) -> Self {
        Self {
            system,
            window,
            activated: Cell::new(false),
        }
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    /// Post a key-down message. When `activate` is set and the window has
    /// not been activated by this synthesizer yet, raise it first -- once
    /// per gesture is enough, and re-activating during a hold can reset the
    /// target's input timing.
    pub fn key_down(&self, code: KeyCode, activate: bool) -> Result<()> {
        if activate && !self.activated.get() {
            // Best effort: a window that refuses activation still accepts
            // posted messages.
            if let Err(e) = self.system.activate(self.window) {
                warn!("[InputSynthesizer] Activation of {} failed: {}", self.window, e);
            }
            self.activated.set(true);
        }

        debug!("[InputSynthesizer] key_down {} -> {}", code, self.window);
        self.system
            .post_key(self.window, code, true)
            .map_err(|e| self.classify_post_failure("key_down", e))
    }

    /// Post a key-up message. Posting key-up for a key that is not logically
    /// down is a no-op from the window's perspective, not an error here.
    pub fn key_up(&self, code: KeyCode) -> Result<()> {
        debug!("[InputSynthesizer] key_up {} -> {}", code, self.window);
        self.system
            .post_key(self.window, code, false)
            .map_err(|e| self.classify_post_failure("key_up", e))
    }

    /// The handle is a weak reference; on a failed post, check whether the
    /// window died underneath us before blaming the message itself.
    fn classify_post_failure(&self, step: &'static str, source: anyhow::Error) -> GestureError {
        if !self.system.is_live(self.window) {
            warn!(
                "[InputSynthesizer] Window {} is gone (failed during {})",
                self.window, step
            );
            GestureError::WindowNotFound {
                candidates: vec![format!("{}", self.window)],
            }
        } else {
            GestureError::execution(step, source)
        }
    }
}

/// Release ordering for a batch of held keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOrder {
    /// Release in the order the keys were pressed.
    PressOrder,
    /// Release in reverse press order (modifier lifted before direction).
    Reverse,
}

/// Ordered record of pressed-but-unreleased keys.
///
/// Gestures press through this guard and release explicitly on their normal
/// path; the `Drop` backstop covers every abnormal exit. Release failures
/// are logged and swallowed -- a stuck post must not mask the original
/// fault, and lifting the remaining keys matters more.
pub struct PressedKeys<'a> {
    synth: &'a InputSynthesizer,
    keys: Vec<KeyCode>,
    drop_order: ReleaseOrder,
}

impl<'a> PressedKeys<'a> {
    pub fn new(synth: &'a InputSynthesizer, drop_order: ReleaseOrder) -> Self {
        Self {
            synth,
            keys: Vec::new(),
            drop_order,
        }
    }

    /// Press a key and record it. The record is only extended when the post
    /// succeeded, so the release balance matches actual presses.
    pub fn press(&mut self, code: KeyCode, activate: bool) -> Result<()> {
        self.synth.key_down(code, activate)?;
        self.keys.push(code);
        Ok(())
    }

    /// Release the most recently pressed key (used for the periodic jump
    /// press inside a longer hold).
    pub fn release_last(&mut self) {
        if let Some(code) = self.keys.pop() {
            if let Err(e) = self.synth.key_up(code) {
                warn!("[PressedKeys] Release of {} failed: {}", code, e);
            }
        }
    }

    pub fn held(&self) -> usize {
        self.keys.len()
    }

    /// Release every held key in the given order. Best effort per key.
    pub fn release_all(&mut self, order: ReleaseOrder) {
        let drained: Vec<KeyCode> = match order {
            ReleaseOrder::PressOrder => self.keys.drain(..).collect(),
            ReleaseOrder::Reverse => self.keys.drain(..).rev().collect(),
        };
        for code in drained {
            if let Err(e) = self.synth.key_up(code) {
                warn!("[PressedKeys] Release of {} failed: {}", code, e);
            }
        }
    }
}

impl Drop for PressedKeys<'_> {
    fn drop(&mut self) {
        if !self.keys.is_empty() {
            warn!(
                "[PressedKeys] {} key(s) still held on scope exit, releasing",
                self.keys.len()
            );
            self.release_all(self.drop_order);
        }
    }
}
