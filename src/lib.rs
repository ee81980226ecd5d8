/*!
 * Gesture Agent Library
 *
 * Core modules for focus-free key-event synthesis against one target
 * window, timed gesture composition, and detect-or-fallback polling.
 * Screen capture, pattern recognition, and the host transport are
 * injected collaborators (see `detect` for the seams).
 */

pub mod actions;
pub mod config;
pub mod detect;
pub mod error;
pub mod gestures;
pub mod input;
pub mod keys;
pub mod platform;
pub mod window;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types
pub use actions::{ActionContext, ActionKind, ActionRequest, Dispatcher};
pub use config::{shared_runtime_config, RuntimeConfig, SharedRuntimeConfig};
pub use detect::{
    DetectionLoop, DetectionOutcome, DetectionParams, FallbackRunner, FrameSource, MatchResult,
    PatternMatcher, Region, StepOverride,
};
pub use error::{GestureError, Result};
pub use gestures::GestureEngine;
pub use input::InputSynthesizer;
pub use keys::{KeyCode, KeyIdent};
pub use window::{WindowHandle, WindowResolver, WindowSystem};
