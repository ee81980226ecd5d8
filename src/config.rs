//! Process-wide runtime configuration shared across gesture operations.
//!
//! One owned instance is built at startup and injected everywhere a gesture
//! needs it; there is no ambient/global lookup, so tests can hand each case
//! a fresh copy. Execution is single-flight by design, but the lock keeps
//! multi-threaded embedders safe without an API change.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::keys::KeyCode;

/// Mutable runtime settings. Currently just the dodge key.
#[derive(Debug, Default)]
pub struct RuntimeConfig {
    dodge_key: Option<KeyCode>,
}

impl RuntimeConfig {
    /// Configured dodge key, or the platform Shift default if unset.
    pub fn dodge_key(&self) -> KeyCode {
        self.dodge_key.unwrap_or(KeyCode::SHIFT)
    }

    pub fn set_dodge_key(&mut self, code: KeyCode) {
        info!("[RuntimeConfig] Dodge key set to {}", code);
        self.dodge_key = Some(code);
    }
}

/// Shared handle to the runtime configuration.
pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

pub fn shared_runtime_config() -> SharedRuntimeConfig {
    Arc::new(RwLock::new(RuntimeConfig::default()))
}
