//! Gesture Agent: standalone driver binary.
//!
//! Reads one JSON action request per stdin line
//! (`{"node_name": "...", "action": "LongPressKey", "params": {...}}`),
//! dispatches it, and writes `{"success": bool}` per line on stdout.
//!
//! The real host embeds the library and supplies capture/recognition
//! collaborators; this driver runs gestures against the native window
//! system and wires stubs that fail with a clear diagnostic for the
//! detection-dependent actions.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use image::RgbaImage;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gesture_agent::{
    shared_runtime_config, ActionContext, ActionRequest, Dispatcher, FallbackRunner, FrameSource,
    MatchResult, PatternMatcher, StepOverride,
};

/// Placeholder collaborators for running without an attached host.
struct UnattachedHost;

impl FrameSource for UnattachedHost {
    fn capture_frame(&self) -> Result<RgbaImage> {
        anyhow::bail!("no capture host attached; embed the library to supply one")
    }
}

impl PatternMatcher for UnattachedHost {
    fn match_pattern(&self, target: &str, _frame: &RgbaImage) -> Result<Option<MatchResult>> {
        anyhow::bail!("no recognition host attached (target '{}')", target)
    }
}

impl FallbackRunner for UnattachedHost {
    fn run(&self, name: &str) -> Result<()> {
        anyhow::bail!("no fallback host attached (action '{}')", name)
    }
}

impl StepOverride for UnattachedHost {
    fn override_next(&self, current: &str, next: &[String]) -> Result<()> {
        info!("[Driver] Step override: '{}' -> {:?}", current, next);
        Ok(())
    }
}

fn window_titles_from_env() -> Vec<String> {
    let configured: Vec<String> = std::env::var("GESTURE_AGENT_WINDOW_TITLES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if configured.is_empty() {
        gesture_agent::window::default_window_titles()
    } else {
        configured
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("[Driver] Gesture Agent starting");

    // GESTURE_AGENT_WINDOW_TITLES overrides the built-in candidate list.
    let window_titles = window_titles_from_env();
    info!("[Driver] Target window titles: {:?}", window_titles);

    let windows = gesture_agent::platform::native_window_system()
        .context("Failed to create window-system backend")?;
    let host = std::sync::Arc::new(UnattachedHost);

    let dispatcher = Dispatcher::new(ActionContext {
        windows,
        frames: host.clone(),
        matcher: host.clone(),
        fallback: host.clone(),
        steps: host,
        config: shared_runtime_config(),
        window_titles,
    });

    info!("[Driver] Ready; one JSON request per line on stdin");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }

        let success = match serde_json::from_str::<ActionRequest>(&line) {
            Ok(request) => dispatcher.dispatch(&request),
            Err(e) => {
                warn!("[Driver] Malformed request: {}", e);
                false
            }
        };

        serde_json::to_writer(&mut stdout, &serde_json::json!({ "success": success }))?;
        writeln!(stdout)?;
        stdout.flush()?;
    }

    info!("[Driver] stdin closed, exiting");
    Ok(())
}
