//! Detect-or-fallback polling loop.
//!
//! Repeatedly captures a fresh frame, runs the injected pattern matcher
//! against a named target, and on every miss runs an injected fallback
//! action, until the target is detected or the wall-clock budget runs out.
//! Capture and recognition themselves are external collaborators; this
//! module owns only the loop's timing and state machine.

use std::time::{Duration, Instant};

use image::RgbaImage;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{GestureError, Result};

/// Bounding region reported by the pattern matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// Result of one recognition attempt.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub present: bool,
    pub region: Option<Region>,
    pub algorithm: String,
}

impl MatchResult {
    /// A match counts only with a non-empty bounding region. A present but
    /// zero-area result and an absent result are the same miss.
    pub fn is_hit(&self) -> bool {
        self.present && self.region.map_or(false, |r| r.w > 0 && r.h > 0)
    }
}

/// Supplies the most recent screen/window capture; may block until the
/// capture completes.
pub trait FrameSource: Send + Sync {
    fn capture_frame(&self) -> anyhow::Result<RgbaImage>;
}

/// Runs a named pattern-recognition routine against a frame.
pub trait PatternMatcher: Send + Sync {
    fn match_pattern(&self, target: &str, frame: &RgbaImage) -> anyhow::Result<Option<MatchResult>>;
}

/// Executes a named simple action between polls; may fail.
pub trait FallbackRunner: Send + Sync {
    fn run(&self, name: &str) -> anyhow::Result<()>;
}

/// Informs the caller's execution graph which step to run after the current
/// one, overriding any statically configured default.
pub trait StepOverride: Send + Sync {
    fn override_next(&self, current: &str, next: &[String]) -> anyhow::Result<()>;
}

/// Parameters of one detection task. Intervals are milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionParams {
    #[serde(default = "default_target_node")]
    pub target_node: String,
    #[serde(default = "default_interrupt_node")]
    pub interrupt_node: String,
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    #[serde(default = "default_total_timeout")]
    pub total_timeout: u64,
}

fn default_target_node() -> String {
    "again_for_win".to_string()
}

fn default_interrupt_node() -> String {
    "autoBattle_for_win".to_string()
}

fn default_check_interval() -> u64 {
    5000
}

fn default_total_timeout() -> u64 {
    180_000
}

impl DetectionParams {
    fn validate(&self) -> Result<()> {
        if self.target_node.is_empty() {
            return Err(GestureError::invalid_params("target_node is empty"));
        }
        if self.check_interval == 0 {
            return Err(GestureError::invalid_params("check_interval must be > 0"));
        }
        Ok(())
    }
}

/// Terminal outcome of a detection task.
#[derive(Debug, Clone)]
pub enum DetectionOutcome {
    Detected {
        target: String,
        region: Region,
        algorithm: String,
        loops: u32,
        elapsed: Duration,
    },
    TimedOut {
        loops: u32,
        elapsed: Duration,
    },
}

impl DetectionOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, DetectionOutcome::Detected { .. })
    }
}

/// The polling controller. States are Polling -> Detected | Timeout; the
/// loop has no iteration bound other than the wall-clock budget.
pub struct DetectionLoop<'a> {
    frames: &'a dyn FrameSource,
    matcher: &'a dyn PatternMatcher,
    fallback: &'a dyn FallbackRunner,
    steps: &'a dyn StepOverride,
}

impl<'a> DetectionLoop<'a> {
    pub fn new(
        frames: &'a dyn FrameSource,
        matcher: &'a dyn PatternMatcher,
        fallback: &'a dyn FallbackRunner,
        steps: &'a dyn StepOverride,
    ) -> Self {
        Self {
            frames,
            matcher,
            fallback,
            steps,
        }
    }

    /// Run the loop to a terminal state. `current_node` names the step the
    /// caller is executing, so a detection can redirect its successor.
    ///
    /// The loop counter counts match attempts. A miss runs the fallback
    /// best-effort (its errors are logged and swallowed) and then sleeps the
    /// poll interval; a capture or recognition fault ends the task.
    pub fn run(&self, current_node: &str, params: &DetectionParams) -> Result<DetectionOutcome> {
        params.validate()?;

        info!(
            "[DetectionLoop] Polling for '{}' (interval {}ms, budget {}ms, fallback '{}')",
            params.target_node, params.check_interval, params.total_timeout, params.interrupt_node
        );

        let start = Instant::now();
        let poll = Duration::from_millis(params.check_interval);
        let budget = Duration::from_millis(params.total_timeout);
        let mut loops: u32 = 0;

        loop {
            let elapsed = start.elapsed();
            if elapsed >= budget {
                warn!(
                    "[DetectionLoop] Timeout after {}ms, {} attempts",
                    elapsed.as_millis(),
                    loops
                );
                return Ok(DetectionOutcome::TimedOut { loops, elapsed });
            }

            loops += 1;
            debug!(
                "[DetectionLoop] Attempt {} for '{}' ({}ms / {}ms)",
                loops,
                params.target_node,
                elapsed.as_millis(),
                params.total_timeout
            );

            let frame = self
                .frames
                .capture_frame()
                .map_err(|e| GestureError::execution("capture_frame", e))?;
            let result = self
                .matcher
                .match_pattern(&params.target_node, &frame)
                .map_err(|e| GestureError::execution("match_pattern", e))?;

            match result {
                Some(hit) if hit.is_hit() => {
                    let region = hit.region.unwrap_or(Region { x: 0, y: 0, w: 0, h: 0 });
                    info!(
                        "[DetectionLoop] Detected '{}' at x={} y={} w={} h={} (algorithm {}, {} attempts)",
                        params.target_node, region.x, region.y, region.w, region.h,
                        hit.algorithm, loops
                    );
                    self.steps
                        .override_next(current_node, &[params.target_node.clone()])
                        .map_err(|e| GestureError::execution("override_next", e))?;
                    return Ok(DetectionOutcome::Detected {
                        target: params.target_node.clone(),
                        region,
                        algorithm: hit.algorithm,
                        loops,
                        elapsed: start.elapsed(),
                    });
                }
                other => {
                    match &other {
                        None => debug!(
                            "[DetectionLoop] '{}' not detected (no result)",
                            params.target_node
                        ),
                        Some(miss) => debug!(
                            "[DetectionLoop] '{}' not detected (present={}, region={:?})",
                            params.target_node, miss.present, miss.region
                        ),
                    }

                    if let Err(e) = self.fallback.run(&params.interrupt_node) {
                        warn!(
                            "[DetectionLoop] Fallback '{}' failed: {}",
                            params.interrupt_node, e
                        );
                    }

                    std::thread::sleep(poll);
                }
            }
        }
    }
}
