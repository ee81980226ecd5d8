//! Timed key gestures against the target window.
//!
//! Every gesture shares one shape: press the required keys, hold or iterate
//! for the requested time, release everything that was pressed. Holds are
//! real blocking sleeps of the calling thread; only one gesture is in
//! flight per process. Release is guaranteed on every exit path through the
//! `PressedKeys` guard.
//!
//! Parameter objects arrive as JSON from the host. Field names, units, and
//! defaults form the wire contract: the hold/run gestures take seconds as
//! floats, the sequential gesture takes milliseconds, matching the callers
//! that already exist.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SharedRuntimeConfig;
use crate::detect::FrameSource;
use crate::error::{GestureError, Result};
use crate::input::{InputSynthesizer, PressedKeys, ReleaseOrder};
use crate::keys::{direction_to_code, KeyCode, KeyIdent};
use crate::window::{WindowHandle, WindowSystem};

/// Sleep quantum for the jump sub-loop; short enough to hit jump instants
/// with little jitter, long enough not to spin.
const IDLE_QUANTUM: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Deserialize)]
pub struct LongPressParams {
    pub key: KeyIdent,
    #[serde(default = "default_hold_secs")]
    pub duration: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PressMultipleParams {
    pub keys: Vec<KeyIdent>,
    #[serde(default = "default_hold_secs")]
    pub duration: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LongPressMultipleParams {
    pub keys: Vec<KeyIdent>,
    /// Hold duration, milliseconds.
    #[serde(default = "default_hold_ms")]
    pub duration: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequentialKey {
    pub key: KeyIdent,
    /// Delay before pressing this key, milliseconds.
    #[serde(default)]
    pub delay: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequentialLongPressParams {
    pub key_sequence: Vec<SequentialKey>,
    /// Hold after the whole sequence is down, milliseconds.
    #[serde(default = "default_hold_ms")]
    pub hold_duration: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunWithShiftParams {
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_run_secs")]
    pub duration: f64,
    #[serde(default = "default_dodge_delay_secs")]
    pub dodge_delay: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunWithJumpParams {
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default = "default_jump_run_secs")]
    pub duration: f64,
    #[serde(default = "default_dodge_delay_secs")]
    pub dodge_delay: f64,
    #[serde(default = "default_jump_interval_secs")]
    pub jump_interval: f64,
    #[serde(default = "default_jump_press_secs")]
    pub jump_press_time: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetDodgeKeyParams {
    /// Virtual-key code of the dodge key. Defaults to Shift.
    #[serde(default = "default_dodge_key")]
    pub dodge_key: u16,
}

fn default_hold_secs() -> f64 {
    1.0
}

fn default_hold_ms() -> u64 {
    1000
}

fn default_direction() -> String {
    "w".to_string()
}

fn default_run_secs() -> f64 {
    2.0
}

fn default_jump_run_secs() -> f64 {
    3.0
}

fn default_dodge_delay_secs() -> f64 {
    0.05
}

fn default_jump_interval_secs() -> f64 {
    0.5
}

fn default_jump_press_secs() -> f64 {
    0.1
}

fn default_dodge_key() -> u16 {
    KeyCode::SHIFT.value()
}

/// Convert a caller-supplied seconds value into a `Duration`. Negative,
/// non-finite, and out-of-range values are all parameter errors, reported
/// before any key is touched.
fn secs(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        GestureError::invalid_params(format!(
            "{} must be a representable non-negative number of seconds, got {}",
            field, value
        ))
    })
}

/// Composes timed gestures from `InputSynthesizer` primitives.
///
/// One engine is built per invocation, after the window has been resolved;
/// the handle inside is a weak reference and a gesture that outlives its
/// window fails with `WindowNotFound` at the next post.
pub struct GestureEngine {
    synth: InputSynthesizer,
    config: SharedRuntimeConfig,
}

impl GestureEngine {
    pub fn new(
        system: Arc<dyn WindowSystem>,
        window: WindowHandle,
        config: SharedRuntimeConfig,
    ) -> Self {
        Self {
            synth: InputSynthesizer::new(system, window),
            config,
        }
    }

    fn dodge_key(&self) -> KeyCode {
        // A poisoned lock only means a writer panicked mid-set; the value
        // itself is still a plain key code.
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .dodge_key()
    }

    /// Press one key, hold it, release it.
    pub fn long_press(&self, params: &LongPressParams) -> Result<()> {
        let hold = secs(params.duration, "duration")?;
        let code = params.key.translate()?;
        info!(
            "[LongPressKey] Holding {} for {:.2}s on {}",
            code,
            params.duration,
            self.synth.window()
        );

        let mut keys = PressedKeys::new(&self.synth, ReleaseOrder::PressOrder);
        keys.press(code, true)?;
        thread::sleep(hold);
        keys.release_all(ReleaseOrder::PressOrder);

        info!("[LongPressKey] Done");
        Ok(())
    }

    /// Press several keys with no inter-key delay, hold, release in press
    /// order. Translation of the whole batch happens before the first
    /// press, so one bad identifier leaves every key untouched.
    pub fn press_multiple(&self, params: &PressMultipleParams) -> Result<()> {
        if params.keys.is_empty() {
            return Err(GestureError::invalid_params("'keys' is empty"));
        }
        let hold = secs(params.duration, "duration")?;
        let codes: Vec<KeyCode> = params
            .keys
            .iter()
            .map(|k| k.translate())
            .collect::<Result<_>>()?;
        info!(
            "[PressMultipleKeys] Holding {} keys for {:.2}s",
            codes.len(),
            params.duration
        );

        let mut keys = PressedKeys::new(&self.synth, ReleaseOrder::PressOrder);
        for (i, code) in codes.iter().enumerate() {
            keys.press(*code, i == 0)?;
        }
        thread::sleep(hold);
        keys.release_all(ReleaseOrder::PressOrder);

        info!("[PressMultipleKeys] Done");
        Ok(())
    }

    /// Millisecond-unit variant of `press_multiple`, a separate wire action
    /// for hosts that send the hold in milliseconds.
    pub fn long_press_multiple(&self, params: &LongPressMultipleParams) -> Result<()> {
        self.press_multiple(&PressMultipleParams {
            keys: params.keys.clone(),
            duration: params.duration as f64 / 1000.0,
        })
    }

    /// Press keys one by one with per-key pre-delays, hold the whole chord,
    /// then release in press order. A fault mid-sequence releases the keys
    /// pressed so far (guard backstop) before the failure is reported.
    pub fn sequential_long_press(&self, params: &SequentialLongPressParams) -> Result<()> {
        if params.key_sequence.is_empty() {
            return Err(GestureError::invalid_params("'key_sequence' is empty"));
        }
        let hold = Duration::from_millis(params.hold_duration);
        info!(
            "[SequentialLongPress] {} keys, hold {}ms",
            params.key_sequence.len(),
            params.hold_duration
        );

        let mut keys = PressedKeys::new(&self.synth, ReleaseOrder::PressOrder);
        for (i, entry) in params.key_sequence.iter().enumerate() {
            if entry.delay > 0 {
                debug!("[SequentialLongPress] Waiting {}ms", entry.delay);
                thread::sleep(Duration::from_millis(entry.delay));
            }
            let code = entry.key.translate()?;
            debug!(
                "[SequentialLongPress] Press {}/{}: {}",
                i + 1,
                params.key_sequence.len(),
                code
            );
            keys.press(code, i == 0)?;
        }

        thread::sleep(hold);
        keys.release_all(ReleaseOrder::PressOrder);

        info!("[SequentialLongPress] Done");
        Ok(())
    }

    /// Hold a direction key, then the dodge key, for the duration. The
    /// dodge key comes from the shared runtime config. Release order is
    /// dodge first, direction second: lifting the direction while the
    /// modifier is still down would change movement state in the target.
    pub fn run_with_shift(&self, params: &RunWithShiftParams) -> Result<()> {
        let hold = secs(params.duration, "duration")?;
        let delay = secs(params.dodge_delay, "dodge_delay")?;
        let direction = direction_to_code(&params.direction)?;
        let dodge = self.dodge_key();
        info!(
            "[RunWithShift] direction '{}' ({}), dodge {}, {:.2}s",
            params.direction, direction, dodge, params.duration
        );

        let mut keys = PressedKeys::new(&self.synth, ReleaseOrder::Reverse);
        keys.press(direction, true)?;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        keys.press(dodge, false)?;
        thread::sleep(hold);
        keys.release_all(ReleaseOrder::Reverse);

        info!("[RunWithShift] Done");
        Ok(())
    }

    /// Same prefix as `run_with_shift`, then a periodic jump sub-loop until
    /// the total duration elapses. Jump scheduling is drift-free relative
    /// to the last actual jump, so the cost of the press/hold itself does
    /// not accumulate. On any exit the dodge key is released before the
    /// direction key; a held jump key goes first (reverse press order).
    pub fn run_with_jump(&self, params: &RunWithJumpParams) -> Result<()> {
        let total = secs(params.duration, "duration")?;
        let delay = secs(params.dodge_delay, "dodge_delay")?;
        let interval = secs(params.jump_interval, "jump_interval")?;
        let press_time = secs(params.jump_press_time, "jump_press_time")?;
        if interval.is_zero() {
            return Err(GestureError::invalid_params("jump_interval must be > 0"));
        }
        let direction = direction_to_code(&params.direction)?;
        let dodge = self.dodge_key();
        info!(
            "[RunWithJump] direction '{}' ({}), dodge {}, {:.2}s total, jump every {:.2}s",
            params.direction, direction, dodge, params.duration, params.jump_interval
        );

        let mut keys = PressedKeys::new(&self.synth, ReleaseOrder::Reverse);
        keys.press(direction, true)?;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        keys.press(dodge, false)?;

        let start = Instant::now();
        let mut next_jump = start + interval;
        let mut jump_count = 0u32;

        while start.elapsed() < total {
            let now = Instant::now();
            if now >= next_jump {
                jump_count += 1;
                debug!(
                    "[RunWithJump] Jump {} ({}ms remaining)",
                    jump_count,
                    total.saturating_sub(start.elapsed()).as_millis()
                );
                keys.press(KeyCode::SPACE, false)?;
                thread::sleep(press_time);
                keys.release_last();
                next_jump = now + interval;
            } else {
                thread::sleep(IDLE_QUANTUM);
            }
        }

        keys.release_all(ReleaseOrder::Reverse);

        info!("[RunWithJump] Done, {} jumps", jump_count);
        Ok(())
    }
}

/// Write the dodge key into the shared runtime config, then force a fresh
/// capture so nothing downstream acts on a frame taken before the change.
pub fn set_dodge_key(
    config: &SharedRuntimeConfig,
    frames: &dyn FrameSource,
    params: &SetDodgeKeyParams,
) -> Result<()> {
    let code = KeyIdent::Code(params.dodge_key).translate()?;
    config
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .set_dodge_key(code);

    frames
        .capture_frame()
        .map_err(|e| GestureError::execution("capture_frame", e))?;
    info!("[SetDodgeKey] Dodge key set to {}, capture refreshed", code);
    Ok(())
}
