//! Recording and scripted collaborator mocks shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use image::RgbaImage;

use crate::detect::{FallbackRunner, FrameSource, MatchResult, PatternMatcher, StepOverride};
use crate::keys::KeyCode;
use crate::window::{WindowHandle, WindowSystem};

/// One recorded key post.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub down: bool,
    pub at: Instant,
}

#[derive(Default)]
struct WindowSystemState {
    events: Vec<KeyEvent>,
    activations: usize,
    // Remaining successful posts before the backend starts failing.
    posts_before_failure: Option<usize>,
    // Same, but only key-down posts fail; key-ups keep working so release
    // paths can be observed after an injected press fault.
    downs_before_failure: Option<usize>,
    dead: Vec<WindowHandle>,
}

/// In-memory window system that records every call.
pub struct RecordingWindowSystem {
    windows: Vec<(WindowHandle, String)>,
    state: Mutex<WindowSystemState>,
}

impl RecordingWindowSystem {
    pub fn with_windows(windows: Vec<(WindowHandle, String)>) -> Self {
        Self {
            windows,
            state: Mutex::new(WindowSystemState::default()),
        }
    }

    /// Let `count` posts succeed, then fail every later post.
    pub fn fail_posts_after(&self, count: usize) {
        self.state.lock().unwrap().posts_before_failure = Some(count);
    }

    /// Let `count` key-down posts succeed, then fail later key-downs while
    /// key-ups continue to work.
    pub fn fail_downs_after(&self, count: usize) {
        self.state.lock().unwrap().downs_before_failure = Some(count);
    }

    pub fn kill_window(&self, handle: WindowHandle) {
        self.state.lock().unwrap().dead.push(handle);
    }

    pub fn activations(&self) -> usize {
        self.state.lock().unwrap().activations
    }

    pub fn key_events(&self) -> Vec<KeyEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn key_events_down(&self) -> Vec<KeyCode> {
        self.key_events()
            .into_iter()
            .filter(|e| e.down)
            .map(|e| e.code)
            .collect()
    }

    pub fn key_events_up(&self) -> Vec<KeyCode> {
        self.key_events()
            .into_iter()
            .filter(|e| !e.down)
            .map(|e| e.code)
            .collect()
    }
}

impl WindowSystem for RecordingWindowSystem {
    fn find_exact(&self, title: &str) -> Option<WindowHandle> {
        let dead = self.state.lock().unwrap().dead.clone();
        self.windows
            .iter()
            .find(|(handle, t)| t == title && !dead.contains(handle))
            .map(|(handle, _)| *handle)
    }

    fn list_windows(&self) -> anyhow::Result<Vec<(WindowHandle, String)>> {
        Ok(self.windows.clone())
    }

    fn is_live(&self, handle: WindowHandle) -> bool {
        !self.state.lock().unwrap().dead.contains(&handle)
    }

    fn post_key(&self, _handle: WindowHandle, code: KeyCode, down: bool) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.posts_before_failure.as_mut() {
            if *remaining == 0 {
                anyhow::bail!("scripted post failure");
            }
            *remaining -= 1;
        }
        if down {
            if let Some(remaining) = state.downs_before_failure.as_mut() {
                if *remaining == 0 {
                    anyhow::bail!("scripted key-down failure");
                }
                *remaining -= 1;
            }
        }
        state.events.push(KeyEvent {
            code,
            down,
            at: Instant::now(),
        });
        Ok(())
    }

    fn activate(&self, _handle: WindowHandle) -> anyhow::Result<()> {
        self.state.lock().unwrap().activations += 1;
        Ok(())
    }
}

/// Frame source that counts captures.
#[derive(Default)]
pub struct CountingFrameSource {
    captures: Mutex<usize>,
    fail: Mutex<bool>,
}

impl CountingFrameSource {
    pub fn captures(&self) -> usize {
        *self.captures.lock().unwrap()
    }

    pub fn fail_next(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

impl FrameSource for CountingFrameSource {
    fn capture_frame(&self) -> anyhow::Result<RgbaImage> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("scripted capture failure");
        }
        *self.captures.lock().unwrap() += 1;
        Ok(RgbaImage::new(4, 4))
    }
}

/// Matcher that replays a scripted sequence of results, then keeps
/// returning the last entry (or a miss if the script was empty).
pub struct ScriptedMatcher {
    script: Mutex<VecDeque<Option<MatchResult>>>,
    last: Mutex<Option<MatchResult>>,
    attempts: Mutex<usize>,
}

impl ScriptedMatcher {
    pub fn new(script: Vec<Option<MatchResult>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            attempts: Mutex::new(0),
        }
    }

    pub fn always_miss() -> Self {
        Self::new(Vec::new())
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl PatternMatcher for ScriptedMatcher {
    fn match_pattern(&self, _target: &str, _frame: &RgbaImage) -> anyhow::Result<Option<MatchResult>> {
        *self.attempts.lock().unwrap() += 1;
        let mut script = self.script.lock().unwrap();
        if let Some(next) = script.pop_front() {
            *self.last.lock().unwrap() = next.clone();
            Ok(next)
        } else {
            Ok(self.last.lock().unwrap().clone())
        }
    }
}

/// Fallback runner that counts invocations and can be made to fail.
#[derive(Default)]
pub struct CountingFallback {
    runs: Mutex<Vec<String>>,
    fail: Mutex<bool>,
}

impl CountingFallback {
    pub fn failing() -> Self {
        let fallback = Self::default();
        *fallback.fail.lock().unwrap() = true;
        fallback
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

impl FallbackRunner for CountingFallback {
    fn run(&self, name: &str) -> anyhow::Result<()> {
        self.runs.lock().unwrap().push(name.to_string());
        if *self.fail.lock().unwrap() {
            anyhow::bail!("scripted fallback failure");
        }
        Ok(())
    }
}

/// Step override that records what it was told.
#[derive(Default)]
pub struct RecordingStepOverride {
    overrides: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingStepOverride {
    pub fn overrides(&self) -> Vec<(String, Vec<String>)> {
        self.overrides.lock().unwrap().clone()
    }
}

impl StepOverride for RecordingStepOverride {
    fn override_next(&self, current: &str, next: &[String]) -> anyhow::Result<()> {
        self.overrides
            .lock()
            .unwrap()
            .push((current.to_string(), next.to_vec()));
        Ok(())
    }
}
