//! Named action registry and the host-facing dispatch boundary.
//!
//! The host invokes operations by wire name with a JSON parameter object
//! (either a JSON object or a JSON-encoded string of one). Every failure is
//! recovered here into the boolean result the host expects, with a
//! diagnostic record naming the invocation, the action, and the failing
//! step. Nothing below this boundary panics past it.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SharedRuntimeConfig;
use crate::detect::{
    DetectionLoop, DetectionOutcome, DetectionParams, FallbackRunner, FrameSource, PatternMatcher,
    StepOverride,
};
use crate::error::{GestureError, Result};
use crate::gestures::{
    set_dodge_key, GestureEngine, LongPressMultipleParams, LongPressParams, PressMultipleParams,
    RunWithJumpParams, RunWithShiftParams, SequentialLongPressParams, SetDodgeKeyParams,
};
use crate::window::{WindowResolver, WindowSystem};

/// Closed set of operations selectable by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    LongPressKey,
    PressMultipleKeys,
    LongPressMultipleKeys,
    SequentialLongPress,
    RunWithShift,
    RunWithJump,
    SetDodgeKey,
    LongPressWithTimeoutDetection,
}

impl ActionKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LongPressKey" => Some(Self::LongPressKey),
            "PressMultipleKeys" => Some(Self::PressMultipleKeys),
            "LongPressMultipleKeys" => Some(Self::LongPressMultipleKeys),
            "SequentialLongPress" => Some(Self::SequentialLongPress),
            "RunWithShift" => Some(Self::RunWithShift),
            "RunWithJump" => Some(Self::RunWithJump),
            "SetDodgeKey" => Some(Self::SetDodgeKey),
            "LongPressWithTimeoutDetection" => Some(Self::LongPressWithTimeoutDetection),
            _ => None,
        }
    }
}

/// Everything an action needs, injected once at startup. Collaborators for
/// capture, recognition, fallback, and step override are host-provided.
pub struct ActionContext {
    pub windows: Arc<dyn WindowSystem>,
    pub frames: Arc<dyn FrameSource>,
    pub matcher: Arc<dyn PatternMatcher>,
    pub fallback: Arc<dyn FallbackRunner>,
    pub steps: Arc<dyn StepOverride>,
    pub config: SharedRuntimeConfig,
    /// Ordered candidate titles of the target window.
    pub window_titles: Vec<String>,
}

/// One host request: which step is executing, which action to run, and the
/// action's parameter object.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    #[serde(default)]
    pub node_name: String,
    pub action: String,
    #[serde(default)]
    pub params: Value,
    /// Per-request override of the target window title candidates; absent
    /// means the context's configured list.
    #[serde(default)]
    pub window_titles: Option<Vec<String>>,
}

/// Parse a parameter object, accepting a JSON object directly, a
/// JSON-encoded string of one (hosts send both), or nothing (defaults).
fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T> {
    let object = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::String(encoded) => serde_json::from_str(encoded).map_err(|e| {
            GestureError::invalid_params(format!("parameter string is not valid JSON: {}", e))
        })?,
        Value::Object(_) => params.clone(),
        other => {
            return Err(GestureError::invalid_params(format!(
                "parameters must be a JSON object, got {}",
                type_name(other)
            )))
        }
    };
    serde_json::from_value(object)
        .map_err(|e| GestureError::invalid_params(format!("bad parameter shape: {}", e)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Dispatches named actions and recovers every failure into the boolean
/// the host contract requires.
pub struct Dispatcher {
    ctx: ActionContext,
}

impl Dispatcher {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    /// Run one request to completion. Returns the success flag; the
    /// distinct timeout outcome of the detection loop also reports `false`,
    /// but is logged as a timeout rather than a fault.
    pub fn dispatch(&self, request: &ActionRequest) -> bool {
        let invocation = Uuid::new_v4();
        info!(
            "[Dispatcher] {} action '{}' (node '{}')",
            invocation, request.action, request.node_name
        );

        match self.execute(request) {
            Ok(success) => {
                info!(
                    "[Dispatcher] {} '{}' finished: success={}",
                    invocation, request.action, success
                );
                success
            }
            Err(e) => {
                error!(
                    "[Dispatcher] {} '{}' failed: {:#}",
                    invocation,
                    request.action,
                    anyhow::Error::from(e)
                );
                false
            }
        }
    }

    fn execute(&self, request: &ActionRequest) -> Result<bool> {
        let kind = ActionKind::from_name(&request.action).ok_or_else(|| {
            GestureError::invalid_params(format!("unknown action '{}'", request.action))
        })?;

        match kind {
            ActionKind::LongPressKey => {
                let params: LongPressParams = parse_params(&request.params)?;
                self.gesture_engine(request)?.long_press(&params)?;
                Ok(true)
            }
            ActionKind::PressMultipleKeys => {
                let params: PressMultipleParams = parse_params(&request.params)?;
                self.gesture_engine(request)?.press_multiple(&params)?;
                Ok(true)
            }
            ActionKind::LongPressMultipleKeys => {
                let params: LongPressMultipleParams = parse_params(&request.params)?;
                self.gesture_engine(request)?.long_press_multiple(&params)?;
                Ok(true)
            }
            ActionKind::SequentialLongPress => {
                let params: SequentialLongPressParams = parse_params(&request.params)?;
                self.gesture_engine(request)?.sequential_long_press(&params)?;
                Ok(true)
            }
            ActionKind::RunWithShift => {
                let params: RunWithShiftParams = parse_params(&request.params)?;
                self.gesture_engine(request)?.run_with_shift(&params)?;
                Ok(true)
            }
            ActionKind::RunWithJump => {
                let params: RunWithJumpParams = parse_params(&request.params)?;
                self.gesture_engine(request)?.run_with_jump(&params)?;
                Ok(true)
            }
            ActionKind::SetDodgeKey => {
                let params: SetDodgeKeyParams = parse_params(&request.params)?;
                set_dodge_key(&self.ctx.config, self.ctx.frames.as_ref(), &params)?;
                Ok(true)
            }
            ActionKind::LongPressWithTimeoutDetection => {
                let params: DetectionParams = parse_params(&request.params)?;
                let controller = DetectionLoop::new(
                    self.ctx.frames.as_ref(),
                    self.ctx.matcher.as_ref(),
                    self.ctx.fallback.as_ref(),
                    self.ctx.steps.as_ref(),
                );
                match controller.run(&request.node_name, &params)? {
                    DetectionOutcome::Detected { .. } => Ok(true),
                    DetectionOutcome::TimedOut { loops, elapsed } => {
                        warn!(
                            "[Dispatcher] Detection timed out after {} attempts / {}ms",
                            loops,
                            elapsed.as_millis()
                        );
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Resolve the target window and build a per-invocation engine. The
    /// window is looked up fresh every time; it may have closed since the
    /// last gesture. A title list on the request takes precedence over the
    /// context's configured candidates.
    fn gesture_engine(&self, request: &ActionRequest) -> Result<GestureEngine> {
        let titles = request
            .window_titles
            .as_deref()
            .unwrap_or(&self.ctx.window_titles);
        let handle = WindowResolver::resolve(&self.ctx.windows, titles)?;
        Ok(GestureEngine::new(
            self.ctx.windows.clone(),
            handle,
            self.ctx.config.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::shared_runtime_config;
    use crate::detect::{MatchResult, Region};
    use crate::keys::KeyCode;
    use crate::testing::{
        CountingFallback, CountingFrameSource, RecordingStepOverride, RecordingWindowSystem,
        ScriptedMatcher,
    };
    use crate::window::WindowHandle;
    use serde_json::json;

    struct Fixture {
        system: Arc<RecordingWindowSystem>,
        frames: Arc<CountingFrameSource>,
        fallback: Arc<CountingFallback>,
        steps: Arc<RecordingStepOverride>,
        dispatcher: Dispatcher,
    }

    fn fixture_with_matcher(matcher: ScriptedMatcher) -> Fixture {
        let system = Arc::new(RecordingWindowSystem::with_windows(vec![(
            WindowHandle::new(9),
            "Duet Night Abyss".to_string(),
        )]));
        let frames = Arc::new(CountingFrameSource::default());
        let fallback = Arc::new(CountingFallback::default());
        let steps = Arc::new(RecordingStepOverride::default());
        let dispatcher = Dispatcher::new(ActionContext {
            windows: system.clone(),
            frames: frames.clone(),
            matcher: Arc::new(matcher),
            fallback: fallback.clone(),
            steps: steps.clone(),
            config: shared_runtime_config(),
            window_titles: vec!["Duet Night Abyss".to_string()],
        });
        Fixture {
            system,
            frames,
            fallback,
            steps,
            dispatcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_matcher(ScriptedMatcher::always_miss())
    }

    fn request(action: &str, params: Value) -> ActionRequest {
        ActionRequest {
            node_name: "node".to_string(),
            action: action.to_string(),
            params,
            window_titles: None,
        }
    }

    #[test]
    fn test_unknown_action_reports_failure() {
        let f = fixture();
        assert!(!f.dispatcher.dispatch(&request("FlyToTheMoon", Value::Null)));
    }

    #[test]
    fn test_long_press_via_dispatch() {
        let f = fixture();
        let ok = f.dispatcher.dispatch(&request(
            "LongPressKey",
            json!({"key": "w", "duration": 0.02}),
        ));
        assert!(ok);
        assert_eq!(f.system.key_events().len(), 2);
    }

    #[test]
    fn test_params_accepted_as_json_encoded_string() {
        let f = fixture();
        let ok = f.dispatcher.dispatch(&request(
            "LongPressKey",
            json!("{\"key\": \"w\", \"duration\": 0.02}"),
        ));
        assert!(ok);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let f = fixture();
        let ok = f.dispatcher.dispatch(&request(
            "LongPressKey",
            json!({"key": "w", "duration": 0.02, "legacy_flag": true}),
        ));
        assert!(ok);
    }

    #[test]
    fn test_wrong_shape_fails_before_any_key() {
        let f = fixture();
        // "keys" must be a list.
        let ok = f.dispatcher.dispatch(&request(
            "PressMultipleKeys",
            json!({"keys": "w", "duration": 0.02}),
        ));
        assert!(!ok);
        assert!(f.system.key_events().is_empty());
    }

    #[test]
    fn test_missing_required_field_fails() {
        let f = fixture();
        assert!(!f.dispatcher.dispatch(&request("LongPressKey", json!({}))));
        assert!(f.system.key_events().is_empty());
    }

    #[test]
    fn test_unresolvable_window_fails_without_posts() {
        let f = fixture();
        f.system.kill_window(WindowHandle::new(9));
        // Exact lookup skips dead windows; the substring pass still lists
        // the title, so resolve succeeds but posting hits a dead window.
        // Use a dispatcher with no matching titles for the hard case.
        let dispatcher = Dispatcher::new(ActionContext {
            windows: f.system.clone(),
            frames: f.frames.clone(),
            matcher: Arc::new(ScriptedMatcher::always_miss()),
            fallback: f.fallback.clone(),
            steps: f.steps.clone(),
            config: shared_runtime_config(),
            window_titles: vec!["Some Other Game".to_string()],
        });
        let ok = dispatcher.dispatch(&request("LongPressKey", json!({"key": "w"})));
        assert!(!ok);
        assert!(f.system.key_events().is_empty());
    }

    #[test]
    fn test_long_press_multiple_keys_wire_name() {
        let f = fixture();
        let ok = f.dispatcher.dispatch(&request(
            "LongPressMultipleKeys",
            json!({"keys": ["w", "shift"], "duration": 20}),
        ));
        assert!(ok);
        assert_eq!(f.system.key_events_down().len(), 2);
        assert_eq!(f.system.key_events_up().len(), 2);
    }

    #[test]
    fn test_request_window_titles_override_context_list() {
        let f = fixture();
        // Context candidates resolve nothing; the request carries the list
        // that matches the live window.
        let dispatcher = Dispatcher::new(ActionContext {
            windows: f.system.clone(),
            frames: f.frames.clone(),
            matcher: Arc::new(ScriptedMatcher::always_miss()),
            fallback: f.fallback.clone(),
            steps: f.steps.clone(),
            config: shared_runtime_config(),
            window_titles: vec!["Some Other Game".to_string()],
        });

        let mut req = request("LongPressKey", json!({"key": "w", "duration": 0.01}));
        req.window_titles = Some(vec!["Duet Night Abyss".to_string()]);
        assert!(dispatcher.dispatch(&req));
        assert_eq!(f.system.key_events().len(), 2);
    }

    #[test]
    fn test_detection_timeout_dispatches_false() {
        let f = fixture();
        let ok = f.dispatcher.dispatch(&request(
            "LongPressWithTimeoutDetection",
            json!({"target_node": "again", "interrupt_node": "battle", "check_interval": 20, "total_timeout": 60}),
        ));
        assert!(!ok);
        assert!(!f.fallback.runs().is_empty());
    }

    #[test]
    fn test_detection_hit_dispatches_true_and_overrides_step() {
        let hit = MatchResult {
            present: true,
            region: Some(Region { x: 1, y: 2, w: 3, h: 4 }),
            algorithm: "TemplateMatch".to_string(),
        };
        let f = fixture_with_matcher(ScriptedMatcher::new(vec![Some(hit)]));
        let ok = f.dispatcher.dispatch(&request(
            "LongPressWithTimeoutDetection",
            json!({"target_node": "again", "check_interval": 20, "total_timeout": 5000}),
        ));
        assert!(ok);
        assert_eq!(
            f.steps.overrides(),
            vec![("node".to_string(), vec!["again".to_string()])]
        );
    }

    #[test]
    fn test_set_dodge_key_visible_to_next_run_with_shift() {
        let f = fixture();
        assert!(f
            .dispatcher
            .dispatch(&request("SetDodgeKey", json!({"dodge_key": 0x45}))));
        assert_eq!(f.frames.captures(), 1);

        assert!(f.dispatcher.dispatch(&request(
            "RunWithShift",
            json!({"direction": "w", "duration": 0.02, "dodge_delay": 0.0}),
        )));
        assert_eq!(f.system.key_events_down()[1], KeyCode::new(0x45));
    }
}
