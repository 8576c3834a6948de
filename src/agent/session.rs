//! Session state and the core agent loop.
//!
//! [`Session::process_input`] converts one user input into a bounded
//! sequence of model completions and tool executions:
//!
//! 1. append the user turn, drain any queued steering
//! 2. round loop: build a request from the system prompt plus the full
//!    history, complete it, append the assistant turn; if it called
//!    tools, execute them sequentially, append the results, drain
//!    steering again, and run the loop detector
//! 3. stop when the model produces no tool calls or a configured bound
//!    is hit, then drain queued follow-up inputs the same way
//!
//! Tool failures become error tool results surfaced to the model;
//! provider errors propagate to the caller without appending an
//! assistant turn. Events are emitted in a total order per session.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::agent::events::{EventEmitter, EventKind};
use crate::agent::profiles::ProviderProfile;
use crate::agent::turns::{
    AssistantTurn, SteeringTurn, ToolResultsTurn, Turn, UserTurn,
};
use crate::client::Client;
use crate::error::Result;
use crate::execution::LocalExecutionEnvironment;
use crate::request::{Request, ToolChoice};
use crate::response::{Response, ToolCall, ToolResult};
use crate::truncation::{default_char_limits, default_line_limits, truncate_tool_output};
use crate::types::{ContentPart, Message, Role, ToolArguments};

/// The canonical warning injected when the loop detector fires.
const LOOP_WARNING: &str =
    "Loop detected: the last tool calls follow a repeating pattern. Try a different approach.";

/// Narrow completion seam between the session loop and the LLM client,
/// so hosts and tests can substitute their own.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl ModelClient for Client {
    async fn complete(&self, request: Request) -> Result<Response> {
        Client::complete(self, request).await
    }
}

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Processing,
    AwaitingInput,
    Closed,
}

/// Tunable limits for a session. Zero means unbounded for the turn and
/// round caps.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cap on total history length; 0 disables.
    pub max_turns: u32,
    /// Cap on tool rounds per input; 0 disables.
    pub max_tool_rounds_per_input: u32,
    pub default_command_timeout_ms: u64,
    pub max_command_timeout_ms: u64,
    pub reasoning_effort: Option<String>,
    pub tool_output_limits: std::collections::HashMap<String, usize>,
    pub tool_line_limits: std::collections::HashMap<String, usize>,
    pub enable_loop_detection: bool,
    pub loop_detection_window: usize,
    pub max_subagent_depth: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 0,
            max_tool_rounds_per_input: 0,
            default_command_timeout_ms: 10_000,
            max_command_timeout_ms: 600_000,
            reasoning_effort: None,
            tool_output_limits: default_char_limits(),
            tool_line_limits: default_line_limits(),
            enable_loop_detection: true,
            loop_detection_window: 10,
            max_subagent_depth: 1,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_max_tool_rounds_per_input(mut self, rounds: u32) -> Self {
        self.max_tool_rounds_per_input = rounds;
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    pub fn with_loop_detection(mut self, enabled: bool) -> Self {
        self.enable_loop_detection = enabled;
        self
    }

    pub fn with_loop_detection_window(mut self, window: usize) -> Self {
        self.loop_detection_window = window;
        self
    }

    pub fn with_max_subagent_depth(mut self, depth: u32) -> Self {
        self.max_subagent_depth = depth;
        self
    }
}

/// One conversational agent over one working directory.
pub struct Session {
    id: String,
    profile: ProviderProfile,
    env: LocalExecutionEnvironment,
    client: Arc<dyn ModelClient>,
    config: SessionConfig,
    state: SessionState,
    history: Vec<Turn>,
    events: EventEmitter,
    steering_queue: Arc<Mutex<VecDeque<String>>>,
    followup_queue: Arc<Mutex<VecDeque<String>>>,
    depth: u32,
}

impl Session {
    pub fn new(
        profile: ProviderProfile,
        env: LocalExecutionEnvironment,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            profile,
            env,
            client,
            config: SessionConfig::default(),
            state: SessionState::Idle,
            history: Vec::new(),
            events: EventEmitter::new(),
            steering_queue: Arc::new(Mutex::new(VecDeque::new())),
            followup_queue: Arc::new(Mutex::new(VecDeque::new())),
            depth: 0,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn profile(&self) -> &ProviderProfile {
        &self.profile
    }

    pub fn execution_env(&self) -> &LocalExecutionEnvironment {
        &self.env
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Queue an out-of-band hint; it is injected as a user-visible
    /// steering turn at the next drain point.
    pub fn steer(&self, message: impl Into<String>) {
        self.steering_queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(message.into());
    }

    /// Queue another input to process after the current one finishes.
    pub fn follow_up(&self, message: impl Into<String>) {
        self.followup_queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(message.into());
    }

    /// The text of the most recent assistant turn, or empty.
    pub fn last_assistant_text(&self) -> String {
        self.history
            .iter()
            .rev()
            .find_map(|turn| match turn {
                Turn::Assistant(assistant) => Some(assistant.content.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Process one user input to completion, then any queued follow-ups.
    pub async fn process_input(&mut self, user_input: &str) -> Result<()> {
        self.run_input(user_input.to_string()).await?;

        loop {
            let next = self
                .followup_queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front();
            match next {
                Some(input) => self.run_input(input).await?,
                None => break,
            }
        }

        Ok(())
    }

    async fn run_input(&mut self, user_input: String) -> Result<()> {
        self.state = SessionState::Processing;
        self.history.push(Turn::User(UserTurn::new(&user_input)));
        self.events.emit(
            EventKind::UserInput,
            &self.id,
            json!({ "content": user_input }),
        );
        self.drain_steering();

        let mut round_count: u32 = 0;
        loop {
            if self.config.max_tool_rounds_per_input > 0
                && round_count >= self.config.max_tool_rounds_per_input
            {
                self.events.emit(
                    EventKind::TurnLimit,
                    &self.id,
                    json!({ "round": round_count }),
                );
                break;
            }
            if self.config.max_turns > 0 && self.history.len() as u32 >= self.config.max_turns {
                self.events.emit(
                    EventKind::TurnLimit,
                    &self.id,
                    json!({ "total_turns": self.history.len() }),
                );
                break;
            }

            let request = self.build_request();
            let response = self.client.complete(request).await?;

            let tool_calls = response.tool_calls();
            let assistant = AssistantTurn {
                content: response.text(),
                tool_calls: tool_calls.clone(),
                reasoning: response.reasoning(),
                usage: Some(response.usage.clone()),
                response_id: Some(response.id.clone()),
                timestamp: chrono::Utc::now(),
            };
            self.events.emit(
                EventKind::AssistantTextEnd,
                &self.id,
                json!({ "text": assistant.content, "reasoning": assistant.reasoning }),
            );
            self.history.push(Turn::Assistant(assistant));

            if tool_calls.is_empty() {
                break;
            }

            round_count += 1;
            log::debug!(
                "session {} tool round {} with {} call(s)",
                self.id,
                round_count,
                tool_calls.len()
            );

            let mut results = Vec::with_capacity(tool_calls.len());
            for tool_call in &tool_calls {
                results.push(self.execute_single_tool(tool_call).await);
            }
            self.history
                .push(Turn::ToolResults(ToolResultsTurn::new(results)));
            self.drain_steering();

            if self.config.enable_loop_detection
                && detect_loop(&self.history, self.config.loop_detection_window)
            {
                log::warn!("session {} detected a tool-call loop", self.id);
                self.history
                    .push(Turn::Steering(SteeringTurn::new(LOOP_WARNING)));
                self.events.emit(
                    EventKind::LoopDetection,
                    &self.id,
                    json!({ "message": LOOP_WARNING }),
                );
            }
        }

        self.state = SessionState::Idle;
        self.events.emit(EventKind::SessionEnd, &self.id, json!({}));
        Ok(())
    }

    fn build_request(&self) -> Request {
        let mut messages = vec![Message::system(self.profile.build_system_prompt())];
        messages.extend(convert_history_to_messages(&self.history));

        let mut request = Request::new(&self.profile.model, messages)
            .with_provider(&self.profile.provider_name)
            .with_tools(self.profile.tools())
            .with_tool_choice(ToolChoice::auto());
        if let Some(effort) = &self.config.reasoning_effort {
            request = request.with_reasoning_effort(effort);
        }
        if let Some(options) = &self.profile.provider_options {
            request = request.with_provider_options(options.clone());
        }
        request
    }

    async fn execute_single_tool(&self, tool_call: &ToolCall) -> ToolResult {
        self.events.emit(
            EventKind::ToolCallStart,
            &self.id,
            json!({ "tool_name": tool_call.name, "call_id": tool_call.id }),
        );

        let outcome = self
            .profile
            .tool_registry
            .execute(&tool_call.name, tool_call.arguments.clone(), &self.env)
            .await;

        match outcome {
            Ok(raw_output) => {
                let truncated = truncate_tool_output(
                    &raw_output,
                    &tool_call.name,
                    &self.config.tool_output_limits,
                    &self.config.tool_line_limits,
                );
                // The event carries the untruncated output; only the
                // model sees the trimmed version.
                self.events.emit(
                    EventKind::ToolCallEnd,
                    &self.id,
                    json!({
                        "tool_name": tool_call.name,
                        "call_id": tool_call.id,
                        "output": raw_output,
                    }),
                );
                ToolResult {
                    tool_call_id: tool_call.id.clone(),
                    content: truncated.into(),
                    is_error: false,
                }
            }
            Err(error) => {
                let message = format!("Tool error ({}): {}", tool_call.name, error);
                self.events.emit(
                    EventKind::ToolCallEnd,
                    &self.id,
                    json!({
                        "tool_name": tool_call.name,
                        "call_id": tool_call.id,
                        "error": message,
                    }),
                );
                ToolResult {
                    tool_call_id: tool_call.id.clone(),
                    content: message.into(),
                    is_error: true,
                }
            }
        }
    }

    fn drain_steering(&mut self) {
        loop {
            let message = self
                .steering_queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop_front();
            let Some(message) = message else {
                break;
            };
            self.history
                .push(Turn::Steering(SteeringTurn::new(&message)));
            self.events.emit(
                EventKind::SteeringInjected,
                &self.id,
                json!({ "content": message }),
            );
        }
    }
}

/// Serialize history into provider-agnostic messages.
///
/// User, steering, and system turns become messages of the matching
/// role (steering surfaces as a user message); an assistant turn becomes
/// one assistant message carrying its text plus tool-call parts; a
/// tool-results turn becomes one tool message per result.
pub fn convert_history_to_messages(history: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::new();

    for turn in history {
        match turn {
            Turn::User(user) => messages.push(Message::user(&user.content)),
            Turn::Steering(steering) => messages.push(Message::user(&steering.content)),
            Turn::System(system) => messages.push(Message::system(&system.content)),
            Turn::Assistant(assistant) => {
                let mut content = vec![ContentPart::text(&assistant.content)];
                for tool_call in &assistant.tool_calls {
                    content.push(ContentPart::tool_call(
                        &tool_call.id,
                        &tool_call.name,
                        ToolArguments::Object(tool_call.arguments.clone()),
                    ));
                }
                messages.push(Message::new(Role::Assistant, content));
            }
            Turn::ToolResults(results) => {
                for result in &results.results {
                    messages.push(Message::tool_result(
                        &result.tool_call_id,
                        result.content.to_text(),
                        result.is_error,
                    ));
                }
            }
        }
    }

    messages
}

/// Whether the trailing tool-call signatures repeat.
///
/// Signatures are `"{name}:{canonical JSON arguments}"` collected from
/// every assistant turn in history, flattened in order. The last
/// `window_size` signatures trip the detector when they are a repetition
/// of some pattern of length 1, 2, or 3 that divides the window.
pub fn detect_loop(history: &[Turn], window_size: usize) -> bool {
    if window_size == 0 {
        return false;
    }

    let mut signatures: Vec<String> = Vec::new();
    for turn in history {
        if let Turn::Assistant(assistant) = turn {
            for tool_call in &assistant.tool_calls {
                let key = serde_json::to_string(&Value::Object(tool_call.arguments.clone()))
                    .unwrap_or_default();
                signatures.push(format!("{}:{}", tool_call.name, key));
            }
        }
    }

    if signatures.len() < window_size {
        return false;
    }

    let recent = &signatures[signatures.len() - window_size..];
    for pattern_len in [1usize, 2, 3] {
        if window_size % pattern_len != 0 {
            continue;
        }
        let pattern = &recent[..pattern_len];
        if recent
            .chunks(pattern_len)
            .all(|chunk| chunk == pattern)
        {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn assistant_turn_with_calls(calls: Vec<(&str, Value)>) -> Turn {
        let tool_calls = calls
            .into_iter()
            .map(|(name, arguments)| {
                ToolCall::new(
                    "t",
                    name,
                    arguments.as_object().cloned().unwrap_or_default(),
                )
            })
            .collect();
        Turn::Assistant(AssistantTurn {
            content: String::new(),
            tool_calls,
            reasoning: None,
            usage: None,
            response_id: None,
            timestamp: chrono::Utc::now(),
        })
    }

    #[test]
    fn test_detect_loop_single_repeated_call() {
        let call = ("glob", json!({"pattern": "*.py"}));
        let history = vec![
            assistant_turn_with_calls(vec![call.clone()]),
            assistant_turn_with_calls(vec![call.clone()]),
            assistant_turn_with_calls(vec![call]),
        ];
        assert!(detect_loop(&history, 3));
    }

    #[test]
    fn test_detect_loop_needs_full_window() {
        let call = ("glob", json!({"pattern": "*.py"}));
        let history = vec![
            assistant_turn_with_calls(vec![call.clone()]),
            assistant_turn_with_calls(vec![call]),
        ];
        assert!(!detect_loop(&history, 3));
    }

    #[test]
    fn test_detect_loop_alternating_pattern() {
        let a = ("grep", json!({"pattern": "x"}));
        let b = ("glob", json!({"pattern": "y"}));
        let history = vec![
            assistant_turn_with_calls(vec![a.clone(), b.clone()]),
            assistant_turn_with_calls(vec![a.clone(), b.clone()]),
            assistant_turn_with_calls(vec![a, b]),
        ];
        // Window of 6, pattern length 2.
        assert!(detect_loop(&history, 6));
    }

    #[test]
    fn test_detect_loop_distinct_arguments_do_not_trip() {
        let history = vec![
            assistant_turn_with_calls(vec![("glob", json!({"pattern": "a"}))]),
            assistant_turn_with_calls(vec![("glob", json!({"pattern": "b"}))]),
            assistant_turn_with_calls(vec![("glob", json!({"pattern": "c"}))]),
        ];
        assert!(!detect_loop(&history, 3));
    }

    #[test]
    fn test_detect_loop_canonical_key_ordering() {
        // Maps with the same entries produce the same signature
        // regardless of insertion order.
        let mut first = Map::new();
        first.insert("a".to_string(), json!(1));
        first.insert("b".to_string(), json!(2));
        let mut second = Map::new();
        second.insert("b".to_string(), json!(2));
        second.insert("a".to_string(), json!(1));

        let history = vec![
            Turn::Assistant(AssistantTurn {
                content: String::new(),
                tool_calls: vec![ToolCall::new("t1", "grep", first)],
                reasoning: None,
                usage: None,
                response_id: None,
                timestamp: chrono::Utc::now(),
            }),
            Turn::Assistant(AssistantTurn {
                content: String::new(),
                tool_calls: vec![ToolCall::new("t2", "grep", second)],
                reasoning: None,
                usage: None,
                response_id: None,
                timestamp: chrono::Utc::now(),
            }),
        ];
        assert!(detect_loop(&history, 2));
    }

    #[test]
    fn test_convert_history_shapes() {
        let history = vec![
            Turn::User(UserTurn::new("hi")),
            Turn::Steering(SteeringTurn::new("keep it short")),
            Turn::Assistant(AssistantTurn {
                content: "running".to_string(),
                tool_calls: vec![ToolCall::new("t1", "shell", Map::new())],
                reasoning: None,
                usage: None,
                response_id: None,
                timestamp: chrono::Utc::now(),
            }),
            Turn::ToolResults(ToolResultsTurn::new(vec![ToolResult {
                tool_call_id: "t1".to_string(),
                content: "done".into(),
                is_error: false,
            }])),
        ];

        let messages = convert_history_to_messages(&history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::User);
        // Steering serializes as a user message.
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].text(), "keep it short");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content.len(), 2);
        assert_eq!(messages[3].role, Role::Tool);
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("t1"));
    }
}
