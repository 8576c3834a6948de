//! Anthropic Messages adapter (`POST /v1/messages`).
//!
//! Messages must alternate user/assistant, so consecutive same-role
//! messages are merged. Tool calls are `tool_use` blocks with structured
//! input; tool results are `tool_result` blocks. When tool choice is
//! `none`, tool declarations are omitted entirely (the API rejects a
//! `none` choice alongside declared tools). Streaming is block-indexed:
//! `content_block_start`/`delta`/`stop` bracket each text, thinking, or
//! tool_use block, with tool input arriving as `input_json_delta`
//! fragments.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::adapters::{
    DEFAULT_TIMEOUT_SECS, EventStream, ProviderAdapter, build_http_client, decode_http_error,
    normalize_base_url,
};
use crate::error::Result;
use crate::request::{Request, ToolChoiceMode};
use crate::response::{
    FinishReason, FinishReasonKind, Response, StreamEvent, ToolCall, Usage,
};
use crate::sse::sse_event_stream;
use crate::types::{
    ContentPart, Message, Role, ThinkingPart, ToolArguments, ToolCallPart,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const ERROR_FALLBACK: &str = "Anthropic API error";

/// Adapter for Anthropic's `/v1/messages` API.
pub struct AnthropicAdapter {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    owns_client: bool,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: build_http_client(DEFAULT_TIMEOUT_SECS),
            owns_client: true,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    /// Use a caller-supplied HTTP client. The adapter then borrows the
    /// client; connection-pool lifetime is the caller's concern.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self.owns_client = false;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        if self.owns_client {
            self.http = build_http_client(timeout_secs);
        }
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    /// Headers: `x-api-key`, pinned `anthropic-version`, and optional
    /// comma-joined `anthropic-beta` values from
    /// `provider_options.anthropic.beta_headers`.
    fn build_headers(&self, request: &Request) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", API_VERSION.to_string()),
        ];

        let beta_values: Vec<String> = request
            .provider_options
            .as_ref()
            .and_then(|options| options.get("anthropic"))
            .and_then(|options| options.get("beta_headers"))
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !beta_values.is_empty() {
            headers.push(("anthropic-beta", beta_values.join(",")));
        }

        headers
    }

    fn build_payload(&self, request: &Request, stream: bool) -> Value {
        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(request.model));
        payload.insert(
            "messages".to_string(),
            Value::Array(translate_messages(&request.messages)),
        );
        payload.insert(
            "max_tokens".to_string(),
            json!(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        );

        let system = extract_system(&request.messages);
        if !system.is_empty() {
            payload.insert("system".to_string(), Value::Array(system));
        }

        if let Some(temperature) = request.temperature {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.top_p {
            payload.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(stop) = &request.stop_sequences {
            if !stop.is_empty() {
                payload.insert("stop_sequences".to_string(), json!(stop));
            }
        }
        if let Some(metadata) = &request.metadata {
            if !metadata.is_empty() {
                payload.insert("metadata".to_string(), json!(metadata));
            }
        }

        let choice_is_none = request
            .tool_choice
            .as_ref()
            .is_some_and(|choice| choice.mode == ToolChoiceMode::None);
        if !choice_is_none {
            if let Some(tools) = &request.tools {
                if !tools.is_empty() {
                    let declarations: Vec<Value> = tools
                        .iter()
                        .map(|tool| {
                            json!({
                                "name": tool.name,
                                "description": tool.description,
                                "input_schema": tool.parameters,
                            })
                        })
                        .collect();
                    payload.insert("tools".to_string(), Value::Array(declarations));
                }
            }

            if let Some(tool_choice) = translate_tool_choice(request) {
                payload.insert("tool_choice".to_string(), tool_choice);
            }
        }

        if stream {
            payload.insert("stream".to_string(), json!(true));
        }

        Value::Object(payload)
    }

    fn parse_response(&self, raw: Value) -> Response {
        let mut content: Vec<ContentPart> = Vec::new();

        if let Some(blocks) = raw.get("content").and_then(Value::as_array) {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        content.push(ContentPart::text(
                            block.get("text").and_then(Value::as_str).unwrap_or_default(),
                        ));
                    }
                    Some("tool_use") => {
                        let input = block
                            .get("input")
                            .and_then(Value::as_object)
                            .cloned()
                            .unwrap_or_default();
                        content.push(ContentPart::ToolCall(ToolCallPart {
                            id: block
                                .get("id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            name: block
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            arguments: ToolArguments::Object(input),
                            call_type: "function".to_string(),
                        }));
                    }
                    Some("thinking") => {
                        content.push(ContentPart::Thinking(ThinkingPart {
                            text: block
                                .get("thinking")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            signature: block
                                .get("signature")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            redacted: false,
                        }));
                    }
                    Some("redacted_thinking") => {
                        content.push(ContentPart::redacted_thinking(
                            block.get("data").and_then(Value::as_str).unwrap_or_default(),
                        ));
                    }
                    _ => {}
                }
            }
        }

        let usage = parse_usage(raw.get("usage"));
        let stop_reason = raw
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(str::to_string);

        Response {
            id: raw
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            model: raw
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            provider: self.name().to_string(),
            message: Message::new(Role::Assistant, content),
            finish_reason: map_finish_reason(stop_reason.as_deref()),
            usage,
            raw: Some(raw),
            warnings: Vec::new(),
            rate_limit: None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: Request) -> Result<Response> {
        let mut builder = self.http.post(self.endpoint());
        for (name, value) in self.build_headers(&request) {
            builder = builder.header(name, value);
        }
        let response = builder
            .json(&self.build_payload(&request, false))
            .send()
            .await?;

        if response.status().as_u16() >= 400 {
            return Err(decode_http_error(self.name(), ERROR_FALLBACK, response).await);
        }

        let raw: Value = response.json().await?;
        Ok(self.parse_response(raw))
    }

    async fn stream(&self, request: Request) -> Result<EventStream> {
        let mut builder = self.http.post(self.endpoint());
        for (name, value) in self.build_headers(&request) {
            builder = builder.header(name, value);
        }
        let response = builder
            .json(&self.build_payload(&request, true))
            .send()
            .await?;

        if response.status().as_u16() >= 400 {
            return Err(decode_http_error(self.name(), ERROR_FALLBACK, response).await);
        }

        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(64);
        tokio::spawn(async move {
            let mut state = MessagesStreamState::default();
            let mut frames = Box::pin(sse_event_stream(response));
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(frame) => {
                        let Ok(event) = serde_json::from_str::<Value>(&frame.data) else {
                            continue;
                        };
                        for item in state.handle(&event) {
                            if tx.send(Ok(item)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(error) => {
                        let _ = tx.send(Err(error)).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// System and developer text as `system` blocks.
fn extract_system(messages: &[Message]) -> Vec<Value> {
    let mut blocks = Vec::new();
    for message in messages {
        if !matches!(message.role, Role::System | Role::Developer) {
            continue;
        }
        for part in &message.content {
            if let ContentPart::Text(text) = part {
                blocks.push(json!({ "type": "text", "text": text.text }));
            }
        }
    }
    blocks
}

/// Translate to alternating user/assistant messages, merging consecutive
/// same-role messages by concatenating their content arrays.
fn translate_messages(messages: &[Message]) -> Vec<Value> {
    let mut translated: Vec<Value> = Vec::new();

    for message in messages {
        if matches!(message.role, Role::System | Role::Developer) {
            continue;
        }

        let role = if message.role == Role::Assistant {
            "assistant"
        } else {
            "user"
        };
        let content = translate_content(message);
        if content.is_empty() {
            continue;
        }

        let same_role_tail = translated
            .last()
            .and_then(|last| last.get("role"))
            .and_then(Value::as_str)
            == Some(role);
        if same_role_tail {
            if let Some(Value::Array(existing)) = translated
                .last_mut()
                .and_then(|last| last.get_mut("content"))
            {
                existing.extend(content);
                continue;
            }
        }

        translated.push(json!({ "role": role, "content": content }));
    }

    translated
}

fn translate_content(message: &Message) -> Vec<Value> {
    let mut blocks = Vec::new();

    for part in &message.content {
        match part {
            ContentPart::Text(text) => {
                blocks.push(json!({ "type": "text", "text": text.text }));
            }
            ContentPart::ToolCall(call) => {
                blocks.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": call.arguments.object(),
                }));
            }
            ContentPart::ToolResult(result) => {
                blocks.push(json!({
                    "type": "tool_result",
                    "tool_use_id": result.tool_call_id,
                    "content": result.content.as_value(),
                    "is_error": result.is_error,
                }));
            }
            _ => {}
        }
    }

    blocks
}

fn translate_tool_choice(request: &Request) -> Option<Value> {
    let choice = request.tool_choice.as_ref()?;
    match choice.mode {
        ToolChoiceMode::Auto => Some(json!({ "type": "auto" })),
        ToolChoiceMode::Required => Some(json!({ "type": "any" })),
        ToolChoiceMode::Named => choice
            .tool_name
            .as_ref()
            .map(|name| json!({ "type": "tool", "name": name })),
        ToolChoiceMode::None => None,
    }
}

fn map_finish_reason(raw_reason: Option<&str>) -> FinishReason {
    let kind = match raw_reason {
        Some("end_turn" | "stop_sequence") => FinishReasonKind::Stop,
        Some("max_tokens") => FinishReasonKind::Length,
        Some("tool_use") => FinishReasonKind::ToolCalls,
        _ => FinishReasonKind::Other,
    };
    FinishReason::new(kind, raw_reason.map(str::to_string))
}

fn parse_usage(usage: Option<&Value>) -> Usage {
    let empty = Map::new();
    let usage_data = usage.and_then(Value::as_object).unwrap_or(&empty);

    Usage {
        input_tokens: usage_data
            .get("input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        output_tokens: usage_data
            .get("output_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        reasoning_tokens: None,
        cache_read_tokens: usage_data
            .get("cache_read_input_tokens")
            .and_then(Value::as_u64),
        cache_write_tokens: usage_data
            .get("cache_creation_input_tokens")
            .and_then(Value::as_u64),
        raw: Some(Value::Object(usage_data.clone())),
    }
}

/// Pure streaming state machine for the Messages event envelope.
#[derive(Default)]
struct MessagesStreamState {
    block_types: HashMap<i64, String>,
    tool_states: HashMap<i64, ToolUseState>,
    input_tokens: u64,
    output_tokens: u64,
    stop_reason: Option<String>,
}

struct ToolUseState {
    id: String,
    name: String,
    seed_input: Map<String, Value>,
    partials: String,
}

impl MessagesStreamState {
    fn handle(&mut self, event: &Value) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        match event.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                let usage = event
                    .get("message")
                    .and_then(|message| message.get("usage"))
                    .cloned()
                    .unwrap_or(json!({}));
                self.input_tokens = usage
                    .get("input_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                self.output_tokens = usage
                    .get("output_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
            }

            Some("content_block_start") => {
                let index = index_of(event);
                let block = event.get("content_block").cloned().unwrap_or(json!({}));
                let block_type = block
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.block_types.insert(index, block_type.clone());

                match block_type.as_str() {
                    "text" => out.push(StreamEvent::TextStart {
                        text_id: index.to_string(),
                    }),
                    "thinking" | "redacted_thinking" => out.push(StreamEvent::ReasoningStart),
                    "tool_use" => {
                        let state = ToolUseState {
                            id: block
                                .get("id")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            name: block
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            seed_input: block
                                .get("input")
                                .and_then(Value::as_object)
                                .cloned()
                                .unwrap_or_default(),
                            partials: String::new(),
                        };
                        out.push(StreamEvent::ToolCallStart {
                            tool_call: ToolCall::new(
                                state.id.clone(),
                                state.name.clone(),
                                state.seed_input.clone(),
                            ),
                        });
                        self.tool_states.insert(index, state);
                    }
                    _ => {}
                }
            }

            Some("content_block_delta") => {
                let index = index_of(event);
                let delta = event.get("delta").cloned().unwrap_or(json!({}));

                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => out.push(StreamEvent::TextDelta {
                        text_id: index.to_string(),
                        delta: delta
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    }),
                    Some("thinking_delta") => out.push(StreamEvent::ReasoningDelta {
                        delta: delta
                            .get("thinking")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    }),
                    Some("input_json_delta") => {
                        let partial = delta
                            .get("partial_json")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        if let Some(state) = self.tool_states.get_mut(&index) {
                            state.partials.push_str(&partial);
                            let mut tool_call =
                                ToolCall::new(state.id.clone(), state.name.clone(), Map::new());
                            tool_call.raw_arguments = Some(partial);
                            out.push(StreamEvent::ToolCallDelta { tool_call });
                        }
                    }
                    _ => {}
                }
            }

            Some("content_block_stop") => {
                let index = index_of(event);
                match self.block_types.get(&index).map(String::as_str) {
                    Some("text") => out.push(StreamEvent::TextEnd {
                        text_id: index.to_string(),
                    }),
                    Some("thinking" | "redacted_thinking") => {
                        out.push(StreamEvent::ReasoningEnd);
                    }
                    Some("tool_use") => {
                        if let Some(state) = self.tool_states.get(&index) {
                            // Seed input merged with whatever the partials parse to.
                            let mut arguments = state.seed_input.clone();
                            if !state.partials.is_empty() {
                                if let Ok(Value::Object(parsed)) =
                                    serde_json::from_str::<Value>(&state.partials)
                                {
                                    arguments.extend(parsed);
                                }
                            }
                            let mut tool_call =
                                ToolCall::new(state.id.clone(), state.name.clone(), arguments);
                            if !state.partials.is_empty() {
                                tool_call.raw_arguments = Some(state.partials.clone());
                            }
                            out.push(StreamEvent::ToolCallEnd { tool_call });
                        }
                    }
                    _ => {}
                }
            }

            Some("message_delta") => {
                if let Some(reason) = event
                    .get("delta")
                    .and_then(|delta| delta.get("stop_reason"))
                    .and_then(Value::as_str)
                {
                    self.stop_reason = Some(reason.to_string());
                }
                if let Some(output_tokens) = event
                    .get("usage")
                    .and_then(|usage| usage.get("output_tokens"))
                    .and_then(Value::as_u64)
                {
                    self.output_tokens = output_tokens;
                }
            }

            Some("message_stop") => {
                out.push(StreamEvent::Finish {
                    finish_reason: map_finish_reason(self.stop_reason.as_deref()),
                    usage: Usage::new(self.input_tokens, self.output_tokens),
                });
            }

            _ => {}
        }

        out
    }
}

fn index_of(event: &Value) -> i64 {
    event.get("index").and_then(Value::as_i64).unwrap_or(-1)
}
