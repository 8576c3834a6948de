//! OpenAI-compatible Chat Completions adapter
//! (`POST /v1/chat/completions`).
//!
//! The generic path for LM Studio, Ollama, vLLM, llama.cpp, and any other
//! server speaking the classic chat format. Streaming chunks interleave
//! text deltas and index-keyed tool-call argument deltas; a chunk's
//! `finish_reason` closes any open text block and every
//! started-but-unended tool call before the finish event. Within one
//! finish chunk, tool-call deltas are emitted before the text close -
//! consumers must not rely on strict text-before-tool ordering there.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::adapters::{
    DEFAULT_TIMEOUT_SECS, EventStream, ProviderAdapter, build_http_client, decode_http_error,
    normalize_base_url, parse_argument_str, parse_json_arguments,
};
use crate::error::Result;
use crate::request::{Request, ToolChoiceMode};
use crate::response::{
    FinishReason, FinishReasonKind, Response, StreamEvent, ToolCall, Usage,
};
use crate::sse::sse_event_stream;
use crate::types::{ContentPart, Message, Role, ToolArguments, ToolCallPart};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const ERROR_FALLBACK: &str = "OpenAI-compatible API error";

/// Adapter for OpenAI-compatible `/v1/chat/completions` APIs.
pub struct OpenAICompatAdapter {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    owns_client: bool,
}

impl OpenAICompatAdapter {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: normalize_base_url(base_url),
            http: build_http_client(DEFAULT_TIMEOUT_SECS),
            owns_client: true,
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(api_key, DEFAULT_BASE_URL)
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
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_payload(&self, request: &Request, stream: bool) -> Value {
        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(request.model));
        payload.insert(
            "messages".to_string(),
            Value::Array(translate_messages(&request.messages)),
        );

        if let Some(temperature) = request.temperature {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.top_p {
            payload.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = request.max_tokens {
            payload.insert("max_tokens".to_string(), json!(max_tokens));
        }
        if let Some(stop) = &request.stop_sequences {
            if !stop.is_empty() {
                payload.insert("stop".to_string(), json!(stop));
            }
        }
        if let Some(metadata) = &request.metadata {
            if !metadata.is_empty() {
                payload.insert("metadata".to_string(), json!(metadata));
            }
        }

        if let Some(tools) = &request.tools {
            if !tools.is_empty() {
                let declarations: Vec<Value> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                                "parameters": tool.parameters,
                            },
                        })
                    })
                    .collect();
                payload.insert("tools".to_string(), Value::Array(declarations));
            }
        }

        if let Some(tool_choice) = translate_tool_choice(request) {
            payload.insert("tool_choice".to_string(), tool_choice);
        }

        if stream {
            payload.insert("stream".to_string(), json!(true));
            payload.insert("stream_options".to_string(), json!({"include_usage": true}));
        }

        Value::Object(payload)
    }

    fn parse_response(&self, raw: Value) -> Response {
        let choice = raw
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .cloned()
            .unwrap_or(json!({}));
        let message = choice.get("message").cloned().unwrap_or(json!({}));

        let mut content: Vec<ContentPart> = Vec::new();
        let mut has_tool_calls = false;

        match message.get("content") {
            Some(Value::String(text)) if !text.is_empty() => {
                content.push(ContentPart::text(text));
            }
            Some(Value::Array(blocks)) => {
                for block in blocks {
                    if block.get("type").and_then(Value::as_str) == Some("text") {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            content.push(ContentPart::text(text));
                        }
                    }
                }
            }
            _ => {}
        }

        if let Some(tool_calls) = message.get("tool_calls").and_then(Value::as_array) {
            for tool_call in tool_calls {
                let function = tool_call.get("function").cloned().unwrap_or(json!({}));
                has_tool_calls = true;
                let raw_arguments = function.get("arguments").cloned().unwrap_or(json!(""));
                content.push(ContentPart::ToolCall(ToolCallPart {
                    id: tool_call
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: function
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: ToolArguments::Object(parse_json_arguments(&raw_arguments)),
                    call_type: "function".to_string(),
                }));
            }
        }

        let finish_raw = choice
            .get("finish_reason")
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
            finish_reason: map_finish_reason(finish_raw.as_deref(), has_tool_calls),
            usage: parse_usage(raw.get("usage")),
            raw: Some(raw),
            warnings: Vec::new(),
            rate_limit: None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAICompatAdapter {
    fn name(&self) -> &str {
        "openai_compat"
    }

    async fn complete(&self, request: Request) -> Result<Response> {
        let response = self
            .http
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.api_key))
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
        let response = self
            .http
            .post(self.endpoint())
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&self.build_payload(&request, true))
            .send()
            .await?;

        if response.status().as_u16() >= 400 {
            return Err(decode_http_error(self.name(), ERROR_FALLBACK, response).await);
        }

        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(64);
        tokio::spawn(async move {
            let mut state = ChatStreamState::default();
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
            // Stream ended without a finish_reason: close open blocks and
            // synthesize the finish.
            for item in state.finish() {
                if tx.send(Ok(item)).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

fn translate_messages(messages: &[Message]) -> Vec<Value> {
    let mut translated = Vec::new();

    for message in messages {
        if message.role == Role::Tool {
            translated.push(translate_tool_result_message(message));
            continue;
        }

        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Developer => "developer",
            Role::Tool => unreachable!("handled above"),
        };

        let mut text = String::new();
        let mut tool_calls: Vec<Value> = Vec::new();

        for part in &message.content {
            match part {
                ContentPart::Text(part) => text.push_str(&part.text),
                ContentPart::ToolCall(call) => tool_calls.push(translate_tool_call(call)),
                _ => {}
            }
        }

        // Assistant messages that are pure tool calls use null content.
        let content = if role == "assistant" && text.is_empty() && !tool_calls.is_empty() {
            Value::Null
        } else {
            json!(text)
        };

        let mut item = Map::new();
        item.insert("role".to_string(), json!(role));
        item.insert("content".to_string(), content);
        if !tool_calls.is_empty() {
            item.insert("tool_calls".to_string(), Value::Array(tool_calls));
        }
        translated.push(Value::Object(item));
    }

    translated
}

fn translate_tool_result_message(message: &Message) -> Value {
    let mut tool_call_id = message.tool_call_id.clone().unwrap_or_default();
    let mut content = String::new();

    for part in &message.content {
        match part {
            ContentPart::ToolResult(result) => {
                tool_call_id = result.tool_call_id.clone();
                content = result.content.to_text();
                break;
            }
            ContentPart::Text(text) if content.is_empty() => {
                content = text.text.clone();
            }
            _ => {}
        }
    }

    json!({
        "role": "tool",
        "tool_call_id": tool_call_id,
        "content": content,
    })
}

fn translate_tool_call(call: &ToolCallPart) -> Value {
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": call.arguments.wire_json(),
        },
    })
}

fn translate_tool_choice(request: &Request) -> Option<Value> {
    let choice = request.tool_choice.as_ref()?;
    match choice.mode {
        ToolChoiceMode::Auto => Some(json!("auto")),
        ToolChoiceMode::None => Some(json!("none")),
        ToolChoiceMode::Required => Some(json!("required")),
        ToolChoiceMode::Named => choice
            .tool_name
            .as_ref()
            .map(|name| json!({ "type": "function", "function": { "name": name } })),
    }
}

fn map_finish_reason(raw_reason: Option<&str>, has_tool_calls: bool) -> FinishReason {
    if has_tool_calls || matches!(raw_reason, Some("tool_calls" | "function_call")) {
        return FinishReason::new(
            FinishReasonKind::ToolCalls,
            raw_reason.map(str::to_string),
        );
    }

    let kind = match raw_reason {
        Some("stop") => FinishReasonKind::Stop,
        Some("length") => FinishReasonKind::Length,
        Some("content_filter") => FinishReasonKind::ContentFilter,
        Some("error") => FinishReasonKind::Error,
        _ => FinishReasonKind::Other,
    };
    FinishReason::new(kind, raw_reason.map(str::to_string))
}

fn parse_usage(usage: Option<&Value>) -> Usage {
    let empty = Map::new();
    let usage_data = usage.and_then(Value::as_object).unwrap_or(&empty);
    let completion_details = usage_data
        .get("completion_tokens_details")
        .and_then(Value::as_object);

    Usage {
        input_tokens: usage_data
            .get("prompt_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        output_tokens: usage_data
            .get("completion_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        reasoning_tokens: completion_details
            .and_then(|details| details.get("reasoning_tokens"))
            .and_then(Value::as_u64),
        cache_read_tokens: None,
        cache_write_tokens: None,
        raw: Some(Value::Object(usage_data.clone())),
    }
}

/// Per-index partial tool call assembled from streamed deltas.
#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    raw_arguments: String,
    started: bool,
    ended: bool,
}

/// Pure streaming state machine for chat-completion chunks.
///
/// Tool calls are keyed by their chunk `index` so interleaved deltas from
/// parallel calls accumulate independently.
#[derive(Default)]
struct ChatStreamState {
    text_started: bool,
    text_ended: bool,
    tool_states: BTreeMap<i64, PartialToolCall>,
    latest_finish_reason: Option<String>,
    latest_usage: Option<Value>,
    finish_emitted: bool,
}

const TEXT_ID: &str = "0";

impl ChatStreamState {
    fn handle(&mut self, event: &Value) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        if let Some(usage) = event.get("usage") {
            if usage.is_object() {
                self.latest_usage = Some(usage.clone());
            }
        }

        let Some(choice) = event
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(Value::as_object)
        else {
            return out;
        };

        let delta = choice
            .get("delta")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        if let Some(content) = delta.get("content").and_then(Value::as_str) {
            if !content.is_empty() {
                if !self.text_started {
                    self.text_started = true;
                    out.push(StreamEvent::TextStart {
                        text_id: TEXT_ID.to_string(),
                    });
                }
                out.push(StreamEvent::TextDelta {
                    text_id: TEXT_ID.to_string(),
                    delta: content.to_string(),
                });
            }
        }

        if let Some(tool_calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for tool_call in tool_calls {
                let Some(tool_call) = tool_call.as_object() else {
                    continue;
                };
                let index = tool_call
                    .get("index")
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                let state = self.tool_states.entry(index).or_default();

                if let Some(id) = tool_call.get("id").and_then(Value::as_str) {
                    if !id.is_empty() {
                        state.id = id.to_string();
                    }
                }

                let function = tool_call.get("function").and_then(Value::as_object);
                if let Some(name) = function
                    .and_then(|function| function.get("name"))
                    .and_then(Value::as_str)
                {
                    if !name.is_empty() {
                        state.name = name.to_string();
                    }
                }

                if !state.started {
                    state.started = true;
                    out.push(StreamEvent::ToolCallStart {
                        tool_call: ToolCall::new(state.id.clone(), state.name.clone(), Map::new()),
                    });
                }

                if let Some(arguments) = function
                    .and_then(|function| function.get("arguments"))
                    .and_then(Value::as_str)
                {
                    if !arguments.is_empty() {
                        state.raw_arguments.push_str(arguments);
                        let mut call =
                            ToolCall::new(state.id.clone(), state.name.clone(), Map::new());
                        call.raw_arguments = Some(arguments.to_string());
                        out.push(StreamEvent::ToolCallDelta { tool_call: call });
                    }
                }
            }
        }

        if let Some(finish_reason) = choice.get("finish_reason").and_then(Value::as_str) {
            self.latest_finish_reason = Some(finish_reason.to_string());
            out.extend(self.close_open_blocks());
            self.finish_emitted = true;
            out.push(self.finish_event());
        }

        out
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finish_emitted {
            return Vec::new();
        }
        let mut out = self.close_open_blocks();
        self.finish_emitted = true;
        out.push(self.finish_event());
        out
    }

    fn close_open_blocks(&mut self) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        if self.text_started && !self.text_ended {
            self.text_ended = true;
            out.push(StreamEvent::TextEnd {
                text_id: TEXT_ID.to_string(),
            });
        }

        for state in self.tool_states.values_mut() {
            if state.started && !state.ended {
                state.ended = true;
                let mut call = ToolCall::new(
                    state.id.clone(),
                    state.name.clone(),
                    parse_argument_str(&state.raw_arguments),
                );
                if !state.raw_arguments.is_empty() {
                    call.raw_arguments = Some(state.raw_arguments.clone());
                }
                out.push(StreamEvent::ToolCallEnd { tool_call: call });
            }
        }

        out
    }

    fn finish_event(&self) -> StreamEvent {
        StreamEvent::Finish {
            finish_reason: map_finish_reason(self.latest_finish_reason.as_deref(), false),
            usage: parse_usage(self.latest_usage.as_ref()),
        }
    }
}
