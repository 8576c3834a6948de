//! OpenAI Responses adapter (`POST /v1/responses`).
//!
//! The Responses API takes a heterogeneous `input` array: message items
//! with `input_text`/`output_text` blocks, `function_call` items with
//! stringified arguments, and `function_call_output` items. Streaming
//! arrives as typed SSE events keyed by `output_index`.

use std::collections::{HashMap, HashSet};

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
use crate::types::{ContentPart, Message, Role, ToolArguments, ToolCallPart, ToolResultPart};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const ERROR_FALLBACK: &str = "OpenAI API error";

/// Adapter for OpenAI's `/v1/responses` API.
pub struct OpenAIAdapter {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    owns_client: bool,
}

impl OpenAIAdapter {
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
        format!("{}/v1/responses", self.base_url)
    }

    fn build_payload(&self, request: &Request, stream: bool) -> Value {
        let mut payload = Map::new();
        payload.insert("model".to_string(), json!(request.model));
        payload.insert(
            "input".to_string(),
            Value::Array(translate_messages(&request.messages)),
        );

        let instructions = extract_instructions(&request.messages);
        if !instructions.is_empty() {
            payload.insert("instructions".to_string(), json!(instructions));
        }

        if let Some(temperature) = request.temperature {
            payload.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = request.top_p {
            payload.insert("top_p".to_string(), json!(top_p));
        }
        if let Some(max_tokens) = request.max_tokens {
            payload.insert("max_output_tokens".to_string(), json!(max_tokens));
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
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        })
                    })
                    .collect();
                payload.insert("tools".to_string(), Value::Array(declarations));
            }
        }

        if let Some(tool_choice) = translate_tool_choice(request) {
            payload.insert("tool_choice".to_string(), tool_choice);
        }

        if let Some(effort) = &request.reasoning_effort {
            payload.insert("reasoning".to_string(), json!({ "effort": effort }));
        }

        if let Some(format) = &request.response_format {
            if format.format_type == crate::request::ResponseFormatType::JsonSchema {
                if let Some(schema) = &format.json_schema {
                    payload.insert(
                        "text".to_string(),
                        json!({
                            "format": {
                                "type": "json_schema",
                                "schema": schema,
                                "strict": format.strict,
                            }
                        }),
                    );
                }
            }
        }

        if stream {
            payload.insert("stream".to_string(), json!(true));
        }

        Value::Object(payload)
    }

    fn parse_response(&self, raw: Value) -> Response {
        let mut content: Vec<ContentPart> = Vec::new();

        if let Some(output) = raw.get("output").and_then(Value::as_array) {
            for item in output {
                match item.get("type").and_then(Value::as_str) {
                    Some("message") => {
                        if let Some(blocks) = item.get("content").and_then(Value::as_array) {
                            for block in blocks {
                                if matches!(
                                    block.get("type").and_then(Value::as_str),
                                    Some("output_text") | Some("text")
                                ) {
                                    let text = block
                                        .get("text")
                                        .and_then(Value::as_str)
                                        .unwrap_or_default();
                                    content.push(ContentPart::text(text));
                                }
                            }
                        }
                    }
                    Some("function_call") => {
                        let raw_arguments = item.get("arguments").cloned().unwrap_or(json!(""));
                        content.push(ContentPart::ToolCall(ToolCallPart {
                            id: item_call_id(item),
                            name: item
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            arguments: ToolArguments::Object(parse_json_arguments(&raw_arguments)),
                            call_type: "function".to_string(),
                        }));
                    }
                    _ => {}
                }
            }
        }

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
            finish_reason: map_finish_reason(&raw),
            usage: parse_usage(raw.get("usage")),
            raw: Some(raw),
            warnings: Vec::new(),
            rate_limit: None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn name(&self) -> &str {
        "openai"
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
            let mut state = ResponsesStreamState::default();
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

fn item_call_id(item: &Value) -> String {
    item.get("call_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .or_else(|| item.get("id").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

/// System and developer text, concatenated into the `instructions` slot.
fn extract_instructions(messages: &[Message]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for message in messages {
        if !matches!(message.role, Role::System | Role::Developer) {
            continue;
        }
        for part in &message.content {
            if let ContentPart::Text(text) = part {
                parts.push(&text.text);
            }
        }
    }
    parts.join("\n\n")
}

fn translate_messages(messages: &[Message]) -> Vec<Value> {
    let mut items: Vec<Value> = Vec::new();

    for message in messages {
        if matches!(message.role, Role::System | Role::Developer) {
            continue;
        }

        let role = if message.role == Role::Assistant {
            "assistant"
        } else {
            "user"
        };
        let text_type = if role == "assistant" {
            "output_text"
        } else {
            "input_text"
        };

        // Text parts buffer into one message item; any non-text part
        // interrupts the run and flushes the buffer first.
        let mut pending: Vec<Value> = Vec::new();
        let flush = |pending: &mut Vec<Value>, items: &mut Vec<Value>| {
            if !pending.is_empty() {
                items.push(json!({
                    "type": "message",
                    "role": role,
                    "content": std::mem::take(pending),
                }));
            }
        };

        for part in &message.content {
            match part {
                ContentPart::Text(text) => {
                    pending.push(json!({ "type": text_type, "text": text.text }));
                }
                ContentPart::ToolCall(call) => {
                    flush(&mut pending, &mut items);
                    items.push(translate_tool_call(call));
                }
                ContentPart::ToolResult(result) => {
                    flush(&mut pending, &mut items);
                    items.push(translate_tool_result(result));
                }
                // Media parts are not expressible in this input format.
                _ => {
                    flush(&mut pending, &mut items);
                }
            }
        }

        flush(&mut pending, &mut items);
    }

    items
}

fn translate_tool_call(call: &ToolCallPart) -> Value {
    json!({
        "type": "function_call",
        "id": call.id,
        "call_id": call.id,
        "name": call.name,
        "arguments": call.arguments.wire_json(),
    })
}

fn translate_tool_result(result: &ToolResultPart) -> Value {
    json!({
        "type": "function_call_output",
        "call_id": result.tool_call_id,
        "output": result.content.as_value(),
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
            .map(|name| json!({ "type": "function", "name": name })),
    }
}

fn map_finish_reason(raw: &Value) -> FinishReason {
    let has_function_call = raw
        .get("output")
        .and_then(Value::as_array)
        .is_some_and(|output| {
            output
                .iter()
                .any(|item| item.get("type").and_then(Value::as_str) == Some("function_call"))
        });
    if has_function_call {
        return FinishReason::new(FinishReasonKind::ToolCalls, Some("function_call".to_string()));
    }

    let status = raw.get("status").and_then(Value::as_str);
    let incomplete_reason = raw
        .get("incomplete_details")
        .and_then(|details| details.get("reason"))
        .and_then(Value::as_str);

    match (incomplete_reason, status) {
        (Some("max_output_tokens"), _) => {
            FinishReason::new(FinishReasonKind::Length, Some("max_output_tokens".to_string()))
        }
        (Some(reason @ ("content_filter" | "safety")), _) => {
            FinishReason::new(FinishReasonKind::ContentFilter, Some(reason.to_string()))
        }
        (_, Some("completed")) => {
            FinishReason::new(FinishReasonKind::Stop, Some("completed".to_string()))
        }
        (_, Some("failed")) => {
            FinishReason::new(FinishReasonKind::Error, Some("failed".to_string()))
        }
        (reason, status) => FinishReason::new(
            FinishReasonKind::Other,
            reason.or(status).map(str::to_string),
        ),
    }
}

fn parse_usage(usage: Option<&Value>) -> Usage {
    let empty = Map::new();
    let usage_data = usage.and_then(Value::as_object).unwrap_or(&empty);
    let output_details = usage_data
        .get("output_tokens_details")
        .and_then(Value::as_object);
    let input_details = usage_data
        .get("input_tokens_details")
        .and_then(Value::as_object);

    Usage {
        input_tokens: usage_data
            .get("input_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        output_tokens: usage_data
            .get("output_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        reasoning_tokens: output_details
            .and_then(|details| details.get("reasoning_tokens"))
            .and_then(Value::as_u64),
        cache_read_tokens: input_details
            .and_then(|details| details.get("cached_tokens"))
            .and_then(Value::as_u64),
        cache_write_tokens: None,
        raw: Some(Value::Object(usage_data.clone())),
    }
}

/// Pure streaming state machine for the Responses event envelope.
///
/// Text ids are `"{output_index}:{content_index}"`; tool-call state is
/// keyed by `output_index`, with argument deltas streamed as raw JSON
/// text and the authoritative string arriving on `.done`.
#[derive(Default)]
struct ResponsesStreamState {
    text_started: HashSet<String>,
    tool_states: HashMap<i64, ToolHead>,
}

#[derive(Clone, Default)]
struct ToolHead {
    id: String,
    name: String,
}

impl ResponsesStreamState {
    fn handle(&mut self, event: &Value) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        match event.get("type").and_then(Value::as_str) {
            Some("response.output_item.added") => {
                let output_index = index_of(event, "output_index");
                let item = event.get("item").cloned().unwrap_or(Value::Null);

                match item.get("type").and_then(Value::as_str) {
                    Some("message") => {
                        let text_id = format!("{output_index}:0");
                        self.text_started.insert(text_id.clone());
                        out.push(StreamEvent::TextStart { text_id });
                    }
                    Some("function_call") => {
                        let head = ToolHead {
                            id: item_call_id(&item),
                            name: item
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        };
                        self.tool_states.insert(output_index, head.clone());
                        out.push(StreamEvent::ToolCallStart {
                            tool_call: ToolCall::new(head.id, head.name, Map::new()),
                        });
                    }
                    _ => {}
                }
            }

            Some("response.output_text.delta") => {
                let text_id = text_id_of(event);
                if !self.text_started.contains(&text_id) {
                    self.text_started.insert(text_id.clone());
                    out.push(StreamEvent::TextStart {
                        text_id: text_id.clone(),
                    });
                }
                out.push(StreamEvent::TextDelta {
                    text_id,
                    delta: event
                        .get("delta")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }

            Some("response.output_text.done") => {
                out.push(StreamEvent::TextEnd {
                    text_id: text_id_of(event),
                });
            }

            Some("response.function_call_arguments.delta") => {
                let head = self
                    .tool_states
                    .get(&index_of(event, "output_index"))
                    .cloned()
                    .unwrap_or_default();
                let partial = event
                    .get("delta")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let mut tool_call = ToolCall::new(head.id, head.name, Map::new());
                tool_call.raw_arguments = Some(partial);
                out.push(StreamEvent::ToolCallDelta { tool_call });
            }

            Some("response.function_call_arguments.done") => {
                let head = self
                    .tool_states
                    .get(&index_of(event, "output_index"))
                    .cloned()
                    .unwrap_or_default();
                let raw_arguments = event
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let mut tool_call =
                    ToolCall::new(head.id, head.name, parse_argument_str(&raw_arguments));
                tool_call.raw_arguments = Some(raw_arguments);
                out.push(StreamEvent::ToolCallEnd { tool_call });
            }

            Some("response.completed" | "response.incomplete" | "response.failed") => {
                let raw_response = event.get("response").cloned().unwrap_or(json!({}));
                out.push(StreamEvent::Finish {
                    finish_reason: map_finish_reason(&raw_response),
                    usage: parse_usage(raw_response.get("usage")),
                });
            }

            _ => {}
        }

        out
    }
}

fn index_of(event: &Value, key: &str) -> i64 {
    event.get(key).and_then(Value::as_i64).unwrap_or(-1)
}

fn text_id_of(event: &Value) -> String {
    let output_index = index_of(event, "output_index");
    let content_index = event
        .get("content_index")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    format!("{output_index}:{content_index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ToolChoice, ToolDefinition};

    fn adapter() -> OpenAIAdapter {
        OpenAIAdapter::new("sk-test")
    }

    fn request_with(messages: Vec<Message>) -> Request {
        Request::new("gpt-5.2", messages)
    }

    #[test]
    fn test_system_messages_hoisted_into_instructions() {
        let request = request_with(vec![
            Message::system("be brief"),
            Message::developer("no markdown"),
            Message::user("hi"),
        ]);
        let payload = adapter().build_payload(&request, false);

        assert_eq!(payload["instructions"], json!("be brief\n\nno markdown"));
        let input = payload["input"].as_array().unwrap();
        assert_eq!(input.len(), 1);
        assert_eq!(input[0]["role"], json!("user"));
        assert_eq!(input[0]["content"][0]["type"], json!("input_text"));
    }

    #[test]
    fn test_assistant_text_uses_output_text() {
        let request = request_with(vec![Message::assistant("done")]);
        let payload = adapter().build_payload(&request, false);
        let input = payload["input"].as_array().unwrap();
        assert_eq!(input[0]["content"][0]["type"], json!("output_text"));
    }

    #[test]
    fn test_tool_call_serialized_as_string_arguments() {
        let mut args = Map::new();
        args.insert("file_path".to_string(), json!("a.txt"));
        let message = Message::new(
            Role::Assistant,
            vec![
                ContentPart::text("on it"),
                ContentPart::tool_call("call_1", "read_file", ToolArguments::Object(args)),
            ],
        );
        let payload = adapter().build_payload(&request_with(vec![message]), false);
        let input = payload["input"].as_array().unwrap();

        // Buffered text flushes before the function_call item.
        assert_eq!(input[0]["type"], json!("message"));
        assert_eq!(input[1]["type"], json!("function_call"));
        assert_eq!(input[1]["id"], json!("call_1"));
        assert_eq!(input[1]["call_id"], json!("call_1"));
        assert_eq!(input[1]["arguments"], json!(r#"{"file_path":"a.txt"}"#));
    }

    #[test]
    fn test_tool_result_item() {
        let message = Message::tool_result("call_1", "contents", false);
        let payload = adapter().build_payload(&request_with(vec![message]), false);
        let input = payload["input"].as_array().unwrap();
        assert_eq!(input[0]["type"], json!("function_call_output"));
        assert_eq!(input[0]["call_id"], json!("call_1"));
        assert_eq!(input[0]["output"], json!("contents"));
    }

    #[test]
    fn test_tool_choice_and_reasoning() {
        let mut request = request_with(vec![Message::user("hi")])
            .with_tool_choice(ToolChoice::named("grep"))
            .with_reasoning_effort("high");
        request.tools = Some(vec![ToolDefinition::new(
            "grep",
            "search",
            json!({"type": "object"}),
        )]);
        let payload = adapter().build_payload(&request, false);

        assert_eq!(
            payload["tool_choice"],
            json!({"type": "function", "name": "grep"})
        );
        assert_eq!(payload["reasoning"], json!({"effort": "high"}));
        assert_eq!(payload["tools"][0]["type"], json!("function"));
    }

    #[test]
    fn test_json_schema_response_format() {
        let schema = json!({"type": "object", "properties": {}});
        let request = request_with(vec![Message::user("hi")]).with_response_format(
            crate::request::ResponseFormat::json_schema(schema.clone(), true),
        );
        let payload = adapter().build_payload(&request, false);
        assert_eq!(payload["text"]["format"]["type"], json!("json_schema"));
        assert_eq!(payload["text"]["format"]["schema"], schema);
        assert_eq!(payload["text"]["format"]["strict"], json!(true));
    }

    #[test]
    fn test_parse_response_with_function_call() {
        let raw = json!({
            "id": "resp_1",
            "model": "gpt-5.2",
            "status": "completed",
            "output": [
                {"type": "message", "content": [{"type": "output_text", "text": "checking"}]},
                {"type": "function_call", "call_id": "call_9", "name": "glob",
                 "arguments": "{\"pattern\": \"*.rs\"}"},
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let response = adapter().parse_response(raw);

        assert_eq!(response.text(), "checking");
        assert_eq!(response.finish_reason.reason, FinishReasonKind::ToolCalls);
        let calls = response.tool_calls();
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].arguments.get("pattern"), Some(&json!("*.rs")));
        assert_eq!(response.usage.input_tokens, 10);
    }

    #[test]
    fn test_finish_reason_mapping() {
        let length = json!({"status": "incomplete", "incomplete_details": {"reason": "max_output_tokens"}, "output": []});
        assert_eq!(map_finish_reason(&length).reason, FinishReasonKind::Length);

        let filtered = json!({"incomplete_details": {"reason": "content_filter"}, "output": []});
        assert_eq!(
            map_finish_reason(&filtered).reason,
            FinishReasonKind::ContentFilter
        );

        let failed = json!({"status": "failed", "output": []});
        assert_eq!(map_finish_reason(&failed).reason, FinishReasonKind::Error);

        let completed = json!({"status": "completed", "output": []});
        assert_eq!(map_finish_reason(&completed).reason, FinishReasonKind::Stop);
    }

    #[test]
    fn test_stream_state_text_flow() {
        let mut state = ResponsesStreamState::default();

        let added = state.handle(&json!({
            "type": "response.output_item.added",
            "output_index": 0,
            "item": {"type": "message"},
        }));
        assert!(matches!(&added[0], StreamEvent::TextStart { text_id } if text_id == "0:0"));

        let delta = state.handle(&json!({
            "type": "response.output_text.delta",
            "output_index": 0,
            "content_index": 0,
            "delta": "hel",
        }));
        assert_eq!(delta.len(), 1);
        assert!(
            matches!(&delta[0], StreamEvent::TextDelta { delta, .. } if delta == "hel")
        );

        let done = state.handle(&json!({
            "type": "response.output_text.done",
            "output_index": 0,
            "content_index": 0,
        }));
        assert!(matches!(&done[0], StreamEvent::TextEnd { text_id } if text_id == "0:0"));
    }

    #[test]
    fn test_stream_state_tool_call_flow() {
        let mut state = ResponsesStreamState::default();

        let start = state.handle(&json!({
            "type": "response.output_item.added",
            "output_index": 1,
            "item": {"type": "function_call", "call_id": "call_7", "name": "shell"},
        }));
        assert!(matches!(
            &start[0],
            StreamEvent::ToolCallStart { tool_call } if tool_call.id == "call_7"
        ));

        let delta = state.handle(&json!({
            "type": "response.function_call_arguments.delta",
            "output_index": 1,
            "delta": "{\"comm",
        }));
        assert!(matches!(
            &delta[0],
            StreamEvent::ToolCallDelta { tool_call }
                if tool_call.raw_arguments.as_deref() == Some("{\"comm")
        ));

        let end = state.handle(&json!({
            "type": "response.function_call_arguments.done",
            "output_index": 1,
            "arguments": "{\"command\": \"ls\"}",
        }));
        match &end[0] {
            StreamEvent::ToolCallEnd { tool_call } => {
                assert_eq!(tool_call.name, "shell");
                assert_eq!(tool_call.arguments.get("command"), Some(&json!("ls")));
            }
            other => panic!("expected ToolCallEnd, got {other:?}"),
        }
    }

    #[test]
    fn test_stream_state_unparseable_final_arguments() {
        let mut state = ResponsesStreamState::default();
        state.handle(&json!({
            "type": "response.output_item.added",
            "output_index": 0,
            "item": {"type": "function_call", "call_id": "c", "name": "shell"},
        }));
        let end = state.handle(&json!({
            "type": "response.function_call_arguments.done",
            "output_index": 0,
            "arguments": "{broken",
        }));
        match &end[0] {
            StreamEvent::ToolCallEnd { tool_call } => {
                assert!(tool_call.arguments.is_empty());
                assert_eq!(tool_call.raw_arguments.as_deref(), Some("{broken"));
            }
            other => panic!("expected ToolCallEnd, got {other:?}"),
        }
    }

    #[test]
    fn test_stream_state_finish() {
        let mut state = ResponsesStreamState::default();
        let finish = state.handle(&json!({
            "type": "response.completed",
            "response": {
                "status": "completed",
                "output": [],
                "usage": {"input_tokens": 3, "output_tokens": 7},
            },
        }));
        match &finish[0] {
            StreamEvent::Finish {
                finish_reason,
                usage,
            } => {
                assert_eq!(finish_reason.reason, FinishReasonKind::Stop);
                assert_eq!(usage.output_tokens, 7);
            }
            other => panic!("expected Finish, got {other:?}"),
        }
    }
}
