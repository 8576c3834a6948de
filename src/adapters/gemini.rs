//! Gemini adapter (`POST /v1beta/models/{model}:generateContent`).
//!
//! Roles map `assistant -> model` and `user`/`tool -> user`. Tool calls
//! become `functionCall` parts and results become `functionResponse`
//! parts, which carry the *function name* rather than a call id - so the
//! translator remembers the call-id to name mapping and synthesizes
//! `call_N` ids when the model omits them. Streaming does not deliver
//! function-call arguments incrementally: each `functionCall` part yields
//! an immediate start/end pair.

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
use crate::types::{ContentPart, Message, Role, ToolArguments, ToolCallPart};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const ERROR_FALLBACK: &str = "Gemini API error";

/// Adapter for Gemini's `generateContent` API.
pub struct GeminiAdapter {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
    owns_client: bool,
}

impl GeminiAdapter {
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

    fn complete_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        )
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        )
    }

    fn build_payload(&self, request: &Request) -> Value {
        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(translate_messages(&request.messages)),
        );

        if let Some(instruction) = extract_system_instruction(&request.messages) {
            payload.insert("systemInstruction".to_string(), instruction);
        }

        if let Some(tools) = &request.tools {
            if !tools.is_empty() {
                let declarations: Vec<Value> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        })
                    })
                    .collect();
                payload.insert(
                    "tools".to_string(),
                    json!([{ "functionDeclarations": declarations }]),
                );
            }
        }

        if let Some(tool_config) = translate_tool_choice(request) {
            payload.insert("toolConfig".to_string(), tool_config);
        }

        let generation_config = translate_generation_config(request);
        if !generation_config.is_empty() {
            payload.insert(
                "generationConfig".to_string(),
                Value::Object(generation_config),
            );
        }

        Value::Object(payload)
    }

    fn parse_response(&self, raw: Value, request_model: &str) -> Response {
        let mut content: Vec<ContentPart> = Vec::new();
        let mut saw_tool_call = false;

        let candidate = raw
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .cloned()
            .unwrap_or(json!({}));

        if let Some(parts) = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
        {
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    content.push(ContentPart::text(text));
                }
                if let Some(function_call) = part.get("functionCall").and_then(Value::as_object) {
                    saw_tool_call = true;
                    content.push(ContentPart::ToolCall(function_call_part(function_call)));
                }
            }
        }

        let finish_raw = candidate
            .get("finishReason")
            .and_then(Value::as_str)
            .map(str::to_string);

        Response {
            id: raw
                .get("responseId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            model: raw
                .get("modelVersion")
                .and_then(Value::as_str)
                .unwrap_or(request_model)
                .to_string(),
            provider: self.name().to_string(),
            message: Message::new(Role::Assistant, content),
            finish_reason: map_finish_reason(finish_raw.as_deref(), saw_tool_call),
            usage: parse_usage(raw.get("usageMetadata")),
            raw: Some(raw),
            warnings: Vec::new(),
            rate_limit: None,
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: Request) -> Result<Response> {
        let response = self
            .http
            .post(self.complete_url(&request.model))
            .json(&self.build_payload(&request))
            .send()
            .await?;

        if response.status().as_u16() >= 400 {
            return Err(decode_http_error(self.name(), ERROR_FALLBACK, response).await);
        }

        let raw: Value = response.json().await?;
        Ok(self.parse_response(raw, &request.model))
    }

    async fn stream(&self, request: Request) -> Result<EventStream> {
        let response = self
            .http
            .post(self.stream_url(&request.model))
            .json(&self.build_payload(&request))
            .send()
            .await?;

        if response.status().as_u16() >= 400 {
            return Err(decode_http_error(self.name(), ERROR_FALLBACK, response).await);
        }

        let (tx, rx) = mpsc::channel::<Result<StreamEvent>>(64);
        tokio::spawn(async move {
            let mut state = GeminiStreamState::default();
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
            // Upstream closed without a finishReason: synthesize the
            // terminal event with whatever usage was last seen.
            for item in state.finish() {
                if tx.send(Ok(item)).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

fn extract_system_instruction(messages: &[Message]) -> Option<Value> {
    let mut parts = Vec::new();
    for message in messages {
        if !matches!(message.role, Role::System | Role::Developer) {
            continue;
        }
        for part in &message.content {
            if let ContentPart::Text(text) = part {
                parts.push(json!({ "text": text.text }));
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(json!({ "parts": parts }))
    }
}

fn translate_messages(messages: &[Message]) -> Vec<Value> {
    let mut translated: Vec<Value> = Vec::new();
    // functionResponse parts name the function, not the call. Remember
    // each call id's function name; anonymous calls queue their names so
    // an id-less result can recover the oldest unmatched one.
    let mut call_name_by_id: std::collections::HashMap<String, String> =
        std::collections::HashMap::new();
    let mut anonymous_call_names: std::collections::VecDeque<String> =
        std::collections::VecDeque::new();
    let mut synthetic_counter = 0u32;

    for message in messages {
        if matches!(message.role, Role::System | Role::Developer) {
            continue;
        }

        let role = if message.role == Role::Assistant {
            "model"
        } else {
            "user"
        };
        let mut parts: Vec<Value> = Vec::new();

        for part in &message.content {
            match part {
                ContentPart::Text(text) => {
                    parts.push(json!({ "text": text.text }));
                }
                ContentPart::ToolCall(call) => {
                    let mut call_id = call.id.trim().to_string();
                    if call_id.is_empty() {
                        synthetic_counter += 1;
                        call_id = format!("call_{synthetic_counter}");
                        anonymous_call_names.push_back(call.name.clone());
                    }
                    call_name_by_id.insert(call_id.clone(), call.name.clone());

                    parts.push(json!({
                        "functionCall": {
                            "id": call_id,
                            "name": call.name,
                            "args": call.arguments.object(),
                        }
                    }));
                }
                ContentPart::ToolResult(result) => {
                    let tool_call_id = result.tool_call_id.trim();
                    let function_name = call_name_by_id
                        .get(tool_call_id)
                        .cloned()
                        .or_else(|| {
                            if tool_call_id.is_empty() {
                                anonymous_call_names.pop_front()
                            } else {
                                None
                            }
                        })
                        .unwrap_or_else(|| "tool".to_string());

                    let mut response_payload = match result.content.as_value() {
                        Value::Object(map) => map,
                        other => {
                            let mut map = Map::new();
                            map.insert("content".to_string(), other);
                            map
                        }
                    };
                    if result.is_error {
                        response_payload.insert("is_error".to_string(), json!(true));
                    }

                    parts.push(json!({
                        "functionResponse": {
                            "name": function_name,
                            "response": response_payload,
                        }
                    }));
                }
                _ => {}
            }
        }

        if !parts.is_empty() {
            translated.push(json!({ "role": role, "parts": parts }));
        }
    }

    translated
}

fn translate_tool_choice(request: &Request) -> Option<Value> {
    let choice = request.tool_choice.as_ref()?;
    let config = match choice.mode {
        ToolChoiceMode::None => json!({ "mode": "NONE" }),
        ToolChoiceMode::Required => json!({ "mode": "ANY" }),
        ToolChoiceMode::Named => {
            let name = choice.tool_name.as_ref()?;
            json!({ "mode": "ANY", "allowedFunctionNames": [name] })
        }
        ToolChoiceMode::Auto => json!({ "mode": "AUTO" }),
    };
    Some(json!({ "functionCallingConfig": config }))
}

fn translate_generation_config(request: &Request) -> Map<String, Value> {
    let mut config = Map::new();

    if let Some(temperature) = request.temperature {
        config.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = request.top_p {
        config.insert("topP".to_string(), json!(top_p));
    }
    if let Some(max_tokens) = request.max_tokens {
        config.insert("maxOutputTokens".to_string(), json!(max_tokens));
    }
    if let Some(stop) = &request.stop_sequences {
        if !stop.is_empty() {
            config.insert("stopSequences".to_string(), json!(stop));
        }
    }

    if let Some(format) = &request.response_format {
        if format.format_type == crate::request::ResponseFormatType::JsonSchema {
            if let Some(schema) = &format.json_schema {
                config.insert("responseMimeType".to_string(), json!("application/json"));
                config.insert("responseSchema".to_string(), schema.clone());
            }
        }
    }

    config
}

fn function_call_part(function_call: &Map<String, Value>) -> ToolCallPart {
    let id = function_call
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .or_else(|| function_call.get("name").and_then(Value::as_str))
        .unwrap_or("call")
        .to_string();
    ToolCallPart {
        id,
        name: function_call
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        arguments: ToolArguments::Object(
            function_call
                .get("args")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        ),
        call_type: "function".to_string(),
    }
}

fn stream_tool_call(function_call: &Map<String, Value>) -> ToolCall {
    let part = function_call_part(function_call);
    ToolCall::new(part.id, part.name, part.arguments.object())
}

fn map_finish_reason(raw_reason: Option<&str>, has_tool_call: bool) -> FinishReason {
    if has_tool_call {
        return FinishReason::new(
            FinishReasonKind::ToolCalls,
            raw_reason.map(str::to_string),
        );
    }

    let kind = match raw_reason {
        Some("STOP") => FinishReasonKind::Stop,
        Some("MAX_TOKENS") => FinishReasonKind::Length,
        Some("SAFETY" | "PROHIBITED_CONTENT") => FinishReasonKind::ContentFilter,
        Some("MALFORMED_FUNCTION_CALL") => FinishReasonKind::Error,
        _ => FinishReasonKind::Other,
    };
    FinishReason::new(kind, raw_reason.map(str::to_string))
}

fn parse_usage(usage_metadata: Option<&Value>) -> Usage {
    let empty = Map::new();
    let usage_data = usage_metadata.and_then(Value::as_object).unwrap_or(&empty);

    let input_tokens = usage_data
        .get("promptTokenCount")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let mut output_tokens = usage_data
        .get("candidatesTokenCount")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    // Some responses only report the total; recover output as the excess
    // over the prompt.
    if output_tokens == 0 {
        if let Some(total) = usage_data.get("totalTokenCount").and_then(Value::as_u64) {
            output_tokens = total.saturating_sub(input_tokens);
        }
    }

    Usage {
        input_tokens,
        output_tokens,
        reasoning_tokens: usage_data
            .get("thoughtsTokenCount")
            .and_then(Value::as_u64),
        cache_read_tokens: usage_data
            .get("cachedContentTokenCount")
            .and_then(Value::as_u64),
        cache_write_tokens: None,
        raw: Some(Value::Object(usage_data.clone())),
    }
}

/// Pure streaming state machine for `streamGenerateContent` chunks.
#[derive(Default)]
struct GeminiStreamState {
    text_started: bool,
    saw_tool_call: bool,
    finish_emitted: bool,
    latest_finish_reason: Option<String>,
    latest_usage: Option<Value>,
}

impl GeminiStreamState {
    fn handle(&mut self, event: &Value) -> Vec<StreamEvent> {
        let mut out = Vec::new();

        let Some(candidate) = event
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(Value::as_object)
        else {
            return out;
        };

        if let Some(parts) = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
        {
            for part in parts {
                if let Some(text) = part.get("text").and_then(Value::as_str) {
                    if !text.is_empty() {
                        if !self.text_started {
                            self.text_started = true;
                            out.push(StreamEvent::TextStart {
                                text_id: "0".to_string(),
                            });
                        }
                        out.push(StreamEvent::TextDelta {
                            text_id: "0".to_string(),
                            delta: text.to_string(),
                        });
                    }
                }

                if let Some(function_call) = part.get("functionCall").and_then(Value::as_object) {
                    self.saw_tool_call = true;
                    // Arguments arrive whole; start and end are adjacent.
                    let tool_call = stream_tool_call(function_call);
                    out.push(StreamEvent::ToolCallStart {
                        tool_call: tool_call.clone(),
                    });
                    out.push(StreamEvent::ToolCallEnd { tool_call });
                }
            }
        }

        if let Some(finish_reason) = candidate.get("finishReason").and_then(Value::as_str) {
            self.latest_finish_reason = Some(finish_reason.to_string());
        }
        if let Some(usage_metadata) = event.get("usageMetadata") {
            if usage_metadata.is_object() {
                self.latest_usage = Some(usage_metadata.clone());
            }
        }

        if self.latest_finish_reason.is_some() && !self.finish_emitted {
            self.finish_emitted = true;
            out.push(self.finish_event());
        }

        out
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finish_emitted {
            return Vec::new();
        }
        self.finish_emitted = true;
        vec![self.finish_event()]
    }

    fn finish_event(&self) -> StreamEvent {
        StreamEvent::Finish {
            finish_reason: map_finish_reason(
                self.latest_finish_reason.as_deref(),
                self.saw_tool_call,
            ),
            usage: parse_usage(self.latest_usage.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ToolChoice, ToolDefinition};

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new("gm-test")
    }

    fn request_with(messages: Vec<Message>) -> Request {
        Request::new("gemini-3-pro-preview", messages)
    }

    #[test]
    fn test_system_instruction_and_roles() {
        let request = request_with(vec![
            Message::system("be helpful"),
            Message::user("hi"),
            Message::assistant("hello"),
        ]);
        let payload = adapter().build_payload(&request);

        assert_eq!(
            payload["systemInstruction"],
            json!({"parts": [{"text": "be helpful"}]})
        );
        let contents = payload["contents"].as_array().unwrap();
        assert_eq!(contents[0]["role"], json!("user"));
        assert_eq!(contents[1]["role"], json!("model"));
    }

    #[test]
    fn test_tool_result_recovers_function_name_by_call_id() {
        let mut args = Map::new();
        args.insert("pattern".to_string(), json!("*.rs"));
        let request = request_with(vec![
            Message::new(
                Role::Assistant,
                vec![ContentPart::tool_call("t1", "glob", ToolArguments::Object(args))],
            ),
            Message::tool_result("t1", "src/lib.rs", false),
        ]);
        let payload = adapter().build_payload(&request);
        let contents = payload["contents"].as_array().unwrap();

        let call = &contents[0]["parts"][0]["functionCall"];
        assert_eq!(call["id"], json!("t1"));
        let response = &contents[1]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], json!("glob"));
        assert_eq!(response["response"], json!({"content": "src/lib.rs"}));
    }

    #[test]
    fn test_empty_call_id_synthesized_and_matched() {
        let request = request_with(vec![
            Message::new(
                Role::Assistant,
                vec![ContentPart::tool_call("", "shell", ToolArguments::empty())],
            ),
            Message::tool_result("", "done", false),
        ]);
        let payload = adapter().build_payload(&request);
        let contents = payload["contents"].as_array().unwrap();

        assert_eq!(
            contents[0]["parts"][0]["functionCall"]["id"],
            json!("call_1")
        );
        // The id-less result pops the oldest unmatched function name.
        assert_eq!(
            contents[1]["parts"][0]["functionResponse"]["name"],
            json!("shell")
        );
    }

    #[test]
    fn test_error_result_injects_flag() {
        let request = request_with(vec![
            Message::new(
                Role::Assistant,
                vec![ContentPart::tool_call("t1", "shell", ToolArguments::empty())],
            ),
            Message::tool_result("t1", "Tool error (shell): boom", true),
        ]);
        let payload = adapter().build_payload(&request);
        let response = &payload["contents"][1]["parts"][0]["functionResponse"]["response"];
        assert_eq!(response["is_error"], json!(true));
    }

    #[test]
    fn test_tool_choice_mapping() {
        let base = request_with(vec![Message::user("hi")]);

        let none = adapter().build_payload(&base.clone().with_tool_choice(ToolChoice::none()));
        assert_eq!(
            none["toolConfig"]["functionCallingConfig"]["mode"],
            json!("NONE")
        );

        let named =
            adapter().build_payload(&base.clone().with_tool_choice(ToolChoice::named("grep")));
        assert_eq!(
            named["toolConfig"]["functionCallingConfig"],
            json!({"mode": "ANY", "allowedFunctionNames": ["grep"]})
        );

        let auto = adapter().build_payload(&base.with_tool_choice(ToolChoice::auto()));
        assert_eq!(
            auto["toolConfig"]["functionCallingConfig"]["mode"],
            json!("AUTO")
        );
    }

    #[test]
    fn test_tool_declarations_and_json_schema() {
        let mut request = request_with(vec![Message::user("hi")]).with_response_format(
            crate::request::ResponseFormat::json_schema(json!({"type": "object"}), true),
        );
        request.tools = Some(vec![ToolDefinition::new(
            "grep",
            "search",
            json!({"type": "object"}),
        )]);
        let payload = adapter().build_payload(&request);

        assert_eq!(
            payload["tools"][0]["functionDeclarations"][0]["name"],
            json!("grep")
        );
        assert_eq!(
            payload["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(
            payload["generationConfig"]["responseSchema"],
            json!({"type": "object"})
        );
    }

    #[test]
    fn test_parse_response_tool_call_overrides_finish() {
        let raw = json!({
            "responseId": "g1",
            "modelVersion": "gemini-3-pro-preview",
            "candidates": [{
                "content": {"parts": [
                    {"text": "let me look"},
                    {"functionCall": {"name": "glob", "args": {"pattern": "*.py"}}},
                ]},
                "finishReason": "STOP",
            }],
            "usageMetadata": {"promptTokenCount": 4, "totalTokenCount": 10},
        });
        let response = adapter().parse_response(raw, "gemini-3-pro-preview");

        assert_eq!(response.finish_reason.reason, FinishReasonKind::ToolCalls);
        // Id falls back to the function name when the model omits it.
        assert_eq!(response.tool_calls()[0].id, "glob");
        // Output recovered from totalTokenCount - promptTokenCount.
        assert_eq!(response.usage.output_tokens, 6);
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(
            map_finish_reason(Some("STOP"), false).reason,
            FinishReasonKind::Stop
        );
        assert_eq!(
            map_finish_reason(Some("MAX_TOKENS"), false).reason,
            FinishReasonKind::Length
        );
        assert_eq!(
            map_finish_reason(Some("SAFETY"), false).reason,
            FinishReasonKind::ContentFilter
        );
        assert_eq!(
            map_finish_reason(Some("MALFORMED_FUNCTION_CALL"), false).reason,
            FinishReasonKind::Error
        );
        assert_eq!(
            map_finish_reason(Some("STOP"), true).reason,
            FinishReasonKind::ToolCalls
        );
    }

    #[test]
    fn test_stream_state_text_then_finish() {
        let mut state = GeminiStreamState::default();

        let first = state.handle(&json!({
            "candidates": [{"content": {"parts": [{"text": "hel"}]}}],
        }));
        assert!(matches!(&first[0], StreamEvent::TextStart { .. }));
        assert!(matches!(&first[1], StreamEvent::TextDelta { delta, .. } if delta == "hel"));

        let second = state.handle(&json!({
            "candidates": [{"content": {"parts": [{"text": "lo"}]},
                            "finishReason": "STOP"}],
            "usageMetadata": {"promptTokenCount": 2, "candidatesTokenCount": 3},
        }));
        // One delta, then the finish.
        assert!(matches!(&second[0], StreamEvent::TextDelta { .. }));
        match &second[1] {
            StreamEvent::Finish {
                finish_reason,
                usage,
            } => {
                assert_eq!(finish_reason.reason, FinishReasonKind::Stop);
                assert_eq!(usage.output_tokens, 3);
            }
            other => panic!("expected Finish, got {other:?}"),
        }
        // No synthetic tail after a real finish.
        assert!(state.finish().is_empty());
    }

    #[test]
    fn test_stream_state_function_call_immediate_start_end() {
        let mut state = GeminiStreamState::default();
        let events = state.handle(&json!({
            "candidates": [{"content": {"parts": [
                {"functionCall": {"id": "t1", "name": "shell", "args": {"command": "ls"}}},
            ]}}],
        }));

        assert!(matches!(&events[0], StreamEvent::ToolCallStart { .. }));
        match &events[1] {
            StreamEvent::ToolCallEnd { tool_call } => {
                assert_eq!(tool_call.arguments.get("command"), Some(&json!("ls")));
            }
            other => panic!("expected ToolCallEnd, got {other:?}"),
        }
    }

    #[test]
    fn test_stream_state_synthesizes_finish_on_truncated_stream() {
        let mut state = GeminiStreamState::default();
        state.handle(&json!({
            "candidates": [{"content": {"parts": [{"text": "partial"}]}}],
        }));

        let tail = state.finish();
        assert_eq!(tail.len(), 1);
        match &tail[0] {
            StreamEvent::Finish {
                finish_reason,
                usage,
            } => {
                assert_eq!(finish_reason.reason, FinishReasonKind::Other);
                // No usage was ever reported; counts stay zero.
                assert_eq!(usage.total_tokens(), 0);
            }
            other => panic!("expected Finish, got {other:?}"),
        }
    }
}
