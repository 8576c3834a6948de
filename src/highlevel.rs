//! High-level helpers for common LLM workflows: [`generate`] (multi-step
//! tool loop), [`stream`] (event stream with a final assembled response),
//! and [`generate_object`] (JSON-schema structured output).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{Stream, StreamExt};
use serde_json::{Map, Value};

use crate::adapters::EventStream;
use crate::client::Client;
use crate::error::{Error, Result};
use crate::request::{Request, ResponseFormat, ToolChoice, ToolDefinition};
use crate::response::{FinishReason, Response, StreamEvent, Usage};
use crate::types::{ContentPart, Message, Role, ToolArguments};

/// Async tool handler invoked by the [`generate`] loop.
///
/// Handlers receive the parsed tool arguments and return a JSON value to
/// feed back to the model. Errors become error tool results; they never
/// abort the loop.
pub type ToolHandler = Arc<
    dyn Fn(Map<String, Value>) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>>
        + Send
        + Sync,
>;

/// Options for [`generate`], [`stream`], and [`generate_object`].
///
/// Exactly one of `prompt` and `messages` must be set; `system` prepends
/// a system message to either.
#[derive(Clone)]
pub struct GenerateOptions {
    pub prompt: Option<String>,
    pub messages: Option<Vec<Message>>,
    pub system: Option<String>,
    pub provider: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_handlers: HashMap<String, ToolHandler>,
    pub tool_choice: Option<ToolChoice>,
    pub response_format: Option<ResponseFormat>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub reasoning_effort: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub provider_options: Option<Value>,
    /// Ceiling on completion/tool rounds; at least one step always runs.
    pub max_steps: u32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            prompt: None,
            messages: None,
            system: None,
            provider: None,
            tools: None,
            tool_handlers: HashMap::new(),
            tool_choice: None,
            response_format: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop_sequences: None,
            reasoning_effort: None,
            metadata: None,
            provider_options: None,
            max_steps: 8,
        }
    }
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Register a tool definition together with its handler.
    pub fn tool(mut self, definition: ToolDefinition, handler: ToolHandler) -> Self {
        self.tool_handlers
            .insert(definition.name.clone(), handler);
        self.tools.get_or_insert_with(Vec::new).push(definition);
        self
    }

    pub fn tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn response_format(mut self, response_format: ResponseFormat) -> Self {
        self.response_format = Some(response_format);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    pub fn max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    fn to_request(&self, model: &str, messages: Vec<Message>) -> Request {
        Request {
            model: model.to_string(),
            messages,
            provider: self.provider.clone(),
            tools: self.tools.clone(),
            tool_choice: self.tool_choice.clone(),
            response_format: self.response_format.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stop_sequences: self.stop_sequences.clone(),
            reasoning_effort: self.reasoning_effort.clone(),
            metadata: self.metadata.clone(),
            provider_options: self.provider_options.clone(),
        }
    }
}

/// Outcome of a [`generate`] run.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    /// One response per completion step, in order.
    pub steps: Vec<Response>,
    /// Field-wise sum of every step's usage.
    pub total_usage: Usage,
}

impl GenerateResult {
    /// The final response.
    pub fn response(&self) -> &Response {
        // steps is never empty: generate always runs at least one step.
        &self.steps[self.steps.len() - 1]
    }
}

fn build_messages(options: &GenerateOptions) -> Result<Vec<Message>> {
    let mut messages = match (&options.prompt, &options.messages) {
        (Some(prompt), None) => vec![Message::user(prompt.clone())],
        (None, Some(messages)) => messages.clone(),
        _ => {
            return Err(Error::configuration("Pass either prompt or messages"));
        }
    };

    if let Some(system) = &options.system {
        messages.insert(0, Message::system(system.clone()));
    }

    Ok(messages)
}

/// Run a multi-step completion/tool loop.
///
/// Each step sends the accumulated conversation, appends the response,
/// and - when the model called tools - executes each handler and feeds
/// the results back. The loop stops when the model produces no tool
/// calls, no tools are configured, or `max_steps` is reached. A missing
/// handler yields an `Unknown tool: <name>` error result; a handler
/// error becomes the error content of its tool result.
pub async fn generate(
    client: &Client,
    model: &str,
    options: GenerateOptions,
) -> Result<GenerateResult> {
    let mut conversation = build_messages(&options)?;
    let mut steps: Vec<Response> = Vec::new();
    let mut total_usage = Usage::default();

    for _step in 0..options.max_steps.max(1) {
        let request = options.to_request(model, conversation.clone());
        let response = client.complete(request).await?;
        total_usage = total_usage + response.usage.clone();
        let tool_calls = response.tool_calls();
        let message = response.message.clone();
        steps.push(response);

        if options.tools.is_none() || tool_calls.is_empty() {
            break;
        }

        conversation.push(message);
        for call in tool_calls {
            let result_message = match options.tool_handlers.get(&call.name) {
                None => Message::tool_result(
                    call.id.clone(),
                    format!("Unknown tool: {}", call.name),
                    true,
                ),
                Some(handler) => match handler(call.arguments.clone()).await {
                    Ok(value) => {
                        let content = match value {
                            Value::String(text) => text,
                            other => other.to_string(),
                        };
                        Message::tool_result(call.id.clone(), content, false)
                    }
                    Err(error) => Message::tool_result(call.id.clone(), error.to_string(), true),
                },
            };
            conversation.push(result_message);
        }
    }

    Ok(GenerateResult { steps, total_usage })
}

// ============================================================================
// STREAMING
// ============================================================================

/// Accumulate stream events into a final [`Response`].
pub struct StreamAccumulator {
    model: String,
    provider: String,
    text: String,
    reasoning: String,
    tool_calls: Vec<ToolCallAccumulator>,
    tool_index: HashMap<String, usize>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

struct ToolCallAccumulator {
    id: String,
    name: String,
    raw_arguments: String,
    arguments: Map<String, Value>,
}

impl StreamAccumulator {
    pub fn new(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            text: String::new(),
            reasoning: String::new(),
            tool_calls: Vec::new(),
            tool_index: HashMap::new(),
            finish_reason: None,
            usage: None,
        }
    }

    /// Fold one event into the accumulated state.
    pub fn process(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta { delta, .. } => self.text.push_str(delta),
            StreamEvent::ReasoningDelta { delta } => self.reasoning.push_str(delta),
            StreamEvent::ToolCallStart { tool_call } => {
                self.ensure_tool_call(&tool_call.id, &tool_call.name);
            }
            StreamEvent::ToolCallDelta { tool_call } => {
                let index = self.ensure_tool_call(&tool_call.id, &tool_call.name);
                if let Some(raw) = &tool_call.raw_arguments {
                    self.tool_calls[index].raw_arguments.push_str(raw);
                }
            }
            StreamEvent::ToolCallEnd { tool_call } => {
                let index = self.ensure_tool_call(&tool_call.id, &tool_call.name);
                if !tool_call.arguments.is_empty() {
                    self.tool_calls[index].arguments = tool_call.arguments.clone();
                }
            }
            StreamEvent::Finish {
                finish_reason,
                usage,
            } => {
                self.finish_reason = Some(finish_reason.clone());
                self.usage = Some(usage.clone());
            }
            _ => {}
        }
    }

    fn ensure_tool_call(&mut self, id: &str, name: &str) -> usize {
        if let Some(index) = self.tool_index.get(id) {
            return *index;
        }
        let index = self.tool_calls.len();
        self.tool_index.insert(id.to_string(), index);
        self.tool_calls.push(ToolCallAccumulator {
            id: id.to_string(),
            name: name.to_string(),
            raw_arguments: String::new(),
            arguments: Map::new(),
        });
        index
    }

    /// Synthesize the final response from accumulated state. Fails if no
    /// finish event was seen yet.
    pub fn response(&self) -> Result<Response> {
        let (Some(finish_reason), Some(usage)) = (&self.finish_reason, &self.usage) else {
            return Err(Error::stream("stream has not completed yet"));
        };

        let mut content: Vec<ContentPart> = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentPart::text(self.text.clone()));
        }
        if !self.reasoning.is_empty() {
            content.push(ContentPart::thinking(self.reasoning.clone()));
        }
        for call in &self.tool_calls {
            let arguments = if !call.arguments.is_empty() {
                call.arguments.clone()
            } else {
                crate::adapters::parse_argument_str(&call.raw_arguments)
            };
            content.push(ContentPart::tool_call(
                call.id.clone(),
                call.name.clone(),
                ToolArguments::Object(arguments),
            ));
        }

        Ok(Response {
            id: String::new(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            message: Message::new(Role::Assistant, content),
            finish_reason: finish_reason.clone(),
            usage: usage.clone(),
            raw: None,
            warnings: Vec::new(),
            rate_limit: None,
        })
    }
}

/// Event stream wrapper that also assembles the final [`Response`].
///
/// Iterate it like any stream; each yielded event is also folded into an
/// internal accumulator. [`StreamResult::response`] drains whatever
/// remains and returns the assembled response.
pub struct StreamResult {
    events: EventStream,
    accumulator: StreamAccumulator,
}

impl StreamResult {
    pub fn new(events: EventStream, accumulator: StreamAccumulator) -> Self {
        Self {
            events,
            accumulator,
        }
    }

    /// Drain any remaining events and assemble the final response.
    pub async fn response(mut self) -> Result<Response> {
        while let Some(event) = self.next().await {
            // Transport errors abort; the accumulator already saw every
            // successful event via poll_next.
            event?;
        }
        self.accumulator.response()
    }
}

impl Stream for StreamResult {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match this.events.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => {
                this.accumulator.process(&event);
                Poll::Ready(Some(Ok(event)))
            }
            other => other,
        }
    }
}

/// Start a streaming completion.
pub async fn stream(
    client: &Client,
    model: &str,
    options: GenerateOptions,
) -> Result<StreamResult> {
    let messages = build_messages(&options)?;
    let provider = options
        .provider
        .clone()
        .or_else(|| client.default_provider().map(str::to_string))
        .unwrap_or_default();
    let request = options.to_request(model, messages);
    let events = client.stream(request).await?;
    Ok(StreamResult::new(
        events,
        StreamAccumulator::new(model, provider),
    ))
}

// ============================================================================
// STRUCTURED OUTPUT
// ============================================================================

/// Providers with native JSON-schema response formats.
const NATIVE_JSON_SCHEMA_PROVIDERS: &[&str] = &["openai", "gemini"];

/// Generate a JSON value matching `json_schema`.
///
/// Providers with native schema support get a `json_schema` response
/// format; everything else gets an appended instruction to respond with
/// schema-conforming JSON. The final text must parse as JSON or the call
/// fails with [`Error::NoObjectGenerated`].
pub async fn generate_object(
    client: &Client,
    model: &str,
    json_schema: Value,
    options: GenerateOptions,
) -> Result<Value> {
    let effective_provider = options
        .provider
        .clone()
        .or_else(|| client.default_provider().map(str::to_string));
    let native = effective_provider
        .as_deref()
        .is_some_and(|provider| NATIVE_JSON_SCHEMA_PROVIDERS.contains(&provider));

    let result = if native {
        let options = GenerateOptions {
            response_format: Some(ResponseFormat::json_schema(json_schema, true)),
            ..options
        };
        generate(client, model, options).await?
    } else {
        let schema_text = serde_json::to_string(&json_schema)?;
        let instruction =
            format!("Respond with valid JSON only that matches this JSON schema: {schema_text}");

        let mut options = options;
        match (options.prompt.take(), options.messages.take()) {
            (Some(prompt), None) => {
                options.prompt = Some(format!("{prompt}\n\n{instruction}"));
            }
            (None, Some(mut messages)) => {
                messages.push(Message::user(instruction));
                options.messages = Some(messages);
            }
            (prompt, messages) => {
                options.prompt = prompt;
                options.messages = messages;
            }
        }
        generate(client, model, options).await?
    };

    let output = result.response().text();
    serde_json::from_str(output.trim())
        .map_err(|_| Error::NoObjectGenerated("Failed to parse generated object".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ProviderAdapter;
    use crate::response::FinishReasonKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Adapter that replays scripted responses and records requests.
    struct ScriptedAdapter {
        name: String,
        responses: Mutex<Vec<Response>>,
        requests: Mutex<Vec<Request>>,
    }

    impl ScriptedAdapter {
        fn new(name: &str, mut responses: Vec<Response>) -> Self {
            responses.reverse();
            Self {
                name: name.to_string(),
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn complete(&self, request: Request) -> Result<Response> {
            self.requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(request);
            self.responses
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .pop()
                .ok_or_else(|| Error::stream("script exhausted"))
        }

        async fn stream(&self, _request: Request) -> Result<EventStream> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    fn make_response(text: &str, tool_calls: Vec<(&str, &str, Value)>) -> Response {
        let mut content = vec![ContentPart::text(text)];
        for (id, name, arguments) in tool_calls {
            let map = arguments.as_object().cloned().unwrap_or_default();
            content.push(ContentPart::tool_call(id, name, ToolArguments::Object(map)));
        }
        let has_tools = content.len() > 1;
        Response {
            id: "r1".to_string(),
            model: "test-model".to_string(),
            provider: "scripted".to_string(),
            message: Message::new(Role::Assistant, content),
            finish_reason: if has_tools {
                FinishReason::tool_calls()
            } else {
                FinishReason::stop()
            },
            usage: Usage::new(2, 3),
            raw: None,
            warnings: Vec::new(),
            rate_limit: None,
        }
    }

    fn client_with(responses: Vec<Response>) -> (Client, Arc<ScriptedAdapter>) {
        let adapter = Arc::new(ScriptedAdapter::new("scripted", responses));
        let client = Client::with_adapter(adapter.clone());
        (client, adapter)
    }

    #[tokio::test]
    async fn test_generate_requires_exactly_one_input() {
        let (client, _) = client_with(vec![make_response("hi", vec![])]);

        let neither = generate(&client, "m", GenerateOptions::new()).await;
        assert!(matches!(neither, Err(Error::Configuration(_))));

        let both = generate(
            &client,
            "m",
            GenerateOptions::new()
                .prompt("a")
                .messages(vec![Message::user("b")]),
        )
        .await;
        assert!(matches!(both, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_generate_single_step() {
        let (client, adapter) = client_with(vec![make_response("done", vec![])]);
        let result = generate(
            &client,
            "m",
            GenerateOptions::new().prompt("go").system("be brief"),
        )
        .await
        .unwrap();

        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.response().text(), "done");
        assert_eq!(result.total_usage.input_tokens, 2);

        let requests = adapter
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        assert_eq!(requests[0].messages[0].role, Role::System);
        assert_eq!(requests[0].messages[1].text(), "go");
    }

    #[tokio::test]
    async fn test_generate_tool_loop_with_handler() {
        let (client, adapter) = client_with(vec![
            make_response("calling", vec![("t1", "add", json!({"a": 2, "b": 3}))]),
            make_response("sum is 5", vec![]),
        ]);

        let handler: ToolHandler = Arc::new(|arguments| {
            Box::pin(async move {
                let a = arguments.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = arguments.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!({"sum": a + b}))
            })
        });

        let result = generate(
            &client,
            "m",
            GenerateOptions::new().prompt("add").tool(
                ToolDefinition::new("add", "adds", json!({"type": "object"})),
                handler,
            ),
        )
        .await
        .unwrap();

        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.response().text(), "sum is 5");
        // Usage summed across both steps.
        assert_eq!(result.total_usage.output_tokens, 6);

        let requests = adapter
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Second request carries assistant turn plus the tool result.
        let tool_message = requests[1].messages.last().unwrap();
        assert_eq!(tool_message.role, Role::Tool);
        assert!(tool_message.content.iter().any(|part| matches!(
            part,
            ContentPart::ToolResult(result)
                if result.content.to_text().contains("\"sum\":5") && !result.is_error
        )));
    }

    #[tokio::test]
    async fn test_generate_unknown_tool_yields_error_result() {
        let (client, adapter) = client_with(vec![
            make_response("calling", vec![("t1", "mystery", json!({}))]),
            make_response("ok", vec![]),
        ]);

        let result = generate(
            &client,
            "m",
            GenerateOptions::new().prompt("go").tool(
                ToolDefinition::new("known", "known tool", json!({"type": "object"})),
                Arc::new(|_| Box::pin(async { Ok(json!("unused")) })),
            ),
        )
        .await
        .unwrap();
        assert_eq!(result.steps.len(), 2);

        let requests = adapter
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tool_message = requests[1].messages.last().unwrap();
        assert!(tool_message.content.iter().any(|part| matches!(
            part,
            ContentPart::ToolResult(result)
                if result.is_error && result.content.to_text() == "Unknown tool: mystery"
        )));
    }

    #[tokio::test]
    async fn test_generate_handler_error_becomes_error_result() {
        let (client, adapter) = client_with(vec![
            make_response("calling", vec![("t1", "boom", json!({}))]),
            make_response("recovered", vec![]),
        ]);

        let result = generate(
            &client,
            "m",
            GenerateOptions::new().prompt("go").tool(
                ToolDefinition::new("boom", "fails", json!({"type": "object"})),
                Arc::new(|_| Box::pin(async { Err(Error::tool("disk on fire")) })),
            ),
        )
        .await
        .unwrap();
        assert_eq!(result.response().text(), "recovered");

        let requests = adapter
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tool_message = requests[1].messages.last().unwrap();
        assert!(tool_message.content.iter().any(|part| matches!(
            part,
            ContentPart::ToolResult(result)
                if result.is_error && result.content.to_text() == "disk on fire"
        )));
    }

    #[tokio::test]
    async fn test_generate_respects_max_steps() {
        // The model asks for a tool every time; the loop must stop anyway.
        let responses = (0..4)
            .map(|_| make_response("again", vec![("t1", "echo", json!({}))]))
            .collect();
        let (client, adapter) = client_with(responses);

        let result = generate(
            &client,
            "m",
            GenerateOptions::new()
                .prompt("loop")
                .max_steps(3)
                .tool(
                    ToolDefinition::new("echo", "echo", json!({"type": "object"})),
                    Arc::new(|_| Box::pin(async { Ok(json!("echoed")) })),
                ),
        )
        .await
        .unwrap();

        assert_eq!(result.steps.len(), 3);
        assert_eq!(
            adapter
                .requests
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
            3
        );
    }

    #[test]
    fn test_accumulator_assembles_response() {
        let mut accumulator = StreamAccumulator::new("m", "openai");
        accumulator.process(&StreamEvent::TextStart {
            text_id: "0".to_string(),
        });
        accumulator.process(&StreamEvent::TextDelta {
            text_id: "0".to_string(),
            delta: "hel".to_string(),
        });
        accumulator.process(&StreamEvent::TextDelta {
            text_id: "0".to_string(),
            delta: "lo".to_string(),
        });
        accumulator.process(&StreamEvent::ReasoningDelta {
            delta: "thinking...".to_string(),
        });

        let mut call = crate::response::ToolCall::new("t1", "grep", Map::new());
        accumulator.process(&StreamEvent::ToolCallStart {
            tool_call: call.clone(),
        });
        call.raw_arguments = Some(r#"{"pattern": "x"}"#.to_string());
        accumulator.process(&StreamEvent::ToolCallDelta {
            tool_call: call.clone(),
        });
        call.raw_arguments = None;
        accumulator.process(&StreamEvent::ToolCallEnd { tool_call: call });

        // Not complete until a finish arrives.
        assert!(accumulator.response().is_err());

        accumulator.process(&StreamEvent::Finish {
            finish_reason: FinishReason::tool_calls(),
            usage: Usage::new(4, 9),
        });

        let response = accumulator.response().unwrap();
        assert_eq!(response.text(), "hello");
        assert_eq!(response.reasoning().as_deref(), Some("thinking..."));
        assert_eq!(response.finish_reason.reason, FinishReasonKind::ToolCalls);
        assert_eq!(response.usage.output_tokens, 9);
        // Arguments recovered from buffered raw deltas.
        let calls = response.tool_calls();
        assert_eq!(calls[0].arguments.get("pattern"), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_stream_result_drains_and_assembles() {
        let events: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEvent::TextStart {
                text_id: "0".to_string(),
            }),
            Ok(StreamEvent::TextDelta {
                text_id: "0".to_string(),
                delta: "done".to_string(),
            }),
            Ok(StreamEvent::TextEnd {
                text_id: "0".to_string(),
            }),
            Ok(StreamEvent::Finish {
                finish_reason: FinishReason::stop(),
                usage: Usage::new(1, 1),
            }),
        ];
        let stream_result = StreamResult::new(
            Box::pin(futures::stream::iter(events)),
            StreamAccumulator::new("m", "p"),
        );
        let response = stream_result.response().await.unwrap();
        assert_eq!(response.text(), "done");
    }

    #[tokio::test]
    async fn test_generate_object_fallback_instruction() {
        let (client, adapter) = client_with(vec![make_response(r#"{"answer": 42}"#, vec![])]);
        // "scripted" has no native JSON-schema support, so the fallback
        // instruction is appended to the prompt instead.
        let value = generate_object(
            &client,
            "m",
            json!({"type": "object"}),
            GenerateOptions::new().prompt("answer?").provider("scripted"),
        )
        .await;
        assert_eq!(value.unwrap(), json!({"answer": 42}));
        let requests = adapter
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        assert!(requests[0].messages[0]
            .text()
            .contains("Respond with valid JSON only"));
        assert!(requests[0].response_format.is_none());
    }

    #[tokio::test]
    async fn test_generate_object_native_schema_sets_response_format() {
        let adapter = Arc::new(ScriptedAdapter::new(
            "openai",
            vec![make_response(r#"{"answer": 42}"#, vec![])],
        ));
        let client = Client::with_adapter(adapter.clone());

        let value = generate_object(
            &client,
            "m",
            json!({"type": "object"}),
            GenerateOptions::new().prompt("answer?"),
        )
        .await
        .unwrap();
        assert_eq!(value, json!({"answer": 42}));

        let requests = adapter
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let format = requests[0].response_format.as_ref().unwrap();
        assert_eq!(
            format.format_type,
            crate::request::ResponseFormatType::JsonSchema
        );
        assert!(format.strict);
        // No fallback instruction when the provider is schema-native.
        assert_eq!(requests[0].messages[0].text(), "answer?");
    }

    #[tokio::test]
    async fn test_generate_object_parse_failure() {
        let (client, _) = client_with(vec![make_response("not json at all", vec![])]);
        let value = generate_object(
            &client,
            "m",
            json!({"type": "object"}),
            GenerateOptions::new().prompt("answer?"),
        )
        .await;
        assert!(matches!(value, Err(Error::NoObjectGenerated(_))));
    }
}
