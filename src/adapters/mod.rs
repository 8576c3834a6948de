//! Provider adapters: translators between the unified request/response/
//! stream model and each provider's wire protocol.
//!
//! Every adapter implements [`ProviderAdapter`]. Shared translation rules:
//!
//! - system and developer messages are hoisted out of the message list
//!   into the provider's system-instruction slot; the outgoing payload
//!   never contains a `system` or `developer` role
//! - tool-call arguments serialize as JSON strings on wire protocols that
//!   expect strings, and as structured objects where the protocol accepts
//!   them; streamed argument deltas are buffered and parsed on block end,
//!   with a failed parse yielding empty arguments and the raw text
//!   preserved
//! - HTTP statuses >= 400 are classified through the shared status->kind
//!   table, with the message pulled from `.error.message`, then
//!   `.message`, then the raw body

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::Stream;
use serde_json::{Map, Value, json};

use crate::error::{Error, Result, error_from_status_code};
use crate::request::{Request, ToolChoiceMode};
use crate::response::{Response, StreamEvent};

mod anthropic;
mod gemini;
mod openai;
mod openai_compat;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAIAdapter;
pub use openai_compat::OpenAICompatAdapter;

/// A lazy sequence of stream events from one provider request.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Interface every provider adapter implements.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider identifier (e.g. "openai", "anthropic", "gemini").
    fn name(&self) -> &str;

    /// Send the request, block until the model finishes, return the full
    /// response.
    async fn complete(&self, request: Request) -> Result<Response>;

    /// Send the request and return a stream of events.
    async fn stream(&self, request: Request) -> Result<EventStream>;

    /// Validate configuration on startup.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources. Owned HTTP clients release their connection
    /// pool on drop, so the default is a no-op.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Whether a particular tool-choice mode is supported.
    fn supports_tool_choice(&self, _mode: ToolChoiceMode) -> bool {
        true
    }
}

/// Default per-adapter HTTP timeout in seconds.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub(crate) fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .expect("failed to build HTTP client")
}

/// Decode an HTTP error response into a taxonomy error.
pub(crate) async fn decode_http_error(
    provider: &str,
    fallback_message: &str,
    response: reqwest::Response,
) -> Error {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok());

    let body = response.text().await.unwrap_or_default();
    let raw: Value =
        serde_json::from_str(&body).unwrap_or_else(|_| json!({ "body": body.clone() }));

    let message = raw
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .or_else(|| raw.get("message").and_then(Value::as_str))
        .unwrap_or(fallback_message)
        .to_string();

    log::debug!("{provider} request failed with status {status}: {message}");
    error_from_status_code(status, &message, provider, retry_after, Some(raw))
}

/// Parse a raw tool-argument payload into an object. Strings are parsed
/// as JSON; anything unparseable or non-object yields an empty map.
pub(crate) fn parse_json_arguments(raw: &Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map.clone(),
        Value::String(text) => parse_argument_str(text),
        _ => Map::new(),
    }
}

pub(crate) fn parse_argument_str(text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Strip any trailing `/` so endpoint paths can be appended uniformly.
pub(crate) fn normalize_base_url(base_url: impl Into<String>) -> String {
    let mut url = base_url.into();
    while url.ends_with('/') {
        url.pop();
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_arguments_object_passthrough() {
        let raw = json!({"a": 1});
        assert_eq!(parse_json_arguments(&raw), raw.as_object().unwrap().clone());
    }

    #[test]
    fn test_parse_json_arguments_string_parse() {
        let raw = json!(r#"{"a": 1}"#);
        assert_eq!(parse_json_arguments(&raw).get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_parse_json_arguments_invalid_yields_empty() {
        assert!(parse_json_arguments(&json!("not json")).is_empty());
        assert!(parse_json_arguments(&json!(42)).is_empty());
        assert!(parse_json_arguments(&json!(["list"])).is_empty());
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://api.openai.com/"),
            "https://api.openai.com"
        );
        assert_eq!(normalize_base_url("http://localhost:1234"), "http://localhost:1234");
    }
}
