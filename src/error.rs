//! Error types for the agentry runtime.
//!
//! Every failure surfaced by the crate is an [`Error`]. Provider-side
//! failures (HTTP 4xx/5xx envelopes) carry a [`ProviderFailure`] with the
//! provider name, status code, optional `retry-after` hint, and the raw
//! response body. [`Error::retryable`] reflects the taxonomy used by the
//! retry engine: rate limits, server errors, timeouts, network and stream
//! failures retry; everything else propagates immediately.

use serde_json::Value;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Context attached to an error returned by a provider's HTTP API.
#[derive(Debug, Clone, Default)]
pub struct ProviderFailure {
    /// Human-readable message extracted from the provider's error envelope.
    pub message: String,

    /// Provider identifier (e.g. "openai", "anthropic").
    pub provider: String,

    /// HTTP status code, when the failure came from an HTTP response.
    pub status_code: Option<u16>,

    /// Provider-specific error code, when one was present.
    pub error_code: Option<String>,

    /// Parsed `retry-after` header, in seconds.
    pub retry_after: Option<f64>,

    /// The original JSON error body.
    pub raw: Option<Value>,
}

impl ProviderFailure {
    /// Creates a failure with just a message and provider name.
    pub fn new(message: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            provider: provider.into(),
            ..Self::default()
        }
    }
}

/// Main error type for the runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// 401 - Invalid API key or credentials
    #[error("authentication failed: {}", .0.message)]
    Authentication(ProviderFailure),

    /// 403 - Permission denied
    #[error("access denied: {}", .0.message)]
    AccessDenied(ProviderFailure),

    /// 404 - Resource (model, endpoint) not found
    #[error("not found: {}", .0.message)]
    NotFound(ProviderFailure),

    /// 400/422 - Malformed request
    #[error("invalid request: {}", .0.message)]
    InvalidRequest(ProviderFailure),

    /// 429 - Rate limit exceeded
    #[error("rate limited: {}", .0.message)]
    RateLimit(ProviderFailure),

    /// 500-599 - Provider server error
    #[error("server error: {}", .0.message)]
    Server(ProviderFailure),

    /// Response blocked by the provider's safety filter
    #[error("content filtered: {}", .0.message)]
    ContentFilter(ProviderFailure),

    /// 413 - Input too long for the model's context window
    #[error("context length exceeded: {}", .0.message)]
    ContextLength(ProviderFailure),

    /// Usage quota exhausted
    #[error("quota exceeded: {}", .0.message)]
    QuotaExceeded(ProviderFailure),

    /// 408 - Request timed out
    #[error("request timed out: {0}")]
    RequestTimeout(String),

    /// Network connectivity issue
    #[error("network error: {0}")]
    Network(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error from the execution environment
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error during streaming
    #[error("streaming error: {0}")]
    Stream(String),

    /// Operation was cancelled
    #[error("operation aborted: {0}")]
    Abort(String),

    /// Model produced an invalid tool call, or a tool could not be dispatched
    #[error("{0}")]
    InvalidToolCall(String),

    /// Structured output could not be parsed
    #[error("no object generated: {0}")]
    NoObjectGenerated(String),

    /// SDK misconfiguration
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Tool execution failed
    #[error("{0}")]
    Tool(String),

    /// Spawning a subagent beyond the configured depth
    #[error("maximum subagent depth reached")]
    SubagentDepth,
}

impl Error {
    /// Create a new configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new streaming error
    pub fn stream(msg: impl Into<String>) -> Self {
        Error::Stream(msg.into())
    }

    /// Create a new tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Error::Tool(msg.into())
    }

    /// Create a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Create a new abort error
    pub fn abort(msg: impl Into<String>) -> Self {
        Error::Abort(msg.into())
    }

    /// Whether the retry engine may re-attempt the failed operation.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit(_)
                | Error::Server(_)
                | Error::RequestTimeout(_)
                | Error::Network(_)
                | Error::Http(_)
                | Error::Stream(_)
        )
    }

    /// Provider failure details, when this error came from a provider API.
    pub fn provider_failure(&self) -> Option<&ProviderFailure> {
        match self {
            Error::Authentication(f)
            | Error::AccessDenied(f)
            | Error::NotFound(f)
            | Error::InvalidRequest(f)
            | Error::RateLimit(f)
            | Error::Server(f)
            | Error::ContentFilter(f)
            | Error::ContextLength(f)
            | Error::QuotaExceeded(f) => Some(f),
            _ => None,
        }
    }

    /// Server-suggested retry delay in seconds, when one was provided.
    pub fn retry_after(&self) -> Option<f64> {
        self.provider_failure().and_then(|f| f.retry_after)
    }
}

/// Create the appropriate error from an HTTP status code and message.
///
/// Known status codes map directly (400/422 invalid request, 401
/// authentication, 403 access denied, 404 not found, 408 timeout, 413
/// context length, 429 rate limit, 5xx server). Unmapped codes fall back
/// to message-substring classification, and finally to a retryable
/// server error.
pub fn error_from_status_code(
    status_code: u16,
    message: &str,
    provider: &str,
    retry_after: Option<f64>,
    raw: Option<Value>,
) -> Error {
    let failure = ProviderFailure {
        message: message.to_string(),
        provider: provider.to_string(),
        status_code: Some(status_code),
        error_code: None,
        retry_after,
        raw,
    };

    match status_code {
        400 | 422 => Error::InvalidRequest(failure),
        401 => Error::Authentication(failure),
        403 => Error::AccessDenied(failure),
        404 => Error::NotFound(failure),
        408 => Error::RequestTimeout(message.to_string()),
        413 => Error::ContextLength(failure),
        429 => Error::RateLimit(failure),
        500 | 502 | 503 | 504 => Error::Server(failure),
        _ => classify_by_message(failure),
    }
}

fn classify_by_message(failure: ProviderFailure) -> Error {
    let msg = failure.message.to_lowercase();

    if msg.contains("not found") || msg.contains("does not exist") {
        return Error::NotFound(failure);
    }
    if msg.contains("unauthorized") || msg.contains("invalid key") {
        return Error::Authentication(failure);
    }
    if msg.contains("context length") || msg.contains("too many tokens") {
        return Error::ContextLength(failure);
    }
    if msg.contains("content filter") || msg.contains("safety") {
        return Error::ContentFilter(failure);
    }

    Error::Server(failure)
}
