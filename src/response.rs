//! Response types: [`Response`], [`FinishReason`], [`Usage`], and the
//! [`StreamEvent`] union emitted by streaming adapters.
//!
//! # Stream event bracketing
//!
//! Every `*Start` event for a block is followed by zero or more `*Delta`
//! events and exactly one matching `*End`; exactly one [`StreamEvent::Finish`]
//! terminates a stream. Adapters that receive a truncated upstream stream
//! synthesize the missing `*End` and `Finish` events so consumers can rely
//! on the bracketing.

use std::ops::Add;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ContentPart, Message, ToolArguments, ToolResultContent};

// ============================================================================
// FINISH REASONS
// ============================================================================

/// Normalized label for why generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReasonKind {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Other,
}

/// Why generation stopped, with the provider's raw label attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishReason {
    pub reason: FinishReasonKind,

    /// The provider's own finish label, before normalization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl FinishReason {
    pub fn new(reason: FinishReasonKind, raw: Option<String>) -> Self {
        Self { reason, raw }
    }

    pub fn stop() -> Self {
        Self::new(FinishReasonKind::Stop, None)
    }

    pub fn tool_calls() -> Self {
        Self::new(FinishReasonKind::ToolCalls, None)
    }

    pub fn length() -> Self {
        Self::new(FinishReasonKind::Length, None)
    }

    pub fn other() -> Self {
        Self::new(FinishReasonKind::Other, None)
    }
}

// ============================================================================
// USAGE
// ============================================================================

/// Token usage statistics.
///
/// Addition is field-wise. For the optional fields, `None + None = None`;
/// otherwise `None` counts as zero. The `raw` provider payload does not
/// survive addition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        _ => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, other: Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            reasoning_tokens: add_optional(self.reasoning_tokens, other.reasoning_tokens),
            cache_read_tokens: add_optional(self.cache_read_tokens, other.cache_read_tokens),
            cache_write_tokens: add_optional(self.cache_write_tokens, other.cache_write_tokens),
            raw: None,
        }
    }
}

// ============================================================================
// TOOL CALLS AND RESULTS
// ============================================================================

/// A parsed tool call extracted from a response or a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,

    /// Parsed arguments; empty when the provider's raw text did not parse.
    pub arguments: Map<String, Value>,

    /// The raw argument text, when the provider streamed arguments as
    /// token deltas.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            raw_arguments: None,
        }
    }
}

/// Result of executing a tool call, as recorded in session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: ToolResultContent,
    #[serde(default)]
    pub is_error: bool,
}

// ============================================================================
// RESPONSE
// ============================================================================

/// A non-fatal issue attached to a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Rate-limit metadata from provider response headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    pub requests_remaining: Option<u64>,
    pub requests_limit: Option<u64>,
    pub tokens_remaining: Option<u64>,
    pub tokens_limit: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
}

/// A complete LLM response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Provider-assigned response id.
    pub id: String,

    /// The model that produced the response.
    pub model: String,

    /// Which adapter produced the response.
    pub provider: String,

    /// The assistant message, as ordered content parts.
    pub message: Message,

    /// Why generation ended.
    pub finish_reason: FinishReason,

    /// Token accounting.
    pub usage: Usage,

    /// The original provider envelope.
    pub raw: Option<Value>,

    /// Non-fatal issues encountered while translating the response.
    pub warnings: Vec<Warning>,

    /// Rate-limit headers, when the provider exposed them.
    pub rate_limit: Option<RateLimitInfo>,
}

impl Response {
    /// Concatenated text from all text parts.
    pub fn text(&self) -> String {
        self.message.text()
    }

    /// Tool calls extracted from the response message, in order.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.message
            .content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(call) => Some(ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.object(),
                    raw_arguments: match &call.arguments {
                        ToolArguments::Raw(raw) => Some(raw.clone()),
                        ToolArguments::Object(_) => None,
                    },
                }),
                _ => None,
            })
            .collect()
    }

    /// Concatenated reasoning text, or `None` if there were no thinking
    /// blocks.
    pub fn reasoning(&self) -> Option<String> {
        let mut text = String::new();
        let mut found = false;
        for part in &self.message.content {
            if let ContentPart::Thinking(thinking) = part {
                found = true;
                text.push_str(&thinking.text);
            }
        }
        found.then_some(text)
    }
}

// ============================================================================
// STREAM EVENTS
// ============================================================================

/// A single event in an LLM streaming response.
///
/// `text_id` is stable per text block, so interleaved blocks can be
/// reassembled. Tool-call deltas carry the raw argument fragment in
/// `tool_call.raw_arguments`; the matching `ToolCallEnd` carries the
/// parsed arguments (empty if the final parse failed, raw text preserved).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    StreamStart,
    TextStart {
        text_id: String,
    },
    TextDelta {
        text_id: String,
        delta: String,
    },
    TextEnd {
        text_id: String,
    },
    ReasoningStart,
    ReasoningDelta {
        delta: String,
    },
    ReasoningEnd,
    ToolCallStart {
        tool_call: ToolCall,
    },
    ToolCallDelta {
        tool_call: ToolCall,
    },
    ToolCallEnd {
        tool_call: ToolCall,
    },
    /// Terminal event; exactly one per stream.
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
    /// Non-fatal error surfaced mid-stream.
    Error {
        message: String,
    },
    /// Provider event passed through without translation.
    Provider {
        raw: Value,
    },
}
