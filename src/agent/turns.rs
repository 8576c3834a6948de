//! Conversation turns recorded in session history.

use chrono::{DateTime, Utc};

use crate::response::{ToolCall, ToolResult, Usage};

/// A user utterance.
#[derive(Debug, Clone)]
pub struct UserTurn {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl UserTurn {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One assistant completion, with any tool calls it requested.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub reasoning: Option<String>,
    pub usage: Option<Usage>,
    pub response_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The batch of results answering the preceding assistant turn's tool
/// calls, one per call, in order.
#[derive(Debug, Clone)]
pub struct ToolResultsTurn {
    pub results: Vec<ToolResult>,
    pub timestamp: DateTime<Utc>,
}

impl ToolResultsTurn {
    pub fn new(results: Vec<ToolResult>) -> Self {
        Self {
            results,
            timestamp: Utc::now(),
        }
    }
}

/// An injected system instruction.
#[derive(Debug, Clone)]
pub struct SystemTurn {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl SystemTurn {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// An out-of-band user hint injected between tool rounds; serialized to
/// the provider as a user message.
#[derive(Debug, Clone)]
pub struct SteeringTurn {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl SteeringTurn {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One element of session history.
#[derive(Debug, Clone)]
pub enum Turn {
    User(UserTurn),
    Assistant(AssistantTurn),
    ToolResults(ToolResultsTurn),
    System(SystemTurn),
    Steering(SteeringTurn),
}
