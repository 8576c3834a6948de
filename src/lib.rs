//! # Agentry
//!
//! A multi-provider coding-agent runtime: a unified LLM client over the
//! OpenAI Responses, Anthropic Messages, Gemini generateContent, and
//! generic OpenAI-compatible Chat Completions wire protocols, plus an
//! agent session core that drives a model against a sandboxed working
//! directory with tools, steering, loop detection, and subagents.
//!
//! ## The client layer
//!
//! Every provider speaks the same vocabulary: [`Request`] in,
//! [`Response`] or a stream of [`StreamEvent`]s out, errors classified
//! into one retryable-aware [`Error`] taxonomy. Adapters translate
//! losslessly to each wire protocol and reconstruct streams with uniform
//! start/delta/end bracketing.
//!
//! ```rust,no_run
//! use agentry::{Client, Message, Request};
//!
//! #[tokio::main]
//! async fn main() -> agentry::Result<()> {
//!     // Reads OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY /
//!     // OPENAI_COMPAT_API_KEY; the first one found is the default.
//!     let client = Client::from_env()?;
//!
//!     let response = client
//!         .complete(Request::new(
//!             "claude-sonnet-4-5",
//!             vec![Message::user("What's the capital of France?")],
//!         ))
//!         .await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```
//!
//! ## The agent layer
//!
//! A [`Session`] turns user input into a bounded loop of completions and
//! tool executions against a [`LocalExecutionEnvironment`], emitting
//! [`SessionEvent`]s along the way.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentry::{Client, LocalExecutionEnvironment, Session, openai_profile};
//!
//! #[tokio::main]
//! async fn main() -> agentry::Result<()> {
//!     let client = Arc::new(Client::from_env()?);
//!     let mut session = Session::new(
//!         openai_profile("gpt-5.2-codex"),
//!         LocalExecutionEnvironment::new("."),
//!         client,
//!     );
//!
//!     session.events().subscribe(|event| {
//!         println!("{:?}", event.kind);
//!     });
//!     session.process_input("List the Rust files in this repo").await?;
//!     println!("{}", session.last_assistant_text());
//!     Ok(())
//! }
//! ```

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Agent session core: turns, events, session loop, profiles, subagents.
mod agent;

/// Model catalog with capability metadata.
mod catalog;

/// Client: adapter routing, middleware, default-client slot.
mod client;

/// Error taxonomy and HTTP status classification.
mod error;

/// Working-dir-scoped filesystem and shell access.
mod execution;

/// High-level helpers: generate, stream, generate_object.
mod highlevel;

/// Provider-agnostic request types.
mod request;

/// Response, usage, finish reasons, and stream events.
mod response;

/// Tool-output truncation.
mod truncation;

/// Common message model.
mod types;

// ============================================================================
// PUBLIC MODULES
// ============================================================================

/// Provider adapters and the adapter contract.
pub mod adapters;

/// Retry engine with exponential backoff and jitter.
pub mod retry;

/// SSE framing shared by every provider stream.
pub mod sse;

/// Tool registry and the default sandbox tools.
pub mod tools;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

// --- Errors ---

pub use error::{Error, ProviderFailure, Result, error_from_status_code};

// --- Message model ---

pub use types::{
    AudioPart, ContentPart, DocumentPart, ImagePart, Message, Role, TextPart, ThinkingPart,
    ToolArguments, ToolCallPart, ToolResultContent, ToolResultPart,
};

// --- Requests and responses ---

pub use request::{
    Request, ResponseFormat, ResponseFormatType, ToolChoice, ToolChoiceMode, ToolDefinition,
};
pub use response::{
    FinishReason, FinishReasonKind, RateLimitInfo, Response, StreamEvent, ToolCall, ToolResult,
    Usage, Warning,
};

// --- Client ---

pub use adapters::{
    AnthropicAdapter, EventStream, GeminiAdapter, OpenAIAdapter, OpenAICompatAdapter,
    ProviderAdapter,
};
pub use client::{
    Client, Middleware, Next, StreamNext, get_default_client, set_default_client,
};

// --- High-level helpers ---

pub use highlevel::{
    GenerateOptions, GenerateResult, StreamAccumulator, StreamResult, ToolHandler, generate,
    generate_object, stream,
};

// --- Catalog ---

pub use catalog::{MODELS, ModelFilter, ModelInfo, get_model_info, list_models};

// --- Execution environment ---

pub use execution::{DirEntry, ExecResult, LocalExecutionEnvironment};

// --- Truncation ---

pub use truncation::{
    TruncationMode, default_char_limits, default_line_limits, mode_for_tool, truncate_lines,
    truncate_output, truncate_tool_output,
};

// --- Agent core ---

pub use agent::{
    AssistantTurn, EventEmitter, EventKind, ModelClient, ProviderProfile, Session, SessionConfig,
    SessionEvent, SessionFactory, SessionState, SteeringTurn, SubAgentResult, SubagentManager,
    SubagentStatus, SystemTurn, ToolResultsTurn, Turn, UserTurn, anthropic_profile,
    build_default_registry, convert_history_to_messages, detect_loop, gemini_profile,
    openai_profile,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used types and functions in one import.
pub mod prelude {
    pub use crate::{
        Client, ContentPart, Error, EventKind, GenerateOptions, LocalExecutionEnvironment,
        Message, ProviderProfile, Request, Response, Result, Role, Session, SessionConfig,
        StreamEvent, ToolChoice, ToolDefinition, Usage, anthropic_profile, gemini_profile,
        generate, generate_object, openai_profile, stream,
    };
}
