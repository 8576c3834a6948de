//! Core message model shared by every provider adapter.
//!
//! The type system has three layers:
//!
//! - [`Role`]: who produced a message (system, user, assistant, tool,
//!   developer)
//! - [`ContentPart`]: a tagged union of everything a message can carry -
//!   text, media, tool calls, tool results, and model thinking
//! - [`Message`]: an ordered sequence of content parts under one role
//!
//! Adapters translate this model to and from each provider's wire format;
//! nothing in here is specific to any one provider.
//!
//! # Example
//!
//! ```
//! use agentry::{ContentPart, Message, Role};
//!
//! let msg = Message::user("What's the capital of France?");
//! assert_eq!(msg.role, Role::User);
//! assert_eq!(msg.text(), "What's the capital of France?");
//!
//! let reply = Message::new(
//!     Role::Assistant,
//!     vec![ContentPart::text("Paris.")],
//! );
//! assert_eq!(reply.text(), "Paris.");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// ROLES
// ============================================================================

/// Who produced a message.
///
/// Serializes to lowercase strings (`"system"`, `"user"`, ...) matching
/// the common chat-completion vocabulary. `Developer` is treated like
/// `System` by every adapter: both are hoisted into the provider's
/// system-instruction slot and never appear in the outgoing message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that establish agent behavior and context.
    System,
    /// Input from the human or calling application.
    User,
    /// Output from the model, possibly including tool calls.
    Assistant,
    /// Results of tool execution, fed back to the model.
    Tool,
    /// OpenAI-style developer instructions; hoisted like `System`.
    Developer,
}

// ============================================================================
// CONTENT PARTS
// ============================================================================

/// Plain text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    /// The text content.
    pub text: String,
}

/// Image as URL or raw bytes with a media type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImagePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Provider-specific detail hint ("low", "high", "auto").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Audio as URL or raw bytes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// Document (PDF, etc.) as URL or raw bytes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Tool-call arguments as either a parsed JSON object or the raw wire
/// string a provider streamed.
///
/// Providers disagree on how arguments travel: Anthropic and Gemini send
/// structured objects, the OpenAI wire formats send JSON strings. Both
/// shapes are representable; [`ToolArguments::object`] gives the parsed
/// view (empty object when the raw string is not valid JSON), and
/// [`ToolArguments::wire_json`] gives the serialized view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// Parsed key/value arguments.
    Object(Map<String, Value>),
    /// Raw JSON text, exactly as received from the provider.
    Raw(String),
}

impl ToolArguments {
    /// An empty argument object.
    pub fn empty() -> Self {
        ToolArguments::Object(Map::new())
    }

    /// The arguments as a JSON object, parsing raw text if necessary.
    /// Unparseable raw text yields an empty object.
    pub fn object(&self) -> Map<String, Value> {
        match self {
            ToolArguments::Object(map) => map.clone(),
            ToolArguments::Raw(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
        }
    }

    /// The arguments serialized as a JSON string, for wire formats that
    /// expect stringified arguments.
    pub fn wire_json(&self) -> String {
        match self {
            ToolArguments::Object(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
            ToolArguments::Raw(raw) => raw.clone(),
        }
    }
}

impl Default for ToolArguments {
    fn default() -> Self {
        ToolArguments::empty()
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(map: Map<String, Value>) -> Self {
        ToolArguments::Object(map)
    }
}

impl From<String> for ToolArguments {
    fn from(raw: String) -> Self {
        ToolArguments::Raw(raw)
    }
}

/// A model-initiated tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    /// Unique identifier for this call, generated by the model.
    pub id: String,

    /// Name of the tool to execute.
    pub name: String,

    /// Arguments to pass to the tool.
    pub arguments: ToolArguments,

    /// Call type; always `"function"` for current providers.
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Tool-result content: either plain text or a structured JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Json(Value),
}

impl ToolResultContent {
    /// The content as a JSON value (strings become JSON strings).
    pub fn as_value(&self) -> Value {
        match self {
            ToolResultContent::Text(text) => Value::String(text.clone()),
            ToolResultContent::Json(value) => value.clone(),
        }
    }

    /// The content as text, JSON-encoding structured values.
    pub fn to_text(&self) -> String {
        match self {
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for ToolResultContent {
    fn from(text: String) -> Self {
        ToolResultContent::Text(text)
    }
}

impl From<&str> for ToolResultContent {
    fn from(text: &str) -> Self {
        ToolResultContent::Text(text.to_string())
    }
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPart {
    /// The `id` of the tool call this result answers.
    pub tool_call_id: String,

    /// The tool's output.
    pub content: ToolResultContent,

    /// Whether the tool failed; error content is surfaced to the model.
    #[serde(default)]
    pub is_error: bool,

    /// Optional image produced by the tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImagePart>,
}

/// Model reasoning/thinking content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingPart {
    pub text: String,

    /// Provider signature over the thinking block, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// True for redacted thinking blocks whose text is opaque data.
    #[serde(default)]
    pub redacted: bool,
}

/// A single content part within a message.
///
/// Tagged union discriminated by `kind`:
///
/// ```json
/// {"kind": "text", "text": "Hello"}
/// {"kind": "tool_call", "id": "call_1", "name": "grep", "arguments": {...}, "type": "function"}
/// {"kind": "tool_result", "tool_call_id": "call_1", "content": "..."}
/// ```
///
/// Adapters carry media parts through where the provider supports them
/// and drop them where it does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text(TextPart),
    Image(ImagePart),
    Audio(AudioPart),
    Document(DocumentPart),
    ToolCall(ToolCallPart),
    ToolResult(ToolResultPart),
    Thinking(ThinkingPart),
}

impl ContentPart {
    /// Create a text content part.
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(TextPart { text: text.into() })
    }

    /// Create an image content part.
    pub fn image(image: ImagePart) -> Self {
        ContentPart::Image(image)
    }

    /// Create an audio content part.
    pub fn audio(audio: AudioPart) -> Self {
        ContentPart::Audio(audio)
    }

    /// Create a document content part.
    pub fn document(document: DocumentPart) -> Self {
        ContentPart::Document(document)
    }

    /// Create a tool-call content part.
    pub fn tool_call(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<ToolArguments>,
    ) -> Self {
        ContentPart::ToolCall(ToolCallPart {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
            call_type: default_call_type(),
        })
    }

    /// Create a tool-result content part.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<ToolResultContent>,
        is_error: bool,
    ) -> Self {
        ContentPart::ToolResult(ToolResultPart {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error,
            image: None,
        })
    }

    /// Create a thinking content part.
    pub fn thinking(text: impl Into<String>) -> Self {
        ContentPart::Thinking(ThinkingPart {
            text: text.into(),
            signature: None,
            redacted: false,
        })
    }

    /// Create a redacted thinking content part.
    pub fn redacted_thinking(data: impl Into<String>) -> Self {
        ContentPart::Thinking(ThinkingPart {
            text: data.into(),
            signature: None,
            redacted: true,
        })
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

/// A single message in a conversation.
///
/// A message is an ordered sequence of [`ContentPart`]s under one
/// [`Role`]. A message's [`text`](Message::text) is the concatenation of
/// its text parts, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role/sender of this message.
    pub role: Role,

    /// The content parts that make up this message.
    pub content: Vec<ContentPart>,

    /// Optional participant name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// For tool messages, the id of the call being answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a message with the given role and content parts.
    pub fn new(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            role,
            content,
            name: None,
            tool_call_id: None,
        }
    }

    /// Create a system message with a single text part.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![ContentPart::text(text)])
    }

    /// Create a user message with a single text part.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentPart::text(text)])
    }

    /// Create an assistant message with a single text part.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![ContentPart::text(text)])
    }

    /// Create a developer message with a single text part.
    pub fn developer(text: impl Into<String>) -> Self {
        Self::new(Role::Developer, vec![ContentPart::text(text)])
    }

    /// Create a tool message answering `tool_call_id` with text content.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        let tool_call_id = tool_call_id.into();
        let mut message = Self::new(
            Role::Tool,
            vec![ContentPart::tool_result(
                tool_call_id.clone(),
                content.into(),
                is_error,
            )],
        );
        message.tool_call_id = Some(tool_call_id);
        message
    }

    /// Concatenate all text parts, in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_text_concatenates_parts_in_order() {
        let message = Message::new(
            Role::Assistant,
            vec![
                ContentPart::text("Hello, "),
                ContentPart::tool_call("t1", "grep", ToolArguments::empty()),
                ContentPart::text("world"),
            ],
        );
        assert_eq!(message.text(), "Hello, world");
    }

    #[test]
    fn test_tool_result_message_links_call_id() {
        let message = Message::tool_result("call_9", "done", false);
        assert_eq!(message.role, Role::Tool);
        assert_eq!(message.tool_call_id.as_deref(), Some("call_9"));
        match &message.content[0] {
            ContentPart::ToolResult(result) => {
                assert_eq!(result.tool_call_id, "call_9");
                assert!(!result.is_error);
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_arguments_object_parses_raw() {
        let args = ToolArguments::Raw(r#"{"pattern": "*.rs"}"#.to_string());
        let object = args.object();
        assert_eq!(object.get("pattern"), Some(&json!("*.rs")));

        let bad = ToolArguments::Raw("not json".to_string());
        assert!(bad.object().is_empty());
    }

    #[test]
    fn test_tool_arguments_wire_json_round_trip() {
        let mut map = Map::new();
        map.insert("a".to_string(), json!(1));
        let args = ToolArguments::Object(map);
        assert_eq!(args.wire_json(), r#"{"a":1}"#);

        let raw = ToolArguments::Raw(r#"{"b": 2}"#.to_string());
        assert_eq!(raw.wire_json(), r#"{"b": 2}"#);
    }

    #[test]
    fn test_content_part_serde_tagging() {
        let part = ContentPart::text("hi");
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value, json!({"kind": "text", "text": "hi"}));

        let round: ContentPart = serde_json::from_value(value).unwrap();
        assert_eq!(round, part);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(Role::Developer).unwrap(), json!("developer"));
        assert_eq!(serde_json::to_value(Role::Tool).unwrap(), json!("tool"));
    }

    #[test]
    fn test_redacted_thinking_flag() {
        match ContentPart::redacted_thinking("opaque") {
            ContentPart::Thinking(thinking) => {
                assert!(thinking.redacted);
                assert_eq!(thinking.text, "opaque");
            }
            other => panic!("expected thinking, got {other:?}"),
        }
    }
}
