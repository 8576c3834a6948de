//! Request types: [`Request`], [`ToolDefinition`], [`ToolChoice`], and
//! [`ResponseFormat`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Message;

/// Definition of a tool the model can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, as the model will reference it.
    pub name: String,

    /// Human-readable description; drives when the model calls the tool.
    pub description: String,

    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// How the model is allowed to call tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    /// The model decides whether to call tools.
    Auto,
    /// Tools are disabled for this request.
    None,
    /// The model must call some tool.
    Required,
    /// The model must call one specific tool.
    Named,
}

/// Controls whether and how the model calls tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolChoice {
    pub mode: ToolChoiceMode,

    /// The required tool name when `mode` is [`ToolChoiceMode::Named`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ToolChoice {
    pub fn auto() -> Self {
        Self {
            mode: ToolChoiceMode::Auto,
            tool_name: None,
        }
    }

    pub fn none() -> Self {
        Self {
            mode: ToolChoiceMode::None,
            tool_name: None,
        }
    }

    pub fn required() -> Self {
        Self {
            mode: ToolChoiceMode::Required,
            tool_name: None,
        }
    }

    pub fn named(tool_name: impl Into<String>) -> Self {
        Self {
            mode: ToolChoiceMode::Named,
            tool_name: Some(tool_name.into()),
        }
    }
}

/// Desired response format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormatType {
    Text,
    Json,
    JsonSchema,
}

/// Structured-output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: ResponseFormatType,

    /// The schema, for [`ResponseFormatType::JsonSchema`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_schema: Option<Value>,

    /// Whether the provider should enforce the schema strictly.
    #[serde(default)]
    pub strict: bool,
}

impl ResponseFormat {
    pub fn text() -> Self {
        Self {
            format_type: ResponseFormatType::Text,
            json_schema: None,
            strict: false,
        }
    }

    pub fn json() -> Self {
        Self {
            format_type: ResponseFormatType::Json,
            json_schema: None,
            strict: false,
        }
    }

    pub fn json_schema(schema: Value, strict: bool) -> Self {
        Self {
            format_type: ResponseFormatType::JsonSchema,
            json_schema: Some(schema),
            strict,
        }
    }
}

/// An LLM completion request in the provider-agnostic vocabulary.
///
/// Only `model` and `messages` are required; everything else is optional
/// and translated by the selected adapter. `provider` pins the request to
/// a named adapter; when absent the client's default provider is used.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    pub provider: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
    pub response_format: Option<ResponseFormat>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop_sequences: Option<Vec<String>>,
    pub reasoning_effort: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub provider_options: Option<Value>,
}

impl Request {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_response_format(mut self, response_format: ResponseFormat) -> Self {
        self.response_format = Some(response_format);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_provider_options(mut self, options: Value) -> Self {
        self.provider_options = Some(options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_chain() {
        let request = Request::new("gpt-5.2", vec![Message::user("hi")])
            .with_provider("openai")
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_tool_choice(ToolChoice::required());

        assert_eq!(request.model, "gpt-5.2");
        assert_eq!(request.provider.as_deref(), Some("openai"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(
            request.tool_choice.unwrap().mode,
            ToolChoiceMode::Required
        );
    }

    #[test]
    fn test_named_tool_choice() {
        let choice = ToolChoice::named("grep");
        assert_eq!(choice.mode, ToolChoiceMode::Named);
        assert_eq!(choice.tool_name.as_deref(), Some("grep"));
    }

    #[test]
    fn test_response_format_json_schema() {
        let schema = serde_json::json!({"type": "object"});
        let format = ResponseFormat::json_schema(schema.clone(), true);
        assert_eq!(format.format_type, ResponseFormatType::JsonSchema);
        assert_eq!(format.json_schema, Some(schema));
        assert!(format.strict);
    }
}
