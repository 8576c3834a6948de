//! Provider profiles: the per-provider bundle of model, base prompt,
//! and tool set that drives a session.

use std::sync::Arc;

use serde_json::Value;

use crate::request::ToolDefinition;
use crate::tools::{
    ToolRegistry, apply_patch_tool, edit_file_tool, glob_tool, grep_tool, read_file_tool,
    shell_tool, write_file_tool,
};

/// Build the stock tool registry. OpenAI-profile sessions patch files
/// via `apply_patch`; the others use `edit_file`.
pub fn build_default_registry(include_apply_patch: bool) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(read_file_tool());
    registry.register(write_file_tool());
    registry.register(shell_tool());
    registry.register(grep_tool());
    registry.register(glob_tool());
    if include_apply_patch {
        registry.register(apply_patch_tool());
    } else {
        registry.register(edit_file_tool());
    }
    registry
}

/// Everything a session needs to talk to one provider.
#[derive(Clone)]
pub struct ProviderProfile {
    pub id: String,
    pub provider_name: String,
    pub model: String,
    pub base_prompt: String,
    pub tool_registry: Arc<ToolRegistry>,
    pub default_tool_names: Vec<String>,
    pub supports_parallel_tool_calls: bool,
    pub context_window_size: u32,
    pub provider_options: Option<Value>,
}

impl ProviderProfile {
    /// The system prompt for each request.
    pub fn build_system_prompt(&self) -> String {
        self.base_prompt.clone()
    }

    /// Definitions for the profile's default tools, skipping names not
    /// present in the registry.
    pub fn tools(&self) -> Vec<ToolDefinition> {
        self.default_tool_names
            .iter()
            .filter_map(|name| self.tool_registry.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }
}

/// Profile targeting the OpenAI Responses API.
pub fn openai_profile(model: impl Into<String>) -> ProviderProfile {
    ProviderProfile {
        id: "openai".to_string(),
        provider_name: "openai".to_string(),
        model: model.into(),
        base_prompt: "You are an OpenAI coding agent.".to_string(),
        tool_registry: Arc::new(build_default_registry(true)),
        default_tool_names: vec![
            "read_file".to_string(),
            "apply_patch".to_string(),
            "write_file".to_string(),
            "shell".to_string(),
            "grep".to_string(),
            "glob".to_string(),
        ],
        supports_parallel_tool_calls: true,
        context_window_size: 200_000,
        provider_options: None,
    }
}

/// Profile targeting the Anthropic Messages API.
pub fn anthropic_profile(model: impl Into<String>) -> ProviderProfile {
    ProviderProfile {
        id: "anthropic".to_string(),
        provider_name: "anthropic".to_string(),
        model: model.into(),
        base_prompt: "You are an Anthropic coding agent.".to_string(),
        tool_registry: Arc::new(build_default_registry(false)),
        default_tool_names: vec![
            "read_file".to_string(),
            "write_file".to_string(),
            "edit_file".to_string(),
            "shell".to_string(),
            "grep".to_string(),
            "glob".to_string(),
        ],
        supports_parallel_tool_calls: false,
        context_window_size: 200_000,
        provider_options: None,
    }
}

/// Profile targeting the Gemini generateContent API.
pub fn gemini_profile(model: impl Into<String>) -> ProviderProfile {
    ProviderProfile {
        id: "gemini".to_string(),
        provider_name: "gemini".to_string(),
        model: model.into(),
        base_prompt: "You are a Gemini coding agent.".to_string(),
        tool_registry: Arc::new(build_default_registry(false)),
        default_tool_names: vec![
            "read_file".to_string(),
            "write_file".to_string(),
            "edit_file".to_string(),
            "shell".to_string(),
            "grep".to_string(),
            "glob".to_string(),
        ],
        supports_parallel_tool_calls: false,
        context_window_size: 200_000,
        provider_options: None,
    }
}
