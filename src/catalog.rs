//! Model catalog: metadata for the models the stock profiles target.

/// Metadata about an LLM model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub provider: &'static str,
    pub display_name: &'static str,
    pub context_window: u32,
    pub max_output: Option<u32>,
    pub supports_tools: bool,
    pub supports_vision: bool,
    pub supports_reasoning: bool,
    pub input_cost_per_million: Option<f64>,
    pub output_cost_per_million: Option<f64>,
    pub aliases: &'static [&'static str],
}

/// Current model catalog.
pub const MODELS: &[ModelInfo] = &[
    // Anthropic
    ModelInfo {
        id: "claude-opus-4-6",
        provider: "anthropic",
        display_name: "Claude Opus 4.6",
        context_window: 200_000,
        max_output: Some(32_000),
        supports_tools: true,
        supports_vision: true,
        supports_reasoning: true,
        input_cost_per_million: Some(15.0),
        output_cost_per_million: Some(75.0),
        aliases: &[],
    },
    ModelInfo {
        id: "claude-sonnet-4-5-20250929",
        provider: "anthropic",
        display_name: "Claude Sonnet 4.5",
        context_window: 200_000,
        max_output: Some(16_000),
        supports_tools: true,
        supports_vision: true,
        supports_reasoning: true,
        input_cost_per_million: Some(3.0),
        output_cost_per_million: Some(15.0),
        aliases: &["claude-sonnet-4-5"],
    },
    ModelInfo {
        id: "claude-haiku-4-5-20251001",
        provider: "anthropic",
        display_name: "Claude Haiku 4.5",
        context_window: 200_000,
        max_output: Some(8_192),
        supports_tools: true,
        supports_vision: true,
        supports_reasoning: false,
        input_cost_per_million: Some(0.8),
        output_cost_per_million: Some(4.0),
        aliases: &["claude-haiku-4-5"],
    },
    // OpenAI
    ModelInfo {
        id: "gpt-5.2",
        provider: "openai",
        display_name: "GPT-5.2",
        context_window: 256_000,
        max_output: Some(32_000),
        supports_tools: true,
        supports_vision: true,
        supports_reasoning: true,
        input_cost_per_million: Some(2.5),
        output_cost_per_million: Some(10.0),
        aliases: &[],
    },
    ModelInfo {
        id: "gpt-5.2-mini",
        provider: "openai",
        display_name: "GPT-5.2 Mini",
        context_window: 256_000,
        max_output: Some(16_000),
        supports_tools: true,
        supports_vision: true,
        supports_reasoning: true,
        input_cost_per_million: Some(0.75),
        output_cost_per_million: Some(3.0),
        aliases: &[],
    },
    ModelInfo {
        id: "gpt-5.2-codex",
        provider: "openai",
        display_name: "GPT-5.2 Codex",
        context_window: 256_000,
        max_output: Some(32_000),
        supports_tools: true,
        supports_vision: false,
        supports_reasoning: true,
        input_cost_per_million: Some(2.5),
        output_cost_per_million: Some(10.0),
        aliases: &[],
    },
    // Gemini
    ModelInfo {
        id: "gemini-3-pro-preview",
        provider: "gemini",
        display_name: "Gemini 3 Pro Preview",
        context_window: 2_000_000,
        max_output: Some(65_536),
        supports_tools: true,
        supports_vision: true,
        supports_reasoning: true,
        input_cost_per_million: Some(1.25),
        output_cost_per_million: Some(10.0),
        aliases: &[],
    },
    ModelInfo {
        id: "gemini-3-flash-preview",
        provider: "gemini",
        display_name: "Gemini 3 Flash Preview",
        context_window: 1_000_000,
        max_output: Some(65_536),
        supports_tools: true,
        supports_vision: true,
        supports_reasoning: true,
        input_cost_per_million: Some(0.15),
        output_cost_per_million: Some(0.6),
        aliases: &[],
    },
];

/// Look up a model by its id or one of its aliases.
pub fn get_model_info(model_id: &str) -> Option<&'static ModelInfo> {
    MODELS
        .iter()
        .find(|m| m.id == model_id)
        .or_else(|| MODELS.iter().find(|m| m.aliases.contains(&model_id)))
}

/// Capability filter for [`list_models`].
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub provider: Option<String>,
    pub supports_reasoning: Option<bool>,
    pub supports_tools: Option<bool>,
    pub supports_vision: Option<bool>,
}

impl ModelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn reasoning(mut self, supported: bool) -> Self {
        self.supports_reasoning = Some(supported);
        self
    }

    pub fn tools(mut self, supported: bool) -> Self {
        self.supports_tools = Some(supported);
        self
    }

    pub fn vision(mut self, supported: bool) -> Self {
        self.supports_vision = Some(supported);
        self
    }
}

/// List models, optionally filtered by provider and capabilities.
pub fn list_models(filter: &ModelFilter) -> Vec<&'static ModelInfo> {
    MODELS
        .iter()
        .filter(|m| {
            filter
                .provider
                .as_deref()
                .is_none_or(|provider| m.provider == provider)
        })
        .filter(|m| {
            filter
                .supports_reasoning
                .is_none_or(|wanted| m.supports_reasoning == wanted)
        })
        .filter(|m| {
            filter
                .supports_tools
                .is_none_or(|wanted| m.supports_tools == wanted)
        })
        .filter(|m| {
            filter
                .supports_vision
                .is_none_or(|wanted| m.supports_vision == wanted)
        })
        .collect()
}
