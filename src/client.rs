//! Client: adapter routing, middleware chain, and the module-level
//! default client slot.
//!
//! A [`Client`] owns a keyed map of provider adapters and routes each
//! request to one of them: `request.provider` if set (unknown names are a
//! configuration error), else the default provider, else the sole adapter
//! when only one is registered.
//!
//! Middleware wrap both the unary and the streaming path as an onion:
//! registration order on the way in, reverse order on the way out. A
//! middleware may mutate the request before calling `next`, and may
//! consume or transform the event stream it gets back.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentry::{Client, Message, Request};
//!
//! # async fn example() -> agentry::Result<()> {
//! let client = Client::from_env()?;
//! let response = client
//!     .complete(Request::new("gpt-5.2", vec![Message::user("hello")]))
//!     .await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::adapters::{
    AnthropicAdapter, EventStream, GeminiAdapter, OpenAIAdapter, OpenAICompatAdapter,
    ProviderAdapter,
};
use crate::error::{Error, Result};
use crate::request::Request;
use crate::response::Response;

/// An async interceptor around both client paths.
///
/// Both hooks default to pass-through, so implementations override only
/// the path they care about. Middleware must keep per-call state local:
/// a client is shared across concurrent requests.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Wrap a unary completion.
    async fn complete(&self, request: Request, next: Next<'_>) -> Result<Response> {
        next.run(request).await
    }

    /// Wrap a streaming completion. The returned stream may be the inner
    /// one, or a transformed wrapper around it.
    async fn stream(&self, request: Request, next: StreamNext<'_>) -> Result<EventStream> {
        next.run(request).await
    }
}

/// Continuation for the unary middleware chain.
pub struct Next<'a> {
    adapter: &'a dyn ProviderAdapter,
    middleware: &'a [Arc<dyn Middleware>],
}

impl Next<'_> {
    /// Invoke the rest of the chain, ending at the adapter.
    pub async fn run(self, request: Request) -> Result<Response> {
        match self.middleware.split_first() {
            Some((head, rest)) => {
                head.complete(
                    request,
                    Next {
                        adapter: self.adapter,
                        middleware: rest,
                    },
                )
                .await
            }
            None => self.adapter.complete(request).await,
        }
    }
}

/// Continuation for the streaming middleware chain.
pub struct StreamNext<'a> {
    adapter: &'a dyn ProviderAdapter,
    middleware: &'a [Arc<dyn Middleware>],
}

impl StreamNext<'_> {
    /// Invoke the rest of the chain, ending at the adapter.
    pub async fn run(self, request: Request) -> Result<EventStream> {
        match self.middleware.split_first() {
            Some((head, rest)) => {
                head.stream(
                    request,
                    StreamNext {
                        adapter: self.adapter,
                        middleware: rest,
                    },
                )
                .await
            }
            None => self.adapter.stream(request).await,
        }
    }
}

/// Routes requests to provider adapters with middleware support.
pub struct Client {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    default_provider: Option<String>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("default_provider", &self.default_provider)
            .field("middleware_count", &self.middleware.len())
            .finish()
    }
}

impl Client {
    /// Create a client over a map of named adapters.
    pub fn new(providers: HashMap<String, Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            providers,
            default_provider: None,
            middleware: Vec::new(),
        }
    }

    /// Create a client with a single adapter registered under its own
    /// name, which also becomes the default.
    pub fn with_adapter(adapter: Arc<dyn ProviderAdapter>) -> Self {
        let name = adapter.name().to_string();
        let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        providers.insert(name.clone(), adapter);
        Self {
            providers,
            default_provider: Some(name),
            middleware: Vec::new(),
        }
    }

    pub fn with_default_provider(mut self, name: impl Into<String>) -> Self {
        self.default_provider = Some(name.into());
        self
    }

    /// Append a middleware. Middleware run in registration order on the
    /// request side and reverse order on the response side.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Build a client from provider API keys in the process environment.
    ///
    /// Recognized variables: `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
    /// `GEMINI_API_KEY` / `GOOGLE_API_KEY`, and `OPENAI_COMPAT_API_KEY`
    /// with optional `OPENAI_COMPAT_BASE_URL`. The first provider found
    /// becomes the default. Fails when none are present.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// [`Client::from_env`] with an explicit variable lookup, for hosts
    /// that scope configuration differently.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        let mut default_provider: Option<String> = None;
        let mut register = |name: &str, adapter: Arc<dyn ProviderAdapter>| {
            if default_provider.is_none() {
                default_provider = Some(name.to_string());
            }
            providers.insert(name.to_string(), adapter);
        };

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|key| !key.is_empty()) {
            register("openai", Arc::new(OpenAIAdapter::new(key)));
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|key| !key.is_empty()) {
            register("anthropic", Arc::new(AnthropicAdapter::new(key)));
        }
        if let Some(key) = lookup("GEMINI_API_KEY")
            .filter(|key| !key.is_empty())
            .or_else(|| lookup("GOOGLE_API_KEY").filter(|key| !key.is_empty()))
        {
            register("gemini", Arc::new(GeminiAdapter::new(key)));
        }
        if let Some(key) = lookup("OPENAI_COMPAT_API_KEY").filter(|key| !key.is_empty()) {
            let base_url = lookup("OPENAI_COMPAT_BASE_URL")
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| "https://api.openai.com".to_string());
            register(
                "openai_compat",
                Arc::new(OpenAICompatAdapter::new(key, base_url)),
            );
        }

        if providers.is_empty() {
            return Err(Error::configuration(
                "No providers configured from environment",
            ));
        }

        Ok(Self {
            providers,
            default_provider,
            middleware: Vec::new(),
        })
    }

    /// The configured default provider name, if any.
    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Registered provider names, sorted.
    pub fn provider_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn resolve_adapter(&self, request: &Request) -> Result<&Arc<dyn ProviderAdapter>> {
        if let Some(provider) = &request.provider {
            return self.providers.get(provider).ok_or_else(|| {
                Error::configuration(format!(
                    "Unknown provider: {provider:?}. Available: {:?}",
                    self.provider_names()
                ))
            });
        }

        if let Some(default) = &self.default_provider {
            return self.providers.get(default).ok_or_else(|| {
                Error::configuration(format!("Default provider not registered: {default:?}"))
            });
        }

        if self.providers.len() == 1 {
            if let Some(adapter) = self.providers.values().next() {
                return Ok(adapter);
            }
        }

        Err(Error::configuration(format!(
            "No provider specified and no default configured. Available providers: {:?}",
            self.provider_names()
        )))
    }

    /// Send a completion request through the middleware chain.
    pub async fn complete(&self, request: Request) -> Result<Response> {
        let adapter = self.resolve_adapter(&request)?;
        log::debug!(
            "routing completion for model {} to provider {}",
            request.model,
            adapter.name()
        );
        Next {
            adapter: adapter.as_ref(),
            middleware: &self.middleware,
        }
        .run(request)
        .await
    }

    /// Send a streaming request through the middleware chain.
    pub async fn stream(&self, request: Request) -> Result<EventStream> {
        let adapter = self.resolve_adapter(&request)?;
        log::debug!(
            "routing stream for model {} to provider {}",
            request.model,
            adapter.name()
        );
        StreamNext {
            adapter: adapter.as_ref(),
            middleware: &self.middleware,
        }
        .run(request)
        .await
    }

    /// Close all provider adapters.
    pub async fn close(&self) -> Result<()> {
        for adapter in self.providers.values() {
            adapter.close().await?;
        }
        Ok(())
    }
}

// ============================================================================
// DEFAULT CLIENT SLOT
// ============================================================================

static DEFAULT_CLIENT: Mutex<Option<Arc<Client>>> = Mutex::new(None);

/// Set the module-level default client.
pub fn set_default_client(client: Option<Arc<Client>>) {
    let mut slot = DEFAULT_CLIENT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = client;
}

/// Get the module-level default client.
pub fn get_default_client() -> Option<Arc<Client>> {
    DEFAULT_CLIENT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}
