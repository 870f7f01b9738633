//! Model client: renders a prompt pair, calls the provider, returns raw text.
//!
//! Every call is bounded by a caller-side timeout. A timeout, like any other
//! provider failure, surfaces as [`Error::ModelUnavailable`]; nothing is
//! retried here.

use crate::prompt::{PromptContext, PromptTemplate, render};
use docforge_config::AppConfig;
use docforge_core::error::{Error, ProviderError, Result};
use docforge_core::message::Message;
use docforge_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Model, sampling and timeout settings from config. A model pinned on
    /// the default provider's entry wins over `default_model`.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        Self::new(provider, model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_timeout(Duration::from_secs(config.model.timeout_secs))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Render `prompt` against `context` and return the model's raw text.
    pub async fn complete(&self, prompt: &PromptTemplate, context: &PromptContext) -> Result<String> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(render(&prompt.system, context)),
                Message::user(render(&prompt.user, context)),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: Vec::new(),
        };

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            "Calling model"
        );

        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => {
                if let Some(usage) = &response.usage {
                    debug!(
                        prompt_tokens = usage.prompt_tokens,
                        completion_tokens = usage.completion_tokens,
                        "Model responded"
                    );
                }
                Ok(response.message.content)
            }
            Ok(Err(e)) => {
                warn!(provider = %self.provider.name(), error = %e, "Model call failed");
                Err(Error::ModelUnavailable(e))
            }
            Err(_) => {
                warn!(provider = %self.provider.name(), timeout = ?self.timeout, "Model call timed out");
                Err(Error::ModelUnavailable(ProviderError::Timeout(format!(
                    "no response within {:?}",
                    self.timeout
                ))))
            }
        }
    }
}
