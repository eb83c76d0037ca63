//! Request-independent core of the chat endpoint.
//!
//! Flow per prompt: acquire store (when persistence is on) → generate with
//! empty history → record exchange → reply. Every failure is terminal; no
//! step is retried.

use crate::error::ChatError;
use crate::models::ChatExchange;
use crate::services::metrics;
use crate::services::persistence::ConnectionCache;
use crate::services::providers::{ProviderErrorKind, TextProvider};
use std::sync::Arc;
use std::time::Instant;

/// What to do when the reply was generated but recording it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteFailurePolicy {
    /// Surface the write failure and drop the reply.
    #[default]
    Fail,
    /// Log the write failure and return the reply anyway.
    ReturnReply,
}

pub struct ChatService {
    provider: Arc<dyn TextProvider>,
    persistence: Option<Arc<ConnectionCache>>,
    write_failure: WriteFailurePolicy,
}

impl ChatService {
    pub fn new(provider: Arc<dyn TextProvider>) -> Self {
        Self {
            provider,
            persistence: None,
            write_failure: WriteFailurePolicy::default(),
        }
    }

    pub fn with_persistence(mut self, cache: Arc<ConnectionCache>) -> Self {
        self.persistence = Some(cache);
        self
    }

    pub fn with_write_failure_policy(mut self, policy: WriteFailurePolicy) -> Self {
        self.write_failure = policy;
        self
    }

    pub fn persistence(&self) -> Option<&Arc<ConnectionCache>> {
        self.persistence.as_ref()
    }

    /// Generate a reply for an already validated, non-empty prompt.
    #[tracing::instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        // Connect before generating so an unreachable store costs no tokens.
        let store = match &self.persistence {
            Some(cache) => Some(cache.acquire().await.map_err(|e| {
                tracing::error!(error = %e, "Chat store unavailable");
                ChatError::PersistenceConnection(e.to_string())
            })?),
            None => None,
        };

        let reply = self.generate(prompt).await?;

        if let Some(store) = store {
            let exchange = ChatExchange::new(prompt, reply.clone());
            if let Err(e) = store.insert(&exchange).await {
                match self.write_failure {
                    WriteFailurePolicy::Fail => {
                        tracing::error!(error = %e, "Failed to record chat exchange");
                        return Err(ChatError::PersistenceWrite(e.to_string()));
                    }
                    WriteFailurePolicy::ReturnReply => {
                        tracing::warn!(error = %e, "Returning reply without recording exchange");
                    }
                }
            }
        }

        Ok(reply)
    }

    async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let provider = self.provider.name();
        let model = self.provider.model().to_string();
        let start = Instant::now();

        let result = self.provider.generate(prompt, &[]).await;
        metrics::record_provider_latency(provider, &model, start.elapsed().as_secs_f64());

        match result {
            Ok(response) => {
                metrics::record_tokens(&model, response.input_tokens, response.output_tokens);
                tracing::debug!(
                    finish_reason = response.finish_reason.as_str(),
                    output_tokens = response.output_tokens,
                    "Provider replied"
                );
                Ok(response.text)
            }
            Err(e) => {
                metrics::record_provider_error(provider, e.label());
                tracing::error!(provider, error = %e, "Generation failed");
                Err(match e.kind() {
                    ProviderErrorKind::InvalidCredential => {
                        ChatError::InvalidCredential(e.to_string())
                    }
                    ProviderErrorKind::Other => ChatError::Generation(e.to_string()),
                })
            }
        }
    }
}
