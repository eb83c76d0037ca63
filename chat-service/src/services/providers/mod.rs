//! Text generation provider abstractions and implementations.
//!
//! The chat core only talks to [`TextProvider`]; Gemini is the production
//! backend and the mock backs the handler tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

/// Marker Gemini puts in the message of a rejected API key.
const INVALID_KEY_MARKER: &str = "API key not valid";

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Provider returned no text")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// How the chat handler reports a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    InvalidCredential,
    Other,
}

impl ProviderError {
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            ProviderError::InvalidCredential(_) => ProviderErrorKind::InvalidCredential,
            // Upstream proxies sometimes flatten the structured error.
            ProviderError::ApiError(msg) if msg.contains(INVALID_KEY_MARKER) => {
                ProviderErrorKind::InvalidCredential
            }
            _ => ProviderErrorKind::Other,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::InvalidCredential(_) => "invalid_credential",
            ProviderError::ApiError(_) => "api_error",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::ContentFiltered => "content_filtered",
            ProviderError::EmptyResponse => "empty_response",
            ProviderError::NetworkError(_) => "network_error",
        }
    }
}

/// Speaker of a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One prior turn handed to the provider ahead of the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Error,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Complete => "complete",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Error => "error",
        }
    }
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    pub finish_reason: FinishReason,
}

/// Trait for chat-style text generation providers (e.g., Gemini).
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &'static str;

    /// Model identifier used in logs and metric labels.
    fn model(&self) -> &str;

    /// Start a chat seeded with `history` and send `prompt` as the next
    /// user turn, returning the single reply.
    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<ProviderResponse, ProviderError>;
}
