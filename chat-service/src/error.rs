use crate::dtos::ErrorResponse;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Terminal outcomes of a chat request other than success.
///
/// The `String` payloads carry the underlying cause for logs only; callers
/// see the fixed message from [`ChatError::public_message`].
#[derive(Debug, Error)]
pub enum ChatError {
    /// `allow` is the value of the `Allow` response header.
    #[error("Method not allowed")]
    MethodNotAllowed { allow: &'static str },

    #[error("Prompt missing or empty")]
    MissingPrompt,

    #[error("Provider rejected credentials: {0}")]
    InvalidCredential(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Persistence connection failed: {0}")]
    PersistenceConnection(String),

    #[error("Persistence write failed: {0}")]
    PersistenceWrite(String),
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ChatError::MissingPrompt => StatusCode::BAD_REQUEST,
            ChatError::InvalidCredential(_)
            | ChatError::Generation(_)
            | ChatError::PersistenceConnection(_)
            | ChatError::PersistenceWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            ChatError::MethodNotAllowed { .. } => "Method not allowed.",
            ChatError::MissingPrompt => "Prompt not found in request.",
            ChatError::InvalidCredential(_) => {
                "Invalid Gemini API key. Check your configuration."
            }
            ChatError::Generation(_) => "Failed to get a response from Gemini.",
            ChatError::PersistenceConnection(_) => "Failed to connect to the database.",
            ChatError::PersistenceWrite(_) => "Failed to save the chat exchange.",
        }
    }

    /// Metric label for the request outcome.
    pub fn outcome(&self) -> &'static str {
        match self {
            ChatError::MethodNotAllowed { .. } => "method_not_allowed",
            ChatError::MissingPrompt => "missing_prompt",
            ChatError::InvalidCredential(_) => "invalid_credential",
            ChatError::Generation(_) => "generation_failed",
            ChatError::PersistenceConnection(_) => "persistence_connection_failed",
            ChatError::PersistenceWrite(_) => "persistence_write_failed",
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let mut res = (
            self.status(),
            Json(ErrorResponse {
                error: self.public_message().to_string(),
            }),
        )
            .into_response();

        if let ChatError::MethodNotAllowed { allow } = self {
            res.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_hide_cause() {
        let err = ChatError::Generation("socket hang up at 10.0.0.3".to_string());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("10.0.0.3"));
    }

    #[test]
    fn credential_message_differs_from_generic() {
        assert_ne!(
            ChatError::InvalidCredential(String::new()).public_message(),
            ChatError::Generation(String::new()).public_message()
        );
    }

    #[test]
    fn method_not_allowed_sets_allow_header() {
        let res = ChatError::MethodNotAllowed {
            allow: "POST, OPTIONS",
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.headers()[header::ALLOW], "POST, OPTIONS");
    }
}
