use crate::dtos::{ChatRequest, ChatResponse};
use crate::error::ChatError;
use crate::services::metrics;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

pub const ALLOWED_METHODS: &str = "POST, OPTIONS";
/// Methods served on the chat route when CORS is off.
pub const POST_ONLY: &str = "POST";
pub const ALLOWED_HEADERS: &str = "Content-Type";

/// `POST /api/chat`
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let result = respond(&state, payload).await;
    metrics::record_chat_request(match &result {
        Ok(_) => "success",
        Err(e) => e.outcome(),
    });
    result
}

async fn respond(
    state: &AppState,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let prompt = match payload {
        Ok(Json(req)) => req.into_prompt().ok_or(ChatError::MissingPrompt)?,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable chat request body");
            return Err(ChatError::MissingPrompt);
        }
    };

    let reply = state.chat.complete(&prompt).await?;
    Ok(Json(ChatResponse { reply }))
}

/// `OPTIONS /api/chat`, answered before any other check.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOWED_HEADERS),
        ],
    )
}

/// Any other method on the chat route.
pub async fn method_not_allowed(State(state): State<AppState>) -> ChatError {
    let allow = if state.cors_enabled {
        ALLOWED_METHODS
    } else {
        POST_ONLY
    };
    let err = ChatError::MethodNotAllowed { allow };
    metrics::record_chat_request(err.outcome());
    err
}
