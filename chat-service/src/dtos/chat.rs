use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(required, length(min = 1))]
    #[serde(default)]
    pub prompt: Option<String>,
}

impl ChatRequest {
    /// The prompt, if it passes validation.
    pub fn into_prompt(self) -> Option<String> {
        match self.validate() {
            Ok(()) => self.prompt,
            Err(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}
