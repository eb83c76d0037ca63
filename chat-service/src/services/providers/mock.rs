//! Scripted provider for tests.

use super::{ChatTurn, FinishReason, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum Script {
    Reply(String),
    Fail(fn() -> ProviderError),
}

/// Mock text provider that returns a fixed reply or a fixed failure and
/// counts how often it was asked.
pub struct MockTextProvider {
    script: Script,
    calls: AtomicUsize,
    history_lens: Mutex<Vec<usize>>,
}

impl MockTextProvider {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::with_script(Script::Reply(reply.into()))
    }

    /// Fail every call with a freshly built error.
    pub fn failing(make_error: fn() -> ProviderError) -> Self {
        Self::with_script(Script::Fail(make_error))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            history_lens: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// History length seen by each call, in call order.
    pub fn history_lens(&self) -> Vec<usize> {
        self.history_lens
            .lock()
            .map(|lens| lens.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatTurn],
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut lens) = self.history_lens.lock() {
            lens.push(history.len());
        }

        match &self.script {
            Script::Reply(text) => Ok(ProviderResponse {
                text: text.clone(),
                input_tokens: prompt.len() as i32 / 4,
                output_tokens: text.len() as i32 / 4,
                finish_reason: FinishReason::Complete,
            }),
            Script::Fail(make_error) => Err(make_error()),
        }
    }
}
