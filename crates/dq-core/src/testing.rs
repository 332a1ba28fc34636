//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::Error;
use crate::message::Usage;
use crate::provider::{CompletionRequest, CompletionResponse, FinishReason, Provider};

/// A mock provider that returns pre-configured outcomes.
pub struct MockProvider {
    outcomes: Mutex<Vec<(Result<String, Error>, Option<Duration>)>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<CompletionRequest>>,
    pub name: String,
    pub default_model: Option<String>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(Vec::new()),
            captured_requests: Mutex::new(Vec::new()),
            name: "mock".to_string(),
            default_model: None,
            delay: None,
        }
    }

    /// Sleep this long inside every `complete()` call before answering,
    /// unless the outcome carries its own delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue text to be returned by the next complete() call.
    /// Outcomes are returned in FIFO order (first queued = first returned).
    pub fn queue_response(&self, content: &str) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(0, (Ok(content.to_string()), None));
    }

    /// Queue text that the call taking it returns only after `delay`.
    /// The outcome is claimed when the call starts, so concurrent calls
    /// finish in delay order while each keeps its own text.
    pub fn queue_response_after(&self, content: &str, delay: Duration) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(0, (Ok(content.to_string()), Some(delay)));
    }

    /// Queue an error to be returned by the next complete() call.
    pub fn queue_error(&self, error: Error) {
        self.outcomes.lock().unwrap().insert(0, (Err(error), None));
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }

    /// Prompt text of every captured request, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.captured_requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| r.messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, Error> {
        self.captured_requests.lock().unwrap().push(request);

        let (outcome, delay) = self
            .outcomes
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| (Err(Error::provider(500, "No mock response queued")), None));

        if let Some(delay) = delay.or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        outcome.map(|text| CompletionResponse {
            text,
            usage: Usage::new(0, 0),
            model: "mock-model".to_string(),
            finish_reason: FinishReason::Stop,
        })
    }
}
