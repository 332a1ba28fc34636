//! Single entry point to the generative provider, with bounded retry.
//!
//! Only transient failures ([`Error::is_retryable`]) are retried, after a
//! fixed backoff. When every attempt is spent on overload the client reports
//! [`Invocation::Degraded`] instead of an error, so callers stay available
//! while the provider is saturated. Every other failure is returned untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Error;
use crate::provider::{CompletionRequest, Provider};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total provider calls allowed, including the first.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub backoff: Duration,
    /// Deadline for a single provider call; `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
        }
    }
}

/// Outcome of [`ModelClient::invoke`] when no fatal error occurred.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The provider produced output.
    Generated { text: String, attempts: u32 },
    /// The provider stayed overloaded through every attempt.
    Degraded { attempts: u32, last_error: String },
}

impl Invocation {
    pub fn attempts(&self) -> u32 {
        match self {
            Invocation::Generated { attempts, .. } | Invocation::Degraded { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Invocation::Degraded { .. })
    }
}

#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn Provider>,
    policy: RetryPolicy,
    model: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the provider's default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Send `prompt` to the provider, retrying transient failures per the policy.
    pub async fn invoke(&self, prompt: &str) -> Result<Invocation, Error> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.call_once(prompt).await {
                Ok(text) => {
                    debug!(
                        provider = %self.provider.name(),
                        attempt,
                        output_len = text.len(),
                        "Model call succeeded"
                    );
                    return Ok(Invocation::Generated {
                        text,
                        attempts: attempt,
                    });
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        warn!(
                            provider = %self.provider.name(),
                            attempts = attempt,
                            error = %e,
                            "Provider still unavailable after all attempts, degrading"
                        );
                        return Ok(Invocation::Degraded {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    warn!(
                        provider = %self.provider.name(),
                        attempt,
                        max_attempts,
                        backoff_ms = self.policy.backoff.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(e) => {
                    warn!(
                        provider = %self.provider.name(),
                        attempt,
                        error = %e,
                        "Model call failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn call_once(&self, prompt: &str) -> Result<String, Error> {
        let mut request = CompletionRequest::from_prompt(prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_json_output(true);
        if let Some(model) = &self.model {
            request = request.with_model(model);
        }

        let call = self.provider.complete(request);
        let response = match self.policy.call_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                Error::timeout(format!(
                    "{} did not respond within {}ms",
                    self.provider.name(),
                    limit.as_millis()
                ))
            })??,
            None => call.await?,
        };

        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;

    fn client_for(provider: &Arc<MockProvider>) -> ModelClient {
        ModelClient::new(provider.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("hello");

        let invocation = client_for(&provider).invoke("prompt").await.unwrap();

        assert_eq!(
            invocation,
            Invocation::Generated {
                text: "hello".to_string(),
                attempts: 1
            }
        );
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_shape() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_response("{}");

        client_for(&provider)
            .with_model("gemini-2.5-pro")
            .with_temperature(0.1)
            .invoke("the prompt")
            .await
            .unwrap();

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "the prompt");
        assert_eq!(request.model.as_deref(), Some("gemini-2.5-pro"));
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.max_tokens, Some(DEFAULT_MAX_OUTPUT_TOKENS));
        assert!(request.json_output);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_overload_then_succeeds() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::overloaded("busy"));
        provider.queue_response("recovered");

        let started = tokio::time::Instant::now();
        let invocation = client_for(&provider).invoke("prompt").await.unwrap();

        assert_eq!(invocation.attempts(), 2);
        assert!(!invocation.is_degraded());
        assert_eq!(provider.request_count(), 2);
        assert!(started.elapsed() >= DEFAULT_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_overloaded_degrades_after_exactly_three_attempts() {
        let provider = Arc::new(MockProvider::new());
        for _ in 0..5 {
            provider.queue_error(Error::overloaded("The model is overloaded"));
        }

        let started = tokio::time::Instant::now();
        let invocation = client_for(&provider).invoke("prompt").await.unwrap();

        assert!(invocation.is_degraded());
        assert_eq!(invocation.attempts(), 3);
        assert_eq!(provider.request_count(), 3);
        // Two waits between three attempts, none after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= DEFAULT_BACKOFF * 2);
        assert!(elapsed < DEFAULT_BACKOFF * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        let fatal = [
            Error::credentials("bad key"),
            Error::quota_exceeded("daily limit"),
            Error::safety_rejected("SAFETY"),
            Error::invalid_request("bad field"),
            Error::provider(500, "boom"),
        ];

        for error in fatal {
            let provider = Arc::new(MockProvider::new());
            provider.queue_error(error);
            provider.queue_response("never reached");

            let result = client_for(&provider).invoke("prompt").await;

            assert!(result.is_err());
            assert_eq!(provider.request_count(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_credentials_error_keeps_its_type() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::credentials("API key not valid"));

        let err = client_for(&provider).invoke("prompt").await.unwrap_err();
        assert!(err.is_credentials_error());
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_and_degrades() {
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_secs(60)));
        for _ in 0..3 {
            provider.queue_response("too late");
        }

        let policy = RetryPolicy {
            call_timeout: Some(Duration::from_secs(5)),
            ..RetryPolicy::default()
        };
        let invocation = client_for(&provider).with_policy(policy).invoke("prompt").await.unwrap();

        match invocation {
            Invocation::Degraded { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("did not respond"));
            }
            other => panic!("expected degraded invocation, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_bounds_a_hung_provider() {
        let provider = Arc::new(MockProvider::new().with_delay(Duration::from_secs(3600)));
        for _ in 0..3 {
            provider.queue_response("never delivered");
        }

        let started = tokio::time::Instant::now();
        let invocation = client_for(&provider).invoke("prompt").await.unwrap();
        let elapsed = started.elapsed();

        // Three deadlines plus two backoffs.
        let bound = DEFAULT_CALL_TIMEOUT * 3 + DEFAULT_BACKOFF * 2;
        assert!(invocation.is_degraded());
        assert!(elapsed >= bound && elapsed < bound + Duration::from_secs(1));
        assert!(bound <= Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_error(Error::overloaded("busy"));
        provider.queue_response("unused");

        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let invocation = client_for(&provider).with_policy(policy).invoke("prompt").await.unwrap();

        assert!(invocation.is_degraded());
        assert_eq!(provider.request_count(), 1);
    }
}
