//! Counting completion client
//!
//! `CompletionClient` wraps any `CompletionService` and owns the session's
//! call counter. Callers always get text back: failures become an empty
//! string that the caller has to handle.

use std::time::Instant;

use tracing::{debug, warn};

use super::messages::{ChatMessage, CompletionError};
use crate::metrics::{COMPLETION_DURATION, COMPLETION_REQUESTS};

/// Token budget used when a caller does not pick one
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// A text-completion backend.
///
/// Implementations make exactly one request per call and report failures as
/// errors; the counting and degrade-to-empty policy lives in `CompletionClient`.
#[allow(async_fn_in_trait)]
pub trait CompletionService {
    /// Short backend name used in logs and metric labels
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, CompletionError>;
}

/// Completion client that counts every call it makes
pub struct CompletionClient<S> {
    service: S,
    calls: u64,
}

impl<S: CompletionService> CompletionClient<S> {
    pub fn new(service: S) -> Self {
        Self { service, calls: 0 }
    }

    /// Number of calls made so far, failed ones included
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Send one conversation and return the response text.
    ///
    /// Returns an empty string on any failure.
    pub async fn complete(&mut self, messages: &[ChatMessage], max_tokens: u32) -> String {
        self.calls += 1;
        let backend = self.service.name().to_string();
        let start = Instant::now();

        let result = self.service.complete(messages, max_tokens).await;
        COMPLETION_DURATION
            .with_label_values(&[&backend])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(text) => {
                let status = if text.is_empty() { "empty" } else { "ok" };
                COMPLETION_REQUESTS.with_label_values(&[&backend, status]).inc();
                debug!(
                    backend = %backend,
                    call = self.calls,
                    response_len = text.len(),
                    "Completion received"
                );
                text
            }
            Err(e) => {
                COMPLETION_REQUESTS.with_label_values(&[&backend, "error"]).inc();
                warn!(backend = %backend, call = self.calls, error = %e, "Completion request failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky {
        fail: bool,
    }

    impl CompletionService for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _max_tokens: u32,
        ) -> Result<String, CompletionError> {
            if self.fail {
                Err(CompletionError::Status {
                    status: 500,
                    body: "boom".to_string(),
                })
            } else {
                Ok("text".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_counts_successful_calls() {
        let mut client = CompletionClient::new(Flaky { fail: false });
        assert_eq!(client.complete(&[ChatMessage::user("a")], 10).await, "text");
        assert_eq!(client.complete(&[ChatMessage::user("b")], 10).await, "text");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_empty_and_still_counts() {
        let mut client = CompletionClient::new(Flaky { fail: true });
        assert_eq!(client.complete(&[ChatMessage::user("a")], 10).await, "");
        assert_eq!(client.calls(), 1);
    }
}
