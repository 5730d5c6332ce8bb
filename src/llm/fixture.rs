//! Deterministic, queue-of-responses test double for `LlmClient`. Avoids
//! real network I/O in tests, matching the teacher's pattern of hand-rolled
//! fixture structs implementing the production trait rather than mocking
//! frameworks at the HTTP boundary.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{CostPilotError, Result};

use super::{ChatRequest, LlmClient};

/// Returns queued responses in FIFO order, one per `complete()` call.
/// Also records every request it was asked to answer, so tests can assert
/// on prompt content (e.g. "the repair prompt included the prior errors").
pub struct FixtureLlmClient {
    responses: Mutex<Vec<Result<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FixtureLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Builds a fixture where some calls fail, useful for exercising
    /// planner/repairer retry loops.
    pub fn with_results(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for FixtureLlmClient {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(CostPilotError::LlmCall(
                "fixture exhausted: no more queued responses".to_string(),
            ));
        }
        responses.remove(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[tokio::test]
    async fn returns_queued_responses_in_order() {
        let fixture = FixtureLlmClient::new(vec!["first".to_string(), "second".to_string()]);
        let request = ChatRequest::new(vec![ChatMessage::user("hi")], "test-model");

        let first = fixture.complete(request.clone()).await.unwrap();
        let second = fixture.complete(request.clone()).await.unwrap();

        assert_eq!(first, "first");
        assert_eq!(second, "second");
        assert_eq!(fixture.request_count(), 2);
    }

    #[tokio::test]
    async fn errors_when_exhausted() {
        let fixture = FixtureLlmClient::new(vec!["only".to_string()]);
        let request = ChatRequest::new(vec![ChatMessage::user("hi")], "test-model");

        fixture.complete(request.clone()).await.unwrap();
        let result = fixture.complete(request).await;
        assert!(result.is_err());
    }
}
