//! Scripted chat model for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::{ChatModel, ChatRequest, LlmError};

#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Error(LlmError),
    /// Never answers; resolves only when the token fires.
    Hang,
}

/// Replays queued replies in order and records every request it receives.
/// Once the queue is empty every call fails with [`LlmError::EmptyResponse`].
#[derive(Debug, Default)]
pub struct MockChatModel {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: Mutex<Vec<Instant>>,
}

impl MockChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_reply(MockReply::Text(text.into()))
    }

    pub fn with_error(self, error: LlmError) -> Self {
        self.with_reply(MockReply::Error(error))
    }

    pub fn with_hang(self) -> Self {
        self.with_reply(MockReply::Hang)
    }

    pub fn with_reply(self, reply: MockReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Instants (on the tokio clock) at which each call arrived.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.calls.lock().unwrap().push(Instant::now());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockReply::Error(LlmError::EmptyResponse));

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(error) => Err(error),
            MockReply::Hang => {
                cancel.cancelled().await;
                Err(LlmError::Timeout)
            }
        }
    }
}
