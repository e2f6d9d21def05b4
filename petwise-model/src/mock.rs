//! Scripted LLM for tests and offline runs.
//!
//! [`MockLlm`] replays queued responses in order and records every request it
//! receives, so tests can assert on both the model's "decisions" and on the
//! prompts the caller assembled.
//!
//! ```rust,ignore
//! let llm = MockLlm::new("mock")
//!     .with_response(LlmResponse::default().with_function_call(
//!         "call_1",
//!         "search_products",
//!         r#"{"query":"puppy food"}"#,
//!     ))
//!     .with_stream(MockStream::chunks(["Here are ", "some picks."]));
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use petwise_core::{Llm, LlmEventStream, LlmRequest, LlmResponse, PetwiseError, Result, StreamEvent};

#[derive(Debug, Clone)]
enum MockReply {
    Response(LlmResponse),
    RateLimited,
    Failure(String),
}

/// A scripted streaming reply.
#[derive(Debug, Clone)]
pub enum MockStream {
    /// Deltas followed by a completion event.
    Chunks(Vec<String>),
    /// Deltas followed by a mid-stream error event.
    ChunksThenError(Vec<String>, String),
    /// The streaming call itself fails before any event.
    Fail(String),
}

impl MockStream {
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }
}

/// A mock [`Llm`] that replays scripted replies.
///
/// When a queue runs dry, `generate` fails and `generate_stream` streams an
/// empty completion.
#[derive(Debug)]
pub struct MockLlm {
    name: String,
    replies: Mutex<VecDeque<MockReply>>,
    streams: Mutex<VecDeque<MockStream>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: LlmResponse) -> Self {
        self.push_response(response);
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_response(LlmResponse::message(text))
    }

    pub fn with_stream(self, stream: MockStream) -> Self {
        self.push_stream(stream);
        self
    }

    /// Queue a rate-limit rejection for the next non-streaming call.
    pub fn with_rate_limit(self) -> Self {
        self.replies.lock().push_back(MockReply::RateLimited);
        self
    }

    /// Queue a generic failure for the next non-streaming call.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(MockReply::Failure(message.into()));
        self
    }

    pub fn push_response(&self, response: LlmResponse) {
        self.replies.lock().push_back(MockReply::Response(response));
    }

    pub fn push_stream(&self, stream: MockStream) {
        self.streams.lock().push_back(stream);
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().push(request);
        match self.replies.lock().pop_front() {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::RateLimited) => Err(PetwiseError::RateLimited {
                provider: self.name.clone(),
                message: "scripted rate limit".into(),
            }),
            Some(MockReply::Failure(message)) => Err(PetwiseError::Model(message)),
            None => Err(PetwiseError::Model(format!("{}: no scripted response left", self.name))),
        }
    }

    async fn generate_stream(&self, request: LlmRequest) -> Result<LlmEventStream> {
        self.requests.lock().push(request);
        let scripted = self.streams.lock().pop_front().unwrap_or(MockStream::Chunks(Vec::new()));

        let events: Vec<StreamEvent> = match scripted {
            MockStream::Chunks(chunks) => chunks
                .into_iter()
                .map(|delta| StreamEvent::OutputTextDelta { delta })
                .chain(std::iter::once(StreamEvent::Completed))
                .collect(),
            MockStream::ChunksThenError(chunks, message) => chunks
                .into_iter()
                .map(|delta| StreamEvent::OutputTextDelta { delta })
                .chain(std::iter::once(StreamEvent::Error { message }))
                .collect(),
            MockStream::Fail(message) => return Err(PetwiseError::Model(message)),
        };

        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use petwise_core::Content;

    #[tokio::test]
    async fn replays_responses_in_order_and_records_requests() {
        let llm = MockLlm::new("mock").with_text("first").with_rate_limit();
        let request = LlmRequest::new("m", vec![Content::user("hello")]);

        let first = llm.generate(request.clone()).await.unwrap();
        assert_eq!(first.text().as_deref(), Some("first"));

        let second = llm.generate(request.clone()).await;
        assert!(second.unwrap_err().is_rate_limited());

        assert!(llm.generate(request).await.is_err());
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn stream_ends_with_completion_or_error() {
        let llm = MockLlm::new("mock")
            .with_stream(MockStream::chunks(["a", "b"]))
            .with_stream(MockStream::ChunksThenError(vec!["c".into()], "boom".into()));

        let events: Vec<_> =
            llm.generate_stream(LlmRequest::default()).await.unwrap().collect().await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], StreamEvent::Completed);

        let events: Vec<_> =
            llm.generate_stream(LlmRequest::default()).await.unwrap().collect().await;
        assert_eq!(events.last(), Some(&StreamEvent::Error { message: "boom".into() }));
    }
}
