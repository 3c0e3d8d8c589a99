//! Scripted backend for tests
//!
//! Responses are served in FIFO order. When the queue runs dry the optional
//! fallback response is returned, otherwise the call fails. Every call is
//! counted and recorded so tests can assert on what reached the model.

use crate::ai::backend::{BackendError, ModelBackend};
use crate::ai::types::VisionRequest;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub struct MockBackend {
    responses: Mutex<VecDeque<MockResponse>>,
    fallback: Option<MockResponse>,
    requests: Mutex<Vec<VisionRequest>>,
    calls: AtomicUsize,
    latency: Option<Duration>,
    frame_budget: usize,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            latency: None,
            frame_budget: 10,
        }
    }

    /// Response returned once the scripted queue is empty
    pub fn with_fallback(mut self, response: MockResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Delays each call, useful for overlapping concurrent requests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_frame_budget(mut self, frame_budget: usize) -> Self {
        self.frame_budget = frame_budget;
        self
    }

    pub fn add_response(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = lock(&self.responses);
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        lock(&self.responses).len()
    }

    /// Number of requests that reached this backend
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received so far
    pub fn requests(&self) -> Vec<VisionRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<VisionRequest> {
        lock(&self.requests).last().cloned()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn complete(&self, request: VisionRequest) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = lock(&self.responses).pop_front();
        let response = next
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| BackendError::Other {
                message: "MockBackend: No more responses in queue".to_string(),
            })?;

        match response.error {
            Some(error) => Err(error),
            None => Ok(response.content),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn frame_budget(&self) -> usize {
        self.frame_budget
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}
