//! Scripted HTTP client
//!
//! Answers requests from a FIFO of canned responses and records every request
//! in the order it was sent. Running out of responses is a transport error.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{HttpClient, HttpRequest, HttpResponse, TransportError};

#[derive(Default)]
pub struct MockHttp {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, status: u16, body: impl Into<String>) -> &Self {
        guard(&self.responses).push_back(HttpResponse::new(status, body));
        self
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(status, body.to_string())
    }

    /// Every request sent so far, oldest first
    pub fn requests(&self) -> Vec<HttpRequest> {
        guard(&self.requests).clone()
    }

    pub fn request_count(&self) -> usize {
        guard(&self.requests).len()
    }

    /// Responses still queued
    pub fn pending(&self) -> usize {
        guard(&self.responses).len()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.clone();
        guard(&self.requests).push(request);
        guard(&self.responses)
            .pop_front()
            .ok_or_else(|| TransportError(format!("no scripted response for {}", url)))
    }
}
