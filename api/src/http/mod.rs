//! Outbound HTTP seam
//!
//! Provider adapters never touch `reqwest` directly; they build an `HttpRequest`
//! and hand it to an `HttpClient`. Production uses `ReqwestClient`, tests use
//! `MockHttp` to script answers and assert on what was sent.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Provider;
use crate::error::{IntegrationError, Result};

pub mod mock;

pub use mock::MockHttp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn form(mut self, params: &[(&str, &str)]) -> Self {
        self.body = Body::Form(
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Body::Json(body);
        self
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            Body::Form(params) => params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Query and form parameters, the set an OAuth1 signature covers
    pub fn signed_params(&self) -> Vec<(String, String)> {
        let mut params = self.query.clone();
        if let Body::Form(form) = &self.body {
            params.extend(form.iter().cloned());
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body, failing with a validation error on schema mismatch
    pub fn json<T: DeserializeOwned>(&self, provider: Provider) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            IntegrationError::Validation(format!("unexpected {} response: {}", provider, e))
        })
    }
}

/// Transport-level failure (DNS, TLS, connection reset, timeout)
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Send a request and treat transport failures and non-2xx answers as provider errors
pub async fn send_checked(
    client: &dyn HttpClient,
    provider: Provider,
    request: HttpRequest,
) -> Result<HttpResponse> {
    let method = request.method;
    let url = request.url.clone();
    let response = client.send(request).await.map_err(|e| {
        IntegrationError::provider_http(provider, None, format!("{} {}: {}", method.as_str(), url, e))
    })?;

    if !response.is_success() {
        return Err(IntegrationError::provider_http(
            provider,
            Some(response.status),
            format!("{} {}: {}", method.as_str(), url, response.body),
        ));
    }
    Ok(response)
}

#[derive(Clone, Default)]
pub struct ReqwestClient {
    http: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.http.get(&request.url),
            Method::Post => self.http.post(&request.url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Form(params) => builder.form(&params),
            Body::Json(value) => builder.json(&value),
        };

        let resp = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
