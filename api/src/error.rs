//! Error types shared by provider adapters, stores and route handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::domain::integrations::Provider;

pub type Result<T> = std::result::Result<T, IntegrationError>;

#[derive(Error, Debug)]
pub enum IntegrationError {
    /// A payload did not have the expected shape
    #[error("validation failed: {0}")]
    Validation(String),

    /// Integration row missing, or the provider rejected our credentials
    #[error("credential error: {0}")]
    Credential(String),

    /// Non-2xx answer or transport failure talking to a provider
    #[error("{provider} request failed{}: {message}", status_suffix(.status))]
    ProviderHttp {
        provider: Provider,
        status: Option<u16>,
        message: String,
    },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl IntegrationError {
    /// Stable name used in logs and emitted events
    pub fn kind(&self) -> &'static str {
        match self {
            IntegrationError::Validation(_) => "validation_error",
            IntegrationError::Credential(_) => "credential_error",
            IntegrationError::ProviderHttp { .. } => "provider_http_error",
            IntegrationError::Persistence(_) => "persistence_error",
            IntegrationError::NotFound(_) => "not_found",
            IntegrationError::Conflict(_) => "conflict",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IntegrationError::Validation(_) => StatusCode::BAD_REQUEST,
            IntegrationError::Credential(_) => StatusCode::UNAUTHORIZED,
            IntegrationError::ProviderHttp { .. } => StatusCode::BAD_GATEWAY,
            IntegrationError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IntegrationError::NotFound(_) => StatusCode::NOT_FOUND,
            IntegrationError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    /// Message safe to show the caller. Provider and storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            IntegrationError::ProviderHttp { provider, .. } => format!("{} request failed", provider),
            IntegrationError::Credential(_) => {
                "integration credentials were rejected, reconnect the account".to_string()
            }
            IntegrationError::Persistence(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    fn body(&self, message: String) -> Response {
        let body = Json(ErrorBody {
            error: message,
            kind: self.kind(),
        });
        (self.status_code(), body).into_response()
    }

    pub fn provider_http(provider: Provider, status: Option<u16>, message: impl Into<String>) -> Self {
        IntegrationError::ProviderHttp {
            provider,
            status,
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for IntegrationError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => IntegrationError::NotFound("row not found".to_string()),
            other => IntegrationError::Persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for IntegrationError {
    fn from(e: serde_json::Error) -> Self {
        IntegrationError::Validation(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for IntegrationError {
    fn into_response(self) -> Response {
        let message = self.public_message();
        self.body(message)
    }
}

/// Error of the publish endpoint. Upstream and storage failures collapse into
/// one retry message for the dashboard.
#[derive(Debug)]
pub struct PublishError(pub IntegrationError);

impl From<IntegrationError> for PublishError {
    fn from(e: IntegrationError) -> Self {
        PublishError(e)
    }
}

impl PublishError {
    pub fn public_message(&self) -> String {
        match &self.0 {
            IntegrationError::ProviderHttp { .. }
            | IntegrationError::Credential(_)
            | IntegrationError::Persistence(_) => "failed to post, try again".to_string(),
            other => other.public_message(),
        }
    }
}

impl IntoResponse for PublishError {
    fn into_response(self) -> Response {
        let message = self.public_message();
        self.0.body(message)
    }
}

/// Extension trait for logging errors and converting to StatusCode
pub trait LogErr<T> {
    /// Log error with context and return INTERNAL_SERVER_ERROR
    fn log_500(self, context: &str) -> std::result::Result<T, StatusCode>;
}

impl<T, E: std::fmt::Display> LogErr<T> for std::result::Result<T, E> {
    fn log_500(self, context: &str) -> std::result::Result<T, StatusCode> {
        self.map_err(|e| {
            error!(error = %e, "{}", context);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}
