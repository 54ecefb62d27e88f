//! Request/response shapes for the content endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Content, ContentStatus, GeneratedContent, PostedUnit};

#[derive(Debug, Clone, Serialize)]
pub struct ContentResponse {
    pub id: i64,
    pub integration_id: i64,
    pub status: ContentStatus,
    pub generated_content: GeneratedContent,
    pub edited_content: Option<GeneratedContent>,
    pub posted_units: Vec<PostedUnit>,
    pub posted_url: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Content> for ContentResponse {
    fn from(c: Content) -> Self {
        Self {
            id: c.id,
            integration_id: c.integration_id,
            status: c.status,
            generated_content: c.generated_content.0,
            edited_content: c.edited_content.map(|e| e.0),
            posted_units: c.posted_units.0,
            posted_url: c.posted_url,
            scheduled_at: c.scheduled_at,
            posted_at: c.posted_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// Body of POST /accounts/{account_id}/content. The payload is validated
/// against the generated-content schema after extraction.
#[derive(Debug, Deserialize)]
pub struct CreateContentRequest {
    pub integration_id: i64,
    pub generated_content: Value,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}
