//! Content record: one generation tracked through edit, schedule and publish

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::types::Json;
use sqlx::{Decode, Encode, Postgres, Type};

use super::generated::GeneratedContent;

/// Content status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Generated,
    Scheduled,
    Posting,
    Posted,
    PartialFailed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Generated => "generated",
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Posting => "posting",
            ContentStatus::Posted => "posted",
            ContentStatus::PartialFailed => "partial_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generated" => Some(ContentStatus::Generated),
            "scheduled" => Some(ContentStatus::Scheduled),
            "posting" => Some(ContentStatus::Posting),
            "posted" => Some(ContentStatus::Posted),
            "partial_failed" => Some(ContentStatus::PartialFailed),
            _ => None,
        }
    }

    /// Statuses a publish may start from
    pub fn can_publish(&self) -> bool {
        matches!(
            self,
            ContentStatus::Generated | ContentStatus::Scheduled | ContentStatus::PartialFailed
        )
    }
}

impl Type<Postgres> for ContentStatus {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for ContentStatus {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        ContentStatus::parse(&s).ok_or_else(|| format!("unknown content status '{}'", s).into())
    }
}

impl Encode<'_, Postgres> for ContentStatus {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

/// A unit already live on the provider, recorded as a thread publish progresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedUnit {
    /// Position in the flattened unit list of the published content
    pub index: usize,
    pub provider_id: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Content {
    pub id: i64,
    pub account_id: i64,
    pub integration_id: i64,
    pub status: ContentStatus,
    pub generated_content: Json<GeneratedContent>,
    pub edited_content: Option<Json<GeneratedContent>>,
    pub posted_units: Json<Vec<PostedUnit>>,
    pub posted_url: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// The payload that gets published: the user's edit wins when present
    pub fn publishable(&self) -> &GeneratedContent {
        self.edited_content
            .as_ref()
            .map(|edited| &edited.0)
            .unwrap_or(&self.generated_content.0)
    }
}

/// Final write after a publish attempt completed
#[derive(Debug, Clone)]
pub struct PublishRecord {
    pub posted_url: Option<String>,
    pub published: GeneratedContent,
    pub posted_at: DateTime<Utc>,
}
