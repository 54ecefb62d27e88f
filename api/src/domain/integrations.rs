//! Integration model: one connected social account for one tenant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{Decode, Encode, Postgres, Type};

/// Social provider an integration or piece of content targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Twitter,
    Linkedin,
    Threads,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Twitter => "twitter",
            Provider::Linkedin => "linkedin",
            Provider::Threads => "threads",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "twitter" => Some(Provider::Twitter),
            "linkedin" => Some(Provider::Linkedin),
            "threads" => Some(Provider::Threads),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Stored as text so the column stays readable from the dashboard side
impl Type<Postgres> for Provider {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Provider {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        Provider::parse(&s).ok_or_else(|| format!("unknown provider '{}'", s).into())
    }
}

impl Encode<'_, Postgres> for Provider {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <String as Encode<Postgres>>::encode_by_ref(&self.as_str().to_owned(), buf)
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Integration {
    pub id: i64,
    pub account_id: i64,
    pub provider: Provider,
    pub access_token: String,
    /// OAuth1 token secret (Twitter connect flow only)
    pub token_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub username: String,
    pub avatar: Option<String>,
    /// Used to build the LinkedIn author URN
    pub provider_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values written by a successful OAuth callback.
///
/// Upserted on (account_id, provider, username); optional token fields that are
/// `None` keep whatever the existing row already holds.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIntegration {
    pub account_id: i64,
    pub provider: Provider,
    pub access_token: String,
    pub token_secret: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub username: String,
    pub avatar: Option<String>,
    pub provider_user_id: Option<String>,
}

/// Fresh token set minted by a refresh grant
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRefresh {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Integration as exposed to the dashboard (tokens never leave the server)
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationSummary {
    pub id: i64,
    pub provider: Provider,
    pub username: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Integration> for IntegrationSummary {
    fn from(i: Integration) -> Self {
        Self {
            id: i.id,
            provider: i.provider,
            username: i.username,
            avatar: i.avatar,
            created_at: i.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_matches_as_str() {
        for provider in [Provider::Twitter, Provider::Linkedin, Provider::Threads] {
            assert_eq!(Provider::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::parse("mastodon"), None);
    }

    #[test]
    fn provider_serializes_snake_case() {
        let json = serde_json::to_string(&Provider::Linkedin).unwrap();
        assert_eq!(json, "\"linkedin\"");
    }
}
