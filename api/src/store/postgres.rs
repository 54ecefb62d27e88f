//! Postgres queries for integrations and content
//!
//! All query functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` (for standalone queries) and `&mut PgConnection` (for transactions).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};

use super::{ContentStore, IntegrationStore};
use crate::domain::{
    Content, ContentStatus, GeneratedContent, Integration, NewIntegration, PostedUnit,
    PublishRecord, TokenRefresh,
};
use crate::error;

const INTEGRATION_COLUMNS: &str = "id, account_id, provider, access_token, token_secret, \
     refresh_token, expires_in, username, avatar, provider_user_id, created_at, updated_at";

const CONTENT_COLUMNS: &str = "id, account_id, integration_id, status, generated_content, \
     edited_content, posted_units, posted_url, scheduled_at, posted_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Integration queries
// ============================================================================

pub async fn get_integration<'e, E>(executor: E, id: i64) -> Result<Option<Integration>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {} FROM integrations WHERE id = $1", INTEGRATION_COLUMNS);
    sqlx::query_as(&query).bind(id).fetch_optional(executor).await
}

pub async fn upsert_integration<'e, E>(
    executor: E,
    new: &NewIntegration,
) -> Result<Integration, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        INSERT INTO integrations
            (account_id, provider, access_token, token_secret, refresh_token,
             expires_in, username, avatar, provider_user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (account_id, provider, username) DO UPDATE SET
            access_token = EXCLUDED.access_token,
            token_secret = COALESCE(EXCLUDED.token_secret, integrations.token_secret),
            refresh_token = COALESCE(EXCLUDED.refresh_token, integrations.refresh_token),
            expires_in = COALESCE(EXCLUDED.expires_in, integrations.expires_in),
            avatar = COALESCE(EXCLUDED.avatar, integrations.avatar),
            provider_user_id = COALESCE(EXCLUDED.provider_user_id, integrations.provider_user_id),
            updated_at = NOW()
        RETURNING {}
        "#,
        INTEGRATION_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(new.account_id)
        .bind(new.provider)
        .bind(&new.access_token)
        .bind(&new.token_secret)
        .bind(&new.refresh_token)
        .bind(new.expires_in)
        .bind(&new.username)
        .bind(&new.avatar)
        .bind(&new.provider_user_id)
        .fetch_one(executor)
        .await
}

pub async fn swap_tokens<'e, E>(
    executor: E,
    id: i64,
    expected_refresh: Option<&str>,
    tokens: &TokenRefresh,
) -> Result<Option<Integration>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        UPDATE integrations SET
            access_token = $2,
            refresh_token = COALESCE($3, refresh_token),
            expires_in = $4,
            updated_at = NOW()
        WHERE id = $1 AND refresh_token IS NOT DISTINCT FROM $5
        RETURNING {}
        "#,
        INTEGRATION_COLUMNS
    );

    sqlx::query_as(&query)
        .bind(id)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_in)
        .bind(expected_refresh)
        .fetch_optional(executor)
        .await
}

pub async fn list_integrations<'e, E>(
    executor: E,
    account_id: i64,
) -> Result<Vec<Integration>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM integrations WHERE account_id = $1 ORDER BY created_at ASC",
        INTEGRATION_COLUMNS
    );
    sqlx::query_as(&query).bind(account_id).fetch_all(executor).await
}

pub async fn delete_integration<'e, E>(
    executor: E,
    account_id: i64,
    id: i64,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM integrations WHERE id = $1 AND account_id = $2")
        .bind(id)
        .bind(account_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Content queries
// ============================================================================

pub async fn get_content<'e, E>(
    executor: E,
    account_id: i64,
    id: i64,
) -> Result<Option<Content>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        "SELECT {} FROM content WHERE id = $1 AND account_id = $2",
        CONTENT_COLUMNS
    );
    sqlx::query_as(&query)
        .bind(id)
        .bind(account_id)
        .fetch_optional(executor)
        .await
}

pub async fn list_content<'e, E>(
    executor: E,
    account_id: i64,
    status: Option<ContentStatus>,
) -> Result<Vec<Content>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"SELECT {} FROM content
           WHERE account_id = $1 AND ($2::text IS NULL OR status = $2)
           ORDER BY created_at DESC"#,
        CONTENT_COLUMNS
    );
    sqlx::query_as(&query)
        .bind(account_id)
        .bind(status)
        .fetch_all(executor)
        .await
}

pub async fn insert_content<'e, E>(
    executor: E,
    account_id: i64,
    integration_id: i64,
    generated: &GeneratedContent,
) -> Result<Content, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        INSERT INTO content (account_id, integration_id, status, generated_content)
        VALUES ($1, $2, 'generated', $3)
        RETURNING {}
        "#,
        CONTENT_COLUMNS
    );
    sqlx::query_as(&query)
        .bind(account_id)
        .bind(integration_id)
        .bind(Json(generated))
        .fetch_one(executor)
        .await
}

pub async fn update_edited_content<'e, E>(
    executor: E,
    account_id: i64,
    id: i64,
    edited: &GeneratedContent,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE content SET edited_content = $3, updated_at = NOW()
        WHERE id = $1 AND account_id = $2 AND status IN ('generated', 'scheduled')
        "#,
    )
    .bind(id)
    .bind(account_id)
    .bind(Json(edited))
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn begin_publish<'e, E>(executor: E, account_id: i64, id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE content SET status = 'posting', updated_at = NOW()
        WHERE id = $1 AND account_id = $2
          AND status IN ('generated', 'scheduled', 'partial_failed')
        "#,
    )
    .bind(id)
    .bind(account_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn record_posted_unit<'e, E>(
    executor: E,
    id: i64,
    unit: &PostedUnit,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE content
        SET posted_units = posted_units || jsonb_build_array($2::jsonb),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(Json(unit))
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn finish_publish<'e, E>(
    executor: E,
    id: i64,
    record: &PublishRecord,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        UPDATE content SET
            status = 'posted',
            posted_url = $2,
            edited_content = $3,
            posted_at = $4,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&record.posted_url)
    .bind(Json(&record.published))
    .bind(record.posted_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn fail_publish<'e, E>(
    executor: E,
    id: i64,
    status: ContentStatus,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE content SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn schedule<'e, E>(
    executor: E,
    account_id: i64,
    id: i64,
    at: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE content SET status = 'scheduled', scheduled_at = $3, updated_at = NOW()
        WHERE id = $1 AND account_id = $2 AND status = 'generated'
        "#,
    )
    .bind(id)
    .bind(account_id)
    .bind(at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn unschedule<'e, E>(executor: E, account_id: i64, id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE content SET status = 'generated', scheduled_at = NULL, updated_at = NOW()
        WHERE id = $1 AND account_id = $2 AND status = 'scheduled'
        "#,
    )
    .bind(id)
    .bind(account_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl IntegrationStore for PgStore {
    async fn get_integration(&self, id: i64) -> error::Result<Option<Integration>> {
        Ok(get_integration(&self.pool, id).await?)
    }

    async fn upsert_integration(&self, new: &NewIntegration) -> error::Result<Integration> {
        Ok(upsert_integration(&self.pool, new).await?)
    }

    async fn swap_tokens(
        &self,
        id: i64,
        expected_refresh: Option<&str>,
        tokens: &TokenRefresh,
    ) -> error::Result<Option<Integration>> {
        Ok(swap_tokens(&self.pool, id, expected_refresh, tokens).await?)
    }

    async fn list_integrations(&self, account_id: i64) -> error::Result<Vec<Integration>> {
        Ok(list_integrations(&self.pool, account_id).await?)
    }

    async fn delete_integration(&self, account_id: i64, id: i64) -> error::Result<bool> {
        Ok(delete_integration(&self.pool, account_id, id).await?)
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn get_content(&self, account_id: i64, id: i64) -> error::Result<Option<Content>> {
        Ok(get_content(&self.pool, account_id, id).await?)
    }

    async fn list_content(
        &self,
        account_id: i64,
        status: Option<ContentStatus>,
    ) -> error::Result<Vec<Content>> {
        Ok(list_content(&self.pool, account_id, status).await?)
    }

    async fn insert_content(
        &self,
        account_id: i64,
        integration_id: i64,
        generated: &GeneratedContent,
    ) -> error::Result<Content> {
        Ok(insert_content(&self.pool, account_id, integration_id, generated).await?)
    }

    async fn update_edited_content(
        &self,
        account_id: i64,
        id: i64,
        edited: &GeneratedContent,
    ) -> error::Result<bool> {
        Ok(update_edited_content(&self.pool, account_id, id, edited).await?)
    }

    async fn begin_publish(&self, account_id: i64, id: i64) -> error::Result<bool> {
        Ok(begin_publish(&self.pool, account_id, id).await?)
    }

    async fn record_posted_unit(&self, id: i64, unit: &PostedUnit) -> error::Result<()> {
        Ok(record_posted_unit(&self.pool, id, unit).await?)
    }

    async fn finish_publish(&self, id: i64, record: &PublishRecord) -> error::Result<()> {
        Ok(finish_publish(&self.pool, id, record).await?)
    }

    async fn fail_publish(&self, id: i64, status: ContentStatus) -> error::Result<()> {
        Ok(fail_publish(&self.pool, id, status).await?)
    }

    async fn schedule(&self, account_id: i64, id: i64, at: DateTime<Utc>) -> error::Result<bool> {
        Ok(schedule(&self.pool, account_id, id, at).await?)
    }

    async fn unschedule(&self, account_id: i64, id: i64) -> error::Result<bool> {
        Ok(unschedule(&self.pool, account_id, id).await?)
    }
}
