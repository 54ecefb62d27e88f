//! Persistence seams for integrations and content
//!
//! The managed database is reached only through these traits. `PgStore` is the
//! production implementation; `MemoryStore` keeps the same semantics in process
//! for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Content, ContentStatus, GeneratedContent, Integration, NewIntegration, PostedUnit,
    PublishRecord, TokenRefresh,
};
use crate::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait IntegrationStore: Send + Sync {
    async fn get_integration(&self, id: i64) -> Result<Option<Integration>>;

    /// Insert or update on (account_id, provider, username)
    async fn upsert_integration(&self, new: &NewIntegration) -> Result<Integration>;

    /// Write a refreshed token set only if the stored refresh token still equals
    /// `expected_refresh`. Returns `None` when another writer got there first.
    async fn swap_tokens(
        &self,
        id: i64,
        expected_refresh: Option<&str>,
        tokens: &TokenRefresh,
    ) -> Result<Option<Integration>>;

    async fn list_integrations(&self, account_id: i64) -> Result<Vec<Integration>>;

    async fn delete_integration(&self, account_id: i64, id: i64) -> Result<bool>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_content(&self, account_id: i64, id: i64) -> Result<Option<Content>>;

    async fn list_content(
        &self,
        account_id: i64,
        status: Option<ContentStatus>,
    ) -> Result<Vec<Content>>;

    async fn insert_content(
        &self,
        account_id: i64,
        integration_id: i64,
        generated: &GeneratedContent,
    ) -> Result<Content>;

    /// Store a user edit. Refused (false) once a publish has started.
    async fn update_edited_content(
        &self,
        account_id: i64,
        id: i64,
        edited: &GeneratedContent,
    ) -> Result<bool>;

    /// Move an open record to `posting`. False if it was not in a publishable status.
    async fn begin_publish(&self, account_id: i64, id: i64) -> Result<bool>;

    async fn record_posted_unit(&self, id: i64, unit: &PostedUnit) -> Result<()>;

    async fn finish_publish(&self, id: i64, record: &PublishRecord) -> Result<()>;

    async fn fail_publish(&self, id: i64, status: ContentStatus) -> Result<()>;

    /// `generated` -> `scheduled`
    async fn schedule(&self, account_id: i64, id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// `scheduled` -> `generated`
    async fn unschedule(&self, account_id: i64, id: i64) -> Result<bool>;
}
