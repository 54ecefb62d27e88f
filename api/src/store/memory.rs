//! In-process store with the same semantics as `PgStore`

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::Mutex;

use super::{ContentStore, IntegrationStore};
use crate::domain::{
    Content, ContentStatus, GeneratedContent, Integration, NewIntegration, PostedUnit,
    PublishRecord, TokenRefresh,
};
use crate::error::{IntegrationError, Result};

#[derive(Default)]
struct Tables {
    integrations: Vec<Integration>,
    contents: Vec<Content>,
    next_integration_id: i64,
    next_content_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a persistence error
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(IntegrationError::Persistence("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IntegrationStore for MemoryStore {
    async fn get_integration(&self, id: i64) -> Result<Option<Integration>> {
        let tables = self.tables.lock().await;
        Ok(tables.integrations.iter().find(|i| i.id == id).cloned())
    }

    async fn upsert_integration(&self, new: &NewIntegration) -> Result<Integration> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let now = Utc::now();

        if let Some(existing) = tables.integrations.iter_mut().find(|i| {
            i.account_id == new.account_id && i.provider == new.provider && i.username == new.username
        }) {
            existing.access_token = new.access_token.clone();
            if new.token_secret.is_some() {
                existing.token_secret = new.token_secret.clone();
            }
            if new.refresh_token.is_some() {
                existing.refresh_token = new.refresh_token.clone();
            }
            if new.expires_in.is_some() {
                existing.expires_in = new.expires_in;
            }
            if new.avatar.is_some() {
                existing.avatar = new.avatar.clone();
            }
            if new.provider_user_id.is_some() {
                existing.provider_user_id = new.provider_user_id.clone();
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        tables.next_integration_id += 1;
        let row = Integration {
            id: tables.next_integration_id,
            account_id: new.account_id,
            provider: new.provider,
            access_token: new.access_token.clone(),
            token_secret: new.token_secret.clone(),
            refresh_token: new.refresh_token.clone(),
            expires_in: new.expires_in,
            username: new.username.clone(),
            avatar: new.avatar.clone(),
            provider_user_id: new.provider_user_id.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.integrations.push(row.clone());
        Ok(row)
    }

    async fn swap_tokens(
        &self,
        id: i64,
        expected_refresh: Option<&str>,
        tokens: &TokenRefresh,
    ) -> Result<Option<Integration>> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let Some(row) = tables.integrations.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if row.refresh_token.as_deref() != expected_refresh {
            return Ok(None);
        }
        row.access_token = tokens.access_token.clone();
        if tokens.refresh_token.is_some() {
            row.refresh_token = tokens.refresh_token.clone();
        }
        row.expires_in = tokens.expires_in;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn list_integrations(&self, account_id: i64) -> Result<Vec<Integration>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .integrations
            .iter()
            .filter(|i| i.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn delete_integration(&self, account_id: i64, id: i64) -> Result<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let before = tables.integrations.len();
        tables
            .integrations
            .retain(|i| !(i.id == id && i.account_id == account_id));
        let deleted = tables.integrations.len() < before;
        if deleted {
            tables.contents.retain(|c| c.integration_id != id);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_content(&self, account_id: i64, id: i64) -> Result<Option<Content>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .contents
            .iter()
            .find(|c| c.id == id && c.account_id == account_id)
            .cloned())
    }

    async fn list_content(
        &self,
        account_id: i64,
        status: Option<ContentStatus>,
    ) -> Result<Vec<Content>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .contents
            .iter()
            .rev()
            .filter(|c| c.account_id == account_id)
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect())
    }

    async fn insert_content(
        &self,
        account_id: i64,
        integration_id: i64,
        generated: &GeneratedContent,
    ) -> Result<Content> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        tables.next_content_id += 1;
        let now = Utc::now();
        let row = Content {
            id: tables.next_content_id,
            account_id,
            integration_id,
            status: ContentStatus::Generated,
            generated_content: Json(generated.clone()),
            edited_content: None,
            posted_units: Json(Vec::new()),
            posted_url: None,
            scheduled_at: None,
            posted_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.contents.push(row.clone());
        Ok(row)
    }

    async fn update_edited_content(
        &self,
        account_id: i64,
        id: i64,
        edited: &GeneratedContent,
    ) -> Result<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        match find_content(&mut tables, account_id, id) {
            Some(row) if matches!(row.status, ContentStatus::Generated | ContentStatus::Scheduled) => {
                row.edited_content = Some(Json(edited.clone()));
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn begin_publish(&self, account_id: i64, id: i64) -> Result<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        match find_content(&mut tables, account_id, id) {
            Some(row) if row.status.can_publish() => {
                row.status = ContentStatus::Posting;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_posted_unit(&self, id: i64, unit: &PostedUnit) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        if let Some(row) = tables.contents.iter_mut().find(|c| c.id == id) {
            row.posted_units.0.push(unit.clone());
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_publish(&self, id: i64, record: &PublishRecord) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        if let Some(row) = tables.contents.iter_mut().find(|c| c.id == id) {
            row.status = ContentStatus::Posted;
            row.posted_url = record.posted_url.clone();
            row.edited_content = Some(Json(record.published.clone()));
            row.posted_at = Some(record.posted_at);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn fail_publish(&self, id: i64, status: ContentStatus) -> Result<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        if let Some(row) = tables.contents.iter_mut().find(|c| c.id == id) {
            row.status = status;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn schedule(&self, account_id: i64, id: i64, at: DateTime<Utc>) -> Result<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        match find_content(&mut tables, account_id, id) {
            Some(row) if row.status == ContentStatus::Generated => {
                row.status = ContentStatus::Scheduled;
                row.scheduled_at = Some(at);
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn unschedule(&self, account_id: i64, id: i64) -> Result<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        match find_content(&mut tables, account_id, id) {
            Some(row) if row.status == ContentStatus::Scheduled => {
                row.status = ContentStatus::Generated;
                row.scheduled_at = None;
                row.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn find_content(tables: &mut Tables, account_id: i64, id: i64) -> Option<&mut Content> {
    tables
        .contents
        .iter_mut()
        .find(|c| c.id == id && c.account_id == account_id)
}
