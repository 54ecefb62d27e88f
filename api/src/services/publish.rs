//! Publishing orchestrator
//!
//! Bridges a persisted content record to the adapter registered for its
//! provider and writes the outcome back. A record is claimed (`posting`) before
//! any provider call, so two publishes of the same record cannot interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use crate::domain::{Content, ContentStatus, PostedUnit, PublishRecord};
use crate::error::{IntegrationError, Result};
use crate::events::{Event, EventBus};
use crate::providers::{ProgressSink, PublishJob, PublisherRegistry};
use crate::store::ContentStore;

/// Appends every posted unit to the content row as the publish progresses
struct ContentProgress<'a> {
    contents: &'a dyn ContentStore,
    content_id: i64,
    posted: AtomicUsize,
}

#[async_trait]
impl ProgressSink for ContentProgress<'_> {
    async fn unit_posted(&self, unit: &PostedUnit) -> Result<()> {
        // The unit is live whether or not the write below lands
        self.posted.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.contents.record_posted_unit(self.content_id, unit).await {
            error!(
                content_id = self.content_id,
                index = unit.index,
                provider_id = %unit.provider_id,
                error = %e,
                "posted unit could not be recorded, a resume will post it again"
            );
            return Err(e);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Publisher {
    contents: Arc<dyn ContentStore>,
    registry: PublisherRegistry,
    events: EventBus,
}

impl Publisher {
    pub fn new(contents: Arc<dyn ContentStore>, registry: PublisherRegistry, events: EventBus) -> Self {
        Self {
            contents,
            registry,
            events,
        }
    }

    /// Publish one content record and return it in its new state
    pub async fn publish(&self, account_id: i64, content_id: i64) -> Result<Content> {
        let content = self
            .contents
            .get_content(account_id, content_id)
            .await?
            .ok_or_else(|| IntegrationError::NotFound(format!("content {}", content_id)))?;

        let previous = content.status;
        if !previous.can_publish() || !self.contents.begin_publish(account_id, content_id).await? {
            return Err(IntegrationError::Conflict(format!(
                "content {} is {}",
                content_id,
                previous.as_str()
            )));
        }

        let published = content.publishable().clone();
        let provider = published.provider;
        let resume = content.posted_units.0.clone();
        let progress = ContentProgress {
            contents: self.contents.as_ref(),
            content_id,
            posted: AtomicUsize::new(0),
        };

        let result = match self.registry.get(provider) {
            Some(adapter) => {
                adapter
                    .publish(PublishJob {
                        content: &published,
                        integration_id: content.integration_id,
                        resume: &resume,
                        progress: &progress,
                    })
                    .await
            }
            None => {
                warn!(
                    content_id,
                    provider = %provider,
                    "no publish adapter for provider, marking posted without a link"
                );
                Ok(None)
            }
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let posted_units = resume.len() + progress.posted.load(Ordering::SeqCst);
                let status = if posted_units > 0 {
                    ContentStatus::PartialFailed
                } else {
                    previous
                };
                self.release(content_id, status).await;
                self.events.emit(Event::ContentPublishFailed {
                    account_id,
                    content_id,
                    provider,
                    kind: e.kind(),
                    posted_units,
                });
                self.events.emit(Event::ContentListStale { account_id });
                return Err(e);
            }
        };

        let posted_url = outcome.map(|o| o.link);
        if let Err(e) = self
            .contents
            .finish_publish(
                content_id,
                &PublishRecord {
                    posted_url: posted_url.clone(),
                    published,
                    posted_at: Utc::now(),
                },
            )
            .await
        {
            error!(
                account_id,
                content_id,
                posted_url = ?posted_url,
                error = %e,
                "provider accepted the post but the record could not be finished"
            );
            self.release(content_id, ContentStatus::PartialFailed).await;
            self.events.emit(Event::ContentPublishFailed {
                account_id,
                content_id,
                provider,
                kind: e.kind(),
                posted_units: resume.len() + progress.posted.load(Ordering::SeqCst),
            });
            self.events.emit(Event::ContentListStale { account_id });
            return Err(e);
        }

        info!(account_id, content_id, provider = %provider, posted_url = ?posted_url, "content published");
        self.events.emit(Event::ContentPublished {
            account_id,
            content_id,
            provider,
            posted_url,
        });
        self.events.emit(Event::ContentListStale { account_id });

        self.contents
            .get_content(account_id, content_id)
            .await?
            .ok_or_else(|| IntegrationError::NotFound(format!("content {}", content_id)))
    }

    /// Move a claimed record out of `posting`. Failure is logged only, so the
    /// caller still sees the error that stopped the publish.
    async fn release(&self, content_id: i64, status: ContentStatus) {
        if let Err(e) = self.contents.fail_publish(content_id, status).await {
            error!(
                content_id,
                status = status.as_str(),
                error = %e,
                "could not release content from posting"
            );
        }
    }
}
