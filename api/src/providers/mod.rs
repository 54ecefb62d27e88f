//! Provider adapters
//!
//! Each provider module owns its OAuth handshake. Providers that can publish
//! also implement `PublishAdapter` and are listed in the `PublisherRegistry`;
//! adding a provider means adding one registry entry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{GeneratedContent, PostedUnit, Provider};
use crate::error::Result;

pub mod linkedin;
pub mod oauth1;
pub mod threads;
pub mod twitter;

pub use linkedin::LinkedinAdapter;
pub use oauth1::OAuth1Signer;
pub use threads::ThreadsAdapter;
pub use twitter::TwitterAdapter;

/// Result of a publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub link: String,
}

/// Receives every unit as soon as it is live on the provider
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn unit_posted(&self, unit: &PostedUnit) -> Result<()>;
}

/// Sink for callers that do not track progress
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn unit_posted(&self, _unit: &PostedUnit) -> Result<()> {
        Ok(())
    }
}

pub struct PublishJob<'a> {
    pub content: &'a GeneratedContent,
    pub integration_id: i64,
    /// Units already posted by an earlier attempt
    pub resume: &'a [PostedUnit],
    pub progress: &'a dyn ProgressSink,
}

#[async_trait]
pub trait PublishAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// Publish the content. `Ok(None)` means the content shape is not something
    /// this provider publishes and nothing was sent.
    async fn publish(&self, job: PublishJob<'_>) -> Result<Option<PublishOutcome>>;
}

#[derive(Clone, Default)]
pub struct PublisherRegistry {
    adapters: HashMap<Provider, Arc<dyn PublishAdapter>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, adapter: Arc<dyn PublishAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn PublishAdapter>> {
        self.adapters.get(&provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Provider);

    #[async_trait]
    impl PublishAdapter for Fixed {
        fn provider(&self) -> Provider {
            self.0
        }

        async fn publish(&self, _job: PublishJob<'_>) -> Result<Option<PublishOutcome>> {
            Ok(Some(PublishOutcome { link: format!("https://{}.example/1", self.0) }))
        }
    }

    #[test]
    fn registry_dispatches_by_provider() {
        let registry = PublisherRegistry::new()
            .register(Arc::new(Fixed(Provider::Twitter)))
            .register(Arc::new(Fixed(Provider::Linkedin)));

        assert_eq!(registry.get(Provider::Twitter).map(|a| a.provider()), Some(Provider::Twitter));
        assert_eq!(registry.get(Provider::Linkedin).map(|a| a.provider()), Some(Provider::Linkedin));
        assert!(registry.get(Provider::Threads).is_none());
    }
}
