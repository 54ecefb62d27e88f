//! Domain models for integrations and content

pub mod content;
pub mod generated;
pub mod integrations;

pub use content::{Content, ContentStatus, PostedUnit, PublishRecord};
pub use generated::{ContentMetadata, ContentType, GeneratedContent, PostGroup, PostType, PostUnit};
pub use integrations::{Integration, IntegrationSummary, NewIntegration, Provider, TokenRefresh};
