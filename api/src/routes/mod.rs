pub mod content;
pub mod health;
pub mod integrations;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes(rate_limit: bool) -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(integrations::routes(rate_limit))
        .merge(content::routes())
}
