//! Integration endpoints: per-provider OAuth connect/callback, plus listing and removal

pub mod linkedin;
pub mod threads;
pub mod twitter;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Redirect,
    routing::{delete, get},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tracing::{info, warn};

use crate::AppState;
use crate::domain::IntegrationSummary;
use crate::error::{IntegrationError, Result};
use crate::events::Event;
use crate::services::callback::Correlation;

pub fn routes(rate_limit: bool) -> Router<Arc<AppState>> {
    let oauth = Router::new()
        .merge(twitter::routes())
        .merge(linkedin::routes())
        .merge(threads::routes());

    let oauth = if rate_limit {
        // 5 request burst per client, refilled one every 12 seconds
        match GovernorConfigBuilder::default()
            .per_second(12)
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
        {
            Some(config) => oauth.layer(GovernorLayer {
                config: config.into(),
            }),
            None => {
                warn!("invalid oauth rate limit config, serving without rate limiting");
                oauth
            }
        }
    } else {
        oauth
    };

    Router::new()
        .route("/accounts/{account_id}/integrations", get(list_integrations))
        .route(
            "/accounts/{account_id}/integrations/{id}",
            delete(delete_integration),
        )
        .merge(oauth)
}

/// Query of every connect-start endpoint
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub account_id: Option<String>,
    pub slug: Option<String>,
}

impl ConnectQuery {
    pub fn correlation(&self) -> Result<Correlation> {
        Correlation::parse(self.account_id.as_deref(), self.slug.as_deref())
    }
}

/// Connect could not start; send the user back to the dashboard
pub fn abort_connect(state: &AppState, provider: &str, err: &IntegrationError) -> Redirect {
    warn!(provider, kind = err.kind(), error = %err, "oauth connect start failed");
    Redirect::to(&state.config.fallback_url())
}

/// GET /accounts/{account_id}/integrations
async fn list_integrations(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<i64>,
) -> Result<Json<Vec<IntegrationSummary>>> {
    let rows = state.integrations.list_integrations(account_id).await?;
    Ok(Json(rows.into_iter().map(IntegrationSummary::from).collect()))
}

/// DELETE /accounts/{account_id}/integrations/{id}
async fn delete_integration(
    State(state): State<Arc<AppState>>,
    Path((account_id, id)): Path<(i64, i64)>,
) -> Result<StatusCode> {
    if !state.integrations.delete_integration(account_id, id).await? {
        return Err(IntegrationError::NotFound(format!("integration {}", id)));
    }
    info!(account_id, integration_id = id, "integration deleted");
    state.events.emit(Event::IntegrationDeleted {
        account_id,
        integration_id: id,
    });
    Ok(StatusCode::NO_CONTENT)
}
