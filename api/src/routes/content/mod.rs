//! Content endpoints: stored generations, user edits, scheduling and publishing

pub mod dto;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::AppState;
use crate::domain::{ContentStatus, GeneratedContent};
use crate::error::{IntegrationError, PublishError, Result};
use crate::events::Event;
use dto::{ContentResponse, CreateContentRequest, ListQuery, ScheduleRequest};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/accounts/{account_id}/content",
            get(list_content).post(create_content),
        )
        .route(
            "/accounts/{account_id}/content/{id}",
            get(get_content).put(edit_content),
        )
        .route(
            "/accounts/{account_id}/content/{id}/publish",
            post(publish_content),
        )
        .route(
            "/accounts/{account_id}/content/{id}/schedule",
            post(schedule_content).delete(unschedule_content),
        )
}

async fn load(state: &AppState, account_id: i64, id: i64) -> Result<ContentResponse> {
    state
        .contents
        .get_content(account_id, id)
        .await?
        .map(ContentResponse::from)
        .ok_or_else(|| IntegrationError::NotFound(format!("content {}", id)))
}

/// GET /accounts/{account_id}/content?status=scheduled
async fn list_content(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ContentResponse>>> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(ContentStatus::parse(raw).ok_or_else(|| {
            IntegrationError::Validation(format!("unknown content status '{}'", raw))
        })?),
        None => None,
    };

    let rows = state.contents.list_content(account_id, status).await?;
    Ok(Json(rows.into_iter().map(ContentResponse::from).collect()))
}

/// GET /accounts/{account_id}/content/{id}
async fn get_content(
    State(state): State<Arc<AppState>>,
    Path((account_id, id)): Path<(i64, i64)>,
) -> Result<Json<ContentResponse>> {
    Ok(Json(load(&state, account_id, id).await?))
}

/// POST /accounts/{account_id}/content - store a fresh generation
async fn create_content(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<i64>,
    Json(body): Json<CreateContentRequest>,
) -> Result<Json<ContentResponse>> {
    let generated = GeneratedContent::from_json(body.generated_content)?;

    let integration = state
        .integrations
        .get_integration(body.integration_id)
        .await?
        .filter(|i| i.account_id == account_id)
        .ok_or_else(|| IntegrationError::NotFound(format!("integration {}", body.integration_id)))?;

    if integration.provider != generated.provider {
        return Err(IntegrationError::Validation(format!(
            "content for {} cannot target a {} integration",
            generated.provider.as_str(),
            integration.provider.as_str()
        )));
    }

    let content = state
        .contents
        .insert_content(account_id, integration.id, &generated)
        .await?;
    info!(account_id, content_id = content.id, provider = generated.provider.as_str(), "content stored");
    state.events.emit(Event::ContentListStale { account_id });

    Ok(Json(content.into()))
}

/// PUT /accounts/{account_id}/content/{id} - save the user's edit
async fn edit_content(
    State(state): State<Arc<AppState>>,
    Path((account_id, id)): Path<(i64, i64)>,
    Json(body): Json<Value>,
) -> Result<Json<ContentResponse>> {
    let edited = GeneratedContent::from_json(body)?;

    let current = load(&state, account_id, id).await?;
    if current.generated_content.provider != edited.provider {
        return Err(IntegrationError::Validation(
            "edited content must keep the original provider".to_string(),
        ));
    }

    if !state
        .contents
        .update_edited_content(account_id, id, &edited)
        .await?
    {
        return Err(IntegrationError::Conflict(format!(
            "content {} can no longer be edited ({})",
            id,
            current.status.as_str()
        )));
    }
    state.events.emit(Event::ContentListStale { account_id });

    Ok(Json(load(&state, account_id, id).await?))
}

/// POST /accounts/{account_id}/content/{id}/publish
async fn publish_content(
    State(state): State<Arc<AppState>>,
    Path((account_id, id)): Path<(i64, i64)>,
) -> std::result::Result<Json<ContentResponse>, PublishError> {
    let content = state.publisher.publish(account_id, id).await?;
    Ok(Json(content.into()))
}

/// POST /accounts/{account_id}/content/{id}/schedule
async fn schedule_content(
    State(state): State<Arc<AppState>>,
    Path((account_id, id)): Path<(i64, i64)>,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<ContentResponse>> {
    if body.scheduled_at <= Utc::now() {
        return Err(IntegrationError::Validation(
            "scheduled_at must be in the future".to_string(),
        ));
    }

    let current = load(&state, account_id, id).await?;
    if !state
        .contents
        .schedule(account_id, id, body.scheduled_at)
        .await?
    {
        return Err(IntegrationError::Conflict(format!(
            "content {} cannot be scheduled from {}",
            id,
            current.status.as_str()
        )));
    }

    info!(account_id, content_id = id, scheduled_at = %body.scheduled_at, "content scheduled");
    state.events.emit(Event::ContentScheduled {
        account_id,
        content_id: id,
    });
    state.events.emit(Event::ContentListStale { account_id });

    Ok(Json(load(&state, account_id, id).await?))
}

/// DELETE /accounts/{account_id}/content/{id}/schedule
async fn unschedule_content(
    State(state): State<Arc<AppState>>,
    Path((account_id, id)): Path<(i64, i64)>,
) -> Result<Json<ContentResponse>> {
    let current = load(&state, account_id, id).await?;
    if !state.contents.unschedule(account_id, id).await? {
        return Err(IntegrationError::Conflict(format!(
            "content {} is not scheduled ({})",
            id,
            current.status.as_str()
        )));
    }

    state.events.emit(Event::ContentUnscheduled {
        account_id,
        content_id: id,
    });
    state.events.emit(Event::ContentListStale { account_id });

    Ok(Json(load(&state, account_id, id).await?))
}
