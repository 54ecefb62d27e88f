//! Threads connect endpoints (/integrations/threads/*)

use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ConnectQuery, abort_connect};
use crate::AppState;
use crate::constants::{THREADS_CALLBACK_PATH, THREADS_SCOPES};
use crate::providers::threads::ThreadsState;
use crate::services::callback::{self, ThreadsCallback};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/integrations/threads/connect", get(connect))
        .route("/integrations/threads/callback", get(complete))
}

/// GET /integrations/threads/connect
async fn connect(State(state): State<Arc<AppState>>, Query(query): Query<ConnectQuery>) -> Redirect {
    let correlation = match query.correlation() {
        Ok(c) => c,
        Err(e) => return abort_connect(&state, "threads", &e),
    };

    let redirect_uri = state.config.callback_url(THREADS_CALLBACK_PATH);
    let oauth_state = ThreadsState {
        account_id: correlation.account_id,
        slug: correlation.slug,
    };
    match state
        .threads
        .authorize_url(&redirect_uri, &oauth_state, THREADS_SCOPES)
    {
        Ok(url) => Redirect::to(&url),
        Err(e) => abort_connect(&state, "threads", &e),
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// GET /integrations/threads/callback
async fn complete(State(state): State<Arc<AppState>>, Query(query): Query<CallbackQuery>) -> Redirect {
    let outcome = callback::complete_threads(
        &state,
        ThreadsCallback {
            code: query.code,
            state: query.state,
        },
    )
    .await;
    Redirect::to(&outcome.redirect)
}
