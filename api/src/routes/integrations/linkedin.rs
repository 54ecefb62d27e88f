//! LinkedIn connect endpoints (/integrations/linkedin/*)
//!
//! Tenant correlation rides in the redirect URI's query string.

use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;

use super::{ConnectQuery, abort_connect};
use crate::AppState;
use crate::constants::LINKEDIN_SCOPES;
use crate::services::callback::{self, LinkedinCallback};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/integrations/linkedin/connect", get(connect))
        .route("/integrations/linkedin/callback", get(complete))
}

/// GET /integrations/linkedin/connect
async fn connect(State(state): State<Arc<AppState>>, Query(query): Query<ConnectQuery>) -> Redirect {
    let correlation = match query.correlation() {
        Ok(c) => c,
        Err(e) => return abort_connect(&state, "linkedin", &e),
    };

    let nonce: [u8; 16] = rand::rng().random();
    let nonce = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(nonce);
    let redirect_uri = callback::linkedin_redirect_uri(&state, &correlation);

    Redirect::to(&state.linkedin.authorize_url(&redirect_uri, &nonce, LINKEDIN_SCOPES))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    account_id: Option<String>,
    slug: Option<String>,
}

/// GET /integrations/linkedin/callback
async fn complete(State(state): State<Arc<AppState>>, Query(query): Query<CallbackQuery>) -> Redirect {
    let outcome = callback::complete_linkedin(
        &state,
        LinkedinCallback {
            code: query.code,
            account_id: query.account_id,
            slug: query.slug,
        },
    )
    .await;
    Redirect::to(&outcome.redirect)
}
