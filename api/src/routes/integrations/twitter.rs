//! Twitter connect endpoints (/integrations/twitter/*)
//!
//! OAuth 1.0a identifies the account; the OAuth2 PKCE flow adds the refresh
//! token publishing needs. Both flows park their temporary state in cookies.

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use super::{ConnectQuery, abort_connect};
use crate::AppState;
use crate::constants::{TWITTER_CALLBACK_PATH, TWITTER_OAUTH2_CALLBACK_PATH, TWITTER_OAUTH2_SCOPES};
use crate::services::callback::{self, TwitterOAuth1Callback, TwitterOAuth2Callback};
use crate::services::cookies::{self, names};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/integrations/twitter/connect", get(connect))
        .route("/integrations/twitter/callback", get(oauth1_callback))
        .route("/integrations/twitter/oauth2/connect", get(oauth2_connect))
        .route("/integrations/twitter/oauth2/callback", get(oauth2_callback))
}

fn redirect_with_cookies(
    url: &str,
    cookies: &[(&str, &str)],
    secure: bool,
) -> Result<Response, StatusCode> {
    let mut response = Redirect::to(url).into_response();
    for (name, value) in cookies {
        response
            .headers_mut()
            .append(SET_COOKIE, cookies::build_oauth_cookie(name, value, secure)?);
    }
    Ok(response)
}

fn redirect_clearing_cookies(url: &str) -> Result<Response, StatusCode> {
    let mut response = Redirect::to(url).into_response();
    for name in names::ALL {
        response
            .headers_mut()
            .append(SET_COOKIE, cookies::build_clear_cookie(name)?);
    }
    Ok(response)
}

fn cookie(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|c| c.value().to_string())
}

/// GET /integrations/twitter/connect - request token, then off to the authorize page
async fn connect(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<Response, StatusCode> {
    let correlation = match query.correlation() {
        Ok(c) => c,
        Err(e) => return Ok(abort_connect(&state, "twitter", &e).into_response()),
    };

    let callback_url = state.config.callback_url(TWITTER_CALLBACK_PATH);
    let request_token = match state.twitter.request_token(&callback_url).await {
        Ok(token) => token,
        Err(e) => return Ok(abort_connect(&state, "twitter", &e).into_response()),
    };

    let account_id = correlation.account_id.to_string();
    redirect_with_cookies(
        &state.twitter.authorize_url(&request_token.token),
        &[
            (names::OAUTH_SECRET, request_token.secret.as_str()),
            (names::OAUTH_SLUG, correlation.slug.as_str()),
            (names::OAUTH_ACCOUNT, account_id.as_str()),
        ],
        state.config.secure_cookies,
    )
}

#[derive(Debug, Deserialize)]
struct OAuth1CallbackQuery {
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
}

/// GET /integrations/twitter/callback
async fn oauth1_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<OAuth1CallbackQuery>,
) -> Result<Response, StatusCode> {
    let outcome = callback::complete_twitter_oauth1(
        &state,
        TwitterOAuth1Callback {
            oauth_token: query.oauth_token,
            oauth_verifier: query.oauth_verifier,
            token_secret: cookie(&jar, names::OAUTH_SECRET),
            account_id: cookie(&jar, names::OAUTH_ACCOUNT),
            slug: cookie(&jar, names::OAUTH_SLUG),
        },
    )
    .await;

    redirect_clearing_cookies(&outcome.redirect)
}

/// GET /integrations/twitter/oauth2/connect - PKCE authorize redirect
async fn oauth2_connect(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<Response, StatusCode> {
    let correlation = match query.correlation() {
        Ok(c) => c,
        Err(e) => return Ok(abort_connect(&state, "twitter", &e).into_response()),
    };

    let redirect_uri = state.config.callback_url(TWITTER_OAUTH2_CALLBACK_PATH);
    let auth_request = state
        .twitter
        .oauth2_authorize(&redirect_uri, TWITTER_OAUTH2_SCOPES);

    let account_id = correlation.account_id.to_string();
    redirect_with_cookies(
        &auth_request.url,
        &[
            (names::PKCE_STATE, auth_request.state.as_str()),
            (names::PKCE_VERIFIER, auth_request.code_verifier.as_str()),
            (names::OAUTH_SLUG, correlation.slug.as_str()),
            (names::OAUTH_ACCOUNT, account_id.as_str()),
        ],
        state.config.secure_cookies,
    )
}

#[derive(Debug, Deserialize)]
struct OAuth2CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// GET /integrations/twitter/oauth2/callback
async fn oauth2_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<OAuth2CallbackQuery>,
) -> Result<Response, StatusCode> {
    let outcome = callback::complete_twitter_oauth2(
        &state,
        TwitterOAuth2Callback {
            code: query.code,
            state: query.state,
            expected_state: cookie(&jar, names::PKCE_STATE),
            code_verifier: cookie(&jar, names::PKCE_VERIFIER),
            account_id: cookie(&jar, names::OAUTH_ACCOUNT),
            slug: cookie(&jar, names::OAUTH_SLUG),
        },
    )
    .await;

    redirect_clearing_cookies(&outcome.redirect)
}
