//! Temporary cookies carried across the Twitter connect redirects
//!
//! The OAuth1 flow keeps the request-token secret here; the OAuth2 flow keeps
//! the PKCE state and verifier. Both keep the tenant's account id and slug.

use axum::http::{HeaderValue, StatusCode};

use crate::constants::OAUTH_COOKIE_MAX_AGE_SECS;
use crate::error::LogErr;

/// Cookie names
pub mod names {
    pub const OAUTH_SECRET: &str = "twitter_oauth_secret";
    pub const OAUTH_SLUG: &str = "twitter_oauth_slug";
    pub const OAUTH_ACCOUNT: &str = "twitter_oauth_account";
    pub const PKCE_STATE: &str = "twitter_pkce_state";
    pub const PKCE_VERIFIER: &str = "twitter_pkce_verifier";

    /// Everything a finished Twitter callback clears
    pub const ALL: &[&str] = &[OAUTH_SECRET, OAUTH_SLUG, OAUTH_ACCOUNT, PKCE_STATE, PKCE_VERIFIER];
}

/// Path the cookies are scoped to; both callbacks live under it
const COOKIE_PATH: &str = "/integrations/twitter";

/// Build a short-lived HttpOnly Set-Cookie header value
pub fn build_oauth_cookie(name: &str, value: &str, secure: bool) -> Result<HeaderValue, StatusCode> {
    let secure = if secure { " Secure;" } else { "" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Lax; Path={}; Max-Age={}",
        name, value, secure, COOKIE_PATH, OAUTH_COOKIE_MAX_AGE_SECS
    );
    cookie.parse::<HeaderValue>().log_500("failed to build oauth cookie header")
}

/// Build a Set-Cookie header that expires `name`
pub fn build_clear_cookie(name: &str) -> Result<HeaderValue, StatusCode> {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path={}; Max-Age=0",
        name, COOKIE_PATH
    )
    .parse::<HeaderValue>()
    .log_500("failed to build clear cookie header")
}
