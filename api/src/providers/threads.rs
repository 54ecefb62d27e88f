//! Threads adapter (connect only)
//!
//! authorization code -> short-lived token -> long-lived token -> profile.
//! Each step feeds the next; any failure aborts the whole sequence.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::oauth1::encode;
use crate::config::ClientCredentials;
use crate::constants::{THREADS_AUTH_BASE, THREADS_GRAPH_BASE};
use crate::domain::Provider;
use crate::error::{IntegrationError, Result};
use crate::http::{HttpClient, HttpRequest, send_checked};

const PROVIDER: Provider = Provider::Threads;

/// Correlation carried through the provider as the JSON `state` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadsState {
    pub account_id: i64,
    pub slug: String,
}

impl ThreadsState {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| IntegrationError::Validation(format!("threads state: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
pub struct ShortLivedToken {
    pub access_token: String,
    pub user_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct LongLivedToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ThreadsProfile {
    pub id: String,
    pub username: String,
    #[serde(alias = "threads_profile_picture_url")]
    pub profile_picture_url: Option<String>,
    #[serde(alias = "threads_biography")]
    pub biography: Option<String>,
}

pub struct ThreadsAdapter {
    http: Arc<dyn HttpClient>,
    client: ClientCredentials,
    auth_base: String,
    graph_base: String,
}

impl ThreadsAdapter {
    pub fn new(http: Arc<dyn HttpClient>, client: ClientCredentials) -> Self {
        Self {
            http,
            client,
            auth_base: THREADS_AUTH_BASE.to_string(),
            graph_base: THREADS_GRAPH_BASE.to_string(),
        }
    }

    pub fn authorize_url(
        &self,
        redirect_uri: &str,
        state: &ThreadsState,
        scopes: &[&str],
    ) -> Result<String> {
        let state = serde_json::to_string(state)?;
        Ok(format!(
            "{}/oauth/authorize?client_id={}&redirect_uri={}&scope={}&response_type=code&state={}",
            self.auth_base,
            encode(&self.client.id),
            encode(redirect_uri),
            encode(&scopes.join(",")),
            encode(&state)
        ))
    }

    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<ShortLivedToken> {
        let request = HttpRequest::post(format!("{}/oauth/access_token", self.graph_base)).form(&[
            ("client_id", self.client.id.as_str()),
            ("client_secret", self.client.secret.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ]);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        resp.json(PROVIDER)
    }

    pub async fn exchange_long_lived(&self, short_token: &str) -> Result<LongLivedToken> {
        let request = HttpRequest::get(format!("{}/access_token", self.graph_base))
            .query("grant_type", "th_exchange_token")
            .query("client_secret", self.client.secret.as_str())
            .query("access_token", short_token);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        resp.json(PROVIDER)
    }

    pub async fn profile(&self, access_token: &str) -> Result<ThreadsProfile> {
        let request = HttpRequest::get(format!("{}/v1.0/me", self.graph_base))
            .query(
                "fields",
                "id,username,threads_profile_picture_url,threads_biography",
            )
            .query("access_token", access_token);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        resp.json(PROVIDER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockHttp;
    use serde_json::json;

    fn adapter(http: Arc<MockHttp>) -> ThreadsAdapter {
        ThreadsAdapter::new(
            http,
            ClientCredentials { id: "th-app".to_string(), secret: "th-secret".to_string() },
        )
    }

    #[tokio::test]
    async fn token_chain_feeds_each_step() {
        let http = Arc::new(MockHttp::new());
        http.push_json(200, json!({ "access_token": "short", "user_id": 1789 }));
        http.push_json(200, json!({ "access_token": "long", "token_type": "bearer", "expires_in": 5183944 }));
        http.push_json(200, json!({
            "id": "1789",
            "username": "postonce",
            "threads_profile_picture_url": "https://cdn.threads.net/p.jpg"
        }));
        let adapter = adapter(http.clone());

        let short = adapter.exchange_code("code", "https://api.postonce.app/cb").await.unwrap();
        let long = adapter.exchange_long_lived(&short.access_token).await.unwrap();
        let profile = adapter.profile(&long.access_token).await.unwrap();

        assert_eq!(profile.username, "postonce");
        assert_eq!(profile.profile_picture_url.as_deref(), Some("https://cdn.threads.net/p.jpg"));

        let sent = http.requests();
        assert_eq!(sent[0].url, "https://graph.threads.net/oauth/access_token");
        assert!(sent[1].query.contains(&("grant_type".to_string(), "th_exchange_token".to_string())));
        assert!(sent[1].query.contains(&("access_token".to_string(), "short".to_string())));
        assert!(sent[2].query.contains(&("access_token".to_string(), "long".to_string())));
    }

    #[test]
    fn state_round_trips_through_authorize_url() {
        let state = ThreadsState { account_id: 7, slug: "acme".to_string() };
        let url = adapter(Arc::new(MockHttp::new()))
            .authorize_url("https://api.postonce.app/cb", &state, &["threads_basic"])
            .unwrap();
        assert!(url.contains("state=%7B%22account_id%22%3A7%2C%22slug%22%3A%22acme%22%7D"));
        assert_eq!(ThreadsState::parse(r#"{"account_id":7,"slug":"acme"}"#).unwrap(), state);
    }

    #[test]
    fn malformed_state_is_validation_error() {
        assert_eq!(ThreadsState::parse("not json").unwrap_err().kind(), "validation_error");
        assert!(ThreadsState::parse(r#"{"slug":"acme"}"#).is_err());
    }
}
