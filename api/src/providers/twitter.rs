//! Twitter/X adapter
//!
//! Connect uses the OAuth 1.0a three-legged handshake (request token, user
//! authorization, access token) to identify the account. Publishing uses OAuth2
//! bearer tokens: every publish call first mints a fresh token with the stored
//! refresh token, so the OAuth2 PKCE connect flow is what makes an integration
//! publishable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::oauth1::{self, OAuth1Signer, TokenPair};
use super::{ProgressSink, PublishAdapter, PublishJob, PublishOutcome};
use crate::config::ClientCredentials;
use crate::constants::{TWITTER_API_BASE, X_API_BASE, X_AUTHORIZE_URL, X_WEB_BASE};
use crate::domain::{Integration, PostUnit, PostedUnit, Provider, TokenRefresh};
use crate::error::{IntegrationError, Result};
use crate::http::{HttpClient, HttpRequest, send_checked};
use crate::store::IntegrationStore;

const PROVIDER: Provider = Provider::Twitter;

/// Temporary credentials from the request-token leg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
}

/// Long-lived OAuth1 credentials for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
    pub user_id: Option<String>,
    pub screen_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedAccount {
    pub id_str: String,
    pub screen_name: String,
    pub profile_image_url_https: Option<String>,
}

#[derive(Debug)]
pub struct AuthorizeRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    data: TwitterUser,
}

#[derive(Debug, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub username: String,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetResponseWrapper {
    data: TweetResponse,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    id: String,
}

pub struct TwitterAdapter {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn IntegrationStore>,
    signer: OAuth1Signer,
    oauth2: ClientCredentials,
    api_base: String,
    x_api_base: String,
    refresh_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl TwitterAdapter {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn IntegrationStore>,
        signer: OAuth1Signer,
        oauth2: ClientCredentials,
    ) -> Self {
        Self {
            http,
            store,
            signer,
            oauth2,
            api_base: TWITTER_API_BASE.to_string(),
            x_api_base: X_API_BASE.to_string(),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    // ------------------------------------------------------------------
    // OAuth 1.0a connect
    // ------------------------------------------------------------------

    pub async fn request_token(&self, callback_url: &str) -> Result<RequestToken> {
        let request = self.signer.sign(
            HttpRequest::post(format!("{}/oauth/request_token", self.api_base)),
            None,
            &[("oauth_callback", callback_url)],
        );
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        let fields = oauth1::parse_form(&resp.body);

        if oauth1::form_value(&fields, "oauth_callback_confirmed") == Some("false") {
            return Err(IntegrationError::Validation("oauth callback not confirmed".to_string()));
        }

        match (
            oauth1::form_value(&fields, "oauth_token"),
            oauth1::form_value(&fields, "oauth_token_secret"),
        ) {
            (Some(token), Some(secret)) => Ok(RequestToken {
                token: token.to_string(),
                secret: secret.to_string(),
            }),
            _ => Err(IntegrationError::Validation(
                "request token response missing oauth_token".to_string(),
            )),
        }
    }

    pub fn authorize_url(&self, request_token: &str) -> String {
        format!(
            "{}/oauth/authorize?oauth_token={}",
            self.api_base,
            oauth1::encode(request_token)
        )
    }

    /// Exchange the authorized request token for account credentials
    pub async fn access_token(
        &self,
        oauth_token: &str,
        token_secret: &str,
        verifier: &str,
    ) -> Result<AccessToken> {
        let request = self.signer.sign(
            HttpRequest::post(format!("{}/oauth/access_token", self.api_base))
                .form(&[("oauth_verifier", verifier)]),
            Some(TokenPair { token: oauth_token, secret: token_secret }),
            &[],
        );
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        let fields = oauth1::parse_form(&resp.body);

        let token = oauth1::form_value(&fields, "oauth_token");
        let secret = oauth1::form_value(&fields, "oauth_token_secret");
        match (token, secret) {
            (Some(token), Some(secret)) => Ok(AccessToken {
                token: token.to_string(),
                secret: secret.to_string(),
                user_id: oauth1::form_value(&fields, "user_id").map(str::to_string),
                screen_name: oauth1::form_value(&fields, "screen_name").map(str::to_string),
            }),
            _ => Err(IntegrationError::Validation(
                "access token response missing oauth_token".to_string(),
            )),
        }
    }

    pub async fn verify_credentials(&self, token: &str, secret: &str) -> Result<VerifiedAccount> {
        let request = self.signer.sign(
            HttpRequest::get(format!("{}/1.1/account/verify_credentials.json", self.api_base))
                .query("skip_status", "true"),
            Some(TokenPair { token, secret }),
            &[],
        );
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        resp.json(PROVIDER)
    }

    // ------------------------------------------------------------------
    // OAuth2 + PKCE connect
    // ------------------------------------------------------------------

    /// Generate PKCE code verifier and challenge
    fn generate_pkce() -> (String, String) {
        let verifier_bytes: [u8; 32] = rand::rng().random();
        let code_verifier = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut hasher = Sha256::new();
        hasher.update(code_verifier.as_bytes());
        let code_challenge =
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());

        (code_verifier, code_challenge)
    }

    /// Random state for CSRF protection
    fn generate_state() -> String {
        let bytes: [u8; 16] = rand::rng().random();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.oauth2.id, self.oauth2.secret);
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }

    /// Build the authorization URL; state and verifier must be kept for the callback
    pub fn oauth2_authorize(&self, redirect_uri: &str, scopes: &[&str]) -> AuthorizeRequest {
        let state = Self::generate_state();
        let (code_verifier, code_challenge) = Self::generate_pkce();

        let url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256",
            X_AUTHORIZE_URL,
            oauth1::encode(&self.oauth2.id),
            oauth1::encode(redirect_uri),
            scopes.join("%20"),
            oauth1::encode(&state),
            oauth1::encode(&code_challenge)
        );

        AuthorizeRequest {
            url,
            state,
            code_verifier,
        }
    }

    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let request = HttpRequest::post(format!("{}/2/oauth2/token", self.x_api_base))
            .header("Authorization", self.basic_auth_header())
            .form(&[
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
                ("code_verifier", code_verifier),
            ]);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        resp.json(PROVIDER)
    }

    pub async fn get_me(&self, access_token: &str) -> Result<TwitterUser> {
        let request = HttpRequest::get(format!("{}/2/users/me", self.x_api_base))
            .query("user.fields", "profile_image_url")
            .bearer(access_token);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        let wrapper: UserResponse = resp.json(PROVIDER)?;
        Ok(wrapper.data)
    }

    // ------------------------------------------------------------------
    // Token refresh
    // ------------------------------------------------------------------

    async fn refresh_lock(&self, integration_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks.entry(integration_id).or_default().clone()
    }

    /// Drop the map entry once no other refresh holds or waits on it
    async fn release_refresh_lock(&self, integration_id: i64, lock: Arc<Mutex<()>>) {
        let mut locks = self.refresh_locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&integration_id);
        }
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<TokenRefresh> {
        let request = HttpRequest::post(format!("{}/2/oauth2/token", self.x_api_base))
            .header("Authorization", self.basic_auth_header())
            .form(&[
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ]);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        let token: TokenResponse = resp.json(PROVIDER)?;
        Ok(TokenRefresh {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
        })
    }

    /// Mint a fresh bearer token and persist it.
    ///
    /// Refreshes of one integration are serialized, and the write only lands if
    /// the stored refresh token is still the one we spent. On a lost race the row
    /// is reloaded and refreshed once more with the winner's token.
    pub async fn refresh_access_token(&self, integration_id: i64) -> Result<Integration> {
        let lock = self.refresh_lock(integration_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.refresh_serialized(integration_id).await
        };
        self.release_refresh_lock(integration_id, lock).await;
        result
    }

    async fn refresh_serialized(&self, integration_id: i64) -> Result<Integration> {
        let mut integration = self.load(integration_id).await?;

        for attempt in 0..2 {
            let refresh_token = integration.refresh_token.clone().ok_or_else(|| {
                IntegrationError::Credential(format!(
                    "integration {} has no refresh token",
                    integration_id
                ))
            })?;

            let tokens = self
                .request_refresh(&refresh_token)
                .await
                .map_err(|e| IntegrationError::Credential(format!("token refresh failed: {}", e)))?;

            match self
                .store
                .swap_tokens(integration_id, Some(&refresh_token), &tokens)
                .await?
            {
                Some(updated) => {
                    debug!(integration_id, "refreshed twitter access token");
                    return Ok(updated);
                }
                None => {
                    warn!(integration_id, attempt, "refresh token changed underneath, reloading");
                    integration = self.load(integration_id).await?;
                }
            }
        }

        Err(IntegrationError::Credential(format!(
            "integration {} refresh kept conflicting",
            integration_id
        )))
    }

    async fn load(&self, integration_id: i64) -> Result<Integration> {
        self.store
            .get_integration(integration_id)
            .await?
            .filter(|i| i.provider == PROVIDER)
            .ok_or_else(|| {
                IntegrationError::Credential(format!("twitter integration {} not found", integration_id))
            })
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Post one tweet, optionally replying to or quoting another
    async fn post_tweet(
        &self,
        access_token: &str,
        text: &str,
        in_reply_to: Option<&str>,
        quote_of: Option<&str>,
    ) -> Result<String> {
        let mut body = json!({ "text": text });

        if let Some(parent_id) = in_reply_to {
            body["reply"] = json!({ "in_reply_to_tweet_id": parent_id });
        }
        if let Some(quoted_id) = quote_of {
            body["quote_tweet_id"] = json!(quoted_id);
        }

        let request = HttpRequest::post(format!("{}/2/tweets", self.x_api_base))
            .bearer(access_token)
            .json(body);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        let wrapper: TweetResponseWrapper = resp.json(PROVIDER)?;
        Ok(wrapper.data.id)
    }

    fn link(username: &str, tweet_id: &str) -> String {
        format!("{}/{}/status/{}", X_WEB_BASE, username, tweet_id)
    }

    pub async fn single_post(&self, text: &str, integration_id: i64) -> Result<PublishOutcome> {
        let integration = self.refresh_access_token(integration_id).await?;
        let id = self
            .post_tweet(&integration.access_token, text, None, None)
            .await?;
        Ok(PublishOutcome {
            link: Self::link(&integration.username, &id),
        })
    }

    /// Post units as a reply chain, then at most one quote tweet of the first.
    ///
    /// Quote units are skipped in the chain. Units listed in `resume` are not
    /// posted again; their ids continue the chain.
    pub async fn thread_post(
        &self,
        units: &[&PostUnit],
        integration_id: i64,
        resume: &[PostedUnit],
        progress: &dyn ProgressSink,
    ) -> Result<PublishOutcome> {
        if !units.iter().any(|u| !u.is_quote_tweet()) {
            return Err(IntegrationError::Validation(
                "thread has no postable units".to_string(),
            ));
        }

        let integration = self.refresh_access_token(integration_id).await?;
        let token = integration.access_token.as_str();

        let already: HashMap<usize, &str> = resume
            .iter()
            .map(|u| (u.index, u.provider_id.as_str()))
            .collect();

        let mut first_id: Option<String> = None;
        let mut previous_id: Option<String> = None;

        for (index, unit) in units.iter().enumerate() {
            if unit.is_quote_tweet() {
                continue;
            }

            let id = match already.get(&index) {
                Some(id) => id.to_string(),
                None => {
                    let id = self
                        .post_tweet(token, &unit.post_content, previous_id.as_deref(), None)
                        .await?;
                    progress
                        .unit_posted(&PostedUnit { index, provider_id: id.clone() })
                        .await?;
                    id
                }
            };

            if first_id.is_none() {
                first_id = Some(id.clone());
            }
            previous_id = Some(id);
        }

        let Some(first_id) = first_id else {
            return Err(IntegrationError::Validation(
                "thread has no postable units".to_string(),
            ));
        };

        if let Some((index, quote)) = units.iter().enumerate().find(|(_, u)| u.is_quote_tweet()) {
            if !already.contains_key(&index) {
                let id = self
                    .post_tweet(token, &quote.post_content, None, Some(&first_id))
                    .await?;
                progress
                    .unit_posted(&PostedUnit { index, provider_id: id })
                    .await?;
            }
        }

        info!(integration_id, first_id = %first_id, "posted twitter thread");

        Ok(PublishOutcome {
            link: Self::link(&integration.username, &first_id),
        })
    }
}

#[async_trait]
impl PublishAdapter for TwitterAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn publish(&self, job: PublishJob<'_>) -> Result<Option<PublishOutcome>> {
        let units = job.content.units();
        let outcome = self
            .thread_post(&units, job.integration_id, job.resume, job.progress)
            .await?;
        Ok(Some(outcome))
    }
}
