//! LinkedIn adapter: OAuth2 authorization code + OpenID userinfo, UGC share publishing
//!
//! There is no refresh grant here. `expires_in` is stored with the integration
//! but never checked; an expired token surfaces as a provider error on publish.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::oauth1::encode;
use super::{PublishAdapter, PublishJob, PublishOutcome};
use crate::config::ClientCredentials;
use crate::constants::{LINKEDIN_API_BASE, LINKEDIN_AUTH_BASE};
use crate::domain::Provider;
use crate::error::{IntegrationError, Result};
use crate::http::{HttpClient, HttpRequest, send_checked};
use crate::store::IntegrationStore;

const PROVIDER: Provider = Provider::Linkedin;

#[derive(Debug, Deserialize)]
pub struct LinkedinToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinkedinProfile {
    pub sub: String,
    pub name: String,
    pub email: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShareResponse {
    id: String,
}

pub struct LinkedinAdapter {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn IntegrationStore>,
    client: ClientCredentials,
    auth_base: String,
    api_base: String,
}

impl LinkedinAdapter {
    pub fn new(
        http: Arc<dyn HttpClient>,
        store: Arc<dyn IntegrationStore>,
        client: ClientCredentials,
    ) -> Self {
        Self {
            http,
            store,
            client,
            auth_base: LINKEDIN_AUTH_BASE.to_string(),
            api_base: LINKEDIN_API_BASE.to_string(),
        }
    }

    pub fn authorize_url(&self, redirect_uri: &str, state: &str, scopes: &[&str]) -> String {
        format!(
            "{}/oauth/v2/authorization?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}",
            self.auth_base,
            encode(&self.client.id),
            encode(redirect_uri),
            encode(state),
            encode(&scopes.join(" "))
        )
    }

    /// `redirect_uri` must match the one used to start the flow byte for byte
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<LinkedinToken> {
        let request = HttpRequest::post(format!("{}/oauth/v2/accessToken", self.auth_base)).form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client.id.as_str()),
            ("client_secret", self.client.secret.as_str()),
        ]);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        resp.json(PROVIDER)
    }

    pub async fn userinfo(&self, access_token: &str) -> Result<LinkedinProfile> {
        let request =
            HttpRequest::get(format!("{}/v2/userinfo", self.api_base)).bearer(access_token);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        resp.json(PROVIDER)
    }

    pub async fn single_post(&self, text: &str, integration_id: i64) -> Result<PublishOutcome> {
        let integration = self
            .store
            .get_integration(integration_id)
            .await?
            .filter(|i| i.provider == PROVIDER)
            .ok_or_else(|| {
                IntegrationError::Credential(format!("linkedin integration {} not found", integration_id))
            })?;

        let person = integration.provider_user_id.as_deref().ok_or_else(|| {
            IntegrationError::Credential(format!(
                "linkedin integration {} has no member id",
                integration_id
            ))
        })?;

        let body = json!({
            "author": format!("urn:li:person:{}", person),
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": text },
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
            }
        });

        let request = HttpRequest::post(format!("{}/v2/ugcPosts", self.api_base))
            .bearer(&integration.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(body);
        let resp = send_checked(self.http.as_ref(), PROVIDER, request).await?;
        let share: ShareResponse = resp.json(PROVIDER)?;

        info!(integration_id, share_id = %share.id, "posted linkedin share");

        Ok(PublishOutcome {
            link: format!("https://www.linkedin.com/feed/update/{}", share.id),
        })
    }
}

#[async_trait]
impl PublishAdapter for LinkedinAdapter {
    fn provider(&self) -> Provider {
        PROVIDER
    }

    async fn publish(&self, job: PublishJob<'_>) -> Result<Option<PublishOutcome>> {
        if !job.content.content_type.is_simple_post() {
            return Ok(None);
        }
        let Some(text) = job.content.first_text() else {
            return Ok(None);
        };
        self.single_post(text, job.integration_id).await.map(Some)
    }
}
