//! OAuth callback state machine
//!
//! awaiting_code -> exchanging_token -> fetching_profile -> persisting_integration
//! -> redirecting | redirecting_error
//!
//! The user only ever sees a redirect. Every failure branch is logged and emitted
//! as an `integration_failed` event carrying the stage it died in.

use tracing::{debug, error, info};

use crate::AppState;
use crate::constants::{LINKEDIN_CALLBACK_PATH, THREADS_CALLBACK_PATH, TWITTER_OAUTH2_CALLBACK_PATH};
use crate::domain::{Integration, NewIntegration, Provider};
use crate::error::{IntegrationError, Result};
use crate::events::{Event, EventBus};
use crate::providers::threads::ThreadsState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingCode,
    ExchangingToken,
    FetchingProfile,
    PersistingIntegration,
    Redirecting,
    RedirectingError,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AwaitingCode => "awaiting_code",
            Stage::ExchangingToken => "exchanging_token",
            Stage::FetchingProfile => "fetching_profile",
            Stage::PersistingIntegration => "persisting_integration",
            Stage::Redirecting => "redirecting",
            Stage::RedirectingError => "redirecting_error",
        }
    }
}

/// Tenant the callback belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub account_id: i64,
    pub slug: String,
}

impl Correlation {
    pub fn parse(account_id: Option<&str>, slug: Option<&str>) -> Result<Self> {
        let account_id = account_id
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| IntegrationError::Validation("missing or invalid account id".to_string()))?;
        let slug = slug
            .filter(|s| valid_slug(s))
            .ok_or_else(|| IntegrationError::Validation("missing or invalid slug".to_string()))?;
        Ok(Self {
            account_id,
            slug: slug.to_string(),
        })
    }
}

/// Slugs end up in a redirect path, so only URL-safe characters are accepted
pub fn valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 64
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn required(value: Option<&str>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IntegrationError::Validation(format!("missing {}", name)))
}

#[derive(Debug)]
pub struct CallbackOutcome {
    pub redirect: String,
    pub integration: Option<Integration>,
}

impl CallbackOutcome {
    pub fn is_connected(&self) -> bool {
        self.integration.is_some()
    }
}

pub struct CallbackFlow<'a> {
    provider: Provider,
    account_id: Option<i64>,
    stage: Stage,
    events: &'a EventBus,
}

impl<'a> CallbackFlow<'a> {
    pub fn start(provider: Provider, events: &'a EventBus) -> Self {
        Self {
            provider,
            account_id: None,
            stage: Stage::AwaitingCode,
            events,
        }
    }

    pub fn correlate(&mut self, account_id: i64) {
        self.account_id = Some(account_id);
    }

    pub fn enter(&mut self, stage: Stage) {
        debug!(provider = %self.provider, account_id = ?self.account_id, stage = stage.as_str(), "oauth callback");
        self.stage = stage;
    }

    /// Terminal step: turn the result into a redirect
    pub fn finish(
        mut self,
        result: Result<Integration>,
        success_url: String,
        fallback_url: String,
    ) -> CallbackOutcome {
        match result {
            Ok(integration) => {
                self.enter(Stage::Redirecting);
                info!(
                    provider = %self.provider,
                    account_id = integration.account_id,
                    integration_id = integration.id,
                    username = %integration.username,
                    "integration connected"
                );
                self.events.emit(Event::IntegrationConnected {
                    provider: self.provider,
                    account_id: integration.account_id,
                    integration_id: integration.id,
                });
                CallbackOutcome {
                    redirect: success_url,
                    integration: Some(integration),
                }
            }
            Err(e) => self.fail(&e, fallback_url),
        }
    }

    pub fn fail(mut self, err: &IntegrationError, fallback_url: String) -> CallbackOutcome {
        let failed_in = self.stage;
        self.stage = Stage::RedirectingError;
        error!(
            provider = %self.provider,
            account_id = ?self.account_id,
            stage = failed_in.as_str(),
            kind = err.kind(),
            error = %err,
            "oauth callback failed"
        );
        self.events.emit(Event::IntegrationFailed {
            provider: self.provider,
            stage: failed_in.as_str(),
            kind: err.kind(),
            account_id: self.account_id,
        });
        CallbackOutcome {
            redirect: fallback_url,
            integration: None,
        }
    }
}

// ============================================================================
// Twitter OAuth 1.0a
// ============================================================================

#[derive(Debug, Default)]
pub struct TwitterOAuth1Callback {
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    /// From cookies set when the flow started
    pub token_secret: Option<String>,
    pub account_id: Option<String>,
    pub slug: Option<String>,
}

pub async fn complete_twitter_oauth1(state: &AppState, params: TwitterOAuth1Callback) -> CallbackOutcome {
    let mut flow = CallbackFlow::start(Provider::Twitter, &state.events);
    let fallback = state.config.fallback_url();

    let parsed = Correlation::parse(params.account_id.as_deref(), params.slug.as_deref())
        .and_then(|c| {
            Ok((
                c,
                required(params.oauth_token.as_deref(), "oauth_token")?,
                required(params.oauth_verifier.as_deref(), "oauth_verifier")?,
                required(params.token_secret.as_deref(), "oauth token secret")?,
            ))
        });
    let (correlation, token, verifier, secret) = match parsed {
        Ok(v) => v,
        Err(e) => return flow.fail(&e, fallback),
    };
    flow.correlate(correlation.account_id);

    let result = connect_twitter_oauth1(state, &mut flow, &correlation, &token, &verifier, &secret).await;
    flow.finish(result, state.config.integrations_url(&correlation.slug), fallback)
}

async fn connect_twitter_oauth1(
    state: &AppState,
    flow: &mut CallbackFlow<'_>,
    correlation: &Correlation,
    oauth_token: &str,
    verifier: &str,
    token_secret: &str,
) -> Result<Integration> {
    flow.enter(Stage::ExchangingToken);
    let access = state.twitter.access_token(oauth_token, token_secret, verifier).await?;

    flow.enter(Stage::FetchingProfile);
    let account = state.twitter.verify_credentials(&access.token, &access.secret).await?;

    flow.enter(Stage::PersistingIntegration);
    state
        .integrations
        .upsert_integration(&NewIntegration {
            account_id: correlation.account_id,
            provider: Provider::Twitter,
            access_token: access.token,
            token_secret: Some(access.secret),
            refresh_token: None,
            expires_in: None,
            username: account.screen_name,
            avatar: account.profile_image_url_https,
            provider_user_id: Some(account.id_str),
        })
        .await
}

// ============================================================================
// Twitter OAuth2 + PKCE
// ============================================================================

#[derive(Debug, Default)]
pub struct TwitterOAuth2Callback {
    pub code: Option<String>,
    pub state: Option<String>,
    /// From cookies set when the flow started
    pub expected_state: Option<String>,
    pub code_verifier: Option<String>,
    pub account_id: Option<String>,
    pub slug: Option<String>,
}

pub async fn complete_twitter_oauth2(state: &AppState, params: TwitterOAuth2Callback) -> CallbackOutcome {
    let mut flow = CallbackFlow::start(Provider::Twitter, &state.events);
    let fallback = state.config.fallback_url();

    let parsed = Correlation::parse(params.account_id.as_deref(), params.slug.as_deref())
        .and_then(|c| {
            let returned = required(params.state.as_deref(), "state")?;
            let expected = required(params.expected_state.as_deref(), "expected state")?;
            if returned != expected {
                return Err(IntegrationError::Validation("oauth state mismatch".to_string()));
            }
            Ok((
                c,
                required(params.code.as_deref(), "code")?,
                required(params.code_verifier.as_deref(), "code verifier")?,
            ))
        });
    let (correlation, code, verifier) = match parsed {
        Ok(v) => v,
        Err(e) => return flow.fail(&e, fallback),
    };
    flow.correlate(correlation.account_id);

    let result = connect_twitter_oauth2(state, &mut flow, &correlation, &code, &verifier).await;
    flow.finish(result, state.config.integrations_url(&correlation.slug), fallback)
}

async fn connect_twitter_oauth2(
    state: &AppState,
    flow: &mut CallbackFlow<'_>,
    correlation: &Correlation,
    code: &str,
    verifier: &str,
) -> Result<Integration> {
    let redirect_uri = state.config.callback_url(TWITTER_OAUTH2_CALLBACK_PATH);

    flow.enter(Stage::ExchangingToken);
    let token = state.twitter.exchange_code(code, verifier, &redirect_uri).await?;

    flow.enter(Stage::FetchingProfile);
    let user = state.twitter.get_me(&token.access_token).await?;

    flow.enter(Stage::PersistingIntegration);
    state
        .integrations
        .upsert_integration(&NewIntegration {
            account_id: correlation.account_id,
            provider: Provider::Twitter,
            access_token: token.access_token,
            token_secret: None,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            username: user.username,
            avatar: user.profile_image_url,
            provider_user_id: Some(user.id),
        })
        .await
}

// ============================================================================
// LinkedIn
// ============================================================================

#[derive(Debug, Default)]
pub struct LinkedinCallback {
    pub code: Option<String>,
    pub account_id: Option<String>,
    pub slug: Option<String>,
}

/// Redirect URI for one tenant; the code exchange must repeat it exactly
pub fn linkedin_redirect_uri(state: &AppState, correlation: &Correlation) -> String {
    let base = state.config.callback_url(LINKEDIN_CALLBACK_PATH);
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("account_id", &correlation.account_id.to_string())
        .append_pair("slug", &correlation.slug)
        .finish();
    format!("{}?{}", base, query)
}

pub async fn complete_linkedin(state: &AppState, params: LinkedinCallback) -> CallbackOutcome {
    let mut flow = CallbackFlow::start(Provider::Linkedin, &state.events);
    let fallback = state.config.fallback_url();

    let parsed = Correlation::parse(params.account_id.as_deref(), params.slug.as_deref())
        .and_then(|c| Ok((c, required(params.code.as_deref(), "code")?)));
    let (correlation, code) = match parsed {
        Ok(v) => v,
        Err(e) => return flow.fail(&e, fallback),
    };
    flow.correlate(correlation.account_id);

    let result = connect_linkedin(state, &mut flow, &correlation, &code).await;
    flow.finish(result, state.config.integrations_url(&correlation.slug), fallback)
}

async fn connect_linkedin(
    state: &AppState,
    flow: &mut CallbackFlow<'_>,
    correlation: &Correlation,
    code: &str,
) -> Result<Integration> {
    let redirect_uri = linkedin_redirect_uri(state, correlation);

    flow.enter(Stage::ExchangingToken);
    let token = state.linkedin.exchange_code(code, &redirect_uri).await?;

    flow.enter(Stage::FetchingProfile);
    let profile = state.linkedin.userinfo(&token.access_token).await?;

    flow.enter(Stage::PersistingIntegration);
    state
        .integrations
        .upsert_integration(&NewIntegration {
            account_id: correlation.account_id,
            provider: Provider::Linkedin,
            access_token: token.access_token,
            token_secret: None,
            refresh_token: None,
            expires_in: token.expires_in,
            username: profile.name,
            avatar: profile.picture,
            provider_user_id: Some(profile.sub),
        })
        .await
}

// ============================================================================
// Threads
// ============================================================================

#[derive(Debug, Default)]
pub struct ThreadsCallback {
    pub code: Option<String>,
    /// JSON-encoded `ThreadsState`
    pub state: Option<String>,
}

pub async fn complete_threads(state: &AppState, params: ThreadsCallback) -> CallbackOutcome {
    let mut flow = CallbackFlow::start(Provider::Threads, &state.events);
    let fallback = state.config.fallback_url();

    let parsed = required(params.state.as_deref(), "state")
        .and_then(|raw| ThreadsState::parse(&raw))
        .and_then(|s| Correlation::parse(Some(&s.account_id.to_string()), Some(&s.slug)))
        .and_then(|c| Ok((c, required(params.code.as_deref(), "code")?)));
    let (correlation, code) = match parsed {
        Ok(v) => v,
        Err(e) => return flow.fail(&e, fallback),
    };
    flow.correlate(correlation.account_id);

    let result = connect_threads(state, &mut flow, &correlation, &code).await;
    flow.finish(result, state.config.integrations_url(&correlation.slug), fallback)
}

async fn connect_threads(
    state: &AppState,
    flow: &mut CallbackFlow<'_>,
    correlation: &Correlation,
    code: &str,
) -> Result<Integration> {
    let redirect_uri = state.config.callback_url(THREADS_CALLBACK_PATH);

    flow.enter(Stage::ExchangingToken);
    let short = state.threads.exchange_code(code, &redirect_uri).await?;
    let long = state.threads.exchange_long_lived(&short.access_token).await?;

    flow.enter(Stage::FetchingProfile);
    let profile = state.threads.profile(&long.access_token).await?;

    flow.enter(Stage::PersistingIntegration);
    state
        .integrations
        .upsert_integration(&NewIntegration {
            account_id: correlation.account_id,
            provider: Provider::Threads,
            access_token: long.access_token,
            token_secret: None,
            refresh_token: None,
            expires_in: long.expires_in,
            username: profile.username,
            avatar: profile.profile_picture_url,
            provider_user_id: Some(profile.id),
        })
        .await
}
