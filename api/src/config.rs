use std::env;

use anyhow::{Context, Result};
use url::Url;

use crate::logging::LogFormat;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// OAuth client credentials for one provider app
#[derive(Clone, Debug)]
pub struct ClientCredentials {
    pub id: String,
    pub secret: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    /// Public origin of the dashboard; every redirect lands here
    pub app_url: String,
    /// Public origin of this service; callback URLs are built from it
    pub api_url: String,
    pub twitter_consumer: ClientCredentials,
    pub twitter_oauth2: ClientCredentials,
    pub linkedin: ClientCredentials,
    pub threads: ClientCredentials,
    pub log_format: LogFormat,
    pub secure_cookies: bool,
    pub rate_limit: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;
        let app_url = origin("APP_URL")?;
        let api_url = origin("API_URL")?;
        let log_format = env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .parse()
            .map_err(anyhow::Error::msg)
            .context("LOG_FORMAT must be text or json")?;
        let secure_cookies = env::var("ENV").as_deref() == Ok("prod");
        let rate_limit = env::var("RATE_LIMIT")
            .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            database_max_connections,
            port,
            app_url,
            api_url,
            twitter_consumer: credentials("TWITTER_CONSUMER_KEY", "TWITTER_CONSUMER_SECRET")?,
            twitter_oauth2: credentials("TWITTER_CLIENT_ID", "TWITTER_CLIENT_SECRET")?,
            linkedin: credentials("LINKEDIN_CLIENT_ID", "LINKEDIN_CLIENT_SECRET")?,
            threads: credentials("THREADS_APP_ID", "THREADS_APP_SECRET")?,
            log_format,
            secure_cookies,
            rate_limit,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        match Url::parse(&self.database_url) {
            Ok(mut parsed) => {
                let _ = parsed.set_password(Some("*****"));
                parsed.to_string()
            }
            Err(_) => "<invalid database url>".to_string(),
        }
    }

    /// Dashboard path a failed OAuth callback lands on
    pub fn fallback_url(&self) -> String {
        format!("{}/dashboard", self.app_url)
    }

    /// Integration page of one tenant
    pub fn integrations_url(&self, slug: &str) -> String {
        format!("{}/{}/integrations", self.app_url, slug)
    }

    pub fn callback_url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }
}

fn origin(key: &str) -> Result<String> {
    let raw = env::var(key).unwrap_or_else(|_| "http://localhost:3000".to_string());
    Url::parse(&raw).with_context(|| format!("{key} must be an absolute URL"))?;
    Ok(raw.trim_end_matches('/').to_string())
}

fn credentials(id_key: &str, secret_key: &str) -> Result<ClientCredentials> {
    Ok(ClientCredentials {
        id: env::var(id_key).with_context(|| format!("{id_key} must be set"))?,
        secret: env::var(secret_key).with_context(|| format!("{secret_key} must be set"))?,
    })
}
