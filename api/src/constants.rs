//! Application constants

/// Twitter REST API (v1.1 OAuth1 endpoints live here too)
pub const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Twitter v2 API (tweets, OAuth2 token endpoint)
pub const X_API_BASE: &str = "https://api.x.com";

/// Twitter OAuth2 authorize page
pub const X_AUTHORIZE_URL: &str = "https://x.com/i/oauth2/authorize";

/// Public tweet permalink host
pub const X_WEB_BASE: &str = "https://x.com";

pub const LINKEDIN_AUTH_BASE: &str = "https://www.linkedin.com";

pub const LINKEDIN_API_BASE: &str = "https://api.linkedin.com";

pub const THREADS_AUTH_BASE: &str = "https://threads.net";

pub const THREADS_GRAPH_BASE: &str = "https://graph.threads.net";

/// Scopes requested by the Twitter OAuth2 connect flow
pub const TWITTER_OAUTH2_SCOPES: &[&str] =
    &["tweet.read", "tweet.write", "users.read", "offline.access"];

pub const LINKEDIN_SCOPES: &[&str] = &["openid", "profile", "email", "w_member_social"];

pub const THREADS_SCOPES: &[&str] = &["threads_basic", "threads_content_publish"];

/// Callback paths, appended to the public API origin
pub const TWITTER_CALLBACK_PATH: &str = "/integrations/twitter/callback";
pub const TWITTER_OAUTH2_CALLBACK_PATH: &str = "/integrations/twitter/oauth2/callback";
pub const LINKEDIN_CALLBACK_PATH: &str = "/integrations/linkedin/callback";
pub const THREADS_CALLBACK_PATH: &str = "/integrations/threads/callback";

/// Temporary OAuth cookies live for 10 minutes
pub const OAUTH_COOKIE_MAX_AGE_SECS: u32 = 600;

/// Capacity of the in-process event channel
pub const EVENT_BUS_CAPACITY: usize = 100;
