pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod events;
pub mod http;
pub mod logging;
pub mod providers;
pub mod routes;
pub mod services;
pub mod store;

use axum::Router;
use axum::http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use config::AppConfig;
use constants::EVENT_BUS_CAPACITY;
use events::EventBus;
use http::HttpClient;
use providers::PublisherRegistry;
use providers::linkedin::LinkedinAdapter;
use providers::oauth1::OAuth1Signer;
use providers::threads::ThreadsAdapter;
use providers::twitter::TwitterAdapter;
use services::publish::Publisher;
use store::{ContentStore, IntegrationStore};

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub integrations: Arc<dyn IntegrationStore>,
    pub contents: Arc<dyn ContentStore>,
    pub twitter: Arc<TwitterAdapter>,
    pub linkedin: Arc<LinkedinAdapter>,
    pub threads: ThreadsAdapter,
    pub publisher: Publisher,
    pub events: EventBus,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        integrations: Arc<dyn IntegrationStore>,
        contents: Arc<dyn ContentStore>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        let events = EventBus::new(EVENT_BUS_CAPACITY);

        let twitter = Arc::new(TwitterAdapter::new(
            http.clone(),
            integrations.clone(),
            OAuth1Signer::new(&config.twitter_consumer),
            config.twitter_oauth2.clone(),
        ));
        let linkedin = Arc::new(LinkedinAdapter::new(
            http.clone(),
            integrations.clone(),
            config.linkedin.clone(),
        ));
        let threads = ThreadsAdapter::new(http, config.threads.clone());

        let registry = PublisherRegistry::new()
            .register(twitter.clone())
            .register(linkedin.clone());
        let publisher = Publisher::new(contents.clone(), registry, events.clone());

        Self {
            config: Arc::new(config),
            integrations,
            contents,
            twitter,
            linkedin,
            threads,
            publisher,
            events,
        }
    }
}

/// Only the dashboard origin may call the API from a browser
fn cors(config: &AppConfig) -> CorsLayer {
    let origin = match config.app_url.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(e) => {
            warn!(app_url = %config.app_url, error = %e, "APP_URL is not a valid origin, cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Full application router with CORS and request tracing
pub fn app(state: Arc<AppState>) -> Router {
    routes::build_routes(state.config.rate_limit)
        .layer(cors(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
