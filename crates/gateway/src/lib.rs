//! HTTP gateway for docforge bots.
//!
//! Accepts session actions over HTTP, acknowledges each one immediately
//! with an empty `thought`, runs it in the background and reports progress
//! to the caller's `response_url`.
//!
//! Built on Axum.

pub mod api;
pub mod notifier;

use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, response::Json, routing::get};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use docforge_config::AppConfig;
use docforge_core::event::EventBus;
use docforge_engine::{BotEngine, ModelClient, SessionRegistry, variants};
use docforge_providers::KustoSchemaSource;
use notifier::WebhookNotifier;

/// Shared application state for the gateway.
pub struct GatewayState {
    /// One engine per bot, keyed by bot name.
    pub engines: HashMap<String, Arc<BotEngine>>,
    pub sessions: SessionRegistry,
    pub notifier: WebhookNotifier,
    /// Every progress event, for in-process subscribers.
    pub events: Arc<EventBus>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(engines: impl IntoIterator<Item = BotEngine>, max_sessions: usize) -> Self {
        Self {
            engines: engines
                .into_iter()
                .map(|e| (e.variant().name.clone(), Arc::new(e)))
                .collect(),
            sessions: SessionRegistry::new(max_sessions),
            notifier: WebhookNotifier::new(),
            events: Arc::new(EventBus::default()),
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(api::api_router())
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Build one engine per built-in bot from configuration.
pub fn build_engines(config: &AppConfig) -> Result<Vec<BotEngine>, Box<dyn std::error::Error>> {
    let router = docforge_providers::router::build_from_config(config);
    let provider = router
        .default()
        .ok_or("No default provider configured: set an API key")?;
    let model = ModelClient::from_config(provider, config);

    Ok(variants::BUILTIN
        .iter()
        .filter_map(|name| variants::by_name(name))
        .map(|variant| {
            let has_refresh = variant.refresh.is_some();
            let engine = BotEngine::new(variant, model.clone())
                .with_ingest_settings((&config.ingest).into());
            if has_refresh {
                engine.with_data_source(Arc::new(KustoSchemaSource::new()))
            } else {
                engine
            }
        })
        .collect())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let engines = build_engines(&config)?;
    let state = Arc::new(GatewayState::new(engines, config.gateway.max_sessions));
    let app = build_router(state);

    info!(addr = %addr, provider = %config.default_provider, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Health ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub bots: Vec<String>,
    pub sessions: usize,
    pub uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let mut bots: Vec<String> = state.engines.keys().cloned().collect();
    bots.sort();

    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        bots,
        sessions: state.sessions.len().await,
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}
