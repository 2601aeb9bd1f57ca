//! Polyvox relay library logic.

pub mod api_session;
pub mod api_token;
pub mod api_ws;
pub mod config;
pub mod mirror;
pub mod registry;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use polyvox_token::TokenIssuer;

pub use config::{Config, ProviderConfig};
pub use mirror::MembershipMirror;
pub use registry::RoomRegistry;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative room membership for this process.
    pub registry: RoomRegistry,
    /// Token issuer; `None` until a signing secret is configured, which
    /// disables token issuance and socket admission.
    pub issuer: Option<Arc<TokenIssuer>>,
    /// Best-effort membership mirror; `None` when no Redis URL is set.
    pub mirror: Option<Arc<MembershipMirror>>,
    /// Outbound HTTP client for the provider proxy.
    pub http: reqwest::Client,
    /// Provider proxy settings.
    pub provider: ProviderConfig,
}

impl AppState {
    /// Builds state from loaded configuration.
    ///
    /// A missing signing secret or mirror URL degrades the corresponding
    /// feature rather than failing startup; both conditions are logged.
    pub fn from_config(config: &Config) -> Self {
        let issuer = match TokenIssuer::new(config.auth.signing_secret.as_bytes().to_vec()) {
            Ok(issuer) => Some(Arc::new(issuer)),
            Err(_) => {
                tracing::warn!(
                    "no signing secret configured; token issuance and websocket admission disabled"
                );
                None
            }
        };

        let mirror = config.mirror.redis_url.as_deref().and_then(|url| {
            match MembershipMirror::new(url, config.mirror.ttl_secs) {
                Ok(mirror) => Some(Arc::new(mirror)),
                Err(e) => {
                    tracing::warn!("invalid mirror redis url, mirror disabled: {}", e);
                    None
                }
            }
        });

        Self {
            registry: RoomRegistry::new(),
            issuer,
            mirror,
            http: reqwest::Client::new(),
            provider: config.provider.clone(),
        }
    }
}

/// Maximum request body size (64 KiB). Token and session requests are tiny;
/// anything larger is not a legitimate client.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/token", post(api_token::create_token_handler))
        .route(
            "/api/realtime/session",
            get(api_session::create_session_handler),
        )
        .route("/ws", get(api_ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
