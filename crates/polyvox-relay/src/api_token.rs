//! Token issuance endpoint.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use polyvox_token::{TokenError, TOKEN_TTL_SECS};

use crate::AppState;

/// Request body for `POST /api/token`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub peer_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `POST /api/token` — mints an ephemeral signaling token.
///
/// Returns `400 {"error": ...}` when `roomId` or `peerId` is absent and
/// `500` when the relay has no signing secret configured. The response
/// carries the token and its expiry so clients can remint before it lapses.
pub async fn create_token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<TokenRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(issuer) = &state.issuer else {
        tracing::error!("token requested but no signing secret is configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "signing secret is not configured" })),
        );
    };

    let room_id = req.room_id.as_deref().unwrap_or("");
    let peer_id = req.peer_id.as_deref().unwrap_or("");

    match issuer.mint(room_id, peer_id, req.name.as_deref()) {
        Ok(minted) => (
            StatusCode::OK,
            Json(json!({
                "token": minted.token,
                "exp": minted.exp,
                "ttlSecs": TOKEN_TTL_SECS,
            })),
        ),
        Err(err @ (TokenError::MissingRoomId | TokenError::MissingPeerId | TokenError::InvalidId)) => {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
        }
        Err(err) => {
            tracing::error!("token mint failed: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to mint token" })),
            )
        }
    }
}
