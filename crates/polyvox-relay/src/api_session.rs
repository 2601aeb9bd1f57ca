//! Realtime provider credential proxy.
//!
//! The provider API key lives only on the relay. Clients ask this endpoint
//! for a short-lived client secret, then talk to the provider directly;
//! the key itself never crosses to the browser.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

/// `GET /api/realtime/session` — mints an ephemeral provider credential.
///
/// Proxies a session-create call to the provider and flattens the response
/// to `{client_secret, expires_at, model}`. Provider error statuses pass
/// through so clients can distinguish quota problems from relay problems.
pub async fn create_session_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> (StatusCode, Json<Value>) {
    let provider = &state.provider;
    if provider.api_key.is_empty() {
        tracing::error!("realtime session requested but no provider API key is configured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "realtime provider is not configured" })),
        );
    }

    let url = format!("{}/v1/realtime/sessions", provider.base_url);
    let body = json!({
        "model": provider.model,
        "voice": provider.voice,
        "input_audio_format": "pcm16",
        "input_audio_transcription": { "model": "whisper-1" },
        "turn_detection": {
            "type": "server_vad",
            "threshold": 0.5,
            "prefix_padding_ms": 300,
            "silence_duration_ms": 500,
        },
    });

    let resp = match state
        .http
        .post(&url)
        .bearer_auth(&provider.api_key)
        .json(&body)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(err) => {
            tracing::error!("provider session request failed: {}", err);
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "provider request failed" })),
            );
        }
    };

    let status = resp.status();
    if !status.is_success() {
        tracing::warn!(status = %status, "provider rejected session create");
        let code = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        return (
            code,
            Json(json!({ "error": format!("provider returned status {}", status.as_u16()) })),
        );
    }

    let payload: Value = match resp.json().await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!("provider session response was not JSON: {}", err);
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "provider response was not JSON" })),
            );
        }
    };

    // Flatten: clients get the secret value, its expiry, and the model,
    // nothing else from the upstream shape.
    let Some(secret) = payload
        .pointer("/client_secret/value")
        .and_then(Value::as_str)
    else {
        tracing::error!("provider session response missing client_secret.value");
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": "provider response missing client secret" })),
        );
    };
    let expires_at = payload
        .pointer("/client_secret/expires_at")
        .and_then(Value::as_u64)
        .unwrap_or_default();

    (
        StatusCode::OK,
        Json(json!({
            "client_secret": secret,
            "expires_at": expires_at,
            "model": provider.model,
        })),
    )
}
