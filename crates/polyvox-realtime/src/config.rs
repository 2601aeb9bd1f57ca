use serde::{Deserialize, Serialize};

/// Provider model requested when the config does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// Synthesis voice requested when the config does not name one.
pub const DEFAULT_VOICE: &str = "verse";

/// Label of the control data channel the provider listens on.
pub const EVENTS_CHANNEL_LABEL: &str = "oai-events";

/// Server-side turn detection tuning sent in `session.update`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnDetection {
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Everything a realtime session needs to connect.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Credential proxy URL. The provider API key never reaches the client;
    /// this endpoint mints a short-lived client secret on its behalf.
    pub credential_url: String,
    /// Provider SDP exchange endpoint.
    pub sdp_url: String,
    pub model: String,
    pub voice: String,
    /// Session instructions, typically the translation prompt.
    pub instructions: String,
    pub turn_detection: TurnDetection,
}

impl RealtimeConfig {
    pub fn new(credential_url: impl Into<String>) -> Self {
        Self {
            credential_url: credential_url.into(),
            sdp_url: "https://api.openai.com/v1/realtime".to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            instructions: String::new(),
            turn_detection: TurnDetection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_detection_defaults_match_server_vad_tuning() {
        let td = TurnDetection::default();
        assert_eq!(td.threshold, 0.5);
        assert_eq!(td.prefix_padding_ms, 300);
        assert_eq!(td.silence_duration_ms, 500);
    }

    #[test]
    fn config_defaults_to_provider_endpoint_and_model() {
        let config = RealtimeConfig::new("http://localhost:3000/api/realtime/session");
        assert_eq!(config.sdp_url, "https://api.openai.com/v1/realtime");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.voice, DEFAULT_VOICE);
    }
}
