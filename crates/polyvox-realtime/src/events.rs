//! Provider control-channel event decoding.

use serde_json::Value;

/// Events the session surfaces to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// A partial transcript/translation fragment. Fragments accumulate;
    /// the provider does not resend earlier text.
    PartialText(String),
    /// Server-side VAD opened a speech segment.
    SpeechStarted,
    /// Server-side VAD closed the current speech segment.
    SpeechStopped,
}

/// Decodes one data-channel payload.
///
/// Unknown event types and malformed JSON yield `None`; the channel carries
/// plenty of traffic the application has no use for.
pub fn parse_event(raw: &str) -> Option<RealtimeEvent> {
    let value: Value = serde_json::from_str(raw).ok()?;
    match value.get("type")?.as_str()? {
        "response.delta" => {
            let delta = value.get("delta")?.as_str()?;
            Some(RealtimeEvent::PartialText(delta.to_string()))
        }
        "input_audio_buffer.speech_started" => Some(RealtimeEvent::SpeechStarted),
        "input_audio_buffer.speech_stopped" => Some(RealtimeEvent::SpeechStopped),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_partial_text_deltas() {
        let event = parse_event(r#"{"type":"response.delta","delta":"Hola "}"#);
        assert_eq!(event, Some(RealtimeEvent::PartialText("Hola ".to_string())));
    }

    #[test]
    fn decodes_speech_boundaries() {
        assert_eq!(
            parse_event(r#"{"type":"input_audio_buffer.speech_started"}"#),
            Some(RealtimeEvent::SpeechStarted)
        );
        assert_eq!(
            parse_event(r#"{"type":"input_audio_buffer.speech_stopped"}"#),
            Some(RealtimeEvent::SpeechStopped)
        );
    }

    #[test]
    fn ignores_unknown_and_malformed_payloads() {
        assert_eq!(parse_event(r#"{"type":"session.created"}"#), None);
        assert_eq!(parse_event(r#"{"type":"response.delta"}"#), None);
        assert_eq!(parse_event("not json"), None);
        assert_eq!(parse_event(r#"{"delta":"missing type"}"#), None);
    }
}
