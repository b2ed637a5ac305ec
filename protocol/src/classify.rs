//! Classification of frames arriving from the voice manager.
//!
//! The service interleaves auxiliary data (acknowledgments, audio headers,
//! audio blocks) with actual replies on the same connection. Client receive
//! loops classify each text frame once and act on the tag instead of
//! scattering shape checks through control flow.

use serde_json::Value;

use crate::command::Command;

/// A reply to a `USER` turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub command: Command,
    pub text: String,
}

/// What one incoming text frame turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `LLM`, `SPEAK` or `WRONG` with a string payload.
    Reply(Reply),
    /// `{"ERROR": ...}` sent by the service.
    ServiceError(String),
    /// Valid JSON that is not a reply. Auxiliary, safe to discard.
    Ignorable,
    /// Not valid JSON.
    Malformed,
}

/// Classify one text frame.
#[must_use]
pub fn classify(payload: &str) -> Frame {
    let Ok(value) = serde_json::from_str::<Value>(payload) else {
        return Frame::Malformed;
    };

    if let Some(text) = value.get("ERROR").and_then(Value::as_str) {
        return Frame::ServiceError(text.to_string());
    }

    let command = value
        .get("command")
        .and_then(Value::as_str)
        .and_then(|name| Command::try_from(name).ok());

    match command {
        Some(command) if command.is_reply() => match value.get("message").and_then(Value::as_str) {
            Some(text) => Frame::Reply(Reply {
                command,
                text: text.to_string(),
            }),
            // a reply command without a string payload is noise
            None => Frame::Ignorable,
        },
        _ => Frame::Ignorable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_reply_commands() {
        for (name, command) in [
            ("LLM", Command::Llm),
            ("SPEAK", Command::Speak),
            ("WRONG", Command::Wrong),
        ] {
            let payload = format!(r#"{{"command":"{name}","message":"hi"}}"#);
            assert_eq!(
                classify(&payload),
                Frame::Reply(Reply {
                    command,
                    text: "hi".to_string(),
                })
            );
        }
    }

    #[test]
    fn recognizes_service_errors() {
        assert_eq!(
            classify(r#"{"ERROR":"First message must contain UID"}"#),
            Frame::ServiceError("First message must contain UID".to_string())
        );
    }

    #[test]
    fn audio_headers_are_ignorable() {
        let header = r#"{"AUDIO":{"format":"pcm16","sample_rate":16000}}"#;
        assert_eq!(classify(header), Frame::Ignorable);
    }

    #[test]
    fn non_reply_commands_are_ignorable() {
        assert_eq!(
            classify(r#"{"command":"USER","message":"echo"}"#),
            Frame::Ignorable
        );
        assert_eq!(
            classify(r#"{"command":"ACK","message":"ok"}"#),
            Frame::Ignorable
        );
    }

    #[test]
    fn reply_without_string_payload_is_ignorable() {
        assert_eq!(classify(r#"{"command":"LLM"}"#), Frame::Ignorable);
        assert_eq!(
            classify(r#"{"command":"LLM","message":[1,2]}"#),
            Frame::Ignorable
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert_eq!(classify("RIFF....WAVE"), Frame::Malformed);
        assert_eq!(classify(""), Frame::Malformed);
    }
}
