//! Frame encoding and server-side request decoding.

use serde_json::{json, Value};

use crate::command::{Command, WireFormat};
use crate::error::ProtocolError;

/// A decoded client request, as seen by the voice manager side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register { user_id: String, format: WireFormat },
    UserPrompt(String),
}

// Encode functions

/// Encode a registration frame in the given wire format.
#[must_use]
pub fn encode_registration(user_id: &str, format: WireFormat) -> String {
    match format {
        WireFormat::Legacy => json!({ "UID": user_id }).to_string(),
        WireFormat::Current => encode_frame(Command::Uid, user_id),
    }
}

/// Encode one user turn.
#[must_use]
pub fn encode_user_prompt(text: &str) -> String {
    encode_frame(Command::User, text)
}

/// Encode a reply frame (`LLM`, `SPEAK` or `WRONG`).
#[must_use]
pub fn encode_reply(command: Command, text: &str) -> String {
    encode_frame(command, text)
}

/// Encode an `{"ERROR": ...}` frame.
#[must_use]
pub fn encode_error(text: &str) -> String {
    json!({ "ERROR": text }).to_string()
}

fn encode_frame(command: Command, message: &str) -> String {
    json!({ "command": command.as_wire(), "message": message }).to_string()
}

// Decode functions

/// Decode a client frame into a [`Request`].
///
/// Accepts both registration generations: the legacy `{"UID": ...}` shape and
/// the current `{"command": ..., "message": ...}` shape.
pub fn decode_request(payload: &str) -> Result<Request, ProtocolError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

    if let Some(uid) = value.get("UID") {
        let user_id = uid.as_str().ok_or(ProtocolError::EmptyUserId)?;
        if user_id.is_empty() {
            return Err(ProtocolError::EmptyUserId);
        }
        return Ok(Request::Register {
            user_id: user_id.to_string(),
            format: WireFormat::Legacy,
        });
    }

    let (Some(command), Some(message)) = (value.get("command"), value.get("message")) else {
        return Err(ProtocolError::UnexpectedShape);
    };
    let name = command.as_str().ok_or(ProtocolError::UnexpectedShape)?;
    let message = message.as_str().ok_or(ProtocolError::MissingMessage)?;

    match Command::try_from(name)? {
        Command::Uid => {
            if message.is_empty() {
                return Err(ProtocolError::EmptyUserId);
            }
            Ok(Request::Register {
                user_id: message.to_string(),
                format: WireFormat::Current,
            })
        }
        Command::User => Ok(Request::UserPrompt(message.to_string())),
        other => Err(ProtocolError::UnknownCommand(other.as_wire().to_string())),
    }
}
