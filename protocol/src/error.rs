use std::fmt;

/// Protocol decoding errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidJson(String),
    UnexpectedShape,
    UnknownCommand(String),
    MissingMessage,
    EmptyUserId,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidJson(detail) => {
                write!(f, "invalid JSON: {}", detail)
            }
            ProtocolError::UnexpectedShape => {
                write!(f, "frame is neither a registration nor a command")
            }
            ProtocolError::UnknownCommand(name) => {
                write!(f, "unknown command: {}", name)
            }
            ProtocolError::MissingMessage => {
                write!(f, "command frame is missing a string message field")
            }
            ProtocolError::EmptyUserId => {
                write!(f, "UID must be a non-empty string")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
