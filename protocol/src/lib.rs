pub mod classify;
pub mod command;
pub mod error;
pub mod frames;

pub use classify::{classify, Frame, Reply};
pub use command::{Command, WireFormat};
pub use error::ProtocolError;

// Re-export encode/decode functions for convenience
pub use frames::{
    decode_request, encode_error, encode_registration, encode_reply, encode_user_prompt, Request,
};
