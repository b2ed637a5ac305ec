use crate::error::ProtocolError;

macro_rules! commands {
    ($($name:ident = $wire:literal),* $(,)?) => {
        /// Commands carried in the `command` field of current-format frames.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Command { $($name,)* }

        impl Command {
            #[must_use]
            pub const fn as_wire(self) -> &'static str {
                match self { $(Self::$name => $wire,)* }
            }
        }

        impl TryFrom<&str> for Command {
            type Error = ProtocolError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                match value {
                    $($wire => Ok(Self::$name),)*
                    other => Err(ProtocolError::UnknownCommand(other.to_string())),
                }
            }
        }
    };
}

commands! {
    // client -> server
    Uid = "UID",
    User = "USER",

    // server -> client
    Llm = "LLM",
    Speak = "SPEAK",
    Wrong = "WRONG",
}

impl Command {
    /// Whether this command qualifies as a reply to a `USER` turn.
    #[must_use]
    pub const fn is_reply(self) -> bool {
        matches!(self, Self::Llm | Self::Speak | Self::Wrong)
    }
}

/// The two registration wire generations.
///
/// Resolved once per connection during the registration handshake and not
/// revisited afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WireFormat {
    /// `{"UID": "<id>"}`, registration only.
    Legacy,
    /// `{"command": "<NAME>", "message": "<payload>"}`.
    #[default]
    Current,
}
