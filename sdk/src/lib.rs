pub mod config;
pub mod error;
pub mod session;
pub mod transport;

pub use config::{SessionConfig, Tuning};
pub use error::SessionError;
pub use session::Session;
pub use transport::{Incoming, Transport};
