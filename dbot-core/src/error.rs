use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbotError {
    #[error("Client is not connected")]
    NotConnected,

    #[error("Channel {0} is pointing to another client")]
    ForeignChannel(String),

    #[error("User {0} is pointing to another client")]
    ForeignUser(String),

    #[error("Channel {channel} does not allow {capability} messages")]
    UnsendableChannel {
        channel: String,
        capability: &'static str,
    },

    #[error("No handler can send template {0}")]
    UnsupportedTemplate(String),

    #[error("User {0} has no DM channel")]
    NoDmChannel(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl DbotError {
    /// Wraps any displayable platform failure without interpreting it.
    pub fn platform(err: impl std::fmt::Display) -> Self {
        Self::Platform(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbotError>;
