//! Error types for the panel agent.

use reqwest::StatusCode;

/// Why the gateway refused a heartbeat for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableReason {
    /// `503`: an operator switched the entry off.
    Disabled,
    /// `404`: no entry with this name exists on the gateway.
    NotRegistered,
}

impl std::fmt::Display for DisableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisableReason::Disabled => write!(f, "disabled on the gateway"),
            DisableReason::NotRegistered => write!(f, "not registered on the gateway"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Gateway login failed: {0}")]
    Auth(String),

    #[error("Gateway returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Gateway unreachable: {0}")]
    Network(String),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),

    #[error("'{name}' is {reason}")]
    Disabled { name: String, reason: DisableReason },

    #[error("Heartbeat is already running")]
    AlreadyRunning,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map a transport failure from reqwest.
    ///
    /// Status errors never reach this; callers check the status themselves.
    pub(crate) fn network(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Network(format!("request timed out: {}", err))
        } else {
            Error::Network(err.to_string())
        }
    }
}

impl From<panel_common::ParseHealthError> for Error {
    fn from(err: panel_common::ParseHealthError) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
