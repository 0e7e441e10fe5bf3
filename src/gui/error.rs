use crate::config::ConfigError;
use crate::error::SessionError;
use std::{error::Error, fmt::Display};

/// Everything that can stop the monitor.
#[derive(Debug)]
pub enum MonitorError {
    /// The terminal could not be driven.
    IOError(std::io::Error),
    /// Unusable settings.
    Config(ConfigError),
    /// The session refused to start.
    Session(SessionError),
}

impl Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::IOError(e) => write!(f, "terminal error: {}", e),
            MonitorError::Config(e) => write!(f, "{}", e),
            MonitorError::Session(e) => write!(f, "{}", e),
        }
    }
}

impl Error for MonitorError {}

impl From<std::io::Error> for MonitorError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<ConfigError> for MonitorError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<SessionError> for MonitorError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}
