//! Error types for sitesync
//!
//! Two families live here. [`SitesyncError`] covers failures of the library
//! itself (configuration, dispatcher misuse, invalid input). [`SyncError`] is the
//! canonical, transport-independent error value carried by result actions and
//! change events; every transport fault is translated into it at the network
//! boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::ActionKind;

pub type Result<T> = std::result::Result<T, SitesyncError>;

#[derive(Error, Debug)]
pub enum SitesyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SitesyncError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SitesyncError::InvalidInput(_) => 3,
            SitesyncError::Sync(err) if err.kind == ErrorKind::AuthorizationError => 2,
            SitesyncError::Sync(_) => 1,
            SitesyncError::Config(_) => 1,
            SitesyncError::Dispatch(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Dispatcher misuse. These are programming errors, not runtime conditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("reentrant dispatch of {0} from inside a delivery round on the same thread")]
    Reentrant(ActionKind),

    #[error("dispatcher is shut down, dropped {0}")]
    ShutDown(ActionKind),
}

/// Canonical error taxonomy shared by every transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Connectivity failure, timeout, or any unclassified non-success result
    GenericError,
    /// The remote resource does not exist
    NotFound,
    /// The response body could not be decoded
    ParseError,
    /// Credentials were rejected or lack the required capability
    AuthorizationError,
    /// A domain object named in the request is unknown to the server
    /// (e.g. a plugin that does not exist)
    UnknownResource,
    /// The operation needs another step first (e.g. deactivate before delete)
    #[serde(rename = "OPERATION_REQUIRES_PRECONDITION")]
    RequiresPrecondition,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::GenericError => "GENERIC_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ParseError => "PARSE_ERROR",
            ErrorKind::AuthorizationError => "AUTHORIZATION_ERROR",
            ErrorKind::UnknownResource => "UNKNOWN_RESOURCE",
            ErrorKind::RequiresPrecondition => "OPERATION_REQUIRES_PRECONDITION",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value carried by result actions and change events
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SyncError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GenericError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthorizationError, message)
    }

    pub fn unknown_resource(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownResource, message)
    }

    pub fn requires_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequiresPrecondition, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}
