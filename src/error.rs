//! Error types for the status endpoint.

use thiserror::Error;

/// Errors raised while building a method table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// Two entries claimed the same (interface, method) pair.
    #[error("method {interface}.{method} is already registered")]
    Duplicate { interface: String, method: String },
}

/// Errors that abort endpoint construction.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The host has no bus connection to lend.
    #[error("D-Bus not initialized")]
    BusUnavailable,

    /// Another object already owns this path on the connection.
    #[error("object path {0} is already registered")]
    PathInUse(String),

    #[error("invalid object path '{path}': {reason}")]
    InvalidObjectPath { path: String, reason: String },

    #[error("invalid interface name '{name}': {reason}")]
    InvalidInterface { name: String, reason: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Argument decoding failures. Always answered with an UnknownMethod error reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("expected signature \"{expected}\", got \"{actual}\"")]
    SignatureMismatch { expected: String, actual: String },

    #[error("malformed body with signature \"{signature}\": {reason}")]
    Malformed { signature: String, reason: String },
}

pub type Result<T> = std::result::Result<T, EndpointError>;
