//! Error handling for FluidLink
//!
//! Provides error types for the two layers of the link engine:
//! - Link errors (transport/connection related)
//! - Protocol errors (engine/command related)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Link error type
///
/// Represents errors related to the WebSocket transport and the
/// connection lifecycle.
#[derive(Error, Debug, Clone)]
pub enum LinkError {
    /// Underlying network is not up, connect was not attempted
    #[error("Network is down, connect not attempted")]
    NetworkDown,

    /// Transport is not connected
    #[error("Transport not connected")]
    NotConnected,

    /// Connection establishment timed out
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Invalid hostname or port
    #[error("Invalid machine address: {address}")]
    InvalidAddress {
        /// The address that could not be used.
        address: String,
    },

    /// Generic link error
    #[error("Link error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Protocol error type
///
/// Represents errors raised by the protocol engine itself, as opposed to
/// the transport underneath it. Parse failures are deliberately absent:
/// malformed report lines are absorbed, never surfaced as errors.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// Command issued while disconnected
    #[error("Command rejected, machine not connected: {command}")]
    CommandWhileDisconnected {
        /// The command that was rejected.
        command: String,
    },

    /// Generic protocol error
    #[error("Protocol error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Main error type for FluidLink
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Link/transport error
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Protocol engine error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Link(LinkError::ConnectionTimeout { .. }))
    }

    /// Check if this is a link/transport error
    pub fn is_link_error(&self) -> bool {
        matches!(self, Error::Link(_))
    }

    /// Check if this is a protocol error
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
