//! Unified error handling for chatterd.
//!
//! Three error families cross module boundaries: handshake rejections (close
//! the connection with a reply line), handler errors (fail one command, keep
//! the connection), and backend errors from the directory/bus seams.

use crate::bus::BusError;
use crate::directory::DirectoryError;
use thiserror::Error;

/// Reasons a `LOGIN` exchange is rejected.
///
/// Every rejection closes the connection after its reply line; there is no
/// retry within the same connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeRejection {
    #[error("malformed login line")]
    MalformedLogin,

    #[error("unknown user or bad password")]
    InvalidCredentials,

    #[error("user already has an active session")]
    DuplicateSession,
}

impl HandshakeRejection {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MalformedLogin => "malformed_login",
            Self::InvalidCredentials => "invalid_credentials",
            Self::DuplicateSession => "duplicate_session",
        }
    }

    /// The reply line written to the client before the connection is closed.
    pub fn reply_line(&self) -> &'static str {
        match self {
            Self::MalformedLogin => "Invalid protocol",
            Self::InvalidCredentials => "Invalid credentials",
            Self::DuplicateSession => "User already logged in (Duplicate)",
        }
    }
}

/// Handshake failures: either a rejection (reply sent, connection closed) or
/// an unreachable directory (no reply, connection closed).
#[derive(Debug, Error)]
pub enum HandshakeFailure {
    #[error(transparent)]
    Rejected(#[from] HandshakeRejection),

    #[error("directory error during handshake: {0}")]
    Directory(#[from] DirectoryError),
}

/// Errors that can occur during command handling.
///
/// Backend failures are fatal to the affected command only; the shared
/// directory is always mutated before local state, so a failure here leaves
/// the local registry untouched.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Directory(_) => "directory_error",
            Self::Bus(_) => "bus_error",
        }
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;
