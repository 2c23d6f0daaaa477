//! Error types for the TNS/TTC client core
//!
//! Every layer returns [`Result`]. The variants are grouped by the taxonomy the
//! session relies on: transport failures and protocol desyncs leave the
//! connection unusable, server-reported errors are recoverable by the caller,
//! and authentication failures end the logon attempt.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::constants::error_code;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the TNS/TTC core
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS setup or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection closed by the peer or by an end-of-file data packet
    #[error("connection closed")]
    ConnectionClosed,

    /// A network read or write did not finish before the configured deadline
    #[error("network operation timed out after {0:?}")]
    Timeout(Duration),

    /// Listener refused the connect request
    #[error("connection refused (error {error_code}): {message}")]
    ConnectionRefused { error_code: u32, message: String },

    /// Listener redirected the connect request
    #[error("connection redirected to: {address}")]
    ConnectionRedirect {
        address: String,
        reconnect_data: Option<String>,
    },

    /// Server answered a marker; the current call was abandoned and the
    /// connection has been reset
    #[error("connection reset by server marker")]
    ConnectionReset,

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// General protocol desync
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Packet type that has no meaning where a data reply is expected
    #[error("receive abnormal packet type {0} instead of data packet")]
    UnexpectedPacket(u8),

    /// TTC message code that has no meaning at this point
    #[error("TTC error: received code {code} during {context}")]
    UnexpectedMessage { code: u8, context: &'static str },

    /// Not enough bytes left in the input buffer
    #[error("buffer underflow: need {needed} bytes but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// Malformed length prefix
    #[error("invalid length indicator: {0}")]
    InvalidLengthIndicator(u8),

    /// Server protocol version outside the supported table
    #[error("unsupported server version: {0}")]
    UnsupportedServerVersion(u8),

    // =========================================================================
    // Server Errors
    // =========================================================================
    /// Error reported by the server in a call summary
    #[error("ORA-{code:05}: {message}")]
    OracleError { code: u32, message: String },

    // =========================================================================
    // Authentication Errors
    // =========================================================================
    /// Logon handshake failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Verifier type the key exchange does not implement
    #[error("unsupported verifier type: {0}")]
    UnsupportedVerifierType(u32),

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// Wire type code with no registered coder
    #[error("unknown wire type: {0}")]
    UnknownType(u16),

    /// Value could not be converted to or from its wire form
    #[error("data conversion error: {0}")]
    DataConversionError(String),

    // =========================================================================
    // LOB Errors
    // =========================================================================
    /// LOB operation attempted without a locator
    #[error("call lob operation on an empty locator")]
    EmptyLocator,

    /// Lookup in the process registry failed
    #[error("not registered: {0}")]
    NotRegistered(String),
}

impl Error {
    /// Create a new server error
    pub fn oracle(code: u32, message: impl Into<String>) -> Self {
        Error::OracleError {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for a protocol desync
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    /// Check if this is the end-of-fetch signal
    pub fn is_no_data_found(&self) -> bool {
        matches!(self, Error::OracleError { code, .. } if *code == error_code::NO_DATA_FOUND)
    }

    /// Check if the error leaves the connection unusable
    ///
    /// Transport failures, protocol desyncs and authentication failures are
    /// fatal. Server errors, codec errors and a completed marker reset are not.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Tls(_)
                | Error::ConnectionClosed
                | Error::Timeout(_)
                | Error::ConnectionRefused { .. }
                | Error::Protocol(_)
                | Error::UnexpectedPacket(_)
                | Error::UnexpectedMessage { .. }
                | Error::BufferUnderflow { .. }
                | Error::InvalidLengthIndicator(_)
                | Error::UnsupportedServerVersion(_)
                | Error::AuthenticationFailed(_)
                | Error::UnsupportedVerifierType(_)
        )
    }

    /// Check if this is a connection-related error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::ConnectionRefused { .. }
                | Error::ConnectionClosed
                | Error::Timeout(_)
                | Error::Io(_)
                | Error::Tls(_)
        )
    }
}
