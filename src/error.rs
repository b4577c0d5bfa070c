//! # Error Types
//!
//! Error handling for the session engine.
//!
//! This module defines every error variant that can surface from a session,
//! a server or the codec boundary, from low-level I/O failures up to
//! registry lookups for commands nobody registered.
//!
//! ## Error Categories
//! - **Transport**: socket and TLS failures, surfaced verbatim as session error events
//! - **Decode**: malformed bytes on an established connection; extraction halts
//! - **Encode**: field values that do not fit their parameter kind
//! - **Write-not-possible**: `send` refused because the transport is not writable
//! - **Registry**: unknown command or field names (programming errors, fail fast)
//!
//! An unmatched response is deliberately *not* an error and has no variant here.
//!
//! ## Example Usage
//! ```rust
//! use smpp_session::error::{ProtocolError, Result};
//! use smpp_session::protocol::registry::Registry;
//!
//! fn lookup(registry: &Registry, name: &str) -> Result<u32> {
//!     registry
//!         .command(name)
//!         .map(|descriptor| descriptor.id)
//!         .ok_or_else(|| ProtocolError::UnknownCommand(name.to_string()))
//! }
//!
//! let registry = Registry::smpp();
//! assert_eq!(lookup(&registry, "enquire_link").unwrap(), 0x0000_0015);
//! assert!(lookup(&registry, "no_such_command").is_err());
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry errors
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on registry";

    /// Dispatcher errors
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";

    /// Decode errors
    pub const ERR_TRUNCATED_PARAM: &str = "Optional parameter runs past the end of the PDU";
}

// ProtocolError is the primary error type for all session operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),

    #[error("Invalid PDU header: command_length {0}")]
    InvalidHeader(u32),

    #[error("PDU too large: {0} bytes")]
    OversizedPdu(usize),

    #[error("Unknown command id: {0:#010x}")]
    UnknownCommandId(u32),

    #[error("Malformed optional parameter {tag:#06x}: {reason}")]
    MalformedParam { tag: u16, reason: String },

    #[error("Field `{field}` does not fit its parameter type: {reason}")]
    FieldType { field: String, reason: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unknown field `{field}` for command `{command}`")]
    UnknownField { command: String, field: String },

    #[error("Transport is not writable")]
    NotWritable,

    #[error("Request {0} abandoned: session closed before a response arrived")]
    RequestAbandoned(u32),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether this error means the inbound byte stream can no longer be trusted.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidHeader(_)
                | ProtocolError::OversizedPdu(_)
                | ProtocolError::UnknownCommandId(_)
                | ProtocolError::MalformedParam { .. }
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_classification() {
        assert!(ProtocolError::InvalidHeader(3).is_decode_error());
        assert!(ProtocolError::UnknownCommandId(0x1234).is_decode_error());
        assert!(!ProtocolError::NotWritable.is_decode_error());
        assert!(!ProtocolError::RequestAbandoned(1).is_decode_error());
    }

    #[test]
    fn test_display_formats_command_id_as_hex() {
        let err = ProtocolError::UnknownCommandId(0x8000_0004);
        assert_eq!(err.to_string(), "Unknown command id: 0x80000004");
    }
}
