//! # Error Types
//!
//! Error handling for the wire codec, the report framing and the device session.
//!
//! Every fallible operation in the crate returns [`Result`], and the device session
//! stops at the first error it sees and hands it back unchanged. Nothing is retried
//! internally.
//!
//! ## Error Categories
//! - **Transport Errors**: I/O failures, timeouts and closed channels on the USB link
//! - **Encoding Errors**: bad frame magic, malformed varints or length prefixes
//! - **Schema Errors**: missing required fields, integer overflow, wrong blob sizes,
//!   nesting too deep, wire types that don't match the requested value
//! - **Device Errors**: explicit failure responses and unsupported message ids
//! - **Local Errors**: entropy length, mnemonic validation and terminal input
//!
//! ## Example Usage
//! ```rust
//! use macer::error::{ProtocolError, Result, SchemaError};
//!
//! fn check_width(value: u64) -> Result<u32> {
//!     u32::try_from(value).map_err(|_| {
//!         SchemaError::SmallerInteger {
//!             value,
//!             max: u64::from(u32::MAX),
//!         }
//!         .into()
//!     })
//! }
//!
//! assert!(check_width(7).is_ok());
//! assert!(matches!(
//!     check_width(u64::MAX),
//!     Err(ProtocolError::Schema(SchemaError::SmallerInteger { .. }))
//! ));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Framing errors
    pub const ERR_INVALID_MAGIC: &str = "Invalid report magic";
    pub const ERR_INVALID_CONTINUATION: &str = "Invalid continuation report marker";

    /// Varint and length-prefix errors
    pub const ERR_VARINT_EOF: &str = "Reached end of stream inside varint";
    pub const ERR_VARINT_TOO_LONG: &str = "Varint exceeded expected size";
    pub const ERR_VARINT_ZERO_GROUP: &str = "Unnecessary 0 byte in varint";
    pub const ERR_SHORT_BYTES: &str = "Not enough bytes for length-delimited value";
    pub const ERR_SHORT_FIXED: &str = "Not enough bytes for fixed value";
    pub const ERR_UNKNOWN_WIRE_TYPE: &str = "Unrecognized wire type";
    pub const ERR_INVALID_UTF8: &str = "String field is not valid UTF-8";
    pub const ERR_INCOMPLETE_PARSE: &str = "Unconsumed bytes or open container after parse";

    /// Codec sequencing errors
    pub const ERR_VALUE_OUTSIDE_OBJECT: &str = "Value written outside of an object";
    pub const ERR_READ_OUTSIDE_OBJECT: &str = "Value read outside of an object";
    pub const ERR_UNBALANCED_END: &str = "Container closed without being opened";
    pub const ERR_INCOMPLETE_OUTPUT: &str = "Output taken from an incomplete stream";
    pub const ERR_REQUIRED_UNSET: &str = "Required field has no value";

    /// Device session errors
    pub const ERR_SESSION_FINISHED: &str = "Device session already completed";
    pub const ERR_SECRET_LENGTH: &str = "Secret cannot be truncated to the requested length";

    /// Unsupported codec features
    pub const ERR_SIGNED_VARINT: &str = "Signed integer varints";

    /// Local interaction errors
    pub const ERR_NOT_A_TERMINAL: &str = "Standard input is not an interactive terminal";
    pub const ERR_INPUT_CLOSED: &str = "No input available";
    pub const ERR_CONFIRM_MISMATCH: &str = "Confirmation does not match";
}

/// Schema violations found while mapping fields to or from the wire.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Integer {value} given when {max} is maximum permitted")]
    SmallerInteger { value: u64, max: u64 },

    #[error("Integer {value} given when {min} is minimum permitted")]
    LargerInteger { value: i64, min: i64 },

    #[error("Fixed binary of {expected} bytes expected, got {actual}")]
    FixedBinary { expected: usize, actual: usize },

    #[error("Maximum nesting depth of {0} exceeded")]
    MaximumDepth(usize),

    #[error("Expected {expected} wire value, found wire type {found}")]
    UnexpectedWireType { expected: &'static str, found: u8 },
}

// ProtocolError is the primary error type for all device and wire operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid byte encoding: {0}")]
    InvalidEncoding(&'static str),

    #[error("Unsupported device message: {0}")]
    UnsupportedMessage(u16),

    #[error("Device returned failure: {0}")]
    DeviceFailure(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Invalid entropy length: {0} bytes (expected 16, 24 or 32)")]
    EntropyLength(usize),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Message too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Unexpected message type")]
    UnexpectedMessage,

    #[error("Invalid codec state: {0}")]
    InvalidState(&'static str),

    #[error("Not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
