//! NAS error types

use thiserror::Error;

/// NAS error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NasError {
    /// Buffer too short for decoding
    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    /// Invalid security header type
    #[error("Invalid security header type: {0}")]
    InvalidSecurityHeaderType(u8),

    /// Invalid mobile identity type
    #[error("Invalid mobile identity type: {0}")]
    InvalidMobileIdentityType(u8),

    /// A BCD digit string contained something other than 0-9
    #[error("Invalid BCD digit: {0:?}")]
    InvalidBcdDigit(char),

    /// Digit string too long or empty for the identity it encodes
    #[error("Invalid digit count: {0}")]
    InvalidDigitCount(usize),

    /// Not enough reserved headroom to prepend a header
    #[error("Headroom exhausted: need {needed} bytes, {available} available")]
    HeadroomExhausted { needed: usize, available: usize },

    /// IE value does not fit its length field
    #[error("IE {name} too long: {len} bytes")]
    IeTooLong { name: &'static str, len: usize },

    /// Message type this encoder never emits (uplink-only message)
    #[error("Encoding not supported for message type 0x{0:02x}")]
    UnsupportedEncode(u8),
}

/// NAS result type
pub type NasResult<T> = Result<T, NasError>;
