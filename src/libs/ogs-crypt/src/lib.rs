//! NextGCore Cryptographic Library
//!
//! EPS security primitives used by the MME NAS layer:
//! TS 33.401 key derivation and the AES based 128-EEA2 / 128-EIA2
//! algorithms (plus the null EEA0 / EIA0).

pub mod aes;        // AES-128 CTR
pub mod aes_cmac;   // AES-CMAC (RFC 4493)
pub mod kdf;        // Key Derivation Functions (TS 33.401 Annex A)
pub mod eps;        // NAS algorithm dispatch (EEA/EIA)

use thiserror::Error;

/// Crypto error type
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptError {
    /// Key shorter than the algorithm requires
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Output buffer too small
    #[error("Output buffer too small")]
    OutputBufferTooSmall,

    /// Integrity algorithm not implemented here
    #[error("Unsupported integrity algorithm: EIA{0}")]
    UnsupportedIntegrityAlgorithm(u8),

    /// Ciphering algorithm not implemented here
    #[error("Unsupported ciphering algorithm: EEA{0}")]
    UnsupportedCipheringAlgorithm(u8),
}

/// Crypto result type
pub type CryptResult<T> = Result<T, CryptError>;
