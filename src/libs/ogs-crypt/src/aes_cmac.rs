//! AES-CMAC
//!
//! Thin wrapper around the `cmac` crate (RFC 4493).

use aes::Aes128;
use cmac::{Cmac, Mac};

use crate::{CryptError, CryptResult};

/// CMAC output size in bytes
pub const CMAC_SIZE: usize = 16;

/// Calculate AES-CMAC for a message
pub fn aes_cmac_calculate(key: &[u8], msg: &[u8]) -> CryptResult<[u8; CMAC_SIZE]> {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .map_err(|_| CryptError::InvalidKeyLength { expected: 16, actual: key.len() })?;
    mac.update(msg);
    let mut cmac = [0u8; CMAC_SIZE];
    cmac.copy_from_slice(&mac.finalize().into_bytes());
    Ok(cmac)
}
