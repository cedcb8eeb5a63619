//! EPS NAS integrity and ciphering (TS 33.401 Annex B)
//!
//! Algorithm identities follow TS 33.401 5.1.3/5.1.4: 0 is the null
//! algorithm, 2 is the AES based one. SNOW 3G (1) and ZUC (3) are not
//! provided and report an error.

use crate::aes::aes_ctr128_encrypt;
use crate::aes_cmac::aes_cmac_calculate;
use crate::{CryptError, CryptResult};

/// 128-EEA0 / 128-EIA0
pub const NAS_SECURITY_ALGORITHM_NULL: u8 = 0;
/// 128-EEA2 / 128-EIA2
pub const NAS_SECURITY_ALGORITHM_AES: u8 = 2;

/// MAC-I / NAS-MAC length
pub const NAS_SECURITY_MAC_SIZE: usize = 4;

/// True when [`nas_mac_calculate`] implements `algorithm`
pub fn integrity_algorithm_supported(algorithm: u8) -> bool {
    matches!(algorithm, NAS_SECURITY_ALGORITHM_NULL | NAS_SECURITY_ALGORITHM_AES)
}

/// True when [`nas_encrypt`] implements `algorithm`
pub fn ciphering_algorithm_supported(algorithm: u8) -> bool {
    matches!(algorithm, NAS_SECURITY_ALGORITHM_NULL | NAS_SECURITY_ALGORITHM_AES)
}

fn bearer_direction(bearer: u8, direction: u8) -> u8 {
    ((bearer & 0x1f) << 3) | ((direction & 0x01) << 2)
}

/// Compute the 32-bit NAS-MAC over `message`.
///
/// EIA0 yields all zeros.
pub fn nas_mac_calculate(
    algorithm: u8,
    knas_int: &[u8],
    count: u32,
    bearer: u8,
    direction: u8,
    message: &[u8],
) -> CryptResult<[u8; NAS_SECURITY_MAC_SIZE]> {
    match algorithm {
        NAS_SECURITY_ALGORITHM_NULL => Ok([0u8; NAS_SECURITY_MAC_SIZE]),
        NAS_SECURITY_ALGORITHM_AES => {
            // COUNT || BEARER | DIRECTION || 26 zero bits || MESSAGE
            let mut input = Vec::with_capacity(8 + message.len());
            input.extend_from_slice(&count.to_be_bytes());
            input.push(bearer_direction(bearer, direction));
            input.extend_from_slice(&[0u8; 3]);
            input.extend_from_slice(message);

            let cmac = aes_cmac_calculate(knas_int, &input)?;
            let mut mac = [0u8; NAS_SECURITY_MAC_SIZE];
            mac.copy_from_slice(&cmac[..NAS_SECURITY_MAC_SIZE]);
            Ok(mac)
        }
        other => Err(CryptError::UnsupportedIntegrityAlgorithm(other)),
    }
}

/// Cipher `message` in place. Deciphering is the same call.
///
/// EEA0 leaves the message untouched.
pub fn nas_encrypt(
    algorithm: u8,
    knas_enc: &[u8],
    count: u32,
    bearer: u8,
    direction: u8,
    message: &mut [u8],
) -> CryptResult<()> {
    match algorithm {
        NAS_SECURITY_ALGORITHM_NULL => Ok(()),
        NAS_SECURITY_ALGORITHM_AES => {
            // IV: COUNT || BEARER | DIRECTION || 0...0
            let mut iv = [0u8; 16];
            iv[..4].copy_from_slice(&count.to_be_bytes());
            iv[4] = bearer_direction(bearer, direction);

            let mut output = vec![0u8; message.len()];
            aes_ctr128_encrypt(knas_enc, &mut iv, message, &mut output)?;
            message.copy_from_slice(&output);
            Ok(())
        }
        other => Err(CryptError::UnsupportedCipheringAlgorithm(other)),
    }
}
