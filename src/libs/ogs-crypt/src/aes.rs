//! AES-128 in CTR mode
//!
//! Block cipher from the `aes` crate; the 128-bit counter increment is
//! done here so 128-EEA2 can seed it with COUNT || BEARER || DIRECTION.

use aes::cipher::{BlockEncrypt, KeyInit, generic_array::GenericArray};
use aes::Aes128;

use crate::{CryptError, CryptResult};

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Increment a 128-bit counter (big-endian)
#[inline]
fn ctr128_inc(counter: &mut [u8; 16]) {
    let mut c: u16 = 1;
    for i in (0..16).rev() {
        c += counter[i] as u16;
        counter[i] = c as u8;
        c >>= 8;
        if c == 0 {
            break;
        }
    }
}

/// AES-CTR128 encryption/decryption
///
/// CTR is symmetric, so the same call decrypts. `ivec` is advanced past
/// the last block used.
pub fn aes_ctr128_encrypt(
    key: &[u8],
    ivec: &mut [u8; 16],
    input: &[u8],
    output: &mut [u8],
) -> CryptResult<()> {
    if key.len() < 16 {
        return Err(CryptError::InvalidKeyLength { expected: 16, actual: key.len() });
    }
    if output.len() < input.len() {
        return Err(CryptError::OutputBufferTooSmall);
    }

    let cipher = Aes128::new(GenericArray::from_slice(&key[..16]));

    for (inp, out) in input.chunks(AES_BLOCK_SIZE).zip(output.chunks_mut(AES_BLOCK_SIZE)) {
        // Encrypt counter to get keystream
        let mut keystream = GenericArray::clone_from_slice(&ivec[..]);
        cipher.encrypt_block(&mut keystream);
        ctr128_inc(ivec);

        for (i, b) in inp.iter().enumerate() {
            out[i] = b ^ keystream[i];
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIST SP 800-38A F.5.1 CTR-AES128.Encrypt
    const KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6,
        0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f, 0x3c,
    ];
    const INIT_COUNTER: [u8; 16] = [
        0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7,
        0xf8, 0xf9, 0xfa, 0xfb, 0xfc, 0xfd, 0xfe, 0xff,
    ];

    #[test]
    fn test_ctr_nist_block1() {
        let plaintext = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96,
            0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17, 0x2a,
        ];
        let expected = [
            0x87, 0x4d, 0x61, 0x91, 0xb6, 0x20, 0xe3, 0x26,
            0x1b, 0xef, 0x68, 0x64, 0x99, 0x0d, 0xb6, 0xce,
        ];
        let mut ivec = INIT_COUNTER;
        let mut out = [0u8; 16];
        aes_ctr128_encrypt(&KEY, &mut ivec, &plaintext, &mut out).unwrap();
        assert_eq!(out, expected);
        // counter wrapped from ...ff to ...ff00
        assert_eq!(ivec[15], 0x00);
        assert_eq!(ivec[14], 0xff);
    }

    #[test]
    fn test_ctr_round_trip_partial_block() {
        let data = b"attach accept with a tail of 37 bytes";
        let mut enc = vec![0u8; data.len()];
        let mut dec = vec![0u8; data.len()];

        let mut iv = INIT_COUNTER;
        aes_ctr128_encrypt(&KEY, &mut iv, data, &mut enc).unwrap();
        let mut iv = INIT_COUNTER;
        aes_ctr128_encrypt(&KEY, &mut iv, &enc, &mut dec).unwrap();

        assert_ne!(&enc[..], &data[..]);
        assert_eq!(&dec[..], &data[..]);
    }

    #[test]
    fn test_ctr_rejects_short_key_and_output() {
        let mut iv = [0u8; 16];
        assert_eq!(
            aes_ctr128_encrypt(&[0u8; 8], &mut iv, &[1], &mut [0u8; 1]),
            Err(CryptError::InvalidKeyLength { expected: 16, actual: 8 })
        );
        assert_eq!(
            aes_ctr128_encrypt(&KEY, &mut iv, &[1, 2], &mut [0u8; 1]),
            Err(CryptError::OutputBufferTooSmall)
        );
    }

    #[test]
    fn test_ctr128_inc_carries() {
        let mut c = [0u8; 16];
        c[15] = 0xff;
        c[14] = 0xff;
        ctr128_inc(&mut c);
        assert_eq!(&c[13..], &[0x01, 0x00, 0x00]);
    }
}
