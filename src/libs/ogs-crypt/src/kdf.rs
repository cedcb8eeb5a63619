//! Key Derivation Functions
//!
//! EPS key hierarchy from 3GPP TS 33.401 Annex A, built on the generic
//! KDF of TS 33.220 clause B.2.0:
//!
//! ```text
//! KASME --(FC 0x15, alg type, alg id)--> KNASenc / KNASint
//!       --(FC 0x11, uplink NAS COUNT)---> KeNB
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

pub const OGS_KEY_LEN: usize = 16;
pub const OGS_SHA256_DIGEST_SIZE: usize = 32;
pub const OGS_SQN_XOR_AK_LEN: usize = 6;
pub const OGS_PLMN_ID_LEN: usize = 3;

// FC (Function Code) values for KDF
const FC_FOR_KASME: u8 = 0x10;
const FC_FOR_KENB_DERIVATION: u8 = 0x11;
const FC_FOR_EPS_ALGORITHM_KEY_DERIVATION: u8 = 0x15;

// Algorithm Type Distinguishers
pub const OGS_KDF_NAS_ENC_ALG: u8 = 0x01;
pub const OGS_KDF_NAS_INT_ALG: u8 = 0x02;

type HmacSha256 = Hmac<Sha256>;

/// Common KDF: HMAC-SHA-256(key, FC || P0 || L0 || P1 || L1 ...)
fn ogs_kdf_common(key: &[u8], fc: u8, params: &[&[u8]]) -> [u8; OGS_SHA256_DIGEST_SIZE] {
    let total_len = 1 + params.iter().map(|p| p.len() + 2).sum::<usize>();

    let mut s = Vec::with_capacity(total_len);
    s.push(fc);
    for param in params.iter().filter(|p| !p.is_empty()) {
        s.extend_from_slice(param);
        s.extend_from_slice(&(param.len() as u16).to_be_bytes());
    }

    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(&s);

    let mut output = [0u8; OGS_SHA256_DIGEST_SIZE];
    output.copy_from_slice(&mac.finalize().into_bytes());
    output
}

/// TS33.401 Annex A.2: KASME derivation function
///
/// Run by the home subscriber side; the MME receives the result inside the
/// authentication vector.
pub fn ogs_kdf_kasme(
    ck: &[u8; OGS_KEY_LEN],
    ik: &[u8; OGS_KEY_LEN],
    plmn_id: &[u8; OGS_PLMN_ID_LEN],
    sqn_xor_ak: &[u8; OGS_SQN_XOR_AK_LEN],
) -> [u8; OGS_SHA256_DIGEST_SIZE] {
    // Key = CK || IK
    let mut key = Zeroizing::new([0u8; OGS_KEY_LEN * 2]);
    key[..OGS_KEY_LEN].copy_from_slice(ck);
    key[OGS_KEY_LEN..].copy_from_slice(ik);

    ogs_kdf_common(&key[..], FC_FOR_KASME, &[&plmn_id[..], &sqn_xor_ak[..]])
}

/// TS33.401 Annex A.3: KeNB derivation function
pub fn ogs_kdf_kenb(
    kasme: &[u8; OGS_SHA256_DIGEST_SIZE],
    ul_count: u32,
) -> [u8; OGS_SHA256_DIGEST_SIZE] {
    ogs_kdf_common(kasme, FC_FOR_KENB_DERIVATION, &[&ul_count.to_be_bytes()[..]])
}

/// TS33.401 Annex A.7: Algorithm key derivation functions
///
/// Returns the lower 16 bytes of the 32-byte output.
pub fn ogs_kdf_nas_eps(
    algorithm_type_distinguishers: u8,
    algorithm_identity: u8,
    kasme: &[u8; OGS_SHA256_DIGEST_SIZE],
) -> [u8; OGS_KEY_LEN] {
    let output = Zeroizing::new(ogs_kdf_common(
        kasme,
        FC_FOR_EPS_ALGORITHM_KEY_DERIVATION,
        &[&[algorithm_type_distinguishers][..], &[algorithm_identity][..]],
    ));

    let mut knas = [0u8; OGS_KEY_LEN];
    knas.copy_from_slice(&output[16..]);
    knas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_hmac(key: &[u8], s: &[u8]) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(s);
        let mut out = [0u8; 32];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    #[test]
    fn test_kdf_nas_eps_s_string() {
        let kasme = [0x5a; 32];
        let full = reference_hmac(&kasme, &[0x15, 0x02, 0x00, 0x01, 0x02, 0x00, 0x01]);
        assert_eq!(ogs_kdf_nas_eps(OGS_KDF_NAS_INT_ALG, 2, &kasme), full[16..]);
    }

    #[test]
    fn test_kdf_kenb_s_string() {
        let kasme = [0x33; 32];
        let full = reference_hmac(&kasme, &[0x11, 0x00, 0x00, 0x01, 0x02, 0x00, 0x04]);
        assert_eq!(ogs_kdf_kenb(&kasme, 0x0102), full);
    }

    #[test]
    fn test_kdf_kasme_s_string() {
        let ck = [0x01; 16];
        let ik = [0x02; 16];
        let plmn = [0x00, 0xf1, 0x10];
        let sqn_xor_ak = [0xaa; 6];

        let mut key = [0x01; 32];
        key[16..].fill(0x02);
        let mut s = vec![0x10, 0x00, 0xf1, 0x10, 0x00, 0x03];
        s.extend_from_slice(&sqn_xor_ak);
        s.extend_from_slice(&[0x00, 0x06]);

        assert_eq!(ogs_kdf_kasme(&ck, &ik, &plmn, &sqn_xor_ak), reference_hmac(&key, &s));
    }

    #[test]
    fn test_kdf_nas_keys_are_distinct() {
        let kasme = [0x11; 32];
        let enc = ogs_kdf_nas_eps(OGS_KDF_NAS_ENC_ALG, 2, &kasme);
        let int = ogs_kdf_nas_eps(OGS_KDF_NAS_INT_ALG, 2, &kasme);
        assert_ne!(enc, int);
        assert_ne!(int, ogs_kdf_nas_eps(OGS_KDF_NAS_INT_ALG, 1, &kasme));
        assert_eq!(int, ogs_kdf_nas_eps(OGS_KDF_NAS_INT_ALG, 2, &kasme));
    }

    #[test]
    fn test_kdf_kenb_depends_on_count() {
        let kasme = [0x22; 32];
        assert_ne!(ogs_kdf_kenb(&kasme, 0), ogs_kdf_kenb(&kasme, 1));
    }
}
