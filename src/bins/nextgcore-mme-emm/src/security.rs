//! Per-UE NAS security context
//!
//! Key material is derived in a fixed order:
//!
//! ```text
//! authentication vector (RAND, AUTN, XRES, KASME)
//!   -> KNASenc / KNASint   (derive_nas_keys)
//!   -> KeNB                (derive_kenb)
//! ```
//!
//! Each step refuses to run before its input exists. Everything is wiped on
//! [`SecurityContext::clear`] and on drop.

use ogs_crypt::kdf::{ogs_kdf_kenb, ogs_kdf_nas_eps, OGS_KDF_NAS_ENC_ALG, OGS_KDF_NAS_INT_ALG};
use ogs_crypt::CryptError;
use ogs_nas::types::{MsNetworkCapability, UeNetworkCapability, UeSecurityCapability};
use ogs_nas::NasError;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const OGS_RAND_LEN: usize = 16;
pub const OGS_AUTN_LEN: usize = 16;
pub const OGS_KEY_LEN: usize = 16;
pub const OGS_SHA256_DIGEST_SIZE: usize = 32;
/// RES/XRES length bounds (TS 33.102 6.3.7)
pub const OGS_MIN_RES_LEN: usize = 4;
pub const OGS_MAX_RES_LEN: usize = 16;

/// NAS COUNT wraps at 24 bits (overflow 16 bits | SQN 8 bits)
const NAS_COUNT_MASK: u32 = 0x00ff_ffff;

/// Security error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("XRES length {0} out of range")]
    InvalidXresLength(usize),

    #[error("No authentication vector stored")]
    NoAuthenticationVector,

    #[error("Authentication response mismatch")]
    ResponseMismatch,

    #[error("KASME not available")]
    KasmeMissing,

    #[error("NAS keys not derived")]
    NasKeysMissing,

    #[error("KeNB not derived")]
    KenbMissing,

    #[error("Crypto error: {0}")]
    Crypt(#[from] CryptError),

    #[error("NAS encoding error: {0}")]
    Nas(#[from] NasError),
}

pub type SecurityResult<T> = Result<T, SecurityError>;

#[derive(Clone, Zeroize)]
struct NasKeys {
    knas_enc: [u8; OGS_KEY_LEN],
    knas_int: [u8; OGS_KEY_LEN],
}

/// UE security context
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecurityContext {
    rand: [u8; OGS_RAND_LEN],
    autn: [u8; OGS_AUTN_LEN],
    xres: Vec<u8>,
    kasme: Option<[u8; OGS_SHA256_DIGEST_SIZE]>,
    nas_keys: Option<NasKeys>,
    kenb: Option<[u8; OGS_SHA256_DIGEST_SIZE]>,

    /// Selected ciphering algorithm (EEA id)
    pub selected_enc_algorithm: u8,
    /// Selected integrity algorithm (EIA id)
    pub selected_int_algorithm: u8,

    /// Uplink NAS COUNT
    pub ul_count: u32,
    /// Downlink NAS COUNT
    pub dl_count: u32,
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("has_vector", &self.has_authentication_vector())
            .field("has_kasme", &self.kasme.is_some())
            .field("has_nas_keys", &self.nas_keys.is_some())
            .field("has_kenb", &self.kenb.is_some())
            .field("eea", &self.selected_enc_algorithm)
            .field("eia", &self.selected_int_algorithm)
            .field("ul_count", &self.ul_count)
            .field("dl_count", &self.dl_count)
            .finish()
    }
}

impl SecurityContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fresh challenge. Replaces any earlier vector and drops keys
    /// derived from it.
    pub fn store_authentication_vector(
        &mut self,
        rand: &[u8; OGS_RAND_LEN],
        autn: &[u8; OGS_AUTN_LEN],
        xres: &[u8],
    ) -> SecurityResult<()> {
        if !(OGS_MIN_RES_LEN..=OGS_MAX_RES_LEN).contains(&xres.len()) {
            return Err(SecurityError::InvalidXresLength(xres.len()));
        }

        self.rand = *rand;
        self.autn = *autn;
        self.xres.zeroize();
        self.xres.extend_from_slice(xres);

        self.kasme.zeroize();
        self.nas_keys.zeroize();
        self.kenb.zeroize();
        Ok(())
    }

    /// Install KASME delivered with the authentication vector.
    pub fn set_kasme(&mut self, kasme: &[u8; OGS_SHA256_DIGEST_SIZE]) {
        self.kasme = Some(*kasme);
    }

    pub fn has_authentication_vector(&self) -> bool {
        !self.xres.is_empty()
    }

    pub fn rand(&self) -> &[u8; OGS_RAND_LEN] {
        &self.rand
    }

    pub fn autn(&self) -> &[u8; OGS_AUTN_LEN] {
        &self.autn
    }

    /// Compare RES with the stored XRES: same length and same bytes.
    ///
    /// The byte comparison does not short-circuit.
    pub fn verify_response(&self, res: &[u8]) -> SecurityResult<()> {
        if self.xres.is_empty() {
            return Err(SecurityError::NoAuthenticationVector);
        }
        if res.len() != self.xres.len() {
            return Err(SecurityError::ResponseMismatch);
        }
        let diff = res
            .iter()
            .zip(self.xres.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(SecurityError::ResponseMismatch);
        }
        Ok(())
    }

    /// Derive KNASenc and KNASint from KASME for the selected algorithms.
    pub fn derive_nas_keys(&mut self, enc_alg: u8, int_alg: u8) -> SecurityResult<()> {
        let kasme = self.kasme.as_ref().ok_or(SecurityError::KasmeMissing)?;

        self.nas_keys = Some(NasKeys {
            knas_enc: ogs_kdf_nas_eps(OGS_KDF_NAS_ENC_ALG, enc_alg, kasme),
            knas_int: ogs_kdf_nas_eps(OGS_KDF_NAS_INT_ALG, int_alg, kasme),
        });
        self.selected_enc_algorithm = enc_alg;
        self.selected_int_algorithm = int_alg;
        Ok(())
    }

    /// Derive KeNB from KASME and the current uplink NAS COUNT.
    ///
    /// Only valid once the NAS keys exist.
    pub fn derive_kenb(&mut self) -> SecurityResult<()> {
        if self.nas_keys.is_none() {
            return Err(SecurityError::NasKeysMissing);
        }
        let kasme = self.kasme.as_ref().ok_or(SecurityError::KasmeMissing)?;
        self.kenb = Some(ogs_kdf_kenb(kasme, self.ul_count));
        Ok(())
    }

    pub fn has_nas_keys(&self) -> bool {
        self.nas_keys.is_some()
    }

    pub fn knas_enc(&self) -> Option<&[u8; OGS_KEY_LEN]> {
        self.nas_keys.as_ref().map(|k| &k.knas_enc)
    }

    pub fn knas_int(&self) -> Option<&[u8; OGS_KEY_LEN]> {
        self.nas_keys.as_ref().map(|k| &k.knas_int)
    }

    pub fn kenb(&self) -> Option<&[u8; OGS_SHA256_DIGEST_SIZE]> {
        self.kenb.as_ref()
    }

    /// Both counts restart at zero for a new EPS security context.
    pub fn reset_counts(&mut self) {
        self.ul_count = 0;
        self.dl_count = 0;
    }

    pub fn advance_dl_count(&mut self) {
        self.dl_count = (self.dl_count + 1) & NAS_COUNT_MASK;
    }

    /// Wipe every secret and counter.
    pub fn clear(&mut self) {
        self.zeroize();
    }
}

/// Project the capabilities a UE advertised in Attach Request into the
/// replayed UE security capabilities IE of Security Mode Command.
pub fn replayed_security_capabilities(
    ue: &UeNetworkCapability,
    ms: &MsNetworkCapability,
) -> UeSecurityCapability {
    let mut caps = UeSecurityCapability {
        length: 0,
        eea: ue.eea,
        eia: ue.eia,
        uea: ue.uea,
        uia: ue.uia,
        gea: (ms.gea1 << 6) | ms.extended_gea,
    };
    caps.length = (std::mem::size_of_val(&caps.eea)
        + std::mem::size_of_val(&caps.eia)
        + std::mem::size_of_val(&caps.uea)
        + std::mem::size_of_val(&caps.uia)
        + std::mem::size_of_val(&caps.gea)) as u8;
    caps
}
