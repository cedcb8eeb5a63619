//! NAS Security Functions
//!
//! Downlink EPS NAS security encoding (TS 24.301 4.4, 9.1):
//!
//! ```text
//! +-------------+-----------+-----+----------------------------+
//! | SHT | PD(7) | MAC (4)   | SQN | plain NAS message          |
//! +-------------+-----------+-----+----------------------------+
//!                <--- MAC over SQN || (ciphered) message ------>
//! ```
//!
//! The header is written into the headroom of the plain message buffer, so
//! the payload is never copied.

use ogs_crypt::eps::{nas_encrypt, nas_mac_calculate, NAS_SECURITY_MAC_SIZE};
use ogs_nas::encode::encode_emm_message;
use ogs_nas::message::{EmmMessage, NasMessage};
use ogs_nas::pkbuf::NasBuffer;
use ogs_nas::types::{protocol_discriminator, SecurityHeaderType};

use crate::security::{SecurityContext, SecurityError, SecurityResult};

/// NAS security bearer (always 0 for NAS)
pub const NAS_SECURITY_BEARER: u8 = 0;

/// NAS security downlink direction
pub const NAS_SECURITY_DOWNLINK_DIRECTION: u8 = 1;

/// Security protected NAS message header length
pub const NAS_SECURITY_HEADER_LEN: usize = 2 + NAS_SECURITY_MAC_SIZE;

/// NAS codec used by the procedure handlers
pub trait NasCodec: Send {
    /// Encode a message with no security protection.
    fn encode_plain(&self, message: &EmmMessage) -> SecurityResult<NasBuffer>;

    /// Encode a message under `message.security_header_type` using the UE's
    /// NAS keys and downlink count.
    fn encode_secured(
        &self,
        message: &NasMessage,
        security: &mut SecurityContext,
    ) -> SecurityResult<NasBuffer>;
}

/// TS 24.301 codec with EEA0/EEA2 and EIA0/EIA2
#[derive(Debug, Clone, Copy, Default)]
pub struct EpsNasCodec;

impl NasCodec for EpsNasCodec {
    fn encode_plain(&self, message: &EmmMessage) -> SecurityResult<NasBuffer> {
        Ok(encode_emm_message(message)?)
    }

    fn encode_secured(
        &self,
        message: &NasMessage,
        security: &mut SecurityContext,
    ) -> SecurityResult<NasBuffer> {
        nas_eps_security_encode(security, message.security_header_type, &message.emm)
    }
}

/// Encode `emm` under `security_header_type`.
///
/// A plain header takes the plain path. Anything else requires derived NAS
/// keys; a selected algorithm of 0 disables that protection while the
/// header type is kept as given.
pub fn nas_eps_security_encode(
    security: &mut SecurityContext,
    security_header_type: SecurityHeaderType,
    emm: &EmmMessage,
) -> SecurityResult<NasBuffer> {
    if !security_header_type.is_protected() {
        return Ok(encode_emm_message(emm)?);
    }

    let (knas_enc, knas_int) = match (security.knas_enc(), security.knas_int()) {
        (Some(enc), Some(int)) => (*enc, *int),
        _ => return Err(SecurityError::NasKeysMissing),
    };

    let mut buf = encode_emm_message(emm)?;

    // Reset counts for new security context
    if security_header_type.is_new_context() {
        security.reset_counts();
    }

    let ciphered =
        security_header_type.is_ciphered() && security.selected_enc_algorithm != 0;
    let integrity_protected = security.selected_int_algorithm != 0;
    let dl_count = security.dl_count;

    if ciphered {
        nas_encrypt(
            security.selected_enc_algorithm,
            &knas_enc,
            dl_count,
            NAS_SECURITY_BEARER,
            NAS_SECURITY_DOWNLINK_DIRECTION,
            buf.data_mut(),
        )?;
    }

    // SQN goes in first so the MAC input is contiguous
    buf.push(1)?[0] = (dl_count & 0xff) as u8;

    let mac = if integrity_protected {
        nas_mac_calculate(
            security.selected_int_algorithm,
            &knas_int,
            dl_count,
            NAS_SECURITY_BEARER,
            NAS_SECURITY_DOWNLINK_DIRECTION,
            buf.data(),
        )?
    } else {
        [0u8; NAS_SECURITY_MAC_SIZE]
    };

    let header = buf.push(1 + NAS_SECURITY_MAC_SIZE)?;
    header[0] = ((security_header_type as u8) << 4) | protocol_discriminator::EMM;
    header[1..].copy_from_slice(&mac);

    security.advance_dl_count();
    log::debug!(
        "NAS security encode: SHT={} EEA{} EIA{} DL-COUNT={}",
        security_header_type as u8,
        security.selected_enc_algorithm,
        security.selected_int_algorithm,
        dl_count
    );

    Ok(buf)
}
