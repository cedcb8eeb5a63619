//! EMM Message Building
//!
//! Composes the structured downlink EMM messages. Each message gets the
//! security header its procedure stage mandates, see
//! [`security_header_for`]; encoding happens later in the codec.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use ogs_nas::identity::IdentityType;
use ogs_nas::message::{
    eps_attach_result, AttachAccept, AuthenticationRequest, EmmInformation, EmmMessage,
    EmmMessageType, IdentityRequest, NasMessage, SecurityModeCommand,
};
use ogs_nas::types::{
    EpsGuti, EsmMessageContainer, GprsTimer, KeySetIdentifier, SecurityAlgorithms,
    SecurityHeaderType, TimeZoneAndTime,
};

use crate::config::MmeConfig;
use crate::context::MmeUe;
use crate::security::replayed_security_capabilities;

/// Daylight saving time: no adjustment
const DAYLIGHT_SAVING_TIME_NO_ADJUSTMENT: u8 = 0;

/// Where the security header of an outbound message comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPolicy {
    /// Always this header type
    Fixed(SecurityHeaderType),
    /// Whatever the carried session PDU dictates
    Inherit,
}

/// Security header for each message type this MME composes.
///
/// `None` for messages it never sends.
pub fn security_header_for(message_type: EmmMessageType) -> Option<HeaderPolicy> {
    match message_type {
        EmmMessageType::IdentityRequest | EmmMessageType::AuthenticationRequest => {
            Some(HeaderPolicy::Fixed(SecurityHeaderType::Plain))
        }
        EmmMessageType::SecurityModeCommand => {
            Some(HeaderPolicy::Fixed(SecurityHeaderType::IntegrityProtectedNewContext))
        }
        EmmMessageType::AttachAccept => Some(HeaderPolicy::Inherit),
        EmmMessageType::EmmInformation | EmmMessageType::DetachAccept => {
            Some(HeaderPolicy::Fixed(SecurityHeaderType::IntegrityProtectedAndCiphered))
        }
        _ => None,
    }
}

fn compose(emm: EmmMessage, inherited: SecurityHeaderType) -> NasMessage {
    let security_header_type = match security_header_for(emm.message_type()) {
        Some(HeaderPolicy::Fixed(sht)) => sht,
        Some(HeaderPolicy::Inherit) | None => inherited,
    };
    NasMessage::new(security_header_type, emm)
}

/// Build identity request message (IMSI)
pub fn build_identity_request() -> NasMessage {
    compose(
        EmmMessage::IdentityRequest(IdentityRequest { identity_type: IdentityType::Imsi }),
        SecurityHeaderType::Plain,
    )
}

/// Build authentication request message from the stored challenge
pub fn build_authentication_request(mme_ue: &MmeUe) -> NasMessage {
    compose(
        EmmMessage::AuthenticationRequest(AuthenticationRequest {
            nas_key_set_identifier: KeySetIdentifier::new(0, 0),
            rand: *mme_ue.security.rand(),
            autn: *mme_ue.security.autn(),
        }),
        SecurityHeaderType::Plain,
    )
}

/// Build security mode command message
///
/// Echoes the UE's capabilities and the algorithms already selected into
/// its security context. A fresh native context always uses KSI 0.
pub fn build_security_mode_command(mme_ue: &MmeUe) -> NasMessage {
    compose(
        EmmMessage::SecurityModeCommand(SecurityModeCommand {
            selected_nas_security_algorithms: SecurityAlgorithms {
                ciphering: mme_ue.security.selected_enc_algorithm,
                integrity: mme_ue.security.selected_int_algorithm,
            },
            nas_key_set_identifier: KeySetIdentifier::new(0, 0),
            replayed_ue_security_capabilities: replayed_security_capabilities(
                &mme_ue.ue_network_capability,
                &mme_ue.ms_network_capability,
            ),
        }),
        SecurityHeaderType::Plain,
    )
}

/// Build attach accept message around the default bearer activation PDU
pub fn build_attach_accept(
    config: &MmeConfig,
    guti: &EpsGuti,
    esm_message: EsmMessageContainer,
    inherited: SecurityHeaderType,
) -> NasMessage {
    compose(
        EmmMessage::AttachAccept(AttachAccept {
            eps_attach_result: eps_attach_result::EPS_ONLY,
            t3412_value: GprsTimer::from_seconds(config.t3412),
            tai_list: vec![config.served_tai()],
            esm_message_container: esm_message,
            guti: Some(*guti),
        }),
        inherited,
    )
}

/// Build EMM information message carrying `now` in UTC and the local offset
pub fn build_emm_information(now: &DateTime<FixedOffset>) -> NasMessage {
    let utc = now.naive_utc();
    let time = TimeZoneAndTime::new(
        (utc.year().rem_euclid(100)) as u8,
        utc.month() as u8,
        utc.day() as u8,
        utc.hour() as u8,
        utc.minute() as u8,
        utc.second() as u8,
        now.offset().local_minus_utc(),
    );

    compose(
        EmmMessage::EmmInformation(EmmInformation {
            universal_time_and_local_time_zone: Some(time),
            network_daylight_saving_time: Some(DAYLIGHT_SAVING_TIME_NO_ADJUSTMENT),
        }),
        SecurityHeaderType::Plain,
    )
}

/// Build detach accept message
pub fn build_detach_accept() -> NasMessage {
    compose(EmmMessage::DetachAccept, SecurityHeaderType::Plain)
}
