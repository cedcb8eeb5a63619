//! Decoded EPS Mobility Management messages (TS 24.301 8.2)

use crate::error::{NasError, NasResult};
use crate::identity::{IdentityType, MobileIdentity};
use crate::types::{
    DetachType, EpsGuti, EpsTai, EsmMessageContainer, GprsTimer, KeySetIdentifier,
    MsNetworkCapability, SecurityAlgorithms, SecurityHeaderType, TimeZoneAndTime,
    UeNetworkCapability, UeSecurityCapability,
};

/// EMM message type values (TS 24.301 9.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EmmMessageType {
    AttachRequest = 0x41,
    AttachAccept = 0x42,
    AttachComplete = 0x43,
    AttachReject = 0x44,
    DetachRequest = 0x45,
    DetachAccept = 0x46,
    AuthenticationRequest = 0x52,
    AuthenticationResponse = 0x53,
    IdentityRequest = 0x55,
    IdentityResponse = 0x56,
    SecurityModeCommand = 0x5d,
    SecurityModeComplete = 0x5e,
    EmmStatus = 0x60,
    EmmInformation = 0x61,
}

/// EPS attach result values
pub mod eps_attach_result {
    pub const EPS_ONLY: u8 = 1;
    pub const COMBINED_EPS_IMSI: u8 = 2;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachRequest {
    pub eps_attach_type: u8,
    pub nas_key_set_identifier: KeySetIdentifier,
    pub eps_mobile_identity: MobileIdentity,
    pub ue_network_capability: UeNetworkCapability,
    pub esm_message_container: EsmMessageContainer,
    pub last_visited_registered_tai: Option<EpsTai>,
    pub ms_network_capability: Option<MsNetworkCapability>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttachAccept {
    pub eps_attach_result: u8,
    pub t3412_value: GprsTimer,
    pub tai_list: Vec<EpsTai>,
    pub esm_message_container: EsmMessageContainer,
    pub guti: Option<EpsGuti>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttachComplete {
    pub esm_message_container: EsmMessageContainer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityRequest {
    pub identity_type: IdentityType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResponse {
    pub mobile_identity: MobileIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticationRequest {
    pub nas_key_set_identifier: KeySetIdentifier,
    pub rand: [u8; 16],
    pub autn: [u8; 16],
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthenticationResponse {
    /// Authentication response parameter (RES), 4 to 16 octets
    pub res: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityModeCommand {
    pub selected_nas_security_algorithms: SecurityAlgorithms,
    pub nas_key_set_identifier: KeySetIdentifier,
    pub replayed_ue_security_capabilities: UeSecurityCapability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmmInformation {
    pub universal_time_and_local_time_zone: Option<TimeZoneAndTime>,
    /// Daylight saving time adjustment value (0..=2)
    pub network_daylight_saving_time: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmmStatus {
    pub emm_cause: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachRequest {
    pub detach_type: DetachType,
    pub nas_key_set_identifier: KeySetIdentifier,
    pub eps_mobile_identity: MobileIdentity,
}

/// EMM message body, one variant per message the engine sees or sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmmMessage {
    AttachRequest(AttachRequest),
    AttachAccept(AttachAccept),
    AttachComplete(AttachComplete),
    IdentityRequest(IdentityRequest),
    IdentityResponse(IdentityResponse),
    AuthenticationRequest(AuthenticationRequest),
    AuthenticationResponse(AuthenticationResponse),
    SecurityModeCommand(SecurityModeCommand),
    EmmInformation(EmmInformation),
    EmmStatus(EmmStatus),
    DetachRequest(DetachRequest),
    DetachAccept,
}

impl EmmMessage {
    pub fn message_type(&self) -> EmmMessageType {
        match self {
            Self::AttachRequest(_) => EmmMessageType::AttachRequest,
            Self::AttachAccept(_) => EmmMessageType::AttachAccept,
            Self::AttachComplete(_) => EmmMessageType::AttachComplete,
            Self::IdentityRequest(_) => EmmMessageType::IdentityRequest,
            Self::IdentityResponse(_) => EmmMessageType::IdentityResponse,
            Self::AuthenticationRequest(_) => EmmMessageType::AuthenticationRequest,
            Self::AuthenticationResponse(_) => EmmMessageType::AuthenticationResponse,
            Self::SecurityModeCommand(_) => EmmMessageType::SecurityModeCommand,
            Self::EmmInformation(_) => EmmMessageType::EmmInformation,
            Self::EmmStatus(_) => EmmMessageType::EmmStatus,
            Self::DetachRequest(_) => EmmMessageType::DetachRequest,
            Self::DetachAccept => EmmMessageType::DetachAccept,
        }
    }
}

/// A decoded NAS message: outer header plus EMM body.
///
/// The protocol discriminator is always EMM, so only the security header
/// type is carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasMessage {
    pub security_header_type: SecurityHeaderType,
    pub emm: EmmMessage,
}

impl NasMessage {
    pub fn new(security_header_type: SecurityHeaderType, emm: EmmMessage) -> Self {
        Self { security_header_type, emm }
    }

    pub fn plain(emm: EmmMessage) -> Self {
        Self::new(SecurityHeaderType::Plain, emm)
    }
}

/// ESM header fields read from the front of an ESM container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsmHeader {
    pub eps_bearer_identity: u8,
    pub protocol_discriminator: u8,
    pub procedure_transaction_identity: u8,
    pub message_type: u8,
}

impl EsmHeader {
    pub const LEN: usize = 3;

    /// Read the header without consuming or interpreting the body.
    pub fn peek(buf: &[u8]) -> NasResult<Self> {
        if buf.len() < Self::LEN {
            return Err(NasError::BufferTooShort { expected: Self::LEN, actual: buf.len() });
        }
        Ok(Self {
            eps_bearer_identity: buf[0] >> 4,
            protocol_discriminator: buf[0] & 0x0F,
            procedure_transaction_identity: buf[1],
            message_type: buf[2],
        })
    }
}
