//! MME events
//!
//! Everything that enters the EMM core, and everything it hands off to the
//! S6a, session management and S1AP sides, travels as an [`MmeEvent`].

use std::fmt;

use bytes::Bytes;
use ogs_nas::message::NasMessage;
use ogs_nas::types::{PlmnId, SecurityHeaderType};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::context::{EnbBinding, MmeBearer};

/// E-UTRAN authentication vector from the HSS (TS 29.272 7.3.18)
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AuthenticationVector {
    pub rand: [u8; 16],
    pub autn: [u8; 16],
    pub xres: Vec<u8>,
    pub kasme: [u8; 32],
}

impl fmt::Debug for AuthenticationVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationVector")
            .field("xres_len", &self.xres.len())
            .finish_non_exhaustive()
    }
}

/// Session PDU produced by session management for the default bearer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionPdu {
    /// Header the carrying EMM message is sent under
    pub security_header_type: SecurityHeaderType,
    pub bytes: Bytes,
}

/// MME event
pub enum MmeEvent {
    // Inbound
    /// First NAS message on a new S1AP UE association
    InitialUeMessage {
        enb_id: u32,
        enb_ue_s1ap_id: u32,
        message: NasMessage,
    },
    /// Decoded uplink EMM message
    EmmMessage { ue_id: u64, message: NasMessage },
    /// Authentication information answer from the HSS
    AuthenticationInformationAnswer {
        ue_id: u64,
        vector: AuthenticationVector,
    },
    /// Session management activated the default bearer
    DefaultBearerReady {
        ue_id: u64,
        bearer_index: u32,
        pdu: SessionPdu,
    },
    /// S1AP released the UE association
    UeContextReleaseComplete { ue_id: u64 },

    // Outbound
    /// ESM PDU relayed to session management
    EsmDeliver {
        ue_id: u64,
        bearer_index: u32,
        pdu: Bytes,
    },
    /// Authentication information request towards the HSS
    AuthenticationInformationRequest {
        ue_id: u64,
        imsi_bcd: Zeroizing<String>,
        visited_plmn_id: PlmnId,
    },
    /// Downlink NAS transport to the eNB
    DownlinkNasTransport { enb: EnbBinding, pdu: Bytes },
    /// Initial context setup request carrying Attach Accept
    InitialContextSetupRequest {
        enb: EnbBinding,
        bearer: MmeBearer,
        kenb: Zeroizing<[u8; 32]>,
        pdu: Bytes,
    },
}

impl MmeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MmeEvent::InitialUeMessage { .. } => "INITIAL_UE_MESSAGE",
            MmeEvent::EmmMessage { .. } => "EMM_MESSAGE",
            MmeEvent::AuthenticationInformationAnswer { .. } => "S6A_AIA",
            MmeEvent::DefaultBearerReady { .. } => "DEFAULT_BEARER_READY",
            MmeEvent::UeContextReleaseComplete { .. } => "UE_CONTEXT_RELEASE_COMPLETE",
            MmeEvent::EsmDeliver { .. } => "ESM_DELIVER",
            MmeEvent::AuthenticationInformationRequest { .. } => "S6A_AIR",
            MmeEvent::DownlinkNasTransport { .. } => "DOWNLINK_NAS_TRANSPORT",
            MmeEvent::InitialContextSetupRequest { .. } => "INITIAL_CONTEXT_SETUP_REQUEST",
        }
    }

    /// Events the EMM core consumes, as opposed to the ones it emits
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            MmeEvent::InitialUeMessage { .. }
                | MmeEvent::EmmMessage { .. }
                | MmeEvent::AuthenticationInformationAnswer { .. }
                | MmeEvent::DefaultBearerReady { .. }
                | MmeEvent::UeContextReleaseComplete { .. }
        )
    }
}

impl fmt::Debug for MmeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("MmeEvent");
        s.field("name", &self.name());
        match self {
            MmeEvent::InitialUeMessage { enb_id, enb_ue_s1ap_id, message } => {
                s.field("enb_id", enb_id)
                    .field("enb_ue_s1ap_id", enb_ue_s1ap_id)
                    .field("message_type", &message.emm.message_type());
            }
            MmeEvent::EmmMessage { ue_id, message } => {
                s.field("ue_id", ue_id).field("message_type", &message.emm.message_type());
            }
            MmeEvent::AuthenticationInformationAnswer { ue_id, .. }
            | MmeEvent::UeContextReleaseComplete { ue_id }
            | MmeEvent::AuthenticationInformationRequest { ue_id, .. } => {
                s.field("ue_id", ue_id);
            }
            MmeEvent::DefaultBearerReady { ue_id, bearer_index, pdu } => {
                s.field("ue_id", ue_id)
                    .field("bearer_index", bearer_index)
                    .field("len", &pdu.bytes.len());
            }
            MmeEvent::EsmDeliver { ue_id, bearer_index, pdu } => {
                s.field("ue_id", ue_id)
                    .field("bearer_index", bearer_index)
                    .field("len", &pdu.len());
            }
            MmeEvent::DownlinkNasTransport { enb, pdu } => {
                s.field("enb", enb).field("len", &pdu.len());
            }
            MmeEvent::InitialContextSetupRequest { enb, bearer, pdu, .. } => {
                s.field("enb", enb).field("bearer", bearer).field("len", &pdu.len());
            }
        }
        s.finish_non_exhaustive()
    }
}
