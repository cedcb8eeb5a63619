//! Collaborator paths out of the EMM core
//!
//! Every handoff is fire-and-forget: the answer, if any, comes back later
//! as a new [`MmeEvent`].

use ogs_nas::pkbuf::NasBuffer;
use ogs_nas::types::PlmnId;
use thiserror::Error;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

use crate::context::{EnbBinding, MmeBearer};
use crate::event::MmeEvent;

/// Path error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Event channel closed")]
    ChannelClosed,

    #[error("{0} rejected the message")]
    Rejected(&'static str),
}

pub type PathResult<T> = Result<T, PathError>;

/// S6a client towards the HSS
pub trait S6aClient: Send {
    /// Ask for one E-UTRAN authentication vector.
    fn request_authentication_vector(
        &self,
        ue_id: u64,
        imsi_bcd: &str,
        visited_plmn_id: &PlmnId,
    ) -> PathResult<()>;
}

/// Session management subsystem
pub trait SessionManager: Send {
    /// Hand an ESM PDU to session management for `bearer_index`.
    fn deliver(&self, ue_id: u64, bearer_index: u32, pdu: NasBuffer) -> PathResult<()>;
}

/// S1AP transport towards the eNB
pub trait S1apTransport: Send {
    fn send_downlink_nas(&self, enb: &EnbBinding, pdu: NasBuffer) -> PathResult<()>;

    /// Initial context setup with the NAS PDU piggybacked.
    fn setup_initial_context(
        &self,
        enb: &EnbBinding,
        bearer: &MmeBearer,
        kenb: &[u8; 32],
        pdu: NasBuffer,
    ) -> PathResult<()>;
}

/// Collaborators backed by one event channel
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<MmeEvent>,
}

impl EventQueue {
    pub fn new(tx: mpsc::UnboundedSender<MmeEvent>) -> Self {
        Self { tx }
    }

    /// Queue an event
    pub fn send(&self, event: MmeEvent) -> PathResult<()> {
        self.tx.send(event).map_err(|e| {
            log::error!("Failed to queue {}", e.0.name());
            PathError::ChannelClosed
        })
    }
}

impl S6aClient for EventQueue {
    fn request_authentication_vector(
        &self,
        ue_id: u64,
        imsi_bcd: &str,
        visited_plmn_id: &PlmnId,
    ) -> PathResult<()> {
        self.send(MmeEvent::AuthenticationInformationRequest {
            ue_id,
            imsi_bcd: Zeroizing::new(imsi_bcd.to_string()),
            visited_plmn_id: *visited_plmn_id,
        })
    }
}

impl SessionManager for EventQueue {
    fn deliver(&self, ue_id: u64, bearer_index: u32, pdu: NasBuffer) -> PathResult<()> {
        self.send(MmeEvent::EsmDeliver { ue_id, bearer_index, pdu: pdu.freeze() })
    }
}

impl S1apTransport for EventQueue {
    fn send_downlink_nas(&self, enb: &EnbBinding, pdu: NasBuffer) -> PathResult<()> {
        self.send(MmeEvent::DownlinkNasTransport { enb: *enb, pdu: pdu.freeze() })
    }

    fn setup_initial_context(
        &self,
        enb: &EnbBinding,
        bearer: &MmeBearer,
        kenb: &[u8; 32],
        pdu: NasBuffer,
    ) -> PathResult<()> {
        self.send(MmeEvent::InitialContextSetupRequest {
            enb: *enb,
            bearer: *bearer,
            kenb: Zeroizing::new(*kenb),
            pdu: pdu.freeze(),
        })
    }
}
