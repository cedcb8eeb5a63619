//! EMM Message Handling
//!
//! One handler per uplink EMM message, plus the two cross-layer triggers
//! (authentication vector arrival, default bearer ready). A handler checks
//! the trigger against the UE's state first, hands off to the fallible
//! collaborator next, and only then commits context changes and moves the
//! state, so a failed handler leaves the UE where it was.

use chrono::{DateTime, FixedOffset};
use ogs_nas::identity::{bcd_to_buffer, imsi_to_bcd, IdentityType, MobileIdentity};
use ogs_nas::message::{
    AttachComplete, AttachRequest, AuthenticationResponse, DetachRequest, EmmStatus, EsmHeader,
    IdentityResponse,
};
use ogs_nas::types::DetachKind;
use ogs_nas::NasError;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::context::{MmeContext, MmeUe, EBI_UNASSIGNED};
use crate::emm_sm::{EmmState, EmmTrigger};
use crate::event::{AuthenticationVector, SessionPdu};
use crate::nas_path::{self, EmmEnv};
use crate::path::PathError;
use crate::security::SecurityError;

/// EMM error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmmError {
    #[error("UE context {0} not found")]
    UeNotFound(u64),

    #[error("UE context {0} has no S1 association")]
    NoEnbBinding(u64),

    #[error("Unexpected {message} in state {state}")]
    UnexpectedMessage { state: EmmState, message: &'static str },

    #[error("Unsupported identity type {0:?}")]
    UnsupportedIdentity(IdentityType),

    #[error("IMSI has no digits")]
    InvalidImsi,

    #[error("Empty ESM message container")]
    EmptyEsmContainer,

    #[error("Unknown bearer index {0}")]
    UnknownBearer(u32),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Message type {0:#04x} is not handled on the uplink")]
    UnexpectedDirection(u8),

    #[error("Event {0} is not an MME input")]
    UnexpectedEvent(&'static str),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("NAS error: {0}")]
    Nas(#[from] NasError),

    #[error("Path error: {0}")]
    Path(#[from] PathError),
}

/// Result type for EMM handlers
pub type EmmResult<T> = Result<T, EmmError>;

fn mme_ue_find(ctx: &MmeContext, ue_id: u64) -> EmmResult<&MmeUe> {
    debug_assert!(ctx.mme_ue_find(ue_id).is_some(), "UE(mme-ue) context has already been removed");
    ctx.mme_ue_find(ue_id).ok_or_else(|| {
        log::error!("UE(mme-ue) context has already been removed");
        EmmError::UeNotFound(ue_id)
    })
}

fn mme_ue_find_mut(ctx: &mut MmeContext, ue_id: u64) -> EmmResult<&mut MmeUe> {
    debug_assert!(ctx.mme_ue_find(ue_id).is_some(), "UE(mme-ue) context has already been removed");
    ctx.mme_ue_find_mut(ue_id).ok_or_else(|| {
        log::error!("UE(mme-ue) context has already been removed");
        EmmError::UeNotFound(ue_id)
    })
}

fn check_state(mme_ue: &MmeUe, trigger: EmmTrigger, message: &'static str) -> EmmResult<()> {
    if mme_ue.fsm.accepts(trigger) {
        return Ok(());
    }
    log::warn!(
        "[{}] Unexpected {} in {}",
        mme_ue.imsi_bcd.as_str(),
        message,
        mme_ue.state()
    );
    Err(EmmError::UnexpectedMessage { state: mme_ue.state(), message })
}

/// IMSI digits of a mobile identity, checked to pack as BCD; anything else
/// is unsupported.
fn imsi_digits(identity: &MobileIdentity) -> EmmResult<Zeroizing<String>> {
    match identity {
        MobileIdentity::Imsi(imsi) => {
            let digits = Zeroizing::new(imsi_to_bcd(imsi));
            if digits.is_empty() {
                log::error!("Can't get IMSI");
                return Err(EmmError::InvalidImsi);
            }
            Zeroizing::new(bcd_to_buffer(&digits)?);
            Ok(digits)
        }
        other => {
            log::warn!("Not supported Identity type({:?})", other.identity_type());
            Err(EmmError::UnsupportedIdentity(other.identity_type()))
        }
    }
}

/// Attach Request: IMSI goes straight to the HSS, GUTI asks for the IMSI.
///
/// The outbound request goes first; the context is reset and refilled only
/// once it was accepted.
pub fn emm_handle_attach_request(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    attach_request: &AttachRequest,
) -> EmmResult<()> {
    let (trigger, imsi_bcd) = match &attach_request.eps_mobile_identity {
        MobileIdentity::Guti(guti) => {
            log::info!(
                "Attach request with GUTI[G:{},C:{},M_TMSI:0x{:08x}]",
                guti.mme_gid,
                guti.mme_code,
                guti.m_tmsi
            );
            (EmmTrigger::AttachRequestGuti, None)
        }
        identity => {
            let digits = imsi_digits(identity)?;
            log::info!("Attach request with IMSI[{}]", digits.as_str());
            (EmmTrigger::AttachRequestImsi, Some(digits))
        }
    };
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    check_state(mme_ue, trigger, "Attach request")?;

    let visited_plmn_id = attach_request
        .last_visited_registered_tai
        .map(|tai| tai.plmn_id)
        .unwrap_or(env.config.plmn_id);

    match &imsi_bcd {
        Some(imsi_bcd) => {
            env.s6a.request_authentication_vector(ue_id, imsi_bcd, &visited_plmn_id)?
        }
        None => nas_path::nas_eps_send_identity_request(env, mme_ue)?,
    }

    // A new attach starts from a clean context
    ctx.mme_ue_clear(ue_id);
    if let Some(imsi_bcd) = &imsi_bcd {
        ctx.mme_ue_set_imsi(ue_id, imsi_bcd)?;
    }
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    mme_ue.visited_plmn_id = visited_plmn_id;
    mme_ue.ue_network_capability = attach_request.ue_network_capability;
    mme_ue.ms_network_capability = attach_request.ms_network_capability.unwrap_or_default();

    if let Err(e) =
        nas_path::nas_eps_send_emm_to_esm(env.sm, mme_ue, &attach_request.esm_message_container)
    {
        log::warn!("[{}] ESM relay failed: {}", ue_id, e);
    }

    mme_ue.fsm.fire(trigger);
    Ok(())
}

/// Identity Response: only an IMSI moves the attach forward.
pub fn emm_handle_identity_response(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    identity_response: &IdentityResponse,
) -> EmmResult<()> {
    let mme_ue = mme_ue_find(ctx, ue_id)?;
    check_state(mme_ue, EmmTrigger::IdentityResponse, "Identity response")?;

    let imsi_bcd = imsi_digits(&identity_response.mobile_identity)?;
    log::info!("Identity response: IMSI[{}]", imsi_bcd.as_str());

    env.s6a.request_authentication_vector(ue_id, &imsi_bcd, &mme_ue.visited_plmn_id)?;

    ctx.mme_ue_set_imsi(ue_id, &imsi_bcd)?;
    mme_ue_find_mut(ctx, ue_id)?.fsm.fire(EmmTrigger::IdentityResponse);
    Ok(())
}

/// Authentication information answer: store the vector and challenge the UE.
pub fn emm_handle_authentication_information_answer(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    vector: &AuthenticationVector,
) -> EmmResult<()> {
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    check_state(mme_ue, EmmTrigger::AuthenticationVector, "Authentication information answer")?;

    mme_ue
        .security
        .store_authentication_vector(&vector.rand, &vector.autn, &vector.xres)?;
    mme_ue.security.set_kasme(&vector.kasme);

    nas_path::nas_eps_send_authentication_request(env, mme_ue)?;
    mme_ue.fsm.fire(EmmTrigger::AuthenticationVector);
    Ok(())
}

/// Authentication Response: RES must equal XRES exactly.
///
/// A mismatch sends nothing back and leaves the UE waiting.
pub fn emm_handle_authentication_response(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    authentication_response: &AuthenticationResponse,
) -> EmmResult<()> {
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    check_state(mme_ue, EmmTrigger::AuthenticationSuccess, "Authentication response")?;

    if let Err(e) = mme_ue.security.verify_response(&authentication_response.res) {
        log::error!("[{}] Authentication failure: {}", mme_ue.imsi_bcd.as_str(), e);
        mme_ue.fsm.fire(EmmTrigger::AuthenticationFailure);
        return Err(EmmError::AuthenticationFailed);
    }
    log::info!("Authentication successful for IMSI[{}]", mme_ue.imsi_bcd.as_str());

    mme_ue
        .security
        .derive_nas_keys(env.config.selected_enc_algorithm, env.config.selected_int_algorithm)?;
    mme_ue.security.derive_kenb()?;

    nas_path::nas_eps_send_security_mode_command(env, mme_ue)?;
    mme_ue.fsm.fire(EmmTrigger::AuthenticationSuccess);
    Ok(())
}

/// Default bearer activated: send Attach Accept with initial context setup.
///
/// The EBI carried in the activation PDU is the one session management
/// assigned; it replaces the bearer's own once the accept is out.
pub fn emm_handle_default_bearer_ready(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    bearer_index: u32,
    pdu: SessionPdu,
) -> EmmResult<()> {
    let mme_ue = mme_ue_find(ctx, ue_id)?;
    check_state(mme_ue, EmmTrigger::DefaultBearerReady, "Default bearer")?;
    let mut bearer = mme_ue
        .bearers
        .find_by_index(bearer_index)
        .copied()
        .ok_or(EmmError::UnknownBearer(bearer_index))?;
    if pdu.bytes.is_empty() {
        log::error!("Invalid default bearer activation PDU");
        return Err(EmmError::EmptyEsmContainer);
    }
    let h = EsmHeader::peek(&pdu.bytes).map_err(|e| {
        log::error!("Invalid default bearer activation PDU: {}", e);
        EmmError::Nas(e)
    })?;
    if h.eps_bearer_identity != EBI_UNASSIGNED {
        bearer.ebi = h.eps_bearer_identity;
    }

    log::info!("[{}] Activate default bearer context request : EMM <-- ESM[{}]",
        mme_ue.imsi_bcd.as_str(), bearer.ebi);

    let guti = ctx.allocate_guti(env.config);
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    nas_path::nas_eps_send_attach_accept(env, mme_ue, &guti, &bearer, pdu)?;
    mme_ue.bearers.set_ebi(bearer.index, bearer.ebi);
    mme_ue.guti = Some(guti);
    mme_ue.fsm.fire(EmmTrigger::DefaultBearerReady);
    Ok(())
}

/// Attach Complete: relay the ESM PDU, then send EMM Information.
pub fn emm_handle_attach_complete(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    attach_complete: &AttachComplete,
    now: &DateTime<FixedOffset>,
) -> EmmResult<()> {
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    check_state(mme_ue, EmmTrigger::AttachComplete, "Attach complete")?;
    log::info!("Attach complete received for IMSI[{}]", mme_ue.imsi_bcd.as_str());

    if let Err(e) =
        nas_path::nas_eps_send_emm_to_esm(env.sm, mme_ue, &attach_complete.esm_message_container)
    {
        log::warn!("[{}] ESM relay failed: {}", mme_ue.imsi_bcd.as_str(), e);
    }

    nas_path::nas_eps_send_emm_information(env, mme_ue, now)?;
    mme_ue.fsm.fire(EmmTrigger::AttachComplete);
    Ok(())
}

/// EMM Status: logged, never answered.
pub fn emm_handle_emm_status(
    ctx: &mut MmeContext,
    ue_id: u64,
    emm_status: &EmmStatus,
) -> EmmResult<()> {
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    log::warn!(
        "EMM STATUS : Cause[{}] IMSI[{}]",
        emm_status.emm_cause,
        mme_ue.imsi_bcd.as_str()
    );
    mme_ue.fsm.fire(EmmTrigger::EmmStatus);
    Ok(())
}

/// Detach Request: answer unless switched off, then drop the attach state.
///
/// The local cleanup runs even when Detach Accept could not be sent; the
/// send error is still reported.
pub fn emm_handle_detach_request(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    detach_request: &DetachRequest,
) -> EmmResult<()> {
    let mme_ue = mme_ue_find_mut(ctx, ue_id)?;
    check_state(mme_ue, EmmTrigger::DetachRequest, "Detach request")?;

    let detach_type = detach_request.detach_type;
    let kind = detach_type.kind();
    log::info!(
        "Detach request from IMSI[{}] type[{:?}] switch_off[{}]",
        mme_ue.imsi_bcd.as_str(),
        kind,
        detach_type.switch_off
    );
    match kind {
        DetachKind::EpsDetach | DetachKind::ImsiDetach | DetachKind::CombinedEpsImsiDetach => {}
        DetachKind::Reserved(value) => log::warn!("Reserved detach type {}", value),
    }
    mme_ue.detach_kind = Some(kind);
    mme_ue.fsm.fire(EmmTrigger::DetachRequest);

    let sent = if detach_type.switch_off {
        Ok(())
    } else {
        nas_path::nas_eps_send_detach_accept(env, mme_ue)
    };

    ctx.mme_ue_clear(ue_id);
    if let Some(mme_ue) = ctx.mme_ue_find_mut(ue_id) {
        mme_ue.fsm.fire(EmmTrigger::DetachComplete);
    }
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MmeConfig;
    use crate::context::{EnbBinding, MmeBearer};
    use crate::nas_security::EpsNasCodec;
    use crate::path::{PathResult, S1apTransport, S6aClient, SessionManager};
    use ogs_nas::identity::ImsiIdentity;
    use ogs_nas::pkbuf::NasBuffer;
    use ogs_nas::types::{DetachType, EsmMessageContainer, KeySetIdentifier, PlmnId, UeNetworkCapability};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Paths {
        air: Mutex<Vec<String>>,
        downlink: Mutex<Vec<Vec<u8>>>,
    }

    impl S6aClient for Paths {
        fn request_authentication_vector(&self, _: u64, imsi_bcd: &str, _: &PlmnId) -> PathResult<()> {
            self.air.lock().unwrap().push(imsi_bcd.to_string());
            Ok(())
        }
    }

    impl SessionManager for Paths {
        fn deliver(&self, _: u64, _: u32, _: NasBuffer) -> PathResult<()> {
            Ok(())
        }
    }

    impl S1apTransport for Paths {
        fn send_downlink_nas(&self, _: &EnbBinding, pdu: NasBuffer) -> PathResult<()> {
            self.downlink.lock().unwrap().push(pdu.data().to_vec());
            Ok(())
        }

        fn setup_initial_context(
            &self,
            _: &EnbBinding,
            _: &MmeBearer,
            _: &[u8; 32],
            _: NasBuffer,
        ) -> PathResult<()> {
            Ok(())
        }
    }

    fn attach_request(identity: MobileIdentity) -> AttachRequest {
        AttachRequest {
            eps_attach_type: 1,
            nas_key_set_identifier: KeySetIdentifier::new(0, KeySetIdentifier::NO_KEY),
            eps_mobile_identity: identity,
            ue_network_capability: UeNetworkCapability::default(),
            esm_message_container: EsmMessageContainer::new(vec![0x02, 0x01, 0xd0]),
            last_visited_registered_tai: None,
            ms_network_capability: None,
        }
    }

    #[test]
    fn test_unsupported_identity_has_no_side_effects() {
        let paths = Paths::default();
        let config = MmeConfig::default();
        let env = EmmEnv { config: &config, codec: &EpsNasCodec, s6a: &paths, sm: &paths, s1ap: &paths };
        let mut ctx = MmeContext::new();
        let id = ctx.mme_ue_add(1, 1);

        let req = attach_request(MobileIdentity::Imei("356938035643809".into()));
        assert_eq!(
            emm_handle_attach_request(&env, &mut ctx, id, &req),
            Err(EmmError::UnsupportedIdentity(IdentityType::Imei))
        );
        let ue = ctx.mme_ue_find(id).unwrap();
        assert_eq!(ue.state(), EmmState::Unregistered);
        assert!(ue.bearers.is_empty());
        assert!(paths.air.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_imsi_is_rejected() {
        let paths = Paths::default();
        let config = MmeConfig::default();
        let env = EmmEnv { config: &config, codec: &EpsNasCodec, s6a: &paths, sm: &paths, s1ap: &paths };
        let mut ctx = MmeContext::new();
        let id = ctx.mme_ue_add(1, 1);

        // first digit is filler
        let imsi = ImsiIdentity::from_octets(vec![0xf1]).unwrap();
        let req = attach_request(MobileIdentity::Imsi(imsi));
        assert_eq!(
            emm_handle_attach_request(&env, &mut ctx, id, &req),
            Err(EmmError::InvalidImsi)
        );
        assert_eq!(ctx.mme_ue_find(id).unwrap().state(), EmmState::Unregistered);
    }

    #[test]
    fn test_identity_response_out_of_state() {
        let paths = Paths::default();
        let config = MmeConfig::default();
        let env = EmmEnv { config: &config, codec: &EpsNasCodec, s6a: &paths, sm: &paths, s1ap: &paths };
        let mut ctx = MmeContext::new();
        let id = ctx.mme_ue_add(1, 1);

        let resp = IdentityResponse {
            mobile_identity: MobileIdentity::Imsi(ImsiIdentity::from_digits("001010000000001").unwrap()),
        };
        assert!(matches!(
            emm_handle_identity_response(&env, &mut ctx, id, &resp),
            Err(EmmError::UnexpectedMessage { state: EmmState::Unregistered, .. })
        ));
        assert!(paths.air.lock().unwrap().is_empty());
    }

    #[test]
    fn test_detach_in_unregistered_is_dropped() {
        let paths = Paths::default();
        let config = MmeConfig::default();
        let env = EmmEnv { config: &config, codec: &EpsNasCodec, s6a: &paths, sm: &paths, s1ap: &paths };
        let mut ctx = MmeContext::new();
        let id = ctx.mme_ue_add(1, 1);

        let req = DetachRequest {
            detach_type: DetachType { switch_off: false, value: 1 },
            nas_key_set_identifier: KeySetIdentifier::default(),
            eps_mobile_identity: MobileIdentity::Tmsi(1),
        };
        assert!(emm_handle_detach_request(&env, &mut ctx, id, &req).is_err());
        assert!(paths.downlink.lock().unwrap().is_empty());
    }

    #[test]
    fn test_emm_status_keeps_state() {
        let mut ctx = MmeContext::new();
        let id = ctx.mme_ue_add(1, 1);
        emm_handle_emm_status(&mut ctx, id, &EmmStatus { emm_cause: 0x62 }).unwrap();
        assert_eq!(ctx.mme_ue_find(id).unwrap().state(), EmmState::Unregistered);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "UE(mme-ue) context has already been removed")]
    fn test_missing_ue_is_loud_in_debug() {
        let mut ctx = MmeContext::new();
        let _ = emm_handle_emm_status(&mut ctx, 42, &EmmStatus { emm_cause: 0x62 });
    }
}
