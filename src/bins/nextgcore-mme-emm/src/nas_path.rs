//! NAS Path Functions
//!
//! Every downlink send runs the same chain: build the structured message,
//! encode it under its security header, hand the buffer to S1AP. A failing
//! step drops the buffer and stops the chain.

use chrono::{DateTime, FixedOffset};
use ogs_nas::message::{EsmHeader, NasMessage};
use ogs_nas::pkbuf::NasBuffer;
use ogs_nas::types::{EpsGuti, EsmMessageContainer};

use crate::config::MmeConfig;
use crate::context::{EnbBinding, MmeBearer, MmeUe, EBI_UNASSIGNED, PTI_UNASSIGNED};
use crate::emm_build;
use crate::emm_handler::{EmmError, EmmResult};
use crate::event::SessionPdu;
use crate::nas_security::NasCodec;
use crate::path::{S1apTransport, S6aClient, SessionManager};
use crate::security::{SecurityContext, SecurityError, SecurityResult};

/// Configuration and collaborators a handler works against
pub struct EmmEnv<'a> {
    pub config: &'a MmeConfig,
    pub codec: &'a dyn NasCodec,
    pub s6a: &'a dyn S6aClient,
    pub sm: &'a dyn SessionManager,
    pub s1ap: &'a dyn S1apTransport,
}

fn enb_binding(mme_ue: &MmeUe) -> EmmResult<EnbBinding> {
    debug_assert!(mme_ue.enb.is_some(), "S1 context has already been removed");
    mme_ue.enb.ok_or_else(|| {
        log::error!("S1 context has already been removed");
        EmmError::NoEnbBinding(mme_ue.id)
    })
}

/// Plain headers take the plain encoder, everything else the secured one.
pub fn nas_eps_encode(
    codec: &dyn NasCodec,
    message: &NasMessage,
    security: &mut SecurityContext,
) -> SecurityResult<NasBuffer> {
    if message.security_header_type.is_protected() {
        codec.encode_secured(message, security)
    } else {
        codec.encode_plain(&message.emm)
    }
}

/// Send a composed message as downlink NAS transport
pub fn nas_eps_send_to_downlink_nas_transport(
    env: &EmmEnv<'_>,
    mme_ue: &mut MmeUe,
    message: &NasMessage,
) -> EmmResult<()> {
    let enb = enb_binding(mme_ue)?;
    let pdu = nas_eps_encode(env.codec, message, &mut mme_ue.security)?;
    env.s1ap.send_downlink_nas(&enb, pdu)?;
    Ok(())
}

/// Forward an ESM message container to session management.
///
/// The bearer is found by EBI when only the EBI is set, by PTI when only
/// the PTI is set; otherwise, or when nothing matches, a new bearer keyed
/// by the PTI is created. Returns the bearer the PDU went to.
pub fn nas_eps_send_emm_to_esm(
    sm: &dyn SessionManager,
    mme_ue: &mut MmeUe,
    esm_message_container: &EsmMessageContainer,
) -> EmmResult<MmeBearer> {
    if esm_message_container.is_empty() {
        log::error!("Invalid ESM Message Container");
        return Err(EmmError::EmptyEsmContainer);
    }

    let h = EsmHeader::peek(&esm_message_container.buffer).map_err(|e| {
        log::error!("Invalid ESM Message Container: {}", e);
        EmmError::Nas(e)
    })?;
    let ebi = h.eps_bearer_identity;
    let pti = h.procedure_transaction_identity;

    let found = if pti == PTI_UNASSIGNED && ebi != EBI_UNASSIGNED {
        mme_ue.bearers.find_by_ebi(ebi).copied()
    } else if ebi == EBI_UNASSIGNED && pti != PTI_UNASSIGNED {
        mme_ue.bearers.find_by_pti(pti).copied()
    } else {
        None
    };
    let (bearer, created) = match found {
        Some(bearer) => (bearer, false),
        None => (mme_ue.bearers.add(pti), true),
    };

    log::debug!(
        "[{}] EMM -> ESM[EBI:{} PTI:{}] len={}",
        mme_ue.imsi_bcd.as_str(),
        ebi,
        pti,
        esm_message_container.len()
    );

    let pdu = NasBuffer::copy_from(&esm_message_container.buffer);
    if let Err(e) = sm.deliver(mme_ue.id, bearer.index, pdu) {
        if created {
            mme_ue.bearers.remove(bearer.index);
        }
        return Err(e.into());
    }
    Ok(bearer)
}

/// Send identity request message (plain)
pub fn nas_eps_send_identity_request(env: &EmmEnv<'_>, mme_ue: &mut MmeUe) -> EmmResult<()> {
    log::debug!("Identity request");

    let message = emm_build::build_identity_request();
    nas_eps_send_to_downlink_nas_transport(env, mme_ue, &message)
}

/// Send authentication request message (plain)
pub fn nas_eps_send_authentication_request(
    env: &EmmEnv<'_>,
    mme_ue: &mut MmeUe,
) -> EmmResult<()> {
    log::debug!("[{}] Authentication request", mme_ue.imsi_bcd.as_str());

    let message = emm_build::build_authentication_request(mme_ue);
    nas_eps_send_to_downlink_nas_transport(env, mme_ue, &message)
}

/// Send security mode command message (integrity protected, new context)
pub fn nas_eps_send_security_mode_command(
    env: &EmmEnv<'_>,
    mme_ue: &mut MmeUe,
) -> EmmResult<()> {
    log::info!("[{}] Security mode command", mme_ue.imsi_bcd.as_str());

    let message = emm_build::build_security_mode_command(mme_ue);
    nas_eps_send_to_downlink_nas_transport(env, mme_ue, &message)
}

/// Send attach accept message piggybacked on initial context setup
pub fn nas_eps_send_attach_accept(
    env: &EmmEnv<'_>,
    mme_ue: &mut MmeUe,
    guti: &EpsGuti,
    bearer: &MmeBearer,
    pdu: SessionPdu,
) -> EmmResult<()> {
    let enb = enb_binding(mme_ue)?;
    let kenb = *mme_ue.security.kenb().ok_or(SecurityError::KenbMissing)?;

    log::info!("[{}] Attach accept", mme_ue.imsi_bcd.as_str());

    let message = emm_build::build_attach_accept(
        env.config,
        guti,
        EsmMessageContainer::new(pdu.bytes),
        pdu.security_header_type,
    );
    let emm_message = nas_eps_encode(env.codec, &message, &mut mme_ue.security)?;
    env.s1ap.setup_initial_context(&enb, bearer, &kenb, emm_message)?;
    Ok(())
}

/// Send EMM information message (integrity protected and ciphered)
pub fn nas_eps_send_emm_information(
    env: &EmmEnv<'_>,
    mme_ue: &mut MmeUe,
    now: &DateTime<FixedOffset>,
) -> EmmResult<()> {
    log::info!("[{}] EMM information", mme_ue.imsi_bcd.as_str());

    let message = emm_build::build_emm_information(now);
    nas_eps_send_to_downlink_nas_transport(env, mme_ue, &message)
}

/// Send detach accept message (integrity protected and ciphered)
pub fn nas_eps_send_detach_accept(env: &EmmEnv<'_>, mme_ue: &mut MmeUe) -> EmmResult<()> {
    log::info!("[{}] Detach accept", mme_ue.imsi_bcd.as_str());

    let message = emm_build::build_detach_accept();
    nas_eps_send_to_downlink_nas_transport(env, mme_ue, &message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EnbBinding;
    use crate::path::{PathError, PathResult};
    use ogs_nas::types::PlmnId;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        delivered: Mutex<Vec<(u32, Vec<u8>)>>,
        downlink: Mutex<Vec<Vec<u8>>>,
        fail_deliver: bool,
    }

    impl SessionManager for Recorder {
        fn deliver(&self, _ue_id: u64, bearer_index: u32, pdu: NasBuffer) -> PathResult<()> {
            if self.fail_deliver {
                return Err(PathError::Rejected("session management"));
            }
            assert!(pdu.headroom() > 0);
            self.delivered.lock().unwrap().push((bearer_index, pdu.data().to_vec()));
            Ok(())
        }
    }

    impl S6aClient for Recorder {
        fn request_authentication_vector(&self, _: u64, _: &str, _: &PlmnId) -> PathResult<()> {
            Ok(())
        }
    }

    impl S1apTransport for Recorder {
        fn send_downlink_nas(&self, _enb: &EnbBinding, pdu: NasBuffer) -> PathResult<()> {
            self.downlink.lock().unwrap().push(pdu.data().to_vec());
            Ok(())
        }

        fn setup_initial_context(
            &self,
            _enb: &EnbBinding,
            _bearer: &MmeBearer,
            _kenb: &[u8; 32],
            _pdu: NasBuffer,
        ) -> PathResult<()> {
            Ok(())
        }
    }

    fn bound_ue() -> MmeUe {
        MmeUe { id: 1, enb: Some(EnbBinding::default()), ..Default::default() }
    }

    #[test]
    fn test_relay_creates_bearer_by_pti() {
        let sm = Recorder::default();
        let mut ue = bound_ue();
        // EBI 0, PD ESM, PTI 1, PDN connectivity request
        let container = EsmMessageContainer::new(vec![0x02, 0x01, 0xd0, 0x11]);

        let first = nas_eps_send_emm_to_esm(&sm, &mut ue, &container).unwrap();
        assert_eq!(first.pti, 1);
        let again = nas_eps_send_emm_to_esm(&sm, &mut ue, &container).unwrap();
        assert_eq!(again.index, first.index);
        assert_eq!(ue.bearers.len(), 1);

        let delivered = sm.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0], (first.index, vec![0x02, 0x01, 0xd0, 0x11]));
    }

    #[test]
    fn test_relay_ambiguous_header_creates_new_bearer() {
        let sm = Recorder::default();
        let mut ue = bound_ue();
        // EBI 5 and PTI 1 both set
        let container = EsmMessageContainer::new(vec![0x52, 0x01, 0xc2]);
        let a = nas_eps_send_emm_to_esm(&sm, &mut ue, &container).unwrap();
        let b = nas_eps_send_emm_to_esm(&sm, &mut ue, &container).unwrap();
        assert_ne!(a.index, b.index);
    }

    #[test]
    fn test_relay_rejects_bad_container() {
        let sm = Recorder::default();
        let mut ue = bound_ue();
        assert_eq!(
            nas_eps_send_emm_to_esm(&sm, &mut ue, &EsmMessageContainer::default()),
            Err(EmmError::EmptyEsmContainer)
        );
        assert!(matches!(
            nas_eps_send_emm_to_esm(&sm, &mut ue, &EsmMessageContainer::new(vec![0x02])),
            Err(EmmError::Nas(_))
        ));
        assert!(ue.bearers.is_empty());
        assert!(sm.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_relay_failure_leaves_no_bearer() {
        let sm = Recorder { fail_deliver: true, ..Default::default() };
        let mut ue = bound_ue();
        let container = EsmMessageContainer::new(vec![0x02, 0x01, 0xd0]);
        assert!(matches!(
            nas_eps_send_emm_to_esm(&sm, &mut ue, &container),
            Err(EmmError::Path(PathError::Rejected(_)))
        ));
        assert!(ue.bearers.is_empty());
    }

    #[test]
    fn test_send_identity_request_is_plain() {
        let rec = Recorder::default();
        let config = MmeConfig::default();
        let codec = crate::nas_security::EpsNasCodec;
        let env = EmmEnv { config: &config, codec: &codec, s6a: &rec, sm: &rec, s1ap: &rec };
        let mut ue = bound_ue();

        nas_eps_send_identity_request(&env, &mut ue).unwrap();
        assert_eq!(rec.downlink.lock().unwrap()[0], vec![0x07, 0x55, 0x01]);
    }

    #[test]
    fn test_secured_send_without_keys_sends_nothing() {
        let rec = Recorder::default();
        let config = MmeConfig::default();
        let codec = crate::nas_security::EpsNasCodec;
        let env = EmmEnv { config: &config, codec: &codec, s6a: &rec, sm: &rec, s1ap: &rec };
        let mut ue = bound_ue();

        assert_eq!(
            nas_eps_send_detach_accept(&env, &mut ue),
            Err(EmmError::Security(SecurityError::NasKeysMissing))
        );
        assert!(rec.downlink.lock().unwrap().is_empty());
    }
}
