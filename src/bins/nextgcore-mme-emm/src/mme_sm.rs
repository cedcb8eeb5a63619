//! MME EMM event dispatcher
//!
//! [`MmeEmm`] owns the configuration, the UE registry and the collaborator
//! paths. Events for one UE must be fed in order from a single consumer.

use chrono::{DateTime, FixedOffset, Local};
use ogs_nas::message::{EmmMessage, NasMessage};

use crate::config::MmeConfig;
use crate::context::MmeContext;
use crate::emm_handler::{self, EmmError, EmmResult};
use crate::event::MmeEvent;
use crate::nas_path::EmmEnv;
use crate::nas_security::{EpsNasCodec, NasCodec};
use crate::path::{S1apTransport, S6aClient, SessionManager};

/// Wall clock used for EMM Information
pub type Clock = Box<dyn Fn() -> DateTime<FixedOffset> + Send>;

/// Local time with its current UTC offset
pub fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

/// Route one decoded uplink EMM message to its handler.
pub fn emm_state_dispatch(
    env: &EmmEnv<'_>,
    ctx: &mut MmeContext,
    ue_id: u64,
    message: &NasMessage,
    clock: &dyn Fn() -> DateTime<FixedOffset>,
) -> EmmResult<()> {
    match &message.emm {
        EmmMessage::AttachRequest(m) => emm_handler::emm_handle_attach_request(env, ctx, ue_id, m),
        EmmMessage::IdentityResponse(m) => {
            emm_handler::emm_handle_identity_response(env, ctx, ue_id, m)
        }
        EmmMessage::AuthenticationResponse(m) => {
            emm_handler::emm_handle_authentication_response(env, ctx, ue_id, m)
        }
        EmmMessage::AttachComplete(m) => {
            emm_handler::emm_handle_attach_complete(env, ctx, ue_id, m, &clock())
        }
        EmmMessage::EmmStatus(m) => emm_handler::emm_handle_emm_status(ctx, ue_id, m),
        EmmMessage::DetachRequest(m) => emm_handler::emm_handle_detach_request(env, ctx, ue_id, m),
        EmmMessage::AttachAccept(_)
        | EmmMessage::IdentityRequest(_)
        | EmmMessage::AuthenticationRequest(_)
        | EmmMessage::SecurityModeCommand(_)
        | EmmMessage::EmmInformation(_)
        | EmmMessage::DetachAccept => {
            let message_type = message.emm.message_type();
            log::warn!("Downlink message [{:?}] received from UE", message_type);
            Err(EmmError::UnexpectedDirection(message_type as u8))
        }
    }
}

/// EMM procedure engine
pub struct MmeEmm {
    config: MmeConfig,
    context: MmeContext,
    codec: Box<dyn NasCodec>,
    s6a: Box<dyn S6aClient>,
    sm: Box<dyn SessionManager>,
    s1ap: Box<dyn S1apTransport>,
    clock: Clock,
}

impl MmeEmm {
    pub fn new(
        config: MmeConfig,
        s6a: Box<dyn S6aClient>,
        sm: Box<dyn SessionManager>,
        s1ap: Box<dyn S1apTransport>,
    ) -> Self {
        Self {
            config,
            context: MmeContext::new(),
            codec: Box::new(EpsNasCodec),
            s6a,
            sm,
            s1ap,
            clock: Box::new(local_now),
        }
    }

    pub fn with_codec(mut self, codec: Box<dyn NasCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MmeConfig {
        &self.config
    }

    pub fn context(&self) -> &MmeContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut MmeContext {
        &mut self.context
    }

    /// Handle one inbound event.
    pub fn handle(&mut self, event: MmeEvent) -> EmmResult<()> {
        let env = EmmEnv {
            config: &self.config,
            codec: self.codec.as_ref(),
            s6a: self.s6a.as_ref(),
            sm: self.sm.as_ref(),
            s1ap: self.s1ap.as_ref(),
        };
        let ctx = &mut self.context;
        let clock = &self.clock;

        match event {
            MmeEvent::InitialUeMessage { enb_id, enb_ue_s1ap_id, message } => {
                let ue_id = ctx.mme_ue_add(enb_id, enb_ue_s1ap_id);
                emm_state_dispatch(&env, ctx, ue_id, &message, clock)
            }
            MmeEvent::EmmMessage { ue_id, message } => {
                emm_state_dispatch(&env, ctx, ue_id, &message, clock)
            }
            MmeEvent::AuthenticationInformationAnswer { ue_id, vector } => {
                emm_handler::emm_handle_authentication_information_answer(&env, ctx, ue_id, &vector)
            }
            MmeEvent::DefaultBearerReady { ue_id, bearer_index, pdu } => {
                emm_handler::emm_handle_default_bearer_ready(&env, ctx, ue_id, bearer_index, pdu)
            }
            MmeEvent::UeContextReleaseComplete { ue_id } => {
                if !ctx.mme_ue_remove(ue_id) {
                    log::warn!("UE context {} already released", ue_id);
                }
                Ok(())
            }
            outbound => Err(EmmError::UnexpectedEvent(outbound.name())),
        }
    }

    /// Handle one inbound event; errors are logged and the event dropped.
    pub fn dispatch(&mut self, event: MmeEvent) {
        let name = event.name();
        if let Err(e) = self.handle(event) {
            log::warn!("{} dropped: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EnbBinding, MmeBearer};
    use crate::emm_sm::EmmState;
    use crate::path::PathResult;
    use bytes::Bytes;
    use ogs_nas::pkbuf::NasBuffer;
    use ogs_nas::types::PlmnId;

    struct Null;

    impl S6aClient for Null {
        fn request_authentication_vector(&self, _: u64, _: &str, _: &PlmnId) -> PathResult<()> {
            Ok(())
        }
    }

    impl SessionManager for Null {
        fn deliver(&self, _: u64, _: u32, _: NasBuffer) -> PathResult<()> {
            Ok(())
        }
    }

    impl S1apTransport for Null {
        fn send_downlink_nas(&self, _: &EnbBinding, _: NasBuffer) -> PathResult<()> {
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

    fn engine() -> MmeEmm {
        MmeEmm::new(MmeConfig::default(), Box::new(Null), Box::new(Null), Box::new(Null))
    }

    #[test]
    fn test_downlink_message_on_uplink() {
        let mut mme = engine();
        let id = mme.context_mut().mme_ue_add(1, 1);
        let event = MmeEvent::EmmMessage {
            ue_id: id,
            message: NasMessage::plain(EmmMessage::DetachAccept),
        };
        assert_eq!(mme.handle(event), Err(EmmError::UnexpectedDirection(0x46)));
    }

    #[test]
    fn test_outbound_event_is_rejected() {
        let mut mme = engine();
        let event = MmeEvent::DownlinkNasTransport { enb: EnbBinding::default(), pdu: Bytes::new() };
        assert_eq!(mme.handle(event), Err(EmmError::UnexpectedEvent("DOWNLINK_NAS_TRANSPORT")));
    }

    #[test]
    fn test_release_removes_context() {
        let mut mme = engine();
        let id = mme.context_mut().mme_ue_add(1, 1);
        mme.dispatch(MmeEvent::UeContextReleaseComplete { ue_id: id });
        assert!(mme.context().mme_ue_find(id).is_none());
        // second release is only logged
        assert!(mme.handle(MmeEvent::UeContextReleaseComplete { ue_id: id }).is_ok());
    }

    #[test]
    fn test_dispatch_drops_errors() {
        let mut mme = engine();
        let id = mme.context_mut().mme_ue_add(1, 1);
        mme.dispatch(MmeEvent::EmmMessage {
            ue_id: id,
            message: NasMessage::plain(EmmMessage::DetachAccept),
        });
        assert_eq!(mme.context().mme_ue_find(id).unwrap().state(), EmmState::Unregistered);
    }

    #[test]
    fn test_local_now_carries_offset() {
        let now = local_now();
        assert_eq!(now.offset().local_minus_utc() % 60, 0);
    }
}
