//! Property-Based Tests for the EMM engine
//!
//! Transition table, RES verification and secured NAS framing.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::emm_build::{security_header_for, HeaderPolicy};
    use crate::emm_sm::{next, EmmFsm, EmmState, EmmTrigger};
    use crate::nas_security::{nas_eps_security_encode, NAS_SECURITY_HEADER_LEN};
    use crate::security::SecurityContext;
    use ogs_crypt::eps::NAS_SECURITY_ALGORITHM_AES;
    use ogs_nas::message::{EmmMessage, EmmMessageType, EmmStatus};
    use ogs_nas::types::SecurityHeaderType;

    // ========================================================================
    // Strategies for generating test data
    // ========================================================================

    fn arb_emm_state() -> impl Strategy<Value = EmmState> {
        prop::sample::select(EmmState::ALL.to_vec())
    }

    fn arb_emm_trigger() -> impl Strategy<Value = EmmTrigger> {
        prop::sample::select(EmmTrigger::ALL.to_vec())
    }

    fn arb_message_type() -> impl Strategy<Value = EmmMessageType> {
        prop_oneof![
            Just(EmmMessageType::AttachRequest),
            Just(EmmMessageType::AttachAccept),
            Just(EmmMessageType::AttachComplete),
            Just(EmmMessageType::AttachReject),
            Just(EmmMessageType::DetachRequest),
            Just(EmmMessageType::DetachAccept),
            Just(EmmMessageType::AuthenticationRequest),
            Just(EmmMessageType::AuthenticationResponse),
            Just(EmmMessageType::IdentityRequest),
            Just(EmmMessageType::IdentityResponse),
            Just(EmmMessageType::SecurityModeCommand),
            Just(EmmMessageType::SecurityModeComplete),
            Just(EmmMessageType::EmmStatus),
            Just(EmmMessageType::EmmInformation),
        ]
    }

    fn keyed_context() -> SecurityContext {
        let mut sec = SecurityContext::new();
        sec.store_authentication_vector(&[0x11; 16], &[0x22; 16], &[0x33; 8]).unwrap();
        sec.set_kasme(&[0x44; 32]);
        sec.derive_nas_keys(NAS_SECURITY_ALGORITHM_AES, NAS_SECURITY_ALGORITHM_AES).unwrap();
        sec
    }

    // ========================================================================
    // Property: transition table
    // ========================================================================

    proptest! {
        #[test]
        fn prop_emm_status_keeps_state(state in arb_emm_state()) {
            prop_assert_eq!(next(state, EmmTrigger::EmmStatus), Some(state));
        }

        #[test]
        fn prop_detaching_only_leaves_on_detach_complete(trigger in arb_emm_trigger()) {
            match next(EmmState::Detaching, trigger) {
                Some(s) if s != EmmState::Detaching => {
                    prop_assert_eq!(trigger, EmmTrigger::DetachComplete);
                    prop_assert_eq!(s, EmmState::Unregistered);
                }
                _ => {}
            }
        }

        #[test]
        fn prop_registered_only_via_attach_complete(
            state in arb_emm_state(),
            trigger in arb_emm_trigger(),
        ) {
            if state != EmmState::Registered && next(state, trigger) == Some(EmmState::Registered) {
                prop_assert_eq!(state, EmmState::AttachCompletePending);
                prop_assert_eq!(trigger, EmmTrigger::AttachComplete);
            }
        }

        #[test]
        fn prop_fsm_follows_table(triggers in prop::collection::vec(arb_emm_trigger(), 0..16)) {
            let mut fsm = EmmFsm::new(1);
            for trigger in triggers {
                let before = fsm.state();
                let expected = next(before, trigger);
                prop_assert_eq!(fsm.fire(trigger), expected);
                prop_assert_eq!(fsm.state(), expected.unwrap_or(before));
            }
        }

        #[test]
        fn prop_header_selection_is_pure(message_type in arb_message_type()) {
            prop_assert_eq!(security_header_for(message_type), security_header_for(message_type));
            if let Some(HeaderPolicy::Fixed(sht)) = security_header_for(message_type) {
                prop_assert!(matches!(
                    sht,
                    SecurityHeaderType::Plain
                        | SecurityHeaderType::IntegrityProtectedNewContext
                        | SecurityHeaderType::IntegrityProtectedAndCiphered
                ));
            }
        }
    }

    // ========================================================================
    // Property: RES verification
    // ========================================================================

    proptest! {
        #[test]
        fn prop_verify_response_accepts_only_xres(
            xres in prop::collection::vec(any::<u8>(), 4..=16),
            res in prop::collection::vec(any::<u8>(), 0..=16),
        ) {
            let mut sec = SecurityContext::new();
            sec.store_authentication_vector(&[0; 16], &[0; 16], &xres).unwrap();
            prop_assert!(sec.verify_response(&xres).is_ok());
            prop_assert_eq!(sec.verify_response(&res).is_ok(), res == xres);
        }

        #[test]
        fn prop_invalid_xres_length_is_rejected(
            xres in prop::collection::vec(any::<u8>(), 17..40),
        ) {
            let mut sec = SecurityContext::new();
            prop_assert!(sec.store_authentication_vector(&[0; 16], &[0; 16], &xres).is_err());
            prop_assert!(!sec.has_authentication_vector());
        }
    }

    // ========================================================================
    // Property: secured NAS framing
    // ========================================================================

    proptest! {
        #[test]
        fn prop_secured_frame_layout(dl_count in 0u32..0x0100_0000, cause in any::<u8>()) {
            let mut sec = keyed_context();
            sec.dl_count = dl_count;

            let emm = EmmMessage::EmmStatus(EmmStatus { emm_cause: cause });
            let buf = nas_eps_security_encode(
                &mut sec,
                SecurityHeaderType::IntegrityProtectedAndCiphered,
                &emm,
            ).unwrap();

            let data = buf.data();
            prop_assert_eq!(data[0], 0x27);
            prop_assert_eq!(data[NAS_SECURITY_HEADER_LEN - 1], (dl_count & 0xff) as u8);
            // plain EMM STATUS is 3 octets
            prop_assert_eq!(data.len(), NAS_SECURITY_HEADER_LEN + 3);
            prop_assert_eq!(sec.dl_count, (dl_count + 1) & 0x00ff_ffff);
        }

        #[test]
        fn prop_new_context_restarts_counts(dl_count in 1u32..0x0100_0000, ul_count in any::<u32>()) {
            let mut sec = keyed_context();
            sec.dl_count = dl_count;
            sec.ul_count = ul_count;

            let emm = EmmMessage::EmmStatus(EmmStatus { emm_cause: 0 });
            let buf = nas_eps_security_encode(
                &mut sec,
                SecurityHeaderType::IntegrityProtectedNewContext,
                &emm,
            ).unwrap();

            prop_assert_eq!(buf.data()[NAS_SECURITY_HEADER_LEN - 1], 0);
            prop_assert_eq!(sec.dl_count, 1);
            prop_assert_eq!(sec.ul_count, 0);
        }
    }
}
