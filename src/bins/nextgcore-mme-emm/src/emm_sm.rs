//! EMM procedure state machine
//!
//! The per-UE state is explicit and every move goes through [`next`], a
//! pure transition table over `(state, trigger)`. Handlers fire a trigger
//! only after their side effects succeed; a trigger the table rejects is an
//! out-of-state message and leaves the UE where it was.

use std::fmt;

/// EMM State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EmmState {
    /// No procedure in progress, no security context
    #[default]
    Unregistered,
    /// Identity Request sent, waiting for IMSI
    IdentityPending,
    /// Waiting for the authentication vector or the Authentication Response
    AuthPending,
    /// Security Mode Command sent, waiting for the default bearer
    SecurityPending,
    /// Attach Accept sent, waiting for Attach Complete
    AttachCompletePending,
    /// Registered state
    Registered,
    /// Detach in progress
    Detaching,
}

impl EmmState {
    pub const ALL: [EmmState; 7] = [
        EmmState::Unregistered,
        EmmState::IdentityPending,
        EmmState::AuthPending,
        EmmState::SecurityPending,
        EmmState::AttachCompletePending,
        EmmState::Registered,
        EmmState::Detaching,
    ];
}

impl fmt::Display for EmmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmmState::Unregistered => write!(f, "UNREGISTERED"),
            EmmState::IdentityPending => write!(f, "IDENTITY_PENDING"),
            EmmState::AuthPending => write!(f, "AUTH_PENDING"),
            EmmState::SecurityPending => write!(f, "SECURITY_PENDING"),
            EmmState::AttachCompletePending => write!(f, "ATTACH_COMPLETE_PENDING"),
            EmmState::Registered => write!(f, "REGISTERED"),
            EmmState::Detaching => write!(f, "DETACHING"),
        }
    }
}

/// What moved the procedure forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmmTrigger {
    /// Attach Request carrying an IMSI
    AttachRequestImsi,
    /// Attach Request carrying a GUTI
    AttachRequestGuti,
    IdentityResponse,
    /// Authentication vector arrived from the home subscriber server
    AuthenticationVector,
    AuthenticationSuccess,
    AuthenticationFailure,
    /// Session management reported the default bearer
    DefaultBearerReady,
    AttachComplete,
    EmmStatus,
    DetachRequest,
    /// Local detach cleanup finished
    DetachComplete,
}

impl EmmTrigger {
    pub const ALL: [EmmTrigger; 11] = [
        EmmTrigger::AttachRequestImsi,
        EmmTrigger::AttachRequestGuti,
        EmmTrigger::IdentityResponse,
        EmmTrigger::AuthenticationVector,
        EmmTrigger::AuthenticationSuccess,
        EmmTrigger::AuthenticationFailure,
        EmmTrigger::DefaultBearerReady,
        EmmTrigger::AttachComplete,
        EmmTrigger::EmmStatus,
        EmmTrigger::DetachRequest,
        EmmTrigger::DetachComplete,
    ];
}

impl fmt::Display for EmmTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmmTrigger::AttachRequestImsi => write!(f, "ATTACH_REQUEST(IMSI)"),
            EmmTrigger::AttachRequestGuti => write!(f, "ATTACH_REQUEST(GUTI)"),
            EmmTrigger::IdentityResponse => write!(f, "IDENTITY_RESPONSE"),
            EmmTrigger::AuthenticationVector => write!(f, "AUTHENTICATION_VECTOR"),
            EmmTrigger::AuthenticationSuccess => write!(f, "AUTHENTICATION_SUCCESS"),
            EmmTrigger::AuthenticationFailure => write!(f, "AUTHENTICATION_FAILURE"),
            EmmTrigger::DefaultBearerReady => write!(f, "DEFAULT_BEARER_READY"),
            EmmTrigger::AttachComplete => write!(f, "ATTACH_COMPLETE"),
            EmmTrigger::EmmStatus => write!(f, "EMM_STATUS"),
            EmmTrigger::DetachRequest => write!(f, "DETACH_REQUEST"),
            EmmTrigger::DetachComplete => write!(f, "DETACH_COMPLETE"),
        }
    }
}

/// Transition table. `None` means the trigger is not valid in `state`.
pub fn next(state: EmmState, trigger: EmmTrigger) -> Option<EmmState> {
    use EmmState::*;
    use EmmTrigger::*;

    match (state, trigger) {
        // Attach restarts the procedure from anywhere but a running detach
        (Detaching, AttachRequestImsi | AttachRequestGuti) => None,
        (_, AttachRequestImsi) => Some(AuthPending),
        (_, AttachRequestGuti) => Some(IdentityPending),

        (IdentityPending, IdentityResponse) => Some(AuthPending),

        (AuthPending, AuthenticationVector) => Some(AuthPending),
        (AuthPending, AuthenticationFailure) => Some(AuthPending),
        (AuthPending, AuthenticationSuccess) => Some(SecurityPending),

        (SecurityPending, DefaultBearerReady) => Some(AttachCompletePending),
        (AttachCompletePending, AttachComplete) => Some(Registered),

        (s, EmmStatus) => Some(s),

        (Unregistered | Detaching, DetachRequest) => None,
        (_, DetachRequest) => Some(Detaching),
        (Detaching, DetachComplete) => Some(Unregistered),

        _ => None,
    }
}

/// EMM State Machine
#[derive(Debug, Clone, Default)]
pub struct EmmFsm {
    /// Current state
    state: EmmState,
    /// MME UE ID
    mme_ue_id: u64,
}

impl EmmFsm {
    /// Create a new EMM FSM
    pub fn new(mme_ue_id: u64) -> Self {
        Self { state: EmmState::Unregistered, mme_ue_id }
    }

    /// Get current state
    pub fn state(&self) -> EmmState {
        self.state
    }

    /// Whether `trigger` is accepted in the current state
    pub fn accepts(&self, trigger: EmmTrigger) -> bool {
        next(self.state, trigger).is_some()
    }

    /// Apply `trigger`; returns the new state, or `None` with the state
    /// unchanged when the table rejects it.
    pub fn fire(&mut self, trigger: EmmTrigger) -> Option<EmmState> {
        let new_state = next(self.state, trigger)?;
        if new_state != self.state {
            log::debug!(
                "EMM FSM [{}]: {} -> {} ({})",
                self.mme_ue_id,
                self.state,
                new_state,
                trigger
            );
        }
        self.state = new_state;
        Some(new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emm_fsm_attach_path() {
        let mut fsm = EmmFsm::new(1);
        assert_eq!(fsm.state(), EmmState::Unregistered);

        assert_eq!(fsm.fire(EmmTrigger::AttachRequestGuti), Some(EmmState::IdentityPending));
        assert_eq!(fsm.fire(EmmTrigger::IdentityResponse), Some(EmmState::AuthPending));
        assert_eq!(fsm.fire(EmmTrigger::AuthenticationVector), Some(EmmState::AuthPending));
        assert_eq!(fsm.fire(EmmTrigger::AuthenticationSuccess), Some(EmmState::SecurityPending));
        assert_eq!(
            fsm.fire(EmmTrigger::DefaultBearerReady),
            Some(EmmState::AttachCompletePending)
        );
        assert_eq!(fsm.fire(EmmTrigger::AttachComplete), Some(EmmState::Registered));
    }

    #[test]
    fn test_emm_fsm_detach_path() {
        let mut fsm = EmmFsm::new(2);
        assert_eq!(fsm.fire(EmmTrigger::DetachRequest), None);

        fsm.fire(EmmTrigger::AttachRequestImsi);
        assert_eq!(fsm.fire(EmmTrigger::DetachRequest), Some(EmmState::Detaching));
        assert!(!fsm.accepts(EmmTrigger::AttachRequestImsi));
        assert!(!fsm.accepts(EmmTrigger::DetachRequest));
        assert_eq!(fsm.fire(EmmTrigger::DetachComplete), Some(EmmState::Unregistered));
    }

    #[test]
    fn test_emm_fsm_rejects_out_of_state() {
        let mut fsm = EmmFsm::new(3);
        fsm.fire(EmmTrigger::AttachRequestImsi);

        assert_eq!(fsm.fire(EmmTrigger::AttachComplete), None);
        assert_eq!(fsm.fire(EmmTrigger::IdentityResponse), None);
        assert_eq!(fsm.fire(EmmTrigger::DefaultBearerReady), None);
        assert_eq!(fsm.state(), EmmState::AuthPending);
    }

    #[test]
    fn test_authentication_failure_stays_pending() {
        assert_eq!(
            next(EmmState::AuthPending, EmmTrigger::AuthenticationFailure),
            Some(EmmState::AuthPending)
        );
        assert_eq!(next(EmmState::Registered, EmmTrigger::AuthenticationFailure), None);
    }

    #[test]
    fn test_emm_status_never_moves() {
        for state in EmmState::ALL {
            assert_eq!(next(state, EmmTrigger::EmmStatus), Some(state));
        }
    }

    #[test]
    fn test_attach_restarts_from_any_state_but_detaching() {
        for state in EmmState::ALL {
            let expected = (state != EmmState::Detaching).then_some(EmmState::AuthPending);
            assert_eq!(next(state, EmmTrigger::AttachRequestImsi), expected, "{}", state);
        }
    }

    #[test]
    fn test_emm_state_display() {
        assert_eq!(EmmState::AttachCompletePending.to_string(), "ATTACH_COMPLETE_PENDING");
        assert_eq!(EmmTrigger::AttachRequestGuti.to_string(), "ATTACH_REQUEST(GUTI)");
    }
}
