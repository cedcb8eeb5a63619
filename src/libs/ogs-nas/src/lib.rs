//! NextGCore EPS NAS Library
//!
//! Decoded EPS NAS (TS 24.301) message model used by the MME EMM engine:
//!
//! - EMM message sum type and NAS headers ([`message`])
//! - Information element value types ([`types`])
//! - Mobile identity and IMSI BCD conversion ([`identity`])
//! - Headroom-reserving packet buffer ([`pkbuf`])
//! - Plain (unprotected) encoder for downlink EMM messages ([`encode`])
//!
//! # Example
//!
//! ```rust
//! use ogs_nas::identity::ImsiIdentity;
//!
//! let imsi = ImsiIdentity::from_digits("001010000000001").unwrap();
//! assert_eq!(imsi.digits().unwrap(), "001010000000001");
//! ```

pub mod error;
pub mod types;
pub mod identity;
pub mod message;
pub mod pkbuf;
pub mod encode;


pub use error::{NasError, NasResult};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{NasError, NasResult};
    pub use crate::types::{
        protocol_discriminator,
        SecurityHeaderType,
        PlmnId,
        EpsTai,
        EpsGuti,
        UeNetworkCapability,
        MsNetworkCapability,
        UeSecurityCapability,
        KeySetIdentifier,
        SecurityAlgorithms,
        DetachType,
        DetachKind,
        GprsTimer,
        TimeZoneAndTime,
        EsmMessageContainer,
    };
    pub use crate::identity::{MobileIdentity, ImsiIdentity, IdentityType};
    pub use crate::message::{
        EmmMessage,
        EmmMessageType,
        NasMessage,
        EsmHeader,
        AttachRequest,
        AttachAccept,
        AttachComplete,
        IdentityRequest,
        IdentityResponse,
        AuthenticationRequest,
        AuthenticationResponse,
        SecurityModeCommand,
        EmmInformation,
        EmmStatus,
        DetachRequest,
    };
    pub use crate::pkbuf::{NasBuffer, NAS_HEADROOM};
    pub use crate::encode::encode_emm_message;
}
