//! NextGCore MME EPS Mobility Management Library
//!
//! This crate implements the EMM procedure engine of the MME:
//! - Attach (IMSI and GUTI), identification and authentication
//! - NAS security mode control and protected downlink encoding
//! - Default bearer setup hand-off and Attach Complete
//! - UE initiated detach
//!
//! S1AP, S6a and ESM are reached through the traits in [`path`].

pub mod config;
pub mod context;
pub mod security;
pub mod emm_sm;
pub mod emm_build;
pub mod nas_security;
pub mod event;
pub mod path;
pub mod nas_path;
pub mod emm_handler;
pub mod mme_sm;

#[cfg(test)]
mod property_tests;

// Re-export commonly used types
pub use config::{ConfigError, MmeConfig};
pub use context::{MmeContext, MmeUe};
pub use emm_handler::{EmmError, EmmResult};
pub use emm_sm::{EmmState, EmmTrigger};
pub use event::{AuthenticationVector, MmeEvent, SessionPdu};
pub use mme_sm::MmeEmm;
pub use path::{EventQueue, S1apTransport, S6aClient, SessionManager};
