//! Authentication: credential verification, session issuance and the
//! per-request session gate.
//!
//! # Modules
//!
//! - [`password`]: Argon2id hashing and verification
//! - [`service`]: signup / login / logout state transitions over the stores
//! - [`guard`]: the per-request authority on session validity (sliding
//!   window, renewal, lazy expiry)

pub mod guard;
pub mod password;
pub mod service;

pub use guard::{Rejection, SessionGuard, SessionToken, Verdict};
pub use service::AuthService;
