//! File-backed persistence for credentials and sessions.
//!
//! Both stores keep one newline-terminated `key=value` record file per
//! entity under their own directory and are the only components allowed to
//! mutate that state. All writes go through the atomic primitives in
//! [`atomic`], so readers never observe a partial record and concurrent
//! writers cannot tear one.
//!
//! - [`users::CredentialStore`]: username -> password verifier, created once
//!   at signup, immutable afterwards.
//! - [`sessions::SessionStore`]: session id -> session record, with
//!   `last_accessed_at` as the single mutable field.

mod atomic;
pub mod errors;
pub mod sessions;
pub mod users;

pub use errors::StoreError;
pub use sessions::{SessionRecord, SessionStore};
pub use users::{CredentialStore, UserRecord};
