//! Axum route handlers.
//!
//! Handlers hand normalized values (typed form fields, the raw cookie
//! token) to the auth service and session guard, and translate their
//! results back into responses. No auth decision is made here.

pub mod auth;
pub mod health;
pub mod session;
