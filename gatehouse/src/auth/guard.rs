//! Per-request session gate.
//!
//! Every protected resource asks the guard for a verdict on the presented
//! session identifier; the guard is the single authority on "is this
//! session currently valid". A session is valid while the gap between now
//! and its last successful validation stays within the configured timeout
//! (sliding window): exactly at the edge is still valid, one second past it
//! is not.
//!
//! ```text
//! no token ─────────────────────────────► Rejected(NoToken)
//! token ──lookup──► missing ────────────► Rejected(NotFound)
//!                   found ──too old────► delete record, Rejected(Expired)
//!                          ──in window─► touch record,  Accepted(username)
//! ```
//!
//! Expired records are removed on access, never by a timer; the optional
//! directory sweep reuses the same window arithmetic and only clears
//! records nobody presents anymore.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    AppState,
    errors::Result,
    store::{SessionStore, StoreError},
    types::abbrev_uuid,
};

/// Why a session was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The request carried no session identifier at all
    NoToken,
    /// No record exists for the presented identifier
    NotFound,
    /// The record existed but its sliding window had lapsed
    Expired,
}

/// Outcome of checking one presented session identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted {
        username: String,
        /// Seconds of window left, measured before any renewal.
        expires_in: i64,
    },
    Rejected(Rejection),
}

/// The per-request session gate.
pub struct SessionGuard {
    sessions: Arc<SessionStore>,
    timeout: Duration,
}

impl SessionGuard {
    pub fn new(sessions: Arc<SessionStore>, timeout: Duration) -> Self {
        Self { sessions, timeout }
    }

    /// Full verdict for a protected resource: renews `last_accessed_at` on
    /// acceptance, deletes the record on expiry.
    #[instrument(skip_all)]
    pub async fn authorize(&self, token: Option<&str>, now: DateTime<Utc>) -> Result<Verdict> {
        self.check(token, now, true).await
    }

    /// Verdict without renewal, for status reporting. Still performs the
    /// lazy delete when it finds an expired record.
    #[instrument(skip_all)]
    pub async fn inspect(&self, token: Option<&str>, now: DateTime<Utc>) -> Result<Verdict> {
        self.check(token, now, false).await
    }

    async fn check(&self, token: Option<&str>, now: DateTime<Utc>, renew: bool) -> Result<Verdict> {
        let Some(raw) = token else {
            return Ok(Verdict::Rejected(Rejection::NoToken));
        };
        // Anything that is not a UUID cannot name a record we issued.
        let Ok(id) = raw.parse::<Uuid>() else {
            debug!("presented session token is not a valid id");
            return Ok(Verdict::Rejected(Rejection::NotFound));
        };

        let Some(record) = self.sessions.get(id).await? else {
            return Ok(Verdict::Rejected(Rejection::NotFound));
        };

        let timeout = self.timeout.as_secs() as i64;
        let elapsed = now.timestamp() - record.last_accessed_at;

        if elapsed > timeout {
            debug!(session = %abbrev_uuid(&id), elapsed, "session expired, removing record");
            self.sessions.delete(id).await?;
            return Ok(Verdict::Rejected(Rejection::Expired));
        }

        if renew {
            match self.sessions.touch(id, now).await {
                Ok(()) => {}
                // Lost a race with logout between lookup and renewal; report
                // what the store now says.
                Err(StoreError::NotFound) => return Ok(Verdict::Rejected(Rejection::NotFound)),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Verdict::Accepted {
            username: record.username,
            expires_in: timeout - elapsed,
        })
    }
}

/// The raw session token from the request's `Cookie` header, if any.
///
/// Extraction never fails: handlers decide what an absent or invalid token
/// means for their endpoint (redirect, status body, no-op logout).
pub struct SessionToken(pub Option<String>);

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let cookie_name = &state.config.auth.session.cookie_name;

        let token = parts
            .headers
            .get(axum::http::header::COOKIE)
            .and_then(|header| header.to_str().ok())
            .and_then(|cookies| {
                cookies.split(';').find_map(|cookie| {
                    let (name, value) = cookie.trim().split_once('=')?;
                    (name == cookie_name && !value.is_empty()).then(|| value.to_string())
                })
            });

        Ok(SessionToken(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TIMEOUT: i64 = 1800;

    fn ts(offset: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap()
    }

    fn test_guard() -> (TempDir, Arc<SessionStore>, SessionGuard) {
        let tmp = TempDir::new().unwrap();
        let sessions = Arc::new(SessionStore::new(tmp.path().join("sessions")));
        let guard = SessionGuard::new(sessions.clone(), Duration::from_secs(TIMEOUT as u64));
        (tmp, sessions, guard)
    }

    #[tokio::test]
    async fn missing_token_is_rejected_without_store_access() {
        let (_tmp, _sessions, guard) = test_guard();
        let verdict = guard.authorize(None, ts(0)).await.unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::NoToken));
    }

    #[tokio::test]
    async fn unknown_and_malformed_tokens_are_not_found() {
        let (_tmp, _sessions, guard) = test_guard();

        let unknown = Uuid::new_v4().to_string();
        let verdict = guard.authorize(Some(&unknown), ts(0)).await.unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::NotFound));

        let verdict = guard.authorize(Some("../../etc/passwd"), ts(0)).await.unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::NotFound));
    }

    #[tokio::test]
    async fn sliding_window_is_boundary_exact() {
        let (_tmp, sessions, guard) = test_guard();
        let id = sessions.create("alice", ts(0)).await.unwrap();
        let token = id.to_string();

        // Exactly at the edge of the window: still valid, and renewed.
        let verdict = guard.authorize(Some(&token), ts(TIMEOUT)).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Accepted {
                username: "alice".to_string(),
                expires_in: 0,
            }
        );
        let record = sessions.get(id).await.unwrap().unwrap();
        assert_eq!(record.last_accessed_at, ts(TIMEOUT).timestamp());

        // One second past the renewed edge: expired, record gone.
        let later = TIMEOUT + TIMEOUT + 1;
        let verdict = guard.authorize(Some(&token), ts(later)).await.unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::Expired));
        assert!(sessions.get(id).await.unwrap().is_none());

        // And a re-presentation of the same token now reads as unknown.
        let verdict = guard.authorize(Some(&token), ts(later)).await.unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::NotFound));
    }

    #[tokio::test]
    async fn each_acceptance_resets_the_window() {
        let (_tmp, sessions, guard) = test_guard();
        let id = sessions.create("alice", ts(0)).await.unwrap();
        let token = id.to_string();

        // Keep validating at 1500s intervals; the session outlives many
        // multiples of the timeout because each check renews it.
        for i in 1..=5 {
            let verdict = guard.authorize(Some(&token), ts(i * 1500)).await.unwrap();
            assert!(matches!(verdict, Verdict::Accepted { .. }), "at step {i}");
        }
    }

    #[tokio::test]
    async fn accepted_reports_remaining_window_before_renewal() {
        let (_tmp, sessions, guard) = test_guard();
        let id = sessions.create("alice", ts(0)).await.unwrap();

        let verdict = guard.authorize(Some(&id.to_string()), ts(600)).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Accepted {
                username: "alice".to_string(),
                expires_in: TIMEOUT - 600,
            }
        );
    }

    #[tokio::test]
    async fn inspect_does_not_renew() {
        let (_tmp, sessions, guard) = test_guard();
        let id = sessions.create("alice", ts(0)).await.unwrap();

        let verdict = guard.inspect(Some(&id.to_string()), ts(600)).await.unwrap();
        assert!(matches!(verdict, Verdict::Accepted { .. }));

        let record = sessions.get(id).await.unwrap().unwrap();
        assert_eq!(record.last_accessed_at, ts(0).timestamp());
    }

    #[tokio::test]
    async fn inspect_still_deletes_expired_records() {
        let (_tmp, sessions, guard) = test_guard();
        let id = sessions.create("alice", ts(0)).await.unwrap();

        let verdict = guard.inspect(Some(&id.to_string()), ts(TIMEOUT + 1)).await.unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::Expired));
        assert!(sessions.get(id).await.unwrap().is_none());
    }
}
