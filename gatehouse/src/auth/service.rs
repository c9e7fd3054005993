//! Signup, login and logout orchestration over the two stores.
//!
//! Each operation is one small state transition: signup writes a credential
//! record, login verifies one and issues a session, logout revokes a
//! session. The service holds no state of its own beyond handles to the
//! stores.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::{
    errors::{Error, Result},
    store::{CredentialStore, SessionStore, StoreError},
    types::{SessionId, abbrev_uuid},
};

pub struct AuthService {
    users: Arc<CredentialStore>,
    sessions: Arc<SessionStore>,
}

impl AuthService {
    pub fn new(users: Arc<CredentialStore>, sessions: Arc<SessionStore>) -> Self {
        Self { users, sessions }
    }

    /// Register a new user. On success the user can immediately log in;
    /// no session is issued here.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn signup(&self, username: &str, secret: &str) -> Result<()> {
        self.users.create_user(username, secret).await?;
        info!("user registered");
        Ok(())
    }

    /// Verify credentials and issue a fresh session id on success.
    ///
    /// No session is created on any verification failure.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn login(&self, username: &str, secret: &str, now: DateTime<Utc>) -> Result<SessionId> {
        if username.is_empty() || secret.is_empty() {
            return Err(Error::BadRequest {
                message: "Username and password are required".to_string(),
            });
        }

        let username = match self.users.verify(username, secret).await {
            Ok(username) => username,
            Err(cause @ (StoreError::NotFound | StoreError::InvalidCredentials)) => {
                // The distinction stays in the logs; the caller gets one
                // answer for both.
                debug!(%cause, "login rejected");
                return Err(Error::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let id = self.sessions.create(&username, now).await?;
        info!(session = %abbrev_uuid(&id), "session issued");
        Ok(id)
    }

    /// Revoke the presented session, if any. Always succeeds from the
    /// caller's point of view: absent, malformed and already-deleted tokens
    /// are all no-ops.
    #[instrument(skip_all)]
    pub async fn logout(&self, token: Option<&str>) -> Result<()> {
        let Some(raw) = token else {
            return Ok(());
        };
        let Ok(id) = raw.parse::<SessionId>() else {
            return Ok(());
        };

        self.sessions.delete(id).await?;
        debug!(session = %abbrev_uuid(&id), "session revoked");
        Ok(())
    }
}
