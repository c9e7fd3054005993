//! Credential store: one record file per registered user.
//!
//! A user record lives at `<users_dir>/<username>.user` and holds two
//! newline-terminated `key=value` lines:
//!
//! ```text
//! username=<string>
//! password=<verifier>
//! ```
//!
//! The `password` value is an Argon2id PHC string, never the secret itself.
//! Records are created exactly once at signup and are immutable afterwards;
//! there is no update or delete path.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::instrument;

use crate::auth::password::{self, Argon2Params};
use crate::store::atomic;
use crate::store::errors::{Result, StoreError};

/// Usernames double as file names, so keep them well inside every
/// filesystem's limits.
const MAX_USERNAME_LENGTH: usize = 64;

/// Throwaway Argon2id hash verified when a username does not exist, so an
/// unknown user costs the same as a wrong password.
const DUMMY_VERIFIER: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// A persisted user record.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub verifier: String,
}

impl UserRecord {
    fn encode(&self) -> String {
        format!("username={}\npassword={}\n", self.username, self.verifier)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut username = None;
        let mut verifier = None;

        for line in content.lines() {
            match line.split_once('=') {
                Some(("username", value)) => username = Some(value.to_string()),
                Some(("password", value)) => verifier = Some(value.to_string()),
                _ => {}
            }
        }

        match (username, verifier) {
            (Some(username), Some(verifier)) => Ok(Self { username, verifier }),
            _ => Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: "missing username= or password= field".to_string(),
            }),
        }
    }
}

/// File-backed username -> verifier store.
///
/// `create_user` is the only mutator. Uniqueness is enforced by the
/// exclusive-create semantics of [`atomic::write_new`], not by a
/// check-then-write sequence, so two concurrent signups for one username
/// cannot both succeed.
pub struct CredentialStore {
    dir: PathBuf,
    params: Argon2Params,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>, params: Argon2Params) -> Self {
        Self {
            dir: dir.into(),
            params,
        }
    }

    fn user_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}.user"))
    }

    /// Register a new user.
    ///
    /// Fails with `InvalidInput` before touching storage when either field
    /// is unusable, and with `AlreadyExists` when the username is taken.
    #[instrument(skip_all, fields(username = %username), err)]
    pub async fn create_user(&self, username: &str, secret: &str) -> Result<()> {
        validate_username(username)?;
        if secret.is_empty() {
            return Err(StoreError::InvalidInput {
                message: "Password is required".to_string(),
            });
        }

        let params = self.params;
        let secret = secret.to_string();
        let verifier = tokio::task::spawn_blocking(move || password::hash_secret(&secret, params))
            .await
            .map_err(|e| anyhow::anyhow!("join password hashing task: {e}"))??;

        fs::create_dir_all(&self.dir).await?;

        let record = UserRecord {
            username: username.to_string(),
            verifier,
        };
        match atomic::write_new(&self.user_path(username), &record.encode()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists {
                username: username.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a username/secret pair against the stored record.
    ///
    /// Returns the username on success, `NotFound` for an unknown user and
    /// `InvalidCredentials` for a wrong secret. Callers that face end users
    /// are expected to collapse the last two into one message.
    #[instrument(skip_all, fields(username = %username), err(level = "debug"))]
    pub async fn verify(&self, username: &str, secret: &str) -> Result<String> {
        let record = match validate_username(username) {
            Ok(()) => self.get(username).await?,
            // A name we would never have stored cannot match; burn the same
            // verification work as the unknown-user path below.
            Err(_) => None,
        };

        let Some(record) = record else {
            let secret = secret.to_string();
            let _ = tokio::task::spawn_blocking(move || {
                password::verify_secret(&secret, DUMMY_VERIFIER)
            })
            .await;
            return Err(StoreError::NotFound);
        };

        let secret = secret.to_string();
        let verifier = record.verifier.clone();
        let matches = tokio::task::spawn_blocking(move || password::verify_secret(&secret, &verifier))
            .await
            .map_err(|e| anyhow::anyhow!("join password verification task: {e}"))??;

        if matches {
            Ok(record.username)
        } else {
            Err(StoreError::InvalidCredentials)
        }
    }

    /// Pure read of a user record; `Ok(None)` when the user does not exist.
    /// Callers are expected to have validated the username.
    async fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        let path = self.user_path(username);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(UserRecord::parse(&path, &content)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Validate a username for use as a record key (and therefore a file name).
fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(StoreError::InvalidInput {
            message: "Username is required".to_string(),
        });
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(StoreError::InvalidInput {
            message: format!("Username exceeds maximum length of {MAX_USERNAME_LENGTH} characters"),
        });
    }
    if username.starts_with('.') {
        return Err(StoreError::InvalidInput {
            message: "Username may not start with a dot".to_string(),
        });
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(StoreError::InvalidInput {
            message: "Username may only contain letters, digits, dots, underscores, and hyphens"
                .to_string(),
        });
    }
    Ok(())
}
