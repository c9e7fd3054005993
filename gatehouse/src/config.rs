//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The configuration file path defaults to `config.yaml` but can
//! be specified via `-f` flag or `GATEHOUSE_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources
//! override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `GATEHOUSE_`
//!    override YAML values
//!
//! For nested config values, use double underscores in environment
//! variables. For example, `GATEHOUSE_AUTH__SESSION__TIMEOUT=45m` sets the
//! `auth.session.timeout` field.
//!
//! ## Example
//!
//! ```yaml
//! host: 0.0.0.0
//! port: 8080
//! login_page: /login.html
//! data:
//!   users_dir: /var/lib/gatehouse/users
//!   sessions_dir: /var/lib/gatehouse/sessions
//! auth:
//!   session:
//!     timeout: 30m
//!     sweep:
//!       enabled: true
//!       interval: 5m
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::auth::password::Argon2Params;
use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "GATEHOUSE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment
/// variables. All fields have sensible defaults defined in the `Default`
/// implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Where requests rejected by the session guard are redirected
    pub login_page: String,
    /// Storage directories for the two record stores
    pub data: DataConfig,
    /// Authentication configuration
    pub auth: AuthConfig,
}

/// Storage directories. Created on first use, not at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Directory holding one `<username>.user` record per registered user
    pub users_dir: PathBuf,
    /// Directory holding one `<session_id>.session` record per live session
    pub sessions_dir: PathBuf,
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Password validation rules and hashing cost
    pub password: PasswordConfig,
    /// Session window and cookie configuration
    pub session: SessionConfig,
}

/// Password validation rules and Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB, secure for production)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2, secure for production)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl PasswordConfig {
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }
}

/// Session window and cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Sliding-window session timeout; every successful validation resets
    /// the clock. Also sent as the cookie's Max-Age hint.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name carrying the session id
    pub cookie_name: String,
    /// Set the Secure flag on issued cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none"); omitted from
    /// the cookie when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie_same_site: Option<String>,
    /// Background cleanup of records nobody presents anymore
    pub sweep: SweepConfig,
}

/// Optional background sweep of expired session records.
///
/// Expiry is detected on access either way; the sweep only reclaims disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    /// Enable the periodic sweep
    pub enabled: bool,
    /// Time between sweeps
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            login_page: "/login.html".to_string(),
            data: DataConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            users_dir: PathBuf::from("./data/users"),
            sessions_dir: PathBuf::from("./data/sessions"),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 1,
            max_length: 128,
            // Secure defaults for production (Argon2id RFC recommendations)
            argon2_memory_kib: 19456, // 19 MB
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60), // 30 minutes
            cookie_name: "session_id".to_string(),
            cookie_secure: false,
            cookie_same_site: None,
            sweep: SweepConfig::default(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(5 * 60),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values.
            // GATEHOUSE_CONFIG names the file itself and is not a field.
            .merge(Env::prefixed("GATEHOUSE_").ignore(&["config"]).split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.data.users_dir == self.data.sessions_dir {
            return Err(Error::Internal {
                operation: "Config validation: users_dir and sessions_dir must be distinct directories".to_string(),
            });
        }

        if self.auth.session.timeout < Duration::from_secs(1) {
            return Err(Error::Internal {
                operation: "Config validation: auth.session.timeout must be at least 1 second".to_string(),
            });
        }

        if let Some(same_site) = &self.auth.session.cookie_same_site {
            if !matches!(same_site.to_ascii_lowercase().as_str(), "strict" | "lax" | "none") {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: auth.session.cookie_same_site must be strict, lax or none, got {same_site:?}"
                    ),
                });
            }
        }

        let password = &self.auth.password;
        if password.min_length == 0 || password.min_length > password.max_length {
            return Err(Error::Internal {
                operation: "Config validation: auth.password.min_length must be between 1 and max_length".to_string(),
            });
        }

        if self.auth.session.sweep.enabled && self.auth.session.sweep.interval < Duration::from_secs(1) {
            return Err(Error::Internal {
                operation: "Config validation: auth.session.sweep.interval must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
