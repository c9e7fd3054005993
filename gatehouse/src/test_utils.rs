//! Shared constructors for unit tests.

use std::path::Path;

use axum::Router;

use crate::{AppState, Application, Config};

/// Config pointing at directories under `root`, with Argon2 turned down so
/// tests stay fast.
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.data.users_dir = root.join("users");
    config.data.sessions_dir = root.join("sessions");
    config.auth.password.argon2_memory_kib = 1024;
    config.auth.password.argon2_iterations = 1;
    config
}

pub(crate) fn test_state(root: &Path) -> AppState {
    AppState::from_config(test_config(root))
}

pub(crate) fn test_router(state: AppState) -> Router {
    Application::router(state)
}
