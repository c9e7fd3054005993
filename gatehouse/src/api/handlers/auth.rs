use axum::extract::{Form, State};
use chrono::Utc;

use crate::{
    AppState,
    api::models::auth::{
        AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse, SignupRequest, SignupResponse,
    },
    auth::SessionToken,
    config::SessionConfig,
    errors::Error,
};

/// Register a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body(content = SignupRequest, content_type = "application/x-www-form-urlencoded"),
    tag = "auth",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Missing or invalid field"),
        (status = 409, description = "Username already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn signup(State(state): State<AppState>, Form(request): Form<SignupRequest>) -> Result<SignupResponse, Error> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(Error::BadRequest {
            message: "Username and password are required".to_string(),
        });
    }

    // Validate password length
    let password_config = &state.config.auth.password;
    if request.password.len() < password_config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", password_config.min_length),
        });
    }
    if request.password.len() > password_config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", password_config.max_length),
        });
    }

    state.auth.signup(&request.username, &request.password).await?;

    Ok(SignupResponse(AuthResponse {
        message: format!("Welcome, {}! You can now log in.", request.username),
        username: request.username,
    }))
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    tag = "auth",
    responses(
        (status = 200, description = "Login successful, session cookie set", body = AuthResponse),
        (status = 400, description = "Missing field"),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Form(request): Form<LoginRequest>) -> Result<LoginResponse, Error> {
    let session_id = state
        .auth
        .login(&request.username, &request.password, Utc::now())
        .await?;

    let cookie = session_cookie(&state.config.auth.session, &session_id.to_string());

    Ok(LoginResponse {
        auth_response: AuthResponse {
            message: format!("Welcome back, {}!", request.username),
            username: request.username,
        },
        cookie,
    })
}

/// Logout (revoke the presented session)
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful, cookie cleared", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, SessionToken(token): SessionToken) -> Result<LogoutResponse, Error> {
    state.auth.logout(token.as_deref()).await?;

    Ok(LogoutResponse {
        auth_response: AuthSuccessResponse {
            message: "You have been successfully logged out.".to_string(),
        },
        cookie: clear_session_cookie(&state.config.auth.session),
    })
}

/// Session cookie as issued at login: path-scoped, HTTP-only, with the
/// sliding-window timeout as a client-side Max-Age hint. The server-side
/// window stays authoritative.
pub(crate) fn session_cookie(config: &SessionConfig, session_id: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly",
        config.cookie_name,
        session_id,
        config.timeout.as_secs()
    );
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    if let Some(same_site) = &config.cookie_same_site {
        cookie.push_str("; SameSite=");
        cookie.push_str(same_site);
    }
    cookie
}

/// Overwrite the session cookie with an already-expired one so the client
/// drops it.
pub(crate) fn clear_session_cookie(config: &SessionConfig) -> String {
    format!(
        "{}=; Path=/; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly",
        config.cookie_name
    )
}
