use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Protected resource body rendered for an accepted session.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub username: String,
    /// Seconds of sliding window left at the time of this request
    pub session_expires_in: i64,
}

/// Machine-readable session verdict.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionStatusResponse {
    pub valid: bool,
    /// Empty when the session is not valid
    pub username: String,
    pub message: String,
}

/// 302 Found to the login page, optionally clearing the session cookie.
pub struct LoginRedirect {
    pub location: String,
    pub clear_cookie: Option<String>,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        let mut response = StatusCode::FOUND.into_response();
        if let Ok(value) = HeaderValue::from_str(&self.location) {
            response.headers_mut().insert(header::LOCATION, value);
        }
        if let Some(cookie) = self.clear_cookie {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
        }
        response
    }
}
