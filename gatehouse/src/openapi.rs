//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::api::models::{
    auth::{AuthResponse, AuthSuccessResponse, LoginRequest, SignupRequest},
    session::{DashboardResponse, SessionStatusResponse},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::auth::signup,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::logout,
        crate::api::handlers::session::dashboard,
        crate::api::handlers::session::session_status,
        crate::api::handlers::health::health,
    ),
    components(schemas(
        SignupRequest,
        LoginRequest,
        AuthResponse,
        AuthSuccessResponse,
        DashboardResponse,
        SessionStatusResponse,
    )),
    tags(
        (name = "auth", description = "Signup, login and logout"),
        (name = "session", description = "Session verdicts for protected resources"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;
