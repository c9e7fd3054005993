use axum::{Json, extract::State, response::IntoResponse, response::Response};
use chrono::Utc;

use crate::{
    AppState,
    api::handlers::auth::clear_session_cookie,
    api::models::session::{DashboardResponse, LoginRedirect, SessionStatusResponse},
    auth::{Rejection, SessionToken, Verdict},
    errors::Error,
};

/// Protected resource: renders for an accepted session, redirects to the
/// login page otherwise
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "session",
    responses(
        (status = 200, description = "Session accepted and renewed", body = DashboardResponse),
        (status = 302, description = "Session rejected; redirect to the login page, clearing the cookie for stale sessions"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn dashboard(State(state): State<AppState>, SessionToken(token): SessionToken) -> Result<Response, Error> {
    match state.guard.authorize(token.as_deref(), Utc::now()).await? {
        Verdict::Accepted { username, expires_in } => Ok(Json(DashboardResponse {
            username,
            session_expires_in: expires_in,
        })
        .into_response()),
        Verdict::Rejected(rejection) => {
            // A browser that presented a stale token gets it cleared; one
            // that presented nothing has nothing to clear.
            let clear_cookie = matches!(rejection, Rejection::NotFound | Rejection::Expired)
                .then(|| clear_session_cookie(&state.config.auth.session));
            Ok(LoginRedirect {
                location: state.config.login_page.clone(),
                clear_cookie,
            }
            .into_response())
        }
    }
}

/// Machine-readable session verdict; never renews the window
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses(
        (status = 200, description = "Verdict for the presented session", body = SessionStatusResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn session_status(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<Json<SessionStatusResponse>, Error> {
    let response = match state.guard.inspect(token.as_deref(), Utc::now()).await? {
        Verdict::Accepted { username, .. } => SessionStatusResponse {
            valid: true,
            username,
            message: "Session valid".to_string(),
        },
        Verdict::Rejected(rejection) => SessionStatusResponse {
            valid: false,
            username: String::new(),
            message: match rejection {
                Rejection::NoToken => "No session cookie found",
                Rejection::NotFound => "Session not found",
                Rejection::Expired => "Session expired",
            }
            .to_string(),
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use crate::api::models::auth::AuthResponse;
    use crate::api::models::session::{DashboardResponse, SessionStatusResponse};
    use crate::test_utils::{test_router, test_state};
    use axum::http::{HeaderValue, StatusCode, header};
    use axum_test::TestServer;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Credentials {
        username: &'static str,
        password: &'static str,
    }

    const ALICE: Credentials = Credentials {
        username: "alice",
        password: "secret",
    };

    async fn logged_in_server(root: &TempDir) -> (TestServer, String) {
        let server = TestServer::new(test_router(test_state(root.path()))).unwrap();
        server.post("/auth/signup").form(&ALICE).await.assert_status(StatusCode::CREATED);

        let response = server.post("/auth/login").form(&ALICE).await;
        response.assert_status(StatusCode::OK);
        let set_cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        let token = set_cookie
            .split_once(';')
            .and_then(|(pair, _)| pair.split_once('='))
            .map(|(_, value)| value.to_string())
            .unwrap();
        (server, token)
    }

    fn cookie_header(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("session_id={token}")).unwrap()
    }

    #[tokio::test]
    async fn dashboard_renders_for_a_valid_session() {
        let root = TempDir::new().unwrap();
        let (server, token) = logged_in_server(&root).await;

        let response = server.get("/dashboard").add_header(header::COOKIE, cookie_header(&token)).await;

        response.assert_status(StatusCode::OK);
        let body: DashboardResponse = response.json();
        assert_eq!(body.username, "alice");
        assert!(body.session_expires_in > 0 && body.session_expires_in <= 1800);
    }

    #[tokio::test]
    async fn dashboard_without_cookie_redirects_without_clearing() {
        let root = TempDir::new().unwrap();
        let (server, _token) = logged_in_server(&root).await;

        let response = server.get("/dashboard").await;

        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/login.html");
        assert!(response.headers().get("set-cookie").is_none());
    }

    #[tokio::test]
    async fn dashboard_with_unknown_session_redirects_and_clears() {
        let root = TempDir::new().unwrap();
        let (server, _token) = logged_in_server(&root).await;

        let response = server
            .get("/dashboard")
            .add_header(header::COOKIE, cookie_header(&uuid::Uuid::new_v4().to_string()))
            .await;

        response.assert_status(StatusCode::FOUND);
        assert_eq!(response.headers().get("location").unwrap(), "/login.html");
        let cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap();
        assert!(cookie.starts_with("session_id=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn status_reports_a_valid_session_without_renewal() {
        let root = TempDir::new().unwrap();
        let (server, token) = logged_in_server(&root).await;

        let response = server.get("/session").add_header(header::COOKIE, cookie_header(&token)).await;

        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.json::<serde_json::Value>(),
            serde_json::json!({
                "valid": true,
                "username": "alice",
                "message": "Session valid",
            })
        );
    }

    #[tokio::test]
    async fn status_reports_missing_and_unknown_sessions() {
        let root = TempDir::new().unwrap();
        let (server, _token) = logged_in_server(&root).await;

        let response = server.get("/session").await;
        let body: SessionStatusResponse = response.json();
        assert!(!body.valid);
        assert_eq!(body.username, "");
        assert_eq!(body.message, "No session cookie found");

        let response = server
            .get("/session")
            .add_header(header::COOKIE, cookie_header(&uuid::Uuid::new_v4().to_string()))
            .await;
        let body: SessionStatusResponse = response.json();
        assert!(!body.valid);
        assert_eq!(body.message, "Session not found");
    }

    #[tokio::test]
    async fn logout_invalidates_the_dashboard_session() {
        let root = TempDir::new().unwrap();
        let (server, token) = logged_in_server(&root).await;

        let response = server.post("/auth/logout").add_header(header::COOKIE, cookie_header(&token)).await;
        response.assert_status(StatusCode::OK);
        let _body: crate::api::models::auth::AuthSuccessResponse = response.json();

        let response = server.get("/dashboard").add_header(header::COOKIE, cookie_header(&token)).await;
        response.assert_status(StatusCode::FOUND);
    }

    #[tokio::test]
    async fn login_body_names_the_user() {
        let root = TempDir::new().unwrap();
        let (server, _token) = logged_in_server(&root).await;

        let response = server.post("/auth/login").form(&ALICE).await;
        let body: AuthResponse = response.json();
        assert_eq!(body.username, "alice");
        assert!(body.message.contains("alice"));
    }
}
