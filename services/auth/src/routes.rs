//! Authentication service routes

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::AppState;
use crate::error::{AuthError, AuthResult};
use crate::magic_link::{PendingSignIn, generate_token, sign_in_url};
use crate::users::{User, default_name};
use crate::validation::{validate_callback_url, validate_email, validate_name};

#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    pub email: String,
    pub name: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SignedIn {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
    pub callback_url: Option<String>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/magic-link", post(request_magic_link))
        .route("/auth/magic-link/verify", post(verify_magic_link))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

fn normalize(request: MagicLinkRequest) -> AuthResult<PendingSignIn> {
    let email = request.email.trim().to_lowercase();
    validate_email(&email).map_err(AuthError::InvalidInput)?;

    let name = request.name.map(|name| name.trim().to_string());
    if let Some(name) = &name {
        validate_name(name).map_err(AuthError::InvalidInput)?;
    }
    if let Some(url) = &request.callback_url {
        validate_callback_url(url).map_err(AuthError::InvalidInput)?;
    }

    Ok(PendingSignIn {
        email,
        name,
        callback_url: request.callback_url,
    })
}

/// Email a one-time sign-in link
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(request): Json<MagicLinkRequest>,
) -> AuthResult<impl IntoResponse> {
    let pending = normalize(request)?;

    if !state.limiter.check(&pending.email).await {
        warn!(email = %pending.email, "Too many sign-in link requests");
        return Err(AuthError::RateLimited);
    }

    let token = generate_token();
    state
        .links
        .put(&token, &pending, state.config.magic_link_ttl_secs)
        .await?;
    let url = sign_in_url(&state.config.app_base_url, &token);
    state.mailer.send_sign_in_link(&pending.email, &url).await?;

    info!(email = %pending.email, "Sign-in link requested");
    Ok(Json(json!({
        "success": true,
        "message": "Check your email for a sign-in link"
    })))
}

/// Exchange a sign-in token for an access token
pub async fn verify_magic_link(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> AuthResult<impl IntoResponse> {
    let pending = state
        .links
        .take(request.token.trim())
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let superadmin = state.authorized.contains(&pending.email);
    let name = pending
        .name
        .clone()
        .unwrap_or_else(|| default_name(&pending.email));
    let user = state.users.sign_in(&pending.email, &name, superadmin).await?;
    let issued = state.issuer.issue(&user)?;

    info!(user_id = %user.id, role = %user.role, "User signed in");
    Ok(Json(json!({
        "success": true,
        "data": SignedIn {
            access_token: issued.access_token,
            token_type: "Bearer",
            expires_in: issued.expires_in,
            user,
            callback_url: pending.callback_url,
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, AuthorizedEmails};
    use crate::jwt::{JwtConfig, TokenIssuer};
    use crate::magic_link::testing::{MemoryLinkStore, OutboxMailer};
    use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
    use crate::users::testing::MemoryUserDirectory;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const PRIVATE_KEY: &str = include_str!("../../../testdata/jwt_test_private.pem");

    struct TestApp {
        router: Router,
        mailer: Arc<OutboxMailer>,
    }

    fn app(max_requests: u32) -> TestApp {
        let mailer = Arc::new(OutboxMailer::default());
        let config = AuthConfig {
            bind_addr: "127.0.0.1:0".into(),
            app_base_url: "https://community.example.com".into(),
            magic_link_ttl_secs: 900,
            authorized_emails: "root@example.com".into(),
            magic_link_max_requests: max_requests,
            magic_link_window_secs: 3600,
        };
        let state = AppState {
            links: Arc::new(MemoryLinkStore::default()),
            users: Arc::new(MemoryUserDirectory::default()),
            mailer: mailer.clone(),
            issuer: Arc::new(
                TokenIssuer::new(&JwtConfig {
                    private_key: PRIVATE_KEY.into(),
                    access_token_expiry: 600,
                })
                .unwrap(),
            ),
            limiter: RateLimiter::new(RateLimiterConfig {
                max_requests,
                window: Duration::from_secs(3600),
            }),
            authorized: Arc::new(AuthorizedEmails::parse(&config.authorized_emails)),
            config: Arc::new(config),
        };
        TestApp {
            router: create_router(state),
            mailer,
        }
    }

    async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .clone()
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn last_token(app: &TestApp) -> String {
        let sent = app.mailer.sent.lock().await;
        let (_, url) = sent.last().unwrap();
        url.split("token=").nth(1).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_sign_in_round_trip() {
        let app = app(5);
        let (status, body) = post_json(
            &app.router,
            "/auth/magic-link",
            json!({ "email": " Ada@Example.com ", "callback_url": "/events" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(app.mailer.sent.lock().await[0].0, "ada@example.com");

        let token = last_token(&app).await;
        let (status, body) =
            post_json(&app.router, "/auth/magic-link/verify", json!({ "token": token })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["email"], "ada@example.com");
        assert_eq!(body["data"]["user"]["name"], "ada");
        assert_eq!(body["data"]["user"]["role"], "user");
        assert_eq!(body["data"]["callback_url"], "/events");
        assert_eq!(body["data"]["token_type"], "Bearer");

        // The link works once.
        let (status, body) =
            post_json(&app.router, "/auth/magic-link/verify", json!({ "token": token })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid or expired sign-in link");
    }

    #[tokio::test]
    async fn test_authorized_email_becomes_superadmin() {
        let app = app(5);
        for email in ["root@example.com", "guest@example.com"] {
            post_json(&app.router, "/auth/magic-link", json!({ "email": email })).await;
            let token = last_token(&app).await;
            let (_, body) =
                post_json(&app.router, "/auth/magic-link/verify", json!({ "token": token })).await;
            let expected = if email == "root@example.com" {
                "superadmin"
            } else {
                "user"
            };
            assert_eq!(body["data"]["user"]["role"], expected);
        }
    }

    #[tokio::test]
    async fn test_invalid_requests_send_nothing() {
        let app = app(5);
        let (status, body) =
            post_json(&app.router, "/auth/magic-link", json!({ "email": "nope" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Invalid email format");

        let (status, _) = post_json(
            &app.router,
            "/auth/magic-link",
            json!({ "email": "ada@example.com", "callback_url": "https://evil.example.com" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(app.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_requests_are_rate_limited_per_email() {
        let app = app(2);
        for _ in 0..2 {
            let (status, _) =
                post_json(&app.router, "/auth/magic-link", json!({ "email": "ada@example.com" }))
                    .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) =
            post_json(&app.router, "/auth/magic-link", json!({ "email": "ADA@example.com" }))
                .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(app.mailer.sent.lock().await.len(), 2);

        let (status, _) =
            post_json(&app.router, "/auth/magic-link", json!({ "email": "bob@example.com" }))
                .await;
        assert_eq!(status, StatusCode::OK);
    }
}
