//! Bearer-token guard for the admin routes.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::ApiError;

/// Admin credentials shared by the guard.
#[derive(Clone)]
pub struct AdminAuth {
    token: Option<Arc<SecretString>>,
}

impl AdminAuth {
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            token: token.map(Arc::new),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    fn check(&self, presented: Option<&str>) -> Result<(), ApiError> {
        let Some(ref expected) = self.token else {
            return Err(ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Admin API is disabled",
            ));
        };
        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.expose_secret().as_bytes()) => {
                Ok(())
            }
            Some(_) => {
                warn!("Rejected admin request with wrong token");
                Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid admin token"))
            }
            None => Err(ApiError::new(StatusCode::UNAUTHORIZED, "Missing bearer token")),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn require_admin(State(auth): State<AdminAuth>, req: Request, next: Next) -> Response {
    let verdict = auth.check(bearer_token(&req));
    match verdict {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(token: Option<&str>) -> AdminAuth {
        AdminAuth::new(token.map(|t| SecretString::from(t.to_string())))
    }

    #[test]
    fn disabled_without_token() {
        let err = auth(None).check(Some("anything")).unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn rejects_missing_and_wrong_tokens() {
        let a = auth(Some("s3cret"));
        assert_eq!(a.check(None).unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert_eq!(a.check(Some("s3cre")).unwrap_err().status, StatusCode::UNAUTHORIZED);
        assert!(a.check(Some("s3cret")).is_ok());
    }

    #[test]
    fn parses_bearer_header() {
        let req = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc ")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), Some("abc"));

        let basic = Request::builder()
            .header(header::AUTHORIZATION, "Basic abc")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&basic), None);
    }

    #[tokio::test]
    async fn middleware_guards_routes() {
        use axum::Router;
        use axum::body::Body;
        use axum::routing::get;
        use tower::ServiceExt;

        let app = Router::new()
            .route("/secret", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(
                auth(Some("s3cret")),
                require_admin,
            ));

        let denied = app
            .clone()
            .oneshot(Request::builder().uri("/secret").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::builder()
                    .uri("/secret")
                    .header(header::AUTHORIZATION, "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
