//! HTTP server assembly: shared services, router and CORS.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::auth::{AdminAuth, require_admin};
use crate::chat::routes::{ChatRouteState, chat_routes};
use crate::chat::session::SessionRegistry;
use crate::chat::sink::{HttpLeadSink, LeadSink, StoreLeadSink};
use crate::config::{ChatConfig, SiteConfig};
use crate::content::{ContentRouteState, admin_content_routes, content_routes};
use crate::error::HandoffError;
use crate::leads::{LeadRouteState, admin_lead_routes, intake_routes};
use crate::notify::Notifier;
use crate::store::Database;

/// How often idle chat sessions are swept.
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Chat sessions untouched for this long are dropped.
pub const SESSION_MAX_IDLE: Duration = Duration::from_secs(30 * 60);

/// Admin lists return this many rows unless `?limit=` says otherwise.
pub const DEFAULT_LIST_LIMIT: i64 = 100;
/// Upper bound for `?limit=`.
pub const MAX_LIST_LIMIT: i64 = 1000;

/// `?limit=` on admin list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

impl ListQuery {
    /// Requested limit, defaulted and clamped to `1..=MAX_LIST_LIMIT`.
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Everything the routes share.
#[derive(Clone)]
pub struct SiteServices {
    pub db: Arc<dyn Database>,
    pub registry: Arc<SessionRegistry>,
    pub notifier: Arc<dyn Notifier>,
    pub admin: AdminAuth,
}

impl SiteServices {
    /// Wire up services from config: picks the lead sink and builds the
    /// chat registry.
    pub fn from_config(
        config: &SiteConfig,
        db: Arc<dyn Database>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, HandoffError> {
        let sink = lead_sink(&config.chat, Arc::clone(&db))?;
        Ok(Self {
            registry: SessionRegistry::from_config(&config.chat, sink),
            db,
            notifier,
            admin: AdminAuth::new(config.admin_token.clone()),
        })
    }
}

/// Chat leads go to `LEAD_ENDPOINT` when set, otherwise straight into the database.
pub fn lead_sink(
    config: &ChatConfig,
    db: Arc<dyn Database>,
) -> Result<Arc<dyn LeadSink>, HandoffError> {
    match config.lead_endpoint {
        Some(ref endpoint) => {
            info!(endpoint = %endpoint, "Chat leads will be posted to lead endpoint");
            Ok(Arc::new(HttpLeadSink::new(endpoint.clone())?))
        }
        None => Ok(Arc::new(StoreLeadSink::new(db))),
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "portfolio-site"
    }))
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if allowed.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(allowed)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}

/// Build the full application router.
pub fn build_router(services: &SiteServices, cors_origins: &[String]) -> Router {
    if !services.admin.is_enabled() {
        warn!("ADMIN_TOKEN not set; admin API is disabled");
    }

    let content_state = ContentRouteState {
        db: Arc::clone(&services.db),
    };
    let lead_state = LeadRouteState {
        db: Arc::clone(&services.db),
        notifier: Arc::clone(&services.notifier),
    };

    let admin = admin_content_routes(content_state.clone())
        .merge(admin_lead_routes(lead_state.clone()))
        .route_layer(middleware::from_fn_with_state(
            services.admin.clone(),
            require_admin,
        ));

    let app = Router::new()
        .route("/health", get(health))
        .merge(chat_routes(ChatRouteState {
            registry: Arc::clone(&services.registry),
        }))
        .merge(intake_routes(lead_state))
        .merge(content_routes(content_state))
        .merge(admin);

    match cors_layer(cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    #[test]
    fn cors_skips_invalid_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_none());
        assert!(cors_layer(&["https://folio.dev".to_string()]).is_some());
    }

    #[test]
    fn list_limit_defaults_and_clamps() {
        let limit = |limit| ListQuery { limit }.limit();
        assert_eq!(limit(None), DEFAULT_LIST_LIMIT);
        assert_eq!(limit(Some(5)), 5);
        assert_eq!(limit(Some(0)), 1);
        assert_eq!(limit(Some(50_000)), MAX_LIST_LIMIT);
    }

    #[tokio::test]
    async fn cors_headers_only_for_configured_origins() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        use crate::notify::DisabledNotifier;

        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let services =
            SiteServices::from_config(&SiteConfig::default(), db, Arc::new(DisabledNotifier))
                .unwrap();
        let request = || {
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://folio.dev")
                .body(Body::empty())
                .unwrap()
        };

        let resp = build_router(&services, &[]).oneshot(request()).await.unwrap();
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

        let allowed = ["https://folio.dev".to_string()];
        let resp = build_router(&services, &allowed).oneshot(request()).await.unwrap();
        assert_eq!(
            resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://folio.dev"
        );
    }

    #[tokio::test]
    async fn sink_follows_lead_endpoint() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mut config = ChatConfig::default();
        assert!(lead_sink(&config, Arc::clone(&db)).is_ok());

        config.lead_endpoint = Some("http://127.0.0.1:9/api/leads".into());
        assert!(lead_sink(&config, db).is_ok());
    }
}
