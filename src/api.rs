//! HTTP API
//!
//! Public routes answer with 200 and a JSON body even when the answer is
//! negative. Only a missing `gauge` parameter (400) and admin
//! authentication (401) use error statuses.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::gauge_info::{GaugeInfoService, MSG_MISSING_GAUGE};
use crate::verifier::VerificationOutcome;

pub const ADMIN_KEY_HEADER: &str = "x-api-key";

pub struct AppState {
    pub service: GaugeInfoService,
    pub admin_api_key: Option<String>,
}

impl AppState {
    /// Admin routes are closed entirely when no key is configured.
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let supplied = headers.get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok());
        match (&self.admin_api_key, supplied) {
            (Some(expected), Some(supplied)) => expected.as_bytes().ct_eq(supplied.as_bytes()).into(),
            _ => false,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/curve/verify_gauge", get(verify_gauge))
        .route("/curve/gauge_info", get(gauge_info))
        .route("/api/gauge", get(gauge_info))
        .route("/admin/cache/stats", get(cache_stats))
        .route("/admin/cache/refresh", post(cache_refresh))
        .route("/admin/cache/clear", post(cache_clear))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    a: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GaugeParams {
    gauge: Option<String>,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn verify_gauge(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Json<VerificationOutcome> {
    let address = params.a.or(params.address);
    Json(state.service.verifier().verify(address.as_deref()).await)
}

async fn gauge_info(State(state): State<Arc<AppState>>, Query(params): Query<GaugeParams>) -> Response {
    match state.service.gauge_info(params.gauge.as_deref()).await {
        Ok(response) => Json(response).into_response(),
        Err(_) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": MSG_MISSING_GAUGE })),
        )
            .into_response(),
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "Invalid or missing API key" })),
    )
        .into_response()
}

async fn cache_stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    Json(state.service.cache().stats().await).into_response()
}

async fn cache_refresh(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let result = state.service.cache().force_refresh().await;
    if !result.success {
        warn!("Manual cache refresh failed, keeping previous payload");
    }
    Json(result).into_response()
}

async fn cache_clear(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.service.cache().clear().await;
    Json(json!({ "success": true, "message": "Cache cleared" })).into_response()
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge_info::tests::{scripted_chain, service, GAUGE};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    const KEY: &str = "s3cret";

    fn app() -> Router {
        let chain = scripted_chain();
        router(Arc::new(AppState {
            service: service(&chain, true),
            admin_api_key: Some(KEY.to_string()),
        }))
    }

    async fn send(app: Router, method: Method, uri: &str, key: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            request = request.header(ADMIN_KEY_HEADER, key);
        }
        let response = app.oneshot(request.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_verify_accepts_both_parameter_names() {
        let uri = format!("/curve/verify_gauge?a={}", GAUGE);
        let (status, body) = send(app(), Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_valid"], true);

        let uri = format!("/curve/verify_gauge?address={}", GAUGE);
        let (_, body) = send(app(), Method::GET, &uri, None).await;
        assert_eq!(body["is_valid"], true);

        // Negative verdicts are still 200
        let (status, body) = send(app(), Method::GET, "/curve/verify_gauge", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_valid"], false);
        assert_eq!(body["message"], "No address parameter given.");
    }

    #[tokio::test]
    async fn test_gauge_info_routes() {
        for path in ["/curve/gauge_info", "/api/gauge"] {
            let (status, body) = send(app(), Method::GET, &format!("{}?gauge={}", path, GAUGE), None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["success"], true);
            assert_eq!(body["data"]["pool_name"], "ethereum-crvusd-usdc");
            assert_eq!(body["data"]["provider_boosts"]["yearn"]["boost_formatted"], "2.5000");
            assert_eq!(body["verification"]["is_valid"], true);

            let (status, body) = send(app(), Method::GET, path, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], false);
            assert_eq!(body["message"], MSG_MISSING_GAUGE);
        }
    }

    #[tokio::test]
    async fn test_admin_routes_require_key() {
        let (status, _) = send(app(), Method::GET, "/admin/cache/stats", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(app(), Method::POST, "/admin/cache/clear", Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(app(), Method::POST, "/admin/cache/refresh", Some(KEY)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["source"], "remote-api");

        let (status, body) = send(app(), Method::GET, "/admin/cache/stats", Some(KEY)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ttl_secs"], 300);
    }

    #[tokio::test]
    async fn test_admin_key_must_match_exactly() {
        // Keys that differ from the real one by a single byte or by length
        for near_miss in ["s3creT", "s3cre", "s3crets", "S3CRET"] {
            let (status, _) = send(app(), Method::GET, "/admin/cache/stats", Some(near_miss)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "key {:?}", near_miss);
        }
        let (status, _) = send(app(), Method::GET, "/admin/cache/stats", Some(KEY)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_closed_without_configured_key() {
        let chain = scripted_chain();
        let app = router(Arc::new(AppState {
            service: service(&chain, true),
            admin_api_key: None,
        }));
        let (status, _) = send(app, Method::GET, "/admin/cache/stats", Some("")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_clear_resets_stats() {
        let app = app();
        let uri = format!("/curve/gauge_info?gauge={}", GAUGE);
        send(app.clone(), Method::GET, &uri, None).await;

        let (_, stats) = send(app.clone(), Method::GET, "/admin/cache/stats", Some(KEY)).await;
        assert_eq!(stats["has_data"], true);
        assert_eq!(stats["misses"], 1);

        let (status, _) = send(app.clone(), Method::POST, "/admin/cache/clear", Some(KEY)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, stats) = send(app, Method::GET, "/admin/cache/stats", Some(KEY)).await;
        assert_eq!(stats["has_data"], false);
        assert_eq!(stats["misses"], 0);
    }
}
