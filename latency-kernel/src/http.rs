/**
 * API REST DU KERNEL - Surface HTTP du globe de latence
 *
 * RÔLE :
 * Expose la session dashboard (vue dérivée, filtres, sélection, pulses)
 * aux consommateurs de rendu, plus les proxies amont et la santé du kernel.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, sérialisation JSON automatique des réponses
 * - Routes : /health, /system/health, /view/..., /api/... (module proxy)
 * - Dashboard désactivé en config ⇒ /view/... (hors légende et paires) en 503
 * - Les changements de sélection ou de fenêtre relancent le fetch de tendance
 */

use crate::health::{DashboardProbe, HealthTracker, KernelHealth};
use crate::proxy::{self, ProxyState};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use latency_core::dashboard::{ArcPulses, Dashboard, DashboardView};
use latency_core::models::{Catalog, PairOption};
use latency_core::reference::{self, Legend};
use latency_core::store::{FiltersPatch, ViewFilters};
use latency_core::upstream::LatencySource;
use latency_core::ViewError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("dashboard not mounted")]
    NotMounted,
    #[error(transparent)]
    View(#[from] ViewError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotMounted => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::View(ViewError::UnknownHost(_)) => StatusCode::NOT_FOUND,
            ApiError::View(ViewError::InvalidPair(..)) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub struct AppState<S: LatencySource> {
    pub catalog: Arc<Catalog>,
    pub dashboard: Option<Arc<Dashboard<S>>>,
    pub health: HealthTracker,
}

impl<S: LatencySource> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            dashboard: self.dashboard.clone(),
            health: self.health.clone(),
        }
    }
}

impl<S: LatencySource> AppState<S> {
    fn dashboard(&self) -> Result<&Dashboard<S>, ApiError> {
        self.dashboard.as_deref().ok_or(ApiError::NotMounted)
    }
}

pub fn build_router<S: LatencySource>(app_state: AppState<S>, proxy_state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health::<S>))
        .route("/view", get(get_view::<S>))
        .route("/view/pulses", get(get_pulses::<S>))
        .route("/view/filters", patch(patch_filters::<S>))
        .route("/view/select", post(select_host::<S>))
        .route("/view/pair", post(select_pair::<S>))
        .route("/view/trends/close", post(close_trends::<S>))
        .route("/view/fps", post(record_frame::<S>))
        .route("/view/legend", get(get_legend))
        .route("/view/pairs", get(get_pairs::<S>))
        .with_state(app_state)
        .merge(proxy::router(proxy_state))
}

#[derive(Debug, Deserialize)]
struct PulseParams {
    now: f64,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(rename = "hostId")]
    host_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PairBody {
    source: usize,
    dest: usize,
}

#[derive(Debug, Deserialize)]
struct FrameBody {
    now: f64,
}

// GET /system/health
async fn get_system_health<S: LatencySource>(State(app): State<AppState<S>>) -> Json<KernelHealth> {
    let probe = app.dashboard.as_deref().map(|d| DashboardProbe {
        mounted: d.store().is_mounted(),
        edges: d.store().edges().len(),
        stats: d.poll_stats(),
    });
    Json(app.health.get_health(probe))
}

// GET /view
async fn get_view<S: LatencySource>(State(app): State<AppState<S>>) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(app.dashboard()?.view()))
}

// GET /view/pulses?now=<ms>
async fn get_pulses<S: LatencySource>(
    State(app): State<AppState<S>>,
    Query(params): Query<PulseParams>,
) -> Result<Json<Vec<ArcPulses>>, ApiError> {
    Ok(Json(app.dashboard()?.pulses(params.now)))
}

// PATCH /view/filters
async fn patch_filters<S: LatencySource>(
    State(app): State<AppState<S>>,
    Json(patch): Json<FiltersPatch>,
) -> Result<Json<Value>, ApiError> {
    let dashboard = app.dashboard()?;
    let changed = dashboard.update_filters(patch);
    let filters: ViewFilters = dashboard.store().filters();
    Ok(Json(json!({ "changed": changed, "filters": filters })))
}

// POST /view/select { hostId | null }
async fn select_host<S: LatencySource>(
    State(app): State<AppState<S>>,
    Json(body): Json<SelectBody>,
) -> Result<Json<Value>, ApiError> {
    let dashboard = app.dashboard()?;
    let changed = dashboard.select_host(body.host_id.as_deref())?;
    Ok(Json(json!({
        "changed": changed,
        "selectedPair": dashboard.store().filters().selected_pair,
    })))
}

// POST /view/pair { source, dest }
async fn select_pair<S: LatencySource>(
    State(app): State<AppState<S>>,
    Json(body): Json<PairBody>,
) -> Result<Json<Value>, ApiError> {
    let dashboard = app.dashboard()?;
    let changed = dashboard.set_pair(body.source, body.dest)?;
    Ok(Json(json!({ "changed": changed, "selectedPair": [body.source, body.dest] })))
}

// POST /view/trends/close
async fn close_trends<S: LatencySource>(State(app): State<AppState<S>>) -> Result<Json<Value>, ApiError> {
    let closed = app.dashboard()?.close_trends();
    Ok(Json(json!({ "closed": closed })))
}

// POST /view/fps { now }
async fn record_frame<S: LatencySource>(
    State(app): State<AppState<S>>,
    Json(body): Json<FrameBody>,
) -> Result<Json<Value>, ApiError> {
    let dashboard = app.dashboard()?;
    let fps = dashboard.record_frame(body.now);
    Ok(Json(json!({ "fps": fps, "current": dashboard.store().fps() })))
}

// GET /view/legend
async fn get_legend() -> Json<Legend> {
    Json(reference::legend())
}

// GET /view/pairs
async fn get_pairs<S: LatencySource>(State(app): State<AppState<S>>) -> Json<Vec<PairOption>> {
    Json(app.catalog.pair_options())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, UpstreamConf};
    use crate::proxy::Upstream;
    use axum::body::Body;
    use axum::http::Request;
    use latency_core::dashboard::DashboardConfig;
    use latency_devkit::{MockSource, RadarPayload, TestHarness};
    use std::time::Duration;
    use tower::ServiceExt;

    fn proxy_state() -> ProxyState {
        ProxyState {
            upstream: Arc::new(Upstream::new(UpstreamConf::default(), Credentials::default())),
            health: HealthTracker::new(),
        }
    }

    fn mounted(harness: &TestHarness) -> (Router, Arc<Dashboard<MockSource>>) {
        let dashboard = Arc::new(Dashboard::mount(
            Arc::clone(&harness.catalog),
            Arc::clone(&harness.source),
            DashboardConfig::default(),
        ));
        let state = AppState {
            catalog: Arc::clone(&harness.catalog),
            dashboard: Some(Arc::clone(&dashboard)),
            health: HealthTracker::new(),
        };
        (build_router(state, proxy_state()), dashboard)
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_routes() {
        let harness = TestHarness::new();
        let (app, _dashboard) = mounted(&harness);

        let response = app.clone().oneshot(get_req("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = call(&app, get_req("/system/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dashboard_mounted"], true);
    }

    #[tokio::test]
    async fn test_view_reflects_polled_edges() {
        let harness = TestHarness::new();
        harness.source.push_latest(Ok(RadarPayload::latest(&[Some(0.15)])));
        let (app, dashboard) = mounted(&harness);
        assert!(harness.wait_until(Duration::from_secs(2), || dashboard.store().edges().len() == 3).await);

        let (status, body) = call(&app, get_req("/view")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hosts"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["arcs"][0]["label"], "150 ms");
        assert_eq!(body["arcs"][0]["points"].as_array().map(Vec::len), Some(101));
        assert_eq!(body["trend_panel"], Value::Null);

        let (status, body) = call(&app, get_req("/view/pulses?now=2500")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_filters_patch() {
        let harness = TestHarness::new();
        let (app, _dashboard) = mounted(&harness);

        let patch = json!({ "text_query": "OKX", "providers": { "aws": false }, "latency": "low" });
        let (status, body) = call(&app, json_req("PATCH", "/view/filters", patch.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["changed"], true);
        assert_eq!(body["filters"]["providers"]["aws"], false);

        let (_, body) = call(&app, json_req("PATCH", "/view/filters", patch)).await;
        assert_eq!(body["changed"], false);

        let (_, view) = call(&app, get_req("/view")).await;
        assert_eq!(view["hosts"].as_array().map(Vec::len), Some(1));
        assert_eq!(view["hosts"][0]["id"], "okx.com");
    }

    #[tokio::test]
    async fn test_select_host_opens_trend_panel() {
        let harness = TestHarness::new();
        harness.source.push_pair(Ok(RadarPayload::pair(&[Some(0.1), Some(0.2)])));
        let (app, dashboard) = mounted(&harness);

        let (status, body) = call(&app, json_req("POST", "/view/select", json!({ "hostId": "okx.com" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selectedPair"], json!([1, 2]));
        dashboard.settle().await;

        let (_, view) = call(&app, get_req("/view")).await;
        assert_eq!(view["trend_panel"]["phase"], "success");
        assert_eq!(view["trend_panel"]["summary"]["avg"], 150.0);

        let (_, body) = call(&app, json_req("POST", "/view/trends/close", json!({}))).await;
        assert_eq!(body["closed"], true);
        let (_, view) = call(&app, get_req("/view")).await;
        assert_eq!(view["trend_panel"], Value::Null);
        assert_eq!(view["filters"]["selected_pair"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_selection_errors() {
        let harness = TestHarness::new();
        let (app, _dashboard) = mounted(&harness);

        let (status, body) = call(&app, json_req("POST", "/view/select", json!({ "hostId": "kraken.com" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "unknown host: kraken.com");

        let (status, _) = call(&app, json_req("POST", "/view/pair", json!({ "source": 2, "dest": 2 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_fps_and_static_routes() {
        let harness = TestHarness::new();
        let (app, _dashboard) = mounted(&harness);

        let (_, body) = call(&app, json_req("POST", "/view/fps", json!({ "now": 1000.0 }))).await;
        assert_eq!(body["fps"], Value::Null);
        let (_, body) = call(&app, json_req("POST", "/view/fps", json!({ "now": 1020.0 }))).await;
        assert_eq!(body["fps"], 50.0);

        let (_, legend) = call(&app, get_req("/view/legend")).await;
        assert_eq!(legend["latency"].as_array().map(Vec::len), Some(3));

        let (_, pairs) = call(&app, get_req("/view/pairs")).await;
        assert_eq!(pairs.as_array().map(Vec::len), Some(6));
        assert_eq!(pairs[0]["label"], "Binance → OKX");
    }

    #[tokio::test]
    async fn test_view_without_dashboard() {
        let harness = TestHarness::new();
        let state: AppState<MockSource> = AppState {
            catalog: Arc::clone(&harness.catalog),
            dashboard: None,
            health: HealthTracker::new(),
        };
        let app = build_router(state, proxy_state());

        let (status, body) = call(&app, get_req("/view")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "dashboard not mounted");

        let (status, _) = call(&app, get_req("/view/pairs")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
