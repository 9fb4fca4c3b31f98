/**
 * PROXIES AMONT - Endpoints /api/... vers Cloudflare Radar, Globalping et Postman
 *
 * RÔLE :
 * Le navigateur (et le poller du dashboard) ne parlent jamais directement
 * aux APIs tierces : le kernel détient les secrets et relaie les appels.
 *
 * FONCTIONNEMENT :
 * - Secret absent ⇒ 500 immédiat avec message explicite, aucun appel réseau
 * - Paramètre requis absent ⇒ 400
 * - Statut amont non-2xx ⇒ même statut renvoyé, corps amont dans `error`
 * - Erreur transport ⇒ 500 ; toute défaillance amont est comptée dans /system/health
 *
 * ENDPOINTS :
 *   GET  /api/cloudfare-latency    → Radar netflows, série latence 1d
 *   GET  /api/trend-chart          → Radar netflows, série d'une paire d'ASN
 *   POST /api/globalping-measure   → création d'une mesure ping, { measurementId }
 *   GET  /api/globalping-results   → résultat brut d'une mesure
 *   GET  /api/postman-latency      → dernier run du monitor, aplati
 *   GET  /api/exchange-locations   → liste statique
 */

use crate::config::{Credentials, UpstreamConf};
use crate::health::HealthTracker;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use latency_core::models::ExchangeLocation;
use latency_core::reference;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("{0}")]
    MissingCredential(&'static str),
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{body}")]
    Upstream { status: StatusCode, body: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingCredential(_) | ProxyError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::Upstream { status, .. } => *status,
        }
    }

    fn is_upstream_failure(&self) -> bool {
        matches!(self, ProxyError::Upstream { .. } | ProxyError::Transport(_))
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Paramètres de `/api/trend-chart`, tous requis
#[derive(Debug, Default, Deserialize)]
pub struct TrendChartParams {
    #[serde(rename = "srcASN")]
    pub src_asn: Option<String>,
    #[serde(rename = "dstASN")]
    pub dst_asn: Option<String>,
    #[serde(rename = "dateStart")]
    pub date_start: Option<String>,
    #[serde(rename = "dateEnd")]
    pub date_end: Option<String>,
    #[serde(rename = "aggInterval")]
    pub agg_interval: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct MeasureRequest {
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResultsParams {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MonitorRuns {
    #[serde(default)]
    monitor_run: Vec<MonitorRun>,
}

#[derive(Debug, Deserialize)]
struct MonitorRun {
    run_results: Option<Vec<RunResult>>,
}

#[derive(Debug, Deserialize)]
struct RunResult {
    region: Option<String>,
    response_time: Option<f64>,
    request_name: Option<String>,
    code: Option<u16>,
}

/// Entrée de `/api/postman-latency`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostmanLatency {
    pub region: Option<String>,
    pub latency: Option<f64>,
    pub request_name: Option<String>,
    pub status: Option<u16>,
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ProxyError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProxyError::Upstream { status, body });
    }
    Ok(response.json::<T>().await?)
}

/// Client des APIs tierces ; détient la configuration et les secrets
pub struct Upstream {
    client: reqwest::Client,
    conf: UpstreamConf,
    creds: Credentials,
}

impl Upstream {
    pub fn new(conf: UpstreamConf, creds: Credentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|e| {
                warn!("[proxy] client builder failed ({e}), falling back to a client without timeout");
                reqwest::Client::default()
            });
        Self { client, conf, creds }
    }

    fn radar_token(&self) -> Result<&str, ProxyError> {
        self.creds
            .cf_radar_token
            .as_deref()
            .ok_or(ProxyError::MissingCredential("Cloudflare Radar API token not set"))
    }

    fn globalping_token(&self) -> Result<&str, ProxyError> {
        self.creds
            .globalping_token
            .as_deref()
            .ok_or(ProxyError::MissingCredential("Globalping API key not set"))
    }

    pub async fn radar_latest(&self) -> Result<Value, ProxyError> {
        let token = self.radar_token()?;
        let response = self
            .client
            .get(format!("{}/netflows/timeseries", self.conf.radar_base))
            .bearer_auth(token)
            .query(&[("metrics", "latency"), ("dateRange", "1d"), ("format", "json")])
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn radar_pair(&self, params: &TrendChartParams) -> Result<Value, ProxyError> {
        let (Some(src), Some(dst), Some(start), Some(end), Some(agg)) = (
            present(&params.src_asn),
            present(&params.dst_asn),
            present(&params.date_start),
            present(&params.date_end),
            present(&params.agg_interval),
        ) else {
            return Err(ProxyError::BadRequest("Missing required params"));
        };
        let token = self.radar_token()?;
        let response = self
            .client
            .get(format!("{}/netflows/timeseries", self.conf.radar_base))
            .bearer_auth(token)
            .query(&[
                ("name", "pair"),
                ("aggInterval", agg),
                ("dateStart", start),
                ("srcASN", src),
                ("dstASN", dst),
                ("dateEnd", end),
                ("format", "json"),
            ])
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn globalping_measure(&self, target: Option<&str>) -> Result<Value, ProxyError> {
        let target = target
            .filter(|t| !t.is_empty())
            .ok_or(ProxyError::BadRequest("Missing target in request body"))?;
        let token = self.globalping_token()?;
        let response = self
            .client
            .post(format!("{}/measurements", self.conf.globalping_base))
            .bearer_auth(token)
            .json(&json!({ "target": target, "type": "ping", "count": 5, "locations": [] }))
            .send()
            .await?;
        let data: Value = read_json(response).await?;
        Ok(json!({ "measurementId": data.get("id").cloned().unwrap_or(Value::Null) }))
    }

    pub async fn globalping_results(&self, id: Option<&str>) -> Result<Value, ProxyError> {
        let id = id
            .filter(|i| !i.is_empty())
            .ok_or(ProxyError::BadRequest("Measurement ID is required"))?;
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ProxyError::BadRequest("Invalid measurement ID"));
        }
        let token = self.globalping_token()?;
        let response = self
            .client
            .get(format!("{}/measurements/{}", self.conf.globalping_base, id))
            .bearer_auth(token)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn postman_latest(&self) -> Result<Vec<PostmanLatency>, ProxyError> {
        let (Some(key), Some(monitor)) = (
            self.creds.postman_api_key.as_deref(),
            self.creds.postman_monitor_id.as_deref(),
        ) else {
            return Err(ProxyError::MissingCredential("Postman API key or monitor ID not set"));
        };
        let response = self
            .client
            .get(format!("{}/monitors/{}/runs", self.conf.postman_base, monitor))
            .header("X-Api-Key", key)
            .send()
            .await?;
        let runs: MonitorRuns = read_json(response).await?;
        let latest = runs
            .monitor_run
            .into_iter()
            .next()
            .ok_or(ProxyError::NotFound("No monitor run data available"))?;
        let results = latest
            .run_results
            .ok_or(ProxyError::NotFound("No run results in latest monitor run"))?;
        Ok(results
            .into_iter()
            .map(|r| PostmanLatency {
                region: r.region,
                latency: r.response_time,
                request_name: r.request_name,
                status: r.code,
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct ProxyState {
    pub upstream: Arc<Upstream>,
    pub health: HealthTracker,
}

impl ProxyState {
    fn track<T>(&self, endpoint: &str, result: Result<T, ProxyError>) -> Result<T, ProxyError> {
        if let Err(e) = &result {
            if e.is_upstream_failure() {
                warn!("[proxy] {endpoint} failed: {e}");
                self.health.record_upstream_failure(endpoint, &e.to_string());
            }
        }
        result
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/cloudfare-latency", get(cloudfare_latency))
        .route("/api/trend-chart", get(trend_chart))
        .route("/api/globalping-measure", post(globalping_measure))
        .route("/api/globalping-results", get(globalping_results))
        .route("/api/postman-latency", get(postman_latency))
        .route("/api/exchange-locations", get(exchange_locations))
        .with_state(state)
}

// GET /api/cloudfare-latency
async fn cloudfare_latency(State(p): State<ProxyState>) -> Result<Json<Value>, ProxyError> {
    let result = p.upstream.radar_latest().await;
    p.track("/api/cloudfare-latency", result).map(Json)
}

// GET /api/trend-chart?srcASN&dstASN&dateStart&dateEnd&aggInterval
async fn trend_chart(
    State(p): State<ProxyState>,
    Query(params): Query<TrendChartParams>,
) -> Result<Json<Value>, ProxyError> {
    let result = p.upstream.radar_pair(&params).await;
    p.track("/api/trend-chart", result).map(Json)
}

// POST /api/globalping-measure { target }
async fn globalping_measure(
    State(p): State<ProxyState>,
    Json(body): Json<MeasureRequest>,
) -> Result<Json<Value>, ProxyError> {
    let result = p.upstream.globalping_measure(body.target.as_deref()).await;
    p.track("/api/globalping-measure", result).map(Json)
}

// GET /api/globalping-results?id
async fn globalping_results(
    State(p): State<ProxyState>,
    Query(params): Query<ResultsParams>,
) -> Result<Json<Value>, ProxyError> {
    let result = p.upstream.globalping_results(params.id.as_deref()).await;
    p.track("/api/globalping-results", result).map(Json)
}

// GET /api/postman-latency
async fn postman_latency(State(p): State<ProxyState>) -> Result<Json<Vec<PostmanLatency>>, ProxyError> {
    let result = p.upstream.postman_latest().await;
    p.track("/api/postman-latency", result).map(Json)
}

// GET /api/exchange-locations
async fn exchange_locations() -> Json<Vec<ExchangeLocation>> {
    Json(reference::exchange_locations())
}
