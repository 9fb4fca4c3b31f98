//! Sources de latence amont vues par le pipeline.
//!
//! Le pipeline ne parle qu'à `LatencySource` ; `HttpSource` l'implémente
//! contre les endpoints proxy du kernel (`/api/cloudfare-latency`,
//! `/api/trend-chart`). Les sources renvoient le JSON brut : la validation
//! du contenu (champs manquants = "pas de données") reste dans le pipeline.

use crate::error::SourceError;
use crate::trends::TrendQuery;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub trait LatencySource: Send + Sync + 'static {
    /// Série temporelle normalisée la plus récente (`result.serie_0`)
    fn fetch_latest(&self) -> impl Future<Output = Result<Value, SourceError>> + Send;

    /// Série d'une paire d'ASN (`result.pair`)
    fn fetch_pair(&self, query: TrendQuery) -> impl Future<Output = Result<Value, SourceError>> + Send;
}

/// Valeur amont : nombre, chaîne numérique (format Radar) ou null
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("[upstream] client builder failed ({e}), falling back to a client without timeout");
                reqwest::Client::default()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json(&self, path: &str, query: &[(&'static str, String)]) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status: status.as_u16(), body });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

impl LatencySource for HttpSource {
    async fn fetch_latest(&self) -> Result<Value, SourceError> {
        self.get_json("/api/cloudfare-latency", &[]).await
    }

    async fn fetch_pair(&self, query: TrendQuery) -> Result<Value, SourceError> {
        self.get_json("/api/trend-chart", &query.query_pairs()).await
    }
}
