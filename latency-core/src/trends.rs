/**
 * TREND FETCHER - Historique de latence d'une paire de serveurs
 *
 * RÔLE :
 * Machine à états Idle → Loading → {Success, Error}, relancée à chaque
 * changement de (paire sélectionnée, fenêtre temporelle).
 *
 * FONCTIONNEMENT :
 * - `begin` incrémente la génération, vide échantillons et erreur
 * - `complete` n'accepte que le ticket de la génération courante :
 *   une réponse lente d'une ancienne sélection est jetée
 * - Les statistiques (min/max/moyenne) ignorent les trous
 *
 * FENÊTRES :
 *   15m → agrégation 1m, 15 minutes | 1h → 15m, 1 heure
 *   1d  → 1h, 1 jour               | 1w → 4h, 7 jours
 */

use crate::models::{Catalog, TrendSample};
use crate::store::ViewStore;
use crate::upstream::{value_as_f64, LatencySource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

pub const NO_DATA_MESSAGE: &str = "No data returned from API";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
}

impl TimeRange {
    pub fn agg_interval(self) -> &'static str {
        match self {
            TimeRange::FifteenMinutes => "1m",
            TimeRange::OneHour => "15m",
            TimeRange::OneDay => "1h",
            TimeRange::OneWeek => "4h",
        }
    }

    pub fn lookback(self) -> Duration {
        match self {
            TimeRange::FifteenMinutes => Duration::minutes(15),
            TimeRange::OneHour => Duration::hours(1),
            TimeRange::OneDay => Duration::days(1),
            TimeRange::OneWeek => Duration::days(7),
        }
    }
}

/// Clé d'une requête de tendance : toute variation relance le chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TrendKey {
    pub source: usize,
    pub dest: usize,
    pub range: TimeRange,
}

/// Paramètres de `GET /api/trend-chart`
#[derive(Debug, Clone, PartialEq)]
pub struct TrendQuery {
    pub src_asn: u32,
    pub dst_asn: u32,
    pub date_start: String,
    pub date_end: String,
    pub agg_interval: &'static str,
}

impl TrendQuery {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("aggInterval", self.agg_interval.to_string()),
            ("dateStart", self.date_start.clone()),
            ("dateEnd", self.date_end.clone()),
            ("srcASN", self.src_asn.to_string()),
            ("dstASN", self.dst_asn.to_string()),
        ]
    }
}

/// `None` si l'un des serveurs n'a pas d'ASN connu
pub fn build_query(catalog: &Catalog, key: &TrendKey, now: OffsetDateTime) -> Option<TrendQuery> {
    let src_asn = catalog.asn_of(key.source)?;
    let dst_asn = catalog.asn_of(key.dest)?;
    let end = now.replace_nanosecond(0).unwrap_or(now);
    let start = end - key.range.lookback();
    Some(TrendQuery {
        src_asn,
        dst_asn,
        date_start: start.format(&Rfc3339).ok()?,
        date_end: end.format(&Rfc3339).ok()?,
        agg_interval: key.range.agg_interval(),
    })
}

#[derive(Debug, Deserialize)]
struct PairEnvelope {
    #[serde(default)]
    success: bool,
    result: Option<PairResult>,
}

#[derive(Debug, Deserialize)]
struct PairResult {
    pair: Option<PairSeries>,
}

#[derive(Debug, Deserialize)]
struct PairSeries {
    timestamps: Option<Vec<String>>,
    values: Option<Vec<Value>>,
}

/// "2024-05-01T12:34:56Z" → "2024-05-01 12:34"
fn timestamp_label(ts: &str) -> String {
    ts.get(..16).unwrap_or(ts).replace('T', " ")
}

/// Normalise la réponse paire en échantillons (ms). `None` = payload mal formé.
pub fn parse_trend_payload(payload: &Value) -> Option<Vec<TrendSample>> {
    let envelope: PairEnvelope = serde_json::from_value(payload.clone()).ok()?;
    if !envelope.success {
        return None;
    }
    let series = envelope.result?.pair?;
    let (timestamps, values) = (series.timestamps?, series.values?);
    if timestamps.len() != values.len() {
        return None;
    }
    Some(
        timestamps
            .iter()
            .zip(values.iter())
            .map(|(ts, v)| TrendSample {
                time: timestamp_label(ts),
                latency_ms: value_as_f64(v).map(|x| (x * 1000.0).round()),
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendSummary {
    pub min: f64,
    pub max: f64,
    /// arrondie à 0.1 ms
    pub avg: f64,
}

/// `None` ("N/A") si aucun échantillon n'a de valeur
pub fn summarize(samples: &[TrendSample]) -> Option<TrendSummary> {
    let values: Vec<f64> = samples.iter().filter_map(|s| s.latency_ms).collect();
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    Some(TrendSummary {
        min,
        max,
        avg: (mean * 10.0).round() / 10.0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendPhase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Preuve d'émission d'une requête ; comparée à la génération courante au retour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendTicket {
    generation: u64,
    key: TrendKey,
}

impl TrendTicket {
    pub fn key(&self) -> TrendKey {
        self.key
    }
}

#[derive(Debug, Clone)]
pub struct TrendRequest {
    pub ticket: TrendTicket,
    pub query: TrendQuery,
}

#[derive(Debug, Default)]
pub struct TrendState {
    phase: TrendPhase,
    key: Option<TrendKey>,
    samples: Vec<TrendSample>,
    error: Option<String>,
    generation: u64,
}

impl TrendState {
    pub fn begin(&mut self, key: TrendKey) -> TrendTicket {
        self.generation += 1;
        self.phase = TrendPhase::Loading;
        self.key = Some(key);
        self.samples.clear();
        self.error = None;
        TrendTicket { generation: self.generation, key }
    }

    /// Retour à Idle ; invalide aussi toute requête en vol
    pub fn reset(&mut self) {
        self.generation += 1;
        self.phase = TrendPhase::Idle;
        self.key = None;
        self.samples.clear();
        self.error = None;
    }

    /// `false` si le ticket est périmé (la réponse est jetée)
    pub fn complete(&mut self, ticket: TrendTicket, outcome: Result<Vec<TrendSample>, String>) -> bool {
        if ticket.generation != self.generation || self.key != Some(ticket.key) {
            return false;
        }
        match outcome {
            Ok(samples) => {
                self.samples = samples;
                self.phase = TrendPhase::Success;
            }
            Err(message) => {
                self.samples.clear();
                self.error = Some(message);
                self.phase = TrendPhase::Error;
            }
        }
        true
    }

    pub fn phase(&self) -> TrendPhase {
        self.phase
    }

    pub fn key(&self) -> Option<TrendKey> {
        self.key
    }

    pub fn samples(&self) -> &[TrendSample] {
        &self.samples
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Émet la requête puis tente de valider le résultat dans le store.
/// Renvoie `true` si le résultat a été retenu.
pub async fn run_trend_request<S: LatencySource>(source: &S, store: &ViewStore, request: TrendRequest) -> bool {
    let key = request.ticket.key();
    let outcome = match source.fetch_pair(request.query).await {
        Ok(payload) => parse_trend_payload(&payload).ok_or_else(|| NO_DATA_MESSAGE.to_string()),
        Err(e) => {
            warn!("[trends] fetch failed for {} -> {}: {}", key.source, key.dest, e);
            Err(format!("Error fetching data: {e}"))
        }
    };
    let committed = store.complete_trend(request.ticket, outcome);
    if !committed {
        debug!("[trends] discarded stale response for {} -> {}", key.source, key.dest);
    }
    committed
}
