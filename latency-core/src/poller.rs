/**
 * POLLING FETCHER - Rafraîchissement périodique des arêtes de latence
 *
 * RÔLE :
 * Tâche récurrente (10s par défaut) qui interroge la source amont et
 * remplace en bloc le jeu d'arêtes du store.
 *
 * FONCTIONNEMENT :
 * - Un seul appel en vol : les ticks sont traités séquentiellement dans la
 *   même boucle, les ticks manqués sont sautés (pas de rattrapage en rafale)
 * - Échec HTTP ou payload mal formé ⇒ tick sans effet, arêtes précédentes
 *   conservées, échec seulement loggé
 * - Normalisation : dernière valeur non nulle de `serie_0.values` (en
 *   partant de la fin), convertie en ms, puis éventail synthétique de trois
 *   arêtes 0→1 (X), 1→2 (X+20), 2→0 (X+40)
 * - Arrêt : `stop()` coupe la boucle ; le store démonté refuse toute écriture
 */

use crate::error::SourceError;
use crate::models::LatencyEdge;
use crate::state::{new_state, Shared};
use crate::store::ViewStore;
use crate::upstream::{value_as_f64, LatencySource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Décalages (ms) de l'éventail synthétique : (source, destination, offset)
const SYNTHETIC_FAN_OUT: [(usize, usize, f64); 3] = [(0, 1, 0.0), (1, 2, 20.0), (2, 0, 40.0)];

#[derive(Debug, Deserialize)]
struct LatestEnvelope {
    #[serde(default)]
    success: bool,
    result: Option<LatestResult>,
}

#[derive(Debug, Deserialize)]
struct LatestResult {
    serie_0: Option<LatestSeries>,
}

#[derive(Debug, Deserialize)]
struct LatestSeries {
    values: Option<Vec<Value>>,
}

/// Dernière valeur exploitable en ms. Une valeur nulle (0) compte comme absente.
pub fn latest_latency_ms(payload: &Value) -> Option<f64> {
    let envelope: LatestEnvelope = serde_json::from_value(payload.clone()).ok()?;
    if !envelope.success {
        return None;
    }
    let values = envelope.result?.serie_0?.values?;
    let latest = values.iter().rev().find_map(value_as_f64)?;
    if latest == 0.0 {
        return None;
    }
    Some((latest * 1000.0).round())
}

/// Éventail de trois arêtes dérivé d'une seule mesure.
/// Les arêtes dont un indice sort du catalogue sont ignorées.
pub fn synthetic_edges(latency_ms: f64, host_count: usize) -> Vec<LatencyEdge> {
    SYNTHETIC_FAN_OUT
        .iter()
        .filter_map(|&(src, dst, offset)| LatencyEdge::new(src, dst, latency_ms + offset, host_count).ok())
        .collect()
}

#[derive(Debug)]
pub enum PollOutcome {
    /// Nombre d'arêtes écrites
    Replaced(usize),
    NoData,
    Failed(SourceError),
    /// Store démonté : résultat jeté
    Detached,
}

pub async fn poll_once<S: LatencySource>(source: &S, store: &ViewStore) -> PollOutcome {
    let payload = match source.fetch_latest().await {
        Ok(payload) => payload,
        Err(e) => return PollOutcome::Failed(e),
    };
    let Some(latency_ms) = latest_latency_ms(&payload) else {
        return PollOutcome::NoData;
    };
    let edges = synthetic_edges(latency_ms, store.catalog().hosts.len());
    let count = edges.len();
    if store.replace_edges(edges) {
        PollOutcome::Replaced(count)
    } else {
        PollOutcome::Detached
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PollStats {
    pub polls_ok: u64,
    pub polls_no_data: u64,
    pub polls_failed: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_success: Option<OffsetDateTime>,
}

impl PollStats {
    fn record(&mut self, outcome: &PollOutcome) {
        match outcome {
            PollOutcome::Replaced(_) => {
                self.polls_ok += 1;
                self.last_success = Some(OffsetDateTime::now_utc());
            }
            PollOutcome::NoData => self.polls_no_data += 1,
            PollOutcome::Failed(_) => self.polls_failed += 1,
            PollOutcome::Detached => {}
        }
    }
}

pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Shared<PollStats>,
}

impl PollerHandle {
    pub fn stats(&self) -> PollStats {
        self.stats.lock().clone()
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Démarre la boucle de polling ; le premier tick part immédiatement
pub fn spawn_poller<S: LatencySource>(source: Arc<S>, store: ViewStore, period: Duration) -> PollerHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);
    let stats = new_state(PollStats::default());
    let task_stats = stats.clone();

    let task = tokio::spawn(async move {
        info!("[poller] started (every {}s)", period.as_secs_f64());
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    let outcome = tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        outcome = poll_once(&*source, &store) => outcome,
                    };
                    match &outcome {
                        PollOutcome::Replaced(n) => debug!("[poller] replaced edge set ({} edges)", n),
                        PollOutcome::NoData => warn!("[poller] payload without usable latency, keeping previous edges"),
                        PollOutcome::Failed(e) => warn!("[poller] fetch failed, keeping previous edges: {}", e),
                        PollOutcome::Detached => {
                            task_stats.lock().record(&outcome);
                            break;
                        }
                    }
                    task_stats.lock().record(&outcome);
                }
            }
        }
        info!("[poller] stopped");
    });

    PollerHandle { shutdown, task, stats }
}
