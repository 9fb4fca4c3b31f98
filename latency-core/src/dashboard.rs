/**
 * DASHBOARD SESSION - Cycle de vie d'une visualisation montée
 *
 * RÔLE :
 * Assemble le store, le poller et le déclenchement des tendances pour une
 * session. C'est l'unique point d'entrée des consommateurs de rendu.
 *
 * FONCTIONNEMENT :
 * - `mount` : monte le store puis démarre le poller
 * - Une sélection (serveur ou paire) relance toujours la requête de tendance,
 *   même pour la paire déjà affichée (nouvel essai après une erreur)
 * - Les autres mutations ne relancent que si (paire, fenêtre) a changé ;
 *   la nouvelle requête rend l'ancienne périmée
 * - `unmount` : démonte le store, arrête le poller, annule les requêtes
 *   de tendance en vol
 * - `view` applique les bascules de couches au résultat du moteur de filtres
 */

use crate::animation::{ArcPath, FpsTracker, TrailConfig};
use crate::error::ViewError;
use crate::filters::DerivedView;
use crate::geo::Point3;
use crate::models::{Catalog, Host, LatencyEdge, Region, TrendSample};
use crate::poller::{spawn_poller, PollStats, PollerHandle, DEFAULT_POLL_INTERVAL};
use crate::state::{new_state, Shared};
use crate::store::{FiltersPatch, ViewFilters, ViewStore};
use crate::trends::{run_trend_request, summarize, TimeRange, TrendKey, TrendPhase, TrendSummary};
use crate::upstream::LatencySource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub poll_interval: Duration,
    pub trail: TrailConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            trail: TrailConfig::default(),
        }
    }
}

/// Panneau historique : paire, fenêtre, état de chargement et statistiques
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPanel {
    pub source: String,
    pub dest: String,
    pub title: String,
    pub time_range: TimeRange,
    pub phase: TrendPhase,
    pub samples: Vec<TrendSample>,
    pub error: Option<String>,
    /// `None` = "N/A"
    pub summary: Option<TrendSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub filters: ViewFilters,
    pub fps: f64,
    pub selected_host: Option<String>,
    pub hosts: Vec<Host>,
    pub edges: Vec<LatencyEdge>,
    pub arcs: Vec<ArcPath>,
    pub regions: Vec<Region>,
    pub edges_total: usize,
    pub trend_panel: Option<TrendPanel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcPulses {
    pub source: usize,
    pub dest: usize,
    pub color_hex: &'static str,
    pub radius: f64,
    pub positions: Vec<Point3>,
}

pub struct Dashboard<S: LatencySource> {
    store: ViewStore,
    source: Arc<S>,
    trail: TrailConfig,
    poller: PollerHandle,
    fps: Shared<Option<FpsTracker>>,
    trend_tasks: Shared<Vec<JoinHandle<bool>>>,
}

impl<S: LatencySource> Dashboard<S> {
    /// Monte la session ; doit être appelé depuis un runtime tokio
    pub fn mount(catalog: Arc<Catalog>, source: Arc<S>, config: DashboardConfig) -> Self {
        let store = ViewStore::new(catalog);
        store.mount();
        let poller = spawn_poller(Arc::clone(&source), store.clone(), config.poll_interval);
        info!("[dashboard] mounted ({} hosts)", store.catalog().hosts.len());
        Self {
            store,
            source,
            trail: config.trail,
            poller,
            fps: new_state(None),
            trend_tasks: new_state(Vec::new()),
        }
    }

    pub fn unmount(&self) {
        self.store.unmount();
        self.poller.stop();
        for task in self.trend_tasks.lock().drain(..) {
            task.abort();
        }
        info!("[dashboard] unmounted");
    }

    pub fn store(&self) -> &ViewStore {
        &self.store
    }

    pub fn poll_stats(&self) -> PollStats {
        self.poller.stats()
    }

    pub fn select_host(&self, host_id: Option<&str>) -> Result<bool, ViewError> {
        let before = self.store.trend_key();
        let changed = self.store.select_host(host_id)?;
        self.refresh_trend(before, host_id.is_some());
        Ok(changed)
    }

    pub fn set_pair(&self, source: usize, dest: usize) -> Result<bool, ViewError> {
        let before = self.store.trend_key();
        let changed = self.store.set_pair(Some((source, dest)))?;
        self.refresh_trend(before, true);
        Ok(changed)
    }

    pub fn update_filters(&self, patch: FiltersPatch) -> bool {
        let before = self.store.trend_key();
        let changed = self.store.apply_patch(patch);
        self.refresh_trend(before, false);
        changed
    }

    pub fn close_trends(&self) -> bool {
        self.store.close_trends()
    }

    /// Horodatage d'une image rendue ; renvoie le FPS s'il a pu être calculé
    pub fn record_frame(&self, now_ms: f64) -> Option<f64> {
        let mut tracker = self.fps.lock();
        let fps = match tracker.as_mut() {
            Some(t) => t.tick(now_ms),
            None => {
                *tracker = Some(FpsTracker::new(now_ms));
                None
            }
        };
        if let Some(fps) = fps {
            self.store.set_fps(fps);
        }
        fps
    }

    pub fn view(&self) -> DashboardView {
        let filters = self.store.filters();
        let derived: Arc<DerivedView> = self.store.derived();
        let layers = filters.layers;
        let trend_panel = (layers.historical && self.store.show_trends())
            .then(|| self.trend_panel(&filters))
            .flatten();

        DashboardView {
            fps: self.store.fps(),
            selected_host: self.store.selected_host(),
            hosts: derived.hosts.clone(),
            edges: derived.edges.clone(),
            arcs: if layers.realtime { derived.arcs.clone() } else { Vec::new() },
            regions: if layers.regions { derived.regions.clone() } else { Vec::new() },
            edges_total: self.store.edges().len(),
            trend_panel,
            filters,
        }
    }

    /// Position des pulses de chaque arc affiché à l'instant `now_ms`
    pub fn pulses(&self, now_ms: f64) -> Vec<ArcPulses> {
        if !self.store.filters().layers.realtime {
            return Vec::new();
        }
        self.store
            .derived()
            .arcs
            .iter()
            .map(|arc| ArcPulses {
                source: arc.source,
                dest: arc.dest,
                color_hex: arc.color_hex,
                radius: self.trail.radius,
                positions: arc.pulses(now_ms, &self.trail),
            })
            .collect()
    }

    /// Attend la fin des requêtes de tendance en vol
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<bool>> = std::mem::take(&mut *self.trend_tasks.lock());
            if pending.is_empty() {
                return;
            }
            for task in pending {
                let _ = task.await;
            }
        }
    }

    fn trend_panel(&self, filters: &ViewFilters) -> Option<TrendPanel> {
        let (src, dst) = filters.selected_pair?;
        let hosts = &self.store.catalog().hosts;
        let (source, dest) = (hosts.get(src)?.name.clone(), hosts.get(dst)?.name.clone());
        let trend = self.store.trend();
        Some(TrendPanel {
            title: format!("Latency Trend: {source} → {dest}"),
            source,
            dest,
            time_range: filters.time_range,
            phase: trend.phase,
            summary: summarize(&trend.samples),
            samples: trend.samples,
            error: trend.error,
        })
    }

    fn refresh_trend(&self, before: Option<TrendKey>, reselected: bool) {
        let after = self.store.trend_key();
        if after == before && !reselected {
            return;
        }
        let Some(request) = self.store.begin_trend(OffsetDateTime::now_utc()) else {
            return;
        };
        debug!(
            "[dashboard] trend request {} -> {} ({})",
            request.query.src_asn, request.query.dst_asn, request.query.agg_interval
        );
        let source = Arc::clone(&self.source);
        let store = self.store.clone();
        let task = tokio::spawn(async move { run_trend_request(&*source, &store, request).await });

        let mut tasks = self.trend_tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }
}

impl<S: LatencySource> Drop for Dashboard<S> {
    fn drop(&mut self) {
        if self.store.is_mounted() {
            self.unmount();
        }
    }
}
