/**
 * VIEW-STATE STORE - État de vue partagé d'une session de visualisation
 *
 * RÔLE :
 * Contient les filtres utilisateur, la sélection, le FPS courant, le jeu
 * d'arêtes courant et l'état du panneau de tendances. Passé explicitement
 * aux consommateurs (pas de singleton global).
 *
 * FONCTIONNEMENT :
 * - Un setter par champ ; réécrire la même valeur ne change rien (révision inchangée)
 * - Toute modification effective incrémente `revision` : la vue dérivée
 *   est recalculée à la lecture suivante, sinon servie depuis le cache
 * - `mounted` est lu sous le même verrou que les écritures d'arêtes et de
 *   tendances : après `unmount`, aucune réponse en vol ne peut plus muter l'état
 */

use crate::error::ViewError;
use crate::filters::{derive_view, DerivedView};
use crate::latency::LatencyFilter;
use crate::models::{Catalog, LatencyEdge, Provider, TrendSample};
use crate::state::{new_state, Shared};
use crate::trends::{build_query, TimeRange, TrendKey, TrendRequest, TrendState, TrendTicket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderToggles {
    pub aws: bool,
    pub azure: bool,
    pub gcp: bool,
}

impl Default for ProviderToggles {
    fn default() -> Self {
        Self { aws: true, azure: true, gcp: true }
    }
}

impl ProviderToggles {
    pub fn enabled(&self, provider: Provider) -> bool {
        match provider {
            Provider::Aws => self.aws,
            Provider::Azure => self.azure,
            Provider::Gcp => self.gcp,
        }
    }

    pub fn set(&mut self, provider: Provider, enabled: bool) {
        match provider {
            Provider::Aws => self.aws = enabled,
            Provider::Azure => self.azure = enabled,
            Provider::Gcp => self.gcp = enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerToggles {
    pub realtime: bool,
    pub historical: bool,
    pub regions: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self { realtime: true, historical: true, regions: true }
    }
}

/// Filtres d'une session, réinitialisés aux valeurs par défaut au chargement
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ViewFilters {
    pub text_query: String,
    pub providers: ProviderToggles,
    pub latency: LatencyFilter,
    pub layers: LayerToggles,
    pub selected_pair: Option<(usize, usize)>,
    pub time_range: TimeRange,
}

impl ViewFilters {
    /// Clé (paire, fenêtre) de la tendance à afficher ; `None` sans paire
    pub fn trend_key(&self) -> Option<TrendKey> {
        self.selected_pair
            .map(|(source, dest)| TrendKey { source, dest, range: self.time_range })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderPatch {
    pub aws: Option<bool>,
    pub azure: Option<bool>,
    pub gcp: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerPatch {
    pub realtime: Option<bool>,
    pub historical: Option<bool>,
    pub regions: Option<bool>,
}

/// Mise à jour partielle des filtres (corps de `PATCH /view/filters`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltersPatch {
    pub text_query: Option<String>,
    pub providers: Option<ProviderPatch>,
    pub latency: Option<LatencyFilter>,
    pub layers: Option<LayerPatch>,
    pub time_range: Option<TimeRange>,
}

/// Instantané de l'état de tendance pour le panneau historique
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSnapshot {
    pub phase: crate::trends::TrendPhase,
    pub key: Option<TrendKey>,
    pub samples: Vec<TrendSample>,
    pub error: Option<String>,
}

#[derive(Debug)]
struct ViewState {
    filters: ViewFilters,
    fps: f64,
    selected_host: Option<String>,
    show_trends: bool,
    edges: Vec<LatencyEdge>,
    trend: TrendState,
    mounted: bool,
    revision: u64,
    derived: Option<(u64, Arc<DerivedView>)>,
}

#[derive(Clone)]
pub struct ViewStore {
    catalog: Arc<Catalog>,
    state: Shared<ViewState>,
}

impl ViewStore {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            state: new_state(ViewState {
                filters: ViewFilters::default(),
                fps: 0.0,
                selected_host: None,
                show_trends: false,
                edges: Vec::new(),
                trend: TrendState::default(),
                mounted: false,
                revision: 0,
                derived: None,
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn mount(&self) {
        self.state.lock().mounted = true;
    }

    /// Après cet appel, `replace_edges` et `complete_trend` deviennent sans effet
    pub fn unmount(&self) {
        self.state.lock().mounted = false;
    }

    pub fn is_mounted(&self) -> bool {
        self.state.lock().mounted
    }

    pub fn filters(&self) -> ViewFilters {
        self.state.lock().filters.clone()
    }

    pub fn revision(&self) -> u64 {
        self.state.lock().revision
    }

    /// Applique `f` aux filtres ; `true` si quelque chose a réellement changé
    fn update_filters<F: FnOnce(&mut ViewFilters)>(&self, f: F) -> bool {
        let mut st = self.state.lock();
        let before = st.filters.clone();
        f(&mut st.filters);
        let changed = st.filters != before;
        if changed {
            st.revision += 1;
        }
        changed
    }

    pub fn set_text_query(&self, query: impl Into<String>) -> bool {
        let query = query.into();
        self.update_filters(|f| f.text_query = query)
    }

    pub fn set_provider_enabled(&self, provider: Provider, enabled: bool) -> bool {
        self.update_filters(|f| f.providers.set(provider, enabled))
    }

    pub fn set_latency_filter(&self, latency: LatencyFilter) -> bool {
        self.update_filters(|f| f.latency = latency)
    }

    pub fn set_layers(&self, layers: LayerToggles) -> bool {
        self.update_filters(|f| f.layers = layers)
    }

    pub fn set_time_range(&self, range: TimeRange) -> bool {
        self.update_filters(|f| f.time_range = range)
    }

    pub fn apply_patch(&self, patch: FiltersPatch) -> bool {
        self.update_filters(|f| {
            if let Some(query) = patch.text_query {
                f.text_query = query;
            }
            if let Some(p) = patch.providers {
                for (provider, value) in [(Provider::Aws, p.aws), (Provider::Azure, p.azure), (Provider::Gcp, p.gcp)] {
                    if let Some(enabled) = value {
                        f.providers.set(provider, enabled);
                    }
                }
            }
            if let Some(latency) = patch.latency {
                f.latency = latency;
            }
            if let Some(l) = patch.layers {
                f.layers.realtime = l.realtime.unwrap_or(f.layers.realtime);
                f.layers.historical = l.historical.unwrap_or(f.layers.historical);
                f.layers.regions = l.regions.unwrap_or(f.layers.regions);
            }
            if let Some(range) = patch.time_range {
                f.time_range = range;
            }
        })
    }

    /// Choix direct d'une paire depuis le sélecteur du panneau
    pub fn set_pair(&self, pair: Option<(usize, usize)>) -> Result<bool, ViewError> {
        if let Some((src, dst)) = pair {
            let n = self.catalog.hosts.len();
            if src >= n || dst >= n || src == dst {
                return Err(ViewError::InvalidPair(src, dst));
            }
        }
        Ok(self.update_filters(|f| f.selected_pair = pair))
    }

    /// Sélection d'un serveur : destination par défaut = serveur suivant (cyclique).
    /// `None` désélectionne, efface la paire et masque le panneau de tendances.
    pub fn select_host(&self, host_id: Option<&str>) -> Result<bool, ViewError> {
        let pair = match host_id {
            Some(id) => {
                let src = self
                    .catalog
                    .host_index(id)
                    .ok_or_else(|| ViewError::UnknownHost(id.to_string()))?;
                let n = self.catalog.hosts.len();
                (n > 1).then(|| (src, (src + 1) % n))
            }
            None => None,
        };

        let mut st = self.state.lock();
        let selected = host_id.map(str::to_string);
        // pas de panneau sans paire formable (catalogue à un seul serveur)
        let show_trends = pair.is_some();
        let changed = st.selected_host != selected
            || st.show_trends != show_trends
            || st.filters.selected_pair != pair;
        st.selected_host = selected;
        st.show_trends = show_trends;
        if st.filters.selected_pair != pair {
            st.filters.selected_pair = pair;
            st.revision += 1;
        }
        Ok(changed)
    }

    pub fn selected_host(&self) -> Option<String> {
        self.state.lock().selected_host.clone()
    }

    /// Ferme le panneau sans toucher à la paire sélectionnée
    pub fn close_trends(&self) -> bool {
        let mut st = self.state.lock();
        std::mem::replace(&mut st.show_trends, false)
    }

    pub fn show_trends(&self) -> bool {
        self.state.lock().show_trends
    }

    pub fn set_fps(&self, fps: f64) {
        self.state.lock().fps = fps;
    }

    pub fn fps(&self) -> f64 {
        self.state.lock().fps
    }

    /// Remplacement atomique (jamais de fusion) du jeu d'arêtes.
    /// `false` si la session est démontée : rien n'est écrit.
    pub fn replace_edges(&self, edges: Vec<LatencyEdge>) -> bool {
        let mut st = self.state.lock();
        if !st.mounted {
            return false;
        }
        if st.edges != edges {
            st.edges = edges;
            st.revision += 1;
        }
        true
    }

    pub fn edges(&self) -> Vec<LatencyEdge> {
        self.state.lock().edges.clone()
    }

    /// Vue filtrée, recalculée seulement si la révision a bougé
    pub fn derived(&self) -> Arc<DerivedView> {
        let mut st = self.state.lock();
        if let Some((rev, view)) = &st.derived {
            if *rev == st.revision {
                return Arc::clone(view);
            }
        }
        let view = Arc::new(derive_view(&self.catalog, &st.edges, &st.filters));
        st.derived = Some((st.revision, Arc::clone(&view)));
        view
    }

    pub fn trend_key(&self) -> Option<TrendKey> {
        self.state.lock().filters.trend_key()
    }

    /// Entre en `Loading` pour la clé courante et renvoie la requête à émettre.
    /// Sans paire (ou sans ASN connu) l'état revient à `Idle` et rien n'est émis.
    pub fn begin_trend(&self, now: OffsetDateTime) -> Option<TrendRequest> {
        let mut st = self.state.lock();
        if !st.mounted {
            return None;
        }
        let Some(key) = st.filters.trend_key() else {
            st.trend.reset();
            return None;
        };
        let Some(query) = build_query(&self.catalog, &key, now) else {
            debug!("[store] no ASN for pair {} -> {}, trend stays idle", key.source, key.dest);
            st.trend.reset();
            return None;
        };
        let ticket = st.trend.begin(key);
        Some(TrendRequest { ticket, query })
    }

    /// Valide une réponse de tendance ; ignorée si périmée, si la sélection
    /// courante ne correspond plus à sa clé ou si la session est démontée
    pub fn complete_trend(&self, ticket: TrendTicket, outcome: Result<Vec<TrendSample>, String>) -> bool {
        let mut st = self.state.lock();
        if !st.mounted || st.filters.trend_key() != Some(ticket.key()) {
            return false;
        }
        st.trend.complete(ticket, outcome)
    }

    pub fn trend(&self) -> TrendSnapshot {
        let st = self.state.lock();
        TrendSnapshot {
            phase: st.trend.phase(),
            key: st.trend.key(),
            samples: st.trend.samples().to_vec(),
            error: st.trend.error().map(str::to_string),
        }
    }
}
