use crate::error::EdgeError;
use serde::{Deserialize, Serialize};

/// Fournisseur cloud hébergeant un serveur ou une région
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Gcp];

    /// Couleur des marqueurs serveurs sur le globe
    pub fn marker_color(self) -> &'static str {
        match self {
            Provider::Aws => "red",
            Provider::Azure => "blue",
            Provider::Gcp => "yellow",
        }
    }

    /// Couleur des marqueurs de régions et des libellés du panneau de filtres
    pub fn region_color(self) -> &'static str {
        match self {
            Provider::Aws => "orange",
            Provider::Azure => "deepskyblue",
            Provider::Gcp => "limegreen",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Azure => "Azure",
            Provider::Gcp => "GCP",
        }
    }
}

/// Serveur d'exchange affiché comme marqueur (donnée de référence immuable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    pub provider: Provider,
    pub lat: f64,
    pub lon: f64,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub provider: Provider,
    pub region_code: String,
    pub lat: f64,
    pub lon: f64,
    pub host_count: u32,
}

/// Mesure de latence orientée entre deux serveurs du catalogue.
/// Les indices sont validés à la construction : `source != dest`, tous deux `< |hosts|`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyEdge {
    source: usize,
    dest: usize,
    latency_ms: f64,
}

impl LatencyEdge {
    pub fn new(source: usize, dest: usize, latency_ms: f64, host_count: usize) -> Result<Self, EdgeError> {
        for index in [source, dest] {
            if index >= host_count {
                return Err(EdgeError::IndexOutOfRange { index, host_count });
            }
        }
        if source == dest {
            return Err(EdgeError::SelfLoop(source));
        }
        Ok(Self { source, dest, latency_ms })
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn dest(&self) -> usize {
        self.dest
    }

    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }
}

/// Point d'une série historique ; `None` = trou dans les données amont
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSample {
    pub time: String,
    pub latency_ms: Option<f64>,
}

/// Entrée de `/api/exchange-locations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeLocation {
    pub exchange: String,
    pub provider: String,
    pub location: String,
    pub lat: f64,
    pub lon: f64,
}

/// Catalogue de référence chargé au démarrage, partagé en lecture seule
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub hosts: Vec<Host>,
    pub regions: Vec<Region>,
    /// host id -> ASN utilisé pour les requêtes de tendance
    pub asns: Vec<(String, u32)>,
}

impl Catalog {
    pub fn host_index(&self, host_id: &str) -> Option<usize> {
        self.hosts.iter().position(|h| h.id == host_id)
    }

    pub fn asn_of(&self, host_index: usize) -> Option<u32> {
        let host = self.hosts.get(host_index)?;
        self.asns.iter().find(|(id, _)| *id == host.id).map(|(_, asn)| *asn)
    }

    /// Toutes les paires ordonnées (i, j), i != j, pour le sélecteur du panneau de tendances
    pub fn pair_options(&self) -> Vec<PairOption> {
        let mut options = Vec::new();
        for (i, src) in self.hosts.iter().enumerate() {
            for (j, dst) in self.hosts.iter().enumerate() {
                if i != j {
                    options.push(PairOption {
                        source: i,
                        dest: j,
                        label: format!("{} → {}", src.name, dst.name),
                    });
                }
            }
        }
        options
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairOption {
    pub source: usize,
    pub dest: usize,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference;

    #[test]
    fn test_edge_index_invariants() {
        assert!(LatencyEdge::new(0, 1, 120.0, 3).is_ok());
        assert_eq!(
            LatencyEdge::new(0, 3, 120.0, 3),
            Err(EdgeError::IndexOutOfRange { index: 3, host_count: 3 })
        );
        assert_eq!(LatencyEdge::new(2, 2, 120.0, 3), Err(EdgeError::SelfLoop(2)));
    }

    #[test]
    fn test_provider_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::Azure).unwrap(), "\"azure\"");
        let p: Provider = serde_json::from_str("\"gcp\"").unwrap();
        assert_eq!(p, Provider::Gcp);
    }

    #[test]
    fn test_catalog_lookups() {
        let catalog = reference::catalog();
        assert_eq!(catalog.host_index("okx.com"), Some(1));
        assert_eq!(catalog.host_index("kraken.com"), None);
        assert_eq!(catalog.asn_of(2), Some(264777));
        assert_eq!(catalog.asn_of(9), None);
    }

    #[test]
    fn test_pair_options_exclude_self_pairs() {
        let options = reference::catalog().pair_options();
        assert_eq!(options.len(), 6);
        assert!(options.iter().all(|o| o.source != o.dest));
        assert_eq!(options[0].label, "Binance → OKX");
    }
}
