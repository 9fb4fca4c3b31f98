/**
 * FILTER / DERIVATION ENGINE
 *
 * Fonctions pures : (hosts, régions, arêtes, filtres) → sous-ensembles à rendre.
 * Mêmes entrées ⇒ mêmes sorties ; le cache éventuel vit dans le store, pas ici.
 *
 * Une arête passe si son palier est admis ET si chacune de ses deux
 * extrémités satisfait, indépendamment, le prédicat texte + fournisseur
 * des serveurs. Le prédicat est réévalué par extrémité (via l'index), pas
 * remplacé par une recherche dans l'ensemble déjà filtré.
 */

use crate::animation::ArcPath;
use crate::models::{Catalog, Host, LatencyEdge, Region};
use crate::store::ViewFilters;
use serde::Serialize;

/// Recherche insensible à la casse sur nom, id ou ville, ET fournisseur actif
pub fn host_matches(host: &Host, filters: &ViewFilters) -> bool {
    let query = filters.text_query.to_lowercase();
    let matches_search = host.name.to_lowercase().contains(&query)
        || host.id.to_lowercase().contains(&query)
        || host.city.to_lowercase().contains(&query);
    matches_search && filters.providers.enabled(host.provider)
}

pub fn filtered_hosts<'a>(hosts: &'a [Host], filters: &ViewFilters) -> Vec<&'a Host> {
    hosts.iter().filter(|h| host_matches(h, filters)).collect()
}

pub fn edge_matches(edge: &LatencyEdge, hosts: &[Host], filters: &ViewFilters) -> bool {
    if !filters.latency.admits(edge.latency_ms()) {
        return false;
    }
    let (Some(from), Some(to)) = (hosts.get(edge.source()), hosts.get(edge.dest())) else {
        return false;
    };
    host_matches(from, filters) && host_matches(to, filters)
}

pub fn filtered_edges<'a>(edges: &'a [LatencyEdge], hosts: &[Host], filters: &ViewFilters) -> Vec<&'a LatencyEdge> {
    edges.iter().filter(|e| edge_matches(e, hosts, filters)).collect()
}

/// Pas de filtre texte sur les régions
pub fn filtered_regions<'a>(regions: &'a [Region], filters: &ViewFilters) -> Vec<&'a Region> {
    regions.iter().filter(|r| filters.providers.enabled(r.provider)).collect()
}

/// Sous-ensembles filtrés + arcs correspondants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedView {
    pub hosts: Vec<Host>,
    pub edges: Vec<LatencyEdge>,
    pub regions: Vec<Region>,
    pub arcs: Vec<ArcPath>,
}

pub fn derive_view(catalog: &Catalog, edges: &[LatencyEdge], filters: &ViewFilters) -> DerivedView {
    let edges: Vec<LatencyEdge> = filtered_edges(edges, &catalog.hosts, filters).into_iter().copied().collect();
    let arcs = edges
        .iter()
        .filter_map(|e| ArcPath::from_edge(e, &catalog.hosts))
        .collect();
    DerivedView {
        hosts: filtered_hosts(&catalog.hosts, filters).into_iter().cloned().collect(),
        regions: filtered_regions(&catalog.regions, filters).into_iter().cloned().collect(),
        edges,
        arcs,
    }
}
