//! Données de référence statiques : serveurs, régions, ASN, localisations d'exchanges.
//! Chargées une fois au démarrage, jamais recalculées.

use crate::latency::LatencyTier;
use crate::models::{Catalog, ExchangeLocation, Host, Provider, Region};
use serde::Serialize;

fn host(id: &str, name: &str, provider: Provider, lat: f64, lon: f64, city: &str) -> Host {
    Host {
        id: id.into(),
        name: name.into(),
        provider,
        lat,
        lon,
        city: city.into(),
    }
}

fn region(provider: Provider, code: &str, lat: f64, lon: f64, host_count: u32) -> Region {
    Region {
        provider,
        region_code: code.into(),
        lat,
        lon,
        host_count,
    }
}

pub fn hosts() -> Vec<Host> {
    vec![
        host("binance.com", "Binance", Provider::Aws, 47.6062, -122.3321, "Seattle, USA"),
        host("okx.com", "OKX", Provider::Azure, 22.3964, 114.1095, "Hong Kong"),
        host("bybit.com", "Bybit", Provider::Gcp, 1.3521, 103.8198, "Singapore"),
    ]
}

pub fn regions() -> Vec<Region> {
    vec![
        region(Provider::Aws, "us-east-1", 37.224, -77.433, 3),
        region(Provider::Aws, "us-west-1", 47.6062, -122.3321, 1),
        region(Provider::Azure, "eastus", 37.3719, -79.8164, 2),
        region(Provider::Gcp, "asia-south1", 19.076, 72.8777, 1),
    ]
}

pub fn asns() -> Vec<(String, u32)> {
    vec![
        ("binance.com".into(), 13335),
        ("okx.com".into(), 16509),
        ("bybit.com".into(), 264777),
    ]
}

pub fn catalog() -> Catalog {
    Catalog {
        hosts: hosts(),
        regions: regions(),
        asns: asns(),
    }
}

pub fn exchange_locations() -> Vec<ExchangeLocation> {
    let entry = |exchange: &str, provider: &str, location: &str, lat: f64, lon: f64| ExchangeLocation {
        exchange: exchange.into(),
        provider: provider.into(),
        location: location.into(),
        lat,
        lon,
    };
    vec![
        entry("Binance", "AWS", "Singapore", 1.3521, 103.8198),
        entry("Bybit", "Azure", "Tokyo", 35.6895, 139.6917),
        entry("OKX", "GCP", "Frankfurt", 50.1109, 8.6821),
        entry("Deribit", "AWS", "London", 51.5074, -0.1278),
        entry("Kraken", "Azure", "San Francisco", 37.7749, -122.4194),
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Legend {
    pub providers: Vec<LegendEntry>,
    pub latency: Vec<LegendEntry>,
}

pub fn legend() -> Legend {
    Legend {
        providers: Provider::ALL
            .iter()
            .map(|p| LegendEntry { label: p.label(), color: p.marker_color() })
            .collect(),
        latency: [LatencyTier::Low, LatencyTier::Medium, LatencyTier::High]
            .iter()
            .map(|t| LegendEntry { label: t.legend_label(), color: t.legend_color() })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_host_has_an_asn() {
        let catalog = catalog();
        for i in 0..catalog.hosts.len() {
            assert!(catalog.asn_of(i).is_some(), "host {} has no ASN", catalog.hosts[i].id);
        }
    }

    #[test]
    fn test_legend_covers_providers_and_tiers() {
        let legend = legend();
        assert_eq!(legend.providers.len(), 3);
        assert_eq!(legend.latency[0].color, "lime");
        assert_eq!(legend.latency[2].label, "High latency");
    }
}
