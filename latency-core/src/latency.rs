/**
 * CLASSIFICATION DE LATENCE
 *
 * Deux granularités distinctes, volontairement séparées :
 * - `classify_latency` : 3 paliers (low/medium/high) utilisés par le filtre
 * - `latency_color` : 4 bandes (vert/jaune/orange/rouge) utilisées pour l'affichage
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyTier {
    Low,
    Medium,
    High,
}

impl LatencyTier {
    pub fn legend_color(self) -> &'static str {
        match self {
            LatencyTier::Low => "lime",
            LatencyTier::Medium => "yellow",
            LatencyTier::High => "red",
        }
    }

    pub fn legend_label(self) -> &'static str {
        match self {
            LatencyTier::Low => "Low latency",
            LatencyTier::Medium => "Medium latency",
            LatencyTier::High => "High latency",
        }
    }
}

pub fn classify_latency(ms: f64) -> LatencyTier {
    if ms < 200.0 {
        LatencyTier::Low
    } else if ms < 400.0 {
        LatencyTier::Medium
    } else {
        LatencyTier::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyColor {
    Green,
    Yellow,
    Orange,
    Red,
}

impl LatencyColor {
    pub fn hex(self) -> &'static str {
        match self {
            LatencyColor::Green => "#00ff00",
            LatencyColor::Yellow => "#ffff00",
            LatencyColor::Orange => "#ffa500",
            LatencyColor::Red => "#ff0000",
        }
    }
}

pub fn latency_color(ms: f64) -> LatencyColor {
    if ms < 200.0 {
        LatencyColor::Green
    } else if ms < 400.0 {
        LatencyColor::Yellow
    } else if ms < 600.0 {
        LatencyColor::Orange
    } else {
        LatencyColor::Red
    }
}

/// Sélection du filtre de latence côté utilisateur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyFilter {
    #[default]
    All,
    Low,
    Medium,
    High,
}

impl LatencyFilter {
    pub fn admits(self, ms: f64) -> bool {
        let tier = classify_latency(ms);
        match self {
            LatencyFilter::All => true,
            LatencyFilter::Low => tier == LatencyTier::Low,
            LatencyFilter::Medium => tier == LatencyTier::Medium,
            LatencyFilter::High => tier == LatencyTier::High,
        }
    }
}
