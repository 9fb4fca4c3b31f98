/**
 * ANIMATION DRIVER - Pulses le long des arcs de latence
 *
 * RÔLE :
 * Calcule, pour une image donnée, la position de chaque pulse sur le chemin
 * échantillonné d'un arc. Fonction pure de l'horloge : aucune intégration
 * d'une image à l'autre, donc aucune dérive même si des images sont sautées.
 *
 * Contient aussi les arcs prêts au rendu (`ArcPath`) et le compteur FPS.
 */

use crate::geo::{arc_midpoint, project_to_sphere, quadratic_point, sample_quadratic_curve, Point3, GLOBE_RADIUS};
use crate::latency::{latency_color, LatencyColor};
use crate::models::{Host, LatencyEdge};
use serde::Serialize;

/// Nombre de segments d'un arc (101 points)
pub const ARC_SEGMENTS: usize = 100;

/// Paramètres d'une traînée de pulses
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrailConfig {
    pub trail_count: usize,
    pub speed: f64,
    /// décalage temporel entre deux pulses (ms)
    pub interval_ms: f64,
    pub radius: f64,
}

impl Default for TrailConfig {
    fn default() -> Self {
        Self {
            trail_count: 5,
            speed: 1.2,
            interval_ms: 150.0,
            radius: 0.025,
        }
    }
}

/// Indice du point occupé par chaque pulse à l'instant `now_ms`.
/// Chemin vide ⇒ aucun indice (pulses masqués, jamais placés à l'origine).
pub fn pulse_indices(path_len: usize, now_ms: f64, trail: &TrailConfig) -> Vec<usize> {
    if path_len == 0 {
        return Vec::new();
    }
    let last = path_len - 1;
    (0..trail.trail_count)
        .map(|i| {
            let phase = (now_ms - i as f64 * trail.interval_ms) * trail.speed * 0.001;
            let t = phase.rem_euclid(1.0);
            ((t * last as f64).floor() as usize).min(last)
        })
        .collect()
}

pub fn pulse_positions(path: &[Point3], now_ms: f64, trail: &TrailConfig) -> Vec<Point3> {
    pulse_indices(path.len(), now_ms, trail)
        .into_iter()
        .map(|i| path[i])
        .collect()
}

/// Arc de latence prêt au rendu
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcPath {
    pub source: usize,
    pub dest: usize,
    pub latency_ms: f64,
    pub color: LatencyColor,
    pub color_hex: &'static str,
    pub points: Vec<Point3>,
    pub label_position: Point3,
    pub label: String,
}

impl ArcPath {
    /// `None` si un indice de l'arête ne pointe plus dans `hosts`
    pub fn from_edge(edge: &LatencyEdge, hosts: &[Host]) -> Option<Self> {
        let from = hosts.get(edge.source())?;
        let to = hosts.get(edge.dest())?;
        let start = project_to_sphere(from.lat, from.lon, GLOBE_RADIUS);
        let end = project_to_sphere(to.lat, to.lon, GLOBE_RADIUS);
        let control = arc_midpoint(&start, &end, GLOBE_RADIUS);
        let color = latency_color(edge.latency_ms());
        Some(Self {
            source: edge.source(),
            dest: edge.dest(),
            latency_ms: edge.latency_ms(),
            color,
            color_hex: color.hex(),
            points: sample_quadratic_curve(&start, &control, &end, ARC_SEGMENTS),
            label_position: quadratic_point(&start, &control, &end, 0.5),
            label: format!("{} ms", edge.latency_ms()),
        })
    }

    pub fn pulses(&self, now_ms: f64, trail: &TrailConfig) -> Vec<Point3> {
        pulse_positions(&self.points, now_ms, trail)
    }
}

/// FPS instantané à partir du delta entre deux images
#[derive(Debug, Clone)]
pub struct FpsTracker {
    last_frame_ms: f64,
}

impl FpsTracker {
    pub fn new(start_ms: f64) -> Self {
        Self { last_frame_ms: start_ms }
    }

    /// `None` si le delta est nul ou négatif (horloge non monotone)
    pub fn tick(&mut self, now_ms: f64) -> Option<f64> {
        let delta = now_ms - self.last_frame_ms;
        self.last_frame_ms = now_ms;
        (delta > 0.0).then(|| 1000.0 / delta)
    }
}
