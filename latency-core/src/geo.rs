//! Projections lat/lon → sphère et construction des arcs de Bézier.

use nalgebra::Vector3;

pub type Point3 = Vector3<f64>;

/// Rayon du globe dans la scène
pub const GLOBE_RADIUS: f64 = 2.0;

/// Élévation de l'arc, proportionnelle à la longueur de la corde
const ARC_ELEVATION_FACTOR: f64 = 0.4;

/// Projection sphérique → cartésienne. (0, 0) tombe sur (radius, 0, 0).
/// Pas de bornage : lat/lon sont supposées valides.
pub fn project_to_sphere(lat: f64, lon: f64, radius: f64) -> Point3 {
    let phi = (90.0 - lat).to_radians();
    let theta = (lon + 180.0).to_radians();
    Vector3::new(
        -radius * phi.sin() * theta.cos(),
        radius * phi.cos(),
        radius * phi.sin() * theta.sin(),
    )
}

/// Point de contrôle de l'arc : milieu de la corde poussé vers l'extérieur
/// jusqu'à `radius + 0.4 * corde`.
pub fn arc_midpoint(start: &Point3, end: &Point3, radius: f64) -> Point3 {
    let mid = (start + end) * 0.5;
    let elevation = (start - end).norm() * ARC_ELEVATION_FACTOR;
    // points antipodaux : milieu à l'origine, on prend une normale à la corde
    let direction = mid
        .try_normalize(1e-12)
        .or_else(|| start.cross(&Vector3::y()).try_normalize(1e-12))
        .unwrap_or_else(Vector3::x);
    direction * (radius + elevation)
}

/// Échantillonne la courbe de Bézier quadratique en `segments + 1` points (t = 0..=1).
pub fn sample_quadratic_curve(start: &Point3, control: &Point3, end: &Point3, segments: usize) -> Vec<Point3> {
    if segments == 0 {
        return vec![*start];
    }
    (0..=segments)
        .map(|i| quadratic_point(start, control, end, i as f64 / segments as f64))
        .collect()
}

pub fn quadratic_point(start: &Point3, control: &Point3, end: &Point3, t: f64) -> Point3 {
    let u = 1.0 - t;
    start * (u * u) + control * (2.0 * u * t) + end * (t * t)
}
