use nalgebra::{Point3, Rotation3, Unit, Vector3};

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Angle `a`-`apex`-`c` in degrees. Returns `None` if either arm has zero length.
pub fn angle_degrees(a: &Point3<f64>, apex: &Point3<f64>, c: &Point3<f64>) -> Option<f64> {
    let u = a - apex;
    let v = c - apex;
    let norm = u.norm() * v.norm();
    if norm < 1e-12 {
        return None;
    }
    Some((u.dot(&v) / norm).clamp(-1.0, 1.0).acos().to_degrees())
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

pub fn translate_indices(points: &mut [Point3<f64>], indices: &[usize], shift: &Vector3<f64>) {
    for &i in indices {
        if let Some(p) = points.get_mut(i) {
            *p += shift;
        }
    }
}

pub fn rotate_indices_about(
    points: &mut [Point3<f64>],
    indices: &[usize],
    center: &Point3<f64>,
    rotation: &Rotation3<f64>,
) {
    for &i in indices {
        if let Some(p) = points.get_mut(i) {
            *p = center + rotation * (*p - center);
        }
    }
}

/// Applies a rigid-body rotation about the centroid followed by a translation.
pub fn rigid_body_move(
    points: &[Point3<f64>],
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Vec<Point3<f64>> {
    let Some(center) = centroid(points) else {
        return Vec::new();
    };
    points
        .iter()
        .map(|p| center + rotation * (p - center) + translation)
        .collect()
}
