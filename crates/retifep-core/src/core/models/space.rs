use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// The simulation space in which distances are measured.
///
/// Periodic boxes are orthorhombic; all distances use the minimum-image convention.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Space {
    /// Infinite, non-periodic space.
    #[default]
    Cartesian,
    /// Orthorhombic periodic box with the given edge lengths in Angstroms.
    Periodic { dimensions: Vector3<f64> },
}

impl Space {
    pub fn periodic(x: f64, y: f64, z: f64) -> Self {
        Space::Periodic {
            dimensions: Vector3::new(x, y, z),
        }
    }

    /// Maps a displacement onto its shortest periodic image.
    pub fn minimum_image(&self, delta: Vector3<f64>) -> Vector3<f64> {
        match self {
            Space::Cartesian => delta,
            Space::Periodic { dimensions } => Vector3::new(
                wrap(delta.x, dimensions.x),
                wrap(delta.y, dimensions.y),
                wrap(delta.z, dimensions.z),
            ),
        }
    }

    pub fn distance_squared(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_image(b - a).norm_squared()
    }

    pub fn distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.distance_squared(a, b).sqrt()
    }

    /// Half of the smallest box edge, or `None` for non-periodic space.
    pub fn min_half_dimension(&self) -> Option<f64> {
        match self {
            Space::Cartesian => None,
            Space::Periodic { dimensions } => Some(0.5 * dimensions.min()),
        }
    }
}

fn wrap(d: f64, length: f64) -> f64 {
    if length > 0.0 {
        d - length * (d / length).round()
    } else {
        d
    }
}
