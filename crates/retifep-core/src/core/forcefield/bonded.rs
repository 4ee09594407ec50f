use crate::core::models::topology::{Angle, Bond};
use crate::core::utils::geometry::angle_degrees;
use nalgebra::Point3;

/// Harmonic bond and angle energy of one molecule.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BondedEnergy {
    pub bonds: f64,
    pub angles: f64,
}

impl BondedEnergy {
    #[inline]
    pub fn total(&self) -> f64 {
        self.bonds + self.angles
    }
}

/// `E = k (r - r₀)²` summed over the bonds.
pub fn harmonic_bonds(positions: &[Point3<f64>], bonds: &[Bond]) -> f64 {
    bonds
        .iter()
        .filter_map(|b| {
            let (p1, p2) = (positions.get(b.atom1)?, positions.get(b.atom2)?);
            let dr = (p2 - p1).norm() - b.length;
            Some(b.force_constant * dr * dr)
        })
        .sum()
}

/// `E = k (θ - θ₀)²` summed over the angles, with θ in radians.
pub fn harmonic_angles(positions: &[Point3<f64>], angles: &[Angle]) -> f64 {
    angles
        .iter()
        .filter_map(|a| {
            let theta = angle_degrees(
                positions.get(a.atom1)?,
                positions.get(a.atom2)?,
                positions.get(a.atom3)?,
            )?;
            let dtheta = (theta - a.angle).to_radians();
            Some(a.force_constant * dtheta * dtheta)
        })
        .sum()
}

pub fn bonded_energy(positions: &[Point3<f64>], bonds: &[Bond], angles: &[Angle]) -> BondedEnergy {
    BondedEnergy {
        bonds: harmonic_bonds(positions, bonds),
        angles: harmonic_angles(positions, angles),
    }
}
