use super::partition::PartitionError;
use super::table::BondedPerturbations;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::Connectivity;
use crate::core::utils::geometry::{
    angle_degrees, rotate_indices_about, rotation_from_axis_angle, translate_indices,
};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Result of adjusting one internal degree of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AdjustOutcome {
    /// Geometry moved from `from` to `to` (Å for bonds, degrees for angles).
    Applied { from: f64, to: f64 },
    /// The endpoint values differ by less than the tolerance, or the geometry is
    /// degenerate, so nothing was moved.
    Unchanged,
    /// Moving either side would drag the rest of a ring with it; the degree of freedom
    /// is left as is.
    SkippedRingBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentRecord {
    pub label: String,
    pub outcome: AdjustOutcome,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdjustmentReport {
    pub records: Vec<AdjustmentRecord>,
}

impl AdjustmentReport {
    pub fn applied(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, AdjustOutcome::Applied { .. }))
            .count()
    }

    pub fn skipped_ring_breaks(&self) -> impl Iterator<Item = &AdjustmentRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome == AdjustOutcome::SkippedRingBreak)
    }
}

/// Relaxes perturbed bonds and angles of the starting structure towards their
/// λ-interpolated equilibrium values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumAdjuster {
    /// Minimum endpoint difference (Å) for a bond to be adjusted.
    pub bond_tolerance: f64,
    /// Minimum endpoint difference (degrees) for an angle to be adjusted.
    pub angle_tolerance: f64,
}

impl Default for EquilibriumAdjuster {
    fn default() -> Self {
        Self {
            bond_tolerance: 1e-3,
            angle_tolerance: 0.1,
        }
    }
}

impl EquilibriumAdjuster {
    pub fn new(bond_tolerance: f64, angle_tolerance: f64) -> Self {
        Self {
            bond_tolerance,
            angle_tolerance,
        }
    }

    /// Sets the length of bond `a`-`b` to `target` by translating the smaller side.
    pub fn adjust_bond(
        &self,
        positions: &mut [Point3<f64>],
        connectivity: &Connectivity,
        a: usize,
        b: usize,
        target: f64,
    ) -> AdjustOutcome {
        if connectivity.in_ring(a, b) {
            return AdjustOutcome::SkippedRingBreak;
        }
        let axis = positions[b] - positions[a];
        let current = axis.norm();
        if current < 1e-12 {
            return AdjustOutcome::Unchanged;
        }
        let shift = axis / current * (target - current);

        let side_b = connectivity.fragment(b, a);
        let side_a = connectivity.fragment(a, b);
        if side_b.len() <= side_a.len() {
            translate_indices(positions, &side_b, &shift);
        } else {
            translate_indices(positions, &side_a, &(-shift));
        }
        AdjustOutcome::Applied {
            from: current,
            to: target,
        }
    }

    /// Sets angle `a`-`apex`-`c` to `target` degrees by rotating the smaller arm.
    pub fn adjust_angle(
        &self,
        positions: &mut [Point3<f64>],
        connectivity: &Connectivity,
        a: usize,
        apex: usize,
        c: usize,
        target: f64,
    ) -> AdjustOutcome {
        let side_c = connectivity.fragment(c, apex);
        if side_c.contains(&a) {
            return AdjustOutcome::SkippedRingBreak;
        }
        let side_a = connectivity.fragment(a, apex);

        let Some(current) = angle_degrees(&positions[a], &positions[apex], &positions[c]) else {
            return AdjustOutcome::Unchanged;
        };
        let normal = (positions[a] - positions[apex]).cross(&(positions[c] - positions[apex]));
        if normal.norm() < 1e-12 {
            return AdjustOutcome::Unchanged;
        }

        let center = positions[apex];
        let delta = target - current;
        if side_c.len() <= side_a.len() {
            let rotation = rotation_from_axis_angle(&normal, delta);
            rotate_indices_about(positions, &side_c, &center, &rotation);
        } else {
            let rotation = rotation_from_axis_angle(&normal, -delta);
            rotate_indices_about(positions, &side_a, &center, &rotation);
        }
        AdjustOutcome::Applied {
            from: current,
            to: target,
        }
    }

    /// Adjusts every perturbed bond and angle of the solute at `lambda`.
    ///
    /// Unknown atom names are an inconsistent topology. Ring-breaking adjustments are
    /// skipped, logged and reported.
    pub fn apply(
        &self,
        solute: &Molecule,
        positions: &mut [Point3<f64>],
        perturbations: &BondedPerturbations,
        lambda: f64,
    ) -> Result<AdjustmentReport, PartitionError> {
        let connectivity = solute.connectivity();
        let index = |name: &str| {
            solute
                .atom_index(name)
                .ok_or_else(|| PartitionError::UnknownAtom(name.to_string()))
        };
        let mut report = AdjustmentReport::default();

        for bond in &perturbations.bonds {
            let (a, b) = (index(&bond.atom1)?, index(&bond.atom2)?);
            let label = format!("bond {}-{}", bond.atom1, bond.atom2);
            let outcome = if (bond.final_length - bond.initial_length).abs() <= self.bond_tolerance {
                AdjustOutcome::Unchanged
            } else {
                let target = (1.0 - lambda) * bond.initial_length + lambda * bond.final_length;
                self.adjust_bond(positions, &connectivity, a, b, target)
            };
            log_outcome(&label, &outcome);
            report.records.push(AdjustmentRecord { label, outcome });
        }

        for angle in &perturbations.angles {
            let (a, apex, c) = (index(&angle.atom1)?, index(&angle.atom2)?, index(&angle.atom3)?);
            let label = format!("angle {}-{}-{}", angle.atom1, angle.atom2, angle.atom3);
            let outcome = if (angle.final_angle - angle.initial_angle).abs() <= self.angle_tolerance {
                AdjustOutcome::Unchanged
            } else {
                let target = (1.0 - lambda) * angle.initial_angle + lambda * angle.final_angle;
                self.adjust_angle(positions, &connectivity, a, apex, c, target)
            };
            log_outcome(&label, &outcome);
            report.records.push(AdjustmentRecord { label, outcome });
        }

        Ok(report)
    }
}

fn log_outcome(label: &str, outcome: &AdjustOutcome) {
    match outcome {
        AdjustOutcome::Applied { from, to } => {
            debug!(dof = label, from, to, "Adjusted equilibrium geometry.")
        }
        AdjustOutcome::SkippedRingBreak => {
            warn!(dof = label, "Skipping adjustment that would break a ring.")
        }
        AdjustOutcome::Unchanged => {}
    }
}
