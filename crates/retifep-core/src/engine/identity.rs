use super::error::EngineError;
use super::monitor::EnergyMonitor;
use super::system::PerturbedSystem;
use crate::core::models::configuration::Configuration;
use crate::core::models::ids::MoleculeId;
use crate::core::models::space::Space;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A fixed reference coordinate, captured once at setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityPoint {
    pub label: String,
    pub position: Point3<f64>,
}

/// Greedily matches each point, in order, to the nearest still-unassigned candidate.
///
/// Distances use the minimum image of `space`. Ties go to the candidate that comes
/// first in `pool`. Points left over once the pool is exhausted map to `None`.
pub fn assign(
    pool: &[(MoleculeId, Point3<f64>)],
    points: &[IdentityPoint],
    space: &Space,
) -> Vec<Option<MoleculeId>> {
    let mut taken = vec![false; pool.len()];
    points
        .iter()
        .map(|point| {
            let mut best: Option<(usize, f64)> = None;
            for (i, (_, position)) in pool.iter().enumerate() {
                if taken[i] {
                    continue;
                }
                let d2 = space.distance_squared(&point.position, position);
                if best.is_none_or(|(_, best_d2)| d2 < best_d2) {
                    best = Some((i, d2));
                }
            }
            best.map(|(i, _)| {
                taken[i] = true;
                pool[i].0
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Stamp {
    uid: u64,
    generation: u64,
}

impl Stamp {
    fn of(config: &Configuration) -> Self {
        Self {
            uid: config.uid(),
            generation: config.generation(),
        }
    }
}

/// Follows diffusing solvent molecules through a set of fixed sites around the solute.
///
/// The tracker owns only the site → molecule mapping. The mapping is stamped with the
/// configuration it was computed for and refuses to be read against any other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityTracker {
    points: Vec<IdentityPoint>,
    mapping: Vec<Option<MoleculeId>>,
    stamp: Option<Stamp>,
    monitors: Vec<EnergyMonitor>,
}

impl IdentityTracker {
    /// Captures the centroids of the `num_sites` solvent molecules nearest the solute.
    pub fn capture(
        system: &PerturbedSystem,
        config: &Configuration,
        num_sites: usize,
        histogram_bin_width: Option<f64>,
    ) -> Self {
        let space = system.molecules().space();
        let solute_center = config.centroid(system.solute_id()).unwrap_or_else(Point3::origin);
        let mut pool = solvent_pool(system, config);
        pool.sort_by(|a, b| {
            let da = space.distance_squared(&solute_center, &a.1);
            let db = space.distance_squared(&solute_center, &b.1);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        });
        let points: Vec<IdentityPoint> = pool
            .iter()
            .take(num_sites)
            .enumerate()
            .map(|(k, (_, position))| IdentityPoint {
                label: format!("site{}", k + 1),
                position: *position,
            })
            .collect();
        let monitors = vec![EnergyMonitor::new(histogram_bin_width); points.len()];
        Self {
            mapping: vec![None; points.len()],
            points,
            stamp: None,
            monitors,
        }
    }

    pub fn points(&self) -> &[IdentityPoint] {
        &self.points
    }

    pub fn monitors(&self) -> &[EnergyMonitor] {
        &self.monitors
    }

    /// Re-matches every site if the configuration changed since the last update.
    pub fn update(&mut self, system: &PerturbedSystem, config: &Configuration) {
        let stamp = Stamp::of(config);
        if self.stamp == Some(stamp) {
            return;
        }
        let pool = solvent_pool(system, config);
        self.mapping = assign(&pool, &self.points, system.molecules().space());
        self.stamp = Some(stamp);
    }

    /// The current mapping, provided it was computed for exactly this configuration.
    pub fn mapping(&self, config: &Configuration) -> Result<&[Option<MoleculeId>], EngineError> {
        let current = Stamp::of(config);
        match self.stamp {
            Some(stamp) if stamp == current => Ok(&self.mapping),
            stamp => {
                let stamp = stamp.unwrap_or(Stamp {
                    uid: 0,
                    generation: 0,
                });
                Err(EngineError::StaleIdentityMapping {
                    mapped_uid: stamp.uid,
                    mapped_generation: stamp.generation,
                    uid: current.uid,
                    generation: current.generation,
                })
            }
        }
    }

    /// Updates the mapping and records the solute interaction of every occupied site.
    pub fn record(
        &mut self,
        system: &mut PerturbedSystem,
        config: &Configuration,
    ) -> Result<(), EngineError> {
        self.update(system, config);
        let occupants: Vec<Option<MoleculeId>> = self.mapping(config)?.to_vec();
        for (monitor, occupant) in self.monitors.iter_mut().zip(occupants) {
            if let Some(id) = occupant {
                monitor.push(system.solute_interaction(config, id)?);
            }
        }
        Ok(())
    }

    pub fn end_block(&mut self) {
        self.monitors.iter_mut().for_each(EnergyMonitor::end_block);
    }
}

fn solvent_pool(system: &PerturbedSystem, config: &Configuration) -> Vec<(MoleculeId, Point3<f64>)> {
    system
        .solvent_ids()
        .iter()
        .filter_map(|&id| config.centroid(id).map(|c| (id, c)))
        .collect()
}
