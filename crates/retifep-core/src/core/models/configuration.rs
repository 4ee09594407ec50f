use super::ids::MoleculeId;
use super::system::MolecularSystem;
use crate::core::utils::geometry;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

/// The sampled state of a molecular system: coordinates and, when present, velocities.
///
/// A configuration is the unit that replica exchange moves between λ windows. It carries
/// a `uid` that travels with it across exchanges and a `generation` counter that is bumped
/// on every coordinate change, so consumers that cache per-configuration lookups (such as
/// the identity tracker) can detect when their cache is stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    uid: u64,
    generation: u64,
    coordinates: SecondaryMap<MoleculeId, Vec<Point3<f64>>>,
    velocities: Option<SecondaryMap<MoleculeId, Vec<Vector3<f64>>>>,
}

impl Configuration {
    /// Creates a configuration from the template coordinates of every molecule.
    ///
    /// # Arguments
    ///
    /// * `system` - The molecular system providing template positions.
    /// * `uid` - An identifier unique among the configurations of one run.
    pub fn from_system(system: &MolecularSystem, uid: u64) -> Self {
        let mut coordinates = SecondaryMap::new();
        for (id, molecule) in system.molecules_iter() {
            coordinates.insert(id, molecule.template_positions());
        }
        Self {
            uid,
            generation: 0,
            coordinates,
            velocities: None,
        }
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn positions(&self, id: MoleculeId) -> Option<&[Point3<f64>]> {
        self.coordinates.get(id).map(|v| v.as_slice())
    }

    /// Replaces the coordinates of one molecule and returns the previous ones.
    ///
    /// Returns `None` (and changes nothing) if the molecule is unknown or the atom count
    /// differs from the stored coordinates.
    pub fn replace_positions(
        &mut self,
        id: MoleculeId,
        positions: Vec<Point3<f64>>,
    ) -> Option<Vec<Point3<f64>>> {
        let slot = self.coordinates.get_mut(id)?;
        if slot.len() != positions.len() {
            return None;
        }
        self.generation += 1;
        Some(std::mem::replace(slot, positions))
    }

    pub fn velocities(&self, id: MoleculeId) -> Option<&[Vector3<f64>]> {
        self.velocities
            .as_ref()
            .and_then(|v| v.get(id))
            .map(|v| v.as_slice())
    }

    pub fn set_velocities(&mut self, id: MoleculeId, velocities: Vec<Vector3<f64>>) {
        self.velocities
            .get_or_insert_with(SecondaryMap::new)
            .insert(id, velocities);
        self.generation += 1;
    }

    pub fn has_velocities(&self) -> bool {
        self.velocities.is_some()
    }

    pub fn centroid(&self, id: MoleculeId) -> Option<Point3<f64>> {
        geometry::centroid(self.coordinates.get(id)?)
    }

    /// Returns `true` if both configurations hold exactly the same coordinates.
    pub fn same_coordinates(&self, other: &Configuration) -> bool {
        self.coordinates.len() == other.coordinates.len()
            && self
                .coordinates
                .iter()
                .all(|(id, positions)| other.coordinates.get(id) == Some(positions))
    }
}
