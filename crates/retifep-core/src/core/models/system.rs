use super::ids::MoleculeId;
use super::molecule::{Molecule, MoleculeCategory};
use super::space::Space;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// Represents a complete molecular system: categorized molecules in a simulation space.
///
/// The system is the static description handed over by the structure loaders. Molecule
/// order is insertion order and is stable, which makes every iteration over the system
/// (and therefore every candidate pool built from it) deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MolecularSystem {
    /// Primary storage for molecules using a slot map for stable IDs.
    molecules: SlotMap<MoleculeId, Molecule>,
    /// Insertion order of the molecules.
    order: Vec<MoleculeId>,
    /// The simulation space shared by all molecules.
    space: Space,
}

impl MolecularSystem {
    /// Creates a new, empty molecular system in the given space.
    pub fn new(space: Space) -> Self {
        Self {
            molecules: SlotMap::with_key(),
            order: Vec::new(),
            space,
        }
    }

    /// Adds a molecule and returns its stable ID.
    pub fn add_molecule(&mut self, molecule: Molecule) -> MoleculeId {
        let id = self.molecules.insert(molecule);
        self.order.push(id);
        id
    }

    /// Retrieves an immutable reference to a molecule by its ID.
    pub fn molecule(&self, id: MoleculeId) -> Option<&Molecule> {
        self.molecules.get(id)
    }

    /// Returns an iterator over all molecules in insertion order.
    pub fn molecules_iter(&self) -> impl Iterator<Item = (MoleculeId, &Molecule)> {
        self.order
            .iter()
            .filter_map(|&id| self.molecules.get(id).map(|m| (id, m)))
    }

    /// Returns the IDs of every molecule matching `predicate`, in insertion order.
    pub fn find_molecules(&self, predicate: impl Fn(&Molecule) -> bool) -> Vec<MoleculeId> {
        self.molecules_iter()
            .filter(|(_, m)| predicate(m))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn molecules_of(&self, category: MoleculeCategory) -> Vec<MoleculeId> {
        self.find_molecules(|m| m.category == category)
    }

    /// Finds the solute, optionally by name.
    ///
    /// Without a name the first solute-category molecule is returned.
    pub fn find_solute(&self, name: Option<&str>) -> Option<MoleculeId> {
        self.molecules_iter()
            .find(|(_, m)| {
                m.category == MoleculeCategory::Solute && name.is_none_or(|n| m.name == n)
            })
            .map(|(id, _)| id)
    }

    pub fn molecule_count(&self) -> usize {
        self.order.len()
    }

    pub fn space(&self) -> &Space {
        &self.space
    }
}
