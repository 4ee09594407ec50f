use super::atom::Atom;
use super::topology::{Angle, Bond, Connectivity};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The role a molecule plays in the simulation, assigned by the structure loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoleculeCategory {
    Solute,
    Protein,
    Solvent,
    Ion,
}

impl MoleculeCategory {
    /// Solvent and ions are mobile and treated as one environment group.
    pub fn is_solvent_like(self) -> bool {
        matches!(self, MoleculeCategory::Solvent | MoleculeCategory::Ion)
    }
}

#[derive(Debug, Error)]
#[error("Invalid molecule category string: '{0}'")]
pub struct ParseMoleculeCategoryError(String);

impl FromStr for MoleculeCategory {
    type Err = ParseMoleculeCategoryError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "solute" | "ligand" => Ok(MoleculeCategory::Solute),
            "protein" => Ok(MoleculeCategory::Protein),
            "solvent" | "water" => Ok(MoleculeCategory::Solvent),
            "ion" => Ok(MoleculeCategory::Ion),
            _ => Err(ParseMoleculeCategoryError(s.to_string())),
        }
    }
}

impl fmt::Display for MoleculeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                MoleculeCategory::Solute => "solute",
                MoleculeCategory::Protein => "protein",
                MoleculeCategory::Solvent => "solvent",
                MoleculeCategory::Ion => "ion",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub name: String,               // Residue-style name (e.g., "LIG", "WAT", "NA")
    pub category: MoleculeCategory, // Role assigned by the loader
    atoms: Vec<Atom>,               // Atoms in file order
    #[serde(default)]
    bonds: Vec<Bond>,
    #[serde(default)]
    angles: Vec<Angle>,
}

impl Molecule {
    pub fn new(name: &str, category: MoleculeCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            atoms: Vec::new(),
            bonds: Vec::new(),
            angles: Vec::new(),
        }
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, bond: Bond) {
        self.bonds.push(bond);
    }

    pub fn add_angle(&mut self, angle: Angle) {
        self.angles.push(angle);
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn angles(&self) -> &[Angle] {
        &self.angles
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atom_index(&self, name: &str) -> Option<usize> {
        self.atoms.iter().position(|a| a.name == name)
    }

    pub fn connectivity(&self) -> Connectivity {
        Connectivity::new(self.atoms.len(), &self.bonds)
    }

    pub fn template_positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }
}
