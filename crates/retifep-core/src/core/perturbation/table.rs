use crate::core::forcefield::params::ParamLoadError;
use crate::core::models::atom::AtomParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Type tag marking an atom as absent at that endpoint.
pub const DUMMY_TYPE: &str = "du";

#[inline]
pub fn is_dummy_type(atom_type: &str) -> bool {
    atom_type.trim().eq_ignore_ascii_case(DUMMY_TYPE)
}

/// Endpoint description of one solute atom, one row of the perturbation CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomPerturbation {
    pub atom_name: String,
    pub initial_type: String,
    pub final_type: String,
    pub initial_charge: f64,
    pub final_charge: f64,
    pub initial_sigma: f64,
    pub final_sigma: f64,
    pub initial_epsilon: f64,
    pub final_epsilon: f64,
}

impl AtomPerturbation {
    /// Parameters at λ = 0. A dummy endpoint never carries charge or well depth.
    pub fn initial_params(&self) -> AtomParams {
        endpoint_params(
            &self.initial_type,
            self.initial_charge,
            self.initial_sigma,
            self.initial_epsilon,
        )
    }

    /// Parameters at λ = 1.
    pub fn final_params(&self) -> AtomParams {
        endpoint_params(
            &self.final_type,
            self.final_charge,
            self.final_sigma,
            self.final_epsilon,
        )
    }

    pub fn params_at(&self, lambda: f64) -> AtomParams {
        AtomParams::interpolate(&self.initial_params(), &self.final_params(), lambda)
    }
}

fn endpoint_params(atom_type: &str, charge: f64, sigma: f64, epsilon: f64) -> AtomParams {
    if is_dummy_type(atom_type) {
        AtomParams::new(0.0, sigma, 0.0)
    } else {
        AtomParams::new(charge, sigma, epsilon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BondPerturbation {
    pub atom1: String,
    pub atom2: String,
    pub initial_length: f64,
    pub final_length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnglePerturbation {
    pub atom1: String,
    pub atom2: String,
    pub atom3: String,
    pub initial_angle: f64,
    pub final_angle: f64,
}

/// Perturbed bond lengths and angles, referenced by atom name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BondedPerturbations {
    pub bonds: Vec<BondPerturbation>,
    pub angles: Vec<AnglePerturbation>,
}

/// The complete description of the solute's alchemical transformation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerturbationTable {
    pub atoms: Vec<AtomPerturbation>,
    pub bonded: BondedPerturbations,
}

impl PerturbationTable {
    pub fn new(atoms: Vec<AtomPerturbation>, bonded: BondedPerturbations) -> Self {
        Self { atoms, bonded }
    }

    /// Loads the per-atom CSV and, optionally, the bonded TOML file.
    pub fn load(atoms_path: &Path, bonded_path: Option<&Path>) -> Result<Self, ParamLoadError> {
        let atoms = Self::load_atoms_csv(atoms_path)?;
        let bonded = match bonded_path {
            Some(path) => Self::load_bonded_toml(path)?,
            None => BondedPerturbations::default(),
        };
        Ok(Self { atoms, bonded })
    }

    fn load_atoms_csv(path: &Path) -> Result<Vec<AtomPerturbation>, ParamLoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ParamLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;

        let mut records = Vec::new();
        for result in reader.deserialize::<AtomPerturbation>() {
            let record = result.map_err(|e| ParamLoadError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            records.push(record);
        }
        if records.is_empty() {
            return Err(ParamLoadError::Invalid {
                path: path.to_string_lossy().to_string(),
                reason: "perturbation table has no atom records".to_string(),
            });
        }
        Ok(records)
    }

    fn load_bonded_toml(path: &Path) -> Result<BondedPerturbations, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}
