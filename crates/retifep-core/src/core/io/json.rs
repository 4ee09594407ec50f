use super::traits::MolecularFile;
use crate::core::models::molecule::Molecule;
use crate::core::models::space::Space;
use crate::core::models::system::MolecularSystem;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JsonSystemError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Inconsistent data in molecule '{molecule}': {reason}")]
    Inconsistency { molecule: String, reason: String },
}

#[derive(Debug, Serialize, Deserialize)]
struct SystemDocument {
    #[serde(default)]
    space: Space,
    molecules: Vec<Molecule>,
}

/// Reader and writer for the JSON system document.
///
/// ```json
/// {
///   "space": { "kind": "periodic", "dimensions": [30.0, 30.0, 30.0] },
///   "molecules": [
///     { "name": "LIG", "category": "solute", "atoms": [ ... ], "bonds": [ ... ] }
///   ]
/// }
/// ```
pub struct JsonSystemFile;

impl MolecularFile for JsonSystemFile {
    type Error = JsonSystemError;

    fn read_from(reader: &mut impl BufRead) -> Result<MolecularSystem, Self::Error> {
        let document: SystemDocument = serde_json::from_reader(reader)?;
        let mut system = MolecularSystem::new(document.space);
        for molecule in document.molecules {
            validate(&molecule)?;
            system.add_molecule(molecule);
        }
        Ok(system)
    }

    fn write_to(system: &MolecularSystem, writer: &mut impl Write) -> Result<(), Self::Error> {
        let document = SystemDocument {
            space: *system.space(),
            molecules: system.molecules_iter().map(|(_, m)| m.clone()).collect(),
        };
        serde_json::to_writer_pretty(writer, &document)?;
        Ok(())
    }
}

fn validate(molecule: &Molecule) -> Result<(), JsonSystemError> {
    let n = molecule.atom_count();
    let inconsistency = |reason: String| JsonSystemError::Inconsistency {
        molecule: molecule.name.clone(),
        reason,
    };
    if n == 0 {
        return Err(inconsistency("molecule has no atoms".to_string()));
    }
    for bond in molecule.bonds() {
        if bond.atom1 >= n || bond.atom2 >= n {
            return Err(inconsistency(format!(
                "bond {}-{} references an atom outside 0..{}",
                bond.atom1, bond.atom2, n
            )));
        }
    }
    for angle in molecule.angles() {
        if angle.atom1 >= n || angle.atom2 >= n || angle.atom3 >= n {
            return Err(inconsistency(format!(
                "angle {}-{}-{} references an atom outside 0..{}",
                angle.atom1, angle.atom2, angle.atom3, n
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::molecule::MoleculeCategory;
    use std::io::{BufReader, Cursor};

    const DOCUMENT: &str = r#"{
        "space": { "kind": "periodic", "dimensions": [20.0, 20.0, 20.0] },
        "molecules": [
            {
                "name": "LIG",
                "category": "solute",
                "atoms": [
                    { "name": "C1", "force_field_type": "c3", "partial_charge": -0.1,
                      "sigma": 3.4, "epsilon": 0.1, "position": [0.0, 0.0, 0.0] },
                    { "name": "H1", "force_field_type": "hc", "partial_charge": 0.1,
                      "sigma": 2.6, "epsilon": 0.015, "position": [1.09, 0.0, 0.0] }
                ],
                "bonds": [ { "atom1": 0, "atom2": 1, "force_constant": 340.0, "length": 1.09 } ]
            },
            {
                "name": "WAT",
                "category": "solvent",
                "atoms": [
                    { "name": "O", "force_field_type": "OW", "partial_charge": -0.834,
                      "sigma": 3.15, "epsilon": 0.152, "position": [5.0, 0.0, 0.0] }
                ]
            }
        ]
    }"#;

    #[test]
    fn reads_categorized_molecules_and_space() {
        let mut reader = BufReader::new(Cursor::new(DOCUMENT));
        let system = JsonSystemFile::read_from(&mut reader).unwrap();
        assert_eq!(system.molecule_count(), 2);
        assert_eq!(*system.space(), Space::periodic(20.0, 20.0, 20.0));
        let solute = system.find_solute(None).unwrap();
        let mol = system.molecule(solute).unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bonds().len(), 1);
        assert_eq!(system.molecules_of(MoleculeCategory::Solvent).len(), 1);
    }

    #[test]
    fn rejects_bonds_referencing_missing_atoms() {
        let broken = DOCUMENT.replace("\"atom2\": 1", "\"atom2\": 5");
        let mut reader = BufReader::new(Cursor::new(broken));
        let err = JsonSystemFile::read_from(&mut reader).unwrap_err();
        assert!(matches!(err, JsonSystemError::Inconsistency { .. }));
    }

    #[test]
    fn write_then_read_preserves_molecules() {
        let mut reader = BufReader::new(Cursor::new(DOCUMENT));
        let system = JsonSystemFile::read_from(&mut reader).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.json");
        JsonSystemFile::write_to_path(&system, &path).unwrap();
        let reread = JsonSystemFile::read_from_path(&path).unwrap();
        assert_eq!(reread.molecule_count(), 2);
        assert_eq!(reread.space(), system.space());
    }
}
