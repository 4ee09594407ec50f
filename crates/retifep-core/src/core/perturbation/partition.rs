use super::table::{AtomPerturbation, is_dummy_type};
use crate::core::models::molecule::Molecule;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a perturbable solute atom by its endpoint types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AtomClass {
    /// Real at both endpoints.
    Hard,
    /// Real at λ = 0, dummy at λ = 1.
    ToDummy,
    /// Dummy at λ = 0, real at λ = 1.
    FromDummy,
}

impl AtomClass {
    pub const ALL: [AtomClass; 3] = [AtomClass::Hard, AtomClass::ToDummy, AtomClass::FromDummy];
}

impl fmt::Display for AtomClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                AtomClass::Hard => "hard",
                AtomClass::ToDummy => "todummy",
                AtomClass::FromDummy => "fromdummy",
            }
        )
    }
}

/// The three simultaneously evaluated states of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKind {
    /// Coupled at the window's own λ.
    Reference,
    /// Shadow state at `min(λ + Δλ, 1)`.
    Forward,
    /// Shadow state at `max(λ - Δλ, 0)`.
    Backward,
}

impl StateKind {
    pub const ALL: [StateKind; 3] = [StateKind::Reference, StateKind::Forward, StateKind::Backward];

    pub fn index(self) -> usize {
        match self {
            StateKind::Reference => 0,
            StateKind::Forward => 1,
            StateKind::Backward => 2,
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                StateKind::Reference => "ref",
                StateKind::Forward => "fwd",
                StateKind::Backward => "bwd",
            }
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PartitionError {
    #[error("Perturbation describes {found} atoms but the solute has {expected}")]
    AtomCountMismatch { expected: usize, found: usize },
    #[error("Perturbation record {index} names atom '{found}' but solute atom {index} is '{expected}'")]
    AtomOrderMismatch {
        index: usize,
        expected: String,
        found: String,
    },
    #[error("Atom '{0}' is a dummy at both endpoints")]
    DoubleDummy(String),
    #[error("Perturbed bonded term references unknown solute atom '{0}'")]
    UnknownAtom(String),
}

/// Disjoint hard / to-dummy / from-dummy index sets of one state's copy of the solute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    state: StateKind,
    hard: Vec<usize>,
    to_dummy: Vec<usize>,
    from_dummy: Vec<usize>,
}

impl Partition {
    pub fn state(&self) -> StateKind {
        self.state
    }

    pub fn indices(&self, class: AtomClass) -> &[usize] {
        match class {
            AtomClass::Hard => &self.hard,
            AtomClass::ToDummy => &self.to_dummy,
            AtomClass::FromDummy => &self.from_dummy,
        }
    }

    pub fn class_of(&self, atom: usize) -> Option<AtomClass> {
        AtomClass::ALL
            .into_iter()
            .find(|&class| self.indices(class).binary_search(&atom).is_ok())
    }

    pub fn len(&self) -> usize {
        self.hard.len() + self.to_dummy.len() + self.from_dummy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of this partition owned by another state.
    pub fn for_state(&self, state: StateKind) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}

/// The reference partition together with the independent shadow-state copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePartitions {
    pub reference: Partition,
    pub forward: Partition,
    pub backward: Partition,
}

impl StatePartitions {
    pub fn get(&self, state: StateKind) -> &Partition {
        match state {
            StateKind::Reference => &self.reference,
            StateKind::Forward => &self.forward,
            StateKind::Backward => &self.backward,
        }
    }
}

/// Sorts the atoms of a perturbable solute into hard, to-dummy and from-dummy sets.
pub struct EndpointPartitioner;

impl EndpointPartitioner {
    pub fn classify(record: &AtomPerturbation) -> Result<AtomClass, PartitionError> {
        match (is_dummy_type(&record.initial_type), is_dummy_type(&record.final_type)) {
            (false, false) => Ok(AtomClass::Hard),
            (false, true) => Ok(AtomClass::ToDummy),
            (true, false) => Ok(AtomClass::FromDummy),
            (true, true) => Err(PartitionError::DoubleDummy(record.atom_name.clone())),
        }
    }

    /// Partitions the solute for a single state.
    ///
    /// Records are matched to solute atoms by name, in order; any count or ordering
    /// mismatch between the two is an inconsistent topology.
    pub fn partition(
        solute: &Molecule,
        records: &[AtomPerturbation],
        state: StateKind,
    ) -> Result<Partition, PartitionError> {
        if records.len() != solute.atom_count() {
            return Err(PartitionError::AtomCountMismatch {
                expected: solute.atom_count(),
                found: records.len(),
            });
        }

        let mut partition = Partition {
            state,
            hard: Vec::new(),
            to_dummy: Vec::new(),
            from_dummy: Vec::new(),
        };

        for (index, (atom, record)) in solute.atoms().iter().zip(records).enumerate() {
            if atom.name != record.atom_name {
                return Err(PartitionError::AtomOrderMismatch {
                    index,
                    expected: atom.name.clone(),
                    found: record.atom_name.clone(),
                });
            }
            match Self::classify(record)? {
                AtomClass::Hard => partition.hard.push(index),
                AtomClass::ToDummy => partition.to_dummy.push(index),
                AtomClass::FromDummy => partition.from_dummy.push(index),
            }
        }

        Ok(partition)
    }

    /// Partitions the solute once and hands each state its own copy.
    pub fn partition_states(
        solute: &Molecule,
        records: &[AtomPerturbation],
    ) -> Result<StatePartitions, PartitionError> {
        let reference = Self::partition(solute, records, StateKind::Reference)?;
        Ok(StatePartitions {
            forward: reference.for_state(StateKind::Forward),
            backward: reference.for_state(StateKind::Backward),
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::molecule::MoleculeCategory;
    use nalgebra::Point3;
    use std::collections::HashSet;

    fn record(name: &str, initial: &str, final_: &str) -> AtomPerturbation {
        AtomPerturbation {
            atom_name: name.to_string(),
            initial_type: initial.to_string(),
            final_type: final_.to_string(),
            initial_charge: 0.0,
            final_charge: 0.0,
            initial_sigma: 3.0,
            final_sigma: 3.0,
            initial_epsilon: 0.1,
            final_epsilon: 0.1,
        }
    }

    fn solute(names: &[&str]) -> Molecule {
        let mut mol = Molecule::new("LIG", MoleculeCategory::Solute);
        for (i, name) in names.iter().enumerate() {
            mol.add_atom(Atom::new(name, Point3::new(i as f64, 0.0, 0.0)));
        }
        mol
    }

    #[test]
    fn classes_cover_all_atoms_and_are_disjoint() {
        let mol = solute(&["C1", "C2", "H1", "H2", "O1"]);
        let records = vec![
            record("C1", "c3", "c3"),
            record("C2", "c3", "du"),
            record("H1", "du", "hc"),
            record("H2", "hc", "DU"),
            record("O1", "oh", "os"),
        ];
        let p = EndpointPartitioner::partition(&mol, &records, StateKind::Reference).unwrap();

        assert_eq!(p.indices(AtomClass::Hard), &[0, 4]);
        assert_eq!(p.indices(AtomClass::ToDummy), &[1, 3]);
        assert_eq!(p.indices(AtomClass::FromDummy), &[2]);

        let mut seen = HashSet::new();
        for class in AtomClass::ALL {
            for &i in p.indices(class) {
                assert!(seen.insert(i), "atom {i} in more than one class");
            }
        }
        assert_eq!(seen.len(), mol.atom_count());
        assert_eq!(p.len(), mol.atom_count());
    }

    #[test]
    fn class_of_finds_the_owning_set() {
        let mol = solute(&["A", "B", "C"]);
        let records = vec![record("A", "x", "x"), record("B", "x", "du"), record("C", "du", "x")];
        let p = EndpointPartitioner::partition(&mol, &records, StateKind::Reference).unwrap();
        assert_eq!(p.class_of(0), Some(AtomClass::Hard));
        assert_eq!(p.class_of(1), Some(AtomClass::ToDummy));
        assert_eq!(p.class_of(2), Some(AtomClass::FromDummy));
        assert_eq!(p.class_of(3), None);
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let mol = solute(&["A", "B"]);
        let err = EndpointPartitioner::partition(&mol, &[record("A", "x", "x")], StateKind::Reference)
            .unwrap_err();
        assert_eq!(err, PartitionError::AtomCountMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn order_mismatch_is_rejected() {
        let mol = solute(&["A", "B"]);
        let records = vec![record("B", "x", "x"), record("A", "x", "x")];
        let err = EndpointPartitioner::partition(&mol, &records, StateKind::Reference).unwrap_err();
        assert!(matches!(err, PartitionError::AtomOrderMismatch { index: 0, .. }));
    }

    #[test]
    fn double_dummy_is_rejected() {
        let mol = solute(&["A"]);
        let err = EndpointPartitioner::partition(&mol, &[record("A", "du", "du")], StateKind::Reference)
            .unwrap_err();
        assert_eq!(err, PartitionError::DoubleDummy("A".to_string()));
    }

    #[test]
    fn each_state_owns_an_independent_copy() {
        let mol = solute(&["A", "B"]);
        let records = vec![record("A", "x", "x"), record("B", "x", "du")];
        let states = EndpointPartitioner::partition_states(&mol, &records).unwrap();
        assert_eq!(states.reference.state(), StateKind::Reference);
        assert_eq!(states.forward.state(), StateKind::Forward);
        assert_eq!(states.backward.state(), StateKind::Backward);
        for state in StateKind::ALL {
            assert_eq!(states.get(state).indices(AtomClass::ToDummy), &[1]);
        }
    }
}
