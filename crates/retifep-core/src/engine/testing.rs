//! Small systems shared by the engine's unit tests.

use super::config::{RunConfig, RunConfigBuilder};
use super::schedule::LambdaSchedule;
use crate::core::models::atom::Atom;
use crate::core::models::molecule::{Molecule, MoleculeCategory};
use crate::core::models::space::Space;
use crate::core::models::system::MolecularSystem;
use crate::core::models::topology::{Angle, Bond};
use crate::core::perturbation::table::{AtomPerturbation, BondedPerturbations, PerturbationTable};
use nalgebra::Point3;

// C1 and C2 carry the hard core, H1 vanishes, H2 appears, O1 changes type.
pub(crate) fn ligand() -> Molecule {
    let mut mol = Molecule::new("LIG", MoleculeCategory::Solute);
    mol.add_atom(Atom::new("C1", Point3::new(0.0, 0.0, 0.0)));
    mol.add_atom(Atom::new("C2", Point3::new(1.5, 0.0, 0.0)));
    mol.add_atom(Atom::new("H1", Point3::new(2.0, 1.0, 0.0)));
    mol.add_atom(Atom::new("H2", Point3::new(-1.0, 0.0, 0.0)));
    mol.add_atom(Atom::new("O1", Point3::new(2.2, -1.2, 0.0)));
    mol.add_bond(Bond::new(0, 1, 300.0, 1.5));
    mol.add_bond(Bond::new(1, 2, 340.0, 1.09));
    mol.add_bond(Bond::new(0, 3, 340.0, 1.09));
    mol.add_bond(Bond::new(1, 4, 320.0, 1.41));
    mol.add_angle(Angle::new(0, 1, 4, 50.0, 109.5));
    mol
}

pub(crate) fn water(origin: Point3<f64>) -> Molecule {
    let mut mol = Molecule::new("WAT", MoleculeCategory::Solvent);
    mol.add_atom(Atom::new("O", origin).with_params(-0.834, 3.15, 0.152));
    mol.add_atom(Atom::new("H1", origin + nalgebra::Vector3::new(0.96, 0.0, 0.0)).with_params(0.417, 0.0, 0.0));
    mol.add_atom(Atom::new("H2", origin + nalgebra::Vector3::new(-0.24, 0.93, 0.0)).with_params(0.417, 0.0, 0.0));
    mol.add_bond(Bond::new(0, 1, 450.0, 0.96));
    mol.add_bond(Bond::new(0, 2, 450.0, 0.96));
    mol
}

/// The ligand surrounded by `waters` water molecules stacked along +y.
pub(crate) fn ligand_in_water(space: Space, waters: usize) -> MolecularSystem {
    let mut system = MolecularSystem::new(space);
    system.add_molecule(ligand());
    for k in 0..waters {
        system.add_molecule(water(Point3::new(0.5, 4.0 + 3.2 * k as f64, 0.0)));
    }
    system
}

fn record(name: &str, types: (&str, &str), charges: (f64, f64), sigma: f64, epsilon: f64) -> AtomPerturbation {
    AtomPerturbation {
        atom_name: name.to_string(),
        initial_type: types.0.to_string(),
        final_type: types.1.to_string(),
        initial_charge: charges.0,
        final_charge: charges.1,
        initial_sigma: sigma,
        final_sigma: sigma,
        initial_epsilon: epsilon,
        final_epsilon: epsilon,
    }
}

pub(crate) fn ligand_table() -> PerturbationTable {
    PerturbationTable::new(
        vec![
            record("C1", ("c3", "c3"), (-0.1, -0.1), 3.4, 0.1),
            record("C2", ("c3", "c3"), (0.1, 0.2), 3.4, 0.1),
            record("H1", ("hc", "du"), (0.05, 0.0), 2.6, 0.02),
            record("H2", ("du", "hc"), (0.0, 0.05), 2.6, 0.02),
            record("O1", ("oh", "os"), (-0.2, -0.3), 3.0, 0.17),
        ],
        BondedPerturbations::default(),
    )
}

pub(crate) fn run_config(lambdas: &[f64]) -> RunConfig {
    RunConfigBuilder::new()
        .schedule(LambdaSchedule::new(lambdas.to_vec()).expect("valid test schedule"))
        .delta_lambda(0.01)
        .moves_per_block(20)
        .sample_interval(5)
        .temperature(300.0)
        .seed(42)
        .build()
        .expect("valid test configuration")
}
