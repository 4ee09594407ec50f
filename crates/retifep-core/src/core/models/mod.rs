//! # Core Models Module
//!
//! This module contains the data structures used to represent the molecular system
//! handed over by the external structure loaders, together with the mutable
//! configuration that samplers move and replicas exchange.
//!
//! ## Overview
//!
//! The system is deliberately opaque: molecules arrive already classified into solute,
//! protein, solvent and ion categories, each with its atoms, non-bonded parameters and
//! bonded connectivity. Coordinates that change during sampling are kept apart from the
//! static description so that a whole configuration can be swapped between λ windows
//! in one move.
//!
//! ## Key Components
//!
//! - [`atom`] - Atom representation with non-bonded parameters
//! - [`molecule`] - Molecules and their category
//! - [`topology`] - Bonds, angles and derived connectivity with non-bonded exclusions
//! - [`system`] - The complete molecular system
//! - [`space`] - Infinite or periodic simulation space with minimum-image distances
//! - [`configuration`] - Sampled coordinates (and optional velocities) per molecule
//! - [`ids`] - Unique identifier types for molecules
//!
//! ## Usage
//!
//! ```ignore
//! use retifep::core::models::{atom::Atom, molecule::{Molecule, MoleculeCategory}};
//! use retifep::core::models::system::MolecularSystem;
//!
//! let mut water = Molecule::new("WAT", MoleculeCategory::Solvent);
//! water.add_atom(Atom::new("O", Point3::new(0.0, 0.0, 0.0)));
//!
//! let mut system = MolecularSystem::new(Space::Cartesian);
//! let water_id = system.add_molecule(water);
//! ```

pub mod atom;
pub mod configuration;
pub mod ids;
pub mod molecule;
pub mod space;
pub mod system;
pub mod topology;
