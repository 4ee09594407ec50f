//! # Core Module
//!
//! This module provides the fundamental building blocks of the free-energy engine:
//! the molecular data model, the non-bonded energy composition layer and the
//! description of the alchemical perturbation.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Molecules, atoms, periodic space and
//!   sampled configurations
//! - **Energy Calculations** ([`forcefield`]) - Non-bonded parameters, elementary pair
//!   kernels, the soft-core model and energy term descriptors
//! - **Alchemical Perturbation** ([`perturbation`]) - Endpoint parameters, atom
//!   classification into hard/to-dummy/from-dummy sets and equilibrium adjustment
//! - **Input/Output** ([`io`]) - Reading and writing molecular system documents
//! - **Utilities** ([`utils`]) - Rigid-body geometry helpers
//!
//! ## Scientific Foundation
//!
//! - **Single-topology perturbations** where each solute atom carries an initial and a
//!   final parameter set, with dummy atoms standing in for atoms absent at one end
//! - **Soft-core potentials** that remove the singularities of vanishing atoms
//! - **Minimum-image periodic boundaries** with a smooth cutoff switching function

pub mod forcefield;
pub mod io;
pub mod models;
pub mod perturbation;
pub mod utils;
