//! # Force Field Module
//!
//! This module composes non-bonded interactions for an alchemically perturbed system. It
//! holds the run-wide non-bonded parameters, the elementary pair kernels, the soft-core
//! energy model used for every interaction that touches a dummy atom, and the term
//! descriptors the perturbed-system builder assembles.
//!
//! ## Overview
//!
//! - **Coulomb and Lennard-Jones 12-6 interactions** between atom groups
//! - **CHARMM-style switching** between `cutoff - feather` and `cutoff`
//! - **Soft-core modification** controlled by a coupling parameter α ∈ [0, 1], with
//!   α = 0 reproducing the ordinary hard-core pair energy exactly
//! - **Bonded exclusions** (1-2, 1-3) and scaled 1-4 interactions within a molecule
//!
//! ## Key Components
//!
//! - [`params`] - Non-bonded and soft-core parameters, combining rules
//! - [`softcore`] - The soft-core functional form and its analytic α derivative
//! - [`energy`] - Group-versus-group and within-group pair summation
//! - [`term`] - Energy term descriptors, handles and component sums
//!
//! ## Usage
//!
//! ```ignore
//! use retifep::core::forcefield::softcore::SoftcoreModel;
//!
//! let model = SoftcoreModel::new(&params.softcore, params.dielectric);
//! let pair = model.pair(r2, qq, sigma, epsilon, alpha);
//! ```

pub mod bonded;
pub(crate) mod energy;
pub mod params;
pub(crate) mod potentials;
pub mod softcore;
pub mod term;
