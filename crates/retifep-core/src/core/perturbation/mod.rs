//! # Perturbation Module
//!
//! Describes the alchemical transformation of the solute and prepares it for coupling.
//!
//! ## Overview
//!
//! Every solute atom carries an initial and a final endpoint description (type, charge,
//! σ, ε). Atoms whose type at one endpoint is the dummy sentinel appear or vanish along
//! λ; the [`partition`] module sorts atoms into hard, to-dummy and from-dummy sets, one
//! independent copy per state (reference, forward shadow, backward shadow). Perturbed
//! bonds and angles are read from a separate table and used by the [`equilibrium`]
//! pre-pass to relax the starting geometry towards the λ-interpolated values.
//!
//! ## Key Components
//!
//! - [`table`] - Per-atom endpoint records (CSV) and perturbed bonded terms (TOML)
//! - [`partition`] - `EndpointPartitioner`, atom classes and state kinds
//! - [`equilibrium`] - `EquilibriumAdjuster` with `Applied | SkippedRingBreak` outcomes

pub mod equilibrium;
pub mod partition;
pub mod table;
