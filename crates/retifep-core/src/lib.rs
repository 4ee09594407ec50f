//! # RETI-FEP Core Library
//!
//! A replica-exchange thermodynamic integration engine for alchemical free-energy
//! calculations. A perturbable solute is interpolated between two end-states along an
//! order parameter λ ∈ [0, 1], every interaction touching an appearing or vanishing
//! atom is softened with a soft-core potential, and configurations sampled at many λ
//! windows are combined into a potential of mean force by TI, FEP and BAR.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three-layer split used throughout the project:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`MolecularSystem`,
//!   `Configuration`, `Space`), the pairwise kernels and the soft-core energy model,
//!   and the perturbation description with its endpoint partitioning.
//!
//! - **[`engine`]: The Logic Core.** The λ-coupled `PerturbedSystem`, its builder and
//!   constraint propagator, λ windows, the replica-exchange ensemble, checkpoints and
//!   the identity tracker for diffusing solvent.
//!
//! - **[`analysis`]: The Estimators.** Thermodynamic integration, exponential averaging
//!   and Bennett's acceptance ratio over the accumulated window statistics.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie the layers
//!   together, such as a complete replica-exchange free-energy run.

pub mod analysis;
pub mod core;
pub mod engine;
pub mod workflows;
