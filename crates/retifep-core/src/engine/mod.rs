//! # Engine Module
//!
//! This module implements the λ-coupling machinery and the replica-exchange sampler
//! that together produce the statistics consumed by the free-energy estimators.
//!
//! ## Overview
//!
//! For every λ window the [`builder`] partitions the perturbable solute, relaxes its
//! perturbed geometry, and composes a [`system::PerturbedSystem`] out of typed energy
//! terms. Soft-core terms are bound to λ through the [`constraints`] propagator, which
//! keeps the shadow-state and neighbour λ values and every α consistent whenever λ
//! changes. The [`replica`] ensemble samples all windows in parallel, exchanges
//! configurations between neighbours, and can be persisted at any block boundary
//! through [`checkpoint`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run parameters and their builder
//! - **Schedule** ([`schedule`]) - The ordered set of λ windows
//! - **Construction** ([`builder`]) - Per-window perturbed systems and starting configurations
//! - **λ Propagation** ([`constraints`]) - Derived λ values and soft-core α bindings
//! - **Evaluation** ([`system`]) - Reference, forward, backward and neighbour energies
//! - **Sampling** ([`sampler`], [`window`]) - Intra-window moves and per-window accumulation
//! - **Exchange** ([`replica`]) - Parallel blocks and Metropolis configuration swaps
//! - **Statistics** ([`monitor`], [`identity`]) - Running averages, histograms and solvent site tracking
//! - **Persistence** ([`checkpoint`]) - Atomic JSON checkpoints of the whole ensemble
//! - **Progress Monitoring** ([`progress`]) - Progress callbacks for front ends
//! - **Error Handling** ([`error`]) - The engine's error taxonomy
//!
//! ## Key Capabilities
//!
//! - **Simultaneous shadow states** giving finite-difference gradients without resampling
//! - **Deterministic replica exchange** with one random stream per window plus one for exchanges
//! - **Parallel sampling** of independent windows behind the `parallel` feature
//! - **Exact restarts** from checkpoints, including random generator state

pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod constraints;
pub mod error;
pub mod identity;
pub mod monitor;
pub mod progress;
pub mod replica;
pub mod sampler;
pub mod schedule;
pub mod system;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;
