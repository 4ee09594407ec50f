//! # Workflows Module
//!
//! High-level procedures that drive a complete replica-exchange free-energy
//! calculation, from building the λ windows to the final PMF estimates.
//!
//! ## Overview
//!
//! Workflows are the entry points front ends are expected to use. They tie the
//! builder, the replica ensemble, checkpointing and the estimators together, report
//! progress phase by phase, and keep the on-disk checkpoint in step with the last
//! block that completed.
//!
//! ## Architecture
//!
//! - **RETI Workflow** ([`reti`]) - Window preparation, block sampling with
//!   checkpoints, and TI/FEP/BAR analysis.
//!
//! ## Key Capabilities
//!
//! - **Restartable sampling** continuing any saved ensemble block for block
//! - **Atomic checkpoints** written only after a block fully completes
//! - **Three estimators** computed from the same accumulated statistics

pub mod reti;
