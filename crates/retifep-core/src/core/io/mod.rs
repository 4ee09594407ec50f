//! Provides input/output functionality for molecular system documents.
//!
//! Structure parsing and residue naming live outside this crate. What arrives here is an
//! already categorized system document, read through the [`traits::MolecularFile`]
//! interface so other formats can be plugged in next to the JSON reader.

pub mod json;
pub mod traits;
