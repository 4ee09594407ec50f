//! # Analysis Module
//!
//! Free-energy estimators over the statistics accumulated by the λ windows of a
//! replica-exchange run.
//!
//! ## Architecture
//!
//! - **Profiles** ([`pmf`]) - Potentials of mean force along λ and their directional estimates
//! - **Estimators** ([`estimator`]) - Thermodynamic integration, exponential averaging (FEP)
//!   and Bennett's acceptance ratio (BAR)
//!
//! Every estimate carries a forward and a backward profile. Their disagreement at
//! λ = 1 is the reported error, which makes hysteresis between the two directions
//! visible without a separate error analysis.

pub mod estimator;
pub mod pmf;
