use thiserror::Error;

use super::checkpoint::CheckpointError;
use crate::analysis::estimator::EstimatorError;
use super::config::ConfigError;
use crate::core::forcefield::params::ParamLoadError;
use crate::core::perturbation::partition::PartitionError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Inconsistent topology: {0}")]
    InconsistentTopology(#[from] PartitionError),

    #[error("Cutoff {cutoff} Å exceeds half the smallest box dimension ({half_box} Å)")]
    CutoffTooLarge { cutoff: f64, half_box: f64 },

    #[error("Equilibrium adjustment of {dof} would break a ring")]
    RingBreakingAdjustment { dof: String },

    #[error(
        "Identity mapping is stale: built for configuration {mapped_uid} generation {mapped_generation}, \
         evaluated against configuration {uid} generation {generation}"
    )]
    StaleIdentityMapping {
        mapped_uid: u64,
        mapped_generation: u64,
        uid: u64,
        generation: u64,
    },

    #[error(
        "Non-finite energy in term '{term}'{}",
        .window.map(|w| format!(" of window {w}")).unwrap_or_default()
    )]
    NumericOverflow { window: Option<usize>, term: String },

    #[error("Invalid λ schedule: {0}")]
    InvalidSchedule(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parameter loading failed: {0}")]
    Parameters(#[from] ParamLoadError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Free-energy estimation failed: {0}")]
    Estimation(#[from] EstimatorError),

    #[error("No solute molecule found{}", .0.as_deref().map(|n| format!(" named '{n}'")).unwrap_or_default())]
    MissingSolute(Option<String>),

    #[error("Workflow phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Attaches the window index to errors that carry one.
    pub fn with_window(self, index: usize) -> Self {
        match self {
            EngineError::NumericOverflow { window: None, term } => EngineError::NumericOverflow {
                window: Some(index),
                term,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_window_fills_missing_window_index() {
        let err = EngineError::NumericOverflow {
            window: None,
            term: "ref:hard-solvent".to_string(),
        }
        .with_window(3);
        assert!(matches!(err, EngineError::NumericOverflow { window: Some(3), .. }));
        assert_eq!(
            err.to_string(),
            "Non-finite energy in term 'ref:hard-solvent' of window 3"
        );
    }

    #[test]
    fn with_window_keeps_existing_window_index() {
        let err = EngineError::NumericOverflow {
            window: Some(1),
            term: "t".to_string(),
        }
        .with_window(5);
        assert!(matches!(err, EngineError::NumericOverflow { window: Some(1), .. }));
    }

    #[test]
    fn missing_solute_message_names_the_solute() {
        assert_eq!(
            EngineError::MissingSolute(Some("LIG".to_string())).to_string(),
            "No solute molecule found named 'LIG'"
        );
        assert_eq!(EngineError::MissingSolute(None).to_string(), "No solute molecule found");
    }
}
