use super::config::SamplingConfig;
use super::error::EngineError;
use super::identity::IdentityTracker;
use super::monitor::{BlockAverages, WindowAccumulators};
use super::sampler::{MoveStatistics, Sampler};
use super::system::{PerturbedSystem, StateEnergies};
use crate::core::models::configuration::Configuration;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One λ point of the ensemble: its own system, configuration, random stream and
/// accumulated statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaWindow {
    pub index: usize,
    pub system: PerturbedSystem,
    pub configuration: Configuration,
    pub rng: ChaCha8Rng,
    pub accumulators: WindowAccumulators,
    pub moves: MoveStatistics,
    pub identity: Option<IdentityTracker>,
    /// Energies of the current configuration, if evaluated since it last changed.
    #[serde(skip)]
    latest: Option<StateEnergies>,
}

/// What one window did during one block.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBlockStats {
    pub index: usize,
    pub moves: MoveStatistics,
    pub samples: usize,
    pub averages: BlockAverages,
}

impl LambdaWindow {
    pub fn new(
        index: usize,
        system: PerturbedSystem,
        configuration: Configuration,
        rng: ChaCha8Rng,
        accumulators: WindowAccumulators,
        identity: Option<IdentityTracker>,
    ) -> Self {
        Self {
            index,
            system,
            configuration,
            rng,
            accumulators,
            moves: MoveStatistics::default(),
            identity,
            latest: None,
        }
    }

    /// The λ this window samples, as held by its system.
    pub fn lambda(&self) -> f64 {
        self.system.lambda()
    }

    /// Samples one block, evaluating and recording energies every `sample_interval` moves.
    pub fn run_block(
        &mut self,
        sampler: &dyn Sampler,
        sampling: &SamplingConfig,
    ) -> Result<WindowBlockStats, EngineError> {
        self.run_block_inner(sampler, sampling)
            .map_err(|e| e.with_window(self.index))
    }

    fn run_block_inner(
        &mut self,
        sampler: &dyn Sampler,
        sampling: &SamplingConfig,
    ) -> Result<WindowBlockStats, EngineError> {
        let mut block_moves = MoveStatistics::default();
        let mut samples = 0;
        let mut remaining = sampling.moves_per_block;
        let interval = sampling.sample_interval.max(1);

        while remaining > 0 {
            let chunk = remaining.min(interval);
            let stats = sampler.sample(
                &mut self.system,
                &mut self.configuration,
                &mut self.rng,
                chunk,
            )?;
            block_moves.merge(stats);
            remaining -= chunk;

            self.latest = None;
            self.record_sample()?;
            samples += 1;
        }

        let averages = self.accumulators.end_block();
        if let Some(tracker) = &mut self.identity {
            tracker.end_block();
        }
        self.moves.merge(block_moves);
        trace!(window = self.index, samples, "Window block finished.");
        Ok(WindowBlockStats {
            index: self.index,
            moves: block_moves,
            samples,
            averages,
        })
    }

    fn record_sample(&mut self) -> Result<(), EngineError> {
        let energies = self.system.evaluate(&self.configuration)?;
        self.accumulators.record(&energies);
        if let Some(tracker) = &mut self.identity {
            tracker.record(&mut self.system, &self.configuration)?;
        }
        self.latest = Some(energies);
        Ok(())
    }

    /// Energies of the current configuration, evaluated on demand.
    pub fn energies(&mut self) -> Result<&StateEnergies, EngineError> {
        if self.latest.is_none() {
            let energies = self
                .system
                .evaluate(&self.configuration)
                .map_err(|e| e.with_window(self.index))?;
            self.latest = Some(energies);
        }
        self.latest
            .as_ref()
            .ok_or_else(|| EngineError::Internal("window energies missing after evaluation".to_string()))
    }

    /// Swaps configurations with another window.
    pub fn exchange_configuration(&mut self, other: &mut LambdaWindow) {
        std::mem::swap(&mut self.configuration, &mut other.configuration);
        self.latest = None;
        other.latest = None;
    }
}
