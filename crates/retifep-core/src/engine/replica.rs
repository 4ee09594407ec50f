use super::builder::{BuildOutput, PerturbedSystemBuilder};
use super::config::{RunConfig, SamplingConfig};
use super::error::EngineError;
use super::identity::IdentityTracker;
use super::monitor::WindowAccumulators;
use super::progress::{Progress, ProgressReporter};
use super::sampler::{MoveStatistics, Sampler};
use super::schedule::LambdaSchedule;
use super::window::{LambdaWindow, WindowBlockStats};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Exchange counters of one adjacent pair of windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExchangeStats {
    pub attempted: u64,
    pub accepted: u64,
}

impl ExchangeStats {
    pub fn acceptance(&self) -> Option<f64> {
        (self.attempted > 0).then(|| self.accepted as f64 / self.attempted as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeAttempt {
    pub pair: (usize, usize),
    /// `[E_i(λ_j) + E_j(λ_i)] - [E_i(λ_i) + E_j(λ_j)]`
    pub delta: f64,
    pub probability: f64,
    pub accepted: bool,
}

/// Summary of one completed block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockReport {
    pub block: u64,
    pub windows: Vec<WindowBlockStats>,
    pub exchanges: Vec<ExchangeAttempt>,
}

impl BlockReport {
    pub fn exchanges_accepted(&self) -> usize {
        self.exchanges.iter().filter(|e| e.accepted).count()
    }

    pub fn moves(&self) -> MoveStatistics {
        let mut total = MoveStatistics::default();
        self.windows.iter().for_each(|w| total.merge(w.moves));
        total
    }
}

/// The set of λ windows sampled in parallel and coupled by replica exchange.
///
/// A block samples every window independently, then makes one exchange pass over
/// adjacent pairs of alternating parity. Exchange decisions draw from a stream of their
/// own, so the outcome does not depend on how windows were scheduled onto threads. The
/// whole ensemble is serializable between blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicaEnsemble {
    schedule: LambdaSchedule,
    windows: Vec<LambdaWindow>,
    exchange_rng: ChaCha8Rng,
    exchange_stats: Vec<ExchangeStats>,
    blocks_completed: u64,
    parity: usize,
    sampling: SamplingConfig,
}

impl ReplicaEnsemble {
    /// Builds one window per λ of the configured schedule.
    ///
    /// Window `i` draws from stream `i + 1` of the run seed; the exchange decisions use
    /// stream 0.
    pub fn from_builder(
        builder: &PerturbedSystemBuilder,
        config: &RunConfig,
    ) -> Result<Self, EngineError> {
        let schedule = config.schedule.clone();
        let beta = config.sampling.beta();
        let mut windows = Vec::with_capacity(schedule.len());

        for (index, lambda) in schedule.iter().enumerate() {
            let BuildOutput {
                system,
                configuration,
                adjustments,
            } = builder.build(lambda, schedule.neighbors(index), index as u64)?;
            debug!(
                window = index,
                lambda,
                adjusted = adjustments.applied(),
                "Window prepared."
            );

            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            rng.set_stream(index as u64 + 1);
            let identity = config.identity.map(|id| {
                IdentityTracker::capture(
                    &system,
                    &configuration,
                    id.num_sites,
                    config.histogram_bin_width,
                )
            });
            windows.push(LambdaWindow::new(
                index,
                system,
                configuration,
                rng,
                WindowAccumulators::new(beta, config.histogram_bin_width),
                identity,
            ));
        }

        let mut exchange_rng = ChaCha8Rng::seed_from_u64(config.seed);
        exchange_rng.set_stream(0);

        Ok(Self {
            exchange_stats: vec![ExchangeStats::default(); schedule.len().saturating_sub(1)],
            schedule,
            windows,
            exchange_rng,
            blocks_completed: 0,
            parity: 0,
            sampling: config.sampling,
        })
    }

    pub fn schedule(&self) -> &LambdaSchedule {
        &self.schedule
    }

    pub fn windows(&self) -> &[LambdaWindow] {
        &self.windows
    }

    pub fn exchange_stats(&self) -> &[ExchangeStats] {
        &self.exchange_stats
    }

    pub fn blocks_completed(&self) -> u64 {
        self.blocks_completed
    }

    pub fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub(crate) fn exchange_rng(&self) -> &ChaCha8Rng {
        &self.exchange_rng
    }

    /// Samples every window, then runs one exchange pass.
    pub fn run_block(&mut self, sampler: &dyn Sampler) -> Result<BlockReport, EngineError> {
        let sampling = self.sampling;

        #[cfg(feature = "parallel")]
        let iter = self.windows.par_iter_mut();
        #[cfg(not(feature = "parallel"))]
        let iter = self.windows.iter_mut();
        let windows = iter
            .map(|w| w.run_block(sampler, &sampling))
            .collect::<Result<Vec<_>, EngineError>>()?;

        let exchanges = self.exchange_pass()?;
        self.blocks_completed += 1;

        Ok(BlockReport {
            block: self.blocks_completed,
            windows,
            exchanges,
        })
    }

    /// Attempts exchanges between all adjacent pairs of the current parity, then flips it.
    pub fn exchange_pass(&mut self) -> Result<Vec<ExchangeAttempt>, EngineError> {
        let pairs = self.schedule.exchange_pairs(self.parity);
        let mut attempts = Vec::with_capacity(pairs.len());
        for (i, j) in pairs {
            attempts.push(self.attempt_exchange(i, j)?);
        }
        self.parity = (self.parity + 1) % 2;
        Ok(attempts)
    }

    fn attempt_exchange(&mut self, i: usize, j: usize) -> Result<ExchangeAttempt, EngineError> {
        let beta = self.sampling.beta();
        let (left, right) = self.windows.split_at_mut(j);
        let (lower, upper) = (&mut left[i], &mut right[0]);

        let (ref_i, next_i) = {
            let e = lower.energies()?;
            (e.reference, e.next)
        };
        let (ref_j, prev_j) = {
            let e = upper.energies()?;
            (e.reference, e.prev)
        };
        let delta = (prev_j + next_i) - (ref_i + ref_j);
        let probability = (-beta * delta).exp().min(1.0);
        let accepted = self.exchange_rng.r#gen::<f64>() < probability;
        if accepted {
            lower.exchange_configuration(upper);
        }

        let stats = &mut self.exchange_stats[i];
        stats.attempted += 1;
        if accepted {
            stats.accepted += 1;
        }
        Ok(ExchangeAttempt {
            pair: (i, j),
            delta,
            probability,
            accepted,
        })
    }

    /// Runs `blocks` blocks, handing every completed block to `on_block`.
    ///
    /// `on_block` runs after the block has fully completed and may stop the run early.
    /// An error in any block aborts the run before `on_block` sees that block.
    pub fn advance<F>(
        &mut self,
        blocks: u64,
        sampler: &dyn Sampler,
        reporter: &ProgressReporter,
        mut on_block: F,
    ) -> Result<u64, EngineError>
    where
        F: FnMut(&Self, &BlockReport) -> Result<ControlFlow<()>, EngineError>,
    {
        reporter.report(Progress::TaskStart {
            total_steps: blocks,
        });
        let mut completed = 0;
        for _ in 0..blocks {
            let report = self.run_block(sampler)?;
            completed += 1;
            let moves = report.moves();
            info!(
                block = report.block,
                exchanges_accepted = report.exchanges_accepted(),
                exchanges_attempted = report.exchanges.len(),
                move_acceptance = moves.acceptance().unwrap_or(0.0),
                "Block completed."
            );
            reporter.report(Progress::BlockCompleted {
                block: report.block,
                exchanges_accepted: report.exchanges_accepted(),
                exchanges_attempted: report.exchanges.len(),
            });
            reporter.report(Progress::TaskIncrement);
            if on_block(self, &report)?.is_break() {
                break;
            }
        }
        reporter.report(Progress::TaskFinish);
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::space::Space;
    use crate::core::perturbation::table::{AtomPerturbation, PerturbationTable};
    use crate::engine::sampler::RigidBodyMonteCarlo;
    use crate::engine::testing::{ligand_in_water, ligand_table, run_config};

    fn ensemble(lambdas: &[f64], table: &PerturbationTable) -> ReplicaEnsemble {
        let system = ligand_in_water(Space::Cartesian, 2);
        let config = run_config(lambdas);
        let builder = PerturbedSystemBuilder::new(&system, table, &config);
        ReplicaEnsemble::from_builder(&builder, &config).unwrap()
    }

    // Every atom keeps identical parameters at both ends, so all λ see the same energy.
    fn degenerate_table() -> PerturbationTable {
        let mut table = ligand_table();
        for record in &mut table.atoms {
            *record = AtomPerturbation {
                initial_type: "x".to_string(),
                final_type: "x".to_string(),
                final_charge: record.initial_charge,
                final_sigma: record.initial_sigma,
                final_epsilon: record.initial_epsilon,
                ..record.clone()
            };
        }
        table
    }

    fn uids(e: &ReplicaEnsemble) -> Vec<u64> {
        e.windows().iter().map(|w| w.configuration.uid()).collect()
    }

    #[test]
    fn windows_follow_the_schedule_with_distinct_streams() {
        let e = ensemble(&[0.0, 0.5, 1.0], &ligand_table());
        assert_eq!(e.windows().len(), 3);
        let lambdas: Vec<f64> = e.windows().iter().map(|w| w.lambda()).collect();
        assert_eq!(lambdas, vec![0.0, 0.5, 1.0]);
        let streams: Vec<u64> = e.windows().iter().map(|w| w.rng.get_stream()).collect();
        assert_eq!(streams, vec![1, 2, 3]);
        assert_eq!(e.exchange_rng().get_stream(), 0);
        assert_eq!(e.exchange_stats().len(), 2);
    }

    #[test]
    fn degenerate_windows_always_exchange() {
        let mut e = ensemble(&[0.0, 0.25, 0.5, 0.75], &degenerate_table());
        for _ in 0..4 {
            for attempt in e.exchange_pass().unwrap() {
                assert!(attempt.delta.abs() < 1e-9);
                assert!((attempt.probability - 1.0).abs() < 1e-9);
                assert!(attempt.accepted);
            }
        }
        assert!(e.exchange_stats().iter().all(|s| s.accepted == s.attempted));
    }

    #[test]
    fn exchange_pass_preserves_the_configuration_multiset() {
        let mut e = ensemble(&[0.0, 0.25, 0.5, 0.75, 1.0], &ligand_table());
        let mut before = uids(&e);
        for _ in 0..6 {
            e.exchange_pass().unwrap();
            let mut after = uids(&e);
            after.sort_unstable();
            before.sort_unstable();
            assert_eq!(before, after);
        }
    }

    #[test]
    fn exchange_pass_alternates_parity() {
        let mut e = ensemble(&[0.0, 0.25, 0.5, 0.75], &degenerate_table());
        let first: Vec<_> = e.exchange_pass().unwrap().iter().map(|a| a.pair).collect();
        let second: Vec<_> = e.exchange_pass().unwrap().iter().map(|a| a.pair).collect();
        assert_eq!(first, vec![(0, 1), (2, 3)]);
        assert_eq!(second, vec![(1, 2)]);
    }

    #[test]
    fn run_block_samples_every_window_and_counts_blocks() {
        let mut e = ensemble(&[0.0, 1.0], &ligand_table());
        let sampler = RigidBodyMonteCarlo::new(e.sampling());
        let report = e.run_block(&sampler).unwrap();
        assert_eq!(report.block, 1);
        assert_eq!(report.windows.len(), 2);
        assert_eq!(report.exchanges.len(), 1);
        assert_eq!(e.blocks_completed(), 1);
        for w in e.windows() {
            assert_eq!(w.accumulators.samples(), 4);
        }
    }

    #[test]
    fn identical_seeds_give_identical_ensembles() {
        let mut a = ensemble(&[0.0, 0.5, 1.0], &ligand_table());
        let mut b = ensemble(&[0.0, 0.5, 1.0], &ligand_table());
        let sampler = RigidBodyMonteCarlo::new(a.sampling());
        let ra = a.run_block(&sampler).unwrap();
        let rb = b.run_block(&sampler).unwrap();
        assert_eq!(ra, rb);
        for (wa, wb) in a.windows().iter().zip(b.windows()) {
            assert!(wa.configuration.same_coordinates(&wb.configuration));
        }
    }

    #[test]
    fn advance_stops_when_the_callback_breaks() {
        let mut e = ensemble(&[0.0, 1.0], &ligand_table());
        let sampler = RigidBodyMonteCarlo::new(e.sampling());
        let reporter = ProgressReporter::new();
        let mut seen = Vec::new();
        let completed = e
            .advance(5, &sampler, &reporter, |ens, report| {
                seen.push(report.block);
                Ok(if ens.blocks_completed() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        assert_eq!(completed, 2);
        assert_eq!(seen, vec![1, 2]);
    }
}
