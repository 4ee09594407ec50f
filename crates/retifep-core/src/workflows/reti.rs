use crate::analysis::estimator::{FreeEnergyEstimator, FreeEnergyReport, WindowData};
use crate::core::models::system::MolecularSystem;
use crate::core::perturbation::table::PerturbationTable;
use crate::engine::builder::PerturbedSystemBuilder;
use crate::engine::checkpoint;
use crate::engine::config::RunConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::replica::{BlockReport, ReplicaEnsemble};
use crate::engine::sampler::Sampler;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{info, instrument};

/// Builds every λ window of `config.schedule` into a fresh ensemble.
#[instrument(skip_all, name = "reti_prepare")]
pub fn prepare(
    system: &MolecularSystem,
    table: &PerturbationTable,
    config: &RunConfig,
    reporter: &ProgressReporter,
) -> Result<ReplicaEnsemble, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Preparing λ Windows",
    });
    info!(
        windows = config.schedule.len(),
        delta_lambda = config.delta_lambda,
        leg = ?config.leg,
        "Building perturbed systems."
    );

    let builder = PerturbedSystemBuilder::new(system, table, config);
    let ensemble = ReplicaEnsemble::from_builder(&builder, config)?;

    reporter.report(Progress::PhaseFinish);
    Ok(ensemble)
}

/// Samples `blocks` further blocks of `ensemble`.
///
/// After every completed block the whole ensemble is written to `checkpoint`, if
/// given, and then handed to `on_block`, which may stop the run early. A block that
/// fails leaves the previous checkpoint in place.
///
/// Returns the number of blocks completed by this call.
#[instrument(skip_all, name = "reti_sampling", fields(blocks = blocks))]
pub fn run<F>(
    ensemble: &mut ReplicaEnsemble,
    sampler: &dyn Sampler,
    blocks: u64,
    checkpoint: Option<&Path>,
    reporter: &ProgressReporter,
    mut on_block: F,
) -> Result<u64, EngineError>
where
    F: FnMut(&ReplicaEnsemble, &BlockReport) -> Result<ControlFlow<()>, EngineError>,
{
    reporter.report(Progress::PhaseStart { name: "Sampling" });
    info!(
        start_block = ensemble.blocks_completed() + 1,
        blocks, "Starting replica-exchange sampling."
    );

    let completed = ensemble.advance(blocks, sampler, reporter, |ensemble, report| {
        if let Some(path) = checkpoint {
            checkpoint::save(ensemble, path)?;
        }
        on_block(ensemble, report)
    })?;

    info!(
        completed,
        total = ensemble.blocks_completed(),
        "Sampling finished."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(completed)
}

/// Computes TI, FEP and BAR profiles from everything the ensemble has accumulated.
#[instrument(skip_all, name = "reti_analysis")]
pub fn analyze(
    ensemble: &ReplicaEnsemble,
    reporter: &ProgressReporter,
) -> Result<FreeEnergyReport, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Free-Energy Analysis",
    });

    let data = ensemble
        .windows()
        .iter()
        .map(WindowData::from_window)
        .collect::<Result<Vec<_>, _>>()?;
    let estimator = FreeEnergyEstimator::new(ensemble.sampling().beta());
    let report = estimator.estimate_all(&data)?;

    info!(
        ti = report.ti.delta_g(),
        ti_error = report.ti.error,
        fep = report.fep.delta_g(),
        fep_error = report.fep.error,
        bar = report.bar.delta_g(),
        "Free-energy estimates (kcal/mol)."
    );
    reporter.report(Progress::PhaseFinish);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::estimator::EstimatorError;
    use crate::core::models::configuration::Configuration;
    use crate::core::models::space::Space;
    use crate::engine::sampler::{MoveStatistics, RigidBodyMonteCarlo};
    use crate::engine::system::PerturbedSystem;
    use crate::engine::testing::{ligand_in_water, ligand_table, run_config};
    use rand_chacha::ChaCha8Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn prepared(lambdas: &[f64]) -> ReplicaEnsemble {
        let system = ligand_in_water(Space::Cartesian, 2);
        let table = ligand_table();
        let config = run_config(lambdas);
        prepare(&system, &table, &config, &ProgressReporter::new()).unwrap()
    }

    fn keep_going(_: &ReplicaEnsemble, _: &BlockReport) -> Result<ControlFlow<()>, EngineError> {
        Ok(ControlFlow::Continue(()))
    }

    #[test]
    fn prepare_builds_one_window_per_lambda() {
        let ensemble = prepared(&[0.0, 0.25, 0.5, 1.0]);
        let lambdas: Vec<f64> = ensemble.windows().iter().map(|w| w.lambda()).collect();
        assert_eq!(lambdas, vec![0.0, 0.25, 0.5, 1.0]);
        assert_eq!(ensemble.blocks_completed(), 0);
    }

    #[test]
    fn run_checkpoints_every_completed_block() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut ensemble = prepared(&[0.0, 0.5, 1.0]);
        let sampler = RigidBodyMonteCarlo::new(ensemble.sampling());

        let mut seen = Vec::new();
        let completed = run(
            &mut ensemble,
            &sampler,
            2,
            Some(&path),
            &ProgressReporter::new(),
            |ens, report| {
                seen.push((report.block, checkpoint::load(&path)?.blocks_completed()));
                assert_eq!(ens.blocks_completed(), report.block);
                Ok(ControlFlow::Continue(()))
            },
        )
        .unwrap();

        assert_eq!(completed, 2);
        assert_eq!(seen, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn run_stops_when_the_callback_breaks() {
        let mut ensemble = prepared(&[0.0, 1.0]);
        let sampler = RigidBodyMonteCarlo::new(ensemble.sampling());
        let completed = run(
            &mut ensemble,
            &sampler,
            5,
            None,
            &ProgressReporter::new(),
            |_, _| Ok(ControlFlow::Break(())),
        )
        .unwrap();
        assert_eq!(completed, 1);
        assert_eq!(ensemble.blocks_completed(), 1);
    }

    /// Delegates to a real sampler until its call budget runs out, then fails.
    struct FailingSampler {
        inner: RigidBodyMonteCarlo,
        calls_left: AtomicUsize,
    }

    impl Sampler for FailingSampler {
        fn sample(
            &self,
            system: &mut PerturbedSystem,
            config: &mut Configuration,
            rng: &mut ChaCha8Rng,
            moves: usize,
        ) -> Result<MoveStatistics, EngineError> {
            let budget = self
                .calls_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if budget.is_err() {
                return Err(EngineError::NumericOverflow {
                    window: None,
                    term: "ref:hard-solvent".to_string(),
                });
            }
            self.inner.sample(system, config, rng, moves)
        }
    }

    #[test]
    fn failed_block_leaves_the_last_checkpoint_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut ensemble = prepared(&[0.0, 1.0]);
        // run_config samples 20 moves every 5: four sampler calls per window per block
        let sampler = FailingSampler {
            inner: RigidBodyMonteCarlo::new(ensemble.sampling()),
            calls_left: AtomicUsize::new(8),
        };

        let err = run(
            &mut ensemble,
            &sampler,
            3,
            Some(&path),
            &ProgressReporter::new(),
            keep_going,
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::NumericOverflow { window: Some(_), .. }));
        assert_eq!(checkpoint::load(&path).unwrap().blocks_completed(), 1);
    }

    #[test]
    fn analyze_produces_finite_estimates_on_a_common_grid() {
        let mut ensemble = prepared(&[0.0, 0.5, 1.0]);
        let sampler = RigidBodyMonteCarlo::new(ensemble.sampling());
        run(
            &mut ensemble,
            &sampler,
            2,
            None,
            &ProgressReporter::new(),
            keep_going,
        )
        .unwrap();

        let report = analyze(&ensemble, &ProgressReporter::new()).unwrap();
        for estimate in [&report.ti, &report.fep, &report.bar] {
            assert!(estimate.delta_g().is_finite());
            assert!(estimate.error.is_finite());
        }
        assert_eq!(report.fep.pmf.len(), 3);
        assert_eq!(report.bar.pmf.len(), 3);
        assert_eq!(report.ti.pmf.len(), 3);
    }

    #[test]
    fn analyze_before_sampling_reports_missing_samples() {
        let ensemble = prepared(&[0.0, 1.0]);
        let err = analyze(&ensemble, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Estimation(EstimatorError::NoSamples { window: 0 })
        ));
    }
}
