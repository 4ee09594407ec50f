use crate::cli::RunArgs;
use crate::config::{PartialRunConfig, RunPlan};
use crate::error::{CliError, Result};
use crate::output::{self, ComponentTable};
use crate::utils::progress::CliProgressHandler;
use retifep::core::io::{json::JsonSystemFile, traits::MolecularFile};
use retifep::core::perturbation::table::PerturbationTable;
use retifep::engine::checkpoint;
use retifep::engine::error::EngineError;
use retifep::engine::progress::ProgressReporter;
use retifep::engine::replica::ReplicaEnsemble;
use retifep::engine::sampler::RigidBodyMonteCarlo;
use retifep::workflows;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CHECKPOINT: &str = "checkpoint.json";

pub fn run(args: RunArgs) -> Result<()> {
    let partial_config = match &args.config {
        Some(path) => PartialRunConfig::from_file(path)?,
        None => PartialRunConfig::default(),
    };
    info!("Merging configuration from file and CLI arguments...");
    let RunPlan { config, blocks } = partial_config.merge_with_cli(&args)?;

    std::fs::create_dir_all(&args.output)?;
    let checkpoint_path = args
        .checkpoint
        .clone()
        .unwrap_or_else(|| args.output.join(DEFAULT_CHECKPOINT));

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let mut ensemble = match &args.restart {
        Some(restart) => {
            info!("Restarting from checkpoint {:?}", restart);
            let ensemble = checkpoint::load(restart).map_err(EngineError::from)?;
            if ensemble.schedule() != &config.schedule || ensemble.sampling() != &config.sampling {
                warn!(
                    "Schedule and sampling settings are taken from the checkpoint; \
                     overrides other than the block count are ignored on restart."
                );
            }
            ensemble
        }
        None => prepare_new(&args, &config, &reporter)?,
    };

    println!(
        "Sampling {} block(s) over {} λ window(s), starting at block {}...",
        blocks,
        ensemble.windows().len(),
        ensemble.blocks_completed() + 1
    );

    let components_path = args.output.join(output::COMPONENTS_FILE);
    let mut components = ComponentTable::open(&components_path, args.restart.is_some())?;
    let sampler = RigidBodyMonteCarlo::new(ensemble.sampling());

    // The component table cannot fail the engine, so its errors are carried out separately.
    let mut table_error: Option<CliError> = None;
    let completed = workflows::reti::run(
        &mut ensemble,
        &sampler,
        blocks,
        Some(&checkpoint_path),
        &reporter,
        |ensemble, report| {
            if let Err(e) = components.write_block(ensemble, report) {
                table_error = Some(e);
                return Ok(ControlFlow::Break(()));
            }
            Ok(ControlFlow::Continue(()))
        },
    )?;
    if let Some(e) = table_error {
        return Err(e);
    }
    info!(completed, "Sampling complete.");

    finish(&args.output, &ensemble, &reporter)?;
    println!("Checkpoint written to: {}", checkpoint_path.display());
    Ok(())
}

fn prepare_new(
    args: &RunArgs,
    config: &retifep::engine::config::RunConfig,
    reporter: &ProgressReporter,
) -> Result<ReplicaEnsemble> {
    let system_path = required(&args.system, "--system")?;
    let perturbation_path = required(&args.perturbation, "--perturbation")?;

    info!("Loading molecular system from {:?}", system_path);
    let system =
        JsonSystemFile::read_from_path(system_path).map_err(|e| CliError::FileParsing {
            path: system_path.to_path_buf(),
            source: e.into(),
        })?;

    info!("Loading perturbation table from {:?}", perturbation_path);
    let table = PerturbationTable::load(perturbation_path, args.bonded.as_deref())
        .map_err(EngineError::from)?;

    Ok(workflows::reti::prepare(&system, &table, config, reporter)?)
}

fn required<'a>(value: &'a Option<PathBuf>, flag: &str) -> Result<&'a Path> {
    value
        .as_deref()
        .ok_or_else(|| CliError::Argument(format!("{flag} is required unless --restart is given")))
}

fn finish(dir: &Path, ensemble: &ReplicaEnsemble, reporter: &ProgressReporter) -> Result<()> {
    let report = workflows::reti::analyze(ensemble, reporter)?;
    output::write_analysis(dir, ensemble, &report)?;
    output::print_summary(&report);
    println!("Tables written to: {}", dir.display());
    Ok(())
}
