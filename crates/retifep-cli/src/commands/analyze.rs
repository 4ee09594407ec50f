use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use crate::output;
use crate::utils::progress::CliProgressHandler;
use retifep::engine::checkpoint;
use retifep::engine::error::EngineError;
use retifep::engine::progress::ProgressReporter;
use retifep::workflows;
use tracing::info;

pub fn run(args: AnalyzeArgs) -> Result<()> {
    info!("Loading checkpoint from {:?}", &args.checkpoint);
    let ensemble = checkpoint::load(&args.checkpoint).map_err(EngineError::from)?;
    info!(
        windows = ensemble.windows().len(),
        blocks = ensemble.blocks_completed(),
        "Checkpoint loaded."
    );
    if ensemble.blocks_completed() == 0 {
        return Err(CliError::Argument(format!(
            "checkpoint '{}' contains no completed blocks",
            args.checkpoint.display()
        )));
    }

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let report = workflows::reti::analyze(&ensemble, &reporter)?;

    std::fs::create_dir_all(&args.output)?;
    output::write_analysis(&args.output, &ensemble, &report)?;
    output::print_summary(&report);
    println!("Tables written to: {}", args.output.display());
    Ok(())
}
