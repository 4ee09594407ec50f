use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "RETI-FEP CLI - Replica-exchange thermodynamic integration for alchemical free-energy calculations with soft-core λ coupling.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to sample λ windows in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample a λ schedule with replica exchange and estimate the free-energy change.
    Run(RunArgs),
    /// Recompute TI, FEP and BAR estimates from a checkpoint without sampling.
    Analyze(AnalyzeArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegArg {
    Initial,
    Final,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Inputs ---
    /// Path to the molecular system document (JSON).
    #[arg(short = 'i', long, value_name = "PATH", required_unless_present = "restart")]
    pub system: Option<PathBuf>,

    /// Path to the per-atom perturbation table (CSV).
    #[arg(short, long, value_name = "PATH", required_unless_present = "restart")]
    pub perturbation: Option<PathBuf>,

    /// Path to the bonded perturbation file (TOML).
    #[arg(long, value_name = "PATH")]
    pub bonded: Option<PathBuf>,

    /// Path to the run configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Continue sampling from a checkpoint instead of building new windows.
    #[arg(short, long, value_name = "PATH")]
    pub restart: Option<PathBuf>,

    // --- Outputs ---
    /// Directory receiving the component, gradient, PMF and site tables.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Checkpoint written after every block. Defaults to `checkpoint.json` in the output directory.
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,

    // --- Schedule Overrides ---
    /// Explicit λ values, comma separated (e.g. 0,0.25,0.5,0.75,1).
    #[arg(long, value_name = "LIST", value_delimiter = ',', conflicts_with = "windows")]
    pub lambdas: Option<Vec<f64>>,

    /// Number of evenly spaced λ windows spanning [0, 1].
    #[arg(short, long, value_name = "INT")]
    pub windows: Option<usize>,

    /// Override the finite-difference step Δλ.
    #[arg(long, value_name = "FLOAT")]
    pub delta_lambda: Option<f64>,

    /// Override the coupling leg.
    #[arg(long, value_enum)]
    pub leg: Option<LegArg>,

    // --- Sampling Overrides ---
    /// Override the number of moves per window per block.
    #[arg(short, long, value_name = "INT")]
    pub moves_per_block: Option<usize>,

    /// Override the number of blocks to run.
    #[arg(short, long, value_name = "INT")]
    pub blocks: Option<u64>,

    /// Override the temperature in Kelvin.
    #[arg(short, long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sampling.sample-interval=50
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Checkpoint to analyse.
    #[arg(required = true, value_name = "CHECKPOINT")]
    pub checkpoint: PathBuf,

    /// Directory receiving the gradient, PMF and site tables.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_a_comma_separated_schedule() {
        let cli = Cli::try_parse_from([
            "retifep", "run", "-i", "sys.json", "-p", "pert.csv", "-o", "out", "--lambdas",
            "0,0.5,1",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.lambdas, Some(vec![0.0, 0.5, 1.0]));
        assert_eq!(args.windows, None);
    }

    #[test]
    fn run_without_inputs_requires_a_restart() {
        assert!(Cli::try_parse_from(["retifep", "run", "-o", "out"]).is_err());
        assert!(Cli::try_parse_from(["retifep", "run", "-o", "out", "-r", "ckpt.json"]).is_ok());
    }

    #[test]
    fn lambdas_and_windows_conflict() {
        let result = Cli::try_parse_from([
            "retifep", "run", "-r", "c.json", "-o", "out", "--lambdas", "0,1", "-w", "3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn verbosity_counts_and_conflicts_with_quiet() {
        let cli = Cli::try_parse_from(["retifep", "-vv", "analyze", "c.json", "-o", "out"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(Cli::try_parse_from(["retifep", "-v", "-q", "analyze", "c.json", "-o", "o"]).is_err());
    }
}
