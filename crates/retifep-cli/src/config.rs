use crate::cli::{LegArg, RunArgs};
use crate::error::{CliError, Result};
use retifep::core::forcefield::params::NonbondedParams;
use retifep::engine::config::{self as core_config, CouplingLeg, EquilibriumConfig};
use retifep::engine::schedule::LambdaSchedule;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub struct DefaultsConfig {
    pub windows: usize,
    pub delta_lambda: f64,
    pub moves_per_block: usize,
    pub blocks: u64,
    pub temperature: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            windows: 11,
            delta_lambda: 0.001,
            moves_per_block: 1000,
            blocks: 10,
            temperature: 298.15,
        }
    }
}

/// The fully merged settings of a `run` invocation.
#[derive(Debug)]
pub struct RunPlan {
    pub config: core_config::RunConfig,
    pub blocks: u64,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialLambdaConfig {
    values: Option<Vec<f64>>,
    windows: Option<usize>,
    delta: Option<f64>,
    leg: Option<CouplingLeg>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSamplingConfig {
    moves_per_block: Option<usize>,
    sample_interval: Option<usize>,
    blocks: Option<u64>,
    temperature: Option<f64>,
    max_translation: Option<f64>,
    max_rotation: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialEquilibriumConfig {
    bond_tolerance: Option<f64>,
    angle_tolerance: Option<f64>,
    strict: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMonitoringConfig {
    identity_sites: Option<usize>,
    histogram_bin_width: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialRunConfig {
    solute: Option<String>,
    seed: Option<u64>,
    /// Path to a TOML file of non-bonded and soft-core parameters.
    nonbonded: Option<PathBuf>,
    lambda: Option<PartialLambdaConfig>,
    sampling: Option<PartialSamplingConfig>,
    equilibrium: Option<PartialEquilibriumConfig>,
    monitoring: Option<PartialMonitoringConfig>,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merges command-line overrides over the file values over the defaults.
    pub fn merge_with_cli(mut self, args: &RunArgs) -> Result<RunPlan> {
        self.apply_set_values(&args.set_values)?;
        let defaults = DefaultsConfig::default();

        let lambda = self.lambda.take().unwrap_or_default();
        let sampling = self.sampling.take().unwrap_or_default();
        let equilibrium = self.equilibrium.take().unwrap_or_default();
        let monitoring = self.monitoring.take().unwrap_or_default();

        let schedule = match (&args.lambdas, args.windows) {
            (Some(values), _) => LambdaSchedule::new(values.clone()),
            (None, Some(count)) => LambdaSchedule::from_count(count),
            (None, None) => match lambda.values {
                Some(values) => LambdaSchedule::new(values),
                None => LambdaSchedule::from_count(lambda.windows.unwrap_or(defaults.windows)),
            },
        }
        .map_err(|e| CliError::Config(e.to_string()))?;

        let leg = match args.leg {
            Some(LegArg::Initial) => CouplingLeg::Initial,
            Some(LegArg::Final) => CouplingLeg::Final,
            None => lambda.leg.unwrap_or_default(),
        };

        let nonbonded = match &self.nonbonded {
            Some(path) => NonbondedParams::load(path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })?,
            None => NonbondedParams::default(),
        };

        let base_equilibrium = EquilibriumConfig::default();
        let equilibrium = EquilibriumConfig {
            bond_tolerance: equilibrium
                .bond_tolerance
                .unwrap_or(base_equilibrium.bond_tolerance),
            angle_tolerance: equilibrium
                .angle_tolerance
                .unwrap_or(base_equilibrium.angle_tolerance),
            strict: equilibrium.strict.unwrap_or(base_equilibrium.strict),
        };

        let mut builder = core_config::RunConfigBuilder::new()
            .schedule(schedule)
            .delta_lambda(
                args.delta_lambda
                    .or(lambda.delta)
                    .unwrap_or(defaults.delta_lambda),
            )
            .leg(leg)
            .nonbonded(nonbonded)
            .moves_per_block(
                args.moves_per_block
                    .or(sampling.moves_per_block)
                    .unwrap_or(defaults.moves_per_block),
            )
            .temperature(
                args.temperature
                    .or(sampling.temperature)
                    .unwrap_or(defaults.temperature),
            )
            .equilibrium(equilibrium)
            .seed(args.seed.or(self.seed).unwrap_or(0));

        if let Some(interval) = sampling.sample_interval {
            builder = builder.sample_interval(interval);
        }
        if let Some(step) = sampling.max_translation {
            builder = builder.max_translation(step);
        }
        if let Some(step) = sampling.max_rotation {
            builder = builder.max_rotation(step);
        }
        if let Some(sites) = monitoring.identity_sites {
            builder = builder.identity_sites(sites);
        }
        if let Some(width) = monitoring.histogram_bin_width {
            builder = builder.histogram_bin_width(width);
        }
        if let Some(name) = &self.solute {
            builder = builder.solute_name(name);
        }

        let config = builder
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(RunPlan {
            config,
            blocks: args.blocks.or(sampling.blocks).unwrap_or(defaults.blocks),
        })
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "solute" => self.solute = Some(value_str.to_string()),
                "seed" => self.seed = Some(parse_value(key, value_str)?),
                "nonbonded" => self.nonbonded = Some(PathBuf::from(value_str)),
                "lambda.windows" => {
                    let lambda = self.lambda.get_or_insert_with(Default::default);
                    lambda.windows = Some(parse_value(key, value_str)?);
                    lambda.values = None;
                }
                "lambda.delta" => {
                    self.lambda.get_or_insert_with(Default::default).delta =
                        Some(parse_value(key, value_str)?)
                }
                "lambda.leg" => {
                    let leg = match value_str {
                        "initial" => CouplingLeg::Initial,
                        "final" => CouplingLeg::Final,
                        _ => {
                            return Err(CliError::Config(format!(
                                "Invalid value for {}: {} (expected 'initial' or 'final')",
                                key, value_str
                            )));
                        }
                    };
                    self.lambda.get_or_insert_with(Default::default).leg = Some(leg);
                }
                "sampling.moves-per-block" => {
                    self.sampling.get_or_insert_with(Default::default).moves_per_block =
                        Some(parse_value(key, value_str)?)
                }
                "sampling.sample-interval" => {
                    self.sampling.get_or_insert_with(Default::default).sample_interval =
                        Some(parse_value(key, value_str)?)
                }
                "sampling.blocks" => {
                    self.sampling.get_or_insert_with(Default::default).blocks =
                        Some(parse_value(key, value_str)?)
                }
                "sampling.temperature" => {
                    self.sampling.get_or_insert_with(Default::default).temperature =
                        Some(parse_value(key, value_str)?)
                }
                "sampling.max-translation" => {
                    self.sampling.get_or_insert_with(Default::default).max_translation =
                        Some(parse_value(key, value_str)?)
                }
                "sampling.max-rotation" => {
                    self.sampling.get_or_insert_with(Default::default).max_rotation =
                        Some(parse_value(key, value_str)?)
                }
                "equilibrium.strict" => {
                    self.equilibrium.get_or_insert_with(Default::default).strict =
                        Some(parse_value(key, value_str)?)
                }
                "monitoring.identity-sites" => {
                    self.monitoring.get_or_insert_with(Default::default).identity_sites =
                        Some(parse_value(key, value_str)?)
                }
                "monitoring.histogram-bin-width" => {
                    self.monitoring
                        .get_or_insert_with(Default::default)
                        .histogram_bin_width = Some(parse_value(key, value_str)?)
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}
