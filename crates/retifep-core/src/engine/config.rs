use super::schedule::LambdaSchedule;
use crate::core::forcefield::params::NonbondedParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boltzmann constant in kcal/(mol·K).
pub const K_BOLTZMANN: f64 = 0.0019872041;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Orientation of the alchemical transformation.
///
/// On the initial leg to-dummy atoms are softened as λ grows; the final leg swaps the
/// roles of λ and 1 - λ in every α expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CouplingLeg {
    #[default]
    Initial,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub moves_per_block: usize,
    pub sample_interval: usize,
    pub max_translation: f64, // Å
    pub max_rotation: f64,    // degrees
    pub temperature: f64,     // K
}

impl SamplingConfig {
    /// 1 / k_BT in mol/kcal.
    pub fn beta(&self) -> f64 {
        1.0 / (K_BOLTZMANN * self.temperature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumConfig {
    pub bond_tolerance: f64,
    pub angle_tolerance: f64,
    /// Treat a ring-breaking adjustment as a fatal error instead of skipping it.
    pub strict: bool,
}

impl Default for EquilibriumConfig {
    fn default() -> Self {
        Self {
            bond_tolerance: 1e-3,
            angle_tolerance: 0.1,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Number of solvent sites nearest the solute to track.
    pub num_sites: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub schedule: LambdaSchedule,
    pub delta_lambda: f64,
    pub leg: CouplingLeg,
    pub nonbonded: NonbondedParams,
    pub sampling: SamplingConfig,
    pub equilibrium: EquilibriumConfig,
    pub identity: Option<IdentityConfig>,
    pub solute_name: Option<String>,
    pub histogram_bin_width: Option<f64>,
    pub seed: u64,
}

#[derive(Default)]
pub struct RunConfigBuilder {
    schedule: Option<LambdaSchedule>,
    delta_lambda: Option<f64>,
    leg: Option<CouplingLeg>,
    nonbonded: Option<NonbondedParams>,
    moves_per_block: Option<usize>,
    sample_interval: Option<usize>,
    max_translation: Option<f64>,
    max_rotation: Option<f64>,
    temperature: Option<f64>,
    equilibrium: Option<EquilibriumConfig>,
    identity_sites: Option<usize>,
    solute_name: Option<String>,
    histogram_bin_width: Option<f64>,
    seed: Option<u64>,
}

impl RunConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(mut self, schedule: LambdaSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }
    pub fn delta_lambda(mut self, delta: f64) -> Self {
        self.delta_lambda = Some(delta);
        self
    }
    pub fn leg(mut self, leg: CouplingLeg) -> Self {
        self.leg = Some(leg);
        self
    }
    pub fn nonbonded(mut self, params: NonbondedParams) -> Self {
        self.nonbonded = Some(params);
        self
    }
    pub fn moves_per_block(mut self, moves: usize) -> Self {
        self.moves_per_block = Some(moves);
        self
    }
    pub fn sample_interval(mut self, interval: usize) -> Self {
        self.sample_interval = Some(interval);
        self
    }
    pub fn max_translation(mut self, angstroms: f64) -> Self {
        self.max_translation = Some(angstroms);
        self
    }
    pub fn max_rotation(mut self, degrees: f64) -> Self {
        self.max_rotation = Some(degrees);
        self
    }
    pub fn temperature(mut self, kelvin: f64) -> Self {
        self.temperature = Some(kelvin);
        self
    }
    pub fn equilibrium(mut self, equilibrium: EquilibriumConfig) -> Self {
        self.equilibrium = Some(equilibrium);
        self
    }
    pub fn identity_sites(mut self, num_sites: usize) -> Self {
        self.identity_sites = Some(num_sites);
        self
    }
    pub fn solute_name(mut self, name: &str) -> Self {
        self.solute_name = Some(name.to_string());
        self
    }
    pub fn histogram_bin_width(mut self, width: f64) -> Self {
        self.histogram_bin_width = Some(width);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<RunConfig, ConfigError> {
        let schedule = self.schedule.ok_or(ConfigError::MissingParameter("schedule"))?;
        let delta_lambda = self
            .delta_lambda
            .ok_or(ConfigError::MissingParameter("delta_lambda"))?;
        let moves_per_block = self
            .moves_per_block
            .ok_or(ConfigError::MissingParameter("moves_per_block"))?;
        let temperature = self
            .temperature
            .ok_or(ConfigError::MissingParameter("temperature"))?;
        let sample_interval = self.sample_interval.unwrap_or(moves_per_block.clamp(1, 100));

        if !(delta_lambda > 0.0 && delta_lambda <= 1.0) {
            return Err(invalid("delta_lambda", format!("must lie in (0, 1], got {delta_lambda}")));
        }
        if !(temperature > 0.0) {
            return Err(invalid("temperature", format!("must be positive, got {temperature}")));
        }
        let max_translation = self.max_translation.unwrap_or(0.15);
        if !(max_translation.is_finite() && max_translation >= 0.0) {
            return Err(invalid(
                "max_translation",
                format!("must be finite and non-negative, got {max_translation}"),
            ));
        }
        let max_rotation = self.max_rotation.unwrap_or(15.0);
        if !(max_rotation.is_finite() && max_rotation >= 0.0) {
            return Err(invalid(
                "max_rotation",
                format!("must be finite and non-negative, got {max_rotation}"),
            ));
        }
        if sample_interval == 0 {
            return Err(invalid("sample_interval", "must be positive".to_string()));
        }
        if let Some(width) = self.histogram_bin_width.filter(|w| !(*w > 0.0)) {
            return Err(invalid("histogram_bin_width", format!("must be positive, got {width}")));
        }

        let nonbonded = self.nonbonded.unwrap_or_default();
        nonbonded
            .validate()
            .map_err(|reason| invalid("nonbonded", reason))?;

        let identity = match self.identity_sites {
            Some(0) | None => None,
            Some(num_sites) => Some(IdentityConfig { num_sites }),
        };

        Ok(RunConfig {
            schedule,
            delta_lambda,
            leg: self.leg.unwrap_or_default(),
            nonbonded,
            sampling: SamplingConfig {
                moves_per_block,
                sample_interval,
                max_translation,
                max_rotation,
                temperature,
            },
            equilibrium: self.equilibrium.unwrap_or_default(),
            identity,
            solute_name: self.solute_name,
            histogram_bin_width: self.histogram_bin_width,
            seed: self.seed.unwrap_or(0),
        })
    }
}

fn invalid(name: &'static str, reason: String) -> ConfigError {
    ConfigError::InvalidParameter { name, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> RunConfigBuilder {
        RunConfigBuilder::new()
            .schedule(LambdaSchedule::from_count(3).unwrap())
            .delta_lambda(0.01)
            .moves_per_block(500)
            .temperature(298.15)
    }

    #[test]
    fn build_succeeds_with_required_parameters_and_fills_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.schedule.len(), 3);
        assert_eq!(config.leg, CouplingLeg::Initial);
        assert_eq!(config.sampling.sample_interval, 100);
        assert_eq!(config.nonbonded, NonbondedParams::default());
        assert!(config.identity.is_none());
        assert_eq!(config.seed, 0);
    }

    #[test]
    fn build_fails_if_schedule_is_missing() {
        let result = RunConfigBuilder::new()
            .delta_lambda(0.01)
            .moves_per_block(10)
            .temperature(300.0)
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("schedule"));
    }

    #[test]
    fn build_fails_if_temperature_is_missing() {
        let result = RunConfigBuilder::new()
            .schedule(LambdaSchedule::from_count(2).unwrap())
            .delta_lambda(0.01)
            .moves_per_block(10)
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("temperature"));
    }

    #[test]
    fn build_rejects_non_positive_delta_lambda() {
        let result = minimal().delta_lambda(0.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "delta_lambda", .. })
        ));
    }

    #[test]
    fn build_rejects_non_finite_or_negative_move_sizes() {
        for bad in [f64::NAN, f64::INFINITY, -0.1] {
            assert!(matches!(
                minimal().max_translation(bad).build(),
                Err(ConfigError::InvalidParameter { name: "max_translation", .. })
            ));
            assert!(matches!(
                minimal().max_rotation(bad).build(),
                Err(ConfigError::InvalidParameter { name: "max_rotation", .. })
            ));
        }
        assert!(minimal().max_translation(0.0).max_rotation(0.0).build().is_ok());
    }

    #[test]
    fn build_rejects_zero_sample_interval() {
        let result = minimal().sample_interval(0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "sample_interval", .. })
        ));
    }

    #[test]
    fn identity_sites_enable_tracking() {
        let config = minimal().identity_sites(4).build().unwrap();
        assert_eq!(config.identity, Some(IdentityConfig { num_sites: 4 }));
    }

    #[test]
    fn beta_is_inverse_thermal_energy() {
        let config = minimal().build().unwrap();
        let kt = K_BOLTZMANN * 298.15;
        assert!((config.sampling.beta() * kt - 1.0).abs() < 1e-12);
    }
}
