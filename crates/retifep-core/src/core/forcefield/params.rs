use crate::core::models::atom::AtomParams;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Rule used to combine per-atom Lennard-Jones parameters into pair parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CombiningRule {
    /// Lorentz-Berthelot: arithmetic mean of σ, geometric mean of ε.
    #[default]
    Arithmetic,
    /// Geometric mean of both σ and ε.
    Geometric,
}

impl CombiningRule {
    /// Returns the pair `(σ, ε)` for two atoms.
    #[inline]
    pub fn combine(self, a: &AtomParams, b: &AtomParams) -> (f64, f64) {
        let epsilon = (a.epsilon * b.epsilon).sqrt();
        let sigma = match self {
            CombiningRule::Arithmetic => 0.5 * (a.sigma + b.sigma),
            CombiningRule::Geometric => (a.sigma * b.sigma).sqrt(),
        };
        (sigma, epsilon)
    }
}

/// Parameters of the soft-core functional form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoftcoreParams {
    /// Exponent p of the `(1 - α)^p` Coulomb prefactor.
    pub coulomb_power: u32,
    /// Shift δ added to r² (scaled by α) to remove the singularity, in Å².
    pub shift_delta: f64,
}

impl Default for SoftcoreParams {
    fn default() -> Self {
        Self {
            coulomb_power: 0,
            shift_delta: 1.2,
        }
    }
}

/// Scale factors applied to 1-4 pairs within a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scale14 {
    pub coulomb: f64,
    pub lj: f64,
}

impl Default for Scale14 {
    fn default() -> Self {
        Self {
            coulomb: 1.0 / 1.2,
            lj: 0.5,
        }
    }
}

/// Run-wide non-bonded parameters. Read-only for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NonbondedParams {
    /// Atom-pair cutoff in Angstroms.
    pub cutoff: f64,
    /// Width of the switching region below the cutoff, in Angstroms.
    pub feather: f64,
    /// Relative dielectric constant.
    pub dielectric: f64,
    pub combining_rule: CombiningRule,
    pub scale14: Scale14,
    pub softcore: SoftcoreParams,
}

impl Default for NonbondedParams {
    fn default() -> Self {
        Self {
            cutoff: 10.0,
            feather: 0.5,
            dielectric: 1.0,
            combining_rule: CombiningRule::Arithmetic,
            scale14: Scale14::default(),
            softcore: SoftcoreParams::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid parameters in '{path}': {reason}")]
    Invalid { path: String, reason: String },
}

impl NonbondedParams {
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let params: Self = toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        params.validate().map_err(|reason| ParamLoadError::Invalid {
            path: path.to_string_lossy().to_string(),
            reason,
        })?;
        Ok(params)
    }

    /// Checks the internal consistency of the parameters.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.cutoff > 0.0) {
            return Err(format!("cutoff must be positive, got {}", self.cutoff));
        }
        if !(0.0..self.cutoff).contains(&self.feather) {
            return Err(format!(
                "feather must lie in [0, cutoff), got {} with cutoff {}",
                self.feather, self.cutoff
            ));
        }
        if !(self.dielectric > 0.0) {
            return Err(format!("dielectric must be positive, got {}", self.dielectric));
        }
        if !(self.softcore.shift_delta >= 0.0) {
            return Err(format!(
                "soft-core shift delta must be non-negative, got {}",
                self.softcore.shift_delta
            ));
        }
        Ok(())
    }

    /// Inner radius of the switching region.
    pub fn switch_on(&self) -> f64 {
        self.cutoff - self.feather
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn arithmetic_rule_averages_sigma_and_takes_geometric_epsilon() {
        let a = AtomParams::new(0.0, 3.0, 0.04);
        let b = AtomParams::new(0.0, 4.0, 0.01);
        let (sigma, epsilon) = CombiningRule::Arithmetic.combine(&a, &b);
        assert!(f64_approx_equal(sigma, 3.5));
        assert!(f64_approx_equal(epsilon, 0.02));
    }

    #[test]
    fn geometric_rule_uses_geometric_mean_for_sigma() {
        let a = AtomParams::new(0.0, 2.0, 1.0);
        let b = AtomParams::new(0.0, 8.0, 1.0);
        let (sigma, _) = CombiningRule::Geometric.combine(&a, &b);
        assert!(f64_approx_equal(sigma, 4.0));
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonbonded.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            cutoff = 12.0
            combining_rule = "geometric"

            [softcore]
            coulomb_power = 1
            "#
        )
        .unwrap();

        let params = NonbondedParams::load(&path).unwrap();
        assert_eq!(params.cutoff, 12.0);
        assert_eq!(params.feather, 0.5);
        assert_eq!(params.combining_rule, CombiningRule::Geometric);
        assert_eq!(params.softcore.coulomb_power, 1);
        assert_eq!(params.softcore.shift_delta, 1.2);
    }

    #[test]
    fn load_fails_for_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonbonded.toml");
        std::fs::write(&path, "cutof = 12.0\n").unwrap();
        assert!(matches!(
            NonbondedParams::load(&path),
            Err(ParamLoadError::Toml { .. })
        ));
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = NonbondedParams::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ParamLoadError::Io { .. })));
    }

    #[test]
    fn load_rejects_feather_wider_than_cutoff() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonbonded.toml");
        std::fs::write(&path, "cutoff = 8.0\nfeather = 9.0\n").unwrap();
        assert!(matches!(
            NonbondedParams::load(&path),
            Err(ParamLoadError::Invalid { .. })
        ));
    }
}
