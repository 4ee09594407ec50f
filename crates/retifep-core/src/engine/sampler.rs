use super::config::SamplingConfig;
use super::error::EngineError;
use super::system::PerturbedSystem;
use crate::core::models::configuration::Configuration;
use crate::core::utils::geometry::{rigid_body_move, rotation_from_axis_angle};
use nalgebra::Vector3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveStatistics {
    pub attempted: u64,
    pub accepted: u64,
}

impl MoveStatistics {
    pub fn acceptance(&self) -> Option<f64> {
        (self.attempted > 0).then(|| self.accepted as f64 / self.attempted as f64)
    }

    pub fn merge(&mut self, other: MoveStatistics) {
        self.attempted += other.attempted;
        self.accepted += other.accepted;
    }
}

/// Advances one window's configuration by a number of moves at the window's λ.
pub trait Sampler: Send + Sync {
    fn sample(
        &self,
        system: &mut PerturbedSystem,
        config: &mut Configuration,
        rng: &mut ChaCha8Rng,
        moves: usize,
    ) -> Result<MoveStatistics, EngineError>;
}

/// Metropolis Monte Carlo with rigid-body translations and rotations of the solute and
/// of individual solvent molecules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBodyMonteCarlo {
    pub max_translation: f64,
    pub max_rotation: f64,
    pub beta: f64,
}

impl RigidBodyMonteCarlo {
    pub fn new(config: &SamplingConfig) -> Self {
        Self {
            max_translation: config.max_translation,
            max_rotation: config.max_rotation,
            beta: config.beta(),
        }
    }

    fn random_unit_vector(rng: &mut ChaCha8Rng) -> Vector3<f64> {
        loop {
            let v: Vector3<f64> = Vector3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            );
            let norm2 = v.norm_squared();
            if norm2 > 1e-6 && norm2 <= 1.0 {
                return v / norm2.sqrt();
            }
        }
    }
}

impl Sampler for RigidBodyMonteCarlo {
    fn sample(
        &self,
        system: &mut PerturbedSystem,
        config: &mut Configuration,
        rng: &mut ChaCha8Rng,
        moves: usize,
    ) -> Result<MoveStatistics, EngineError> {
        let movable: Vec<_> = std::iter::once(system.solute_id())
            .chain(system.solvent_ids().iter().copied())
            .collect();
        let mut stats = MoveStatistics::default();

        for _ in 0..moves {
            let id = movable[rng.gen_range(0..movable.len())];
            let before = system.molecule_interaction(config, id)?;

            let translation = Vector3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            ) * self.max_translation;
            let axis = Self::random_unit_vector(rng);
            let angle = rng.gen_range(-1.0..=1.0) * self.max_rotation;
            let rotation = rotation_from_axis_angle(&axis, angle);

            let current = config
                .positions(id)
                .ok_or_else(|| EngineError::Internal("moved molecule has no coordinates".to_string()))?;
            let proposed = rigid_body_move(current, &rotation, &translation);
            let old = config
                .replace_positions(id, proposed)
                .ok_or_else(|| EngineError::Internal("rigid move changed atom count".to_string()))?;

            stats.attempted += 1;
            let after = match system.molecule_interaction(config, id) {
                Ok(energy) => energy,
                Err(e) => {
                    config.replace_positions(id, old);
                    return Err(e);
                }
            };
            let delta = after - before;
            let accept = delta <= 0.0 || rng.r#gen::<f64>() < (-self.beta * delta).exp();
            if accept {
                stats.accepted += 1;
            } else {
                config.replace_positions(id, old);
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::space::Space;
    use crate::engine::builder::PerturbedSystemBuilder;
    use crate::engine::testing::{ligand_in_water, ligand_table, run_config};
    use rand::SeedableRng;

    fn setup() -> (PerturbedSystem, Configuration) {
        let system = ligand_in_water(Space::Cartesian, 3);
        let table = ligand_table();
        let config = run_config(&[0.0, 0.5, 1.0]);
        let out = PerturbedSystemBuilder::new(&system, &table, &config)
            .build(0.5, (Some(0.0), Some(1.0)), 0)
            .unwrap();
        (out.system, out.configuration)
    }

    fn sampler() -> RigidBodyMonteCarlo {
        RigidBodyMonteCarlo {
            max_translation: 0.2,
            max_rotation: 10.0,
            beta: 1.0 / (0.0019872041 * 300.0),
        }
    }

    #[test]
    fn sample_counts_every_attempt_and_keeps_energy_finite() {
        let (mut system, mut config) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let stats = sampler().sample(&mut system, &mut config, &mut rng, 50).unwrap();
        assert_eq!(stats.attempted, 50);
        assert!(stats.accepted <= 50);
        assert!(system.reference_energy(&config).unwrap().is_finite());
    }

    #[test]
    fn same_seed_gives_identical_trajectories() {
        let (mut sys_a, mut conf_a) = setup();
        let (mut sys_b, mut conf_b) = setup();
        let mut rng_a = ChaCha8Rng::seed_from_u64(11);
        let mut rng_b = ChaCha8Rng::seed_from_u64(11);
        let a = sampler().sample(&mut sys_a, &mut conf_a, &mut rng_a, 30).unwrap();
        let b = sampler().sample(&mut sys_b, &mut conf_b, &mut rng_b, 30).unwrap();
        assert_eq!(a, b);
        assert!(conf_a.same_coordinates(&conf_b));
    }

    #[test]
    fn zero_temperature_limit_never_accepts_uphill_moves() {
        let (mut system, mut config) = setup();
        let mut frozen = sampler();
        frozen.beta = f64::INFINITY;
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let start = system.reference_energy(&config).unwrap();
        frozen.sample(&mut system, &mut config, &mut rng, 40).unwrap();
        let end = system.reference_energy(&config).unwrap();
        assert!(end <= start + 1e-9);
    }

    #[test]
    fn non_finite_trial_energy_aborts_sampling() {
        let (mut system, mut config) = setup();
        let mut broken = sampler();
        broken.max_translation = f64::NAN;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let err = broken
            .sample(&mut system, &mut config, &mut rng, 50)
            .unwrap_err();
        assert!(matches!(err, EngineError::NumericOverflow { window: None, .. }));
        assert!(system.reference_energy(&config).unwrap().is_finite());
    }

    #[test]
    fn acceptance_ratio_is_undefined_without_attempts() {
        assert_eq!(MoveStatistics::default().acceptance(), None);
        let stats = MoveStatistics {
            attempted: 4,
            accepted: 1,
        };
        assert_eq!(stats.acceptance(), Some(0.25));
    }
}
