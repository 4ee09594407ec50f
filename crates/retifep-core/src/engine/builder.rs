use super::config::{CouplingLeg, RunConfig};
use super::constraints::{AlphaExpr, ConstraintPropagator};
use super::error::EngineError;
use super::system::PerturbedSystem;
use crate::core::forcefield::term::{
    EnergyTerm, Environment, TermGroups, TermHandle, TermKind, TermScope,
};
use crate::core::models::configuration::Configuration;
use crate::core::models::molecule::MoleculeCategory;
use crate::core::models::system::MolecularSystem;
use crate::core::perturbation::equilibrium::{AdjustmentReport, EquilibriumAdjuster};
use crate::core::perturbation::partition::{AtomClass, EndpointPartitioner, StateKind};
use crate::core::perturbation::table::PerturbationTable;
use tracing::{debug, warn};

/// Everything produced for one λ window.
#[derive(Debug)]
pub struct BuildOutput {
    pub system: PerturbedSystem,
    pub configuration: Configuration,
    pub adjustments: AdjustmentReport,
}

/// Turns a molecular system and a perturbation description into λ-coupled systems.
pub struct PerturbedSystemBuilder<'a> {
    system: &'a MolecularSystem,
    table: &'a PerturbationTable,
    config: &'a RunConfig,
}

impl<'a> PerturbedSystemBuilder<'a> {
    pub fn new(
        system: &'a MolecularSystem,
        table: &'a PerturbationTable,
        config: &'a RunConfig,
    ) -> Self {
        Self {
            system,
            table,
            config,
        }
    }

    /// Builds the perturbed system and starting configuration of one window.
    ///
    /// # Arguments
    ///
    /// * `lambda` - The window's λ.
    /// * `neighbors` - λ of the previous and next windows, if any.
    /// * `uid` - Identifier given to the created configuration.
    ///
    /// # Errors
    ///
    /// Fails if the cutoff exceeds half the smallest box edge, the solute is missing,
    /// the perturbation does not match the solute, or (in strict mode) an equilibrium
    /// adjustment would break a ring.
    pub fn build(
        &self,
        lambda: f64,
        neighbors: (Option<f64>, Option<f64>),
        uid: u64,
    ) -> Result<BuildOutput, EngineError> {
        let nonbonded = self.config.nonbonded.clone();
        if let Some(half_box) = self.system.space().min_half_dimension() {
            if nonbonded.cutoff > half_box {
                return Err(EngineError::CutoffTooLarge {
                    cutoff: nonbonded.cutoff,
                    half_box,
                });
            }
        }

        let solute_name = self.config.solute_name.as_deref();
        let solute_id = self
            .system
            .find_solute(solute_name)
            .ok_or_else(|| EngineError::MissingSolute(solute_name.map(str::to_string)))?;
        let solute = self
            .system
            .molecule(solute_id)
            .ok_or_else(|| EngineError::Internal("solute id not in system".to_string()))?;

        let partitions = EndpointPartitioner::partition_states(solute, &self.table.atoms)?;

        let eq = &self.config.equilibrium;
        let adjuster = EquilibriumAdjuster::new(eq.bond_tolerance, eq.angle_tolerance);
        let mut positions = solute.template_positions();
        let adjustments = adjuster.apply(solute, &mut positions, &self.table.bonded, lambda)?;
        if let Some(skipped) = adjustments.skipped_ring_breaks().next() {
            if eq.strict {
                return Err(EngineError::RingBreakingAdjustment {
                    dof: skipped.label.clone(),
                });
            }
            warn!(
                lambda,
                skipped = adjustments.skipped_ring_breaks().count(),
                "Equilibrium adjustments skipped to keep rings intact."
            );
        }
        let mut configuration = Configuration::from_system(self.system, uid);
        configuration
            .replace_positions(solute_id, positions)
            .ok_or_else(|| EngineError::Internal("adjusted solute changed atom count".to_string()))?;

        let solvent = self
            .system
            .find_molecules(|m| m.category.is_solvent_like());
        let protein: Vec<_> = self
            .system
            .molecules_iter()
            .filter(|&(id, m)| id != solute_id && !m.category.is_solvent_like())
            .map(|(id, _)| id)
            .collect();
        if protein
            .iter()
            .any(|&id| self.system.molecule(id).is_some_and(|m| m.category == MoleculeCategory::Solute))
        {
            debug!("Additional solute-category molecules are treated as protein environment.");
        }

        let mut propagator =
            ConstraintPropagator::new(lambda, self.config.delta_lambda, neighbors);
        let terms = TermPlan {
            has_solvent: !solvent.is_empty(),
            has_protein: !protein.is_empty(),
            class_present: |class: AtomClass| !partitions.reference.indices(class).is_empty(),
        }
        .create(&mut propagator, self.config.leg);

        debug!(
            lambda,
            terms = terms.len(),
            softcore = propagator.bindings().len(),
            "Built perturbed system."
        );

        let endpoints = self
            .table
            .atoms
            .iter()
            .map(|r| (r.initial_params(), r.final_params()))
            .collect();

        let system = PerturbedSystem::from_parts(
            self.system.clone(),
            solute_id,
            solvent,
            protein,
            partitions,
            endpoints,
            terms,
            propagator,
            nonbonded,
        )?;

        Ok(BuildOutput {
            system,
            configuration,
            adjustments,
        })
    }
}

struct TermPlan<F: Fn(AtomClass) -> bool> {
    has_solvent: bool,
    has_protein: bool,
    class_present: F,
}

impl<F: Fn(AtomClass) -> bool> TermPlan<F> {
    fn create(
        &self,
        propagator: &mut ConstraintPropagator,
        leg: CouplingLeg,
    ) -> Vec<EnergyTerm> {
        let mut terms = Vec::new();
        let mut push = |terms: &mut Vec<EnergyTerm>, term: EnergyTerm, expr: Option<AlphaExpr>| {
            let handle = TermHandle(terms.len());
            if let (Some(expr), TermScope::State(state)) = (expr, term.scope) {
                propagator.register(handle, expr, state);
            }
            terms.push(term);
        };

        push(
            &mut terms,
            EnergyTerm::new(TermKind::Bonded, TermScope::Shared, TermGroups::SoluteBonded),
            None,
        );
        if self.has_solvent {
            push(
                &mut terms,
                EnergyTerm::new(TermKind::Hard, TermScope::Shared, TermGroups::SolventSolvent),
                None,
            );
        }
        if self.has_solvent && self.has_protein {
            push(
                &mut terms,
                EnergyTerm::new(TermKind::Hard, TermScope::Shared, TermGroups::ProteinSolvent),
                None,
            );
        }

        let environments: Vec<Environment> = [
            (self.has_solvent, Environment::Solvent),
            (self.has_protein, Environment::Protein),
        ]
        .into_iter()
        .filter_map(|(present, env)| present.then_some(env))
        .collect();

        for state in StateKind::ALL {
            let scope = TermScope::State(state);
            for class in AtomClass::ALL.into_iter().filter(|&c| (self.class_present)(c)) {
                push(
                    &mut terms,
                    EnergyTerm::new(TermKind::Hard, scope, TermGroups::SoluteWithin(class)),
                    None,
                );
            }
            for (a, b) in [
                (AtomClass::Hard, AtomClass::ToDummy),
                (AtomClass::Hard, AtomClass::FromDummy),
                (AtomClass::ToDummy, AtomClass::FromDummy),
            ] {
                if !(self.class_present)(a) || !(self.class_present)(b) {
                    continue;
                }
                push(
                    &mut terms,
                    EnergyTerm::new(TermKind::Softcore, scope, TermGroups::SoluteBetween(a, b)),
                    AlphaExpr::for_solute_pair(a, b, leg),
                );
            }
            for class in AtomClass::ALL.into_iter().filter(|&c| (self.class_present)(c)) {
                for &env in &environments {
                    let expr = AlphaExpr::for_environment(class, leg);
                    let kind = if expr.is_some() {
                        TermKind::Softcore
                    } else {
                        TermKind::Hard
                    };
                    push(
                        &mut terms,
                        EnergyTerm::new(kind, scope, TermGroups::SoluteEnvironment(class, env)),
                        expr,
                    );
                }
            }
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::space::Space;
    use crate::core::perturbation::equilibrium::AdjustOutcome;
    use crate::core::perturbation::table::{BondPerturbation, BondedPerturbations};
    use crate::engine::constraints::PropagatorState;
    use crate::engine::testing::{ligand_in_water, ligand_table, run_config};

    fn f64_approx_equal(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * (1.0 + a.abs().max(b.abs()))
    }

    #[test]
    fn build_creates_shared_and_per_state_terms() {
        let system = ligand_in_water(Space::Cartesian, 3);
        let table = ligand_table();
        let config = run_config(&[0.0, 0.5, 1.0]);
        let out = PerturbedSystemBuilder::new(&system, &table, &config)
            .build(0.5, (Some(0.0), Some(1.0)), 0)
            .unwrap();
        let names: Vec<&str> = out.system.terms().iter().map(|t| t.name.as_str()).collect();

        assert!(names.contains(&"shared:solute-bonded"));
        assert!(names.contains(&"shared:solvent-solvent"));
        assert!(!names.iter().any(|n| n.contains("protein")));
        for state in ["ref", "fwd", "bwd"] {
            for suffix in [
                "hard-hard",
                "todummy-todummy",
                "fromdummy-fromdummy",
                "hard-todummy",
                "hard-fromdummy",
                "todummy-fromdummy",
                "hard-solvent",
                "todummy-solvent",
                "fromdummy-solvent",
            ] {
                let name = format!("{state}:{suffix}");
                assert!(names.contains(&name.as_str()), "missing term {name}");
            }
        }
    }

    #[test]
    fn every_softcore_term_is_registered_before_build_returns() {
        let system = ligand_in_water(Space::Cartesian, 2);
        let table = ligand_table();
        let config = run_config(&[0.0, 1.0]);
        let out = PerturbedSystemBuilder::new(&system, &table, &config)
            .build(0.0, (None, Some(1.0)), 0)
            .unwrap();
        let propagator = out.system.propagator();
        assert_eq!(propagator.state(), PropagatorState::Clean);
        for (i, term) in out.system.terms().iter().enumerate() {
            let bound = propagator.binding(TermHandle(i)).is_some();
            assert_eq!(term.is_softcore(), bound, "term {} binding mismatch", term.name);
        }
    }

    #[test]
    fn reference_alphas_follow_window_lambda() {
        let system = ligand_in_water(Space::Cartesian, 1);
        let table = ligand_table();
        let config = run_config(&[0.0, 0.5, 1.0]);
        let builder = PerturbedSystemBuilder::new(&system, &table, &config);
        for (lambda, neighbors, expected_td, expected_mix) in [
            (0.0, (None, Some(0.5)), 0.0, 0.0),
            (0.5, (Some(0.0), Some(1.0)), 0.5, 0.5),
            (1.0, (Some(0.5), None), 1.0, 0.0),
        ] {
            let out = builder.build(lambda, neighbors, 0).unwrap();
            let find = |name: &str| {
                let i = out.system.terms().iter().position(|t| t.name == name).unwrap();
                out.system.propagator().alpha(TermHandle(i)).unwrap()
            };
            assert!(f64_approx_equal(find("ref:hard-todummy"), expected_td, 1e-12));
            assert!(f64_approx_equal(find("ref:todummy-fromdummy"), expected_mix, 1e-12));
        }
    }

    #[test]
    fn cutoff_larger_than_half_box_is_rejected() {
        let system = ligand_in_water(Space::periodic(15.0, 30.0, 30.0), 1);
        let table = ligand_table();
        let config = run_config(&[0.0, 1.0]);
        let err = PerturbedSystemBuilder::new(&system, &table, &config)
            .build(0.0, (None, Some(1.0)), 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::CutoffTooLarge { half_box, .. } if half_box == 7.5));
    }

    #[test]
    fn mismatched_perturbation_is_an_inconsistent_topology() {
        let system = ligand_in_water(Space::Cartesian, 1);
        let mut table = ligand_table();
        table.atoms.pop();
        let config = run_config(&[0.0, 1.0]);
        let err = PerturbedSystemBuilder::new(&system, &table, &config)
            .build(0.0, (None, Some(1.0)), 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::InconsistentTopology(_)));
    }

    #[test]
    fn missing_solute_is_reported_by_name() {
        let system = ligand_in_water(Space::Cartesian, 1);
        let table = ligand_table();
        let mut config = run_config(&[0.0, 1.0]);
        config.solute_name = Some("XYZ".to_string());
        let err = PerturbedSystemBuilder::new(&system, &table, &config)
            .build(0.0, (None, Some(1.0)), 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingSolute(Some(ref n)) if n == "XYZ"));
    }

    #[test]
    fn equilibrium_adjustment_moves_the_solute_in_the_configuration() {
        let system = ligand_in_water(Space::Cartesian, 1);
        let mut table = ligand_table();
        table.bonded = BondedPerturbations {
            bonds: vec![BondPerturbation {
                atom1: "C1".to_string(),
                atom2: "C2".to_string(),
                initial_length: 1.5,
                final_length: 2.5,
            }],
            angles: vec![],
        };
        let config = run_config(&[0.0, 1.0]);
        let out = PerturbedSystemBuilder::new(&system, &table, &config)
            .build(1.0, (Some(0.0), None), 0)
            .unwrap();
        assert!(matches!(out.adjustments.records[0].outcome, AdjustOutcome::Applied { .. }));
        let solute = out.system.solute_id();
        let pos = out.configuration.positions(solute).unwrap();
        assert!(f64_approx_equal((pos[1] - pos[0]).norm(), 2.5, 1e-9));
    }
}
