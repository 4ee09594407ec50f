use super::constraints::{ConstraintPropagator, LambdaValues};
use super::error::EngineError;
use crate::core::forcefield::bonded::bonded_energy;
use crate::core::forcefield::energy::{Exclusions, GroupView, PairEvaluator};
use crate::core::forcefield::params::NonbondedParams;
use crate::core::forcefield::term::{
    EnergyTerm, Environment, TermEnergy, TermGroups, TermHandle, TermScope,
};
use crate::core::models::atom::AtomParams;
use crate::core::models::configuration::Configuration;
use crate::core::models::ids::MoleculeId;
use crate::core::models::system::MolecularSystem;
use crate::core::models::topology::Connectivity;
use crate::core::perturbation::partition::{AtomClass, StateKind, StatePartitions};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Energies of one configuration in every state a window tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEnergies {
    pub lambdas: LambdaValues,
    pub reference: f64,
    pub forward: f64,
    pub backward: f64,
    /// Reference energy re-evaluated at the next window's λ.
    pub next: f64,
    /// Reference energy re-evaluated at the previous window's λ.
    pub prev: f64,
    /// Σ dE/dα · dα/dλ over the reference soft-core terms.
    pub softcore_dlambda: f64,
    /// Every term's energy, in term-handle order.
    pub components: Vec<(String, TermEnergy)>,
}

impl StateEnergies {
    pub fn forward_gradient(&self) -> Option<f64> {
        let step = self.lambdas.forward - self.lambdas.lambda;
        (step > 0.0).then(|| (self.forward - self.reference) / step)
    }

    pub fn backward_gradient(&self) -> Option<f64> {
        let step = self.lambdas.lambda - self.lambdas.backward;
        (step > 0.0).then(|| (self.reference - self.backward) / step)
    }

    /// Forward and backward gradients; a direction with a zero step borrows the other.
    pub fn ti_gradients(&self) -> (f64, f64) {
        let (fwd, bwd) = (self.forward_gradient(), self.backward_gradient());
        (
            fwd.or(bwd).unwrap_or(0.0),
            bwd.or(fwd).unwrap_or(0.0),
        )
    }

    /// Gradient toward the next window, or from the previous one at the top of the schedule.
    pub fn window_gradient(&self) -> Option<f64> {
        let l = &self.lambdas;
        if l.next > l.lambda {
            Some((self.next - self.reference) / (l.next - l.lambda))
        } else if l.prev < l.lambda {
            Some((self.reference - self.prev) / (l.lambda - l.prev))
        } else {
            None
        }
    }
}

/// The λ-coupled potential of one window.
///
/// Holds the static molecular description, the per-state solute partitions and the
/// energy terms created by the builder. Per-state solute parameters are re-interpolated
/// whenever the constraint propagator has to be cleaned, so evaluation always sees the
/// parameters and α values of the current λ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerturbedSystem {
    molecules: MolecularSystem,
    solute: MoleculeId,
    solvent: Vec<MoleculeId>,
    protein: Vec<MoleculeId>,
    connectivity: Connectivity,
    partitions: StatePartitions,
    /// Initial and final parameters of every solute atom.
    endpoints: Vec<(AtomParams, AtomParams)>,
    /// Solute parameters at the reference, forward and backward λ.
    state_params: [Vec<AtomParams>; 3],
    env_params: SecondaryMap<MoleculeId, Vec<AtomParams>>,
    terms: Vec<EnergyTerm>,
    propagator: ConstraintPropagator,
    nonbonded: NonbondedParams,
}

impl PerturbedSystem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        molecules: MolecularSystem,
        solute: MoleculeId,
        solvent: Vec<MoleculeId>,
        protein: Vec<MoleculeId>,
        partitions: StatePartitions,
        endpoints: Vec<(AtomParams, AtomParams)>,
        terms: Vec<EnergyTerm>,
        propagator: ConstraintPropagator,
        nonbonded: NonbondedParams,
    ) -> Result<Self, EngineError> {
        let solute_molecule = molecules
            .molecule(solute)
            .ok_or_else(|| EngineError::Internal("solute id not in system".to_string()))?;
        let connectivity = solute_molecule.connectivity();

        let mut env_params = SecondaryMap::new();
        for &id in solvent.iter().chain(&protein) {
            if let Some(m) = molecules.molecule(id) {
                env_params.insert(id, m.atoms().iter().map(|a| a.params()).collect());
            }
        }

        let mut system = Self {
            molecules,
            solute,
            solvent,
            protein,
            connectivity,
            partitions,
            endpoints,
            state_params: [Vec::new(), Vec::new(), Vec::new()],
            env_params,
            terms,
            propagator,
            nonbonded,
        };
        system.propagator.ensure_clean();
        system.refresh_params();
        Ok(system)
    }

    pub fn molecules(&self) -> &MolecularSystem {
        &self.molecules
    }

    pub fn solute_id(&self) -> MoleculeId {
        self.solute
    }

    /// Solvent molecules and ions, in system order.
    pub fn solvent_ids(&self) -> &[MoleculeId] {
        &self.solvent
    }

    pub fn protein_ids(&self) -> &[MoleculeId] {
        &self.protein
    }

    pub fn partitions(&self) -> &StatePartitions {
        &self.partitions
    }

    pub fn terms(&self) -> &[EnergyTerm] {
        &self.terms
    }

    pub fn term(&self, handle: TermHandle) -> Option<&EnergyTerm> {
        self.terms.get(handle.index())
    }

    pub fn propagator(&self) -> &ConstraintPropagator {
        &self.propagator
    }

    pub fn nonbonded(&self) -> &NonbondedParams {
        &self.nonbonded
    }

    pub fn lambda(&self) -> f64 {
        self.propagator.lambda()
    }

    /// The λ values implied by the current λ and neighbours.
    pub fn lambda_values(&self) -> LambdaValues {
        self.propagator.derived()
    }

    pub fn set_lambda(&mut self, lambda: f64) {
        self.propagator.set_lambda(lambda);
    }

    pub fn set_neighbors(&mut self, prev: Option<f64>, next: Option<f64>) {
        self.propagator.set_neighbors(prev, next);
    }

    /// Solute parameters of one state as of the last clean.
    pub fn state_params(&self, state: StateKind) -> &[AtomParams] {
        &self.state_params[state.index()]
    }

    /// Cleans the propagator and re-interpolates solute parameters if λ moved.
    pub fn sync(&mut self) {
        if self.propagator.ensure_clean() {
            self.refresh_params();
        }
    }

    fn refresh_params(&mut self) {
        let values = *self.propagator.values();
        for state in StateKind::ALL {
            self.state_params[state.index()] = self.params_at(values.for_state(state));
        }
    }

    fn params_at(&self, lambda: f64) -> Vec<AtomParams> {
        self.endpoints
            .iter()
            .map(|(initial, final_)| AtomParams::interpolate(initial, final_, lambda))
            .collect()
    }

    /// Evaluates every term and assembles the per-state totals.
    pub fn evaluate(&mut self, config: &Configuration) -> Result<StateEnergies, EngineError> {
        self.sync();
        let values = *self.propagator.values();

        let handles: Vec<TermHandle> = (0..self.terms.len()).map(TermHandle).collect();
        #[cfg(feature = "parallel")]
        let iter = handles.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = handles.iter();
        let energies = iter
            .map(|&handle| {
                let term = &self.terms[handle.index()];
                let alpha = self.propagator.alpha(handle).unwrap_or(0.0);
                let params = self.term_params(term);
                self.term_energy(term, params, alpha, config)
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let mut totals = [0.0; 3];
        let mut shared = 0.0;
        let mut softcore_dlambda = 0.0;
        for (handle, (term, energy)) in self.terms.iter().zip(&energies).enumerate() {
            match term.scope {
                TermScope::Shared => shared += energy.total(),
                TermScope::State(state) => totals[state.index()] += energy.total(),
            }
            if term.scope != TermScope::State(StateKind::Reference) {
                continue;
            }
            if let Some(binding) = self.propagator.binding(TermHandle(handle)) {
                softcore_dlambda += energy.d_alpha * binding.expr.derivative(values.lambda);
            }
        }

        let reference = shared + totals[StateKind::Reference.index()];
        let next = if values.next == values.lambda {
            reference
        } else {
            shared + self.reference_terms_at(config, values.next)?
        };
        let prev = if values.prev == values.lambda {
            reference
        } else {
            shared + self.reference_terms_at(config, values.prev)?
        };

        Ok(StateEnergies {
            lambdas: values,
            reference,
            forward: shared + totals[StateKind::Forward.index()],
            backward: shared + totals[StateKind::Backward.index()],
            next,
            prev,
            softcore_dlambda,
            components: self
                .terms
                .iter()
                .zip(energies)
                .map(|(t, e)| (t.name.clone(), e))
                .collect(),
        })
    }

    /// Total reference-state energy of a configuration.
    pub fn reference_energy(&mut self, config: &Configuration) -> Result<f64, EngineError> {
        self.sync();
        let mut total = 0.0;
        for (index, term) in self.terms.iter().enumerate() {
            if !term.contributes_to(StateKind::Reference) {
                continue;
            }
            let alpha = self.propagator.alpha(TermHandle(index)).unwrap_or(0.0);
            total += self
                .term_energy(term, self.term_params(term), alpha, config)?
                .total();
        }
        Ok(total)
    }

    /// Reference-state energy as if the window sat at `lambda`. The window itself is
    /// not modified.
    pub fn energy_at(&self, config: &Configuration, lambda: f64) -> Result<f64, EngineError> {
        let mut shared = 0.0;
        for term in self.terms.iter().filter(|t| t.scope == TermScope::Shared) {
            shared += self
                .term_energy(term, &self.state_params[0], 0.0, config)?
                .total();
        }
        Ok(shared + self.reference_terms_at(config, lambda)?)
    }

    fn reference_terms_at(&self, config: &Configuration, lambda: f64) -> Result<f64, EngineError> {
        let params = self.params_at(lambda);
        let alphas = self.propagator.alphas_at(lambda);
        let mut total = 0.0;
        for (index, term) in self.terms.iter().enumerate() {
            if term.scope != TermScope::State(StateKind::Reference) {
                continue;
            }
            let alpha = alphas
                .iter()
                .find(|(h, _)| h.index() == index)
                .map_or(0.0, |&(_, a)| a);
            total += self.term_energy(term, &params, alpha, config)?.total();
        }
        Ok(total)
    }

    /// Reference-state interaction energy between the solute and one environment molecule.
    pub fn solute_interaction(
        &mut self,
        config: &Configuration,
        id: MoleculeId,
    ) -> Result<f64, EngineError> {
        self.sync();
        let env = self.environment_of(id).ok_or_else(|| {
            EngineError::Internal("molecule is not part of the solute environment".to_string())
        })?;
        let evaluator = PairEvaluator::new(self.molecules.space(), &self.nonbonded);
        let solute_pos = self.positions(config, self.solute)?;
        let pos = self.positions(config, id)?;
        let params = self.env_params_of(id)?;
        let partition = self.partitions.get(StateKind::Reference);
        let solute_params = &self.state_params[0];

        let mut total = 0.0;
        for (index, term) in self.terms.iter().enumerate() {
            let TermGroups::SoluteEnvironment(class, term_env) = term.groups else {
                continue;
            };
            if term.scope != TermScope::State(StateKind::Reference) || term_env != env {
                continue;
            }
            let alpha = self.propagator.alpha(TermHandle(index)).unwrap_or(0.0);
            let solute = GroupView::subset(solute_pos, solute_params, partition.indices(class));
            let e = evaluator.between(&solute, &GroupView::all(pos, params), alpha, None);
            total += checked(e.into(), &term.name)?.total();
        }
        Ok(total)
    }

    /// Reference-state energy of every interaction that involves molecule `id`.
    ///
    /// Under a rigid-body move of `id` this changes exactly as the total energy does.
    pub fn molecule_interaction(
        &mut self,
        config: &Configuration,
        id: MoleculeId,
    ) -> Result<f64, EngineError> {
        self.sync();
        if id == self.solute {
            let mut total = 0.0;
            for (index, term) in self.terms.iter().enumerate() {
                if term.scope == TermScope::State(StateKind::Reference)
                    && matches!(term.groups, TermGroups::SoluteEnvironment(..))
                {
                    let alpha = self.propagator.alpha(TermHandle(index)).unwrap_or(0.0);
                    total += self
                        .term_energy(term, &self.state_params[0], alpha, config)?
                        .total();
                }
            }
            return Ok(total);
        }

        let mut total = self.solute_interaction(config, id)?;
        let evaluator = PairEvaluator::new(self.molecules.space(), &self.nonbonded);
        let this = GroupView::all(self.positions(config, id)?, self.env_params_of(id)?);
        let partners: Vec<MoleculeId> = match self.environment_of(id) {
            Some(Environment::Solvent) => self
                .solvent
                .iter()
                .chain(&self.protein)
                .copied()
                .filter(|&other| other != id)
                .collect(),
            Some(Environment::Protein) => self.solvent.clone(),
            None => Vec::new(),
        };
        for other in partners {
            let view = GroupView::all(self.positions(config, other)?, self.env_params_of(other)?);
            let e = evaluator.between(&this, &view, 0.0, None);
            total += checked(e.into(), "environment")?.total();
        }
        Ok(total)
    }

    fn environment_of(&self, id: MoleculeId) -> Option<Environment> {
        if self.solvent.contains(&id) {
            Some(Environment::Solvent)
        } else if self.protein.contains(&id) {
            Some(Environment::Protein)
        } else {
            None
        }
    }

    fn term_params(&self, term: &EnergyTerm) -> &[AtomParams] {
        match term.scope {
            TermScope::Shared => &self.state_params[0],
            TermScope::State(state) => &self.state_params[state.index()],
        }
    }

    fn positions<'c>(
        &self,
        config: &'c Configuration,
        id: MoleculeId,
    ) -> Result<&'c [Point3<f64>], EngineError> {
        config.positions(id).ok_or_else(|| {
            EngineError::Internal("configuration is missing coordinates for a molecule".to_string())
        })
    }

    fn env_params_of(&self, id: MoleculeId) -> Result<&[AtomParams], EngineError> {
        self.env_params
            .get(id)
            .map(|v| v.as_slice())
            .ok_or_else(|| EngineError::Internal("no parameters for environment molecule".to_string()))
    }

    fn term_energy(
        &self,
        term: &EnergyTerm,
        solute_params: &[AtomParams],
        alpha: f64,
        config: &Configuration,
    ) -> Result<TermEnergy, EngineError> {
        let evaluator = PairEvaluator::new(self.molecules.space(), &self.nonbonded);
        let solute_pos = self.positions(config, self.solute)?;
        let partition = match term.scope {
            TermScope::Shared => self.partitions.get(StateKind::Reference),
            TermScope::State(state) => self.partitions.get(state),
        };
        let exclusions = Exclusions {
            connectivity: &self.connectivity,
            scale14: self.nonbonded.scale14,
        };
        let class_view =
            |class: AtomClass| GroupView::subset(solute_pos, solute_params, partition.indices(class));

        let energy: TermEnergy = match term.groups {
            TermGroups::SoluteBonded => {
                let solute = self.molecules.molecule(self.solute).ok_or_else(|| {
                    EngineError::Internal("solute id not in system".to_string())
                })?;
                bonded_energy(solute_pos, solute.bonds(), solute.angles()).into()
            }
            TermGroups::SoluteWithin(class) => evaluator
                .within(&class_view(class), 0.0, Some(&exclusions))
                .into(),
            TermGroups::SoluteBetween(a, b) => evaluator
                .between(&class_view(a), &class_view(b), alpha, Some(&exclusions))
                .into(),
            TermGroups::SoluteEnvironment(class, env) => {
                let group = class_view(class);
                let ids = match env {
                    Environment::Solvent => &self.solvent,
                    Environment::Protein => &self.protein,
                };
                let mut total = TermEnergy::default();
                for &id in ids {
                    let view = GroupView::all(self.positions(config, id)?, self.env_params_of(id)?);
                    total += TermEnergy::from(evaluator.between(&group, &view, alpha, None));
                }
                total
            }
            TermGroups::SolventSolvent => {
                let mut total = TermEnergy::default();
                for (k, &a) in self.solvent.iter().enumerate() {
                    let va = GroupView::all(self.positions(config, a)?, self.env_params_of(a)?);
                    for &b in &self.solvent[k + 1..] {
                        let vb = GroupView::all(self.positions(config, b)?, self.env_params_of(b)?);
                        total += TermEnergy::from(evaluator.between(&va, &vb, 0.0, None));
                    }
                }
                total
            }
            TermGroups::ProteinSolvent => {
                let mut total = TermEnergy::default();
                for &p in &self.protein {
                    let vp = GroupView::all(self.positions(config, p)?, self.env_params_of(p)?);
                    for &s in &self.solvent {
                        let vs = GroupView::all(self.positions(config, s)?, self.env_params_of(s)?);
                        total += TermEnergy::from(evaluator.between(&vp, &vs, 0.0, None));
                    }
                }
                total
            }
        };

        checked(energy, &term.name)
    }
}

fn checked(energy: TermEnergy, term: &str) -> Result<TermEnergy, EngineError> {
    if energy.is_finite() {
        Ok(energy)
    } else {
        Err(EngineError::NumericOverflow {
            window: None,
            term: term.to_string(),
        })
    }
}
