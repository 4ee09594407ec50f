use super::config::CouplingLeg;
use crate::core::forcefield::term::TermHandle;
use crate::core::perturbation::partition::{AtomClass, StateKind};
use serde::{Deserialize, Serialize};

/// The five λ values a window evaluates simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LambdaValues {
    pub lambda: f64,
    /// `min(λ + Δλ, 1)`
    pub forward: f64,
    /// `max(λ - Δλ, 0)`
    pub backward: f64,
    /// λ of the next window, or λ itself at the upper end of the schedule.
    pub next: f64,
    /// λ of the previous window, or λ itself at the lower end of the schedule.
    pub prev: f64,
}

impl LambdaValues {
    pub fn derive(lambda: f64, delta_lambda: f64, neighbors: (Option<f64>, Option<f64>)) -> Self {
        let (prev, next) = neighbors;
        Self {
            lambda,
            forward: (lambda + delta_lambda).min(1.0),
            backward: (lambda - delta_lambda).max(0.0),
            next: next.unwrap_or(lambda),
            prev: prev.unwrap_or(lambda),
        }
    }

    pub fn for_state(&self, state: StateKind) -> f64 {
        match state {
            StateKind::Reference => self.lambda,
            StateKind::Forward => self.forward,
            StateKind::Backward => self.backward,
        }
    }
}

/// Closed set of soft-core coupling expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlphaExpr {
    Lambda,
    OneMinusLambda,
    /// `min(λ, 1 - λ)`: soft at the midpoint, hard at both ends.
    MinLambdaOneMinus,
}

impl AlphaExpr {
    #[inline]
    pub fn evaluate(self, lambda: f64) -> f64 {
        let alpha = match self {
            AlphaExpr::Lambda => lambda,
            AlphaExpr::OneMinusLambda => 1.0 - lambda,
            AlphaExpr::MinLambdaOneMinus => lambda.min(1.0 - lambda),
        };
        alpha.clamp(0.0, 1.0)
    }

    /// dα/dλ. The kink of `min(λ, 1 - λ)` at λ = 0.5 has derivative 0.
    #[inline]
    pub fn derivative(self, lambda: f64) -> f64 {
        match self {
            AlphaExpr::Lambda => 1.0,
            AlphaExpr::OneMinusLambda => -1.0,
            AlphaExpr::MinLambdaOneMinus => {
                if lambda < 0.5 {
                    1.0
                } else if lambda > 0.5 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn oriented(self, leg: CouplingLeg) -> Self {
        match (leg, self) {
            (CouplingLeg::Initial, expr) => expr,
            (CouplingLeg::Final, AlphaExpr::Lambda) => AlphaExpr::OneMinusLambda,
            (CouplingLeg::Final, AlphaExpr::OneMinusLambda) => AlphaExpr::Lambda,
            (CouplingLeg::Final, AlphaExpr::MinLambdaOneMinus) => AlphaExpr::MinLambdaOneMinus,
        }
    }

    /// α for an interaction between two solute classes; `None` means an ordinary term.
    pub fn for_solute_pair(a: AtomClass, b: AtomClass, leg: CouplingLeg) -> Option<Self> {
        use AtomClass::*;
        let expr = match (a.min(b), a.max(b)) {
            (Hard, ToDummy) => AlphaExpr::Lambda,
            (Hard, FromDummy) => AlphaExpr::OneMinusLambda,
            (ToDummy, FromDummy) => AlphaExpr::MinLambdaOneMinus,
            _ => return None,
        };
        Some(expr.oriented(leg))
    }

    /// α for a solute class interacting with solvent or protein.
    pub fn for_environment(class: AtomClass, leg: CouplingLeg) -> Option<Self> {
        let expr = match class {
            AtomClass::Hard => return None,
            AtomClass::ToDummy => AlphaExpr::Lambda,
            AtomClass::FromDummy => AlphaExpr::OneMinusLambda,
        };
        Some(expr.oriented(leg))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlphaBinding {
    pub handle: TermHandle,
    pub expr: AlphaExpr,
    /// The state whose λ drives this binding.
    pub state: StateKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagatorState {
    Dirty,
    Clean,
}

/// Keeps every derived λ value and every soft-core α consistent with the window's λ.
///
/// Any change to λ or to the schedule neighbours marks the propagator dirty. Cleaning
/// re-derives the shadow and neighbour λ values and re-evaluates all α bindings; it is
/// idempotent and cheap when already clean. While dirty, α values are not readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintPropagator {
    lambda: f64,
    delta_lambda: f64,
    neighbors: (Option<f64>, Option<f64>),
    values: LambdaValues,
    bindings: Vec<AlphaBinding>,
    alphas: Vec<f64>,
    state: PropagatorState,
}

impl ConstraintPropagator {
    pub fn new(lambda: f64, delta_lambda: f64, neighbors: (Option<f64>, Option<f64>)) -> Self {
        Self {
            lambda,
            delta_lambda,
            neighbors,
            values: LambdaValues::derive(lambda, delta_lambda, neighbors),
            bindings: Vec::new(),
            alphas: Vec::new(),
            state: PropagatorState::Dirty,
        }
    }

    /// Binds a soft-core term's α to an expression of one state's λ.
    ///
    /// Re-registering a handle replaces its binding.
    pub fn register(&mut self, handle: TermHandle, expr: AlphaExpr, state: StateKind) {
        let binding = AlphaBinding {
            handle,
            expr,
            state,
        };
        match self.position(handle) {
            Some(i) => self.bindings[i] = binding,
            None => {
                self.bindings.push(binding);
                self.alphas.push(0.0);
            }
        }
        self.state = PropagatorState::Dirty;
    }

    pub fn set_lambda(&mut self, lambda: f64) {
        self.lambda = lambda;
        self.state = PropagatorState::Dirty;
    }

    pub fn set_neighbors(&mut self, prev: Option<f64>, next: Option<f64>) {
        self.neighbors = (prev, next);
        self.state = PropagatorState::Dirty;
    }

    pub fn state(&self) -> PropagatorState {
        self.state
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn delta_lambda(&self) -> f64 {
        self.delta_lambda
    }

    /// Brings every derived value up to date. Returns `true` if anything was recomputed.
    pub fn ensure_clean(&mut self) -> bool {
        if self.state == PropagatorState::Clean {
            return false;
        }
        self.values = LambdaValues::derive(self.lambda, self.delta_lambda, self.neighbors);
        for (alpha, binding) in self.alphas.iter_mut().zip(&self.bindings) {
            *alpha = binding.expr.evaluate(self.values.for_state(binding.state));
        }
        self.state = PropagatorState::Clean;
        true
    }

    /// The λ values as of the last clean.
    pub fn values(&self) -> &LambdaValues {
        &self.values
    }

    /// The λ values implied by the current λ, whether or not the propagator is clean.
    pub fn derived(&self) -> LambdaValues {
        LambdaValues::derive(self.lambda, self.delta_lambda, self.neighbors)
    }

    /// The current α of a soft-core term, or `None` if the term is unbound or the
    /// propagator is dirty.
    pub fn alpha(&self, handle: TermHandle) -> Option<f64> {
        if self.state == PropagatorState::Dirty {
            return None;
        }
        self.position(handle).map(|i| self.alphas[i])
    }

    pub fn binding(&self, handle: TermHandle) -> Option<&AlphaBinding> {
        self.position(handle).map(|i| &self.bindings[i])
    }

    pub fn bindings(&self) -> &[AlphaBinding] {
        &self.bindings
    }

    /// The α of every reference-state binding as if the window sat at `lambda`.
    ///
    /// Pure: the propagator itself is left untouched.
    pub fn alphas_at(&self, lambda: f64) -> Vec<(TermHandle, f64)> {
        self.bindings
            .iter()
            .filter(|b| b.state == StateKind::Reference)
            .map(|b| (b.handle, b.expr.evaluate(lambda)))
            .collect()
    }

    fn position(&self, handle: TermHandle) -> Option<usize> {
        self.bindings.iter().position(|b| b.handle == handle)
    }
}
