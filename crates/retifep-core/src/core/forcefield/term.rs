use super::bonded::BondedEnergy;
use super::softcore::PairEnergy;
use crate::core::perturbation::partition::{AtomClass, StateKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Typed reference to an energy term of one perturbed system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermHandle(pub(crate) usize);

impl TermHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    /// Intramolecular bonds and angles.
    Bonded,
    /// Ordinary pairwise non-bonded interaction (soft-core model at α = 0).
    Hard,
    /// Pairwise non-bonded interaction with an α bound to λ.
    Softcore,
}

/// The environment groups a solute class can interact with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    /// Solvent molecules and ions.
    Solvent,
    Protein,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Solvent => write!(f, "solvent"),
            Environment::Protein => write!(f, "protein"),
        }
    }
}

/// The atom groups an energy term acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermGroups {
    SoluteBonded,
    SoluteWithin(AtomClass),
    SoluteBetween(AtomClass, AtomClass),
    SoluteEnvironment(AtomClass, Environment),
    SolventSolvent,
    ProteinSolvent,
}

impl fmt::Display for TermGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermGroups::SoluteBonded => write!(f, "solute-bonded"),
            TermGroups::SoluteWithin(c) => write!(f, "{c}-{c}"),
            TermGroups::SoluteBetween(a, b) => write!(f, "{a}-{b}"),
            TermGroups::SoluteEnvironment(c, env) => write!(f, "{c}-{env}"),
            TermGroups::SolventSolvent => write!(f, "solvent-solvent"),
            TermGroups::ProteinSolvent => write!(f, "protein-solvent"),
        }
    }
}

/// Which totals a term contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermScope {
    /// λ-independent; contributes equally to the reference and both shadow totals.
    Shared,
    /// Belongs to one state's total only.
    State(StateKind),
}

impl fmt::Display for TermScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermScope::Shared => write!(f, "shared"),
            TermScope::State(state) => write!(f, "{state}"),
        }
    }
}

/// A named, composable unit of potential energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyTerm {
    pub name: String,
    pub kind: TermKind,
    pub scope: TermScope,
    pub groups: TermGroups,
}

impl EnergyTerm {
    pub fn new(kind: TermKind, scope: TermScope, groups: TermGroups) -> Self {
        Self {
            name: format!("{scope}:{groups}"),
            kind,
            scope,
            groups,
        }
    }

    pub fn is_softcore(&self) -> bool {
        self.kind == TermKind::Softcore
    }

    pub fn contributes_to(&self, state: StateKind) -> bool {
        match self.scope {
            TermScope::Shared => true,
            TermScope::State(s) => s == state,
        }
    }
}

/// Energy of one term (or a sum of terms), split by component.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TermEnergy {
    pub coulomb: f64,
    pub lj: f64,
    pub bonded: f64,
    /// Derivative with respect to the term's own α.
    pub d_alpha: f64,
}

impl TermEnergy {
    #[inline]
    pub fn total(&self) -> f64 {
        self.coulomb + self.lj + self.bonded
    }

    pub fn is_finite(&self) -> bool {
        self.coulomb.is_finite()
            && self.lj.is_finite()
            && self.bonded.is_finite()
            && self.d_alpha.is_finite()
    }
}

impl From<PairEnergy> for TermEnergy {
    fn from(e: PairEnergy) -> Self {
        Self {
            coulomb: e.coulomb,
            lj: e.lj,
            bonded: 0.0,
            d_alpha: e.d_alpha(),
        }
    }
}

impl From<BondedEnergy> for TermEnergy {
    fn from(e: BondedEnergy) -> Self {
        Self {
            bonded: e.total(),
            ..Self::default()
        }
    }
}

impl Add for TermEnergy {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            coulomb: self.coulomb + rhs.coulomb,
            lj: self.lj + rhs.lj,
            bonded: self.bonded + rhs.bonded,
            d_alpha: self.d_alpha + rhs.d_alpha,
        }
    }
}

impl AddAssign for TermEnergy {
    fn add_assign(&mut self, rhs: Self) {
        self.coulomb += rhs.coulomb;
        self.lj += rhs.lj;
        self.bonded += rhs.bonded;
        self.d_alpha += rhs.d_alpha;
    }
}

impl Sum for TermEnergy {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, e| acc + e)
    }
}
