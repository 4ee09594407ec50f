use super::params::{CombiningRule, NonbondedParams, Scale14};
use super::potentials::SwitchingFunction;
use super::softcore::{PairEnergy, SoftcoreModel};
use crate::core::models::atom::AtomParams;
use crate::core::models::space::Space;
use crate::core::models::topology::{Connectivity, PairRelation};
use nalgebra::Point3;

#[derive(Debug, Clone, Copy)]
enum Selection<'a> {
    All,
    Subset(&'a [usize]),
}

/// A read-only view of a group of atoms: their current positions, their parameters at
/// the evaluated λ, and the subset of molecule-local indices that belong to the group.
#[derive(Debug, Clone, Copy)]
pub struct GroupView<'a> {
    positions: &'a [Point3<f64>],
    params: &'a [AtomParams],
    selection: Selection<'a>,
}

impl<'a> GroupView<'a> {
    pub fn all(positions: &'a [Point3<f64>], params: &'a [AtomParams]) -> Self {
        Self {
            positions,
            params,
            selection: Selection::All,
        }
    }

    pub fn subset(
        positions: &'a [Point3<f64>],
        params: &'a [AtomParams],
        indices: &'a [usize],
    ) -> Self {
        Self {
            positions,
            params,
            selection: Selection::Subset(indices),
        }
    }

    fn indices(&self) -> Vec<usize> {
        let n = self.positions.len().min(self.params.len());
        match self.selection {
            Selection::All => (0..n).collect(),
            Selection::Subset(indices) => indices.iter().copied().filter(|&i| i < n).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self.selection {
            Selection::All => self.positions.is_empty(),
            Selection::Subset(indices) => indices.is_empty(),
        }
    }
}

/// Intramolecular exclusion policy for groups that belong to the same molecule.
#[derive(Debug, Clone, Copy)]
pub struct Exclusions<'a> {
    pub connectivity: &'a Connectivity,
    pub scale14: Scale14,
}

impl Exclusions<'_> {
    #[inline]
    fn factors(&self, i: usize, j: usize) -> Option<(f64, f64)> {
        match self.connectivity.pair_relation(i, j) {
            PairRelation::Excluded => None,
            PairRelation::OneFour => Some((self.scale14.coulomb, self.scale14.lj)),
            PairRelation::Normal => Some((1.0, 1.0)),
        }
    }
}

/// Sums switched soft-core pair energies between or within atom groups.
#[derive(Debug, Clone, Copy)]
pub struct PairEvaluator<'a> {
    space: &'a Space,
    switching: SwitchingFunction,
    model: SoftcoreModel,
    rule: CombiningRule,
}

impl<'a> PairEvaluator<'a> {
    pub fn new(space: &'a Space, params: &NonbondedParams) -> Self {
        Self {
            space,
            switching: SwitchingFunction::new(params.cutoff, params.feather),
            model: SoftcoreModel::new(&params.softcore, params.dielectric),
            rule: params.combining_rule,
        }
    }

    #[inline]
    fn pair(
        &self,
        pos_a: &Point3<f64>,
        par_a: &AtomParams,
        pos_b: &Point3<f64>,
        par_b: &AtomParams,
        alpha: f64,
    ) -> Option<PairEnergy> {
        if par_a.is_null() || par_b.is_null() {
            return None;
        }
        let r2 = self.space.distance_squared(pos_a, pos_b);
        if r2 >= self.switching.cutoff2() {
            return None;
        }
        let s = self.switching.value(r2);
        let (sigma, epsilon) = self.rule.combine(par_a, par_b);
        let qq = par_a.charge * par_b.charge;
        Some(self.model.pair(r2, qq, sigma, epsilon, alpha).scaled(s, s))
    }

    /// Energy between two disjoint groups.
    ///
    /// When `exclusions` is given, both groups index into the same molecule and bonded
    /// pairs are excluded or scaled accordingly.
    pub fn between(
        &self,
        a: &GroupView,
        b: &GroupView,
        alpha: f64,
        exclusions: Option<&Exclusions>,
    ) -> PairEnergy {
        let mut total = PairEnergy::default();
        let (ia, ib) = (a.indices(), b.indices());
        for &i in &ia {
            for &j in &ib {
                let factors = match exclusions {
                    Some(ex) => match ex.factors(i, j) {
                        Some(f) => f,
                        None => continue,
                    },
                    None => (1.0, 1.0),
                };
                if let Some(e) = self.pair(
                    &a.positions[i],
                    &a.params[i],
                    &b.positions[j],
                    &b.params[j],
                    alpha,
                ) {
                    total += e.scaled(factors.0, factors.1);
                }
            }
        }
        total
    }

    /// Energy of all unique pairs within one group.
    pub fn within(
        &self,
        group: &GroupView,
        alpha: f64,
        exclusions: Option<&Exclusions>,
    ) -> PairEnergy {
        let mut total = PairEnergy::default();
        let indices = group.indices();
        for (k, &i) in indices.iter().enumerate() {
            for &j in &indices[k + 1..] {
                let factors = match exclusions {
                    Some(ex) => match ex.factors(i, j) {
                        Some(f) => f,
                        None => continue,
                    },
                    None => (1.0, 1.0),
                };
                if let Some(e) = self.pair(
                    &group.positions[i],
                    &group.params[i],
                    &group.positions[j],
                    &group.params[j],
                    alpha,
                ) {
                    total += e.scaled(factors.0, factors.1);
                }
            }
        }
        total
    }
}
