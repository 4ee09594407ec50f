use super::params::SoftcoreParams;
use super::potentials::{coulomb, lennard_jones_12_6, lennard_jones_12_6_dr2};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Coulomb and Lennard-Jones energy of a pair (or a sum of pairs) together with the
/// derivative of each with respect to the soft-core coupling parameter α.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PairEnergy {
    pub coulomb: f64,
    pub lj: f64,
    pub d_coulomb: f64,
    pub d_lj: f64,
}

impl PairEnergy {
    #[inline]
    pub fn total(&self) -> f64 {
        self.coulomb + self.lj
    }

    #[inline]
    pub fn d_alpha(&self) -> f64 {
        self.d_coulomb + self.d_lj
    }

    #[inline]
    pub fn scaled(self, coulomb: f64, lj: f64) -> Self {
        Self {
            coulomb: self.coulomb * coulomb,
            lj: self.lj * lj,
            d_coulomb: self.d_coulomb * coulomb,
            d_lj: self.d_lj * lj,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.coulomb.is_finite()
            && self.lj.is_finite()
            && self.d_coulomb.is_finite()
            && self.d_lj.is_finite()
    }
}

impl Add for PairEnergy {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            coulomb: self.coulomb + rhs.coulomb,
            lj: self.lj + rhs.lj,
            d_coulomb: self.d_coulomb + rhs.d_coulomb,
            d_lj: self.d_lj + rhs.d_lj,
        }
    }
}

impl AddAssign for PairEnergy {
    fn add_assign(&mut self, rhs: Self) {
        self.coulomb += rhs.coulomb;
        self.lj += rhs.lj;
        self.d_coulomb += rhs.d_coulomb;
        self.d_lj += rhs.d_lj;
    }
}

impl Sum for PairEnergy {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, e| acc + e)
    }
}

/// The soft-core pair potential.
///
/// For a coupling parameter α ∈ [0, 1], shift δ and Coulomb power p:
///
/// - Coulomb: `(1 - α)^p · k·qᵢqⱼ / (ε_r · sqrt(r² + α·δ))`
/// - Lennard-Jones: `4ε [σ¹²/u⁶ - σ⁶/u³]` with `u = r² + α·δ·σ`
///
/// At α = 0 both reduce exactly to the ordinary hard-core kernels. For α > 0 and δ > 0
/// the effective distance never reaches zero, so the energy stays finite even for
/// coincident atoms. The same model serves hard terms (with α fixed at 0) and every
/// term that touches a dummy atom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftcoreModel {
    coulomb_power: i32,
    shift_delta: f64,
    dielectric: f64,
}

impl SoftcoreModel {
    pub fn new(params: &SoftcoreParams, dielectric: f64) -> Self {
        Self {
            coulomb_power: params.coulomb_power as i32,
            shift_delta: params.shift_delta,
            dielectric,
        }
    }

    /// Evaluates one pair at squared distance `r2`.
    ///
    /// # Arguments
    ///
    /// * `r2` - Squared minimum-image distance in Å².
    /// * `qq` - Product of the two partial charges.
    /// * `sigma` - Combined Lennard-Jones σ.
    /// * `epsilon` - Combined Lennard-Jones ε.
    /// * `alpha` - The soft-core coupling parameter.
    ///
    /// # Return
    ///
    /// The pair energy and its analytic α derivative. Pairs with no charge product or
    /// no well depth contribute exactly zero to the respective component.
    #[inline]
    pub fn pair(&self, r2: f64, qq: f64, sigma: f64, epsilon: f64, alpha: f64) -> PairEnergy {
        let mut energy = PairEnergy::default();

        if qq != 0.0 {
            let s2 = r2 + alpha * self.shift_delta;
            let bare = coulomb(s2, qq, self.dielectric);
            let one_minus = 1.0 - alpha;
            let prefactor = one_minus.powi(self.coulomb_power);
            let d_prefactor = if self.coulomb_power == 0 {
                0.0
            } else {
                -(self.coulomb_power as f64) * one_minus.powi(self.coulomb_power - 1)
            };
            let d_bare = -0.5 * bare * self.shift_delta / s2;
            energy.coulomb = prefactor * bare;
            energy.d_coulomb = d_prefactor * bare + prefactor * d_bare;
        }

        if epsilon != 0.0 && sigma > 0.0 {
            let shift = self.shift_delta * sigma;
            let u = r2 + alpha * shift;
            energy.lj = lennard_jones_12_6(u, sigma, epsilon);
            energy.d_lj = lennard_jones_12_6_dr2(u, sigma, epsilon) * shift;
        }

        energy
    }
}
