pub(crate) const COULOMB_CONSTANT: f64 = 332.0637; // In kcal·Å/(mol·e²)

/// Coulomb energy of a charge product `qq` at an effective squared distance `r2`.
#[inline]
pub fn coulomb(r2: f64, qq: f64, dielectric: f64) -> f64 {
    COULOMB_CONSTANT * qq / (dielectric * r2.sqrt())
}

/// Lennard-Jones 12-6 energy at an effective squared distance `r2`.
#[inline]
pub fn lennard_jones_12_6(r2: f64, sigma: f64, epsilon: f64) -> f64 {
    let sr6 = (sigma * sigma / r2).powi(3);
    4.0 * epsilon * (sr6 * sr6 - sr6)
}

/// Derivative of [`lennard_jones_12_6`] with respect to its `r2` argument.
#[inline]
pub fn lennard_jones_12_6_dr2(r2: f64, sigma: f64, epsilon: f64) -> f64 {
    let sr6 = (sigma * sigma / r2).powi(3);
    -12.0 * epsilon * sr6 * (2.0 * sr6 - 1.0) / r2
}

/// CHARMM-style switching function that smoothly takes interactions to zero between
/// `cutoff - feather` and `cutoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchingFunction {
    cutoff2: f64,
    switch_on2: f64,
    norm: f64,
}

impl SwitchingFunction {
    pub fn new(cutoff: f64, feather: f64) -> Self {
        let cutoff2 = cutoff * cutoff;
        let switch_on = (cutoff - feather).max(0.0);
        let switch_on2 = switch_on * switch_on;
        let width = cutoff2 - switch_on2;
        Self {
            cutoff2,
            switch_on2,
            norm: if width > 0.0 { 1.0 / width.powi(3) } else { 0.0 },
        }
    }

    #[inline]
    pub fn cutoff2(&self) -> f64 {
        self.cutoff2
    }

    #[inline]
    pub fn value(&self, r2: f64) -> f64 {
        if r2 >= self.cutoff2 {
            0.0
        } else if r2 <= self.switch_on2 {
            1.0
        } else {
            let outer = self.cutoff2 - r2;
            outer * outer * (self.cutoff2 + 2.0 * r2 - 3.0 * self.switch_on2) * self.norm
        }
    }
}
