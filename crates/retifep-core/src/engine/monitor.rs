use super::system::StateEnergies;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Streaming mean and variance (Welford).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunningAverage {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningAverage {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance; needs at least two values.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    pub fn std_error(&self) -> Option<f64> {
        self.variance().map(|v| (v / self.count as f64).sqrt())
    }
}

/// Exponential (Zwanzig) average `-kT ln <exp(-βΔE)>`, kept in log-sum-exp form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpAverage {
    beta: f64,
    count: u64,
    /// Largest exponent seen so far; unset until the first sample.
    shift: Option<f64>,
    /// Σ exp(x - shift)
    scaled_sum: f64,
}

impl ExpAverage {
    pub fn new(beta: f64) -> Self {
        Self {
            beta,
            count: 0,
            shift: None,
            scaled_sum: 0.0,
        }
    }

    pub fn push(&mut self, delta_energy: f64) {
        let x = -self.beta * delta_energy;
        self.count += 1;
        match self.shift {
            None => {
                self.shift = Some(x);
                self.scaled_sum = 1.0;
            }
            Some(shift) if x > shift => {
                self.scaled_sum = self.scaled_sum * (shift - x).exp() + 1.0;
                self.shift = Some(x);
            }
            Some(shift) => self.scaled_sum += (x - shift).exp(),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `ln <exp(-βΔE)>`
    pub fn log_mean(&self) -> Option<f64> {
        let shift = self.shift?;
        Some(shift + (self.scaled_sum / self.count as f64).ln())
    }

    /// Free-energy difference in kcal/mol.
    pub fn free_energy(&self) -> Option<f64> {
        self.log_mean().map(|l| -l / self.beta)
    }
}

/// Fixed-width histogram of a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    bin_width: f64,
    bins: BTreeMap<i64, u64>,
}

impl Histogram {
    pub fn new(bin_width: f64) -> Self {
        Self {
            bin_width,
            bins: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, value: f64) {
        let bin = (value / self.bin_width).floor() as i64;
        *self.bins.entry(bin).or_insert(0) += 1;
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    /// `(lower edge, count)` of every occupied bin, in ascending order.
    pub fn bins(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.bins
            .iter()
            .map(|(&bin, &count)| (bin as f64 * self.bin_width, count))
    }

    pub fn total(&self) -> u64 {
        self.bins.values().sum()
    }
}

/// Running average of one scalar, scoped to the current block, with a persistent total.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyMonitor {
    block: RunningAverage,
    total: RunningAverage,
    histogram: Option<Histogram>,
}

impl EnergyMonitor {
    pub fn new(histogram_bin_width: Option<f64>) -> Self {
        Self {
            histogram: histogram_bin_width.map(Histogram::new),
            ..Self::default()
        }
    }

    pub fn push(&mut self, value: f64) {
        self.block.push(value);
        self.total.push(value);
        if let Some(h) = &mut self.histogram {
            h.push(value);
        }
    }

    pub fn block(&self) -> &RunningAverage {
        &self.block
    }

    pub fn total(&self) -> &RunningAverage {
        &self.total
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }

    pub fn end_block(&mut self) {
        self.block = RunningAverage::default();
    }
}

/// Everything a window accumulates from its sampled energies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowAccumulators {
    /// Forward finite-difference gradient `(E_fwd - E_ref) / (λ_fwd - λ)`.
    pub ti_forward: EnergyMonitor,
    /// Backward finite-difference gradient `(E_ref - E_bwd) / (λ - λ_bwd)`.
    pub ti_backward: EnergyMonitor,
    /// Gradient toward the neighbouring window.
    pub window_gradient: EnergyMonitor,
    /// Analytic soft-core contribution to dE/dλ.
    pub softcore_gradient: EnergyMonitor,
    pub energy: EnergyMonitor,
    pub fep_next: ExpAverage,
    pub fep_prev: ExpAverage,
    /// `E_next - E_ref` of every sample.
    pub work_next: Vec<f64>,
    /// `E_prev - E_ref` of every sample.
    pub work_prev: Vec<f64>,
    /// Block averages of every energy term, keyed by term name.
    pub components: BTreeMap<String, RunningAverage>,
}

impl WindowAccumulators {
    pub fn new(beta: f64, histogram_bin_width: Option<f64>) -> Self {
        Self {
            ti_forward: EnergyMonitor::new(histogram_bin_width),
            ti_backward: EnergyMonitor::new(histogram_bin_width),
            window_gradient: EnergyMonitor::new(None),
            softcore_gradient: EnergyMonitor::new(None),
            energy: EnergyMonitor::new(None),
            fep_next: ExpAverage::new(beta),
            fep_prev: ExpAverage::new(beta),
            work_next: Vec::new(),
            work_prev: Vec::new(),
            components: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, energies: &StateEnergies) {
        let (forward, backward) = energies.ti_gradients();
        self.ti_forward.push(forward);
        self.ti_backward.push(backward);
        if let Some(g) = energies.window_gradient() {
            self.window_gradient.push(g);
        }
        self.softcore_gradient.push(energies.softcore_dlambda);
        self.energy.push(energies.reference);

        let work_next = energies.next - energies.reference;
        let work_prev = energies.prev - energies.reference;
        self.fep_next.push(work_next);
        self.fep_prev.push(work_prev);
        self.work_next.push(work_next);
        self.work_prev.push(work_prev);

        for (name, term) in &energies.components {
            self.components
                .entry(name.clone())
                .or_default()
                .push(term.total());
        }
    }

    pub fn samples(&self) -> u64 {
        self.energy.total().count()
    }

    /// Closes the current block and returns its averages.
    pub fn end_block(&mut self) -> BlockAverages {
        let averages = BlockAverages {
            gradient_forward: self.ti_forward.block().mean(),
            gradient_backward: self.ti_backward.block().mean(),
            softcore_gradient: self.softcore_gradient.block().mean(),
            energy: self.energy.block().mean(),
            components: std::mem::take(&mut self.components)
                .into_iter()
                .filter_map(|(name, avg)| avg.mean().map(|m| (name, m)))
                .collect(),
        };
        self.ti_forward.end_block();
        self.ti_backward.end_block();
        self.window_gradient.end_block();
        self.softcore_gradient.end_block();
        self.energy.end_block();
        averages
    }
}

/// Averages of one window over one block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockAverages {
    pub gradient_forward: Option<f64>,
    pub gradient_backward: Option<f64>,
    pub softcore_gradient: Option<f64>,
    pub energy: Option<f64>,
    pub components: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_approx_equal(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn running_average_matches_direct_computation() {
        let values = [1.0, 2.0, 4.0, 7.0];
        let mut avg = RunningAverage::default();
        values.iter().for_each(|&v| avg.push(v));
        assert_eq!(avg.count(), 4);
        assert!(f64_approx_equal(avg.mean().unwrap(), 3.5, 1e-12));
        // sample variance of [1, 2, 4, 7] is 7.0
        assert!(f64_approx_equal(avg.variance().unwrap(), 7.0, 1e-12));
    }

    #[test]
    fn empty_running_average_has_no_mean() {
        let avg = RunningAverage::default();
        assert_eq!(avg.mean(), None);
        assert_eq!(avg.variance(), None);
    }

    #[test]
    fn exp_average_of_constant_returns_the_constant() {
        let mut avg = ExpAverage::new(1.7);
        for _ in 0..5 {
            avg.push(2.5);
        }
        assert!(f64_approx_equal(avg.free_energy().unwrap(), 2.5, 1e-12));
    }

    #[test]
    fn exp_average_matches_naive_formula_and_survives_large_exponents() {
        let beta = 1.0;
        let samples = [0.3, -1.2, 0.8, 2.0];
        let mut avg = ExpAverage::new(beta);
        samples.iter().for_each(|&s| avg.push(s));
        let naive = -(samples.iter().map(|s| (-beta * s).exp()).sum::<f64>() / 4.0).ln() / beta;
        assert!(f64_approx_equal(avg.free_energy().unwrap(), naive, 1e-12));

        let mut huge = ExpAverage::new(1.0);
        huge.push(-1000.0);
        huge.push(-1000.0);
        assert!(f64_approx_equal(huge.free_energy().unwrap(), -1000.0, 1e-9));
    }

    #[test]
    fn exp_average_without_samples_is_undefined() {
        assert_eq!(ExpAverage::new(1.0).free_energy(), None);
    }

    #[test]
    fn histogram_bins_by_floor() {
        let mut h = Histogram::new(0.5);
        for v in [0.1, 0.4, 0.6, -0.1] {
            h.push(v);
        }
        let bins: Vec<_> = h.bins().collect();
        assert_eq!(bins, vec![(-0.5, 1), (0.0, 2), (0.5, 1)]);
        assert_eq!(h.total(), 4);
    }

    #[test]
    fn end_block_resets_block_but_keeps_total() {
        let mut monitor = EnergyMonitor::new(Some(1.0));
        monitor.push(1.0);
        monitor.push(3.0);
        monitor.end_block();
        monitor.push(5.0);
        assert_eq!(monitor.block().count(), 1);
        assert_eq!(monitor.total().count(), 3);
        assert!(f64_approx_equal(monitor.total().mean().unwrap(), 3.0, 1e-12));
        assert_eq!(monitor.histogram().unwrap().total(), 3);
    }

    #[test]
    fn monitors_survive_json_round_trip() {
        let mut monitor = EnergyMonitor::new(Some(0.25));
        monitor.push(-1.0);
        monitor.push(2.0);
        let json = serde_json::to_string(&monitor).unwrap();
        let back: EnergyMonitor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, monitor);

        let mut fep = ExpAverage::new(1.5);
        fep.push(0.7);
        let back: ExpAverage = serde_json::from_str(&serde_json::to_string(&fep).unwrap()).unwrap();
        assert_eq!(back, fep);
    }
}
