use super::pmf::{Pmf, PmfEstimate};
use crate::engine::window::LambdaWindow;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const BAR_MAX_BRACKET_STEPS: usize = 64;
const BAR_MAX_BISECTIONS: usize = 200;
const BAR_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Error, PartialEq)]
pub enum EstimatorError {
    #[error("No λ windows to analyse")]
    NoWindows,

    #[error("Window {window} has no recorded samples")]
    NoSamples { window: usize },

    #[error("Bennett acceptance ratio did not converge between windows {window} and {}", .window + 1)]
    BarDidNotConverge { window: usize },
}

/// The per-window statistics the estimators consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowData {
    pub index: usize,
    pub lambda: f64,
    /// Mean of `(E_fwd − E_ref) / (λ_fwd − λ)` over the run.
    pub gradient_forward: f64,
    /// Mean of `(E_ref − E_bwd) / (λ − λ_bwd)` over the run.
    pub gradient_backward: f64,
    /// Zwanzig estimate of `F(λ_next) − F(λ)`.
    pub fep_next: Option<f64>,
    /// Zwanzig estimate of `F(λ_prev) − F(λ)`.
    pub fep_prev: Option<f64>,
    pub work_next: Vec<f64>,
    pub work_prev: Vec<f64>,
}

impl WindowData {
    pub fn from_window(window: &LambdaWindow) -> Result<Self, EstimatorError> {
        let acc = &window.accumulators;
        let no_samples = || EstimatorError::NoSamples {
            window: window.index,
        };
        Ok(Self {
            index: window.index,
            lambda: window.lambda(),
            gradient_forward: acc.ti_forward.total().mean().ok_or_else(no_samples)?,
            gradient_backward: acc.ti_backward.total().mean().ok_or_else(no_samples)?,
            fep_next: acc.fep_next.free_energy(),
            fep_prev: acc.fep_prev.free_energy(),
            work_next: acc.work_next.clone(),
            work_prev: acc.work_prev.clone(),
        })
    }
}

/// All three estimates of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeEnergyReport {
    pub ti: PmfEstimate,
    pub fep: PmfEstimate,
    pub bar: PmfEstimate,
}

/// Turns per-window statistics into free-energy profiles along λ.
///
/// Windows must be given in schedule order. All results are in kcal/mol relative to
/// the first point of the profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeEnergyEstimator {
    beta: f64,
}

impl FreeEnergyEstimator {
    pub fn new(beta: f64) -> Self {
        Self { beta }
    }

    pub fn estimate_all(&self, windows: &[WindowData]) -> Result<FreeEnergyReport, EstimatorError> {
        Ok(FreeEnergyReport {
            ti: self.ti(windows)?,
            fep: self.fep(windows)?,
            bar: self.bar(windows)?,
        })
    }

    /// Thermodynamic integration of the finite-difference gradients.
    ///
    /// The profile is extended to λ = 0 and λ = 1 by holding the outermost gradient
    /// constant.
    pub fn ti(&self, windows: &[WindowData]) -> Result<PmfEstimate, EstimatorError> {
        let (first, last) = match (windows.first(), windows.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(EstimatorError::NoWindows),
        };
        let profile = |gradient: fn(&WindowData) -> f64| {
            let mut points = Vec::with_capacity(windows.len() + 2);
            if first.lambda > 0.0 {
                points.push((0.0, gradient(first)));
            }
            points.extend(windows.iter().map(|w| (w.lambda, gradient(w))));
            if last.lambda < 1.0 {
                points.push((1.0, gradient(last)));
            }
            Pmf::integrate(&points)
        };
        let estimate = PmfEstimate::from_directions(
            profile(|w| w.gradient_forward),
            profile(|w| w.gradient_backward),
        );
        debug!(delta_g = estimate.delta_g(), error = estimate.error, "TI estimate.");
        Ok(estimate)
    }

    /// Exponential averaging toward each neighbour, summed along the schedule.
    ///
    /// The forward profile uses samples of the lower window of each pair; the backward
    /// profile uses samples of the upper one.
    pub fn fep(&self, windows: &[WindowData]) -> Result<PmfEstimate, EstimatorError> {
        if windows.is_empty() {
            return Err(EstimatorError::NoWindows);
        }
        let lambdas: Vec<f64> = windows.iter().map(|w| w.lambda).collect();
        let mut forward = Vec::with_capacity(windows.len() - 1);
        let mut backward = Vec::with_capacity(windows.len() - 1);
        for pair in windows.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            forward.push(lower.fep_next.ok_or(EstimatorError::NoSamples {
                window: lower.index,
            })?);
            let prev = upper.fep_prev.ok_or(EstimatorError::NoSamples {
                window: upper.index,
            })?;
            backward.push(-prev);
        }
        let estimate = PmfEstimate::from_directions(
            Pmf::accumulate(&lambdas, &forward),
            Pmf::accumulate(&lambdas, &backward),
        );
        debug!(delta_g = estimate.delta_g(), error = estimate.error, "FEP estimate.");
        Ok(estimate)
    }

    /// Bennett's acceptance ratio for every adjacent pair, summed along the schedule.
    ///
    /// The one-sided exponential averages are kept as the forward and backward profiles
    /// and bound the reported error.
    pub fn bar(&self, windows: &[WindowData]) -> Result<PmfEstimate, EstimatorError> {
        let fep = self.fep(windows)?;
        let lambdas: Vec<f64> = windows.iter().map(|w| w.lambda).collect();
        let deltas = windows
            .windows(2)
            .map(|pair| self.bar_pair(&pair[0], &pair[1]))
            .collect::<Result<Vec<f64>, _>>()?;
        let estimate = PmfEstimate {
            pmf: Pmf::accumulate(&lambdas, &deltas),
            forward: fep.forward,
            backward: fep.backward,
            error: fep.error,
        };
        debug!(delta_g = estimate.delta_g(), error = estimate.error, "BAR estimate.");
        Ok(estimate)
    }

    /// Solves Bennett's equation for `F(upper) − F(lower)` by bisection.
    fn bar_pair(&self, lower: &WindowData, upper: &WindowData) -> Result<f64, EstimatorError> {
        if lower.work_next.is_empty() {
            return Err(EstimatorError::NoSamples {
                window: lower.index,
            });
        }
        if upper.work_prev.is_empty() {
            return Err(EstimatorError::NoSamples {
                window: upper.index,
            });
        }
        let not_converged = EstimatorError::BarDidNotConverge {
            window: lower.index,
        };

        let forward: Vec<f64> = lower.work_next.iter().map(|w| self.beta * w).collect();
        let reverse: Vec<f64> = upper.work_prev.iter().map(|w| self.beta * w).collect();
        let m = (forward.len() as f64 / reverse.len() as f64).ln();
        let residual = |x: f64| {
            let f: f64 = forward.iter().map(|w| fermi(m + w - x)).sum();
            let r: f64 = reverse.iter().map(|w| fermi(-m + w + x)).sum();
            f - r
        };

        // The residual increases monotonically in x.
        let guess = lower.fep_next.map_or(0.0, |df| self.beta * df);
        let guess = if guess.is_finite() { guess } else { 0.0 };
        let (mut lo, mut hi) = (guess - 1.0, guess + 1.0);
        let mut step = 1.0;
        let mut steps = 0;
        while residual(lo) > 0.0 {
            lo -= step;
            step *= 2.0;
            steps += 1;
            if steps > BAR_MAX_BRACKET_STEPS {
                return Err(not_converged);
            }
        }
        step = 1.0;
        steps = 0;
        while residual(hi) < 0.0 {
            hi += step;
            step *= 2.0;
            steps += 1;
            if steps > BAR_MAX_BRACKET_STEPS {
                return Err(not_converged);
            }
        }

        for _ in 0..BAR_MAX_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if residual(mid) < 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
            if hi - lo < BAR_TOLERANCE * mid.abs().max(1.0) {
                return Ok(0.5 * (lo + hi) / self.beta);
            }
        }
        Err(not_converged)
    }
}

/// `1 / (1 + e^x)` without overflow.
fn fermi(x: f64) -> f64 {
    if x > 0.0 {
        let e = (-x).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + x.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::K_BOLTZMANN;

    fn f64_approx_equal(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    fn beta() -> f64 {
        1.0 / (K_BOLTZMANN * 300.0)
    }

    fn window(index: usize, lambda: f64, forward: f64, backward: f64) -> WindowData {
        WindowData {
            index,
            lambda,
            gradient_forward: forward,
            gradient_backward: backward,
            fep_next: None,
            fep_prev: None,
            work_next: Vec::new(),
            work_prev: Vec::new(),
        }
    }

    #[test]
    fn ti_of_a_constant_gradient_is_extended_to_both_ends() {
        let windows = vec![window(0, 0.25, 2.0, 2.0), window(1, 0.75, 2.0, 2.0)];
        let estimate = FreeEnergyEstimator::new(beta()).ti(&windows).unwrap();
        let lambdas: Vec<f64> = estimate.pmf.points().iter().map(|p| p.lambda).collect();
        assert_eq!(lambdas, vec![0.0, 0.25, 0.75, 1.0]);
        assert!(f64_approx_equal(estimate.delta_g(), 2.0, 1e-12));
        assert!(f64_approx_equal(estimate.error, 0.0, 1e-12));
    }

    #[test]
    fn ti_directional_spread_is_twice_the_error() {
        let windows = vec![
            window(0, 0.0, 1.0, 3.0),
            window(1, 0.5, -2.0, -1.0),
            window(2, 1.0, 4.0, 0.5),
        ];
        let estimate = FreeEnergyEstimator::new(beta()).ti(&windows).unwrap();
        let spread = (estimate.forward.delta_g() - estimate.backward.delta_g()).abs();
        assert!(f64_approx_equal(spread, 2.0 * estimate.error, 1e-12));
        // forward: 0.25*(1-2) + 0.25*(-2+4) = 0.25; backward: 0.25*(3-1) + 0.25*(-1+0.5) = 0.375
        assert!(f64_approx_equal(estimate.forward.delta_g(), 0.25, 1e-12));
        assert!(f64_approx_equal(estimate.backward.delta_g(), 0.375, 1e-12));
        assert!(f64_approx_equal(estimate.delta_g(), 0.3125, 1e-12));
    }

    #[test]
    fn ti_without_windows_is_an_error() {
        let err = FreeEnergyEstimator::new(beta()).ti(&[]).unwrap_err();
        assert_eq!(err, EstimatorError::NoWindows);
    }

    #[test]
    fn fep_sums_forward_and_negated_backward_averages() {
        let mut a = window(0, 0.0, 0.0, 0.0);
        let mut b = window(1, 0.5, 0.0, 0.0);
        let mut c = window(2, 1.0, 0.0, 0.0);
        a.fep_next = Some(1.0);
        b.fep_prev = Some(-1.2);
        b.fep_next = Some(0.5);
        c.fep_prev = Some(-0.3);
        let estimate = FreeEnergyEstimator::new(beta()).fep(&[a, b, c]).unwrap();
        assert!(f64_approx_equal(estimate.forward.delta_g(), 1.5, 1e-12));
        assert!(f64_approx_equal(estimate.backward.delta_g(), 1.5, 1e-12));
        assert!(f64_approx_equal(estimate.forward.points()[1].value, 1.0, 1e-12));
        assert!(f64_approx_equal(estimate.backward.points()[1].value, 1.2, 1e-12));
        assert!(f64_approx_equal(estimate.error, 0.0, 1e-12));
    }

    #[test]
    fn fep_reports_the_window_missing_samples() {
        let a = window(0, 0.0, 0.0, 0.0);
        let b = window(1, 1.0, 0.0, 0.0);
        let err = FreeEnergyEstimator::new(beta()).fep(&[a, b]).unwrap_err();
        assert_eq!(err, EstimatorError::NoSamples { window: 0 });
    }

    fn bar_pair(forward_work: Vec<f64>, reverse_work: Vec<f64>) -> (WindowData, WindowData) {
        let mut a = window(0, 0.0, 0.0, 0.0);
        let mut b = window(1, 1.0, 0.0, 0.0);
        a.fep_next = Some(forward_work.iter().sum::<f64>() / forward_work.len() as f64);
        b.fep_prev = Some(reverse_work.iter().sum::<f64>() / reverse_work.len() as f64);
        a.work_next = forward_work;
        b.work_prev = reverse_work;
        (a, b)
    }

    #[test]
    fn bar_recovers_a_deterministic_free_energy() {
        let (a, b) = bar_pair(vec![1.3; 10], vec![-1.3; 10]);
        let estimate = FreeEnergyEstimator::new(beta()).bar(&[a, b]).unwrap();
        assert!(f64_approx_equal(estimate.delta_g(), 1.3, 1e-8));
    }

    #[test]
    fn bar_accounts_for_unequal_sample_counts() {
        let (a, b) = bar_pair(vec![-0.7; 4], vec![0.7; 8]);
        let estimate = FreeEnergyEstimator::new(beta()).bar(&[a, b]).unwrap();
        assert!(f64_approx_equal(estimate.delta_g(), -0.7, 1e-8));
    }

    #[test]
    fn bar_lies_between_the_one_sided_estimates_for_spread_work() {
        let forward_work = vec![0.2, 0.6, 1.0, 1.4, 1.8];
        let reverse_work = vec![-1.6, -1.2, -0.8, -0.4, 0.0];
        let estimator = FreeEnergyEstimator::new(beta());
        let (mut a, mut b) = bar_pair(forward_work.clone(), reverse_work.clone());
        let mut next = crate::engine::monitor::ExpAverage::new(beta());
        forward_work.iter().for_each(|&w| next.push(w));
        let mut prev = crate::engine::monitor::ExpAverage::new(beta());
        reverse_work.iter().for_each(|&w| prev.push(w));
        a.fep_next = next.free_energy();
        b.fep_prev = prev.free_energy();

        let bar = estimator.bar(&[a.clone(), b.clone()]).unwrap();
        let fep = estimator.fep(&[a, b]).unwrap();
        let (lo, hi) = {
            let (f, r) = (fep.forward.delta_g(), fep.backward.delta_g());
            (f.min(r), f.max(r))
        };
        assert!(bar.delta_g() >= lo - 1e-9 && bar.delta_g() <= hi + 1e-9);
        assert_eq!(bar.forward, fep.forward);
        assert!(f64_approx_equal(bar.error, fep.error, 1e-12));
    }

    #[test]
    fn bar_requires_work_samples_on_both_sides() {
        let (a, mut b) = bar_pair(vec![1.0; 3], vec![-1.0; 3]);
        b.work_prev.clear();
        let err = FreeEnergyEstimator::new(beta()).bar(&[a, b]).unwrap_err();
        assert_eq!(err, EstimatorError::NoSamples { window: 1 });
    }

    #[test]
    fn fermi_is_stable_for_large_arguments() {
        assert!(f64_approx_equal(fermi(0.0), 0.5, 1e-15));
        assert_eq!(fermi(1000.0), 0.0);
        assert_eq!(fermi(-1000.0), 1.0);
    }
}
