use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PmfPoint {
    pub lambda: f64,
    /// Free energy relative to the first point, kcal/mol.
    pub value: f64,
}

/// A potential of mean force along λ, ordered by increasing λ.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pmf {
    points: Vec<PmfPoint>,
}

impl Pmf {
    pub fn new(points: Vec<PmfPoint>) -> Self {
        Self { points }
    }

    /// Integrates a gradient profile with the trapezoid rule, starting from zero.
    pub fn integrate(gradients: &[(f64, f64)]) -> Self {
        let Some(&(first, _)) = gradients.first() else {
            return Self::default();
        };
        let mut points = vec![PmfPoint {
            lambda: first,
            value: 0.0,
        }];
        let mut value = 0.0;
        for ((l0, g0), (l1, g1)) in gradients.iter().copied().tuple_windows() {
            value += 0.5 * (g0 + g1) * (l1 - l0);
            points.push(PmfPoint { lambda: l1, value });
        }
        Self { points }
    }

    /// Accumulates per-interval free-energy differences, starting from zero at `lambdas[0]`.
    ///
    /// `deltas[i]` is the difference between `lambdas[i + 1]` and `lambdas[i]`.
    pub fn accumulate(lambdas: &[f64], deltas: &[f64]) -> Self {
        let mut value = 0.0;
        let points = lambdas
            .iter()
            .enumerate()
            .map(|(i, &lambda)| {
                if i > 0 {
                    value += deltas[i - 1];
                }
                PmfPoint { lambda, value }
            })
            .collect();
        Self { points }
    }

    /// Pointwise mean of two profiles sampled at the same λ values.
    pub fn mean(a: &Pmf, b: &Pmf) -> Self {
        let points = a
            .points
            .iter()
            .zip(&b.points)
            .map(|(p, q)| PmfPoint {
                lambda: p.lambda,
                value: 0.5 * (p.value + q.value),
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[PmfPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Free-energy change between the first and last point.
    pub fn delta_g(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.value - first.value,
            _ => 0.0,
        }
    }
}

/// A free-energy profile with the two one-sided estimates it was averaged from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmfEstimate {
    pub pmf: Pmf,
    pub forward: Pmf,
    pub backward: Pmf,
    /// Half the spread between the forward and backward totals.
    pub error: f64,
}

impl PmfEstimate {
    pub fn from_directions(forward: Pmf, backward: Pmf) -> Self {
        let error = 0.5 * (forward.delta_g() - backward.delta_g()).abs();
        Self {
            pmf: Pmf::mean(&forward, &backward),
            forward,
            backward,
            error,
        }
    }

    pub fn delta_g(&self) -> f64 {
        self.pmf.delta_g()
    }
}
