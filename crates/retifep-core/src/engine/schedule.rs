use super::error::EngineError;
use serde::{Deserialize, Serialize};

/// An ordered set of λ windows.
///
/// Always non-empty, strictly increasing and contained in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct LambdaSchedule {
    values: Vec<f64>,
}

impl LambdaSchedule {
    pub fn new(values: Vec<f64>) -> Result<Self, EngineError> {
        if values.is_empty() {
            return Err(EngineError::InvalidSchedule(
                "schedule must contain at least one λ value".to_string(),
            ));
        }
        if let Some(bad) = values.iter().find(|v| !(0.0..=1.0).contains(*v)) {
            return Err(EngineError::InvalidSchedule(format!(
                "λ = {bad} lies outside [0, 1]"
            )));
        }
        if let Some(pair) = values.windows(2).find(|w| w[1] <= w[0]) {
            return Err(EngineError::InvalidSchedule(format!(
                "λ values must be strictly increasing ({} followed by {})",
                pair[0], pair[1]
            )));
        }
        Ok(Self { values })
    }

    /// Evenly spaced schedule of `count` windows covering [0, 1].
    ///
    /// A single window sits at λ = 0.5.
    pub fn from_count(count: usize) -> Result<Self, EngineError> {
        match count {
            0 => Err(EngineError::InvalidSchedule(
                "window count must be positive".to_string(),
            )),
            1 => Self::new(vec![0.5]),
            n => Self::new((0..n).map(|i| i as f64 / (n - 1) as f64).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// The λ values of the previous and next windows, if any.
    pub fn neighbors(&self, index: usize) -> (Option<f64>, Option<f64>) {
        let prev = index.checked_sub(1).and_then(|i| self.get(i));
        let next = self.get(index + 1);
        (prev, next)
    }

    /// Adjacent pairs `(i, i + 1)` with `i % 2 == parity`. Pairs of one parity are disjoint.
    pub fn exchange_pairs(&self, parity: usize) -> Vec<(usize, usize)> {
        (0..self.values.len().saturating_sub(1))
            .filter(|i| i % 2 == parity % 2)
            .map(|i| (i, i + 1))
            .collect()
    }
}

impl TryFrom<Vec<f64>> for LambdaSchedule {
    type Error = EngineError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<LambdaSchedule> for Vec<f64> {
    fn from(schedule: LambdaSchedule) -> Self {
        schedule.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_strictly_increasing_values_in_unit_interval() {
        let schedule = LambdaSchedule::new(vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.get(1), Some(0.5));
    }

    #[test]
    fn new_rejects_empty_unordered_and_out_of_range_schedules() {
        assert!(LambdaSchedule::new(vec![]).is_err());
        assert!(LambdaSchedule::new(vec![0.0, 0.5, 0.5]).is_err());
        assert!(LambdaSchedule::new(vec![0.5, 0.2]).is_err());
        assert!(LambdaSchedule::new(vec![0.0, 1.1]).is_err());
        assert!(LambdaSchedule::new(vec![-0.1, 0.5]).is_err());
        assert!(LambdaSchedule::new(vec![f64::NAN]).is_err());
    }

    #[test]
    fn from_count_builds_evenly_spaced_schedule() {
        let schedule = LambdaSchedule::from_count(5).unwrap();
        assert_eq!(schedule.values(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(LambdaSchedule::from_count(1).unwrap().values(), &[0.5]);
        assert!(LambdaSchedule::from_count(0).is_err());
    }

    #[test]
    fn neighbors_are_absent_at_the_ends() {
        let schedule = LambdaSchedule::new(vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(schedule.neighbors(0), (None, Some(0.5)));
        assert_eq!(schedule.neighbors(1), (Some(0.0), Some(1.0)));
        assert_eq!(schedule.neighbors(2), (Some(0.5), None));
    }

    #[test]
    fn exchange_pairs_alternate_and_are_disjoint() {
        let schedule = LambdaSchedule::from_count(5).unwrap();
        assert_eq!(schedule.exchange_pairs(0), vec![(0, 1), (2, 3)]);
        assert_eq!(schedule.exchange_pairs(1), vec![(1, 2), (3, 4)]);
        assert!(LambdaSchedule::new(vec![0.3]).unwrap().exchange_pairs(0).is_empty());
    }

    #[test]
    fn deserialization_validates_values() {
        let ok: LambdaSchedule = serde_json::from_str("[0.0, 1.0]").unwrap();
        assert_eq!(ok.len(), 2);
        assert!(serde_json::from_str::<LambdaSchedule>("[1.0, 0.0]").is_err());
    }
}
