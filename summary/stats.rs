use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryError {
    #[error("Cannot summarize an empty vector; at least one value is required.")]
    Empty,
}

/// Order statistics, mean and sample standard deviation of one numeric vector.
///
/// Quartiles use nearest-rank selection on the sorted values: the `p` quantile is
/// `sorted[floor(p * n)]`, without interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistic {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (denominator `n - 1`); `0.0` for a single value.
    pub sd: f64,
    pub count: usize,
}

impl SummaryStatistic {
    /// Summarizes a non-empty vector. Accepts slices, `Vec`s, arrays and `ndarray` views.
    pub fn from_values<'a>(values: impl Into<ArrayView1<'a, f64>>) -> Result<Self, SummaryError> {
        let values = values.into();
        if values.is_empty() {
            return Err(SummaryError::Empty);
        }
        let count = values.len();

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let nearest_rank = |p: f64| sorted[(p * count as f64).floor() as usize];

        // Moments are taken over the values in input order.
        let mean = values.mean().ok_or(SummaryError::Empty)?;
        let sd = if count > 1 { values.std(1.0) } else { 0.0 };

        Ok(Self {
            min: sorted[0],
            q1: nearest_rank(0.25),
            median: nearest_rank(0.5),
            q3: nearest_rank(0.75),
            max: sorted[count - 1],
            mean,
            sd,
            count,
        })
    }

    /// Sample variance, the value printed in summary headers.
    pub fn variance(&self) -> f64 {
        self.sd * self.sd
    }
}
