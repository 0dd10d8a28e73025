use crate::engine::CollapseError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// Sample-by-K burden scores. Row `i` always belongs to genotype row `i`.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BurdenMatrix(pub Array2<f64>);

impl BurdenMatrix {
    pub fn new(values: Array2<f64>) -> Self {
        Self(values)
    }

    pub fn zeros(n_samples: usize, n_columns: usize) -> Self {
        Self(Array2::zeros((n_samples, n_columns)))
    }

    pub fn n_samples(&self) -> usize {
        self.0.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.0.ncols()
    }

    /// Overwrites one burden column with per-sample values, e.g. the output of
    /// [`crate::engine::cmc_collapse_subset`] for one marker group.
    pub fn assign_column(
        &mut self,
        column: usize,
        values: ArrayView1<'_, f64>,
    ) -> Result<(), CollapseError> {
        if column >= self.n_columns() {
            return Err(CollapseError::ColumnOutOfRange {
                column,
                n_columns: self.n_columns(),
            });
        }
        if values.len() != self.n_samples() {
            return Err(CollapseError::RowCountMismatch {
                found: values.len(),
                expected: self.n_samples(),
            });
        }
        self.0.column_mut(column).assign(&values);
        Ok(())
    }

    /// The single burden column of an N×1 result.
    pub fn scores(&self) -> ArrayView1<'_, f64> {
        self.0.column(0)
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.0
    }

    pub fn as_view(&self) -> ArrayView2<'_, f64> {
        self.0.view()
    }
}

impl Deref for BurdenMatrix {
    type Target = Array2<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for BurdenMatrix {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Array2<f64>> for BurdenMatrix {
    fn from(values: Array2<f64>) -> Self {
        Self(values)
    }
}

impl From<Array1<f64>> for BurdenMatrix {
    fn from(values: Array1<f64>) -> Self {
        Self(values.insert_axis(Axis(1)))
    }
}

impl From<BurdenMatrix> for Array2<f64> {
    fn from(values: BurdenMatrix) -> Self {
        values.0
    }
}
