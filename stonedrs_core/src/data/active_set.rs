//! Provides the boolean pair matrices that gate sweet spot cuts
use nalgebra::DMatrix;

use crate::data::DataError;

/// An `N x N` matrix of candidate cuts
///
/// `is_active(i, h)` means observation `h`'s hyperplane must be compared against the fitted
/// value of observation `i`. The diagonal never counts as active, whatever is stored there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSetMatrix {
    entries: DMatrix<bool>,
}

impl ActiveSetMatrix {
    /// Create an `n x n` matrix with no active pairs
    pub fn new(n: usize) -> Self {
        Self {
            entries: DMatrix::from_element(n, n, false),
        }
    }

    /// Create a matrix from its rows
    pub fn from_rows(rows: &[Vec<bool>]) -> Result<Self, DataError> {
        let n = rows.len();
        if let Some(row) = rows.iter().find(|row| row.len() != n) {
            return Err(DataError::ActiveSetShape {
                rows: n,
                cols: row.len(),
                expected: n,
            });
        }
        Ok(Self {
            entries: DMatrix::from_fn(n, n, |i, h| rows[i][h]),
        })
    }

    /// Create a matrix from a numeric indicator matrix, where any non-zero entry is active
    pub fn from_indicator(indicator: &DMatrix<f64>) -> Result<Self, DataError> {
        if indicator.nrows() != indicator.ncols() {
            return Err(DataError::ActiveSetShape {
                rows: indicator.nrows(),
                cols: indicator.ncols(),
                expected: indicator.nrows(),
            });
        }
        Ok(Self {
            entries: indicator.map(|value| value != 0.),
        })
    }

    /// Number of observations the matrix covers
    pub fn dimension(&self) -> usize {
        self.entries.nrows()
    }

    /// Mark the pair `(i, h)` as active or inactive
    pub fn set(&mut self, i: usize, h: usize, active: bool) {
        self.entries[(i, h)] = active;
    }

    /// True if the pair `(i, h)` is an active candidate cut, always false for `i == h`
    pub fn is_active(&self, i: usize, h: usize) -> bool {
        i != h && self.entries[(i, h)]
    }

    /// Every active pair, row by row
    pub fn active_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.dimension();
        (0..n)
            .flat_map(move |i| (0..n).map(move |h| (i, h)))
            .filter(|&(i, h)| self.is_active(i, h))
    }

    /// Number of active pairs, excluding the diagonal
    pub fn active_count(&self) -> usize {
        self.active_pairs().count()
    }

    /// Check that the matrix covers exactly `n` observations
    pub fn check_dimension(&self, n: usize) -> Result<(), DataError> {
        if self.dimension() != n {
            return Err(DataError::ActiveSetShape {
                rows: self.entries.nrows(),
                cols: self.entries.ncols(),
                expected: n,
            });
        }
        Ok(())
    }
}
