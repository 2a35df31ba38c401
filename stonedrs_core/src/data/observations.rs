//! Provides the immutable view of the sample: outputs, inputs and contextual variables
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::data::DataError;

/// Covariates for every observation, either one scalar or one vector per observation
///
/// Scalars are promoted to length-1 vectors when the [`ObservationSet`] is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Covariates {
    /// One value per observation
    Scalars(Vec<f64>),
    /// One vector per observation, all of the same length
    Vectors(Vec<Vec<f64>>),
}

impl Covariates {
    /// Number of observations covered
    pub fn len(&self) -> usize {
        match self {
            Covariates::Scalars(values) => values.len(),
            Covariates::Vectors(rows) => rows.len(),
        }
    }

    /// True if no observation is covered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into an `n x width` matrix, checking that rows are not ragged
    fn into_matrix(self, what: &str) -> Result<DMatrix<f64>, DataError> {
        match self {
            Covariates::Scalars(values) => Ok(DMatrix::from_column_slice(values.len(), 1, &values)),
            Covariates::Vectors(rows) => {
                let width = rows.first().map(|row| row.len()).unwrap_or(0);
                if let Some((row, found)) = rows
                    .iter()
                    .map(|r| r.len())
                    .enumerate()
                    .find(|(_, len)| *len != width)
                {
                    return Err(DataError::RaggedRows {
                        what: what.to_string(),
                        row,
                        expected: width,
                        found,
                    });
                }
                Ok(DMatrix::from_fn(rows.len(), width, |i, j| rows[i][j]))
            }
        }
    }
}

impl From<Vec<f64>> for Covariates {
    fn from(values: Vec<f64>) -> Self {
        Covariates::Scalars(values)
    }
}

impl From<Vec<Vec<f64>>> for Covariates {
    fn from(rows: Vec<Vec<f64>>) -> Self {
        Covariates::Vectors(rows)
    }
}

/// The sample of N observations, with J inputs and K contextual variables each
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    y: DVector<f64>,
    x: DMatrix<f64>,
    z: DMatrix<f64>,
}

impl ObservationSet {
    /// Create a new observation set
    ///
    /// # Parameters
    /// - `y`: Output of each observation
    /// - `x`: Inputs of each observation
    /// - `z`: Contextual variables of each observation, if any
    ///
    /// # Examples
    /// ```rust
    /// use stonedrs_core::data::ObservationSet;
    /// // Scalar inputs are promoted to length-1 vectors
    /// let data = ObservationSet::new(vec![1., 2., 3.], vec![1., 2., 3.].into(), None).unwrap();
    /// assert_eq!(data.num_inputs(), 1);
    /// assert_eq!(data.num_contextual(), 0);
    /// ```
    pub fn new(y: Vec<f64>, x: Covariates, z: Option<Covariates>) -> Result<Self, DataError> {
        let n = y.len();
        if n == 0 {
            return Err(DataError::Empty);
        }
        check_length("x", n, x.len())?;
        let x = x.into_matrix("x")?;
        if x.ncols() == 0 {
            return Err(DataError::NoInputs);
        }
        let z = match z {
            Some(z) => {
                check_length("z", n, z.len())?;
                z.into_matrix("z")?
            }
            None => DMatrix::zeros(n, 0),
        };
        let y = DVector::from_vec(y);
        check_finite("y", y.iter().copied().enumerate())?;
        check_finite("x", row_values(&x))?;
        check_finite("z", row_values(&z))?;
        Ok(Self { y, x, z })
    }

    /// Number of observations (N)
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Always false, an empty sample can't be built
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Number of inputs per observation (J)
    pub fn num_inputs(&self) -> usize {
        self.x.ncols()
    }

    /// Number of contextual variables per observation (K)
    pub fn num_contextual(&self) -> usize {
        self.z.ncols()
    }

    /// Output of observation `i`
    pub fn output(&self, i: usize) -> f64 {
        self.y[i]
    }

    /// Input `j` of observation `i`
    pub fn input(&self, i: usize, j: usize) -> f64 {
        self.x[(i, j)]
    }

    /// Contextual variable `k` of observation `i`
    pub fn contextual(&self, i: usize, k: usize) -> f64 {
        self.z[(i, k)]
    }

    /// All outputs
    pub fn outputs(&self) -> &DVector<f64> {
        &self.y
    }

    /// All inputs, one row per observation
    pub fn inputs(&self) -> &DMatrix<f64> {
        &self.x
    }

    /// All contextual variables, one row per observation
    pub fn contextuals(&self) -> &DMatrix<f64> {
        &self.z
    }

    /// Check that every output is strictly positive, as the logarithmic regression requires
    pub fn require_positive_output(&self) -> Result<(), DataError> {
        match self.y.iter().enumerate().find(|(_, y)| **y <= 0.) {
            Some((row, value)) => Err(DataError::NonPositiveOutput { row, value: *value }),
            None => Ok(()),
        }
    }
}

fn check_length(what: &str, expected: usize, found: usize) -> Result<(), DataError> {
    if expected != found {
        return Err(DataError::LengthMismatch {
            what: what.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn check_finite(
    what: &str,
    mut values: impl Iterator<Item = (usize, f64)>,
) -> Result<(), DataError> {
    match values.find(|(_, value)| !value.is_finite()) {
        Some((row, _)) => Err(DataError::NonFinite {
            what: what.to_string(),
            row,
        }),
        None => Ok(()),
    }
}

/// Every entry of `matrix`, tagged with its row
fn row_values(matrix: &DMatrix<f64>) -> impl Iterator<Item = (usize, f64)> + '_ {
    (0..matrix.nrows()).flat_map(move |i| (0..matrix.ncols()).map(move |j| (i, matrix[(i, j)])))
}
