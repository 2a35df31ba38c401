use stonedrs_core::cnls::{Formulation, ModelConfigBuilder, SolveOutcome};
use stonedrs_core::data::{ActiveSetMatrix, Covariates, ObservationSet};

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn to_py_err(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Covariates as passed from Python, a list of lists or a flat list of scalars
#[derive(FromPyObject, Debug, Clone, PartialEq)]
enum PyCovariates {
    Vectors(Vec<Vec<f64>>),
    Scalars(Vec<f64>),
}

impl From<PyCovariates> for Covariates {
    fn from(covariates: PyCovariates) -> Self {
        match covariates {
            PyCovariates::Vectors(rows) => Covariates::Vectors(rows),
            PyCovariates::Scalars(values) => Covariates::Scalars(values),
        }
    }
}

#[pyclass]
struct PyFormulation {
    inner: Formulation,
}

#[pymethods]
impl PyFormulation {
    #[new]
    #[pyo3(signature = (
        y, x, tau, cut_active, active,
        z=None, eta=0., cet="addi", fun="prod", rts="vrs", loss="quantile", penalty=None
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        y: Vec<f64>,
        x: PyCovariates,
        tau: f64,
        cut_active: Vec<Vec<bool>>,
        active: Vec<Vec<bool>>,
        z: Option<PyCovariates>,
        eta: f64,
        cet: &str,
        fun: &str,
        rts: &str,
        loss: &str,
        penalty: Option<i64>,
    ) -> PyResult<Self> {
        let data = ObservationSet::new(y, x.into(), z.map(Covariates::from)).map_err(to_py_err)?;

        let mut builder = ModelConfigBuilder::default();
        builder
            .composition(cet.parse().map_err(to_py_err)?)
            .direction(fun.parse().map_err(to_py_err)?)
            .returns_to_scale(rts.parse().map_err(to_py_err)?)
            .loss(loss.parse().map_err(to_py_err)?)
            .tau(tau)
            .eta(eta);
        if let Some(code) = penalty {
            builder.penalty_code(code).map_err(to_py_err)?;
        }
        let config = builder.build().map_err(to_py_err)?;

        let cut_active = ActiveSetMatrix::from_rows(&cut_active).map_err(to_py_err)?;
        let active = ActiveSetMatrix::from_rows(&active).map_err(to_py_err)?;
        let inner = Formulation::new(data, config, &cut_active, &active).map_err(to_py_err)?;
        Ok(PyFormulation { inner })
    }

    /// Solve the model, returning the solver status or None if no solving path exists yet
    fn optimize(&mut self) -> PyResult<Option<String>> {
        match self.inner.optimize().map_err(to_py_err)? {
            SolveOutcome::Solved(status) => Ok(Some(status.to_string())),
            SolveOutcome::NotYetAvailable => Ok(None),
        }
    }

    fn get_alpha(&mut self) -> PyResult<Vec<f64>> {
        Ok(self.inner.alpha().map_err(to_py_err)?.iter().copied().collect())
    }

    fn get_beta(&mut self) -> PyResult<Vec<Vec<f64>>> {
        let beta = self.inner.beta().map_err(to_py_err)?;
        Ok(beta
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect())
    }

    fn get_lambda(&mut self) -> PyResult<Vec<f64>> {
        Ok(self.inner.lambda().map_err(to_py_err)?.iter().copied().collect())
    }

    fn get_residual(&mut self) -> PyResult<Vec<f64>> {
        Ok(self
            .inner
            .residuals()
            .map_err(to_py_err)?
            .iter()
            .copied()
            .collect())
    }

    fn get_frontier(&mut self) -> PyResult<Vec<f64>> {
        let frontier = self.inner.frontier().map_err(to_py_err)?;
        Ok(frontier.iter().copied().collect())
    }

    fn constraint_counts(&self) -> Vec<(String, usize)> {
        self.inner
            .family_counts()
            .into_iter()
            .map(|(family, count)| (family.to_string(), count))
            .collect()
    }

    fn solver_key(&self) -> &'static str {
        self.inner.solver_key().as_str()
    }
}

/// A Python module implemented in Rust. The name of this function must match
/// the `lib.name` setting in the `Cargo.toml`, else Python will not be able to
/// import the module.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFormulation>()?;
    Ok(())
}
