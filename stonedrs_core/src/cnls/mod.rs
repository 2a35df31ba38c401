//! Formulation of convex quantile and expectile regression models
//!
//! Given an [`ObservationSet`](crate::data::ObservationSet), a [`ModelConfig`] and the two
//! active-set matrices, [`Formulation::new`] lays out the decision variables, selects the
//! objective and generates every constraint family. The resulting
//! [`Problem`](crate::optimize::problem::Problem) is then handed to a solver.

pub mod config;
pub mod constraints;
pub mod formulation;
pub mod layout;
pub mod objective;

pub use config::{
    CompositionMode, FrontierDirection, LossType, ModelConfig, ModelConfigBuilder, PenaltyNorm,
    ReturnsToScale,
};
pub use constraints::ConstraintFamily;
pub use formulation::{Formulation, SolveOutcome, SolveRoute, SolverKey};
pub use layout::VariableLayout;

use thiserror::Error;

use crate::data::DataError;
use crate::optimize::problem::ProblemError;
use crate::optimize::solvers::SolverError;
use crate::optimize::OptimizationStatus;

/// Errors raised while building or solving a formulation
#[derive(Error, Debug)]
pub enum FormulationError {
    /// An unrecognized configuration value, such as a penalty code outside 1, 2, 3
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// A valid combination of options that has no formulation
    #[error("The {family} constraint is not available for {composition:?} composition with {returns_to_scale:?} returns to scale")]
    UnsupportedConfiguration {
        /// Constraint family that could not be built
        family: ConstraintFamily,
        /// Requested composition of the error term
        composition: CompositionMode,
        /// Requested returns to scale
        returns_to_scale: ReturnsToScale,
    },
    /// The sample can't be used with this model
    #[error("Invalid data: {0}")]
    InvalidData(#[from] DataError),
    /// Estimates were requested but no solved point is available
    #[error("Model isn't optimized (status: {0})")]
    NotOptimized(OptimizationStatus),
    /// The intercept was requested from a constant returns to scale model
    #[error("Estimated intercept (alpha) cannot be retrieved due to the constant returns-to-scale assumption")]
    InterceptUnavailable,
    /// Contextual coefficients were requested from a sample without contextual variables
    #[error("Estimated coefficient (lambda) cannot be retrieved because no contextual variable is included in the model")]
    NoContextualVariables,
    /// The frontier was requested from an additive model
    #[error("Estimated frontier is only part of multiplicative models")]
    NoFrontier,
    /// The underlying problem rejected a component
    #[error(transparent)]
    Problem(#[from] ProblemError),
    /// The solver failed before producing a status
    #[error(transparent)]
    Solver(#[from] SolverError),
}
