//! Solver interfaces for optimization problems
//!
//! A [`Solver`] receives a whole [`Problem`] and hands back a [`ProblemSolution`]. Two paths are
//! provided: [`clarabel::ClarabelSolver`] solves conic problems in process, and
//! [`remote::RemoteSolver`] forwards the problem to an external solving service.

pub mod clarabel;
pub mod remote;

use thiserror::Error;

use crate::optimize::problem::{Problem, ProblemType};
use crate::optimize::ProblemSolution;

/// Interface shared by every solving path
pub trait Solver {
    /// Name of the solver backend, e.g. `clarabel` or `mosek`
    fn name(&self) -> &str;

    /// Check if the solver can handle problems of the given type
    fn supports(&self, problem_type: ProblemType) -> bool;

    /// Solve the problem, blocking until the backend returns
    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError>;
}

/// Errors raised while handing a problem to a solver
#[derive(Error, Debug)]
pub enum SolverError {
    /// The problem contains terms the solver can't represent
    #[error("Problem is not supported by {solver}: {reason}")]
    UnsupportedProblem {
        /// Name of the solver
        solver: String,
        /// What could not be represented
        reason: String,
    },
    /// The problem has no active objective
    #[error("Problem has no active objective")]
    MissingObjective,
    /// The solver settings were rejected
    #[error("Invalid solver settings: {0}")]
    InvalidSettings(String),
    /// The solver could not be set up with the problem data
    #[error("Solver setup failed: {0}")]
    SetupFailed(String),
    /// The contact address for the solving service is malformed
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    /// No solver name was selected for the solving service
    #[error("No solver selected for the solving service")]
    NoSolverSelected,
    /// The solving service failed to answer
    #[error("Solving service failed: {0}")]
    Service(String),
    /// The request or response could not be (de)serialized
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
