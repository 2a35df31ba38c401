//! Hand off of problems to an external solving service
//!
//! The service itself (a remote queue, an out of process solver, ...) is supplied by the caller
//! through [`SolverService`]. This module only packages the problem, picks the backend name and
//! passes the returned solution through untouched.
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::optimize::problem::{Problem, ProblemType};
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::ProblemSolution;

/// An external solving service
///
/// Implementations block until the service answers. Retries and timeouts are the
/// implementation's own business.
pub trait SolverService: Send + Sync {
    /// Submit a request and wait for the solution
    fn submit(&self, request: &SolveRequest<'_>) -> Result<ProblemSolution, SolverError>;
}

/// Everything sent to the solving service
#[derive(Debug, Clone, Serialize)]
pub struct SolveRequest<'a> {
    /// Backend the service should run, e.g. `mosek` or `knitro`
    pub solver: &'a str,
    /// Contact address required by the service queue
    pub email: &'a str,
    /// The complete problem
    pub problem: &'a Problem,
}

impl SolveRequest<'_> {
    /// Serialize the request as JSON
    pub fn to_json(&self) -> Result<String, SolverError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode a JSON encoded [`ProblemSolution`], as returned by services speaking JSON
pub fn decode_solution(body: &str) -> Result<ProblemSolution, SolverError> {
    Ok(serde_json::from_str(body)?)
}

/// Solver forwarding problems to a [`SolverService`]
#[derive(Clone)]
pub struct RemoteSolver {
    service: Arc<dyn SolverService>,
    email: String,
    solver: Option<String>,
}

impl RemoteSolver {
    /// Create a remote solver, validating the contact address
    ///
    /// # Examples
    /// ```rust
    /// use std::sync::Arc;
    /// use stonedrs_core::optimize::solvers::remote::{RemoteSolver, SolveRequest, SolverService};
    /// use stonedrs_core::optimize::solvers::SolverError;
    /// use stonedrs_core::optimize::{OptimizationStatus, ProblemSolution};
    ///
    /// struct Offline;
    /// impl SolverService for Offline {
    ///     fn submit(&self, _: &SolveRequest<'_>) -> Result<ProblemSolution, SolverError> {
    ///         Ok(ProblemSolution::status_only(OptimizationStatus::Unknown))
    ///     }
    /// }
    ///
    /// assert!(RemoteSolver::new(Arc::new(Offline), "someone@example.org").is_ok());
    /// assert!(RemoteSolver::new(Arc::new(Offline), "not-an-address").is_err());
    /// ```
    pub fn new(service: Arc<dyn SolverService>, email: &str) -> Result<Self, SolverError> {
        if !is_valid_email(email) {
            return Err(SolverError::InvalidEmail(email.to_string()));
        }
        Ok(Self {
            service,
            email: email.to_string(),
            solver: None,
        })
    }

    /// Force a specific backend, overriding any default chosen later
    pub fn with_solver(mut self, solver: &str) -> Self {
        self.solver = Some(solver.to_string());
        self
    }

    /// Use `solver` unless a backend was already forced
    pub fn or_solver(mut self, solver: &str) -> Self {
        if self.solver.is_none() {
            self.solver = Some(solver.to_string());
        }
        self
    }

    /// Backend that will be requested, if one is selected
    pub fn solver(&self) -> Option<&str> {
        self.solver.as_deref()
    }

    /// Contact address sent with every request
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl Debug for RemoteSolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSolver")
            .field("email", &self.email)
            .field("solver", &self.solver)
            .finish()
    }
}

impl Solver for RemoteSolver {
    fn name(&self) -> &str {
        self.solver.as_deref().unwrap_or("unselected")
    }

    fn supports(&self, _problem_type: ProblemType) -> bool {
        // Capability is decided by the service
        true
    }

    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let solver = self.solver.as_deref().ok_or(SolverError::NoSolverSelected)?;
        info!("Submitting problem to solving service with {} solver", solver);
        let request = SolveRequest {
            solver,
            email: &self.email,
            problem,
        };
        self.service.submit(&request)
    }
}

/// Check that `address` looks like `local@domain.tld`
fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty() && !tld.is_empty() && tld.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}
