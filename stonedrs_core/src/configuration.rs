//! Process wide defaults used when building and solving formulations
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Serialize};

pub static CONFIGURATION: LazyLock<RwLock<Configuration>> =
    LazyLock::new(|| RwLock::new(Configuration::default()));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Tolerance used when checking feasibility of solved points
    pub tolerance: f64,
    /// Solving path used by formulations that were not given one explicitly
    pub solve_route: SolveRouteKind,
    /// Maximum interior point iterations for the local solver
    pub max_iter: u32,
    /// Time limit, in seconds, for the local solver
    pub time_limit: f64,
    /// Print solver progress
    pub verbose: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            tolerance: 1e-07,
            solve_route: SolveRouteKind::Local,
            max_iter: 200,
            time_limit: f64::INFINITY,
            verbose: false,
        }
    }
}

impl Configuration {
    /// Copy of the current process wide configuration
    ///
    /// A poisoned lock still holds a usable configuration, so it is read regardless.
    pub fn current() -> Configuration {
        match CONFIGURATION.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Enum used to specify the default solving path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveRouteKind {
    /// Solve in process with the Clarabel conic solver
    Local,
    /// Solve with an external solving service, which must be supplied to each formulation
    Remote,
}
