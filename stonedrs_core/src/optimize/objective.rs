//! Provides structs for representing an optimization problem's objective

use serde::{Deserialize, Serialize};

use crate::optimize::constraint::Expression;

/// Represents the Objective of an optimization problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    /// Name of the objective, e.g. `objective` or `squared_objective`
    pub name: String,
    /// Expression to optimize
    expression: Expression,
    /// Sense of the objective (maximize, or minimize), see [`ObjectiveSense`]
    sense: ObjectiveSense,
}

impl Objective {
    /// Create a new objective, with a given sense
    pub fn new(name: impl Into<String>, expression: Expression, sense: ObjectiveSense) -> Self {
        Self {
            name: name.into(),
            expression,
            sense,
        }
    }

    /// Create a new minimization objective
    pub fn minimize(name: impl Into<String>, expression: Expression) -> Self {
        Self::new(name, expression, ObjectiveSense::Minimize)
    }

    /// Create a new maximization objective
    pub fn maximize(name: impl Into<String>, expression: Expression) -> Self {
        Self::new(name, expression, ObjectiveSense::Maximize)
    }

    /// Expression being optimized
    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    /// Sense of the objective
    pub fn sense(&self) -> ObjectiveSense {
        self.sense
    }

    /// Change the sense of the objective
    pub fn set_sense(&mut self, sense: ObjectiveSense) {
        self.sense = sense;
    }
}

/// Represents the sense of the objective, whether it should be maximized or minimized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveSense {
    /// The objective should be minimized
    Minimize,
    /// The objective should be maximized
    Maximize,
}

/// Holds the single active objective of a problem, along with every objective it replaced
///
/// Replaced objectives are kept (deactivated) rather than dropped, so the history of how the
/// objective was assembled can be inspected. Solvers only ever see the active objective.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSlot {
    active: Option<Objective>,
    deactivated: Vec<Objective>,
}

impl ObjectiveSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `objective` as the active objective, deactivating the previous one
    pub fn install(&mut self, objective: Objective) {
        if let Some(previous) = self.active.replace(objective) {
            self.deactivated.push(previous);
        }
    }

    /// The active objective, if one has been installed
    pub fn active(&self) -> Option<&Objective> {
        self.active.as_ref()
    }

    /// Objectives that were replaced, oldest first
    pub fn deactivated(&self) -> &[Objective] {
        &self.deactivated
    }
}
