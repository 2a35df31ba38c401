//! Provides struct representing an optimization problem
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::optimize::constraint::{Constraint, ConstraintSet, Expression, Term};
use crate::optimize::objective::{Objective, ObjectiveSlot};
use crate::optimize::variable::{Variable, VariableBlock, VariableBuilder, VariableId};

/// An optimization problem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Problem {
    /// Objective slot, holding the active objective and the ones it replaced
    objective: ObjectiveSlot,
    /// Variables of the optimization problem, keyed by id
    variables: IndexMap<String, Variable>,
    /// Indexed families of variables, keyed by block name
    blocks: IndexMap<String, VariableBlock>,
    /// Constraint families of the optimization problem, keyed by name
    constraints: IndexMap<String, ConstraintSet>,
}

impl Problem {
    // region Creation Functions
    /// Create a new, empty optimization problem
    pub fn new() -> Self {
        Self::default()
    }
    // endregion Creation Functions

    // region Adding Variables
    /// Add a variable to the optimization problem
    pub fn add_variable(&mut self, mut variable: Variable) -> Result<VariableId, ProblemError> {
        self.validate_variable(&variable)?;
        variable.index = self.variables.len();
        let id = variable.variable_id();
        self.variables.insert(variable.id.clone(), variable);
        Ok(id)
    }

    /// Create a block of variables sharing a name and bounds, and add it to the problem
    ///
    /// # Parameters
    /// - `name`: Name of the block, each variable gets the id `name[i]` or `name[i,j]`
    /// - `dims`: Extent of each index, one or two entries
    /// - `doc`: Description attached to every variable of the block
    /// - `lower_bound`: Lower bound of every variable
    /// - `upper_bound`: Upper bound of every variable
    ///
    /// # Examples
    /// ```rust
    /// use stonedrs_core::optimize::problem::Problem;
    /// let mut problem = Problem::new();
    /// let beta = problem
    ///     .add_variable_block("beta", &[3, 2], "slope", 0., f64::INFINITY)
    ///     .unwrap();
    /// assert_eq!(problem.num_variables(), 6);
    /// assert_eq!(problem.variable(beta.at2(1, 0)).unwrap().id, "beta[1,0]");
    /// ```
    pub fn add_variable_block(
        &mut self,
        name: &str,
        dims: &[usize],
        doc: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<VariableBlock, ProblemError> {
        if self.blocks.contains_key(name) {
            return Err(ProblemError::VariableIdAlreadyExists(name.to_string()));
        }
        if dims.is_empty() || dims.len() > 2 {
            return Err(ProblemError::InvalidBlockShape(name.to_string()));
        }
        if lower_bound > upper_bound {
            return Err(ProblemError::InvalidVariableBounds(name.to_string()));
        }
        let block = VariableBlock {
            name: name.to_string(),
            offset: self.variables.len(),
            dims: dims.to_vec(),
        };
        for index in block.multi_indices() {
            let variable = VariableBuilder::default()
                .id(block.element_id(&index))
                .name(Some(doc.to_string()))
                .lower_bound(lower_bound)
                .upper_bound(upper_bound)
                .build()
                .map_err(|e| ProblemError::InvalidVariable(e.to_string()))?;
            self.add_variable(variable)?;
        }
        self.blocks.insert(block.name.clone(), block.clone());
        Ok(block)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a family of constraints to the problem
    pub fn add_constraint_set(
        &mut self,
        constraint_set: ConstraintSet,
    ) -> Result<(), ProblemError> {
        self.validate_constraint_set(&constraint_set)?;
        self.constraints
            .insert(constraint_set.name.clone(), constraint_set);
        Ok(())
    }
    // endregion Adding Constraints

    // region Objective
    /// Install a new objective, deactivating (but keeping) the current one
    pub fn set_objective(&mut self, objective: Objective) -> Result<(), ProblemError> {
        self.validate_expression(objective.expression())
            .map_err(|_| ProblemError::NonExistentVariablesInObjective)?;
        self.objective.install(objective);
        Ok(())
    }

    /// The objective slot of the problem
    pub fn objective_slot(&self) -> &ObjectiveSlot {
        &self.objective
    }

    /// The active objective, if one has been set
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.active()
    }
    // endregion Objective

    // region Accessors
    /// Number of variables in the problem
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Total number of constraints, across all families
    pub fn num_constraints(&self) -> usize {
        self.constraints.values().map(|set| set.len()).sum()
    }

    /// Variable at the given position
    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get_index(id.0).map(|(_, var)| var)
    }

    /// Iterate over the variables in index order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    /// Block of variables with the given name
    pub fn block(&self, name: &str) -> Option<&VariableBlock> {
        self.blocks.get(name)
    }

    /// Constraint family with the given name
    pub fn constraint_set(&self, name: &str) -> Option<&ConstraintSet> {
        self.constraints.get(name)
    }

    /// Iterate over the constraint families in insertion order
    pub fn constraint_sets(&self) -> impl Iterator<Item = &ConstraintSet> {
        self.constraints.values()
    }
    // endregion Accessors

    // region Validation Functions
    /// Check that a variable to be added is valid to add to this problem
    fn validate_variable(&self, variable: &Variable) -> Result<(), ProblemError> {
        if self.variables.contains_key(&variable.id) {
            return Err(ProblemError::VariableIdAlreadyExists(variable.id.clone()));
        };
        if variable.lower_bound > variable.upper_bound {
            return Err(ProblemError::InvalidVariableBounds(variable.id.clone()));
        }
        Ok(())
    }

    /// Check that a constraint set to be added is valid to add to this Problem
    fn validate_constraint_set(&self, constraint_set: &ConstraintSet) -> Result<(), ProblemError> {
        if self.constraints.contains_key(&constraint_set.name) {
            return Err(ProblemError::ConstraintAlreadyExists(
                constraint_set.name.clone(),
            ));
        }
        for (index, constraint) in constraint_set.iter() {
            if let Constraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } = constraint
            {
                if lower_bound > upper_bound {
                    return Err(ProblemError::InvalidConstraintBounds(format!(
                        "{}{}",
                        constraint_set.name, index
                    )));
                }
            }
            self.validate_expression(constraint.expression())
                .map_err(|_| {
                    ProblemError::NonExistentVariablesInConstraint(format!(
                        "{}{}",
                        constraint_set.name, index
                    ))
                })?;
        }
        Ok(())
    }

    /// Check that every variable referenced by `expression` is part of this problem
    fn validate_expression(&self, expression: &Expression) -> Result<(), ProblemError> {
        let num_variables = self.num_variables();
        match expression.variables().find(|var| var.0 >= num_variables) {
            Some(var) => Err(ProblemError::NonExistentVariable(var.0)),
            None => Ok(()),
        }
    }
    // endregion Validation Functions

    // region Check Problem
    /// Classify the problem from the terms in its active objective and constraints
    pub fn problem_type(&self) -> ProblemType {
        let constraint_expressions = self
            .constraints
            .values()
            .flat_map(|set| set.iter().map(|(_, cons)| cons.expression()));
        let mut problem_type = ProblemType::Linear;
        for expression in constraint_expressions {
            if expression.has_log() {
                return ProblemType::Nonlinear;
            }
            if expression.has_quadratic() {
                problem_type = ProblemType::SecondOrderCone;
            }
        }
        if let Some(objective) = self.objective() {
            if objective.expression().has_log() {
                return ProblemType::Nonlinear;
            }
            if objective.expression().has_quadratic() && problem_type == ProblemType::Linear {
                problem_type = ProblemType::Quadratic;
            }
        }
        problem_type
    }

    /// Check every constraint and variable bound at `values`, returning the ids of violations
    ///
    /// A variable without a value counts as violated. Constraints are only checked when every
    /// variable has a value.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<String> {
        let mut violated = Vec::new();
        for var in self.variables.values() {
            match values.get(var.index) {
                Some(&value)
                    if value >= var.lower_bound - tolerance
                        && value <= var.upper_bound + tolerance => {}
                _ => violated.push(var.id.clone()),
            }
        }
        if values.len() < self.num_variables() {
            return violated;
        }
        for set in self.constraints.values() {
            for (index, constraint) in set.iter() {
                if !constraint.is_satisfied(values, tolerance) {
                    violated.push(format!("{}{}", set.name, index));
                }
            }
        }
        violated
    }
    // endregion Check Problem
}

/// Types of optimization problems
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemType {
    /// Problem with linear objective and constraints
    Linear,
    /// Problem with a quadratic objective and linear constraints
    Quadratic,
    /// Problem with quadratic constraints, representable with second order cones
    SecondOrderCone,
    /// Problem with logarithmic terms, requires a nonlinear programming solver
    Nonlinear,
}

/// True if `term` is the square of a single variable with a non-negative coefficient
pub(crate) fn is_separable_square(term: &Term) -> bool {
    matches!(term, Term::Quadratic { var1, var2, coef } if var1 == var2 && *coef >= 0.)
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("Tried to add a variable with the same id as an existing variable: {0}")]
    VariableIdAlreadyExists(String),
    /// Error when trying to add variable with invalid bounds
    #[error("Tried to add a variable with lower_bound>upper_bound: {0}")]
    InvalidVariableBounds(String),
    /// Error when a variable can't be built
    #[error("Tried to add an invalid variable: {0}")]
    InvalidVariable(String),
    /// Error when trying to add a block with no, or more than two, indices
    #[error("Variable blocks must have one or two indices: {0}")]
    InvalidBlockShape(String),
    /// Error when trying to add a constraint family with the same name as an existing one
    #[error("Tried to add a constraint set with the same name as an existing one: {0}")]
    ConstraintAlreadyExists(String),
    /// Error when trying to add a constraint with invalid bounds
    #[error("Tried to add an inequality constraint with lower_bound > upper_bound: {0}")]
    InvalidConstraintBounds(String),
    /// Error when trying to add a constraint that contains variables not in the model
    #[error("Tried to add a constraint with variables not in the model: {0}")]
    NonExistentVariablesInConstraint(String),
    /// Error when trying to add an objective which includes variables not in the model
    #[error("Tried adding an objective with variables not in the model")]
    NonExistentVariablesInObjective,
    /// Error when referring to a variable index that doesn't exist
    #[error("Tried to access a variable that doesn't exist: {0}")]
    NonExistentVariable(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::constraint::{Comparison, ConstraintIndex};

    fn two_variable_problem() -> Problem {
        let mut problem = Problem::new();
        problem
            .add_variable(
                VariableBuilder::default()
                    .id("x")
                    .lower_bound(0.)
                    .upper_bound(10.)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        problem
            .add_variable(VariableBuilder::default().id("y").build().unwrap())
            .unwrap();
        problem
    }

    #[test]
    fn add_variables() {
        let problem = two_variable_problem();
        assert_eq!(problem.num_variables(), 2);
        let x = problem.variable(VariableId(0)).unwrap();
        assert_eq!(x.id, "x");
        assert_eq!(x.index, 0);
        assert!((x.upper_bound - 10.).abs() < 1e-25);
        assert_eq!(problem.variable(VariableId(1)).unwrap().id, "y");
    }

    #[test]
    fn add_bad_variable() {
        let mut problem = two_variable_problem();
        let res = problem.add_variable(VariableBuilder::default().id("x").build().unwrap());
        assert_eq!(
            res,
            Err(ProblemError::VariableIdAlreadyExists("x".to_string()))
        );

        let res = problem.add_variable(
            VariableBuilder::default()
                .id("z")
                .lower_bound(100.)
                .upper_bound(64.)
                .build()
                .unwrap(),
        );
        if let Err(ProblemError::InvalidVariableBounds(_)) = res {
            // Intentionally blank
        } else {
            panic!("Invalid variable bounds not caught")
        }
    }

    #[test]
    fn add_blocks() {
        let mut problem = Problem::new();
        let alpha = problem
            .add_variable_block("alpha", &[3], "alpha", f64::NEG_INFINITY, f64::INFINITY)
            .unwrap();
        let beta = problem
            .add_variable_block("beta", &[3, 2], "beta", 0., f64::INFINITY)
            .unwrap();
        assert_eq!(problem.num_variables(), 9);
        assert_eq!(alpha.at(2), VariableId(2));
        assert_eq!(beta.at2(0, 1), VariableId(4));
        assert_eq!(problem.variable(beta.at2(2, 1)).unwrap().id, "beta[2,1]");
        assert!(problem.variable(beta.at2(2, 1)).unwrap().is_non_negative());
        assert!(problem.block("beta").is_some());

        let duplicate = problem.add_variable_block("beta", &[1], "beta", 0., 1.);
        assert!(matches!(
            duplicate,
            Err(ProblemError::VariableIdAlreadyExists(_))
        ));
        let bad_shape = problem.add_variable_block("gamma", &[1, 1, 1], "gamma", 0., 1.);
        assert!(matches!(bad_shape, Err(ProblemError::InvalidBlockShape(_))));
    }

    #[test]
    fn add_constraint_set() {
        let mut problem = two_variable_problem();
        let mut set = ConstraintSet::new("cap", "x below y");
        set.insert(
            ConstraintIndex::Single(0),
            Comparison::AtMost.apply(
                Expression::variable(VariableId(0)),
                Expression::variable(VariableId(1)),
            ),
        );
        problem.add_constraint_set(set.clone()).unwrap();
        assert_eq!(problem.num_constraints(), 1);
        assert!(problem.constraint_set("cap").is_some());

        assert!(matches!(
            problem.add_constraint_set(set),
            Err(ProblemError::ConstraintAlreadyExists(_))
        ));
    }

    #[test]
    fn add_bad_constraint() {
        let mut problem = two_variable_problem();

        let mut unknown_variable = ConstraintSet::new("unknown", "");
        unknown_variable.insert(
            ConstraintIndex::Single(0),
            Constraint::equate(Expression::variable(VariableId(7)), Expression::new()),
        );
        assert!(matches!(
            problem.add_constraint_set(unknown_variable),
            Err(ProblemError::NonExistentVariablesInConstraint(_))
        ));

        let mut inverted = ConstraintSet::new("inverted", "");
        inverted.insert(
            ConstraintIndex::Single(0),
            Constraint::Inequality {
                expression: Expression::variable(VariableId(0)),
                lower_bound: 200.,
                upper_bound: 100.,
            },
        );
        assert!(matches!(
            problem.add_constraint_set(inverted),
            Err(ProblemError::InvalidConstraintBounds(_))
        ));
    }

    #[test]
    fn problem_types() {
        let mut problem = two_variable_problem();
        problem
            .set_objective(Objective::minimize(
                "linear",
                Expression::variable(VariableId(0)),
            ))
            .unwrap();
        assert_eq!(problem.problem_type(), ProblemType::Linear);

        let mut squared = Expression::new();
        squared.add_square(VariableId(1), 1.);
        problem
            .set_objective(Objective::minimize("squared", squared.clone()))
            .unwrap();
        assert_eq!(problem.problem_type(), ProblemType::Quadratic);
        assert_eq!(problem.objective_slot().deactivated().len(), 1);

        let mut cap = ConstraintSet::new("cap", "");
        cap.insert(
            ConstraintIndex::Single(0),
            Comparison::AtMost.apply(squared, Expression::constant(4.)),
        );
        problem.add_constraint_set(cap).unwrap();
        assert_eq!(problem.problem_type(), ProblemType::SecondOrderCone);

        let mut logged = ConstraintSet::new("log", "");
        let mut log_expr = Expression::new();
        log_expr.add_shifted_log(VariableId(0), 1., 1.);
        logged.insert(
            ConstraintIndex::Single(0),
            Constraint::equate(log_expr, Expression::constant(0.)),
        );
        problem.add_constraint_set(logged).unwrap();
        assert_eq!(problem.problem_type(), ProblemType::Nonlinear);
    }

    #[test]
    fn objective_with_unknown_variable() {
        let mut problem = two_variable_problem();
        let res = problem.set_objective(Objective::minimize(
            "bad",
            Expression::variable(VariableId(3)),
        ));
        assert_eq!(res, Err(ProblemError::NonExistentVariablesInObjective));
        assert!(problem.objective().is_none());
    }

    #[test]
    fn violations() {
        let mut problem = two_variable_problem();
        let mut set = ConstraintSet::new("cap", "");
        set.insert(
            ConstraintIndex::Single(0),
            Comparison::AtMost.apply(
                Expression::variable(VariableId(0)),
                Expression::variable(VariableId(1)),
            ),
        );
        problem.add_constraint_set(set).unwrap();
        assert!(problem.violations(&[1., 2.], 1e-9).is_empty());
        assert_eq!(problem.violations(&[3., 2.], 1e-9), vec!["cap[0]".to_string()]);
        assert_eq!(
            problem.violations(&[-1., 2.], 1e-9),
            vec!["x".to_string()]
        );
        // Missing values are reported, constraints are skipped
        assert_eq!(problem.violations(&[1.], 1e-9), vec!["y".to_string()]);
        assert_eq!(
            problem.violations(&[], 1e-9),
            vec!["x".to_string(), "y".to_string()]
        );
    }
}
