//! Implements a solver interface for Clarabel
//!
//! The problem is translated into Clarabel's standard conic form
//!
//! ```text
//! minimize    1/2 x'Px + q'x
//! subject to  Ax + s = b,  s in K
//! ```
//!
//! with equalities in the zero cone, inequalities and variable bounds in the non-negative cone,
//! and each separable quadratic cap `sum c*x^2 <= r` as a second order cone.

use ::clarabel::algebra::CscMatrix as ClarabelCsc;
use ::clarabel::solver::implementations::default::DefaultSettingsBuilder;
use ::clarabel::solver::{DefaultSolver, IPSolver, SolverStatus, SupportedConeT};
use log::{debug, info};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::configuration::Configuration;
use crate::optimize::constraint::{Constraint, Expression, Term};
use crate::optimize::objective::ObjectiveSense;
use crate::optimize::problem::{is_separable_square, Problem, ProblemType};
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::{OptimizationStatus, ProblemSolution};

const SOLVER_NAME: &str = "clarabel";

/// In process conic solver
#[derive(Debug, Clone, PartialEq)]
pub struct ClarabelSolver {
    /// Maximum interior point iterations
    pub max_iter: u32,
    /// Time limit in seconds
    pub time_limit: f64,
    /// Print solver progress
    pub verbose: bool,
}

impl ClarabelSolver {
    /// Create a solver using the settings of the process wide configuration
    pub fn from_configuration() -> Self {
        let config = Configuration::current();
        Self {
            max_iter: config.max_iter,
            time_limit: config.time_limit,
            verbose: config.verbose,
        }
    }
}

impl Default for ClarabelSolver {
    fn default() -> Self {
        Self::from_configuration()
    }
}

impl Solver for ClarabelSolver {
    fn name(&self) -> &str {
        SOLVER_NAME
    }

    fn supports(&self, problem_type: ProblemType) -> bool {
        !matches!(problem_type, ProblemType::Nonlinear)
    }

    fn solve(&self, problem: &Problem) -> Result<ProblemSolution, SolverError> {
        let problem_type = problem.problem_type();
        if !self.supports(problem_type) {
            return Err(unsupported(format!("{:?} problems", problem_type)));
        }
        let conic = ConicForm::from_problem(problem)?;
        debug!(
            "Clarabel problem: {} variables, {} rows, {} cones",
            conic.num_variables,
            conic.b.len(),
            conic.cones.len()
        );

        let settings = DefaultSettingsBuilder::default()
            .verbose(self.verbose)
            .max_iter(self.max_iter)
            .time_limit(self.time_limit)
            .build()
            .map_err(|e| SolverError::InvalidSettings(e.to_string()))?;

        // Clarabel panics on inconsistent data
        conic.check()?;
        let p = conic.quadratic_matrix();
        let a = conic.constraint_matrix();
        let mut solver = DefaultSolver::new(&p, &conic.q, &a, &conic.b, &conic.cones, settings);
        solver.solve();

        let status = map_status(solver.solution.status);
        info!("Clarabel finished with status {}", status);
        Ok(match status {
            OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal => ProblemSolution {
                status,
                objective_value: Some(
                    conic.objective_sign * solver.solution.obj_val + conic.objective_constant,
                ),
                variable_values: Some(solver.solution.x.clone()),
            },
            _ => ProblemSolution::status_only(status),
        })
    }
}

fn unsupported(reason: String) -> SolverError {
    SolverError::UnsupportedProblem {
        solver: SOLVER_NAME.to_string(),
        reason,
    }
}

fn setup_failed(reason: String) -> SolverError {
    SolverError::SetupFailed(reason)
}

fn cone_dimension(cone: &SupportedConeT<f64>) -> usize {
    match *cone {
        SupportedConeT::ZeroConeT(dim)
        | SupportedConeT::NonnegativeConeT(dim)
        | SupportedConeT::SecondOrderConeT(dim) => dim,
        // Never produced by ConicForm
        _ => 0,
    }
}

fn map_status(status: SolverStatus) -> OptimizationStatus {
    match status {
        SolverStatus::Solved => OptimizationStatus::Optimal,
        SolverStatus::AlmostSolved => OptimizationStatus::AlmostOptimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            OptimizationStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
            OptimizationStatus::Unbounded
        }
        SolverStatus::MaxIterations
        | SolverStatus::MaxTime
        | SolverStatus::InsufficientProgress => OptimizationStatus::SolverHalted,
        SolverStatus::NumericalError => OptimizationStatus::NumericalError,
        SolverStatus::Unsolved => OptimizationStatus::Unoptimized,
        #[allow(unreachable_patterns)]
        _ => OptimizationStatus::Unknown,
    }
}

/// One row block of `Ax + s = b`, with its non-zero entries of `A`
struct Row {
    entries: Vec<(usize, f64)>,
    b: f64,
}

/// Problem data in Clarabel's standard form, before sparse assembly
struct ConicForm {
    num_variables: usize,
    /// Upper triangular entries of `P`
    p_entries: Vec<(usize, usize, f64)>,
    q: Vec<f64>,
    b: Vec<f64>,
    a_entries: Vec<(usize, usize, f64)>,
    cones: Vec<SupportedConeT<f64>>,
    /// -1 when a maximization was negated into a minimization
    objective_sign: f64,
    objective_constant: f64,
}

impl ConicForm {
    fn from_problem(problem: &Problem) -> Result<Self, SolverError> {
        let objective = problem.objective().ok_or(SolverError::MissingObjective)?;
        let num_variables = problem.num_variables();
        let objective_sign = match objective.sense() {
            ObjectiveSense::Minimize => 1.,
            ObjectiveSense::Maximize => -1.,
        };

        let mut q = vec![0.; num_variables];
        let mut p_entries = Vec::new();
        for term in objective.expression().terms() {
            match *term {
                Term::Linear { var, coef } => q[var.0] += objective_sign * coef,
                Term::Quadratic { var1, var2, coef } => {
                    let (row, col) = (var1.0.min(var2.0), var1.0.max(var2.0));
                    // 1/2 x'Px doubles the diagonal
                    let scale = if row == col { 2. } else { 1. };
                    p_entries.push((row, col, objective_sign * scale * coef));
                }
                Term::ShiftedLog { .. } => {
                    return Err(unsupported("logarithmic objective terms".to_string()))
                }
            }
        }

        let mut zero_rows = Vec::new();
        let mut nonnegative_rows = Vec::new();
        let mut cone_blocks: Vec<Vec<Row>> = Vec::new();

        for set in problem.constraint_sets() {
            for (index, constraint) in set.iter() {
                let expression = constraint.expression();
                if expression.is_linear() {
                    push_linear_rows(constraint, &mut zero_rows, &mut nonnegative_rows);
                } else {
                    let block = second_order_block(constraint).ok_or_else(|| {
                        unsupported(format!("constraint {}{} is not conic", set.name, index))
                    })?;
                    cone_blocks.push(block);
                }
            }
        }

        for var in problem.variables() {
            let column = var.variable_id().0;
            if var.lower_bound.is_finite() {
                nonnegative_rows.push(Row {
                    entries: vec![(column, -1.)],
                    b: -var.lower_bound,
                });
            }
            if var.upper_bound.is_finite() {
                nonnegative_rows.push(Row {
                    entries: vec![(column, 1.)],
                    b: var.upper_bound,
                });
            }
        }

        let mut cones = Vec::new();
        if !zero_rows.is_empty() {
            cones.push(SupportedConeT::ZeroConeT(zero_rows.len()));
        }
        if !nonnegative_rows.is_empty() {
            cones.push(SupportedConeT::NonnegativeConeT(nonnegative_rows.len()));
        }
        for block in &cone_blocks {
            cones.push(SupportedConeT::SecondOrderConeT(block.len()));
        }

        let rows = zero_rows
            .into_iter()
            .chain(nonnegative_rows)
            .chain(cone_blocks.into_iter().flatten());
        let mut b = Vec::new();
        let mut a_entries = Vec::new();
        for (row_index, row) in rows.enumerate() {
            b.push(row.b);
            a_entries.extend(
                row.entries
                    .into_iter()
                    .filter(|(_, value)| *value != 0.)
                    .map(|(column, value)| (row_index, column, value)),
            );
        }

        Ok(Self {
            num_variables,
            p_entries,
            q,
            b,
            a_entries,
            cones,
            objective_sign,
            objective_constant: objective.expression().constant_value(),
        })
    }

    /// Check dimensions and finiteness of the problem data
    fn check(&self) -> Result<(), SolverError> {
        let n = self.num_variables;
        let m = self.b.len();
        if self.q.len() != n {
            return Err(setup_failed(format!(
                "objective has {} coefficients for {} variables",
                self.q.len(),
                n
            )));
        }
        let cone_rows: usize = self.cones.iter().map(cone_dimension).sum();
        if cone_rows != m {
            return Err(setup_failed(format!(
                "cones cover {} rows but the constraint matrix has {}",
                cone_rows, m
            )));
        }
        let out_of_range = |entries: &[(usize, usize, f64)], rows: usize| {
            entries.iter().any(|&(row, col, _)| row >= rows || col >= n)
        };
        if out_of_range(&self.p_entries, n) || out_of_range(&self.a_entries, m) {
            return Err(setup_failed("matrix entry out of range".to_string()));
        }
        let finite = self.q.iter().chain(&self.b).all(|v| v.is_finite())
            && self
                .p_entries
                .iter()
                .chain(&self.a_entries)
                .all(|(_, _, v)| v.is_finite());
        if !finite {
            return Err(setup_failed("non-finite problem data".to_string()));
        }
        Ok(())
    }

    fn quadratic_matrix(&self) -> ClarabelCsc<f64> {
        to_clarabel(self.num_variables, self.num_variables, &self.p_entries)
    }

    fn constraint_matrix(&self) -> ClarabelCsc<f64> {
        to_clarabel(self.b.len(), self.num_variables, &self.a_entries)
    }
}

/// Rows of the zero and non-negative cones for a linear constraint
fn push_linear_rows(
    constraint: &Constraint,
    zero_rows: &mut Vec<Row>,
    nonnegative_rows: &mut Vec<Row>,
) {
    let coefficients = linear_entries(constraint.expression());
    match *constraint {
        Constraint::Equality { equals, .. } => zero_rows.push(Row {
            entries: coefficients,
            b: equals,
        }),
        Constraint::Inequality {
            lower_bound,
            upper_bound,
            ..
        } => {
            if upper_bound.is_finite() {
                nonnegative_rows.push(Row {
                    entries: coefficients.clone(),
                    b: upper_bound,
                });
            }
            if lower_bound.is_finite() {
                nonnegative_rows.push(Row {
                    entries: coefficients.iter().map(|&(c, v)| (c, -v)).collect(),
                    b: -lower_bound,
                });
            }
        }
    }
}

fn linear_entries(expression: &Expression) -> Vec<(usize, f64)> {
    expression
        .terms()
        .iter()
        .filter_map(|term| match *term {
            Term::Linear { var, coef } => Some((var.0, coef)),
            _ => None,
        })
        .collect()
}

/// Second order cone rows for `sum c_k * x_k^2 <= r`
///
/// The slack is `(sqrt(r), sqrt(c_1) x_1, ...)`, whose cone membership is exactly the cap.
/// Returns None if the constraint is not of that form.
fn second_order_block(constraint: &Constraint) -> Option<Vec<Row>> {
    let (expression, radius_squared) = match *constraint {
        Constraint::Inequality {
            ref expression,
            lower_bound,
            upper_bound,
        } if lower_bound.is_infinite() && upper_bound.is_finite() && upper_bound >= 0. => {
            (expression, upper_bound)
        }
        _ => return None,
    };
    if !expression.terms().iter().all(is_separable_square) {
        return None;
    }
    let mut block = vec![Row {
        entries: Vec::new(),
        b: radius_squared.sqrt(),
    }];
    for term in expression.terms() {
        if let Term::Quadratic { var1, coef, .. } = *term {
            block.push(Row {
                entries: vec![(var1.0, -coef.sqrt())],
                b: 0.,
            });
        }
    }
    Some(block)
}

/// Assemble triplets (summing duplicates) into Clarabel's compressed column format
fn to_clarabel(rows: usize, cols: usize, entries: &[(usize, usize, f64)]) -> ClarabelCsc<f64> {
    let mut coo = CooMatrix::new(rows, cols);
    for &(row, col, value) in entries {
        coo.push(row, col, value);
    }
    let csc = CscMatrix::from(&coo);
    let (col_offsets, row_indices, values) = csc.disassemble();
    ClarabelCsc::new(rows, cols, col_offsets, row_indices, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::constraint::{Comparison, ConstraintIndex, ConstraintSet};
    use crate::optimize::objective::Objective;
    use crate::optimize::variable::VariableId;
    use approx::assert_abs_diff_eq;

    fn solver() -> ClarabelSolver {
        ClarabelSolver {
            max_iter: 200,
            time_limit: f64::INFINITY,
            verbose: false,
        }
    }

    #[test]
    fn linear_program() {
        // minimize -x - y subject to x + y <= 4, x <= 3, x, y >= 0
        let mut problem = Problem::new();
        let xy = problem
            .add_variable_block("xy", &[2], "x and y", 0., f64::INFINITY)
            .unwrap();
        let mut objective = Expression::new();
        objective.add_linear(xy.at(0), -1.).add_linear(xy.at(1), -1.);
        problem
            .set_objective(Objective::minimize("value", objective))
            .unwrap();

        let mut total = Expression::new();
        total.add_linear(xy.at(0), 1.).add_linear(xy.at(1), 1.);
        let mut set = ConstraintSet::new("limits", "");
        set.insert(
            ConstraintIndex::Single(0),
            Comparison::AtMost.apply(total, Expression::constant(4.)),
        );
        set.insert(
            ConstraintIndex::Single(1),
            Comparison::AtMost.apply(Expression::variable(xy.at(0)), Expression::constant(3.)),
        );
        problem.add_constraint_set(set).unwrap();

        let solution = solver().solve(&problem).unwrap();
        assert_eq!(solution.status, OptimizationStatus::Optimal);
        assert_abs_diff_eq!(solution.objective_value.unwrap(), -4., epsilon = 1e-6);
        let values = solution.variable_values.unwrap();
        assert!(problem.violations(&values, 1e-6).is_empty());
    }

    #[test]
    fn quadratic_objective_with_equality() {
        // minimize x^2 + y^2 subject to x + y = 2
        let mut problem = Problem::new();
        let xy = problem
            .add_variable_block("xy", &[2], "x and y", f64::NEG_INFINITY, f64::INFINITY)
            .unwrap();
        let mut objective = Expression::new();
        objective.add_square(xy.at(0), 1.).add_square(xy.at(1), 1.);
        problem
            .set_objective(Objective::minimize("squares", objective))
            .unwrap();
        let mut total = Expression::new();
        total.add_linear(xy.at(0), 1.).add_linear(xy.at(1), 1.);
        let mut set = ConstraintSet::new("sum", "");
        set.insert(
            ConstraintIndex::Single(0),
            Constraint::equate(total, Expression::constant(2.)),
        );
        problem.add_constraint_set(set).unwrap();

        let solution = solver().solve(&problem).unwrap();
        let values = solution.variable_values.unwrap();
        assert_abs_diff_eq!(values[0], 1., epsilon = 1e-5);
        assert_abs_diff_eq!(values[1], 1., epsilon = 1e-5);
        assert_abs_diff_eq!(solution.objective_value.unwrap(), 2., epsilon = 1e-5);
    }

    #[test]
    fn second_order_cap() {
        // maximize x + y subject to x^2 + y^2 <= 2
        let mut problem = Problem::new();
        let xy = problem
            .add_variable_block("xy", &[2], "x and y", f64::NEG_INFINITY, f64::INFINITY)
            .unwrap();
        let mut objective = Expression::new();
        objective.add_linear(xy.at(0), 1.).add_linear(xy.at(1), 1.);
        problem
            .set_objective(Objective::maximize("value", objective))
            .unwrap();
        let mut squares = Expression::new();
        squares.add_square(xy.at(0), 1.).add_square(xy.at(1), 1.);
        let mut set = ConstraintSet::new("cap", "");
        set.insert(
            ConstraintIndex::Single(0),
            Comparison::AtMost.apply(squares, Expression::constant(2.)),
        );
        problem.add_constraint_set(set).unwrap();

        let solution = solver().solve(&problem).unwrap();
        assert_abs_diff_eq!(solution.objective_value.unwrap(), 2., epsilon = 1e-5);
    }

    #[test]
    fn reject_logarithms() {
        let mut problem = Problem::new();
        let f = problem
            .add_variable_block("f", &[1], "frontier", 0., f64::INFINITY)
            .unwrap();
        problem
            .set_objective(Objective::minimize("zero", Expression::variable(f.at(0))))
            .unwrap();
        let mut logged = Expression::new();
        logged.add_shifted_log(f.at(0), 1., 1.);
        let mut set = ConstraintSet::new("log", "");
        set.insert(
            ConstraintIndex::Single(0),
            Constraint::equate(logged, Expression::constant(1.)),
        );
        problem.add_constraint_set(set).unwrap();
        assert!(matches!(
            solver().solve(&problem),
            Err(SolverError::UnsupportedProblem { .. })
        ));
    }

    #[test]
    fn missing_objective() {
        let mut problem = Problem::new();
        problem
            .add_variable_block("x", &[1], "x", 0., 1.)
            .unwrap();
        assert!(matches!(
            solver().solve(&problem),
            Err(SolverError::MissingObjective)
        ));
    }

    #[test]
    fn sparse_assembly_sums_duplicates() {
        let matrix = to_clarabel(2, 2, &[(0, 1, 1.), (0, 1, 2.), (1, 0, 4.)]);
        assert_eq!(matrix.m, 2);
        assert_eq!(matrix.n, 2);
        assert_eq!(matrix.get_entry((0, 1)), Some(3.));
        assert_eq!(matrix.get_entry((1, 0)), Some(4.));
        assert_eq!(matrix.get_entry((0, 0)), None);
    }

    #[test]
    fn inconsistent_data_fails_setup() {
        let mut conic = ConicForm {
            num_variables: 1,
            p_entries: Vec::new(),
            q: vec![1.],
            b: vec![1., 2.],
            a_entries: vec![(0, 0, 1.), (1, 0, -1.)],
            cones: vec![SupportedConeT::NonnegativeConeT(2)],
            objective_sign: 1.,
            objective_constant: 0.,
        };
        assert!(conic.check().is_ok());

        conic.cones = vec![SupportedConeT::NonnegativeConeT(1)];
        assert!(matches!(conic.check(), Err(SolverError::SetupFailed(_))));

        conic.cones = vec![SupportedConeT::NonnegativeConeT(2)];
        conic.a_entries.push((0, 3, 1.));
        assert!(matches!(conic.check(), Err(SolverError::SetupFailed(_))));

        conic.a_entries.pop();
        conic.q = vec![f64::NAN];
        assert!(matches!(conic.check(), Err(SolverError::SetupFailed(_))));
    }

    #[test]
    fn non_separable_caps_are_rejected() {
        let mut cross = Expression::new();
        cross.add_linear(VariableId(0), 1.).add_square(VariableId(1), 1.);
        let cons = Comparison::AtMost.apply(cross, Expression::constant(1.));
        assert!(second_order_block(&cons).is_none());
    }
}
