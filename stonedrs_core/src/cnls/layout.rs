//! Decision variables of a convex regression model
use crate::cnls::config::CompositionMode;
use crate::optimize::constraint::Expression;
use crate::optimize::problem::{Problem, ProblemError};
use crate::optimize::variable::VariableBlock;

/// Blocks of decision variables, indexed by observation `i`, input `j` and contextual variable `k`
///
/// Allocated once per formulation and never resized.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLayout {
    /// Intercept of each observation's hyperplane, `alpha[i]`
    pub alpha: VariableBlock,
    /// Slope of each observation's hyperplane, `beta[i,j] >= 0`
    pub beta: VariableBlock,
    /// Coefficient of each contextual variable, `lambda[k]`
    pub lambda: VariableBlock,
    /// Residual, `epsilon[i]`
    pub epsilon: VariableBlock,
    /// Positive part of the residual, `epsilon_plus[i] >= 0`
    pub epsilon_plus: VariableBlock,
    /// Negative part of the residual, `epsilon_minus[i] >= 0`
    pub epsilon_minus: VariableBlock,
    /// Estimated frontier, `frontier[i] >= 0`, only for multiplicative composition
    pub frontier: Option<VariableBlock>,
    num_inputs: usize,
}

impl VariableLayout {
    /// Allocate every block in `problem`
    ///
    /// # Parameters
    /// - `problem`: Problem receiving the variables, normally empty
    /// - `n`: Number of observations
    /// - `num_inputs`: Number of inputs per observation (J)
    /// - `num_contextual`: Number of contextual variables (K), may be 0
    /// - `composition`: The frontier block only exists for multiplicative composition
    pub fn allocate(
        problem: &mut Problem,
        n: usize,
        num_inputs: usize,
        num_contextual: usize,
        composition: CompositionMode,
    ) -> Result<Self, ProblemError> {
        let free = (f64::NEG_INFINITY, f64::INFINITY);
        let non_negative = (0., f64::INFINITY);
        let mut block = |name: &str, dims: &[usize], doc: &str, (lb, ub): (f64, f64)| {
            problem.add_variable_block(name, dims, doc, lb, ub)
        };
        let alpha = block("alpha", &[n], "alpha", free)?;
        let beta = block("beta", &[n, num_inputs], "beta", non_negative)?;
        let lambda = block("lambda", &[num_contextual], "zvalue", free)?;
        let epsilon = block("epsilon", &[n], "residual", free)?;
        let epsilon_plus = block("epsilon_plus", &[n], "positive error term", non_negative)?;
        let epsilon_minus = block("epsilon_minus", &[n], "negative error term", non_negative)?;
        let frontier = match composition {
            CompositionMode::Multiplicative => {
                Some(block("frontier", &[n], "estimated frontier", non_negative)?)
            }
            CompositionMode::Additive => None,
        };
        Ok(Self {
            alpha,
            beta,
            lambda,
            epsilon,
            epsilon_plus,
            epsilon_minus,
            frontier,
            num_inputs,
        })
    }

    /// Number of observations
    pub fn num_observations(&self) -> usize {
        self.alpha.len()
    }

    /// Number of inputs per observation
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Number of contextual variables
    pub fn num_contextual(&self) -> usize {
        self.lambda.len()
    }

    /// Hyperplane of observation `owner` evaluated at the point `x`
    ///
    /// `alpha[owner] + sum_j beta[owner,j] * x[j]`, the intercept is left out when
    /// `with_intercept` is false.
    pub fn hyperplane_at(&self, owner: usize, x: &[f64], with_intercept: bool) -> Expression {
        let mut expr = Expression::new();
        if with_intercept {
            expr.add_linear(self.alpha.at(owner), 1.);
        }
        for (j, value) in x.iter().enumerate() {
            expr.add_linear(self.beta.at2(owner, j), *value);
        }
        expr
    }
}
