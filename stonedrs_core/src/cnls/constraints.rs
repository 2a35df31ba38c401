//! Constraint families of convex regression models
//!
//! Every family is generated by a pure rule function taking a [`RuleContext`] and an
//! observation index `i` (or a pair `(i, h)` for sweet-spot cuts). Rules return `None` for
//! pairs that generate no constraint, so skipped pairs never reach the problem.
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::cnls::config::{CompositionMode, ModelConfig, ReturnsToScale};
use crate::cnls::layout::VariableLayout;
use crate::cnls::FormulationError;
use crate::data::{ActiveSetMatrix, ObservationSet};
use crate::optimize::constraint::{Constraint, ConstraintIndex, ConstraintSet, Expression};

/// Named family of constraints in a formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintFamily {
    /// `epsilon[i] == epsilon_plus[i] - epsilon_minus[i]`
    ErrorDecomposition,
    /// Links the output to the frontier, the contextual variables and the residual
    Regression,
    /// Links the frontier to the hyperplane of each observation, multiplicative only
    LogLink,
    /// Each observation against its cyclic successor
    Afriat,
    /// Cutting planes selected by the cut-active matrix
    SweetSpot,
    /// Cutting planes selected by the active matrix
    SweetSpotRefined,
    /// Cap on the squared norm of each observation's slopes
    LipschitzNorm,
}

impl ConstraintFamily {
    /// Every family, in the order they are added to a formulation
    pub const ALL: [ConstraintFamily; 7] = [
        ConstraintFamily::ErrorDecomposition,
        ConstraintFamily::Regression,
        ConstraintFamily::LogLink,
        ConstraintFamily::Afriat,
        ConstraintFamily::SweetSpot,
        ConstraintFamily::SweetSpotRefined,
        ConstraintFamily::LipschitzNorm,
    ];

    /// Name of the constraint set holding this family
    pub fn name(self) -> &'static str {
        match self {
            ConstraintFamily::ErrorDecomposition => "error_decomposition",
            ConstraintFamily::Regression => "regression",
            ConstraintFamily::LogLink => "log_link",
            ConstraintFamily::Afriat => "afriat",
            ConstraintFamily::SweetSpot => "sweet_spot",
            ConstraintFamily::SweetSpotRefined => "sweet_spot_refined",
            ConstraintFamily::LipschitzNorm => "lipschitz_norm",
        }
    }

    /// Short description stored with the constraint set
    pub fn doc(self) -> &'static str {
        match self {
            ConstraintFamily::ErrorDecomposition => "decompose error term",
            ConstraintFamily::Regression => "regression equation",
            ConstraintFamily::LogLink => "log-transformed regression equation",
            ConstraintFamily::Afriat => "elementary Afriat approach",
            ConstraintFamily::SweetSpot => "sweet spot approach",
            ConstraintFamily::SweetSpotRefined => "sweet spot-2 approach",
            ConstraintFamily::LipschitzNorm => "Lipschitz norm",
        }
    }
}

impl Display for ConstraintFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything a rule reads, passed explicitly
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub data: &'a ObservationSet,
    pub layout: &'a VariableLayout,
    pub config: &'a ModelConfig,
}

impl RuleContext<'_> {
    fn unsupported(&self, family: ConstraintFamily) -> FormulationError {
        FormulationError::UnsupportedConfiguration {
            family,
            composition: self.config.composition,
            returns_to_scale: self.config.returns_to_scale,
        }
    }

    /// Fail for additive composition under constant returns to scale, which has no formulation
    fn require_formulated(&self, family: ConstraintFamily) -> Result<(), FormulationError> {
        match (self.config.composition, self.config.returns_to_scale) {
            (CompositionMode::Additive, ReturnsToScale::Constant) => Err(self.unsupported(family)),
            _ => Ok(()),
        }
    }

    fn inputs_of(&self, i: usize) -> Vec<f64> {
        self.data.inputs().row(i).iter().copied().collect()
    }

    /// Hyperplane of observation `owner` evaluated at the inputs of observation `at`
    fn hyperplane(&self, owner: usize, at: usize) -> Expression {
        self.layout.hyperplane_at(
            owner,
            &self.inputs_of(at),
            self.config.returns_to_scale.has_intercept(),
        )
    }

    /// `sum_k lambda[k] * z[i][k]`
    fn contextual_effect(&self, i: usize) -> Expression {
        let mut expr = Expression::new();
        for k in 0..self.data.num_contextual() {
            expr.add_linear(self.layout.lambda.at(k), self.data.contextual(i, k));
        }
        expr
    }

    /// Observation `i`'s fitted value compared with observation `h`'s hyperplane at `x[i]`
    fn concavity(&self, i: usize, h: usize) -> Constraint {
        self.config
            .direction
            .comparison()
            .apply(self.hyperplane(i, i), self.hyperplane(h, i))
    }
}

/// `epsilon[i] == epsilon_plus[i] - epsilon_minus[i]`
pub fn error_decomposition_rule(ctx: &RuleContext<'_>, i: usize) -> Constraint {
    let layout = ctx.layout;
    let mut parts = Expression::new();
    parts
        .add_linear(layout.epsilon_plus.at(i), 1.)
        .add_linear(layout.epsilon_minus.at(i), -1.);
    Constraint::equate(Expression::variable(layout.epsilon.at(i)), parts)
}

/// Regression equation of observation `i`
///
/// - Additive: `y[i] == alpha[i] + sum_j beta[i,j] * x[i][j] + sum_k lambda[k] * z[i][k] + epsilon[i]`
/// - Multiplicative: `ln y[i] == ln(frontier[i] + 1) + sum_k lambda[k] * z[i][k] + epsilon[i]`
pub fn regression_rule(ctx: &RuleContext<'_>, i: usize) -> Result<Constraint, FormulationError> {
    let family = ConstraintFamily::Regression;
    ctx.require_formulated(family)?;
    let layout = ctx.layout;
    let y = ctx.data.output(i);
    let (lhs, mut rhs) = match ctx.config.composition {
        CompositionMode::Additive => (Expression::constant(y), ctx.hyperplane(i, i)),
        CompositionMode::Multiplicative => {
            let frontier = layout.frontier.as_ref().ok_or_else(|| ctx.unsupported(family))?;
            let mut rhs = Expression::new();
            rhs.add_shifted_log(frontier.at(i), 1., 1.);
            (Expression::constant(y.ln()), rhs)
        }
    };
    rhs.add_scaled(&ctx.contextual_effect(i), 1.)
        .add_linear(layout.epsilon.at(i), 1.);
    Ok(Constraint::equate(lhs, rhs))
}

/// `frontier[i] == alpha[i] + sum_j beta[i,j] * x[i][j] - 1`, without `alpha[i]` under
/// constant returns to scale
pub fn log_link_rule(ctx: &RuleContext<'_>, i: usize) -> Result<Constraint, FormulationError> {
    let frontier = ctx
        .layout
        .frontier
        .as_ref()
        .ok_or_else(|| ctx.unsupported(ConstraintFamily::LogLink))?;
    let mut rhs = ctx.hyperplane(i, i);
    rhs.add_constant(-1.);
    Ok(Constraint::equate(Expression::variable(frontier.at(i)), rhs))
}

/// Observation `i` against its cyclic successor `(i + 1) mod N`
pub fn afriat_rule(ctx: &RuleContext<'_>, i: usize) -> Result<Constraint, FormulationError> {
    ctx.require_formulated(ConstraintFamily::Afriat)?;
    let next = (i + 1) % ctx.data.len();
    Ok(ctx.concavity(i, next))
}

/// Observation `i` against observation `h`, if the pair is active in `matrix`
///
/// Pairs with `i == h` or an inactive entry are skipped.
pub fn sweet_spot_rule(
    ctx: &RuleContext<'_>,
    family: ConstraintFamily,
    matrix: &ActiveSetMatrix,
    i: usize,
    h: usize,
) -> Result<Option<Constraint>, FormulationError> {
    ctx.require_formulated(family)?;
    if !matrix.is_active(i, h) {
        return Ok(None);
    }
    Ok(Some(ctx.concavity(i, h)))
}

/// Build the constraint set of `family`
///
/// Sweet-spot families read `matrix`, which must be given for them. The Lipschitz norm depends
/// on the objective and is built by [`lipschitz_caps`](crate::cnls::objective::lipschitz_caps).
pub fn build_constraint_family(
    family: ConstraintFamily,
    ctx: &RuleContext<'_>,
    matrix: Option<&ActiveSetMatrix>,
) -> Result<ConstraintSet, FormulationError> {
    let n = ctx.data.len();
    let mut set = ConstraintSet::new(family.name(), family.doc());
    match family {
        ConstraintFamily::ErrorDecomposition => {
            for i in 0..n {
                set.insert(ConstraintIndex::Single(i), error_decomposition_rule(ctx, i));
            }
        }
        ConstraintFamily::Regression => {
            for i in 0..n {
                set.insert(ConstraintIndex::Single(i), regression_rule(ctx, i)?);
            }
        }
        ConstraintFamily::LogLink => {
            for i in 0..n {
                set.insert(ConstraintIndex::Single(i), log_link_rule(ctx, i)?);
            }
        }
        ConstraintFamily::Afriat => {
            for i in 0..n {
                set.insert(ConstraintIndex::Single(i), afriat_rule(ctx, i)?);
            }
        }
        ConstraintFamily::SweetSpot | ConstraintFamily::SweetSpotRefined => {
            let matrix = matrix.ok_or_else(|| {
                FormulationError::InvalidConfiguration(format!(
                    "the {} constraint needs an active set matrix",
                    family
                ))
            })?;
            ctx.require_formulated(family)?;
            for (i, h) in matrix.active_pairs() {
                if let Some(cut) = sweet_spot_rule(ctx, family, matrix, i, h)? {
                    set.insert(ConstraintIndex::Pair(i, h), cut);
                }
            }
        }
        ConstraintFamily::LipschitzNorm => {
            return Ok(crate::cnls::objective::lipschitz_caps(
                ctx.layout,
                ctx.config.eta,
            ));
        }
    }
    Ok(set)
}
