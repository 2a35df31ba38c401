//! Objective selection: quantile or expectile loss, optionally penalized on the slopes
use log::debug;

use crate::cnls::config::{LossType, ModelConfig, PenaltyNorm};
use crate::cnls::constraints::ConstraintFamily;
use crate::cnls::layout::VariableLayout;
use crate::cnls::FormulationError;
use crate::optimize::constraint::{Comparison, ConstraintIndex, ConstraintSet, Expression};
use crate::optimize::objective::Objective;
use crate::optimize::problem::Problem;

/// `tau * sum(e+) + (1 - tau) * sum(e-)`, each residual part squared for expectiles
pub fn loss_expression(layout: &VariableLayout, loss: LossType, tau: f64) -> Expression {
    let mut expr = Expression::new();
    let parts = [
        (&layout.epsilon_plus, tau),
        (&layout.epsilon_minus, 1. - tau),
    ];
    for (block, weight) in parts {
        for var in block.ids() {
            match loss {
                LossType::Quantile => expr.add_linear(var, weight),
                LossType::Expectile => expr.add_square(var, weight),
            };
        }
    }
    expr
}

/// `eta * sum(beta)` for L1, `eta * sum(beta^2)` for L2; None for the Lipschitz norm,
/// which caps the slopes with constraints instead
pub fn penalty_expression(
    layout: &VariableLayout,
    norm: PenaltyNorm,
    eta: f64,
) -> Option<Expression> {
    let mut expr = Expression::new();
    for var in layout.beta.ids() {
        match norm {
            PenaltyNorm::L1 => expr.add_linear(var, eta),
            PenaltyNorm::L2 => expr.add_square(var, eta),
            PenaltyNorm::Lipschitz => return None,
        };
    }
    Some(expr)
}

/// Unpenalized objective of the model
pub fn loss_objective(layout: &VariableLayout, config: &ModelConfig) -> Objective {
    let name = match config.loss {
        LossType::Quantile => "objective",
        LossType::Expectile => "squared_objective",
    };
    Objective::minimize(name, loss_expression(layout, config.loss, config.tau))
}

/// Lipschitz norm cap on every observation's slopes: `sum_j beta[i,j]^2 <= eta^2`
pub fn lipschitz_caps(layout: &VariableLayout, eta: f64) -> ConstraintSet {
    let family = ConstraintFamily::LipschitzNorm;
    let mut set = ConstraintSet::new(family.name(), family.doc());
    for i in 0..layout.num_observations() {
        let mut squares = Expression::new();
        for j in 0..layout.num_inputs() {
            squares.add_square(layout.beta.at2(i, j), 1.);
        }
        set.insert(
            ConstraintIndex::Single(i),
            Comparison::AtMost.apply(squares, Expression::constant(eta * eta)),
        );
    }
    set
}

/// Install the objective selected by `config` in `problem`
///
/// The unpenalized loss is always installed first. An L1 or L2 penalty then installs the
/// penalized objective, which deactivates the loss. A Lipschitz penalty keeps the loss active
/// and adds the cap constraints instead.
pub fn install_objective(
    problem: &mut Problem,
    layout: &VariableLayout,
    config: &ModelConfig,
) -> Result<(), FormulationError> {
    let base = loss_objective(layout, config);
    problem.set_objective(base.clone())?;

    let Some(norm) = config.penalty else {
        debug!("Using unpenalized {} objective", base.name);
        return Ok(());
    };
    match penalty_expression(layout, norm, config.eta) {
        Some(penalty) => {
            debug!("Replacing {} with {:?} penalized objective", base.name, norm);
            let penalized = base.expression().clone() + penalty;
            problem.set_objective(Objective::minimize("new_objective", penalized))?;
        }
        None => {
            debug!("Capping slopes with Lipschitz norm {}", config.eta);
            problem.add_constraint_set(lipschitz_caps(layout, config.eta))?;
        }
    }
    Ok(())
}
