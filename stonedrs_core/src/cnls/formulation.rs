//! Assembled convex regression model and its hand off to a solver
use indexmap::IndexMap;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};

use crate::cnls::config::{CompositionMode, ModelConfig};
use crate::cnls::constraints::{build_constraint_family, ConstraintFamily, RuleContext};
use crate::cnls::layout::VariableLayout;
use crate::cnls::objective::install_objective;
use crate::cnls::FormulationError;
use crate::configuration::{Configuration, SolveRouteKind};
use crate::data::{ActiveSetMatrix, ObservationSet};
use crate::optimize::constraint::ConstraintSet;
use crate::optimize::problem::Problem;
use crate::optimize::solvers::clarabel::ClarabelSolver;
use crate::optimize::solvers::remote::RemoteSolver;
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::variable::VariableBlock;
use crate::optimize::{OptimizationStatus, ProblemSolution};

/// Where a formulation is solved
#[derive(Debug, Clone)]
pub enum SolveRoute {
    /// In process, with Clarabel; additive models only
    Local,
    /// Through an external solving service
    Remote(RemoteSolver),
}

impl SolveRoute {
    /// Route selected by the process wide configuration
    ///
    /// A remote route needs a solving service, which the configuration can't hold, so it must
    /// be given with [`Formulation::with_route`].
    pub fn from_configuration() -> Result<Self, FormulationError> {
        match Configuration::current().solve_route {
            SolveRouteKind::Local => Ok(SolveRoute::Local),
            SolveRouteKind::Remote => Err(FormulationError::Solver(SolverError::Service(
                "the remote route is configured but no solving service was supplied".to_string(),
            ))),
        }
    }
}

/// Backend requested from the solving service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKey {
    /// Conic solver for additive models
    Mosek,
    /// Nonlinear solver for the log-transformed multiplicative models
    Knitro,
}

impl SolverKey {
    /// Backend suited to `composition`
    pub fn for_composition(composition: CompositionMode) -> Self {
        match composition {
            CompositionMode::Additive => SolverKey::Mosek,
            CompositionMode::Multiplicative => SolverKey::Knitro,
        }
    }

    /// Name understood by the solving service
    pub fn as_str(self) -> &'static str {
        match self {
            SolverKey::Mosek => "mosek",
            SolverKey::Knitro => "knitro",
        }
    }
}

/// Result of [`Formulation::optimize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    /// The solver answered with this status, which is passed through untouched
    Solved(OptimizationStatus),
    /// No solving path exists for this model on the selected route
    NotYetAvailable,
}

/// A complete convex quantile or expectile regression model
///
/// The problem is built once in [`Formulation::new`] and never changes afterwards. Solving
/// happens at most once, on the first call to [`Formulation::optimize`] or to any estimate
/// getter, and the solution is cached until [`Formulation::invalidate`].
#[derive(Debug, Clone)]
pub struct Formulation {
    data: ObservationSet,
    config: ModelConfig,
    layout: VariableLayout,
    problem: Problem,
    route: Option<SolveRoute>,
    solution: Option<ProblemSolution>,
}

impl Formulation {
    /// Build the model for `data`
    ///
    /// The configuration, the data and the dimensions of both active set matrices are checked
    /// before any variable is allocated.
    ///
    /// # Parameters
    /// - `data`: The sample
    /// - `config`: Model configuration
    /// - `cut_active`: Pairs generating sweet-spot cuts
    /// - `active`: Pairs generating refined sweet-spot cuts
    ///
    /// # Examples
    /// ```rust
    /// use stonedrs_core::cnls::{ConstraintFamily, Formulation, ModelConfigBuilder};
    /// use stonedrs_core::data::{ActiveSetMatrix, ObservationSet};
    ///
    /// let data = ObservationSet::new(vec![1., 2., 3.], vec![1., 2., 3.].into(), None).unwrap();
    /// let config = ModelConfigBuilder::default().tau(0.5).build().unwrap();
    /// let none = ActiveSetMatrix::new(3);
    /// let model = Formulation::new(data, config, &none, &none).unwrap();
    /// assert_eq!(model.constraint_count(ConstraintFamily::Afriat), 3);
    /// assert_eq!(model.constraint_count(ConstraintFamily::SweetSpot), 0);
    /// ```
    pub fn new(
        data: ObservationSet,
        config: ModelConfig,
        cut_active: &ActiveSetMatrix,
        active: &ActiveSetMatrix,
    ) -> Result<Self, FormulationError> {
        config.validate()?;
        let n = data.len();
        if config.composition == CompositionMode::Multiplicative {
            data.require_positive_output()?;
        }
        cut_active.check_dimension(n)?;
        active.check_dimension(n)?;

        let mut problem = Problem::new();
        let layout = VariableLayout::allocate(
            &mut problem,
            n,
            data.num_inputs(),
            data.num_contextual(),
            config.composition,
        )?;

        let ctx = RuleContext {
            data: &data,
            layout: &layout,
            config: &config,
        };
        let mut families = vec![
            (ConstraintFamily::ErrorDecomposition, None),
            (ConstraintFamily::Regression, None),
        ];
        if config.composition == CompositionMode::Multiplicative {
            families.push((ConstraintFamily::LogLink, None));
        }
        families.push((ConstraintFamily::Afriat, None));
        families.push((ConstraintFamily::SweetSpot, Some(cut_active)));
        families.push((ConstraintFamily::SweetSpotRefined, Some(active)));
        for (family, matrix) in families {
            let set = build_constraint_family(family, &ctx, matrix)?;
            debug!("Generated {} {} constraints", set.len(), family);
            problem.add_constraint_set(set)?;
        }
        // Lipschitz caps, if any, come after every other family
        install_objective(&mut problem, &layout, &config)?;

        info!(
            "Built {} model: {} variables, {} constraints",
            config,
            problem.num_variables(),
            problem.num_constraints()
        );
        Ok(Self {
            data,
            config,
            layout,
            problem,
            route: None,
            solution: None,
        })
    }

    /// Solve along `route` instead of the configured default
    pub fn with_route(mut self, route: SolveRoute) -> Self {
        self.route = Some(route);
        self.solution = None;
        self
    }

    // region Introspection
    /// The assembled problem
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Configuration of the model
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Decision variables of the model
    pub fn layout(&self) -> &VariableLayout {
        &self.layout
    }

    /// Constraints of `family`, None if the family isn't part of this model
    pub fn constraint_set(&self, family: ConstraintFamily) -> Option<&ConstraintSet> {
        self.problem.constraint_set(family.name())
    }

    /// Number of constraints of `family`, 0 if the family isn't part of this model
    pub fn constraint_count(&self, family: ConstraintFamily) -> usize {
        self.constraint_set(family).map_or(0, |set| set.len())
    }

    /// Number of constraints of every family in this model, in generation order
    pub fn family_counts(&self) -> IndexMap<ConstraintFamily, usize> {
        self.problem
            .constraint_sets()
            .filter_map(|set| {
                ConstraintFamily::ALL
                    .into_iter()
                    .find(|family| family.name() == set.name)
                    .map(|family| (family, set.len()))
            })
            .collect()
    }

    /// Backend requested from a solving service
    pub fn solver_key(&self) -> SolverKey {
        SolverKey::for_composition(self.config.composition)
    }

    /// Status of the last solve, `Unoptimized` if none happened
    pub fn problem_status(&self) -> OptimizationStatus {
        self.solution
            .as_ref()
            .map_or(OptimizationStatus::Unoptimized, |solution| solution.status)
    }

    /// Cached solution, if a solve happened
    pub fn solution(&self) -> Option<&ProblemSolution> {
        self.solution.as_ref()
    }
    // endregion Introspection

    // region Solving
    /// Solve the model, unless a solution is already cached
    pub fn optimize(&mut self) -> Result<SolveOutcome, FormulationError> {
        if let Some(solution) = &self.solution {
            return Ok(SolveOutcome::Solved(solution.status));
        }
        let route = match &self.route {
            Some(route) => route.clone(),
            None => SolveRoute::from_configuration()?,
        };
        let solution = match route {
            SolveRoute::Local => match self.config.composition {
                CompositionMode::Additive => {
                    let solver = ClarabelSolver::from_configuration();
                    info!("Solving {} model locally with {}", self.config, solver.name());
                    solver.solve(&self.problem)?
                }
                CompositionMode::Multiplicative => {
                    warn!(
                        "Estimating the multiplicative model locally will be available in near future"
                    );
                    return Ok(SolveOutcome::NotYetAvailable);
                }
            },
            SolveRoute::Remote(remote) => {
                let remote = remote.or_solver(self.solver_key().as_str());
                info!("Solving {} model remotely with {}", self.config, remote.name());
                remote.solve(&self.problem)?
            }
        };
        let status = solution.status;
        self.solution = Some(self.checked(solution));
        Ok(SolveOutcome::Solved(status))
    }

    /// Constraints and bounds violated by the cached solution, beyond the configured tolerance
    ///
    /// Empty when no solution with variable values is cached.
    pub fn violations(&self) -> Vec<String> {
        let tolerance = Configuration::current().tolerance;
        self.solution
            .as_ref()
            .and_then(|solution| solution.variable_values.as_deref())
            .map_or_else(Vec::new, |values| self.problem.violations(values, tolerance))
    }

    /// Drop variable values that don't cover exactly the problem's variables
    fn checked(&self, mut solution: ProblemSolution) -> ProblemSolution {
        let expected = self.problem.num_variables();
        if let Some(found) = solution.variable_values.as_ref().map(Vec::len) {
            if found != expected {
                warn!(
                    "Discarding solution with {} variable values, the model has {}",
                    found, expected
                );
                solution.variable_values = None;
            }
        }
        solution
    }

    /// Drop the cached solution, so the next retrieval solves again
    pub fn invalidate(&mut self) {
        self.solution = None;
    }
    // endregion Solving

    // region Estimates
    /// Solved variable values, solving first if needed
    fn values(&mut self) -> Result<&[f64], FormulationError> {
        if let SolveOutcome::NotYetAvailable = self.optimize()? {
            return Err(FormulationError::NotOptimized(OptimizationStatus::Unoptimized));
        }
        let status = self.problem_status();
        self.solution
            .as_ref()
            .and_then(|solution| solution.variable_values.as_deref())
            .ok_or(FormulationError::NotOptimized(status))
    }

    fn block_values(&mut self, block: &VariableBlock) -> Result<DVector<f64>, FormulationError> {
        let values = self.values()?;
        Ok(DVector::from_iterator(
            block.len(),
            block.ids().map(|var| values[var.0]),
        ))
    }

    /// Estimated intercepts, one per observation
    pub fn alpha(&mut self) -> Result<DVector<f64>, FormulationError> {
        if !self.config.returns_to_scale.has_intercept() {
            return Err(FormulationError::InterceptUnavailable);
        }
        let block = self.layout.alpha.clone();
        self.block_values(&block)
    }

    /// Estimated slopes, one row per observation and one column per input
    pub fn beta(&mut self) -> Result<DMatrix<f64>, FormulationError> {
        let beta = self.layout.beta.clone();
        let (n, j) = (self.layout.num_observations(), self.layout.num_inputs());
        let values = self.values()?;
        Ok(DMatrix::from_fn(n, j, |i, j| values[beta.at2(i, j).0]))
    }

    /// Estimated coefficients of the contextual variables
    pub fn lambda(&mut self) -> Result<DVector<f64>, FormulationError> {
        if self.data.num_contextual() == 0 {
            return Err(FormulationError::NoContextualVariables);
        }
        let block = self.layout.lambda.clone();
        self.block_values(&block)
    }

    /// Estimated residuals
    pub fn residuals(&mut self) -> Result<DVector<f64>, FormulationError> {
        let block = self.layout.epsilon.clone();
        self.block_values(&block)
    }

    /// Positive and negative parts of the estimated residuals
    pub fn residual_parts(&mut self) -> Result<(DVector<f64>, DVector<f64>), FormulationError> {
        let plus = self.layout.epsilon_plus.clone();
        let minus = self.layout.epsilon_minus.clone();
        Ok((self.block_values(&plus)?, self.block_values(&minus)?))
    }

    /// Estimated frontier of a multiplicative model
    pub fn frontier(&mut self) -> Result<DVector<f64>, FormulationError> {
        let block = self
            .layout
            .frontier
            .clone()
            .ok_or(FormulationError::NoFrontier)?;
        self.block_values(&block)
    }
    // endregion Estimates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnls::config::{
        FrontierDirection, LossType, ModelConfigBuilder, PenaltyNorm, ReturnsToScale,
    };
    use crate::data::DataError;
    use crate::optimize::constraint::{Constraint, ConstraintIndex, Term};
    use crate::optimize::solvers::remote::{SolveRequest, SolverService};
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn sample() -> ObservationSet {
        ObservationSet::new(vec![1., 2.5, 3.], vec![1., 2., 3.].into(), None).unwrap()
    }

    fn quantile_l1() -> ModelConfig {
        ModelConfigBuilder::default()
            .tau(0.5)
            .eta(0.1)
            .penalty(Some(PenaltyNorm::L1))
            .build()
            .unwrap()
    }

    fn build(data: ObservationSet, config: ModelConfig) -> Result<Formulation, FormulationError> {
        let none = ActiveSetMatrix::new(data.len());
        Formulation::new(data, config, &none, &none)
    }

    /// Answers every request with the same value for all variables
    struct ConstantService {
        value: f64,
        calls: AtomicUsize,
        solvers: Mutex<Vec<String>>,
    }

    impl ConstantService {
        fn new(value: f64) -> Arc<Self> {
            Arc::new(Self {
                value,
                calls: AtomicUsize::new(0),
                solvers: Mutex::new(Vec::new()),
            })
        }
    }

    impl SolverService for ConstantService {
        fn submit(&self, request: &SolveRequest<'_>) -> Result<ProblemSolution, SolverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.solvers.lock().unwrap().push(request.solver.to_string());
            Ok(ProblemSolution {
                status: OptimizationStatus::Optimal,
                objective_value: Some(0.),
                variable_values: Some(vec![self.value; request.problem.num_variables()]),
            })
        }
    }

    fn remote(service: Arc<ConstantService>) -> SolveRoute {
        SolveRoute::Remote(RemoteSolver::new(service, "someone@example.org").unwrap())
    }

    #[test]
    fn penalized_quantile_scenario() {
        let model = build(sample(), quantile_l1()).unwrap();
        let counts = model.family_counts();
        let expected = [
            (ConstraintFamily::ErrorDecomposition, 3),
            (ConstraintFamily::Regression, 3),
            (ConstraintFamily::Afriat, 3),
            (ConstraintFamily::SweetSpot, 0),
            (ConstraintFamily::SweetSpotRefined, 0),
        ];
        assert_eq!(counts.len(), expected.len());
        for ((family, count), (expected_family, expected_count)) in counts.iter().zip(expected) {
            assert_eq!(*family, expected_family);
            assert_eq!(*count, expected_count);
        }
        assert_eq!(model.constraint_count(ConstraintFamily::LogLink), 0);

        // 0.5 * sum(e+) + 0.5 * sum(e-) + 0.1 * sum(beta)
        let layout = model.layout();
        let objective = model.problem().objective().unwrap();
        assert_eq!(objective.expression().terms().len(), 9);
        for term in objective.expression().terms() {
            match term {
                Term::Linear { var, coef } => {
                    if layout.beta.ids().any(|beta| beta == *var) {
                        assert_relative_eq!(*coef, 0.1);
                    } else {
                        assert!(layout
                            .epsilon_plus
                            .ids()
                            .chain(layout.epsilon_minus.ids())
                            .any(|e| e == *var));
                        assert_relative_eq!(*coef, 0.5);
                    }
                }
                other => panic!("Unexpected objective term {}", other),
            }
        }
        assert_eq!(model.problem().objective_slot().deactivated().len(), 1);
        assert_eq!(model.solver_key(), SolverKey::Mosek);
        assert_eq!(model.problem_status(), OptimizationStatus::Unoptimized);
    }

    #[test]
    fn lipschitz_scenario() {
        let config = ModelConfigBuilder::default()
            .tau(0.5)
            .eta(2.)
            .penalty(Some(PenaltyNorm::from_code(3).unwrap()))
            .build()
            .unwrap();
        let model = build(sample(), config).unwrap();
        let objective = model.problem().objective().unwrap();
        assert_eq!(objective.name, "objective");
        assert!(model.problem().objective_slot().deactivated().is_empty());
        let layout = model.layout();
        assert!(!objective
            .expression()
            .variables()
            .any(|var| layout.beta.ids().any(|beta| beta == var)));

        let caps = model.constraint_set(ConstraintFamily::LipschitzNorm).unwrap();
        assert_eq!(caps.len(), 3);
        for i in 0..3 {
            match caps.get(ConstraintIndex::Single(i)).unwrap() {
                Constraint::Inequality {
                    expression,
                    upper_bound,
                    ..
                } => {
                    assert_eq!(
                        expression.terms(),
                        &[Term::Quadratic {
                            var1: layout.beta.at2(i, 0),
                            var2: layout.beta.at2(i, 0),
                            coef: 1.,
                        }]
                    );
                    assert_relative_eq!(*upper_bound, 4.);
                }
                Constraint::Equality { .. } => panic!("Incorrect constraint type created"),
            }
        }
        assert_eq!(
            model.family_counts().keys().last(),
            Some(&ConstraintFamily::LipschitzNorm)
        );
    }

    #[test]
    fn multiplicative_constant_returns() {
        let config = ModelConfigBuilder::default()
            .composition(CompositionMode::Multiplicative)
            .returns_to_scale(ReturnsToScale::Constant)
            .loss(LossType::Expectile)
            .tau(0.9)
            .build()
            .unwrap();
        let model = build(sample(), config).unwrap();
        assert_eq!(model.constraint_count(ConstraintFamily::LogLink), 3);
        assert_eq!(model.solver_key(), SolverKey::Knitro);
        let layout = model.layout();

        for i in 0..3 {
            let link = model
                .constraint_set(ConstraintFamily::LogLink)
                .unwrap()
                .get(ConstraintIndex::Single(i))
                .unwrap();
            assert!(!link.expression().variables().any(|var| var == layout.alpha.at(i)));

            match model
                .constraint_set(ConstraintFamily::Regression)
                .unwrap()
                .get(ConstraintIndex::Single(i))
                .unwrap()
            {
                Constraint::Equality { expression, equals } => {
                    assert!(expression.has_log());
                    assert_relative_eq!(*equals, -(model.data.output(i).ln()));
                }
                Constraint::Inequality { .. } => panic!("Incorrect constraint type created"),
            }
        }
        let names: Vec<_> = model.family_counts().keys().map(|f| f.name()).collect();
        assert_eq!(
            names,
            [
                "error_decomposition",
                "regression",
                "log_link",
                "afriat",
                "sweet_spot",
                "sweet_spot_refined"
            ]
        );
    }

    #[test]
    fn sweet_spot_counts() {
        let data = ObservationSet::new(
            vec![1., 2., 3., 4.],
            vec![vec![1., 1.], vec![2., 1.], vec![2., 3.], vec![4., 4.]].into(),
            None,
        )
        .unwrap();
        let mut cut_active = ActiveSetMatrix::new(4);
        for i in 0..4 {
            cut_active.set(i, i, true);
            cut_active.set(i, (i + 2) % 4, true);
        }
        let indicator = DMatrix::from_fn(4, 4, |i, h| if h > i { 1. } else { 0. });
        let active = ActiveSetMatrix::from_indicator(&indicator).unwrap();
        let model = Formulation::new(data, quantile_l1(), &cut_active, &active).unwrap();
        assert_eq!(model.constraint_count(ConstraintFamily::SweetSpot), 4);
        assert_eq!(
            model.constraint_count(ConstraintFamily::SweetSpot),
            cut_active.active_count()
        );
        assert_eq!(model.constraint_count(ConstraintFamily::SweetSpotRefined), 6);
        assert!(model
            .constraint_set(ConstraintFamily::SweetSpot)
            .unwrap()
            .iter()
            .all(|(index, _)| !matches!(index, ConstraintIndex::Pair(i, h) if i == h)));
    }

    #[test]
    fn invalid_inputs() {
        let config = ModelConfigBuilder::default()
            .returns_to_scale(ReturnsToScale::Constant)
            .tau(0.5)
            .build()
            .unwrap();
        assert!(matches!(
            build(sample(), config),
            Err(FormulationError::UnsupportedConfiguration {
                family: ConstraintFamily::Regression,
                ..
            })
        ));

        let mut config = quantile_l1();
        config.tau = 1.5;
        assert!(matches!(
            build(sample(), config),
            Err(FormulationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PenaltyNorm::from_code(4),
            Err(FormulationError::InvalidConfiguration(_))
        ));

        let wrong = ActiveSetMatrix::new(2);
        let right = ActiveSetMatrix::new(3);
        assert!(matches!(
            Formulation::new(sample(), quantile_l1(), &right, &wrong),
            Err(FormulationError::InvalidData(DataError::ActiveSetShape { .. }))
        ));

        let config = ModelConfigBuilder::default()
            .composition(CompositionMode::Multiplicative)
            .tau(0.5)
            .build()
            .unwrap();
        let data = ObservationSet::new(vec![1., -2.], vec![1., 2.].into(), None).unwrap();
        assert!(matches!(
            build(data, config),
            Err(FormulationError::InvalidData(DataError::NonPositiveOutput { row: 1, .. }))
        ));
    }

    #[test]
    fn local_additive_solve() {
        let config = ModelConfigBuilder::default()
            .tau(0.5)
            .eta(0.01)
            .loss(LossType::Expectile)
            .penalty(Some(PenaltyNorm::L2))
            .build()
            .unwrap();
        let data = ObservationSet::new(
            vec![1., 2.2, 2.9, 3.1],
            vec![1., 2., 3., 4.].into(),
            Some(vec![0., 1., 0., 1.].into()),
        )
        .unwrap();
        let mut model = build(data, config).unwrap().with_route(SolveRoute::Local);
        assert!(matches!(
            model.optimize().unwrap(),
            SolveOutcome::Solved(OptimizationStatus::Optimal | OptimizationStatus::AlmostOptimal)
        ));

        let values = model.solution().unwrap().variable_values.clone().unwrap();
        assert!(model.problem().violations(&values, 1e-6).is_empty());
        assert!(model.violations().len() <= model.problem().num_constraints());

        let residuals = model.residuals().unwrap();
        let (plus, minus) = model.residual_parts().unwrap();
        for i in 0..4 {
            assert_relative_eq!(residuals[i], plus[i] - minus[i], epsilon = 1e-6);
            assert!(plus[i] >= -1e-6);
            assert!(minus[i] >= -1e-6);
        }
        assert!(model.beta().unwrap().iter().all(|b| *b >= -1e-6));
        assert_eq!(model.alpha().unwrap().len(), 4);
        assert_eq!(model.lambda().unwrap().len(), 1);
        assert!(matches!(model.frontier(), Err(FormulationError::NoFrontier)));
    }

    #[test]
    fn remote_solve_happens_once() {
        let service = ConstantService::new(0.25);
        let mut model = build(sample(), quantile_l1())
            .unwrap()
            .with_route(remote(service.clone()));

        let beta = model.beta().unwrap();
        assert_eq!(beta.shape(), (3, 1));
        assert_relative_eq!(beta[(2, 0)], 0.25);
        model.alpha().unwrap();
        assert_eq!(
            model.optimize().unwrap(),
            SolveOutcome::Solved(OptimizationStatus::Optimal)
        );
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*service.solvers.lock().unwrap(), ["mosek"]);
        assert!(matches!(
            model.lambda(),
            Err(FormulationError::NoContextualVariables)
        ));

        model.invalidate();
        assert_eq!(model.problem_status(), OptimizationStatus::Unoptimized);
        model.residuals().unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remote_multiplicative_uses_knitro() {
        let service = ConstantService::new(1.);
        let config = ModelConfigBuilder::default()
            .composition(CompositionMode::Multiplicative)
            .direction(FrontierDirection::Cost)
            .returns_to_scale(ReturnsToScale::Constant)
            .tau(0.5)
            .build()
            .unwrap();
        let mut model = build(sample(), config)
            .unwrap()
            .with_route(remote(service.clone()));
        assert!(matches!(
            model.alpha(),
            Err(FormulationError::InterceptUnavailable)
        ));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert_eq!(model.frontier().unwrap().len(), 3);
        assert_eq!(*service.solvers.lock().unwrap(), ["knitro"]);
    }

    #[test]
    fn local_multiplicative_not_available() {
        let config = ModelConfigBuilder::default()
            .composition(CompositionMode::Multiplicative)
            .tau(0.5)
            .build()
            .unwrap();
        let mut model = build(sample(), config)
            .unwrap()
            .with_route(SolveRoute::Local);
        assert_eq!(model.optimize().unwrap(), SolveOutcome::NotYetAvailable);
        assert!(model.solution().is_none());
        assert!(matches!(
            model.beta(),
            Err(FormulationError::NotOptimized(OptimizationStatus::Unoptimized))
        ));
    }

    #[test]
    fn short_solution_has_no_estimates() {
        struct Short;
        impl SolverService for Short {
            fn submit(&self, _: &SolveRequest<'_>) -> Result<ProblemSolution, SolverError> {
                Ok(ProblemSolution {
                    status: OptimizationStatus::Optimal,
                    objective_value: Some(0.),
                    variable_values: Some(vec![0.; 2]),
                })
            }
        }
        let remote = RemoteSolver::new(Arc::new(Short), "someone@example.org").unwrap();
        let mut model = build(sample(), quantile_l1())
            .unwrap()
            .with_route(SolveRoute::Remote(remote));
        assert_eq!(
            model.optimize().unwrap(),
            SolveOutcome::Solved(OptimizationStatus::Optimal)
        );
        assert!(model.solution().unwrap().variable_values.is_none());
        assert!(matches!(
            model.beta(),
            Err(FormulationError::NotOptimized(OptimizationStatus::Optimal))
        ));
        assert!(matches!(
            model.alpha(),
            Err(FormulationError::NotOptimized(OptimizationStatus::Optimal))
        ));
        assert!(model.violations().is_empty());
    }

    #[test]
    fn failed_solve_has_no_estimates() {
        struct Failing;
        impl SolverService for Failing {
            fn submit(&self, _: &SolveRequest<'_>) -> Result<ProblemSolution, SolverError> {
                Ok(ProblemSolution::status_only(OptimizationStatus::Infeasible))
            }
        }
        let remote = RemoteSolver::new(Arc::new(Failing), "someone@example.org").unwrap();
        let route = SolveRoute::Remote(remote);
        let mut model = build(sample(), quantile_l1()).unwrap().with_route(route);
        assert_eq!(
            model.optimize().unwrap(),
            SolveOutcome::Solved(OptimizationStatus::Infeasible)
        );
        assert!(matches!(
            model.residuals(),
            Err(FormulationError::NotOptimized(OptimizationStatus::Infeasible))
        ));
    }
}
