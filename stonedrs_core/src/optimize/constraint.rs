//! Provides structs for representing expressions and constraints in an optimization problem
use std::fmt::{Display, Formatter};
use std::ops::{Add, Neg, Sub};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::optimize::variable::VariableId;

// region Terms and Expressions
/// A single term of an expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// `coef * var`
    Linear {
        /// Variable in the term
        var: VariableId,
        /// Coefficient for the variable
        coef: f64,
    },
    /// `coef * var1 * var2`
    Quadratic {
        /// First variable in the term
        var1: VariableId,
        /// Second variable in the term
        var2: VariableId,
        /// Coefficient for the product
        coef: f64,
    },
    /// `coef * ln(var + shift)`
    ShiftedLog {
        /// Variable inside the logarithm
        var: VariableId,
        /// Constant added to the variable before taking the logarithm
        shift: f64,
        /// Coefficient for the logarithm
        coef: f64,
    },
}

impl Term {
    /// Value of the term when the variables take `values` (indexed by [`VariableId`])
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        match *self {
            Term::Linear { var, coef } => coef * values[var.0],
            Term::Quadratic { var1, var2, coef } => coef * values[var1.0] * values[var2.0],
            Term::ShiftedLog { var, shift, coef } => coef * (values[var.0] + shift).ln(),
        }
    }

    /// Variables referenced by the term
    pub fn variables(&self) -> Vec<VariableId> {
        match *self {
            Term::Linear { var, .. } | Term::ShiftedLog { var, .. } => vec![var],
            Term::Quadratic { var1, var2, .. } => vec![var1, var2],
        }
    }

    /// The same term multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Term {
        match *self {
            Term::Linear { var, coef } => Term::Linear {
                var,
                coef: coef * factor,
            },
            Term::Quadratic { var1, var2, coef } => Term::Quadratic {
                var1,
                var2,
                coef: coef * factor,
            },
            Term::ShiftedLog { var, shift, coef } => Term::ShiftedLog {
                var,
                shift,
                coef: coef * factor,
            },
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Linear { var, coef } => write!(f, "{}*x{}", coef, var.0),
            Term::Quadratic { var1, var2, coef } if var1 == var2 => {
                write!(f, "{}*x{}^2", coef, var1.0)
            }
            Term::Quadratic { var1, var2, coef } => write!(f, "{}*x{}*x{}", coef, var1.0, var2.0),
            Term::ShiftedLog { var, shift, coef } => {
                write!(f, "{}*log(x{} + {})", coef, var.0, shift)
            }
        }
    }
}

/// A sum of [`Term`]s plus a constant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    terms: Vec<Term>,
    constant: f64,
}

impl Expression {
    /// Create an expression with no terms and a zero constant
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an expression holding only a constant
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Create an expression holding a single variable with coefficient 1
    pub fn variable(var: VariableId) -> Self {
        let mut expr = Self::new();
        expr.add_linear(var, 1.);
        expr
    }

    /// Add `coef * var`
    pub fn add_linear(&mut self, var: VariableId, coef: f64) -> &mut Self {
        self.terms.push(Term::Linear { var, coef });
        self
    }

    /// Add `coef * var^2`
    pub fn add_square(&mut self, var: VariableId, coef: f64) -> &mut Self {
        self.terms.push(Term::Quadratic {
            var1: var,
            var2: var,
            coef,
        });
        self
    }

    /// Add `coef * ln(var + shift)`
    pub fn add_shifted_log(&mut self, var: VariableId, shift: f64, coef: f64) -> &mut Self {
        self.terms.push(Term::ShiftedLog { var, shift, coef });
        self
    }

    /// Add a constant
    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    /// Append all terms and the constant of `other`, scaled by `factor`
    pub fn add_scaled(&mut self, other: &Expression, factor: f64) -> &mut Self {
        self.terms
            .extend(other.terms.iter().map(|term| term.scaled(factor)));
        self.constant += factor * other.constant;
        self
    }

    /// Terms of the expression
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Constant part of the expression
    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    /// The expression without its constant part
    pub fn without_constant(&self) -> Expression {
        Expression {
            terms: self.terms.clone(),
            constant: 0.,
        }
    }

    /// Value of the expression when the variables take `values`
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|term| term.evaluate(values))
            .sum::<f64>()
            + self.constant
    }

    /// True if every term is linear
    pub fn is_linear(&self) -> bool {
        self.terms
            .iter()
            .all(|term| matches!(term, Term::Linear { .. }))
    }

    /// True if a quadratic term is present
    pub fn has_quadratic(&self) -> bool {
        self.terms
            .iter()
            .any(|term| matches!(term, Term::Quadratic { .. }))
    }

    /// True if a logarithmic term is present
    pub fn has_log(&self) -> bool {
        self.terms
            .iter()
            .any(|term| matches!(term, Term::ShiftedLog { .. }))
    }

    /// Every variable referenced by the expression, possibly repeated
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.terms.iter().flat_map(|term| term.variables())
    }
}

impl Add for Expression {
    type Output = Expression;

    fn add(mut self, rhs: Expression) -> Expression {
        self.add_scaled(&rhs, 1.);
        self
    }
}

impl Sub for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: Expression) -> Expression {
        self.add_scaled(&rhs, -1.);
        self
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        let mut negated = Expression::new();
        negated.add_scaled(&self, -1.);
        negated
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        if self.constant != 0. || parts.is_empty() {
            parts.push(self.constant.to_string());
        }
        write!(f, "{}", parts.join(" + "))
    }
}
// endregion Terms and Expressions

// region Constraints
/// Direction of an inequality between two expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    /// `lhs <= rhs`
    AtMost,
    /// `lhs >= rhs`
    AtLeast,
}

impl Comparison {
    /// Build the constraint `lhs <= rhs` or `lhs >= rhs`
    ///
    /// Everything is moved to the left hand side, so the resulting constraint bounds
    /// `lhs - rhs` (without its constant) against the negated constant.
    ///
    /// # Examples
    /// ```rust
    /// use stonedrs_core::optimize::constraint::{Comparison, Constraint, Expression};
    /// use stonedrs_core::optimize::variable::VariableId;
    /// // x0 <= 4
    /// let x0 = Expression::variable(VariableId(0));
    /// let cons = Comparison::AtMost.apply(x0, Expression::constant(4.));
    /// assert!(cons.is_satisfied(&[3.5], 1e-9));
    /// assert!(!cons.is_satisfied(&[4.5], 1e-9));
    /// ```
    pub fn apply(self, lhs: Expression, rhs: Expression) -> Constraint {
        let difference = lhs - rhs;
        let bound = -difference.constant_value();
        let expression = difference.without_constant();
        match self {
            Comparison::AtMost => Constraint::Inequality {
                expression,
                lower_bound: f64::NEG_INFINITY,
                upper_bound: bound,
            },
            Comparison::AtLeast => Constraint::Inequality {
                expression,
                lower_bound: bound,
                upper_bound: f64::INFINITY,
            },
        }
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparison::AtMost => write!(f, "<="),
            Comparison::AtLeast => write!(f, ">="),
        }
    }
}

/// Represents a constraint in an optimization problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// Represents an equality constraint, where `expression` = `equals`
    Equality {
        /// Terms which are added together, the expression carries no constant
        expression: Expression,
        /// The right hand side of the equality constraint
        equals: f64,
    },
    /// Represents an inequality constraint `lower_bound <= expression <= upper_bound`
    Inequality {
        /// Terms which are added together, the expression carries no constant
        expression: Expression,
        /// The lowest value the expression can take
        lower_bound: f64,
        /// The highest value the expression can take
        upper_bound: f64,
    },
}

impl Constraint {
    /// Build the constraint `lhs == rhs`, moving everything to the left hand side
    pub fn equate(lhs: Expression, rhs: Expression) -> Self {
        let difference = lhs - rhs;
        Constraint::Equality {
            equals: -difference.constant_value(),
            expression: difference.without_constant(),
        }
    }

    /// Expression constrained by this constraint
    pub fn expression(&self) -> &Expression {
        match self {
            Constraint::Equality { expression, .. } | Constraint::Inequality { expression, .. } => {
                expression
            }
        }
    }

    /// Check if the constraint holds, within `tolerance`, when the variables take `values`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let value = self.expression().evaluate(values);
        match *self {
            Constraint::Equality { equals, .. } => (value - equals).abs() <= tolerance,
            Constraint::Inequality {
                lower_bound,
                upper_bound,
                ..
            } => value >= lower_bound - tolerance && value <= upper_bound + tolerance,
        }
    }

    /// True for equality constraints
    pub fn is_equality(&self) -> bool {
        matches!(self, Constraint::Equality { .. })
    }
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Equality { expression, equals } => write!(f, "{} = {}", expression, equals),
            Constraint::Inequality {
                expression,
                lower_bound,
                upper_bound,
            } => match (lower_bound.is_finite(), upper_bound.is_finite()) {
                (false, true) => write!(f, "{} <= {}", expression, upper_bound),
                (true, false) => write!(f, "{} >= {}", expression, lower_bound),
                _ => write!(f, "{} <= {} <= {}", lower_bound, expression, upper_bound),
            },
        }
    }
}

/// Index of a constraint within a [`ConstraintSet`]
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintIndex {
    /// Constraint generated for a single observation `i`
    Single(usize),
    /// Constraint generated for an ordered pair of observations `(i, h)`
    Pair(usize, usize),
}

impl Display for ConstraintIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintIndex::Single(i) => write!(f, "[{}]", i),
            ConstraintIndex::Pair(i, h) => write!(f, "[{},{}]", i, h),
        }
    }
}

/// A named, indexed family of constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    /// Name of the family, used as its key in the problem
    pub name: String,
    /// Short description of the family
    pub doc: String,
    #[serde(with = "indexmap::map::serde_seq")]
    constraints: IndexMap<ConstraintIndex, Constraint>,
}

impl ConstraintSet {
    /// Create an empty constraint set
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            constraints: IndexMap::new(),
        }
    }

    /// Insert a constraint, replacing any constraint already stored under `index`
    pub fn insert(&mut self, index: ConstraintIndex, constraint: Constraint) {
        self.constraints.insert(index, constraint);
    }

    /// Constraint stored under `index`, None if that index was skipped
    pub fn get(&self, index: ConstraintIndex) -> Option<&Constraint> {
        self.constraints.get(&index)
    }

    /// Number of constraints in the set
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// True if the set holds no constraints
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Iterate over the constraints in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ConstraintIndex, &Constraint)> {
        self.constraints.iter()
    }
}
// endregion Constraints
