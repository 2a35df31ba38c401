//! Configuration of a convex regression model
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::cnls::FormulationError;
use crate::optimize::constraint::Comparison;

/// How the error term enters the regression equation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompositionMode {
    /// `y = f(x) + z'lambda + e`
    Additive,
    /// `ln y = ln f(x) + z'lambda + e`
    Multiplicative,
}

/// Whether the estimated function is a production (concave) or cost (convex) frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrontierDirection {
    /// Concave production frontier
    Production,
    /// Convex cost frontier
    Cost,
}

impl FrontierDirection {
    /// How a fitted value compares with another observation's hyperplane at the same point
    pub fn comparison(self) -> Comparison {
        match self {
            FrontierDirection::Production => Comparison::AtMost,
            FrontierDirection::Cost => Comparison::AtLeast,
        }
    }
}

/// Whether the frontier may have an intercept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnsToScale {
    /// Variable returns to scale, hyperplanes carry an intercept
    Variable,
    /// Constant returns to scale, hyperplanes pass through the origin
    Constant,
}

impl ReturnsToScale {
    /// True if hyperplanes carry the intercept `alpha`
    pub fn has_intercept(self) -> bool {
        matches!(self, ReturnsToScale::Variable)
    }
}

/// Asymmetric loss applied to the residual parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LossType {
    /// Linear loss, weighted by `tau` and `1 - tau`
    Quantile,
    /// Squared loss, weighted by `tau` and `1 - tau`
    Expectile,
}

/// Regularization of the slope coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PenaltyNorm {
    /// `eta * sum(beta)` added to the objective
    L1,
    /// `eta * sum(beta^2)` added to the objective
    L2,
    /// `sum_j beta[i,j]^2 <= eta^2` for every observation
    Lipschitz,
}

impl PenaltyNorm {
    /// Map the numeric penalty selector (1, 2 or 3) to a norm
    ///
    /// # Examples
    /// ```rust
    /// use stonedrs_core::cnls::PenaltyNorm;
    /// assert_eq!(PenaltyNorm::from_code(3).unwrap(), PenaltyNorm::Lipschitz);
    /// assert!(PenaltyNorm::from_code(4).is_err());
    /// ```
    pub fn from_code(code: i64) -> Result<Self, FormulationError> {
        match code {
            1 => Ok(PenaltyNorm::L1),
            2 => Ok(PenaltyNorm::L2),
            3 => Ok(PenaltyNorm::Lipschitz),
            other => Err(FormulationError::InvalidConfiguration(format!(
                "Penalty must be 1, 2, or 3, got {}",
                other
            ))),
        }
    }

    /// The numeric selector of this norm
    pub fn code(self) -> i64 {
        match self {
            PenaltyNorm::L1 => 1,
            PenaltyNorm::L2 => 2,
            PenaltyNorm::Lipschitz => 3,
        }
    }
}

// region Parsing
fn invalid(kind: &str, value: &str) -> FormulationError {
    FormulationError::InvalidConfiguration(format!("unknown {} '{}'", kind, value))
}

impl FromStr for CompositionMode {
    type Err = FormulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "addi" | "additive" => Ok(CompositionMode::Additive),
            "mult" | "multiplicative" => Ok(CompositionMode::Multiplicative),
            _ => Err(invalid("composition", s)),
        }
    }
}

impl FromStr for FrontierDirection {
    type Err = FormulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(FrontierDirection::Production),
            "cost" => Ok(FrontierDirection::Cost),
            _ => Err(invalid("frontier", s)),
        }
    }
}

impl FromStr for ReturnsToScale {
    type Err = FormulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vrs" | "variable" => Ok(ReturnsToScale::Variable),
            "crs" | "constant" => Ok(ReturnsToScale::Constant),
            _ => Err(invalid("returns to scale", s)),
        }
    }
}

impl FromStr for LossType {
    type Err = FormulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quantile" | "cqr" => Ok(LossType::Quantile),
            "expectile" | "cer" => Ok(LossType::Expectile),
            _ => Err(invalid("loss", s)),
        }
    }
}
// endregion Parsing

/// Complete configuration of a convex quantile or expectile regression
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct ModelConfig {
    /// Composition of the error term
    #[builder(default = "CompositionMode::Additive")]
    pub composition: CompositionMode,
    /// Production or cost frontier
    #[builder(default = "FrontierDirection::Production")]
    pub direction: FrontierDirection,
    /// Returns to scale of the frontier
    #[builder(default = "ReturnsToScale::Variable")]
    pub returns_to_scale: ReturnsToScale,
    /// Quantile or expectile loss
    #[builder(default = "LossType::Quantile")]
    pub loss: LossType,
    /// Slope penalty, None for the unpenalized estimator
    #[builder(default = "None")]
    pub penalty: Option<PenaltyNorm>,
    /// Quantile or expectile level, in (0, 1)
    pub tau: f64,
    /// Penalty weight, or Lipschitz bound, at least 0
    #[builder(default = "0.")]
    pub eta: f64,
}

impl ModelConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(tau) = self.tau {
            check_tau(tau)?;
        }
        if let Some(eta) = self.eta {
            check_eta(eta)?;
        }
        Ok(())
    }

    /// Set the penalty from its numeric selector (1, 2 or 3)
    pub fn penalty_code(&mut self, code: i64) -> Result<&mut Self, FormulationError> {
        let norm = PenaltyNorm::from_code(code)?;
        Ok(self.penalty(Some(norm)))
    }
}

impl ModelConfig {
    /// Load a configuration from JSON and validate it
    ///
    /// # Examples
    /// ```rust
    /// use stonedrs_core::cnls::{ModelConfig, PenaltyNorm};
    /// let config = ModelConfig::from_json_str(r#"{
    ///     "composition": "Additive",
    ///     "direction": "Production",
    ///     "returns_to_scale": "Variable",
    ///     "loss": "Quantile",
    ///     "penalty": "L1",
    ///     "tau": 0.5,
    ///     "eta": 0.1
    /// }"#).unwrap();
    /// assert_eq!(config.penalty, Some(PenaltyNorm::L1));
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, FormulationError> {
        let config: ModelConfig = serde_json::from_str(json)
            .map_err(|e| FormulationError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the numeric parameters
    pub fn validate(&self) -> Result<(), FormulationError> {
        check_tau(self.tau)
            .and_then(|_| check_eta(self.eta))
            .map_err(FormulationError::InvalidConfiguration)
    }
}

impl Display for ModelConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}/{:?}(tau={})",
            self.composition, self.direction, self.returns_to_scale, self.loss, self.tau
        )?;
        match self.penalty {
            Some(norm) => write!(f, "/{:?}(eta={})", norm, self.eta),
            None => Ok(()),
        }
    }
}

fn check_tau(tau: f64) -> Result<(), String> {
    if tau > 0. && tau < 1. {
        Ok(())
    } else {
        Err(format!("tau must lie in (0, 1), got {}", tau))
    }
}

fn check_eta(eta: f64) -> Result<(), String> {
    if eta.is_finite() && eta >= 0. {
        Ok(())
    } else {
        Err(format!("eta must be finite and at least 0, got {}", eta))
    }
}
