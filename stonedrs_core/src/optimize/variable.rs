//! Module providing representation of optimization problem variables
use std::fmt::{Display, Formatter};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Position of a variable within a [`Problem`](crate::optimize::problem::Problem)
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(pub usize);

/// A single continuous decision variable
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct Variable {
    /// Used to identify the variable, e.g. `beta[3,0]`
    pub id: String,
    /// Human-readable description of the variable
    #[builder(default = "None")]
    pub name: Option<String>,
    /// Lowest value the variable can take
    #[builder(default = "f64::NEG_INFINITY")]
    pub lower_bound: f64,
    /// Highest value the variable can take
    #[builder(default = "f64::INFINITY")]
    pub upper_bound: f64,
    /// Index of the variable in the problem, assigned when the variable is added
    #[builder(default = "0")]
    pub(crate) index: usize,
}

impl Variable {
    /// The position of this variable in its problem
    pub fn variable_id(&self) -> VariableId {
        VariableId(self.index)
    }

    /// Whether the variable is restricted to be non-negative
    pub fn is_non_negative(&self) -> bool {
        self.lower_bound >= 0.
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}({})", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// A contiguous, indexed family of variables sharing a name and bounds
///
/// Blocks are laid out row major, so `beta[i,j]` of a block with dimensions `[n, m]`
/// lives at `offset + i*m + j`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableBlock {
    /// Name shared by all variables of the block
    pub name: String,
    /// Index of the first variable of the block in the problem
    pub(crate) offset: usize,
    /// Extent of each index of the block, one or two entries
    pub(crate) dims: Vec<usize>,
}

impl VariableBlock {
    /// Total number of variables in the block
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    /// True if the block holds no variables (e.g. no contextual variables)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extent of each index of the block
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Variable of a one dimensional block
    ///
    /// # Panics
    /// If `i` is outside the block
    pub fn at(&self, i: usize) -> VariableId {
        assert!(i < self.len(), "index {} outside of block {}", i, self.name);
        VariableId(self.offset + i)
    }

    /// Variable of a two dimensional block
    ///
    /// # Panics
    /// If the block is not two dimensional or `(i, j)` is outside the block
    pub fn at2(&self, i: usize, j: usize) -> VariableId {
        assert_eq!(self.dims.len(), 2, "block {} is not two dimensional", self.name);
        assert!(
            i < self.dims[0] && j < self.dims[1],
            "index ({}, {}) outside of block {}",
            i,
            j,
            self.name
        );
        VariableId(self.offset + i * self.dims[1] + j)
    }

    /// All variables of the block, in layout order
    pub fn ids(&self) -> impl Iterator<Item = VariableId> + '_ {
        (self.offset..self.offset + self.len()).map(VariableId)
    }

    /// Id string of the variable at the given multi-index, e.g. `alpha[2]` or `beta[2,0]`
    pub(crate) fn element_id(&self, index: &[usize]) -> String {
        let joined = index
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("{}[{}]", self.name, joined)
    }

    /// Enumerate the multi-indices of the block in layout order
    pub(crate) fn multi_indices(&self) -> Vec<Vec<usize>> {
        match self.dims.as_slice() {
            [n] => (0..*n).map(|i| vec![i]).collect(),
            [n, m] => (0..*n)
                .flat_map(|i| (0..*m).map(move |j| vec![i, j]))
                .collect(),
            _ => Vec::new(),
        }
    }
}
