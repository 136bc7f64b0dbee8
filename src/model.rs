//! The relaxation oracle consumed by the pump.
//!
//! A [`Model`] owns the variables, bounds and constraint rows of a MIP and can
//! re-solve its LP relaxation under an arbitrary linear objective. The pump
//! never mutates a model outside of a [`BoundScope`], which undoes every
//! temporary bound change when it goes out of scope.

use thiserror::Error;

use crate::{point::ContinuousPoint, problem, FEASIBILITY_TOLERANCE};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VarType {
    Integer,
    Continuous,
}

/// A column of the MIP. Bounds may be infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: Option<String>,
    pub var_type: VarType,
    pub lower: f64,
    pub upper: f64,
    pub objective: f64,
}

impl Variable {
    pub fn continuous(lower: f64, upper: f64, objective: f64) -> Self {
        Self {
            name: None,
            var_type: VarType::Continuous,
            lower,
            upper,
            objective,
        }
    }

    pub fn integer(lower: f64, upper: f64, objective: f64) -> Self {
        Self {
            name: None,
            var_type: VarType::Integer,
            lower,
            upper,
            objective,
        }
    }

    pub fn binary(objective: f64) -> Self {
        Self::integer(0., 1., objective)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.var_type, VarType::Integer)
    }

    pub fn is_binary(&self) -> bool {
        self.is_integer() && self.lower == 0. && self.upper == 1.
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RowSense {
    Equal,
    Lte,
    Gte,
}

/// A sparse linear constraint `sum(coeff * x[var]) <sense> rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub name: Option<String>,
    pub sense: RowSense,
    pub rhs: f64,
    pub coeffs: Vec<(usize, f64)>,
}

impl Row {
    pub fn new(sense: RowSense, rhs: f64, coeffs: Vec<(usize, f64)>) -> Self {
        Self {
            name: None,
            sense,
            rhs,
            coeffs,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn activity(&self, point: &[f64]) -> f64 {
        self.coeffs.iter().map(|&(v, c)| c * point[v]).sum()
    }

    /// Amount by which `lhs` misses the row; zero when satisfied.
    pub fn violation(&self, lhs: f64) -> f64 {
        match self.sense {
            RowSense::Equal => (lhs - self.rhs).abs(),
            RowSense::Lte => (lhs - self.rhs).max(0.),
            RowSense::Gte => (self.rhs - lhs).max(0.),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("the LP relaxation has no feasible point")]
    RelaxationInfeasible,
    #[error("bounds [{lower}, {upper}] are empty for variable {var}")]
    BoundsInfeasible { var: usize, lower: f64, upper: f64 },
    #[error("LP backend failure: {0}")]
    Backend(String),
}

/// The relaxation oracle.
///
/// Variable indexing is stable for the lifetime of a run. `get_variables`
/// reports the *current* bounds, so a model inside a [`BoundScope`] shows the
/// tightened domains.
pub trait Model {
    fn get_variables(&self) -> &[Variable];

    fn rows(&self) -> &[Row];

    /// Minimizes `objective` over the LP relaxation under the current bounds.
    fn solve_relaxation(&mut self, objective: &[f64]) -> Result<ContinuousPoint, ModelError>;

    /// Replaces the bounds of `var`. Fails with [`ModelError::BoundsInfeasible`]
    /// when `lower > upper`.
    fn tighten_bounds(&mut self, var: usize, lower: f64, upper: f64) -> Result<(), ModelError>;

    /// Puts back bounds previously read from `get_variables`. Never fails.
    fn restore_bounds(&mut self, var: usize, lower: f64, upper: f64);

    fn check_full_feasibility(&self, point: &[f64]) -> bool {
        problem::check_point(self.get_variables(), self.rows(), point, FEASIBILITY_TOLERANCE)
            .is_ok()
    }

    fn original_objective(&self) -> Vec<f64> {
        self.get_variables().iter().map(|v| v.objective).collect()
    }

    fn objective_offset(&self) -> f64 {
        0.
    }

    fn num_vars(&self) -> usize {
        self.get_variables().len()
    }
}

impl<M: Model + ?Sized> Model for &mut M {
    fn get_variables(&self) -> &[Variable] {
        (**self).get_variables()
    }

    fn rows(&self) -> &[Row] {
        (**self).rows()
    }

    fn solve_relaxation(&mut self, objective: &[f64]) -> Result<ContinuousPoint, ModelError> {
        (**self).solve_relaxation(objective)
    }

    fn tighten_bounds(&mut self, var: usize, lower: f64, upper: f64) -> Result<(), ModelError> {
        (**self).tighten_bounds(var, lower, upper)
    }

    fn restore_bounds(&mut self, var: usize, lower: f64, upper: f64) {
        (**self).restore_bounds(var, lower, upper)
    }

    fn check_full_feasibility(&self, point: &[f64]) -> bool {
        (**self).check_full_feasibility(point)
    }

    fn original_objective(&self) -> Vec<f64> {
        (**self).original_objective()
    }

    fn objective_offset(&self) -> f64 {
        (**self).objective_offset()
    }
}

/// Temporary bound changes on a model.
///
/// Every successful [`tighten`](BoundScope::tighten) is recorded and undone,
/// newest first, when the scope is dropped.
pub struct BoundScope<'a, M: Model + ?Sized> {
    model: &'a mut M,
    saved: Vec<(usize, f64, f64)>,
}

impl<'a, M: Model + ?Sized> BoundScope<'a, M> {
    pub fn new(model: &'a mut M) -> Self {
        Self {
            model,
            saved: Vec::new(),
        }
    }

    pub fn tighten(&mut self, var: usize, lower: f64, upper: f64) -> Result<(), ModelError> {
        let current = &self.model.get_variables()[var];
        let (old_lower, old_upper) = (current.lower, current.upper);
        self.model.tighten_bounds(var, lower, upper)?;
        self.saved.push((var, old_lower, old_upper));
        Ok(())
    }

    pub fn model(&self) -> &M {
        self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        self.model
    }

    pub fn num_changes(&self) -> usize {
        self.saved.len()
    }
}

impl<M: Model + ?Sized> Drop for BoundScope<'_, M> {
    fn drop(&mut self) {
        while let Some((var, lower, upper)) = self.saved.pop() {
            self.model.restore_bounds(var, lower, upper);
        }
    }
}
