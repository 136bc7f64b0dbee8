use thiserror::Error;

use crate::model::{Row, Variable};

/// An owned MIP: minimize `objective . x + offset` subject to rows and bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problem {
    pub name: String,
    pub variables: Vec<Variable>,
    pub rows: Vec<Row>,
    pub objective_offset: f64,
}

impl Problem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_var(&mut self, var: Variable) -> usize {
        self.variables.push(var);
        self.variables.len() - 1
    }

    pub fn add_row(&mut self, row: Row) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    pub fn num_vars(&self) -> usize {
        self.variables.len()
    }

    pub fn num_integer_vars(&self) -> usize {
        self.variables.iter().filter(|v| v.is_integer()).count()
    }

    pub fn objective_value(&self, point: &[f64]) -> f64 {
        self.objective_offset
            + self
                .variables
                .iter()
                .zip(point)
                .map(|(v, x)| v.objective * x)
                .sum::<f64>()
    }

    pub fn check(&self, point: &[f64], tolerance: f64) -> Result<(), Violation> {
        check_point(&self.variables, &self.rows, point, tolerance)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("point has {found} values, expected {expected}")]
    Dimension { expected: usize, found: usize },
    #[error("variable {var} = {value} is not integral")]
    Integrality { var: usize, value: f64 },
    #[error("variable {var} = {value} is outside [{lower}, {upper}]")]
    Bound {
        var: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },
    #[error("row {row} has activity {activity}, violated by {amount}")]
    Row {
        row: usize,
        activity: f64,
        amount: f64,
    },
}

/// Checks integrality, bounds and every row. Row tolerances scale with `|rhs|`.
pub fn check_point(
    variables: &[Variable],
    rows: &[Row],
    point: &[f64],
    tolerance: f64,
) -> Result<(), Violation> {
    if point.len() != variables.len() {
        return Err(Violation::Dimension {
            expected: variables.len(),
            found: point.len(),
        });
    }

    for (var, (info, &value)) in variables.iter().zip(point).enumerate() {
        if !value.is_finite() {
            return Err(Violation::Bound {
                var,
                value,
                lower: info.lower,
                upper: info.upper,
            });
        }
        if info.is_integer() && (value - value.round()).abs() > tolerance {
            return Err(Violation::Integrality { var, value });
        }
        if value < info.lower - tolerance || value > info.upper + tolerance {
            return Err(Violation::Bound {
                var,
                value,
                lower: info.lower,
                upper: info.upper,
            });
        }
    }

    for (idx, row) in rows.iter().enumerate() {
        let activity = row.activity(point);
        let amount = row.violation(activity);
        if amount > tolerance * row.rhs.abs().max(1.) {
            return Err(Violation::Row {
                row: idx,
                activity,
                amount,
            });
        }
    }

    Ok(())
}
