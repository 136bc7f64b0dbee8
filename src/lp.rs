//! [`Model`] backed by the `microlp` simplex solver.
//!
//! The relaxation is rebuilt from the owned [`Problem`] on every solve, so
//! bound changes are plain writes into the problem's variables.

use log::{trace, warn};
use microlp::{ComparisonOp, OptimizationDirection};

use crate::{
    model::{Model, ModelError, Row, RowSense, Variable},
    point::ContinuousPoint,
    problem::Problem,
};

#[derive(Debug, Clone)]
pub struct LpModel {
    problem: Problem,
}

impl LpModel {
    pub fn new(problem: Problem) -> Self {
        Self { problem }
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    fn relaxation(&self, objective: &[f64]) -> (microlp::Problem, Vec<microlp::Variable>) {
        let mut lp = microlp::Problem::new(OptimizationDirection::Minimize);
        let vars = self
            .problem
            .variables
            .iter()
            .zip(objective)
            .map(|(v, &c)| lp.add_var(c, (v.lower, v.upper)))
            .collect::<Vec<_>>();

        for row in &self.problem.rows {
            // microlp rejects repeated variables within one constraint
            let mut coeffs = row.coeffs.clone();
            coeffs.sort_unstable_by_key(|&(j, _)| j);
            coeffs.dedup_by(|(j, a), (k, b)| {
                if j == k {
                    *b += *a;
                    true
                } else {
                    false
                }
            });
            coeffs.retain(|&(_, a)| a != 0.);
            if coeffs.is_empty() {
                continue;
            }
            let op = match row.sense {
                RowSense::Equal => ComparisonOp::Eq,
                RowSense::Lte => ComparisonOp::Le,
                RowSense::Gte => ComparisonOp::Ge,
            };
            lp.add_constraint(
                coeffs.into_iter().map(|(j, a)| (vars[j], a)),
                op,
                row.rhs,
            );
        }
        (lp, vars)
    }
}

impl From<Problem> for LpModel {
    fn from(problem: Problem) -> Self {
        Self::new(problem)
    }
}

impl Model for LpModel {
    fn get_variables(&self) -> &[Variable] {
        &self.problem.variables
    }

    fn rows(&self) -> &[Row] {
        &self.problem.rows
    }

    fn solve_relaxation(&mut self, objective: &[f64]) -> Result<ContinuousPoint, ModelError> {
        if objective.len() != self.problem.num_vars() {
            return Err(ModelError::Backend(format!(
                "objective has {} coefficients for {} variables",
                objective.len(),
                self.problem.num_vars()
            )));
        }
        if let Some((var, v)) = self
            .problem
            .variables
            .iter()
            .enumerate()
            .find(|(_, v)| v.lower > v.upper)
        {
            trace!("empty domain for var {} before solving", var);
            return Err(ModelError::BoundsInfeasible {
                var,
                lower: v.lower,
                upper: v.upper,
            });
        }

        let (lp, vars) = self.relaxation(objective);
        match lp.solve() {
            Ok(solution) => Ok(vars.iter().map(|&v| solution[v]).collect()),
            Err(microlp::Error::Infeasible) => Err(ModelError::RelaxationInfeasible),
            Err(e) => {
                warn!("LP relaxation failed: {}", e);
                Err(ModelError::Backend(e.to_string()))
            }
        }
    }

    fn tighten_bounds(&mut self, var: usize, lower: f64, upper: f64) -> Result<(), ModelError> {
        if lower > upper {
            return Err(ModelError::BoundsInfeasible { var, lower, upper });
        }
        self.restore_bounds(var, lower, upper);
        Ok(())
    }

    fn restore_bounds(&mut self, var: usize, lower: f64, upper: f64) {
        let v = &mut self.problem.variables[var];
        v.lower = lower;
        v.upper = upper;
    }

    fn objective_offset(&self) -> f64 {
        self.problem.objective_offset
    }
}
