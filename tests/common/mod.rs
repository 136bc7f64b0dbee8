#![allow(dead_code)]

use fpump::{point::ContinuousPoint, Model, ModelError, Problem, Row, RowSense, Variable};

/// A relaxation oracle replaying fixed LP points.
///
/// The last scripted point repeats forever. Every call is counted, including
/// the re-solve of the convergence check.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    pub problem: Problem,
    points: Vec<ContinuousPoint>,
    pub solves: usize,
    pub objectives: Vec<Vec<f64>>,
    /// Solve calls (0-based) that report an infeasible relaxation.
    pub infeasible_on: Vec<usize>,
    /// Overrides the row-based feasibility check.
    pub feasible: Option<bool>,
    /// Every bound tightening fails.
    pub reject_tightening: bool,
}

impl ScriptedModel {
    pub fn new(problem: Problem, points: Vec<ContinuousPoint>) -> Self {
        assert!(!points.is_empty());
        Self {
            problem,
            points,
            solves: 0,
            objectives: Vec::new(),
            infeasible_on: Vec::new(),
            feasible: None,
            reject_tightening: false,
        }
    }

    pub fn constant(problem: Problem, point: ContinuousPoint) -> Self {
        Self::new(problem, vec![point])
    }

    pub fn infeasible_on(mut self, solve: usize) -> Self {
        self.infeasible_on.push(solve);
        self
    }

    pub fn with_feasibility(mut self, feasible: bool) -> Self {
        self.feasible = Some(feasible);
        self
    }

    pub fn rejecting_tightening(mut self) -> Self {
        self.reject_tightening = true;
        self
    }
}

impl Model for ScriptedModel {
    fn get_variables(&self) -> &[Variable] {
        &self.problem.variables
    }

    fn rows(&self) -> &[Row] {
        &self.problem.rows
    }

    fn solve_relaxation(&mut self, objective: &[f64]) -> Result<ContinuousPoint, ModelError> {
        let call = self.solves;
        self.solves += 1;
        self.objectives.push(objective.to_vec());
        if self.infeasible_on.contains(&call) {
            return Err(ModelError::RelaxationInfeasible);
        }
        Ok(self.points[call.min(self.points.len() - 1)].clone())
    }

    fn tighten_bounds(&mut self, var: usize, lower: f64, upper: f64) -> Result<(), ModelError> {
        if lower > upper || self.reject_tightening {
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

    fn check_full_feasibility(&self, point: &[f64]) -> bool {
        self.feasible
            .unwrap_or_else(|| self.problem.check(point, 1e-6).is_ok())
    }

    fn objective_offset(&self) -> f64 {
        self.problem.objective_offset
    }
}

/// `n` binaries with objective 1 and no rows.
pub fn binaries(n: usize) -> Problem {
    let mut p = Problem::new("binaries");
    for _ in 0..n {
        p.add_var(Variable::binary(1.));
    }
    p
}

/// Two binaries with `x1 + x2 = 1`.
pub fn partition() -> Problem {
    let mut p = binaries(2);
    p.add_row(Row::new(RowSense::Equal, 1., vec![(0, 1.), (1, 1.)]));
    p
}
