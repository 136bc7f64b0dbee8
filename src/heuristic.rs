// Public API for using the feasibility pump as a MIP heuristic

use std::{
    sync::{atomic::AtomicBool, Arc},
    time::{Duration, Instant},
};

use log::info;

use crate::{
    config::{ConfigError, PumpConfig},
    lp::LpModel,
    outcome::{FailureReason, PumpError},
    portfolio::{run_portfolio_with_observer, PortfolioConfig, PortfolioResult},
    problem::Problem,
    pump::IterationSummary,
    rounding::RoundingPolicy,
};

/// Configuration for the feasibility pump heuristic
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicConfig {
    pub pump: PumpConfig,
    /// Number of independent pump runs, one thread each (default: 1 for embedded use)
    pub threads: usize,
    /// Time limit in seconds (default: 30.0)
    pub time_limit: f64,
    /// Vary the rounding policy across runs
    pub diversify: bool,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            pump: PumpConfig::default(),
            threads: 1,
            time_limit: 30.0,
            diversify: true,
        }
    }
}

impl HeuristicConfig {
    fn run_config(&self) -> PumpConfig {
        let mut pump = self.pump.clone();
        if let Ok(limit) = Duration::try_from_secs_f64(self.time_limit) {
            pump.time_budget = Some(pump.time_budget.map_or(limit, |b| b.min(limit)));
        }
        pump
    }
}

/// Solution status from the heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Found a feasible solution
    Feasible,
    /// The LP relaxation has no feasible point
    Infeasible,
    /// No feasible solution found within the budgets
    NoSolutionFound,
    /// Stopped by the time limit, a stop flag or the callback before finding a solution
    Interrupted,
}

/// Solution returned by the heuristic
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: SolutionStatus,
    pub objective_value: f64,
    pub variable_values: Vec<f64>,
    pub solve_time: f64,
    pub iterations: usize,
}

impl Solution {
    pub fn is_feasible(&self) -> bool {
        self.status == SolutionStatus::Feasible && self.objective_value.is_finite()
    }

    pub fn get_variable_value(&self, var_index: usize) -> Option<f64> {
        self.variable_values.get(var_index).copied()
    }

    fn from_portfolio(result: PortfolioResult, num_vars: usize, solve_time: f64) -> Self {
        let iterations = result.total_iterations();
        if let Some(best) = result.best {
            return Self {
                status: SolutionStatus::Feasible,
                objective_value: best.objective,
                variable_values: best.values,
                solve_time,
                iterations,
            };
        }
        let reasons = result
            .reports
            .iter()
            .filter_map(|r| r.outcome.failure_reason())
            .collect::<Vec<_>>();
        let status = if reasons.contains(&FailureReason::RelaxationInfeasible) {
            SolutionStatus::Infeasible
        } else if !reasons.is_empty() && reasons.iter().all(|r| *r == FailureReason::Cancelled) {
            SolutionStatus::Interrupted
        } else {
            SolutionStatus::NoSolutionFound
        };
        Self {
            status,
            objective_value: f64::INFINITY,
            variable_values: vec![0.0; num_vars],
            solve_time,
            iterations,
        }
    }
}

/// Main heuristic solver for embedding in MIP solvers
#[derive(Debug, Clone, Default)]
pub struct FeasibilityPumpHeuristic {
    config: HeuristicConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl FeasibilityPumpHeuristic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HeuristicConfig) -> Self {
        Self { config, stop: None }
    }

    /// Uses `stop` to cancel the runs from outside. The heuristic only reads
    /// the flag, so it can be reused across solves.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    /// Solve the given problem and return the best solution found
    pub fn solve(&self, problem: &Problem) -> Result<Solution, PumpError> {
        self.solve_with_callback(problem, |_, _| true)
    }

    /// Solve, reporting every pump iteration as `(run_id, summary)`. The
    /// callback returns false to stop that run.
    pub fn solve_with_callback<F>(&self, problem: &Problem, callback: F) -> Result<Solution, PumpError>
    where
        F: Fn(usize, &IterationSummary) -> bool + Sync,
    {
        let start_time = Instant::now();
        let model = LpModel::new(problem.clone());
        let portfolio = PortfolioConfig {
            runs: self.config.threads.max(1),
            diversify: self.config.diversify,
            stop_on_first_success: true,
        };
        let stop = self
            .stop
            .clone()
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        let result = run_portfolio_with_observer(
            &model,
            &self.config.run_config(),
            &portfolio,
            stop,
            &callback,
        )?;
        let solution =
            Solution::from_portfolio(result, problem.num_vars(), start_time.elapsed().as_secs_f64());
        info!(
            "{}: {:?} objective {} in {:.3}s, {} iterations.",
            problem.name,
            solution.status,
            solution.objective_value,
            solution.solve_time,
            solution.iterations
        );
        Ok(solution)
    }
}

/// Builder for easy heuristic configuration
#[derive(Debug, Clone, Default)]
pub struct HeuristicBuilder {
    config: HeuristicConfig,
}

impl HeuristicBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, n: usize) -> Self {
        self.config.threads = n;
        self
    }

    pub fn time_limit(mut self, seconds: f64) -> Self {
        self.config.time_limit = seconds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.pump.random_seed = seed;
        self
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.config.pump.max_iterations = n;
        self
    }

    pub fn rounding(mut self, policy: RoundingPolicy) -> Self {
        self.config.pump.rounding_policy = policy;
        self
    }

    pub fn diversify(mut self, diversify: bool) -> Self {
        self.config.diversify = diversify;
        self
    }

    pub fn pump(mut self, pump: PumpConfig) -> Self {
        self.config.pump = pump;
        self
    }

    pub fn build(self) -> Result<FeasibilityPumpHeuristic, ConfigError> {
        self.config.pump.validate()?;
        if self.config.threads == 0 {
            return Err(ConfigError::Zero("threads"));
        }
        Ok(FeasibilityPumpHeuristic::with_config(self.config))
    }
}
