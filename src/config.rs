use std::{str::FromStr, time::Duration};

use thiserror::Error;

use crate::{
    ranking::RankingPolicy,
    rounding::{RoundingPolicy, TieBreak},
    DEFAULT_TOLERANCE,
};

/// How the objective weight α moves each iteration. α is reset to
/// `initial_alpha` on restart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaSchedule {
    Constant,
    /// `α <- α * factor`
    Geometric(f64),
    /// `α <- max(0, α - step)`
    Linear(f64),
}

/// α values below this snap to zero so the pump ends up purely feasibility driven.
pub const ALPHA_FLOOR: f64 = 1e-3;

impl AlphaSchedule {
    pub fn next(&self, alpha: f64) -> f64 {
        let next = match *self {
            AlphaSchedule::Constant => alpha,
            AlphaSchedule::Geometric(factor) => alpha * factor,
            AlphaSchedule::Linear(step) => (alpha - step).max(0.),
        };
        if next < ALPHA_FLOOR {
            0.
        } else {
            next
        }
    }
}

impl FromStr for AlphaSchedule {
    type Err = ConfigError;

    /// `constant`, `geometric:<factor>` or `linear:<step>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };
        let parse_arg = |default: f64| -> Result<f64, ConfigError> {
            arg.map(|a| {
                a.parse::<f64>()
                    .map_err(|_| ConfigError::Parse(s.to_string()))
            })
            .unwrap_or(Ok(default))
        };
        match kind {
            "constant" => Ok(AlphaSchedule::Constant),
            "geometric" => Ok(AlphaSchedule::Geometric(parse_arg(0.9)?)),
            "linear" => Ok(AlphaSchedule::Linear(parse_arg(0.1)?)),
            _ => Err(ConfigError::Parse(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("cannot parse option value '{0}'")]
    Parse(String),
}

/// Options of one pump run.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpConfig {
    /// Iteration budget across all restarts.
    pub max_iterations: usize,
    /// Restarts allowed before the run gives up with `MaxRestartsExceeded`.
    pub max_restarts: usize,
    /// Wall-clock budget; exceeding it ends the run as `Cancelled`.
    pub time_budget: Option<Duration>,
    pub rounding_policy: RoundingPolicy,
    /// Direction of exact `.5` ties for nearest rounding.
    pub tie_break: TieBreak,
    pub ranking_policy: RankingPolicy,
    /// Score removed per recent flip of a variable (visit-penalized ranking).
    pub visit_penalty: f64,
    /// Fraction of ranked variables flipped per perturbation.
    pub perturbation_fraction: f64,
    /// Magnitude of each flip.
    pub perturbation_step: i64,
    /// Consecutive iterations without a strict distance decrease before perturbing.
    pub stall_window: usize,
    /// Perturbations tolerated before restarting.
    pub stall_ceiling: usize,
    /// Objective weight of the first solve; 1 starts from the LP optimum.
    pub initial_alpha: f64,
    pub alpha_schedule: AlphaSchedule,
    pub random_seed: u64,
    /// Round with the randomized policy right after a restart.
    pub randomize_restarts: bool,
    /// Also accept a rounding before the distance reaches zero when its
    /// completion with the LP's continuous values is feasible. Accepted points
    /// go through the same fix-and-resolve check as a converged one.
    pub early_acceptance: bool,
    pub cycle_history_size: usize,
    pub tolerance_epsilon: f64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_restarts: 10,
            time_budget: None,
            rounding_policy: RoundingPolicy::Nearest,
            tie_break: TieBreak::LargerRange,
            ranking_policy: RankingPolicy::VisitPenalized,
            visit_penalty: 0.1,
            perturbation_fraction: 0.15,
            perturbation_step: 1,
            stall_window: 3,
            stall_ceiling: 5,
            initial_alpha: 1.0,
            alpha_schedule: AlphaSchedule::Geometric(0.9),
            random_seed: 0,
            randomize_restarts: true,
            early_acceptance: true,
            cycle_history_size: 16,
            tolerance_epsilon: DEFAULT_TOLERANCE,
        }
    }
}

impl PumpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("initial_alpha", self.initial_alpha, 0., 1.)?;
        check_range("perturbation_fraction", self.perturbation_fraction, 0., 1.)?;
        check_range("visit_penalty", self.visit_penalty, 0., f64::MAX)?;
        check_range("tolerance_epsilon", self.tolerance_epsilon, f64::MIN_POSITIVE, 0.5)?;
        match self.alpha_schedule {
            AlphaSchedule::Constant => {}
            AlphaSchedule::Geometric(factor) => check_range("alpha decay factor", factor, 0., 1.)?,
            AlphaSchedule::Linear(step) => check_range("alpha decay step", step, 0., 1.)?,
        }
        if self.perturbation_step < 1 {
            return Err(ConfigError::Zero("perturbation_step"));
        }
        if self.cycle_history_size == 0 {
            return Err(ConfigError::Zero("cycle_history_size"));
        }
        if self.stall_window == 0 {
            return Err(ConfigError::Zero("stall_window"));
        }
        Ok(())
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    // NaN fails both comparisons
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

/// Fluent construction of a [`PumpConfig`].
#[derive(Debug, Clone, Default)]
pub struct PumpBuilder {
    config: PumpConfig,
}

impl PumpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.config.max_iterations = n;
        self
    }

    pub fn max_restarts(mut self, n: usize) -> Self {
        self.config.max_restarts = n;
        self
    }

    pub fn time_budget(mut self, budget: Duration) -> Self {
        self.config.time_budget = Some(budget);
        self
    }

    pub fn rounding(mut self, policy: RoundingPolicy) -> Self {
        self.config.rounding_policy = policy;
        self
    }

    pub fn tie_break(mut self, tie_break: TieBreak) -> Self {
        self.config.tie_break = tie_break;
        self
    }

    pub fn ranking(mut self, policy: RankingPolicy) -> Self {
        self.config.ranking_policy = policy;
        self
    }

    pub fn visit_penalty(mut self, penalty: f64) -> Self {
        self.config.visit_penalty = penalty;
        self
    }

    pub fn perturbation(mut self, fraction: f64, step: i64) -> Self {
        self.config.perturbation_fraction = fraction;
        self.config.perturbation_step = step;
        self
    }

    pub fn stall(mut self, window: usize, ceiling: usize) -> Self {
        self.config.stall_window = window;
        self.config.stall_ceiling = ceiling;
        self
    }

    pub fn alpha(mut self, initial: f64, schedule: AlphaSchedule) -> Self {
        self.config.initial_alpha = initial;
        self.config.alpha_schedule = schedule;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    pub fn randomize_restarts(mut self, randomize: bool) -> Self {
        self.config.randomize_restarts = randomize;
        self
    }

    pub fn early_acceptance(mut self, accept: bool) -> Self {
        self.config.early_acceptance = accept;
        self
    }

    pub fn history(mut self, size: usize) -> Self {
        self.config.cycle_history_size = size;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.tolerance_epsilon = epsilon;
        self
    }

    pub fn build(self) -> Result<PumpConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
