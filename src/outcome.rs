use std::fmt;

use thiserror::Error;

use crate::{config::ConfigError, incumbent::Incumbent, model::ModelError};

/// Why a run ended without a feasible point. None of these is a defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    RelaxationInfeasible,
    IterationLimit,
    MaxRestartsExceeded,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::RelaxationInfeasible => "relaxation infeasible",
            FailureReason::IterationLimit => "iteration limit",
            FailureReason::MaxRestartsExceeded => "maximum restarts exceeded",
            FailureReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        /// Dense values for every model variable.
        point: Vec<f64>,
        objective: f64,
        iterations: usize,
    },
    Failure {
        reason: FailureReason,
        iterations: usize,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn iterations(&self) -> usize {
        match self {
            Outcome::Success { iterations, .. } | Outcome::Failure { iterations, .. } => {
                *iterations
            }
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { reason, .. } => Some(*reason),
        }
    }

    pub fn incumbent(&self) -> Option<Incumbent> {
        match self {
            Outcome::Success {
                point, objective, ..
            } => Some(Incumbent::new(point.clone(), *objective)),
            Outcome::Failure { .. } => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success {
                objective,
                iterations,
                ..
            } => write!(f, "success(objective: {objective}, iterations: {iterations})"),
            Outcome::Failure { reason, iterations } => {
                write!(f, "failure({reason}, iterations: {iterations})")
            }
        }
    }
}

/// Errors that abort a run instead of producing an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PumpError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("pump worker {0} panicked")]
    WorkerPanicked(usize),
}
