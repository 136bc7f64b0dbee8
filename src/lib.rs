pub mod config;
pub mod distance;
#[cfg(feature = "microlp")]
pub mod heuristic;
pub mod history;
pub mod incumbent;
mod interval;
#[cfg(feature = "microlp")]
pub mod lp;
pub mod model;
pub mod monitor;
pub mod mps;
pub mod outcome;
pub mod perturb;
pub mod point;
pub mod portfolio;
pub mod problem;
pub mod pump;
pub mod ranking;
pub mod rounding;
pub mod state;
pub mod stats;

pub use config::{AlphaSchedule, ConfigError, PumpBuilder, PumpConfig};
pub use incumbent::{Incumbent, SharedIncumbent};
pub use model::{BoundScope, Model, ModelError, Row, RowSense, VarType, Variable};
pub use monitor::Termination;
pub use outcome::{FailureReason, Outcome, PumpError};
pub use problem::Problem;
pub use pump::{run, FeasibilityPump, IterationSummary, PerturbCause, PumpPhase};
pub use ranking::RankingPolicy;
pub use rounding::{RoundingPolicy, TieBreak};

/// Default numerical tolerance ε of a run.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Absolute row and bound tolerance of the full feasibility check, scaled by
/// `max(1, |rhs|)` for rows.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

/// Integer bounds are capped here (2^53), the largest range where every integer is an exact f64.
pub const MAX_INTEGER_BOUND: f64 = 9_007_199_254_740_992.0;
