use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    TimeBudget,
}

/// Cooperative cancellation: any number of shared stop flags and an optional
/// wall-clock budget, polled by the pump at the top of every iteration. The
/// flags are only ever read here.
#[derive(Debug, Clone)]
pub struct Termination {
    stops: Vec<Arc<AtomicBool>>,
    start: Instant,
    budget: Option<Duration>,
}

impl Default for Termination {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Termination {
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            stops: Vec::new(),
            start: Instant::now(),
            budget,
        }
    }

    /// Adds a flag; raising any of them interrupts the run.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stops.push(stop);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn check(&self) -> Option<StopReason> {
        if self.stops.iter().any(|stop| stop.load(Ordering::Relaxed)) {
            return Some(StopReason::Interrupted);
        }
        match self.budget {
            Some(budget) if self.start.elapsed() >= budget => Some(StopReason::TimeBudget),
            _ => None,
        }
    }
}
