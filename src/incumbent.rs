//! Best feasible point of a run, and its thread-safe holder for portfolios.
//!
//! Both only ever accept strictly better points (minimization), so the
//! objective of the stored incumbent is non-increasing over time.

use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub struct Incumbent {
    pub values: Vec<f64>,
    pub objective: f64,
}

impl Incumbent {
    pub fn new(values: Vec<f64>, objective: f64) -> Self {
        Self { values, objective }
    }

    pub fn improves_on(&self, current: Option<&Incumbent>) -> bool {
        match current {
            None => !self.objective.is_nan(),
            Some(current) => self.objective < current.objective,
        }
    }
}

/// Installs `candidate` into `slot` if it is strictly better. Returns whether it was installed.
pub fn offer(slot: &mut Option<Incumbent>, candidate: Incumbent) -> bool {
    if candidate.improves_on(slot.as_ref()) {
        *slot = Some(candidate);
        true
    } else {
        false
    }
}

/// An incumbent shared between concurrent runs.
#[derive(Debug, Default)]
pub struct SharedIncumbent {
    best: Mutex<Option<Incumbent>>,
}

impl SharedIncumbent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare-and-swap under the lock; worse or equal candidates are rejected.
    pub fn try_install(&self, candidate: &Incumbent) -> bool {
        let mut guard = self.best.lock().unwrap_or_else(PoisonError::into_inner);
        if candidate.improves_on(guard.as_ref()) {
            *guard = Some(candidate.clone());
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self) -> Option<Incumbent> {
        self.best
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn objective(&self) -> Option<f64> {
        self.best
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|i| i.objective)
    }

    pub fn into_inner(self) -> Option<Incumbent> {
        self.best.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
