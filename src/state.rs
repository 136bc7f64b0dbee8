use rand::SeedableRng;
use rand_xoshiro::SplitMix64;

use crate::{config::PumpConfig, history::CandidateHistory};

/// Cross-iteration memory of one pump run. Owned by the driver.
#[derive(Debug, Clone)]
pub struct PumpState {
    /// Iterations performed in this run, across restarts.
    pub iteration: usize,
    pub restarts: usize,
    pub alpha: f64,
    /// Perturbations since the last restart or new best distance.
    pub stall: usize,
    /// Consecutive iterations whose distance did not strictly decrease.
    pub non_improving: usize,
    pub last_distance: f64,
    pub best_distance: f64,
    pub history: CandidateHistory,
    /// Recent flips per integer position.
    pub visits: Vec<u32>,
    /// Distance weights of the previous iteration, dense over model variables.
    pub weights: Vec<f64>,
    /// Use randomized rounding for the next iteration only.
    pub randomize_next: bool,
    pub rng: SplitMix64,
}

impl PumpState {
    pub fn new(config: &PumpConfig, num_vars: usize, num_integer: usize) -> Self {
        Self {
            iteration: 0,
            restarts: 0,
            alpha: config.initial_alpha,
            stall: 0,
            non_improving: 0,
            last_distance: f64::INFINITY,
            best_distance: f64::INFINITY,
            history: CandidateHistory::new(config.cycle_history_size),
            visits: vec![0; num_integer],
            weights: vec![0.; num_vars],
            randomize_next: false,
            rng: SplitMix64::seed_from_u64(config.random_seed),
        }
    }

    /// Records this iteration's distance. Returns `true` once the distance has
    /// failed to strictly decrease for `stall_window` iterations in a row.
    pub fn record_distance(&mut self, distance: f64, stall_window: usize) -> bool {
        if distance < self.last_distance {
            self.non_improving = 0;
        } else {
            self.non_improving += 1;
        }
        self.last_distance = distance;
        if distance < self.best_distance {
            self.best_distance = distance;
            self.stall = 0;
        }
        self.non_improving >= stall_window
    }

    /// Clears progress tracking after a perturbation so the perturbed target
    /// gets a fresh stall window.
    pub fn after_perturbation(&mut self) {
        self.stall += 1;
        self.non_improving = 0;
        self.last_distance = f64::INFINITY;
    }

    /// Everything but the iteration counter, restart counter and rng goes back
    /// to its initial value.
    pub fn restart(&mut self, config: &PumpConfig) {
        self.restarts += 1;
        self.alpha = config.initial_alpha;
        self.stall = 0;
        self.non_improving = 0;
        self.last_distance = f64::INFINITY;
        self.best_distance = f64::INFINITY;
        self.history.clear();
        self.visits.iter_mut().for_each(|v| *v = 0);
        self.weights.iter_mut().for_each(|w| *w = 0.);
        self.randomize_next = config.randomize_restarts;
    }

    pub fn advance_alpha(&mut self, config: &PumpConfig) {
        self.alpha = config.alpha_schedule.next(self.alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::CandidatePoint;

    #[test]
    fn test_stall_window_counts_consecutive_non_improvements() {
        let mut state = PumpState::new(&PumpConfig::default(), 2, 2);
        assert!(!state.record_distance(3., 2));
        assert!(!state.record_distance(3., 2));
        assert!(state.record_distance(4., 2));
        assert!(!state.record_distance(1., 2));
    }

    #[test]
    fn test_new_best_distance_clears_stall() {
        let mut state = PumpState::new(&PumpConfig::default(), 2, 2);
        state.record_distance(2., 3);
        state.after_perturbation();
        state.after_perturbation();
        assert_eq!(state.stall, 2);
        state.record_distance(2.5, 3);
        assert_eq!(state.stall, 2);
        state.record_distance(1., 3);
        assert_eq!(state.stall, 0);
    }

    #[test]
    fn test_restart_resets_run_memory() {
        let config = PumpConfig {
            initial_alpha: 0.5,
            ..Default::default()
        };
        let mut state = PumpState::new(&config, 3, 2);
        state.iteration = 7;
        state.alpha = 0.1;
        state.stall = 4;
        state.visits[1] = 3;
        state.weights[0] = -1.;
        state.history.push(CandidatePoint::new(vec![1, 0]));

        state.restart(&config);

        assert_eq!(state.iteration, 7);
        assert_eq!(state.restarts, 1);
        assert_eq!(state.alpha, 0.5);
        assert_eq!(state.stall, 0);
        assert_eq!(state.visits, vec![0, 0]);
        assert_eq!(state.weights, vec![0.; 3]);
        assert!(state.history.is_empty());
        assert!(state.randomize_next);
    }
}
