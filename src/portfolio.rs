//! Independent pump runs on private model copies, executed concurrently and
//! sharing only the best incumbent.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::info;

use crate::{
    config::PumpConfig,
    incumbent::{Incumbent, SharedIncumbent},
    model::Model,
    monitor::Termination,
    outcome::{Outcome, PumpError},
    pump::{FeasibilityPump, IterationSummary},
    rounding::RoundingPolicy,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioConfig {
    pub runs: usize,
    /// Cycle runs through nearest (the configured policy), randomized and
    /// propagation rounding.
    pub diversify: bool,
    /// Cancel the remaining runs as soon as one run succeeds.
    pub stop_on_first_success: bool,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            runs: 1,
            diversify: true,
            stop_on_first_success: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: usize,
    pub seed: u64,
    pub rounding_policy: RoundingPolicy,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioResult {
    pub best: Option<Incumbent>,
    /// One report per run, ordered by run id.
    pub reports: Vec<RunReport>,
}

impl PortfolioResult {
    pub fn total_iterations(&self) -> usize {
        self.reports.iter().map(|r| r.outcome.iterations()).sum()
    }
}

/// Configuration of run `k`: seed offset by `k`, and the rounding policy
/// rotated when diversifying.
pub fn run_config(base: &PumpConfig, portfolio: &PortfolioConfig, k: usize) -> PumpConfig {
    let mut config = base.clone();
    config.random_seed = base.random_seed.wrapping_add(k as u64);
    if portfolio.diversify {
        config.rounding_policy = match k % 3 {
            0 => base.rounding_policy,
            1 => RoundingPolicy::Randomized,
            _ => RoundingPolicy::Propagation,
        };
    }
    config
}

pub fn run_portfolio<M>(
    model: &M,
    config: &PumpConfig,
    portfolio: &PortfolioConfig,
    stop: Arc<AtomicBool>,
) -> Result<PortfolioResult, PumpError>
where
    M: Model + Clone + Send,
{
    run_portfolio_with_observer(model, config, portfolio, stop, &|_, _| true)
}

/// Like [`run_portfolio`], reporting every iteration of every run as
/// `(run_id, summary)`. An observer returning `false` cancels that run only.
///
/// Raising `stop` cancels every run; the portfolio never writes to it. The
/// first-success stop uses a flag private to this call.
pub fn run_portfolio_with_observer<M, F>(
    model: &M,
    config: &PumpConfig,
    portfolio: &PortfolioConfig,
    stop: Arc<AtomicBool>,
    observer: &F,
) -> Result<PortfolioResult, PumpError>
where
    M: Model + Clone + Send,
    F: Fn(usize, &IterationSummary) -> bool + Sync,
{
    config.validate()?;
    let shared = SharedIncumbent::new();
    let shared = &shared;
    let succeeded = Arc::new(AtomicBool::new(false));

    let reports = crossbeam::scope(|s| {
        let handles = (0..portfolio.runs.max(1))
            .map(|run_id| {
                let config = run_config(config, portfolio, run_id);
                let mut model = model.clone();
                let stop = Arc::clone(&stop);
                let succeeded = Arc::clone(&succeeded);
                s.spawn(move |_| -> Result<RunReport, PumpError> {
                    let termination = Termination::new(config.time_budget)
                        .with_stop_flag(stop)
                        .with_stop_flag(Arc::clone(&succeeded));
                    let outcome = FeasibilityPump::new(&mut model, config.clone())
                        .with_termination(termination)
                        .with_run_id(run_id)
                        .run_with_observer(|summary| observer(run_id, summary))?;

                    if let Some(found) = outcome.incumbent() {
                        if shared.try_install(&found) {
                            info!("id:{} New incumbent {}.", run_id, found.objective);
                        }
                        if portfolio.stop_on_first_success {
                            succeeded.store(true, Ordering::Relaxed);
                        }
                    }
                    Ok(RunReport {
                        run_id,
                        seed: config.random_seed,
                        rounding_policy: config.rounding_policy,
                        outcome,
                    })
                })
            })
            .collect::<Vec<_>>();

        handles
            .into_iter()
            .enumerate()
            .map(|(run_id, h)| h.join().map_err(|_| PumpError::WorkerPanicked(run_id))?)
            .collect::<Result<Vec<_>, _>>()
    })
    .map_err(|_| PumpError::WorkerPanicked(0))??;

    Ok(PortfolioResult {
        best: shared.snapshot(),
        reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ModelError, Row, RowSense, Variable},
        outcome::FailureReason,
        point::ContinuousPoint,
        problem::Problem,
    };

    /// The relaxation optimum is integral, so every run succeeds on its first iteration.
    #[derive(Clone)]
    struct Integral {
        problem: Problem,
    }

    impl Model for Integral {
        fn get_variables(&self) -> &[Variable] {
            &self.problem.variables
        }

        fn rows(&self) -> &[Row] {
            &self.problem.rows
        }

        fn solve_relaxation(&mut self, _objective: &[f64]) -> Result<ContinuousPoint, ModelError> {
            Ok(vec![1., 0., 1.])
        }

        fn tighten_bounds(&mut self, var: usize, lower: f64, upper: f64) -> Result<(), ModelError> {
            if lower > upper {
                return Err(ModelError::BoundsInfeasible { var, lower, upper });
            }
            self.restore_bounds(var, lower, upper);
            Ok(())
        }

        fn restore_bounds(&mut self, var: usize, lower: f64, upper: f64) {
            self.problem.variables[var].lower = lower;
            self.problem.variables[var].upper = upper;
        }
    }

    fn model() -> Integral {
        let mut problem = Problem::new("integral");
        for c in [2., 1., 3.] {
            problem.add_var(Variable::binary(c));
        }
        problem.add_row(Row::new(RowSense::Gte, 1., vec![(0, 1.), (1, 1.)]));
        Integral { problem }
    }

    #[test]
    fn test_run_config_rotates_policies_and_seeds() {
        let base = PumpConfig {
            random_seed: 7,
            ..Default::default()
        };
        let portfolio = PortfolioConfig::default();
        let policies = (0..4)
            .map(|k| run_config(&base, &portfolio, k))
            .map(|c| (c.random_seed, c.rounding_policy))
            .collect::<Vec<_>>();
        assert_eq!(
            policies,
            vec![
                (7, RoundingPolicy::Nearest),
                (8, RoundingPolicy::Randomized),
                (9, RoundingPolicy::Propagation),
                (10, RoundingPolicy::Nearest),
            ]
        );
        let fixed = PortfolioConfig {
            diversify: false,
            ..Default::default()
        };
        assert_eq!(run_config(&base, &fixed, 2).rounding_policy, RoundingPolicy::Nearest);
    }

    #[test]
    fn test_all_runs_report_and_share_incumbent() {
        let portfolio = PortfolioConfig {
            runs: 4,
            diversify: true,
            stop_on_first_success: false,
        };
        let result = run_portfolio(
            &model(),
            &PumpConfig::default(),
            &portfolio,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        assert_eq!(result.reports.len(), 4);
        assert!(result.reports.iter().all(|r| r.outcome.is_success()));
        assert_eq!(
            result.reports.iter().map(|r| r.run_id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(result.best.as_ref().unwrap().objective, 5.);
        assert_eq!(result.total_iterations(), 4);
    }

    #[test]
    fn test_raised_stop_flag_cancels_every_run() {
        let portfolio = PortfolioConfig {
            runs: 3,
            ..Default::default()
        };
        let result = run_portfolio(
            &model(),
            &PumpConfig::default(),
            &portfolio,
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();
        assert!(result.best.is_none());
        assert!(result
            .reports
            .iter()
            .all(|r| r.outcome.failure_reason() == Some(FailureReason::Cancelled)));
    }

    #[test]
    fn test_first_success_leaves_the_caller_flag_alone() {
        let stop = Arc::new(AtomicBool::new(false));
        let portfolio = PortfolioConfig {
            runs: 2,
            ..Default::default()
        };
        for _ in 0..2 {
            let result =
                run_portfolio(&model(), &PumpConfig::default(), &portfolio, Arc::clone(&stop))
                    .unwrap();
            assert_eq!(result.best.unwrap().objective, 5.);
            assert!(!stop.load(Ordering::Relaxed));
        }
    }

    #[test]
    fn test_invalid_config_fails_before_spawning() {
        let config = PumpConfig {
            perturbation_fraction: 2.,
            ..Default::default()
        };
        let result = run_portfolio(
            &model(),
            &config,
            &PortfolioConfig::default(),
            Arc::new(AtomicBool::new(false)),
        );
        assert!(matches!(result, Err(PumpError::Config(_))));
    }
}
