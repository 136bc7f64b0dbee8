//! The feasibility pump driver.
//!
//! One run alternates LP solves and roundings until the rounding of an LP
//! point is the LP point itself (and survives the full feasibility check), or
//! a budget runs out. All cross-iteration memory lives in [`PumpState`].

use std::mem;

use log::{debug, info, trace};

use crate::{
    config::PumpConfig,
    distance::{distance, Distance},
    incumbent::Incumbent,
    model::{BoundScope, Model, ModelError},
    monitor::{StopReason, Termination},
    outcome::{FailureReason, Outcome, PumpError},
    perturb::perturb,
    point::{CandidatePoint, IntegerVars},
    rounding::{Propagator, Rounder, RoundingError, RoundingPolicy},
    state::PumpState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpPhase {
    Init,
    Solving,
    Rounding,
    Measuring,
    Converged,
    Perturbing,
    Restarting,
    StalledOut,
    Succeeded,
    Failed(FailureReason),
}

/// What sent the driver into [`PumpPhase::Perturbing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerturbCause {
    /// The candidate was already in the history.
    Cycle,
    /// The distance stopped decreasing.
    Stall,
    /// Zero distance, but the fixed point failed the full feasibility check.
    Unverified,
    RoundingInfeasible,
}

/// Trace record handed to the observer once per iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSummary {
    pub iteration: usize,
    pub restart: usize,
    /// Objective weight used by this iteration's solve.
    pub alpha: f64,
    pub distance: Option<f64>,
    /// Where the driver goes next.
    pub phase: PumpPhase,
    pub cause: Option<PerturbCause>,
    pub flipped: usize,
    pub candidate_hash: Option<u64>,
}

/// `α·s·c + (1 − α)·w`, with `s` scaling the original objective to the
/// magnitude of the distance weights.
pub fn blend_objective(original: &[f64], weights: &[f64], alpha: f64, scale: f64) -> Vec<f64> {
    original
        .iter()
        .zip(weights)
        .map(|(c, w)| alpha * scale * c + (1. - alpha) * w)
        .collect()
}

/// `sqrt(#integer) / ‖c‖₂`, or 1 when either is zero.
pub fn objective_scale(original: &[f64], num_integer: usize) -> f64 {
    let norm = original.iter().map(|c| c * c).sum::<f64>().sqrt();
    if norm > 0. && num_integer > 0 {
        (num_integer as f64).sqrt() / norm
    } else {
        1.
    }
}

enum Step {
    Continue(IterationSummary),
    Done(IterationSummary, Outcome),
}

/// Per-run constants derived from the model.
struct RunContext {
    int_vars: IntegerVars,
    original: Vec<f64>,
    scale: f64,
    propagator: Option<Propagator>,
}

pub struct FeasibilityPump<'a, M: Model + ?Sized> {
    model: &'a mut M,
    config: PumpConfig,
    termination: Termination,
    run_id: usize,
    phase: PumpPhase,
}

impl<'a, M: Model + ?Sized> FeasibilityPump<'a, M> {
    pub fn new(model: &'a mut M, config: PumpConfig) -> Self {
        let termination = Termination::new(config.time_budget);
        Self {
            model,
            config,
            termination,
            run_id: 0,
            phase: PumpPhase::Init,
        }
    }

    /// Replaces the default termination, which only knows the configured time budget.
    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_run_id(mut self, run_id: usize) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run(self) -> Result<Outcome, PumpError> {
        self.run_with_observer(|_| true)
    }

    /// Runs the pump, reporting every iteration to `observer`. Returning
    /// `false` from the observer cancels the run.
    pub fn run_with_observer<F>(mut self, mut observer: F) -> Result<Outcome, PumpError>
    where
        F: FnMut(&IterationSummary) -> bool,
    {
        self.config.validate()?;
        let int_vars = IntegerVars::from_variables(
            self.model.get_variables(),
            self.config.tolerance_epsilon,
        )?;
        let original = self.model.original_objective();
        let ctx = RunContext {
            scale: objective_scale(&original, int_vars.len()),
            original,
            propagator: (self.config.rounding_policy == RoundingPolicy::Propagation)
                .then(|| Propagator::new(self.model.rows(), self.model.num_vars())),
            int_vars,
        };
        let mut state = PumpState::new(&self.config, self.model.num_vars(), ctx.int_vars.len());

        info!(
            "id:{} Starting feasibility pump: {} variables ({} integer), {} rows, seed {}.",
            self.run_id,
            self.model.num_vars(),
            ctx.int_vars.len(),
            self.model.rows().len(),
            self.config.random_seed
        );

        loop {
            if state.iteration >= self.config.max_iterations {
                return Ok(self.fail(FailureReason::IterationLimit, &state));
            }
            if let Some(reason) = self.termination.check() {
                match reason {
                    StopReason::Interrupted => info!("id:{} Interrupted.", self.run_id),
                    StopReason::TimeBudget => info!(
                        "id:{} Time budget exhausted after {:.2}s.",
                        self.run_id,
                        self.termination.elapsed().as_secs_f64()
                    ),
                }
                return Ok(self.fail(FailureReason::Cancelled, &state));
            }

            let step = self.iterate(&mut state, &ctx)?;
            match step {
                Step::Done(summary, outcome) => {
                    observer(&summary);
                    return Ok(outcome);
                }
                Step::Continue(summary) => {
                    if !observer(&summary) {
                        info!("id:{} Cancelled by observer.", self.run_id);
                        return Ok(self.fail(FailureReason::Cancelled, &state));
                    }
                }
            }
        }
    }

    fn enter(&mut self, phase: PumpPhase) {
        trace!("id:{} {:?} -> {:?}", self.run_id, self.phase, phase);
        self.phase = phase;
    }

    fn fail(&mut self, reason: FailureReason, state: &PumpState) -> Outcome {
        self.enter(PumpPhase::Failed(reason));
        info!(
            "id:{} Failed: {} after {} iterations, {} restarts.",
            self.run_id, reason, state.iteration, state.restarts
        );
        Outcome::Failure {
            reason,
            iterations: state.iteration,
        }
    }

    fn succeed(
        &mut self,
        state: &PumpState,
        ctx: &RunContext,
        mut summary: IterationSummary,
        point: Vec<f64>,
    ) -> Step {
        let objective = ctx.original.iter().zip(&point).map(|(c, x)| c * x).sum::<f64>()
            + self.model.objective_offset();
        self.enter(PumpPhase::Succeeded);
        info!(
            "id:{} Found feasible point with objective {} after {} iterations, {} restarts.",
            self.run_id, objective, state.iteration, state.restarts
        );
        summary.phase = self.phase;
        Step::Done(
            summary,
            Outcome::Success {
                point,
                objective,
                iterations: state.iteration,
            },
        )
    }

    /// Early acceptance of a rounding whose completion with the LP values of
    /// the continuous variables is already feasible. The point handed back is
    /// the one from [`verify`](Self::verify), so the continuous part is
    /// recomputed under the original objective.
    fn accept_early(
        &mut self,
        candidate: &CandidatePoint,
        point: &[f64],
        ctx: &RunContext,
    ) -> Result<Option<Vec<f64>>, PumpError> {
        if !self.config.early_acceptance {
            return Ok(None);
        }
        let merged = candidate.merge_into(&ctx.int_vars, point);
        if !self.model.check_full_feasibility(&merged) {
            return Ok(None);
        }
        self.verify(candidate, point, &ctx.int_vars, &ctx.original)
    }

    fn iterate(&mut self, state: &mut PumpState, ctx: &RunContext) -> Result<Step, PumpError> {
        let int_vars = &ctx.int_vars;
        state.iteration += 1;
        let alpha = state.alpha;
        let mut summary = IterationSummary {
            iteration: state.iteration,
            restart: state.restarts,
            alpha,
            distance: None,
            phase: PumpPhase::Solving,
            cause: None,
            flipped: 0,
            candidate_hash: None,
        };

        self.enter(PumpPhase::Solving);
        let objective = blend_objective(&ctx.original, &state.weights, alpha, ctx.scale);
        let point = match self.model.solve_relaxation(&objective) {
            Ok(point) => point,
            Err(ModelError::RelaxationInfeasible) => {
                let outcome = self.fail(FailureReason::RelaxationInfeasible, state);
                summary.phase = self.phase;
                return Ok(Step::Done(summary, outcome));
            }
            Err(e) => return Err(e.into()),
        };
        if point.len() != self.model.num_vars() {
            return Err(ModelError::Backend(format!(
                "relaxation returned {} values for {} variables",
                point.len(),
                self.model.num_vars()
            ))
            .into());
        }

        self.enter(PumpPhase::Rounding);
        let policy = if mem::take(&mut state.randomize_next) {
            RoundingPolicy::Randomized
        } else {
            self.config.rounding_policy
        };
        let rounder = Rounder::new(self.config.tie_break, self.config.tolerance_epsilon);
        let order: Vec<usize> = match policy {
            RoundingPolicy::Propagation => {
                let preliminary = rounder.round_nearest(&point, int_vars);
                self.config
                    .ranking_policy
                    .rank(
                        &point,
                        &preliminary,
                        int_vars,
                        &state.visits,
                        self.config.visit_penalty,
                        self.config.tolerance_epsilon,
                    )
                    .iter()
                    .map(|r| r.pos)
                    .collect()
            }
            _ => Vec::new(),
        };
        let rounded = rounder.round(
            policy,
            &point,
            int_vars,
            &order,
            &mut *self.model,
            ctx.propagator.as_ref(),
            &mut state.rng,
        );
        let candidate = match rounded {
            Ok(candidate) => candidate,
            Err(RoundingError::Infeasible { var }) => {
                debug!(
                    "id:{} it:{} Propagation emptied the domain of var {}.",
                    self.run_id, state.iteration, var
                );
                let candidate = rounder.round_nearest(&point, int_vars);
                summary.candidate_hash = Some(candidate.fingerprint());
                return self.perturbing(
                    state,
                    ctx,
                    summary,
                    candidate,
                    &point,
                    PerturbCause::RoundingInfeasible,
                );
            }
            Err(RoundingError::Model(e)) => return Err(e.into()),
        };
        summary.candidate_hash = Some(candidate.fingerprint());

        self.enter(PumpPhase::Measuring);
        let dist = distance(&point, &candidate, int_vars, self.config.tolerance_epsilon);
        summary.distance = Some(dist.value);
        debug!(
            "id:{} it:{} alpha:{:.4} distance:{:.6} policy:{:?}",
            self.run_id, state.iteration, alpha, dist.value, policy
        );

        if dist.is_zero() {
            self.enter(PumpPhase::Converged);
            if let Some(full) = self.verify(&candidate, &point, int_vars, &ctx.original)? {
                return Ok(self.succeed(state, ctx, summary, full));
            }
            debug!(
                "id:{} it:{} Rounded point failed the feasibility check.",
                self.run_id, state.iteration
            );
            return self.perturbing(state, ctx, summary, candidate, &point, PerturbCause::Unverified);
        }
        if let Some(full) = self.accept_early(&candidate, &point, ctx)? {
            return Ok(self.succeed(state, ctx, summary, full));
        }

        if state.history.contains(&candidate) {
            return self.perturbing(state, ctx, summary, candidate, &point, PerturbCause::Cycle);
        }
        if state.record_distance(dist.value, self.config.stall_window) {
            return self.perturbing(state, ctx, summary, candidate, &point, PerturbCause::Stall);
        }

        state.history.push(candidate);
        state.weights = dist.weights;
        state.advance_alpha(&self.config);
        Ok(Step::Continue(summary))
    }

    /// Fixes the integer variables at `candidate`, recomputes the continuous
    /// ones under the original objective and checks the full point. Returns
    /// the point when it is feasible.
    fn verify(
        &mut self,
        candidate: &CandidatePoint,
        point: &[f64],
        int_vars: &IntegerVars,
        original: &[f64],
    ) -> Result<Option<Vec<f64>>, PumpError> {
        let full = if int_vars.len() == self.model.num_vars() {
            candidate.merge_into(int_vars, point)
        } else {
            let mut scope = BoundScope::new(&mut *self.model);
            for (pos, var) in int_vars.iter() {
                let value = candidate.get(pos) as f64;
                scope.tighten(var, value, value)?;
            }
            match scope.model_mut().solve_relaxation(original) {
                Ok(resolved) => candidate.merge_into(int_vars, &resolved),
                Err(ModelError::RelaxationInfeasible) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        };
        Ok(self.model.check_full_feasibility(&full).then_some(full))
    }

    fn perturbing(
        &mut self,
        state: &mut PumpState,
        ctx: &RunContext,
        mut summary: IterationSummary,
        mut candidate: CandidatePoint,
        point: &[f64],
        cause: PerturbCause,
    ) -> Result<Step, PumpError> {
        let int_vars = &ctx.int_vars;
        self.enter(PumpPhase::Perturbing);
        summary.cause = Some(cause);
        state.after_perturbation();

        if state.stall > self.config.stall_ceiling {
            self.enter(PumpPhase::Restarting);
            if state.restarts >= self.config.max_restarts {
                self.enter(PumpPhase::StalledOut);
                let outcome = self.fail(FailureReason::MaxRestartsExceeded, state);
                summary.phase = self.phase;
                return Ok(Step::Done(summary, outcome));
            }
            state.restart(&self.config);
            info!(
                "id:{} Restart {} after {} iterations.",
                self.run_id, state.restarts, state.iteration
            );
            summary.phase = PumpPhase::Restarting;
            return Ok(Step::Continue(summary));
        }

        let ranking = self.config.ranking_policy.rank(
            point,
            &candidate,
            int_vars,
            &state.visits,
            self.config.visit_penalty,
            self.config.tolerance_epsilon,
        );
        let flipped = perturb(
            &mut candidate,
            point,
            &ranking,
            int_vars,
            self.config.perturbation_fraction,
            self.config.perturbation_step,
            &mut state.visits,
            self.config.tolerance_epsilon,
        );
        debug!(
            "id:{} it:{} Perturbing ({:?}): flipped {} of {} variables, stall {}.",
            self.run_id,
            state.iteration,
            cause,
            flipped.len(),
            int_vars.len(),
            state.stall
        );

        summary.flipped = flipped.len();
        if let Some(full) = self.accept_early(&candidate, point, ctx)? {
            return Ok(self.succeed(state, ctx, summary, full));
        }

        let Distance { weights, .. } =
            distance(point, &candidate, int_vars, self.config.tolerance_epsilon);
        state.weights = weights;
        state.history.push(candidate);
        state.advance_alpha(&self.config);

        summary.phase = PumpPhase::Perturbing;
        Ok(Step::Continue(summary))
    }
}

/// Runs one pump on `model` with `config`.
pub fn run<M: Model + ?Sized>(model: &mut M, config: &PumpConfig) -> Result<Outcome, PumpError> {
    FeasibilityPump::new(model, config.clone()).run()
}

/// Runs one pump and hands a success to `incumbent` if it improves on it.
pub fn run_into<M: Model + ?Sized>(
    model: &mut M,
    config: &PumpConfig,
    incumbent: &mut Option<Incumbent>,
) -> Result<Outcome, PumpError> {
    let outcome = run(model, config)?;
    if let Some(found) = outcome.incumbent() {
        crate::incumbent::offer(incumbent, found);
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AlphaSchedule, PumpBuilder},
        model::{Row, RowSense, Variable},
        point::ContinuousPoint,
        problem::Problem,
        rounding::TieBreak,
    };
    use approx::assert_relative_eq;

    /// Returns `points` in order, repeating the last one.
    struct Replay {
        problem: Problem,
        points: Vec<ContinuousPoint>,
        solves: usize,
        objectives: Vec<Vec<f64>>,
    }

    impl Replay {
        fn new(problem: Problem, points: Vec<ContinuousPoint>) -> Self {
            Self {
                problem,
                points,
                solves: 0,
                objectives: Vec::new(),
            }
        }
    }

    impl Model for Replay {
        fn get_variables(&self) -> &[Variable] {
            &self.problem.variables
        }

        fn rows(&self) -> &[Row] {
            &self.problem.rows
        }

        fn solve_relaxation(&mut self, objective: &[f64]) -> Result<ContinuousPoint, ModelError> {
            self.objectives.push(objective.to_vec());
            let i = self.solves.min(self.points.len() - 1);
            self.solves += 1;
            Ok(self.points[i].clone())
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
    }

    fn partition() -> Problem {
        let mut p = Problem::new("partition");
        let x = p.add_var(Variable::binary(1.));
        let y = p.add_var(Variable::binary(1.));
        p.add_row(Row::new(RowSense::Equal, 1., vec![(x, 1.), (y, 1.)]));
        p
    }

    #[test]
    fn test_blend_objective() {
        let blended = blend_objective(&[2., -4.], &[1., -1.], 0.25, 0.5);
        assert_relative_eq!(blended[0], 0.25 * 0.5 * 2. + 0.75);
        assert_relative_eq!(blended[1], 0.25 * 0.5 * -4. - 0.75);
        assert_eq!(blend_objective(&[3., 3.], &[1., 0.], 0., 1.), vec![1., 0.]);
    }

    #[test]
    fn test_objective_scale() {
        assert_relative_eq!(objective_scale(&[3., 4.], 4), 2. / 5.);
        assert_eq!(objective_scale(&[0., 0.], 4), 1.);
        assert_eq!(objective_scale(&[1., 1.], 0), 1.);
    }

    #[test]
    fn test_perturbed_target_leads_to_success() {
        let mut model = Replay::new(partition(), vec![vec![0.5, 0.5], vec![0.5, 0.5], vec![1., 0.]]);
        let config = PumpBuilder::new().tie_break(TieBreak::Lower).build().unwrap();
        let mut phases = Vec::new();
        let outcome = FeasibilityPump::new(&mut model, config)
            .run_with_observer(|s| {
                phases.push((s.phase, s.cause, s.flipped));
                true
            })
            .unwrap();

        // (0, 0) repeats, and flipping x repairs the partition row
        assert_eq!(
            outcome,
            Outcome::Success {
                point: vec![1., 0.],
                objective: 1.,
                iterations: 2,
            }
        );
        assert_eq!(
            phases,
            vec![
                (PumpPhase::Solving, None, 0),
                (PumpPhase::Succeeded, Some(PerturbCause::Cycle), 1),
            ]
        );
        assert_eq!(model.solves, 2);
    }

    #[test]
    fn test_feasible_rounding_is_accepted_before_convergence() {
        // (0.4, 0.6) rounds to (0, 1), which satisfies the row at distance 0.8
        let mut model = Replay::new(partition(), vec![vec![0.4, 0.6]]);
        let outcome = run(&mut model, &PumpConfig::default()).unwrap();
        assert_eq!(
            outcome,
            Outcome::Success {
                point: vec![0., 1.],
                objective: 1.,
                iterations: 1,
            }
        );
    }

    #[test]
    fn test_disabled_early_acceptance_waits_for_convergence() {
        let mut model = Replay::new(partition(), vec![vec![0.4, 0.6]]);
        let config = PumpBuilder::new()
            .early_acceptance(false)
            .max_iterations(3)
            .build()
            .unwrap();
        let outcome = run(&mut model, &config).unwrap();
        assert_eq!(outcome.failure_reason(), Some(FailureReason::IterationLimit));
        assert_eq!(model.solves, 3);
    }

    #[test]
    fn test_first_solve_uses_pure_original_objective() {
        let mut model = Replay::new(partition(), vec![vec![1., 0.]]);
        let config = PumpBuilder::new()
            .alpha(1., AlphaSchedule::Constant)
            .build()
            .unwrap();
        run(&mut model, &config).unwrap();
        let scale = objective_scale(&[1., 1.], 2);
        assert_relative_eq!(model.objectives[0][0], scale);
        assert_relative_eq!(model.objectives[0][1], scale);
    }

    #[test]
    fn test_unverified_fixed_point_is_perturbed() {
        // (0, 0, 0) is integral but violates x + y + z = 2, and no single flip repairs it
        let mut problem = Problem::new("pairs");
        for _ in 0..3 {
            problem.add_var(Variable::binary(1.));
        }
        problem.add_row(Row::new(RowSense::Equal, 2., vec![(0, 1.), (1, 1.), (2, 1.)]));
        let mut model = Replay::new(problem, vec![vec![0., 0., 0.]]);
        let config = PumpBuilder::new().max_iterations(4).build().unwrap();
        let mut causes = Vec::new();
        let outcome = FeasibilityPump::new(&mut model, config)
            .run_with_observer(|s| {
                causes.push(s.cause);
                true
            })
            .unwrap();
        assert_eq!(outcome.failure_reason(), Some(FailureReason::IterationLimit));
        assert_eq!(outcome.iterations(), 4);
        assert!(causes.iter().all(|c| *c == Some(PerturbCause::Unverified)));
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut model = Replay::new(partition(), vec![vec![1., 0.]]);
        let config = PumpConfig {
            stall_window: 0,
            ..Default::default()
        };
        assert!(matches!(run(&mut model, &config), Err(PumpError::Config(_))));
        assert_eq!(model.solves, 0);
    }

    #[test]
    fn test_wrong_point_length_is_a_backend_error() {
        let mut model = Replay::new(partition(), vec![vec![1.]]);
        let result = run(&mut model, &PumpConfig::default());
        assert!(matches!(
            result,
            Err(PumpError::Model(ModelError::Backend(_)))
        ));
    }

    #[test]
    fn test_run_into_keeps_the_better_incumbent() {
        let mut incumbent = Some(Incumbent::new(vec![0., 1.], 0.5));
        let mut model = Replay::new(partition(), vec![vec![1., 0.]]);
        let outcome = run_into(&mut model, &PumpConfig::default(), &mut incumbent).unwrap();
        assert!(outcome.is_success());
        assert_eq!(incumbent.unwrap().objective, 0.5);
    }
}
