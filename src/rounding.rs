//! Rounding of LP points to candidate points.
//!
//! All policies return values inside the integral bounds of each variable.
//! Propagation rounding fixes variables one at a time inside a [`BoundScope`]
//! and tightens the domains of the remaining variables row by row, so every
//! later rounding respects the earlier choices. The model's bounds are
//! restored before `round` returns, whatever the result.

use std::str::FromStr;

use log::trace;
use rand::Rng;
use thiserror::Error;

use crate::{
    config::ConfigError,
    interval::Interval,
    model::{BoundScope, Model, ModelError, Row, RowSense},
    point::{to_integer_bound, CandidatePoint, IntegerVars},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingPolicy {
    Nearest,
    /// Up with probability equal to the fractional part.
    Randomized,
    /// Nearest rounding in ranking order with bound propagation in between.
    Propagation,
}

impl FromStr for RoundingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(RoundingPolicy::Nearest),
            "randomized" | "random" => Ok(RoundingPolicy::Randomized),
            "propagation" => Ok(RoundingPolicy::Propagation),
            _ => Err(ConfigError::Parse(s.to_string())),
        }
    }
}

/// Resolution of a fractional part of exactly one half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TieBreak {
    Lower,
    Upper,
    /// Toward the side with more of the domain left beyond the rounded value.
    /// Equal room rounds down.
    LargerRange,
}

impl FromStr for TieBreak {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lower" => Ok(TieBreak::Lower),
            "upper" => Ok(TieBreak::Upper),
            "range" | "larger-range" => Ok(TieBreak::LargerRange),
            _ => Err(ConfigError::Parse(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoundingError {
    /// Propagation left the variable with an empty domain.
    #[error("propagation emptied the domain of variable {var}")]
    Infeasible { var: usize },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Rounds `x` to the nearest integer of `[lower, upper]`.
pub fn round_nearest(x: f64, lower: i64, upper: i64, tie_break: TieBreak, epsilon: f64) -> i64 {
    let down = x.floor();
    let frac = x - down;
    let down = to_integer_bound(down);
    let value = if (frac - 0.5).abs() <= epsilon {
        match tie_break {
            TieBreak::Lower => down,
            TieBreak::Upper => down + 1,
            TieBreak::LargerRange => {
                let room_below = down.saturating_sub(lower);
                let room_above = upper.saturating_sub(down + 1);
                if room_above > room_below {
                    down + 1
                } else {
                    down
                }
            }
        }
    } else if frac < 0.5 {
        down
    } else {
        down + 1
    };
    value.clamp(lower, upper)
}

pub fn round_randomized<R: Rng + ?Sized>(
    x: f64,
    lower: i64,
    upper: i64,
    rng: &mut R,
    epsilon: f64,
) -> i64 {
    let down = x.floor();
    let frac = x - down;
    let down = to_integer_bound(down);
    let value = if frac <= epsilon {
        down
    } else if frac >= 1. - epsilon {
        down + 1
    } else if rng.gen::<f64>() < frac {
        down + 1
    } else {
        down
    };
    value.clamp(lower, upper)
}

/// Column-wise view of the rows, used to find the rows a fixing touches.
#[derive(Debug, Clone)]
pub struct Propagator {
    columns: Vec<Vec<usize>>,
}

impl Propagator {
    pub fn new(rows: &[Row], num_vars: usize) -> Self {
        let mut columns = vec![Vec::new(); num_vars];
        for (row_idx, row) in rows.iter().enumerate() {
            for &(var, coeff) in row.coeffs.iter() {
                if coeff != 0. {
                    columns[var].push(row_idx);
                }
            }
        }
        Self { columns }
    }

    /// Tightens the unfixed integer variables of every row containing `var`.
    fn propagate<M: Model + ?Sized>(
        &self,
        scope: &mut BoundScope<'_, M>,
        var: usize,
        fixed: &[bool],
        int_vars: &IntegerVars,
        epsilon: f64,
    ) -> Result<(), RoundingError> {
        for &row_idx in self.columns[var].iter() {
            let tightenings = {
                let model = scope.model();
                row_tightenings(
                    &model.rows()[row_idx],
                    model,
                    fixed,
                    int_vars,
                    epsilon,
                )?
            };
            for (target, domain) in tightenings {
                trace!(
                    "row {} tightens var {} to [{}, {}]",
                    row_idx,
                    target,
                    domain.0,
                    domain.1
                );
                scope.tighten(target, domain.0, domain.1)?;
            }
        }
        Ok(())
    }
}

/// Activity range of a row with infinite contributions counted separately,
/// so that a single infinite bound can be excluded again.
struct Activity {
    min: f64,
    min_inf: usize,
    max: f64,
    max_inf: usize,
}

impl Activity {
    fn of<M: Model + ?Sized>(row: &Row, model: &M) -> (Activity, Vec<Interval>) {
        let vars = model.get_variables();
        let mut act = Activity {
            min: 0.,
            min_inf: 0,
            max: 0.,
            max_inf: 0,
        };
        let contributions = row
            .coeffs
            .iter()
            .map(|&(v, c)| c * Interval(vars[v].lower, vars[v].upper))
            .collect::<Vec<_>>();
        for contribution in contributions.iter() {
            if contribution.0.is_finite() {
                act.min += contribution.0;
            } else {
                act.min_inf += 1;
            }
            if contribution.1.is_finite() {
                act.max += contribution.1;
            } else {
                act.max_inf += 1;
            }
        }
        (act, contributions)
    }

    fn min_without(&self, contribution: &Interval) -> f64 {
        if contribution.0.is_finite() {
            if self.min_inf > 0 {
                f64::NEG_INFINITY
            } else {
                self.min - contribution.0
            }
        } else if self.min_inf > 1 {
            f64::NEG_INFINITY
        } else {
            self.min
        }
    }

    fn max_without(&self, contribution: &Interval) -> f64 {
        if contribution.1.is_finite() {
            if self.max_inf > 0 {
                f64::INFINITY
            } else {
                self.max - contribution.1
            }
        } else if self.max_inf > 1 {
            f64::INFINITY
        } else {
            self.max
        }
    }
}

/// New domains implied by one row for the unfixed integer variables in it.
fn row_tightenings<M: Model + ?Sized>(
    row: &Row,
    model: &M,
    fixed: &[bool],
    int_vars: &IntegerVars,
    epsilon: f64,
) -> Result<Vec<(usize, Interval)>, RoundingError> {
    let vars = model.get_variables();
    let (activity, contributions) = Activity::of(row, model);
    let tolerance = epsilon * row.rhs.abs().max(1.);

    let upper_side = matches!(row.sense, RowSense::Lte | RowSense::Equal);
    let lower_side = matches!(row.sense, RowSense::Gte | RowSense::Equal);
    if upper_side && activity.min_inf == 0 && activity.min > row.rhs + tolerance
        || lower_side && activity.max_inf == 0 && activity.max < row.rhs - tolerance
    {
        let var = row.coeffs.first().map(|&(v, _)| v).unwrap_or(0);
        return Err(RoundingError::Infeasible { var });
    }

    let mut result = Vec::new();
    for (&(var, coeff), contribution) in row.coeffs.iter().zip(contributions.iter()) {
        if coeff == 0. || fixed[var] || int_vars.position(var).is_none() {
            continue;
        }
        let current = Interval(vars[var].lower, vars[var].upper);
        let mut implied = Interval(f64::NEG_INFINITY, f64::INFINITY);
        if upper_side {
            // coeff * x <= rhs - min(rest)
            let slack = row.rhs - activity.min_without(contribution);
            if slack.is_finite() {
                let bound = slack / coeff;
                implied = if coeff > 0. {
                    implied.intersect(Interval(f64::NEG_INFINITY, bound))
                } else {
                    implied.intersect(Interval(bound, f64::INFINITY))
                };
            }
        }
        if lower_side {
            // coeff * x >= rhs - max(rest)
            let slack = row.rhs - activity.max_without(contribution);
            if slack.is_finite() {
                let bound = slack / coeff;
                implied = if coeff > 0. {
                    implied.intersect(Interval(bound, f64::INFINITY))
                } else {
                    implied.intersect(Interval(f64::NEG_INFINITY, bound))
                };
            }
        }
        let domain = current.intersect(implied.tighten(true, epsilon));
        if domain.is_empty(0.) {
            return Err(RoundingError::Infeasible { var });
        }
        if !current.is_subset_of(&domain) {
            result.push((var, domain));
        }
    }
    Ok(result)
}

/// A rounding policy together with its numeric settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rounder {
    pub tie_break: TieBreak,
    pub epsilon: f64,
}

impl Rounder {
    pub fn new(tie_break: TieBreak, epsilon: f64) -> Self {
        Self { tie_break, epsilon }
    }

    pub fn round_nearest(&self, point: &[f64], int_vars: &IntegerVars) -> CandidatePoint {
        CandidatePoint::new(
            int_vars
                .iter()
                .map(|(pos, var)| {
                    let (lower, upper) = int_vars.bounds(pos);
                    round_nearest(point[var], lower, upper, self.tie_break, self.epsilon)
                })
                .collect(),
        )
    }

    pub fn round_randomized<R: Rng + ?Sized>(
        &self,
        point: &[f64],
        int_vars: &IntegerVars,
        rng: &mut R,
    ) -> CandidatePoint {
        CandidatePoint::new(
            int_vars
                .iter()
                .map(|(pos, var)| {
                    let (lower, upper) = int_vars.bounds(pos);
                    round_randomized(point[var], lower, upper, rng, self.epsilon)
                })
                .collect(),
        )
    }

    /// Rounds positions in `order` (then any positions `order` missed, in
    /// ascending order), propagating each fixing through `propagator`.
    pub fn round_propagating<M: Model + ?Sized>(
        &self,
        point: &[f64],
        int_vars: &IntegerVars,
        order: &[usize],
        model: &mut M,
        propagator: &Propagator,
    ) -> Result<CandidatePoint, RoundingError> {
        let mut values = vec![0; int_vars.len()];
        let mut fixed = vec![false; model.num_vars()];
        let mut scope = BoundScope::new(model);

        let mut seen = vec![false; int_vars.len()];
        let sequence = order
            .iter()
            .copied()
            .chain(0..int_vars.len())
            .filter(|&pos| !std::mem::replace(&mut seen[pos], true))
            .collect::<Vec<_>>();

        for pos in sequence {
            let var = int_vars.index(pos);
            let (orig_lower, orig_upper) = int_vars.bounds(pos);
            let (lower, upper) = {
                let v = &scope.model().get_variables()[var];
                let domain = Interval(v.lower, v.upper).tighten(true, self.epsilon);
                (
                    to_integer_bound(domain.0).max(orig_lower),
                    to_integer_bound(domain.1).min(orig_upper),
                )
            };
            if lower > upper {
                return Err(RoundingError::Infeasible { var });
            }
            let value = round_nearest(point[var], lower, upper, self.tie_break, self.epsilon);
            trace!("propagation rounding var {} {} -> {}", var, point[var], value);
            values[pos] = value;
            fixed[var] = true;
            scope.tighten(var, value as f64, value as f64)?;
            propagator.propagate(&mut scope, var, &fixed, int_vars, self.epsilon)?;
        }

        Ok(CandidatePoint::new(values))
    }

    /// Dispatches on `policy`. `order` and `propagator` are only used by
    /// [`RoundingPolicy::Propagation`]; without a propagator it falls back to
    /// nearest rounding.
    #[allow(clippy::too_many_arguments)]
    pub fn round<M: Model + ?Sized, R: Rng + ?Sized>(
        &self,
        policy: RoundingPolicy,
        point: &[f64],
        int_vars: &IntegerVars,
        order: &[usize],
        model: &mut M,
        propagator: Option<&Propagator>,
        rng: &mut R,
    ) -> Result<CandidatePoint, RoundingError> {
        let candidate = match (policy, propagator) {
            (RoundingPolicy::Nearest, _) | (RoundingPolicy::Propagation, None) => {
                self.round_nearest(point, int_vars)
            }
            (RoundingPolicy::Randomized, _) => self.round_randomized(point, int_vars, rng),
            (RoundingPolicy::Propagation, Some(propagator)) => {
                self.round_propagating(point, int_vars, order, model, propagator)?
            }
        };
        debug_assert!(candidate.is_within_bounds(int_vars));
        Ok(candidate)
    }
}
