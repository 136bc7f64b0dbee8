//! L1 distance between an LP point and its rounding.
//!
//! The weight vector doubles as the next feasibility objective: minimizing
//! `weights . x` pulls every integer variable toward its rounded value.

use crate::point::{CandidatePoint, IntegerVars};

#[derive(Debug, Clone, PartialEq)]
pub struct Distance {
    /// `sum |x[j] - candidate[j]|` over integer variables, ignoring terms below epsilon.
    pub value: f64,
    /// Per model variable: `+1` if `x[j]` sits above its rounding, `-1` below,
    /// `0` when they agree or `j` is continuous.
    pub weights: Vec<f64>,
}

impl Distance {
    pub fn is_zero(&self) -> bool {
        self.value <= 0.
    }
}

pub fn distance(
    point: &[f64],
    candidate: &CandidatePoint,
    int_vars: &IntegerVars,
    epsilon: f64,
) -> Distance {
    let mut value = 0.;
    let mut weights = vec![0.; point.len()];
    for (pos, var) in int_vars.iter() {
        let diff = point[var] - candidate.get(pos) as f64;
        if diff.abs() < epsilon {
            continue;
        }
        value += diff.abs();
        weights[var] = diff.signum();
    }
    Distance { value, weights }
}

/// Fractional displacement of the integer variable at `pos`, zero below epsilon.
pub fn displacement(
    point: &[f64],
    candidate: &CandidatePoint,
    int_vars: &IntegerVars,
    pos: usize,
    epsilon: f64,
) -> f64 {
    let diff = (point[int_vars.index(pos)] - candidate.get(pos) as f64).abs();
    if diff < epsilon {
        0.
    } else {
        diff
    }
}
