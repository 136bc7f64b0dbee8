use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use crate::{
    model::{ModelError, Variable},
    MAX_INTEGER_BOUND,
};

/// Dense values for every model variable, as returned by one LP solve.
pub type ContinuousPoint = Vec<f64>;

/// The integer variables of a model in ascending index order, with their
/// integral bounds. A *position* is an offset into this list.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerVars {
    indices: Vec<usize>,
    lower: Vec<i64>,
    upper: Vec<i64>,
    positions: Vec<Option<usize>>,
}

impl IntegerVars {
    /// Infinite bounds are capped at `MAX_INTEGER_BOUND`. Fails if an integer
    /// variable has no integer in its domain.
    pub fn from_variables(vars: &[Variable], tolerance: f64) -> Result<Self, ModelError> {
        let mut int_vars = IntegerVars {
            indices: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            positions: vec![None; vars.len()],
        };

        for (idx, var) in vars.iter().enumerate() {
            if !var.is_integer() {
                continue;
            }
            let lower = to_integer_bound((var.lower - tolerance).ceil());
            let upper = to_integer_bound((var.upper + tolerance).floor());
            if lower > upper {
                return Err(ModelError::BoundsInfeasible {
                    var: idx,
                    lower: var.lower,
                    upper: var.upper,
                });
            }
            int_vars.positions[idx] = Some(int_vars.indices.len());
            int_vars.indices.push(idx);
            int_vars.lower.push(lower);
            int_vars.upper.push(upper);
        }

        Ok(int_vars)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Model index of the variable at `pos`.
    pub fn index(&self, pos: usize) -> usize {
        self.indices[pos]
    }

    pub fn position(&self, var: usize) -> Option<usize> {
        self.positions.get(var).copied().flatten()
    }

    pub fn bounds(&self, pos: usize) -> (i64, i64) {
        (self.lower[pos], self.upper[pos])
    }

    /// `(position, model index)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.indices.iter().copied().enumerate()
    }
}

pub fn to_integer_bound(x: f64) -> i64 {
    if x.is_nan() {
        return 0;
    }
    x.clamp(-MAX_INTEGER_BOUND, MAX_INTEGER_BOUND) as i64
}

/// Integer values for the integer variables of a model, by position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidatePoint {
    values: Vec<i64>,
}

impl CandidatePoint {
    pub fn new(values: Vec<i64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn get(&self, pos: usize) -> i64 {
        self.values[pos]
    }

    pub fn set(&mut self, pos: usize, value: i64) {
        self.values[pos] = value;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.values.hash(&mut hasher);
        hasher.finish()
    }

    pub fn is_within_bounds(&self, int_vars: &IntegerVars) -> bool {
        self.values.iter().enumerate().all(|(pos, &v)| {
            let (lower, upper) = int_vars.bounds(pos);
            lower <= v && v <= upper
        })
    }

    /// Copies `point` and overwrites its integer variables with this candidate.
    pub fn merge_into(&self, int_vars: &IntegerVars, point: &[f64]) -> ContinuousPoint {
        let mut merged = point.to_vec();
        for (pos, var) in int_vars.iter() {
            merged[var] = self.values[pos] as f64;
        }
        merged
    }
}
