use crate::{
    point::{CandidatePoint, IntegerVars},
    ranking::Ranked,
};

/// How many variables a perturbation flips.
pub fn flip_count(fraction: f64, eligible: usize) -> usize {
    if eligible == 0 {
        return 0;
    }
    ((fraction * eligible as f64).ceil() as usize).clamp(1, eligible)
}

/// Moves `candidate[pos]` by `step`: toward `x` when they differ, otherwise
/// away from the nearer bound. Blocked moves try the opposite direction.
/// Returns the new value, or `None` if the variable cannot move.
pub fn flip_value(x: f64, current: i64, lower: i64, upper: i64, step: i64, epsilon: f64) -> Option<i64> {
    let diff = x - current as f64;
    let direction = if diff.abs() >= epsilon {
        diff.signum() as i64
    } else if current.saturating_sub(lower) <= upper.saturating_sub(current) {
        1
    } else {
        -1
    };
    let forward = current.saturating_add(direction * step).clamp(lower, upper);
    if forward != current {
        return Some(forward);
    }
    let backward = current.saturating_sub(direction * step).clamp(lower, upper);
    (backward != current).then_some(backward)
}

/// Flips the top of `ranking` in place. Variables whose displacement exceeds
/// `epsilon` are preferred; if there are none, the whole ranking is eligible.
/// Every flipped position gets its visit counter bumped. Returns the flipped
/// positions in rank order.
#[allow(clippy::too_many_arguments)]
pub fn perturb(
    candidate: &mut CandidatePoint,
    point: &[f64],
    ranking: &[Ranked],
    int_vars: &IntegerVars,
    fraction: f64,
    step: i64,
    visits: &mut [u32],
    epsilon: f64,
) -> Vec<usize> {
    let displaced = ranking
        .iter()
        .filter(|r| r.displacement > epsilon)
        .collect::<Vec<_>>();
    let eligible = if displaced.is_empty() {
        ranking.iter().collect::<Vec<_>>()
    } else {
        displaced
    };

    let count = flip_count(fraction, eligible.len());
    let mut flipped = Vec::with_capacity(count);
    for r in eligible.into_iter().take(count) {
        let (lower, upper) = int_vars.bounds(r.pos);
        if let Some(value) = flip_value(point[r.var], candidate.get(r.pos), lower, upper, step, epsilon)
        {
            candidate.set(r.pos, value);
            visits[r.pos] = visits[r.pos].saturating_add(1);
            flipped.push(r.pos);
        }
    }
    flipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Variable, ranking::RankingPolicy};

    #[test]
    fn test_flip_count() {
        assert_eq!(flip_count(0.15, 0), 0);
        assert_eq!(flip_count(0.15, 2), 1);
        assert_eq!(flip_count(0.15, 20), 3);
        assert_eq!(flip_count(0., 5), 1);
        assert_eq!(flip_count(1., 5), 5);
    }

    #[test]
    fn test_flip_moves_toward_lp_value() {
        assert_eq!(flip_value(0.4, 0, 0, 1, 1, 1e-9), Some(1));
        assert_eq!(flip_value(0.6, 1, 0, 1, 1, 1e-9), Some(0));
        assert_eq!(flip_value(2.2, 5, 0, 10, 2, 1e-9), Some(3));
    }

    #[test]
    fn test_flip_without_displacement_leaves_nearer_bound() {
        assert_eq!(flip_value(0., 0, 0, 1, 1, 1e-9), Some(1));
        assert_eq!(flip_value(1., 1, 0, 1, 1, 1e-9), Some(0));
        assert_eq!(flip_value(8., 8, 0, 10, 1, 1e-9), Some(7));
    }

    #[test]
    fn test_blocked_flip_reverses_or_gives_up() {
        // moving up from the upper bound is blocked
        assert_eq!(flip_value(5.3, 5, 0, 5, 1, 1e-9), Some(4));
        assert_eq!(flip_value(3.7, 3, 3, 3, 1, 1e-9), None);
    }

    #[test]
    fn test_perturb_flips_top_ranked_and_counts_visits() {
        let vars = (0..4).map(|_| Variable::binary(0.)).collect::<Vec<_>>();
        let int_vars = IntegerVars::from_variables(&vars, 1e-6).unwrap();
        let point = [0.5, 0.1, 0.45, 1.];
        let mut candidate = CandidatePoint::new(vec![0, 0, 0, 1]);
        let mut visits = vec![0; 4];
        let ranking =
            RankingPolicy::Displacement.rank(&point, &candidate, &int_vars, &visits, 0., 1e-6);

        // 3 displaced variables, ceil(0.5 * 3) = 2 flips
        let flipped = perturb(
            &mut candidate,
            &point,
            &ranking,
            &int_vars,
            0.5,
            1,
            &mut visits,
            1e-6,
        );
        assert_eq!(flipped, vec![0, 2]);
        assert_eq!(candidate.values(), &[1, 0, 1, 1]);
        assert_eq!(visits, vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_perturb_without_displacement_uses_full_ranking() {
        let vars = (0..2).map(|_| Variable::binary(0.)).collect::<Vec<_>>();
        let int_vars = IntegerVars::from_variables(&vars, 1e-6).unwrap();
        let point = [1., 0.];
        let mut candidate = CandidatePoint::new(vec![1, 0]);
        let mut visits = vec![0; 2];
        let ranking =
            RankingPolicy::Displacement.rank(&point, &candidate, &int_vars, &visits, 0., 1e-6);
        let flipped = perturb(
            &mut candidate,
            &point,
            &ranking,
            &int_vars,
            0.15,
            1,
            &mut visits,
            1e-6,
        );
        assert_eq!(flipped, vec![0]);
        assert_eq!(candidate.values(), &[0, 0]);
    }
}
