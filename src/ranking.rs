use std::{cmp::Reverse, str::FromStr};

use ordered_float::OrderedFloat;

use crate::{
    config::ConfigError,
    distance::displacement,
    point::{CandidatePoint, IntegerVars},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankingPolicy {
    /// Score is the fractional displacement `|x - candidate|`.
    Displacement,
    /// Displacement minus `visit_penalty` per recent flip of the variable.
    VisitPenalized,
}

impl FromStr for RankingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "displacement" => Ok(RankingPolicy::Displacement),
            "visits" | "visit-penalized" => Ok(RankingPolicy::VisitPenalized),
            _ => Err(ConfigError::Parse(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    /// Position among the integer variables.
    pub pos: usize,
    pub var: usize,
    pub score: f64,
    pub displacement: f64,
}

impl RankingPolicy {
    /// All integer variables by descending score; equal scores keep ascending
    /// variable index.
    pub fn rank(
        &self,
        point: &[f64],
        candidate: &CandidatePoint,
        int_vars: &IntegerVars,
        visits: &[u32],
        visit_penalty: f64,
        epsilon: f64,
    ) -> Vec<Ranked> {
        let mut ranked = int_vars
            .iter()
            .map(|(pos, var)| {
                let displacement = displacement(point, candidate, int_vars, pos, epsilon);
                let score = match self {
                    RankingPolicy::Displacement => displacement,
                    RankingPolicy::VisitPenalized => {
                        displacement - visit_penalty * visits[pos] as f64
                    }
                };
                Ranked {
                    pos,
                    var,
                    score,
                    displacement,
                }
            })
            .collect::<Vec<_>>();
        ranked.sort_by_key(|r| (Reverse(OrderedFloat(r.score)), r.var));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Variable;

    fn int_vars(n: usize) -> IntegerVars {
        let vars = (0..n)
            .map(|_| Variable::integer(0., 10., 0.))
            .collect::<Vec<_>>();
        IntegerVars::from_variables(&vars, 1e-6).unwrap()
    }

    fn order(ranked: &[Ranked]) -> Vec<usize> {
        ranked.iter().map(|r| r.var).collect()
    }

    #[test]
    fn test_rank_by_displacement_with_index_ties() {
        let candidate = CandidatePoint::new(vec![0, 1, 2, 3]);
        let point = [0.5, 1.2, 2.5, 3.];
        let ranked = RankingPolicy::Displacement.rank(
            &point,
            &candidate,
            &int_vars(4),
            &[0; 4],
            0.1,
            1e-6,
        );
        assert_eq!(order(&ranked), vec![0, 2, 1, 3]);
        assert_eq!(ranked[3].displacement, 0.);
    }

    #[test]
    fn test_visits_deprioritize_variables() {
        let candidate = CandidatePoint::new(vec![0, 0, 0]);
        let point = [0.5, 0.5, 0.];
        let visits = [2, 0, 0];
        let ranked = RankingPolicy::VisitPenalized.rank(
            &point,
            &candidate,
            &int_vars(3),
            &visits,
            0.1,
            1e-6,
        );
        assert_eq!(order(&ranked), vec![1, 0, 2]);
        assert!((ranked[1].score - 0.3).abs() < 1e-12);

        let ranked = RankingPolicy::Displacement.rank(
            &point,
            &candidate,
            &int_vars(3),
            &visits,
            0.1,
            1e-6,
        );
        assert_eq!(order(&ranked), vec![0, 1, 2]);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let candidate = CandidatePoint::new(vec![1; 6]);
        let point = [1.5; 6];
        let first = RankingPolicy::VisitPenalized.rank(
            &point,
            &candidate,
            &int_vars(6),
            &[0; 6],
            0.1,
            1e-6,
        );
        assert_eq!(order(&first), (0..6).collect::<Vec<_>>());
    }
}
