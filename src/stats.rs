use log::info;

use crate::{
    model::{RowSense, Variable},
    point::to_integer_bound,
    problem::Problem,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceStats {
    pub continuous: usize,
    pub integer: usize,
    pub binary: usize,
    /// Integer variables with an infinite bound.
    pub unbounded_integer: usize,
    /// Sum of `upper - lower` over bounded general integers.
    pub domain_size: u64,
    pub clauses: usize,
    pub at_most_one: usize,
    pub cardinality: usize,
    pub pseudo_boolean: usize,
    pub general: usize,
}

impl InstanceStats {
    pub fn new(problem: &Problem) -> Self {
        let mut stats = Self::default();
        for var in &problem.variables {
            if !var.is_integer() {
                stats.continuous += 1;
            } else if var.is_binary() {
                stats.binary += 1;
            } else if var.lower.is_infinite() || var.upper.is_infinite() {
                stats.integer += 1;
                stats.unbounded_integer += 1;
            } else {
                stats.integer += 1;
                let range = to_integer_bound(var.upper.floor()) - to_integer_bound(var.lower.ceil());
                stats.domain_size += range.max(0) as u64;
            }
        }

        for row in &problem.rows {
            let forms: &[f64] = match row.sense {
                RowSense::Lte => &[1.],
                RowSense::Gte => &[-1.],
                RowSense::Equal => &[1., -1.],
            };
            for &sign in forms {
                let terms = row.coeffs.iter().map(|&(j, a)| (j, sign * a));
                match classify(&problem.variables, terms, sign * row.rhs) {
                    RowKind::Clause => stats.clauses += 1,
                    RowKind::AtMostOne => stats.at_most_one += 1,
                    RowKind::Cardinality => stats.cardinality += 1,
                    RowKind::PseudoBoolean => stats.pseudo_boolean += 1,
                    RowKind::General => stats.general += 1,
                }
            }
        }
        stats
    }

    pub fn log(&self) {
        info!(
            "  cont:{} int:{} bin:{} domain_size:{} unbounded:{}",
            self.continuous, self.integer, self.binary, self.domain_size, self.unbounded_integer
        );
        info!(
            "  clauses:{} atm1:{} card:{} pb:{} general:{}",
            self.clauses, self.at_most_one, self.cardinality, self.pseudo_boolean, self.general
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Clause,
    AtMostOne,
    Cardinality,
    PseudoBoolean,
    General,
}

/// Classifies `terms <= rhs`.
fn classify(
    variables: &[Variable],
    terms: impl Iterator<Item = (usize, f64)>,
    rhs: f64,
) -> RowKind {
    let mut unit = true;
    // rhs after substituting negated literals, and with the sum of positive literals on the left
    let mut negated_rhs = rhs;
    let mut positive_rhs = rhs;
    for (j, a) in terms {
        if !variables[j].is_binary() {
            return RowKind::General;
        }
        if a.abs() != 1. {
            unit = false;
        } else if a < 0. {
            negated_rhs += 1.;
        } else {
            positive_rhs -= 1.;
        }
    }
    if !unit {
        RowKind::PseudoBoolean
    } else if positive_rhs == -1. {
        // -x - y <= -1
        RowKind::Clause
    } else if negated_rhs == 1. {
        RowKind::AtMostOne
    } else if negated_rhs >= 1. {
        RowKind::Cardinality
    } else {
        RowKind::PseudoBoolean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Row;

    #[test]
    fn test_variable_counts() {
        let mut p = Problem::new("stats");
        p.add_var(Variable::continuous(0., 1., 0.));
        p.add_var(Variable::binary(0.));
        p.add_var(Variable::integer(-2., 5., 0.));
        p.add_var(Variable::integer(0., f64::INFINITY, 0.));
        let stats = InstanceStats::new(&p);
        assert_eq!(stats.continuous, 1);
        assert_eq!(stats.binary, 1);
        assert_eq!(stats.integer, 2);
        assert_eq!(stats.unbounded_integer, 1);
        assert_eq!(stats.domain_size, 7);
    }

    #[test]
    fn test_row_kinds() {
        let mut p = Problem::new("rows");
        let (x, y, w, z) = (
            p.add_var(Variable::binary(0.)),
            p.add_var(Variable::binary(0.)),
            p.add_var(Variable::binary(0.)),
            p.add_var(Variable::continuous(0., 1., 0.)),
        );
        // x + y >= 1
        p.add_row(Row::new(RowSense::Gte, 1., vec![(x, 1.), (y, 1.)]));
        // x + y + w <= 1
        p.add_row(Row::new(RowSense::Lte, 1., vec![(x, 1.), (y, 1.), (w, 1.)]));
        // 3x + 2y <= 4
        p.add_row(Row::new(RowSense::Lte, 4., vec![(x, 3.), (y, 2.)]));
        // x + z <= 1
        p.add_row(Row::new(RowSense::Lte, 1., vec![(x, 1.), (z, 1.)]));
        let stats = InstanceStats::new(&p);
        assert_eq!(stats.clauses, 1);
        assert_eq!(stats.at_most_one, 1);
        assert_eq!(stats.cardinality, 0);
        assert_eq!(stats.pseudo_boolean, 1);
        assert_eq!(stats.general, 1);
    }
}
