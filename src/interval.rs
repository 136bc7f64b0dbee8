use std::ops::Mul;

/// Closed interval `[.0, .1]` over the extended reals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval(pub f64, pub f64);

impl Interval {
    pub fn is_empty(&self, tolerance: f64) -> bool {
        self.0 > self.1 + tolerance
    }

    /// Shrinks to the integers inside, forgiving values within `tolerance` of one.
    pub fn tighten(self, is_integer: bool, tolerance: f64) -> Interval {
        if !is_integer {
            return self;
        }
        Interval((self.0 - tolerance).ceil(), (self.1 + tolerance).floor())
    }

    pub fn intersect(self, other: Interval) -> Interval {
        Interval(self.0.max(other.0), self.1.min(other.1))
    }

    pub fn is_subset_of(&self, other: &Interval) -> bool {
        other.0 <= self.0 && self.1 <= other.1
    }
}

impl Mul<Interval> for f64 {
    type Output = Interval;

    /// Scales the interval. Zero coefficients yield `[0, 0]` even for infinite bounds.
    fn mul(self, rhs: Interval) -> Interval {
        if self == 0. {
            Interval(0., 0.)
        } else if self > 0. {
            Interval(self * rhs.0, self * rhs.1)
        } else {
            Interval(self * rhs.1, self * rhs.0)
        }
    }
}
