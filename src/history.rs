use std::collections::VecDeque;

use crate::point::CandidatePoint;

/// The last `capacity` candidates of a run, oldest first.
#[derive(Debug, Clone)]
pub struct CandidateHistory {
    entries: VecDeque<(u64, CandidatePoint)>,
    capacity: usize,
}

impl CandidateHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, candidate: CandidatePoint) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((candidate.fingerprint(), candidate));
    }

    pub fn contains(&self, candidate: &CandidatePoint) -> bool {
        let fingerprint = candidate.fingerprint();
        self.entries
            .iter()
            .any(|(f, c)| *f == fingerprint && c == candidate)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
