//! Bounded, most-recent-first run log.

use std::collections::VecDeque;

use crate::types::Run;
use crate::{ResultsError, ResultsResult};

pub const HISTORY_CAPACITY: usize = 50;

/// Ring buffer of past runs. The head is the most recent run; once the
/// buffer exceeds its capacity the oldest runs are dropped.
#[derive(Debug, Clone)]
pub struct RunHistory {
    capacity: usize,
    runs: VecDeque<Run>,
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl RunHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// A zero capacity is bumped to one so the latest run is always kept.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            runs: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn record(&mut self, run: Run) {
        self.runs.push_front(run);
        self.runs.truncate(self.capacity);
    }

    /// Runs, most recent first.
    pub fn list(&self) -> impl DoubleEndedIterator<Item = &Run> + ExactSizeIterator {
        self.runs.iter()
    }

    pub fn latest(&self) -> Option<&Run> {
        self.runs.front()
    }

    pub fn get(&self, run_id: &str) -> ResultsResult<&Run> {
        self.runs
            .iter()
            .find(|r| r.id == run_id)
            .ok_or_else(|| ResultsError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }
}
