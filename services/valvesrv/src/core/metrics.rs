//! Rolling metric histories.

use serde::Serialize;
use std::collections::VecDeque;

/// Samples kept per history
pub const HISTORY_CAP: usize = 20;

/// Bounded rolling window of millisecond samples.
///
/// Holds at most [`HISTORY_CAP`] entries; pushing evicts the oldest first.
/// The only aggregate offered is the arithmetic mean.
#[derive(Debug, Clone, Serialize)]
pub struct RollingHistory {
    samples: VecDeque<u64>,
}

impl RollingHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(HISTORY_CAP),
        }
    }

    /// Record a sample, evicting the oldest when full.
    pub fn push(&mut self, sample_ms: u64) {
        if self.samples.len() == HISTORY_CAP {
            self.samples.pop_front();
        }
        self.samples.push_back(sample_ms);
    }

    /// Arithmetic mean of the window, 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<u64>() as f64 / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest-first view of the window
    pub fn samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().copied()
    }
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new()
    }
}
