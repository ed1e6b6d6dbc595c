//! Rolling success tracker for update cycles.

use skycooker_core::constants::STATS_WINDOW;
use std::collections::VecDeque;

/// Bounded FIFO of update outcomes.
///
/// # Examples
///
/// ```
/// use skycooker_client::StatsTracker;
///
/// let mut stats = StatsTracker::new();
/// assert_eq!(stats.success_rate(), 0);
///
/// stats.record(true);
/// stats.record(false);
/// stats.record(true);
/// assert_eq!(stats.success_rate(), 67);
/// ```
#[derive(Debug, Clone)]
pub struct StatsTracker {
    outcomes: VecDeque<bool>,
    capacity: usize,
}

impl StatsTracker {
    /// Create a tracker keeping the last 100 outcomes.
    pub fn new() -> Self {
        Self::with_capacity(STATS_WINDOW)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an outcome, evicting the oldest beyond capacity.
    pub fn record(&mut self, success: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(success);
    }

    /// Percentage of successful outcomes, rounded half up; 0 when empty.
    pub fn success_rate(&self) -> u8 {
        let total = self.outcomes.len();
        if total == 0 {
            return 0;
        }
        let rate = (200 * self.successes() + total) / (2 * total);
        // rate <= 100
        rate as u8
    }

    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|success| **success).count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn clear(&mut self) {
        self.outcomes.clear();
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
