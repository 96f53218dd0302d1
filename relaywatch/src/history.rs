//! Small utilities to manage bounded history buffers for charts.

use std::collections::VecDeque;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Bounded rate series with a running peak, for the network sparklines
pub struct RateHistory {
    values: VecDeque<u64>,
    cap: usize,
    peak: u64,
}

impl RateHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(cap),
            cap,
            peak: 0,
        }
    }

    pub fn push(&mut self, v: u64) {
        push_capped(&mut self.values, v, self.cap);
        self.peak = self.peak.max(v);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> u64 {
        self.values.back().copied().unwrap_or(0)
    }

    pub fn peak(&self) -> u64 {
        self.peak
    }

    /// Last `n` points, oldest first.
    pub fn tail(&self, n: usize) -> Vec<u64> {
        let start = self.values.len().saturating_sub(n);
        self.values.iter().skip(start).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_push_drops_oldest() {
        let mut dq = VecDeque::new();
        for v in 0..5 {
            push_capped(&mut dq, v, 3);
        }
        assert_eq!(dq, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn rate_history_tracks_peak_past_eviction() {
        let mut h = RateHistory::new(2);
        assert!(h.is_empty());
        h.push(9);
        h.push(1);
        h.push(2);
        assert_eq!(h.tail(10), vec![1, 2]);
        assert_eq!(h.tail(1), vec![2]);
        assert_eq!(h.latest(), 2);
        assert_eq!(h.peak(), 9);
    }
}
