use std::collections::VecDeque;

pub const DEFAULT_TREND_CAPACITY: usize = 20;

/// Fixed-length rolling history for the trend chart.
///
/// Starts full of zeros so the chart always has `capacity` points; each push
/// evicts the oldest value.
#[derive(Debug, Clone)]
pub struct TrendBuffer {
    points: VecDeque<u8>,
    capacity: usize,
}

impl Default for TrendBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_CAPACITY)
    }
}

impl TrendBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: std::iter::repeat(0).take(capacity).collect(),
            capacity,
        }
    }

    /// Values above 100 are clamped.
    pub fn push(&mut self, value: u8) {
        self.points.push_back(value.min(100));
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn push_presence(&mut self, threat_present: bool) -> u8 {
        let value = if threat_present { 100 } else { 0 };
        self.push(value);
        value
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<u8> {
        self.points.iter().copied().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
