/// Global cooldown between externally visible alerts.
///
/// One gate is shared by every threat kind: a pass that matches several kinds
/// dispatches at most once, and a dispatch for one kind holds back all others
/// until the interval has elapsed.
#[derive(Debug, Clone)]
pub struct AlertDebouncer {
    interval_ms: i64,
    last_dispatch_ms: Option<i64>,
}

pub const DEFAULT_DEBOUNCE_MS: u64 = 5_000;

impl Default for AlertDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl AlertDebouncer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: i64::try_from(interval_ms).unwrap_or(i64::MAX),
            last_dispatch_ms: None,
        }
    }

    /// True when nothing was dispatched yet or strictly more than the
    /// interval has passed since the last dispatch.
    pub fn should_dispatch(&self, now_ms: i64) -> bool {
        match self.last_dispatch_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) > self.interval_ms,
        }
    }

    pub fn record_dispatch(&mut self, now_ms: i64) {
        self.last_dispatch_ms = Some(now_ms);
    }

    /// Check and record in one step.
    pub fn try_acquire(&mut self, now_ms: i64) -> bool {
        if self.should_dispatch(now_ms) {
            self.record_dispatch(now_ms);
            true
        } else {
            false
        }
    }

    pub fn last_dispatch_ms(&self) -> Option<i64> {
        self.last_dispatch_ms
    }
}
