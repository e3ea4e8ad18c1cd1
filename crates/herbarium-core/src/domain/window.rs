//! Sliding-window counter state and the keys it is stored under.

use std::fmt;

use super::identity::CallerIdentity;

/// Counter key: one caller within one policy bucket.
///
/// The bucket is the matched policy key rather than the raw path, so every
/// path governed by the same entry shares a single counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    caller: CallerIdentity,
    bucket: String,
}

impl RateLimitKey {
    pub fn new(caller: CallerIdentity, bucket: impl Into<String>) -> Self {
        Self {
            caller,
            bucket: bucket.into(),
        }
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bucket, self.caller)
    }
}

/// Index of the fixed window containing `now_ms`.
pub fn window_index(now_ms: u64, window_ms: u64) -> u64 {
    now_ms / window_ms
}

/// Start timestamp of the fixed window containing `now_ms`.
pub fn window_start(now_ms: u64, window_ms: u64) -> u64 {
    window_index(now_ms, window_ms) * window_ms
}

/// Observed counter state for a key, including the request just recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowState {
    /// Hits in the completed window immediately before the current one.
    pub previous_window_count: u64,
    /// Hits in the current window.
    pub current_window_count: u64,
    /// Start of the window containing "now" at the last write.
    pub current_window_start: u64,
}

impl WindowState {
    pub fn new(previous_window_count: u64, current_window_count: u64, current_window_start: u64) -> Self {
        Self {
            previous_window_count,
            current_window_count,
            current_window_start,
        }
    }

    /// Record one hit at `now_ms`, rolling the window forward first.
    ///
    /// A one-window gap moves the current count into the previous slot; a
    /// larger gap discards both counts.
    pub fn record_hit(&mut self, now_ms: u64, window_ms: u64) {
        self.roll(now_ms, window_ms);
        self.current_window_count += 1;
    }

    /// Bring the state forward to the window containing `now_ms`.
    pub fn roll(&mut self, now_ms: u64, window_ms: u64) {
        let start = window_start(now_ms, window_ms);
        if start <= self.current_window_start {
            return;
        }

        if start - self.current_window_start == window_ms {
            self.previous_window_count = self.current_window_count;
        } else {
            self.previous_window_count = 0;
        }
        self.current_window_count = 0;
        self.current_window_start = start;
    }

    /// Whether the state no longer affects any estimate at `now_ms`.
    ///
    /// Both windows have passed once two full windows elapse from the start.
    pub fn is_expired(&self, now_ms: u64, window_ms: u64) -> bool {
        now_ms >= self.current_window_start.saturating_add(window_ms.saturating_mul(2))
    }
}
