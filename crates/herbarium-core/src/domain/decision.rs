//! Admission decision engine.
//!
//! The estimate over the trailing window is
//! `current + previous * (1 - elapsed_fraction)`, and a request is admitted
//! while that estimate stays at or below the quota. All comparisons are done
//! on values scaled by the window length so the boundary is exact.

use super::policy::PolicyConfig;
use super::window::{WindowState, window_start};

/// Outcome for a single request. Recomputed every time, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the current window closes.
    pub reset_at_ms: u64,
    /// Unrounded sliding estimate, including this request.
    pub estimate: f64,
}

impl AdmissionDecision {
    /// Evaluate a window observation that already counts the current request.
    pub fn evaluate(state: &WindowState, policy: &PolicyConfig, now_ms: u64) -> Self {
        let window = u128::from(policy.window_ms);
        let limit = u128::from(policy.requests);

        let elapsed = u128::from(
            now_ms
                .saturating_sub(state.current_window_start)
                .min(policy.window_ms),
        );
        let scaled_estimate = u128::from(state.current_window_count) * window
            + u128::from(state.previous_window_count) * (window - elapsed);

        let allowed = scaled_estimate <= limit * window;
        let remaining = limit.saturating_sub(scaled_estimate.div_ceil(window));

        Self {
            allowed,
            limit: policy.requests,
            remaining: remaining as u32,
            reset_at_ms: state.current_window_start + policy.window_ms,
            estimate: scaled_estimate as f64 / window as f64,
        }
    }

    /// Decision used when the counter store could not be consulted at all.
    pub fn fail_open(policy: &PolicyConfig, now_ms: u64) -> Self {
        Self {
            allowed: true,
            limit: policy.requests,
            remaining: policy.requests,
            reset_at_ms: window_start(now_ms, policy.window_ms) + policy.window_ms,
            estimate: 0.0,
        }
    }

    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}
