//! Poll scheduling: the watermark cursor, explicit timer policies, and
//! failure bookkeeping shared by every loop.
//!
//! The policy is an explicit, configurable choice per loop kind:
//! [`PollPolicy::FixedRate`] for idempotent full-refresh loops,
//! [`PollPolicy::Adaptive`] for incremental ones. Both shapes hold one
//! in-flight request per loop by construction, since a tick body is awaited
//! to completion before the next tick is taken.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, warn};

/// Default refresh cadence for the full-list loops (ms).
pub const LIST_REFRESH_MS: u64 = 3000;
/// Default re-poll delay after a successful incremental tick (ms).
pub const ADAPTIVE_SUCCESS_MS: u64 = 100;
/// Default retry delay after a failed incremental tick (ms).
pub const ADAPTIVE_FAILURE_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Highest sequence or turn number already processed.
///
/// Monotonically non-decreasing; only [`advance`](Watermark::advance) after
/// a successful fetch, so a failed tick never moves the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Watermark(u64);

impl Watermark {
    pub const ZERO: Watermark = Watermark(0);

    pub fn new(value: u64) -> Self {
        Watermark(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Raise the watermark to `seen` if it is higher. Returns `true` when
    /// the cursor actually moved.
    pub fn advance(&mut self, seen: u64) -> bool {
        if seen > self.0 {
            self.0 = seen;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Poll policy
// ---------------------------------------------------------------------------

/// When the next tick of a poll loop is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPolicy {
    /// Repeat at a fixed cadence regardless of tick outcome. Missed ticks
    /// are skipped, never bunched.
    FixedRate { every: Duration },
    /// Self-rescheduling one-shot: fast re-poll after a successful tick,
    /// slower retry after a failure.
    Adaptive { success: Duration, failure: Duration },
}

impl PollPolicy {
    /// The list-page default: full refresh every 3 s.
    pub fn fixed_default() -> Self {
        PollPolicy::FixedRate {
            every: Duration::from_millis(LIST_REFRESH_MS),
        }
    }

    /// The tailing default: 100 ms after success, 1 s after failure.
    pub fn adaptive_default() -> Self {
        PollPolicy::Adaptive {
            success: Duration::from_millis(ADAPTIVE_SUCCESS_MS),
            failure: Duration::from_millis(ADAPTIVE_FAILURE_MS),
        }
    }

    /// The delay this policy imposes after a tick with the given outcome.
    pub fn delay_after(&self, ok: bool) -> Duration {
        match *self {
            PollPolicy::FixedRate { every } => every,
            PollPolicy::Adaptive { success, failure } => {
                if ok {
                    success
                } else {
                    failure
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Drives one poll loop according to its [`PollPolicy`].
///
/// The first [`wait`](Ticker::wait) always completes immediately — every
/// page loaded once before settling into its cadence.
pub struct Ticker {
    policy: PollPolicy,
    interval: Option<tokio::time::Interval>,
    first: bool,
}

impl Ticker {
    pub fn new(policy: PollPolicy) -> Self {
        let interval = match policy {
            PollPolicy::FixedRate { every } => {
                let mut interval = tokio::time::interval(every);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                Some(interval)
            }
            PollPolicy::Adaptive { .. } => None,
        };
        Ticker {
            policy,
            interval,
            first: true,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Wait until the next tick is due. `last_ok` reports the previous
    /// tick's outcome and only matters for adaptive policies.
    pub async fn wait(&mut self, last_ok: bool) {
        if let Some(interval) = &mut self.interval {
            // The interval's first tick completes immediately; slow ticks
            // are skipped rather than bunched.
            interval.tick().await;
            return;
        }
        if self.first {
            self.first = false;
            return;
        }
        tokio::time::sleep(self.policy.delay_after(last_ok)).await;
    }
}

// ---------------------------------------------------------------------------
// Failure bookkeeping
// ---------------------------------------------------------------------------

/// Tracks consecutive failed ticks for one loop and logs with escalating
/// severity, in the shape the rest of our tooling expects.
#[derive(Debug, Default)]
pub struct FailureLog {
    consecutive: u32,
}

impl FailureLog {
    pub fn new() -> Self {
        FailureLog::default()
    }

    /// Record a successful tick.
    pub fn success(&mut self) {
        self.consecutive = 0;
    }

    /// Record a failed tick and log it. Returns the consecutive count.
    pub fn failure(&mut self, loop_name: &str, err: &dyn std::fmt::Display) -> u32 {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive >= 5 {
            error!(
                %err,
                loop_name,
                consecutive_failures = self.consecutive,
                "poll failed repeatedly, will retry"
            );
        } else {
            warn!(%err, loop_name, "poll failed, will retry");
        }
        self.consecutive
    }

    /// Whether the most recent tick failed (the view is showing stale data).
    pub fn is_degraded(&self) -> bool {
        self.consecutive > 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
