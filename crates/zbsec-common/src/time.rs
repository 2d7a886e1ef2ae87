// ============================================
// File: crates/zbsec-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Key establishment phases run against caller-configurable deadlines, and
//! certificates carry validity windows in Zigbee time. Both need a clock that
//! tests can drive deterministically.
//!
//! ## Main Functionality
//! - `Clock`: Monotonic time source trait
//! - `SystemClock`: Production clock backed by `Instant::now`
//! - `ManualClock`: Thread-safe, manually advanced clock for tests
//! - `Deadline`: A budget started at a given instant
//! - `ZigbeeTime`: Seconds since 2000-01-01 00:00:00 UTC
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ManualClock` stores nanoseconds in an `AtomicU64`
//! - Deadlines are timeouts, never retry budgets
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Constants
// ============================================

/// Unix timestamp of the Zigbee epoch (2000-01-01 00:00:00 UTC).
pub const ZIGBEE_EPOCH_UNIX_SECS: u64 = 946_684_800;

// ============================================
// Clock
// ============================================

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Production clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use zbsec_common::time::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let t0 = clock.now();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now() - t0, Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    /// Nanoseconds added to `base`
    offset_nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::Relaxed))
    }
}

// ============================================
// Deadline
// ============================================

/// A time budget started at a known instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    /// Starts a new deadline.
    #[must_use]
    pub const fn start(started: Instant, budget: Duration) -> Self {
        Self { started, budget }
    }

    /// Returns the configured budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Returns `true` once `now` is past the budget.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) > self.budget
    }

    /// Time left before expiry (zero once expired).
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.budget
            .saturating_sub(now.saturating_duration_since(self.started))
    }
}

// ============================================
// ZigbeeTime
// ============================================

/// UTC time in seconds since the Zigbee epoch (2000-01-01).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZigbeeTime(u64);

impl ZigbeeTime {
    /// Creates a time from raw seconds since 2000-01-01.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Current wall-clock time. Clocks set before 2000 yield zero.
    #[must_use]
    pub fn now() -> Self {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(unix.saturating_sub(ZIGBEE_EPOCH_UNIX_SECS))
    }

    /// Returns the raw seconds value.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

// ============================================
// Tests
// ============================================
