// ============================================
// File: crates/zbsec-core/src/counter.rs
// ============================================
//! # Frame Counter Tracker
//!
//! ## Creation Reason
//! Zigbee freshness is a strictly increasing 32-bit frame counter per key
//! and sender. This module issues outgoing counters and enforces the
//! inbound anti-replay rule.
//!
//! ## Acceptance Rule
//! ```text
//! no entry for (key, source)          → Accept
//! counter > last_accepted             → Accept
//! reset asserted && counter < 256     → Accept (caller-confirmed reboot)
//! otherwise                           → Replay
//! ```
//!
//! ## Check Then Commit
//! The inbound path calls `check_inbound` before authentication and
//! `accept_inbound` after it. Only the second call records the counter, so
//! a forged frame with a huge counter cannot lock out the real sender. The
//! commit re-evaluates the rule under the entry lock, so two frames racing
//! with the same counter cannot both be accepted.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Counters are keyed by `KeyRef`, i.e. key identity AND generation
//! - Outgoing counters never wrap; exhaustion requires a new key
//! - `DashMap` entry locks give per-entry atomicity; unrelated entries
//!   update concurrently
//!
//! ## Last Modified
//! v0.1.0 - Initial counter tracker

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use zbsec_common::ExtendedAddress;

use crate::error::{CoreError, Result};
use crate::keystore::KeyRef;
use crate::protocol::{FRAME_COUNTER_RESET_MAX, MAX_FRAME_COUNTER};

// ============================================
// CounterVerdict
// ============================================

/// Outcome of an inbound freshness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterVerdict {
    /// Counter is fresh.
    Accept,
    /// Counter accepted only because of an explicit reset.
    AcceptReset,
    /// Counter is not fresh.
    Replay {
        /// Last accepted value for this key and source
        last_accepted: u32,
    },
}

impl CounterVerdict {
    /// Returns `true` for either accept variant.
    #[must_use]
    pub const fn is_accept(&self) -> bool {
        !matches!(self, Self::Replay { .. })
    }

    /// Converts to a `Result`, mapping a replay to `CoreError::Replay`.
    ///
    /// # Errors
    /// `Replay` if the verdict is a replay.
    pub fn into_result(self, received: u32) -> Result<Self> {
        match self {
            Self::Replay { last_accepted } => Err(CoreError::replay(received, last_accepted)),
            other => Ok(other),
        }
    }
}

fn evaluate(last: Option<u32>, counter: u32, reset: bool) -> CounterVerdict {
    match last {
        None => CounterVerdict::Accept,
        Some(last) if counter > last => CounterVerdict::Accept,
        Some(_) if reset && counter < FRAME_COUNTER_RESET_MAX => CounterVerdict::AcceptReset,
        Some(last) => CounterVerdict::Replay {
            last_accepted: last,
        },
    }
}

// ============================================
// FrameCounterTracker
// ============================================

/// Outgoing and incoming frame counters.
///
/// # Example
/// ```
/// use zbsec_common::ExtendedAddress;
/// use zbsec_core::counter::{CounterVerdict, FrameCounterTracker};
/// use zbsec_core::keystore::{KeyIdentity, KeyRef};
///
/// let tracker = FrameCounterTracker::new();
/// let key = KeyRef { identity: KeyIdentity::Network(0), generation: 1 };
/// let src = ExtendedAddress::new(42);
///
/// assert_eq!(tracker.accept_inbound(key, src, 5, false), CounterVerdict::Accept);
/// assert!(!tracker.accept_inbound(key, src, 5, false).is_accept());
/// ```
#[derive(Debug, Default)]
pub struct FrameCounterTracker {
    /// Next counter to issue per key
    outbound: DashMap<KeyRef, u32>,
    /// Last accepted counter per (key, source)
    inbound: DashMap<(KeyRef, ExtendedAddress), u32>,
}

impl FrameCounterTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================
    // Outbound
    // ========================================

    /// Issues the next outgoing counter for `key`.
    ///
    /// # Errors
    /// `CountersExhausted` once the next value would be `0xFFFFFFFF`.
    pub fn next_outbound(&self, key: KeyRef) -> Result<u32> {
        let mut entry = self.outbound.entry(key).or_insert(0);
        let value = *entry;
        if value == MAX_FRAME_COUNTER {
            warn!(key = %key, "[FC] Outgoing frame counters exhausted");
            return Err(CoreError::CountersExhausted {
                key: key.to_string(),
            });
        }
        *entry = value + 1;
        trace!(key = %key, counter = value, "[FC] Outgoing counter issued");
        Ok(value)
    }

    /// Restores a persisted outgoing counter (the next value to issue).
    ///
    /// Never moves a counter backwards.
    pub fn restore_outbound(&self, key: KeyRef, next: u32) {
        let mut entry = self.outbound.entry(key).or_insert(next);
        if *entry < next {
            *entry = next;
        }
        debug!(key = %key, next = *entry, "[FC] Outgoing counter restored");
    }

    /// Next outgoing counter for `key`, if any was issued or restored.
    #[must_use]
    pub fn outbound_value(&self, key: &KeyRef) -> Option<u32> {
        self.outbound.get(key).map(|v| *v)
    }

    // ========================================
    // Inbound
    // ========================================

    /// Evaluates a counter without recording it.
    #[must_use]
    pub fn check_inbound(
        &self,
        key: KeyRef,
        source: ExtendedAddress,
        counter: u32,
        reset: bool,
    ) -> CounterVerdict {
        let last = self.inbound.get(&(key, source)).map(|v| *v);
        evaluate(last, counter, reset)
    }

    /// Evaluates a counter and records it if accepted.
    ///
    /// # Arguments
    /// * `reset` - Caller asserts the sender legitimately restarted its
    ///   counter (e.g. after a verified reboot)
    pub fn accept_inbound(
        &self,
        key: KeyRef,
        source: ExtendedAddress,
        counter: u32,
        reset: bool,
    ) -> CounterVerdict {
        let verdict = match self.inbound.entry((key, source)) {
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(counter);
                CounterVerdict::Accept
            }
            dashmap::mapref::entry::Entry::Occupied(mut e) => {
                let verdict = evaluate(Some(*e.get()), counter, reset);
                if verdict.is_accept() {
                    e.insert(counter);
                }
                verdict
            }
        };

        match verdict {
            CounterVerdict::Accept => {
                trace!(key = %key, source = %source, counter, "[FC] Counter accepted");
            }
            CounterVerdict::AcceptReset => {
                debug!(key = %key, source = %source, counter, "[FC] Counter reset accepted");
            }
            CounterVerdict::Replay { last_accepted } => {
                debug!(
                    key = %key,
                    source = %source,
                    counter,
                    last_accepted,
                    "[FC] Replay rejected"
                );
            }
        }
        verdict
    }

    /// Last accepted counter for `(key, source)`.
    #[must_use]
    pub fn last_inbound(&self, key: &KeyRef, source: ExtendedAddress) -> Option<u32> {
        self.inbound.get(&(*key, source)).map(|v| *v)
    }

    // ========================================
    // Retirement
    // ========================================

    /// Drops every counter recorded against `key`.
    pub fn forget(&self, key: &KeyRef) {
        self.outbound.remove(key);
        self.inbound.retain(|(k, _), _| k != key);
        debug!(key = %key, "[FC] Counters retired");
    }

    /// Drops counters of every key for which `is_live` returns `false`.
    pub fn prune(&self, is_live: impl Fn(&KeyRef) -> bool) {
        self.outbound.retain(|k, _| is_live(k));
        self.inbound.retain(|(k, _), _| is_live(k));
    }

    /// Number of tracked inbound entries.
    #[must_use]
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }
}

// ============================================
// Tests
// ============================================
