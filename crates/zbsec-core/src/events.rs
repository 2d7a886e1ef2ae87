// ============================================
// File: crates/zbsec-core/src/events.rs
// ============================================
//! # Security Events
//!
//! ## Creation Reason
//! Upper layers need to hear about key changes, rejected frames and key
//! establishment progress without polling. Components publish
//! `SecurityEvent`s to a shared `SecurityEvents` dispatcher and registered
//! listeners receive them synchronously.
//!
//! ## Main Functionality
//! - `SecurityEvent`: What happened (never carries key bytes)
//! - `SecurityListener`: Observer trait
//! - `SecurityEvents`: Listener registry and dispatcher
//! - `TracingListener`: Listener that writes events to the log
//!
//! ## ⚠️ Important Note for Next Developer
//! - Listeners run on the publishing thread; keep them short
//! - The listener list is cloned before dispatch, so a listener may
//!   subscribe or publish without deadlocking
//!
//! ## Last Modified
//! v0.1.0 - Initial event model

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use zbsec_common::ExtendedAddress;

use crate::cbke::CbkeState;
use crate::crypto::KeyType;
use crate::keystore::KeyRef;

// ============================================
// SecurityEvent
// ============================================

/// Notification published by the security core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    /// A key was installed or replaced.
    KeyInstalled {
        /// New key reference
        key: KeyRef,
        /// Role of the key
        key_type: KeyType,
        /// Reference retired by this install, if any
        replaced: Option<KeyRef>,
    },
    /// A key was removed.
    KeyRemoved {
        /// Retired key reference
        key: KeyRef,
    },
    /// The active network key changed.
    ActiveNetworkKeyChanged {
        /// New active sequence number
        key_seq: u8,
    },
    /// An inbound counter was accepted under an explicit reset.
    FrameCounterReset {
        /// Key the counter belongs to
        key: KeyRef,
        /// Sending device
        source: ExtendedAddress,
        /// Accepted counter value
        counter: u32,
    },
    /// A frame was rejected as a replay.
    ReplayRejected {
        /// Key the counter belongs to
        key: KeyRef,
        /// Sending device
        source: ExtendedAddress,
        /// Received counter
        received: u32,
        /// Last accepted counter
        last_accepted: u32,
    },
    /// No candidate key authenticated a frame.
    AuthenticationFailed {
        /// Claimed sending device
        source: ExtendedAddress,
    },
    /// Outgoing counters ran out for a key.
    CountersExhausted {
        /// Key that must be replaced
        key: KeyRef,
    },
    /// A key establishment session changed state.
    CbkeStateChanged {
        /// Remote device
        peer: ExtendedAddress,
        /// Previous state
        from: CbkeState,
        /// New state
        to: CbkeState,
    },
}

impl SecurityEvent {
    /// Returns `true` for events that may indicate an attack.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::ReplayRejected { .. } | Self::AuthenticationFailed { .. }
        )
    }
}

// ============================================
// SecurityListener
// ============================================

/// Observer of security events.
pub trait SecurityListener: Send + Sync {
    /// Called once per published event.
    fn on_event(&self, event: &SecurityEvent);
}

/// Listener that logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl SecurityListener for TracingListener {
    fn on_event(&self, event: &SecurityEvent) {
        if event.is_suspicious() {
            warn!(?event, "[EVENT] Suspicious security event");
        } else {
            info!(?event, "[EVENT] Security event");
        }
    }
}

// ============================================
// SecurityEvents
// ============================================

/// Registry of listeners.
#[derive(Default)]
pub struct SecurityEvents {
    listeners: RwLock<Vec<Arc<dyn SecurityListener>>>,
}

impl SecurityEvents {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn subscribe(&self, listener: Arc<dyn SecurityListener>) {
        self.listeners.write().push(listener);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Delivers an event to every listener.
    pub fn publish(&self, event: &SecurityEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_event(event);
        }
    }
}

impl std::fmt::Debug for SecurityEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityEvents")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Listener that keeps every event, for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingListener {
        pub(crate) events: Mutex<Vec<SecurityEvent>>,
    }

    impl SecurityListener for RecordingListener {
        fn on_event(&self, event: &SecurityEvent) {
            self.events.lock().push(event.clone());
        }
    }

    #[test]
    fn test_publish_reaches_all_listeners() {
        let events = SecurityEvents::new();
        let a = Arc::new(RecordingListener::default());
        let b = Arc::new(RecordingListener::default());
        events.subscribe(a.clone());
        events.subscribe(b.clone());
        events.subscribe(Arc::new(TracingListener));
        assert_eq!(events.listener_count(), 3);

        let event = SecurityEvent::AuthenticationFailed {
            source: ExtendedAddress::new(7),
        };
        events.publish(&event);

        assert_eq!(a.events.lock().as_slice(), &[event.clone()]);
        assert_eq!(b.events.lock().as_slice(), &[event]);
    }

    #[test]
    fn test_suspicious_classification() {
        assert!(SecurityEvent::AuthenticationFailed {
            source: ExtendedAddress::new(1)
        }
        .is_suspicious());
        assert!(!SecurityEvent::ActiveNetworkKeyChanged { key_seq: 1 }.is_suspicious());
    }
}
