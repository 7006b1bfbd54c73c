//! Dispatcher metrics
//!
//! Atomic counters, relaxed ordering. Values are eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the dispatcher
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Envelopes taken off the event queue
    envelopes_received: AtomicU64,

    /// `Sink::send` calls made
    messages_delivered: AtomicU64,

    /// Deliveries skipped because the destination was not ready yet
    messages_gated: AtomicU64,

    /// Envelopes on a port without routes
    envelopes_unrouted: AtomicU64,

    /// Readiness events for destinations without routes
    unknown_destinations: AtomicU64,
}

impl DispatcherMetrics {
    #[inline]
    pub const fn new() -> Self {
        Self {
            envelopes_received: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            messages_gated: AtomicU64::new(0),
            envelopes_unrouted: AtomicU64::new(0),
            unknown_destinations: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.envelopes_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_gated(&self) {
        self.messages_gated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unrouted(&self) {
        self.envelopes_unrouted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unknown_destination(&self) {
        self.unknown_destinations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            envelopes_received: self.envelopes_received.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_gated: self.messages_gated.load(Ordering::Relaxed),
            envelopes_unrouted: self.envelopes_unrouted.load(Ordering::Relaxed),
            unknown_destinations: self.unknown_destinations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatcherMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub envelopes_received: u64,
    pub messages_delivered: u64,
    pub messages_gated: u64,
    pub envelopes_unrouted: u64,
    pub unknown_destinations: u64,
}
