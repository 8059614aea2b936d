use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of bus activity, suitable for health checks or a
/// status command.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct BusStats {
    /// Number of currently-registered subscriber handlers, across all
    /// topics.
    pub handlers_registered: u64,
    /// Total events published (accepted by `publish`, regardless of
    /// whether any subscriber received them).
    pub events_published: u64,
    /// Total events actually delivered to a handler invocation.
    pub events_dispatched: u64,
    /// Total events displaced before a slow subscriber could read them.
    pub events_dropped: u64,
}

#[derive(Debug, Default)]
pub(crate) struct BusStatsInner {
    handlers_registered: AtomicU64,
    events_published: AtomicU64,
    events_dispatched: AtomicU64,
    events_dropped: AtomicU64,
}

impl BusStatsInner {
    pub(crate) fn register_handler(&self) {
        self.handlers_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unregister_handler(&self) {
        self.handlers_registered.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_publish(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatch(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drops(&self, count: u64) {
        self.events_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        BusStats {
            handlers_registered: self.handlers_registered.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }
}
