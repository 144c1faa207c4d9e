use crate::core::errors::{LocportError, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Tracks how many import tool invocations are in flight at once.
///
/// The dispatcher's semaphore enforces the concurrency bound; the tracker
/// observes it independently so the at-most-N invariant can be checked after
/// a run (`peak_in_flight`) and violated acquisitions are rejected outright.
#[derive(Debug)]
pub struct SlotTracker {
    limit: usize,

    // Current usage counters
    in_flight: AtomicUsize,

    // Statistics
    peak_in_flight: AtomicUsize,
    total_started: AtomicU64,
}

impl SlotTracker {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(LocportError::validation_field(
                "concurrency limit must be greater than 0",
                "concurrency",
            ));
        }
        Ok(Self {
            limit,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            total_started: AtomicU64::new(0),
        })
    }

    /// Claim a slot for one invocation and check the concurrency limit.
    pub fn checkout(&self) -> Result<SlotGuard> {
        let new_total = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;

        if new_total > self.limit {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            return Err(LocportError::concurrency(
                "slot_checkout",
                format!("{} invocations in flight, limit is {}", new_total, self.limit),
            ));
        }

        // Update peak
        self.peak_in_flight.fetch_max(new_total, Ordering::SeqCst);
        self.total_started.fetch_add(1, Ordering::SeqCst);
        debug!("Checked out slot, in flight: {}", new_total);

        Ok(SlotGuard { tracker: self })
    }

    fn release(&self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!("Released slot, in flight: {}", remaining);
    }

    /// Number of invocations currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest in-flight count observed so far
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Total invocations started over the tracker's lifetime
    pub fn total_started(&self) -> u64 {
        self.total_started.load(Ordering::SeqCst)
    }

    /// The configured concurrency limit
    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// RAII guard for one in-flight invocation slot
pub struct SlotGuard<'a> {
    tracker: &'a SlotTracker,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.tracker.release();
    }
}
