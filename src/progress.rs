//! Thread-safe progress aggregation across concurrent segments.

use crate::types::ProgressFn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Shared accumulator merging per-segment byte counts.
///
/// Every segment executor reports deltas here; the cumulative total is
/// monotonically non-decreasing within a run. When a callback is registered,
/// the add-and-notify pair runs under a mutex so invocations are serialized
/// and each observes a strictly increasing total, even though chunks arrive
/// concurrently across segments.
pub struct ProgressAggregator {
    bytes_written: AtomicU64,
    callback: Option<Mutex<ProgressFn>>,
}

impl ProgressAggregator {
    /// Registers the optional callback once at run start; it is read-only
    /// thereafter.
    pub fn new(callback: Option<ProgressFn>) -> Self {
        Self {
            bytes_written: AtomicU64::new(0),
            callback: callback.map(Mutex::new),
        }
    }

    /// Adds `delta` bytes to the cumulative total and notifies the callback
    /// with the new total.
    pub fn add(&self, delta: u64) {
        match &self.callback {
            Some(callback) => {
                // Lock poisoning only happens if a callback panicked; keep
                // counting rather than propagate the panic to sibling tasks.
                let mut callback = match callback.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let total = self.bytes_written.fetch_add(delta, Ordering::SeqCst) + delta;
                callback(total);
            }
            None => {
                self.bytes_written.fetch_add(delta, Ordering::SeqCst);
            }
        }
    }

    /// Cumulative bytes reported so far in this run.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_adds_sum_exactly() {
        let progress = Arc::new(ProgressAggregator::new(None));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let progress = Arc::clone(&progress);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    progress.add(3);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.bytes_written(), 8 * 1000 * 3);
    }

    #[test]
    fn callback_observes_non_decreasing_totals() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Arc::new(ProgressAggregator::new(Some(Box::new(move |total| {
            sink.lock().unwrap().push(total);
        }))));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let progress = Arc::clone(&progress);
            handles.push(std::thread::spawn(move || {
                for _ in 0..500 {
                    progress.add(7);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4 * 500);
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(*seen.last().unwrap(), 4 * 500 * 7);
    }
}
