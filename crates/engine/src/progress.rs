//! Progress notifications for long aggregation runs.
//!
//! Listener callbacks run synchronously on the caller's thread. A panicking
//! listener is caught and logged — observability must never abort a run.

use std::panic::{catch_unwind, AssertUnwindSafe};

/// Receives aggregation progress. Implementations should be side-effect
/// light; they run inline with aggregation.
pub trait ProgressListener {
    /// Aggregation is starting over `total_groups` entity groups.
    fn on_started(&self, total_groups: usize) {
        let _ = total_groups;
    }

    /// One group finished merging.
    fn on_group(&self, group_key: &str, index: usize, total_groups: usize) {
        let _ = (group_key, index, total_groups);
    }

    /// Aggregation completed.
    fn on_completed(&self, canonical_records: usize) {
        let _ = canonical_records;
    }
}

/// Invoke a listener callback, swallowing (and logging) any panic.
pub(crate) fn notify(label: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        log::warn!("progress listener panicked in {label}; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Panicky;

    impl ProgressListener for Panicky {
        fn on_started(&self, _total: usize) {
            panic!("listener bug");
        }
    }

    #[test]
    fn panicking_listener_is_contained() {
        let listener = Panicky;
        notify("on_started", || listener.on_started(3));
        // Reaching this line is the assertion.
    }

    #[test]
    fn default_impls_are_noops() {
        struct Counting(AtomicUsize);
        impl ProgressListener for Counting {
            fn on_group(&self, _key: &str, _index: usize, _total: usize) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let listener = Counting(AtomicUsize::new(0));
        listener.on_started(2);
        listener.on_group("a", 0, 2);
        listener.on_group("b", 1, 2);
        listener.on_completed(2);
        assert_eq!(listener.0.load(Ordering::Relaxed), 2);
    }
}
