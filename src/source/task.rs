//! Deterministic assignment of objects to workers.
//!
//! Every worker runs the same filter with its own index. An object belongs to worker
//! `floor_mod(java_string_hash(key), worker_count)`, so the full set of objects is split
//! across workers without overlap and without any coordination between them.

use crate::io::cloud::ObjectSummary;
use std::collections::HashSet;
use tracing::{info, warn};

/// `String.hashCode` as defined by the JVM: `s[0]*31^(n-1) + ... + s[n-1]` over UTF-16
/// code units, in wrapping 32-bit arithmetic.
///
/// Stable across processes and platforms, and identical to what a JVM worker computes
/// for the same key.
#[must_use]
pub fn java_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// This worker's slot in the fixed worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskAssignment {
    worker_index: u32,
    worker_count: u32,
}

impl TaskAssignment {
    /// The single-worker assignment, which accepts every object.
    pub const SINGLE: Self = Self {
        worker_index: 0,
        worker_count: 1,
    };

    /// Builds an assignment from raw configuration values.
    ///
    /// A missing, zero or negative worker count falls back to a single worker. The index
    /// is the raw task ordinal reduced modulo the count, so any ordinal is usable.
    #[must_use]
    pub fn resolve(raw_task_id: Option<i64>, raw_max_tasks: Option<i64>) -> Self {
        let worker_count = match raw_max_tasks {
            Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
            Some(n) => {
                warn!(max_tasks = n, "invalid worker count, falling back to a single worker");
                1
            }
            None => {
                info!("worker count not set, running as a single worker");
                1
            }
        };
        let raw = raw_task_id.unwrap_or(0);
        let worker_index = raw.rem_euclid(i64::from(worker_count)) as u32;
        if raw_task_id.is_some_and(|id| id != i64::from(worker_index)) {
            info!(task_id = raw, worker_index, worker_count, "task id reduced to worker index");
        }
        Self {
            worker_index,
            worker_count,
        }
    }

    #[must_use]
    pub fn worker_index(&self) -> u32 {
        self.worker_index
    }

    #[must_use]
    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    /// Whether `key` hashes to this worker.
    #[must_use]
    pub fn owns(&self, key: &str) -> bool {
        let slot = i64::from(java_string_hash(key)).rem_euclid(i64::from(self.worker_count));
        slot == i64::from(self.worker_index)
    }
}

impl Default for TaskAssignment {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Accepts the non-empty objects owned by this worker that have not failed before.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    assignment: TaskAssignment,
    failed: HashSet<String>,
}

impl TaskFilter {
    #[must_use]
    pub fn new(assignment: TaskAssignment) -> Self {
        Self {
            assignment,
            failed: HashSet::new(),
        }
    }

    /// Seeds the failed set, e.g. with keys reported by an earlier iterator.
    #[must_use]
    pub fn with_failed_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.failed.extend(keys);
        self
    }

    #[must_use]
    pub fn assignment(&self) -> TaskAssignment {
        self.assignment
    }

    #[must_use]
    pub fn accepts(&self, summary: &ObjectSummary) -> bool {
        summary.size > 0
            && self.assignment.owns(&summary.key)
            && !self.failed.contains(&summary.key)
    }

    pub fn mark_failed(&mut self, key: impl Into<String>) {
        self.failed.insert(key.into());
    }

    #[must_use]
    pub fn failed_keys(&self) -> &HashSet<String> {
        &self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_string_hash_matches_jvm() {
        assert_eq!(java_string_hash(""), 0);
        assert_eq!(java_string_hash("a"), 97);
        assert_eq!(java_string_hash("hello"), 99_162_322);
        // Overflows into the negative range on the JVM as well.
        assert_eq!(java_string_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_java_string_hash_uses_utf16_units() {
        // U+1F600 is a surrogate pair: 0xD83D, 0xDE00.
        let expected = 0xD83Di32.wrapping_mul(31).wrapping_add(0xDE00);
        assert_eq!(java_string_hash("\u{1F600}"), expected);
    }

    #[test]
    fn test_resolve_defaults_to_single_worker() {
        assert_eq!(TaskAssignment::resolve(None, None), TaskAssignment::SINGLE);
        assert_eq!(TaskAssignment::resolve(Some(3), Some(0)), TaskAssignment::SINGLE);
        assert_eq!(TaskAssignment::resolve(Some(3), Some(-4)), TaskAssignment::SINGLE);
    }

    #[test]
    fn test_resolve_reduces_task_id() {
        let a = TaskAssignment::resolve(Some(7), Some(3));
        assert_eq!((a.worker_index(), a.worker_count()), (1, 3));
        let b = TaskAssignment::resolve(Some(-1), Some(3));
        assert_eq!(b.worker_index(), 2);
    }

    #[test]
    fn test_negative_hash_uses_floor_mod() {
        // hashCode("polygenelubricants") == i32::MIN, and floorMod(i32::MIN, 3) == 1.
        let owner = TaskAssignment::resolve(Some(1), Some(3));
        assert!(owner.owns("polygenelubricants"));
        assert!(!TaskAssignment::resolve(Some(0), Some(3)).owns("polygenelubricants"));
    }

    #[test]
    fn test_filter_rejects_empty_and_failed() {
        let mut filter = TaskFilter::default();
        assert!(filter.accepts(&ObjectSummary::new("a", 1)));
        assert!(!filter.accepts(&ObjectSummary::new("b", 0)));

        filter.mark_failed("a");
        assert!(!filter.accepts(&ObjectSummary::new("a", 1)));
        assert!(filter.failed_keys().contains("a"));
    }
}
