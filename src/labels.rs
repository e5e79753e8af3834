use std::collections::HashMap;

/// Per-compile-session unique node label generator.
///
/// Labels name filtergraph node outputs, so a duplicate silently rewires the
/// graph. The allocator is caller-owned and threaded through one compile
/// session; it is never shared across jobs.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    counters: HashMap<String, u64>,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `prefix` + the next per-prefix counter value, starting at 0.
    pub fn next(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let label = format!("{prefix}{counter}");
        *counter += 1;
        label
    }

    /// Reads the label `next` would return, without advancing the counter.
    pub fn peek(&self, prefix: &str) -> String {
        let counter = self.counters.get(prefix).copied().unwrap_or(0);
        format!("{prefix}{counter}")
    }

    pub fn reset(&mut self) {
        self.counters.clear();
    }

    pub fn reset_prefix(&mut self, prefix: &str) {
        self.counters.remove(prefix);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_next_yields_distinct_ordinal_labels() {
        let mut alloc = LabelAllocator::new();
        let labels: Vec<String> = (0..5).map(|_| alloc.next("v")).collect();
        assert_eq!(labels, vec!["v0", "v1", "v2", "v3", "v4"]);
    }

    #[test]
    fn prefixes_count_independently() {
        let mut alloc = LabelAllocator::new();
        assert_eq!(alloc.next("v"), "v0");
        assert_eq!(alloc.next("a"), "a0");
        assert_eq!(alloc.next("v"), "v1");
        assert_eq!(alloc.next("a"), "a1");
    }

    #[test]
    fn peek_does_not_advance() {
        let mut alloc = LabelAllocator::new();
        assert_eq!(alloc.peek("v"), "v0");
        assert_eq!(alloc.peek("v"), "v0");
        assert_eq!(alloc.next("v"), "v0");
        assert_eq!(alloc.peek("v"), "v1");
    }

    #[test]
    fn reset_prefix_only_clears_that_prefix() {
        let mut alloc = LabelAllocator::new();
        alloc.next("v");
        alloc.next("a");
        alloc.reset_prefix("v");
        assert_eq!(alloc.next("v"), "v0");
        assert_eq!(alloc.next("a"), "a1");
    }

    #[test]
    fn reset_clears_everything() {
        let mut alloc = LabelAllocator::new();
        alloc.next("v");
        alloc.next("a");
        alloc.reset();
        assert_eq!(alloc.next("v"), "v0");
        assert_eq!(alloc.next("a"), "a0");
    }
}
