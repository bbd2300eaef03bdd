//! Memo of query results for the [`QueryEngine`][crate::engine::QueryEngine].
//!
//! Results are grouped by target variable and, within a target, keyed by the
//! full evidence vector. Lookups take the evidence as a slice, so probing the
//! memo never allocates; only an insertion copies the vector.

use std::collections::HashMap;

use crate::engine::Assignment;

/// Lookup counters of one target variable.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct TargetStats {
    pub hits: usize,
    pub misses: usize,
}

/// Per-target memo of joint probabilities.
#[derive(Debug, Clone)]
pub struct Memo {
    tables: Vec<HashMap<Vec<Assignment>, Vec<f64>>>,
    stats: Vec<TargetStats>,
    /// Initial capacity of a target's table, applied on its first insertion.
    capacity: usize,
}

impl Memo {
    /// Creates a memo for `num_targets` variables, sized for about `2^bits` entries overall.
    pub fn new(num_targets: usize, bits: usize) -> Self {
        assert!(bits <= 31, "Bits should be in the range 0..=31");
        Self {
            tables: vec![HashMap::new(); num_targets],
            stats: vec![TargetStats::default(); num_targets],
            capacity: (1usize << bits) / num_targets.max(1),
        }
    }

    /// Number of memoized results over all targets.
    pub fn len(&self) -> usize {
        self.tables.iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(HashMap::is_empty)
    }

    pub fn hits(&self) -> usize {
        self.stats.iter().map(|s| s.hits).sum()
    }

    pub fn misses(&self) -> usize {
        self.stats.iter().map(|s| s.misses).sum()
    }

    /// Counters of one target; zero for unknown targets.
    pub fn stats(&self, target: usize) -> TargetStats {
        self.stats.get(target).copied().unwrap_or_default()
    }

    /// Looks up the result of `target` under `evidence`, counting a hit or a miss.
    pub fn get(&mut self, target: usize, evidence: &[Assignment]) -> Option<&[f64]> {
        let found = self.tables.get(target).and_then(|table| table.get(evidence));
        if let Some(stats) = self.stats.get_mut(target) {
            if found.is_some() {
                stats.hits += 1;
            } else {
                stats.misses += 1;
            }
        }
        found.map(Vec::as_slice)
    }

    /// Stores a result. Inserts for unknown targets are dropped.
    pub fn insert(&mut self, target: usize, evidence: &[Assignment], joints: Vec<f64>) {
        let capacity = self.capacity;
        if let Some(table) = self.tables.get_mut(target) {
            if table.capacity() == 0 {
                table.reserve(capacity);
            }
            table.insert(evidence.to_vec(), joints);
        }
    }

    /// Drops the results of one target.
    pub fn clear_target(&mut self, target: usize) {
        if let Some(table) = self.tables.get_mut(target) {
            table.clear();
        }
    }

    /// Drops every result. Counters are kept.
    pub fn clear(&mut self) {
        for table in &mut self.tables {
            table.clear();
        }
    }
}
