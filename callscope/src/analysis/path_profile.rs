//! Path-attributed sample counters.
//!
//! Every sample is charged to the full modeled call path of the sampling
//! thread at that moment, not just the innermost routine. Two samples in
//! `compute` reached via `main → parse → compute` and `main → render →
//! compute` land in different buckets.
//!
//! # Architecture
//!
//! - **`PathProfile`** - Aggregates samples as events stream in
//! - **`HotPath`** / **`RoutineHotspot`** - View models with resolved names
//!
//! # Performance
//!
//! - `record()`: O(depth) to hash the path, amortized O(1) map update
//! - `hot_paths()`: O(n log n) where n = unique paths (sorting)

// Percentage calculations intentionally convert counts to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::domain::{Address, Tid};
use crate::symbolization::NameResolver;

/// A call path with its share of the samples
#[derive(Debug, Clone, Serialize)]
pub struct HotPath {
    /// Resolved routine names, outermost first
    pub frames: Vec<String>,

    /// Raw call targets, outermost first
    pub targets: Vec<Address>,

    /// Samples charged to this exact path
    pub count: u64,

    /// Percentage of attributed samples (0.0 - 100.0)
    pub percentage: f64,

    /// Per-thread breakdown
    pub threads: BTreeMap<Tid, u64>,
}

/// Samples aggregated by innermost routine, summed over all paths
#[derive(Debug, Clone, Serialize)]
pub struct RoutineHotspot {
    pub name: String,
    pub count: u64,
    pub percentage: f64,
}

#[derive(Debug, Default)]
struct PathStats {
    count: u64,
    threads: HashMap<Tid, u64>,
}

/// Sample counts keyed by call path
#[derive(Debug, Default)]
pub struct PathProfile {
    paths: HashMap<Vec<Address>, PathStats>,

    /// Samples charged to a non-empty path
    total_samples: u64,

    /// Samples taken while the thread's modeled stack was empty
    unattributed: u64,
}

impl PathProfile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one sample on `tid` to `path` (outermost first)
    pub fn record(&mut self, tid: Tid, path: &[Address]) {
        if path.is_empty() {
            self.unattributed += 1;
            return;
        }

        self.total_samples += 1;

        let stats = self.paths.entry(path.to_vec()).or_default();
        stats.count += 1;
        *stats.threads.entry(tid).or_insert(0) += 1;
    }

    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    #[must_use]
    pub fn unattributed(&self) -> u64 {
        self.unattributed
    }

    /// Number of distinct paths seen
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn percentage(&self, count: u64) -> f64 {
        if self.total_samples > 0 {
            (count as f64 / self.total_samples as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Paths sorted by sample count (most frequent first), names resolved
    ///
    /// `limit` caps the number of returned paths.
    #[must_use]
    pub fn hot_paths<R: NameResolver + ?Sized>(
        &self,
        resolver: &R,
        limit: Option<usize>,
    ) -> Vec<HotPath> {
        let mut ranked: Vec<(&Vec<Address>, &PathStats)> = self.paths.iter().collect();
        // Ties broken by path so output is deterministic
        ranked.sort_unstable_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));

        ranked
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(targets, stats)| HotPath {
                frames: targets
                    .iter()
                    .map(|&target| resolver.routine_name(target).into_owned())
                    .collect(),
                targets: targets.clone(),
                count: stats.count,
                percentage: self.percentage(stats.count),
                threads: stats.threads.iter().map(|(&tid, &n)| (tid, n)).collect(),
            })
            .collect()
    }

    /// Samples grouped by innermost routine name, most frequent first
    #[must_use]
    pub fn hot_routines<R: NameResolver + ?Sized>(&self, resolver: &R) -> Vec<RoutineHotspot> {
        let mut by_name: HashMap<String, u64> = HashMap::new();
        for (path, stats) in &self.paths {
            if let Some(&leaf) = path.last() {
                *by_name.entry(resolver.routine_name(leaf).into_owned()).or_insert(0) += stats.count;
            }
        }

        let mut hotspots: Vec<RoutineHotspot> = by_name
            .into_iter()
            .map(|(name, count)| RoutineHotspot { name, count, percentage: self.percentage(count) })
            .collect();

        hotspots.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        hotspots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolization::SymbolTable;

    fn symbols() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.insert(0x100, None, "main");
        table.insert(0x200, None, "parse");
        table.insert(0x300, None, "render");
        table.insert(0x400, None, "compute");
        table
    }

    fn path(targets: &[u64]) -> Vec<Address> {
        targets.iter().copied().map(Address).collect()
    }

    fn create_test_profile() -> PathProfile {
        let mut profile = PathProfile::new();
        profile.record(Tid(1), &path(&[0x100, 0x200, 0x400]));
        profile.record(Tid(1), &path(&[0x100, 0x200, 0x400]));
        profile.record(Tid(2), &path(&[0x100, 0x200, 0x400]));
        profile.record(Tid(2), &path(&[0x100, 0x300, 0x400]));
        profile
    }

    #[test]
    fn test_same_routine_via_different_paths_is_split() {
        let profile = create_test_profile();
        let hot = profile.hot_paths(&symbols(), None);

        assert_eq!(hot.len(), 2);
        assert_eq!(hot[0].frames, vec!["main", "parse", "compute"]);
        assert_eq!(hot[0].count, 3);
        assert_eq!(hot[1].frames, vec!["main", "render", "compute"]);
        assert_eq!(hot[1].count, 1);
    }

    #[test]
    fn test_percentages_and_threads() {
        let profile = create_test_profile();
        let hot = profile.hot_paths(&symbols(), None);

        assert!((hot[0].percentage - 75.0).abs() < 0.01);
        assert!((hot[1].percentage - 25.0).abs() < 0.01);
        assert_eq!(hot[0].threads[&Tid(1)], 2);
        assert_eq!(hot[0].threads[&Tid(2)], 1);
    }

    #[test]
    fn test_limit_truncates() {
        let profile = create_test_profile();
        assert_eq!(profile.hot_paths(&symbols(), Some(1)).len(), 1);
    }

    #[test]
    fn test_empty_path_is_unattributed() {
        let mut profile = PathProfile::new();
        profile.record(Tid(1), &[]);

        assert_eq!(profile.total_samples(), 0);
        assert_eq!(profile.unattributed(), 1);
        assert!(profile.is_empty());
    }

    #[test]
    fn test_hot_routines_sum_over_paths() {
        let profile = create_test_profile();
        let routines = profile.hot_routines(&symbols());

        assert_eq!(routines.len(), 1);
        assert_eq!(routines[0].name, "compute");
        assert_eq!(routines[0].count, 4);
        assert!((routines[0].percentage - 100.0).abs() < 0.01);
    }
}
