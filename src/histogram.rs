use crate::rounding::{gc_bucket, round_duplicate_count, round_length, RoundingUnits};
use rustc_hash::FxHashMap;
use std::io::{self, Write};

/// Bucketed (fragment length, duplicate count, GC) triple.
///
/// GC is stored as a bucket index so keys hash and compare exactly; the
/// fraction it stands for is `gc_bucket * gc_unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistogramKey {
    pub length: u32,
    pub duplicate_count: u32,
    pub gc_bucket: u32,
}

impl HistogramKey {
    pub fn new(length: u32, duplicate_count: u32, gc: f64, units: &RoundingUnits) -> Self {
        HistogramKey {
            length: round_length(length, units.length_unit),
            duplicate_count: round_duplicate_count(duplicate_count),
            gc_bucket: gc_bucket(gc, units.gc_unit),
        }
    }

    pub fn gc_percent(&self, units: &RoundingUnits) -> f64 {
        self.gc_bucket as f64 / units.gc_scale()
    }
}

/// Occurrence counts per histogram key
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramMap {
    units: RoundingUnits,
    counts: FxHashMap<HistogramKey, u64>,
}

impl Default for HistogramMap {
    fn default() -> Self {
        Self::new(RoundingUnits::default())
    }
}

impl HistogramMap {
    pub fn new(units: RoundingUnits) -> Self {
        HistogramMap {
            units,
            counts: FxHashMap::default(),
        }
    }

    pub fn units(&self) -> &RoundingUnits {
        &self.units
    }

    /// Bucket a raw observation and count it
    pub fn add(&mut self, length: u32, gc: f64, duplicate_count: u32) {
        let key = HistogramKey::new(length, duplicate_count, gc, &self.units);
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Add every entry of `other` into this map.
    pub fn merge(&mut self, other: &HistogramMap) {
        debug_assert_eq!(self.units, other.units);
        for (key, count) in &other.counts {
            *self.counts.entry(*key).or_insert(0) += count;
        }
    }

    /// Merge by value, reusing the larger map's allocation
    pub fn merge_owned(&mut self, mut other: HistogramMap) {
        if other.counts.len() > self.counts.len() {
            std::mem::swap(&mut self.counts, &mut other.counts);
        }
        self.merge(&other);
    }

    pub fn get(&self, key: &HistogramKey) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries ordered by (length, duplicate count, GC)
    pub fn sorted_entries(&self) -> Vec<(HistogramKey, u64)> {
        let mut entries: Vec<(HistogramKey, u64)> =
            self.counts.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        entries
    }

    /// Write one tab-separated row per key, each prefixed with `label`.
    /// An empty histogram writes nothing.
    pub fn write_rows<W: Write>(&self, writer: &mut W, label: &str) -> io::Result<()> {
        for (key, count) in self.sorted_entries() {
            writeln!(
                writer,
                "{}\t{}\t{}\t{:.2}\t{}",
                label,
                key.length,
                key.duplicate_count,
                key.gc_percent(&self.units),
                count
            )?;
        }
        Ok(())
    }
}
