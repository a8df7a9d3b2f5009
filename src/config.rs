use crate::rounding::{RoundingUnits, DEFAULT_GC_UNIT, DEFAULT_LENGTH_UNIT};
use std::io;

pub const DEFAULT_PARTITION_SIZE: u64 = 1_000_000;
pub const DEFAULT_MIN_MAPPING_QUALITY: u8 = 1;

/// Configuration for one aggregation run
#[derive(Debug, Clone)]
pub struct FragmentConfig {
    /// Window size (bp) used to split chromosomes into partitions.
    /// Default: 1,000,000
    pub partition_size: u64,

    /// Bucket width for fragment lengths.
    /// Default: 10
    pub fragment_length_unit: u32,

    /// Bucket width for GC fractions.
    /// Default: 0.01
    pub gc_percent_unit: f64,

    /// Reads below this mapping quality contribute nothing.
    pub min_mapping_quality: u8,

    /// Upper bound on concurrent workers.
    pub threads: usize,

    /// Build partitions from the target regions instead of the whole genome.
    pub only_target_regions: bool,

    /// Keep a histogram per target region and write one block per region.
    pub capture_region_counts: bool,

    /// Restrict the run to these chromosomes. Empty means all.
    pub chromosomes: Vec<String>,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        FragmentConfig {
            partition_size: DEFAULT_PARTITION_SIZE,
            fragment_length_unit: DEFAULT_LENGTH_UNIT,
            gc_percent_unit: DEFAULT_GC_UNIT,
            min_mapping_quality: DEFAULT_MIN_MAPPING_QUALITY,
            threads: 1,
            only_target_regions: false,
            capture_region_counts: false,
            chromosomes: Vec::new(),
        }
    }
}

impl FragmentConfig {
    pub fn rounding_units(&self) -> RoundingUnits {
        RoundingUnits::new(self.fragment_length_unit, self.gc_percent_unit)
    }

    /// Check the configuration against the number of loaded target regions
    pub fn validate(&self, target_region_count: usize) -> io::Result<()> {
        if self.partition_size == 0 {
            return Err(invalid("Partition size must be greater than 0"));
        }
        if self.fragment_length_unit == 0 {
            return Err(invalid("Fragment length unit must be greater than 0"));
        }
        if !(self.gc_percent_unit > 0.0 && self.gc_percent_unit <= 1.0) {
            return Err(invalid("GC percent unit must be in (0, 1]"));
        }
        if self.threads == 0 {
            return Err(invalid("Thread count must be greater than 0"));
        }
        if self.only_target_regions && target_region_count == 0 {
            return Err(invalid(
                "Restricting to target regions requires a non-empty target regions file",
            ));
        }
        if self.capture_region_counts && target_region_count == 0 {
            return Err(invalid(
                "Per-region counts require a non-empty target regions file",
            ));
        }
        Ok(())
    }

    /// Whether `chromosome` passes the chromosome restriction
    pub fn includes_chromosome(&self, chromosome: &str) -> bool {
        self.chromosomes.is_empty() || self.chromosomes.iter().any(|c| c == chromosome)
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}
