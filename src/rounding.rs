/// Default bucket width for fragment lengths (bp)
pub const DEFAULT_LENGTH_UNIT: u32 = 10;

/// Default bucket width for GC fractions
pub const DEFAULT_GC_UNIT: f64 = 0.01;

/// Duplicate counts below this value keep full resolution
pub const DUPLICATE_COUNT_EXACT_LIMIT: u32 = 20;

/// Bucket width applied to duplicate counts at or above the exact limit
pub const DUPLICATE_COUNT_UNIT: u32 = 10;

/// Bucket widths used to turn raw observations into histogram keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundingUnits {
    pub length_unit: u32,
    pub gc_unit: f64,
}

impl Default for RoundingUnits {
    fn default() -> Self {
        RoundingUnits {
            length_unit: DEFAULT_LENGTH_UNIT,
            gc_unit: DEFAULT_GC_UNIT,
        }
    }
}

impl RoundingUnits {
    pub fn new(length_unit: u32, gc_unit: f64) -> Self {
        RoundingUnits {
            length_unit,
            gc_unit,
        }
    }

    /// Number of GC buckets per unit interval (100 for a 0.01 unit)
    pub fn gc_scale(&self) -> f64 {
        1.0 / self.gc_unit
    }
}

/// Round a length to the nearest multiple of `unit`, ties rounding up.
pub fn round_length(length: u32, unit: u32) -> u32 {
    if unit <= 1 {
        return length;
    }
    // Integer half-up: (length + unit/2) / unit. For odd units no tie exists.
    ((length as u64 + (unit / 2) as u64) / unit as u64 * unit as u64) as u32
}

/// Index of the GC bucket holding `gc`, ties rounding up.
///
/// The bucket value is `index / scale`, which keeps `round_gc(0.473, 0.01)`
/// exactly equal to the literal `0.47`.
pub fn gc_bucket(gc: f64, unit: f64) -> u32 {
    let scale = 1.0 / unit;
    (gc.max(0.0) * scale + 0.5).floor() as u32
}

/// Round a GC fraction to the nearest multiple of `unit`, ties rounding up.
pub fn round_gc(gc: f64, unit: f64) -> f64 {
    gc_bucket(gc, unit) as f64 / (1.0 / unit)
}

/// Collapse the long tail of duplicate counts.
///
/// Counts below 20 are kept as-is, larger counts go to the nearest
/// multiple of 10 with ties rounding up.
pub fn round_duplicate_count(count: u32) -> u32 {
    if count < DUPLICATE_COUNT_EXACT_LIMIT {
        count
    } else {
        round_length(count, DUPLICATE_COUNT_UNIT)
    }
}
