use crate::target_index::MAX_TARGET_COORDINATE;
use log::debug;
use noodles::bgzf;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// A genome interval with 1-based inclusive coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomeRegion {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
}

impl GenomeRegion {
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64) -> Self {
        debug_assert!(start >= 1 && start <= end);
        GenomeRegion {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }

    pub fn base_length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains_position(&self, position: u64) -> bool {
        position >= self.start && position <= self.end
    }

    /// Closed-interval overlap with `[start, end]` on the same chromosome
    pub fn overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.chromosome == chromosome && start <= self.end && end >= self.start
    }
}

impl fmt::Display for GenomeRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

/// A target region from the capture BED.
///
/// `id` is the region's position in the loaded list and is the identity
/// used to key per-region histograms across workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRegion {
    pub id: usize,
    pub region: GenomeRegion,
}

/// Load target regions from a BED file (plain or BGZF-compressed).
///
/// BED intervals are 0-based half-open and are converted to 1-based inclusive.
pub fn load_target_regions(path: &str) -> io::Result<Vec<TargetRegion>> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("Failed to open target regions file '{path}': {e}"),
        )
    })?;

    let reader: Box<dyn BufRead> = if [".gz", ".bgz"].iter().any(|e| path.ends_with(e)) {
        Box::new(BufReader::new(bgzf::io::Reader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };

    let regions = parse_bed(reader).map_err(|e| {
        io::Error::new(e.kind(), format!("Invalid target regions file '{path}': {e}"))
    })?;
    debug!("Loaded {} target regions from {}", regions.len(), path);
    Ok(regions)
}

pub fn parse_bed<R: BufRead>(reader: R) -> io::Result<Vec<TargetRegion>> {
    let mut regions = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }

        let fields: Vec<&str> = trimmed.split('\t').collect();
        if fields.len() < 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("line {}: expected at least 3 columns", line_num + 1),
            ));
        }

        let start = parse_coordinate(fields[1], line_num)?;
        let end = parse_coordinate(fields[2], line_num)?;
        if end <= start {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("line {}: end must be greater than start", line_num + 1),
            ));
        }

        if end > MAX_TARGET_COORDINATE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "line {}: end {} exceeds the largest supported coordinate {}",
                    line_num + 1,
                    end,
                    MAX_TARGET_COORDINATE
                ),
            ));
        }

        regions.push(TargetRegion {
            id: regions.len(),
            region: GenomeRegion::new(fields[0], start + 1, end),
        });
    }

    Ok(regions)
}

fn parse_coordinate(field: &str, line_num: usize) -> io::Result<u64> {
    field.trim().parse::<u64>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("line {}: invalid coordinate '{}'", line_num + 1, field),
        )
    })
}

/// Whether `path` names a readable file; used by configuration checks
pub fn file_exists(path: &str) -> bool {
    Path::new(path).is_file()
}
