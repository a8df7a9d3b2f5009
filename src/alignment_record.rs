use crate::partition::Chromosome;
use crate::region::GenomeRegion;
use rustc_hash::FxHashMap;
use std::io;
use std::sync::Arc;

/// Strand orientation of an aligned read
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug)]
#[repr(u8)]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

/// The fields of an aligned read that fragment reconstruction needs.
///
/// Coordinates are 1-based inclusive and exclude soft clips.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRecord {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub mapping_quality: u8,
    pub leading_soft_clip: u32,
    pub trailing_soft_clip: u32,
    /// The read is paired and its mate is mapped
    pub has_mate: bool,
    pub insert_size: i64,
    /// Pairing or orientation indicates a structural rearrangement
    pub discordant: bool,
    pub duplicate_count: u32,
}

impl ReadRecord {
    /// Start with soft-clipped bases at the 5' end restored.
    ///
    /// Only forward reads are adjusted: the 5' end of a reverse read is its
    /// alignment end.
    pub fn adjusted_start(&self) -> u64 {
        match self.strand {
            Strand::Forward => self
                .start
                .saturating_sub(self.leading_soft_clip as u64)
                .max(1),
            Strand::Reverse => self.start,
        }
    }

    pub fn unclipped_start(&self) -> u64 {
        self.start
            .saturating_sub(self.leading_soft_clip as u64)
            .max(1)
    }

    pub fn unclipped_end(&self) -> u64 {
        self.end + self.trailing_soft_clip as u64
    }

    /// Read length including soft clips
    pub fn unclipped_length(&self) -> u64 {
        self.unclipped_end() - self.unclipped_start() + 1
    }
}

/// A handle iterating aligned reads by region. One handle is never shared
/// between threads.
pub trait AlignmentSource {
    /// Visit every read overlapping `region`, in coordinate order
    fn fetch_region(
        &mut self,
        region: &GenomeRegion,
        visit: &mut dyn FnMut(ReadRecord),
    ) -> io::Result<()>;
}

/// Opens independent handles onto one alignment source
pub trait AlignmentSourceOpener: Sync {
    type Source: AlignmentSource;

    fn open(&self) -> io::Result<Self::Source>;

    /// Reference sequences in header order
    fn chromosomes(&self) -> io::Result<Vec<Chromosome>>;
}

/// Alignment source held in memory, sorted by start per chromosome
#[derive(Clone, Default)]
pub struct InMemoryAlignments {
    chromosomes: Vec<Chromosome>,
    reads: Arc<FxHashMap<String, Vec<ReadRecord>>>,
}

impl InMemoryAlignments {
    pub fn new(chromosomes: Vec<Chromosome>, reads: Vec<(String, ReadRecord)>) -> Self {
        let mut by_chrom: FxHashMap<String, Vec<ReadRecord>> = FxHashMap::default();
        for (chrom, read) in reads {
            by_chrom.entry(chrom).or_default().push(read);
        }
        for reads in by_chrom.values_mut() {
            reads.sort_by_key(|r| (r.start, r.end));
        }
        InMemoryAlignments {
            chromosomes,
            reads: Arc::new(by_chrom),
        }
    }
}

pub struct InMemoryReader {
    reads: Arc<FxHashMap<String, Vec<ReadRecord>>>,
}

impl AlignmentSource for InMemoryReader {
    fn fetch_region(
        &mut self,
        region: &GenomeRegion,
        visit: &mut dyn FnMut(ReadRecord),
    ) -> io::Result<()> {
        if let Some(reads) = self.reads.get(&region.chromosome) {
            for read in reads {
                if read.start > region.end {
                    break;
                }
                if read.end >= region.start {
                    visit(read.clone());
                }
            }
        }
        Ok(())
    }
}

impl AlignmentSourceOpener for InMemoryAlignments {
    type Source = InMemoryReader;

    fn open(&self) -> io::Result<InMemoryReader> {
        Ok(InMemoryReader {
            reads: Arc::clone(&self.reads),
        })
    }

    fn chromosomes(&self) -> io::Result<Vec<Chromosome>> {
        Ok(self.chromosomes.clone())
    }
}
