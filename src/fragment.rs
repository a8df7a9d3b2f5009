use crate::alignment_record::{ReadRecord, Strand};
use rustc_hash::FxHashMap;

/// Genomic span and duplicate count of one inferred DNA fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub start: u64,
    pub length: u32,
    pub duplicate_count: u32,
}

impl Fragment {
    /// Last base of the fragment, 1-based inclusive
    pub fn end(&self) -> u64 {
        self.start + self.length.max(1) as u64 - 1
    }
}

/// Fragment implied by a read pair.
///
/// Starts at the lower adjusted start of the two reads and is `|insert size|`
/// long. Pairs without an insert size fall back to the span of both reads.
pub fn paired_fragment(first: &ReadRecord, second: &ReadRecord) -> Fragment {
    let start = std::cmp::min(first.adjusted_start(), second.adjusted_start());
    let insert_size = if first.insert_size != 0 {
        first.insert_size
    } else {
        second.insert_size
    };
    let length = if insert_size != 0 {
        insert_size.unsigned_abs()
    } else {
        let end = std::cmp::max(first.unclipped_end(), second.unclipped_end());
        end - start + 1
    };
    Fragment {
        start,
        length: clamp_length(length),
        duplicate_count: std::cmp::max(first.duplicate_count, second.duplicate_count),
    }
}

/// Fragment evidenced by a single read.
///
/// Discordant and mate-less reads only tell us about the read itself, so
/// their span is the unclipped read. Reads whose mate was never seen use the
/// insert size, anchored at the read's 5' end.
pub fn single_read_fragment(read: &ReadRecord) -> Fragment {
    if read.discordant || !read.has_mate || read.insert_size == 0 {
        return Fragment {
            start: read.unclipped_start(),
            length: clamp_length(read.unclipped_length()),
            duplicate_count: read.duplicate_count,
        };
    }

    let length = read.insert_size.unsigned_abs();
    let start = match read.strand {
        Strand::Forward => read.adjusted_start(),
        Strand::Reverse => (read.unclipped_end() + 1).saturating_sub(length).max(1),
    };
    Fragment {
        start,
        length: clamp_length(length),
        duplicate_count: read.duplicate_count,
    }
}

fn clamp_length(length: u64) -> u32 {
    length.min(u32::MAX as u64) as u32
}

/// Reads waiting for their mate within the current partition.
///
/// Owned by exactly one worker and emptied at the end of every partition.
#[derive(Default)]
pub struct ReadGroupBuffer {
    pending: FxHashMap<String, ReadRecord>,
}

impl ReadGroupBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `read`, or return it together with its previously buffered mate
    pub fn pair_or_store(&mut self, read: ReadRecord) -> Option<(ReadRecord, ReadRecord)> {
        match self.pending.remove(&read.name) {
            Some(mate) => Some((mate, read)),
            None => {
                self.pending.insert(read.name.clone(), read);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every unmatched read, ordered by position then name
    pub fn drain_unmatched(&mut self) -> Vec<ReadRecord> {
        let mut reads: Vec<ReadRecord> = self.pending.drain().map(|(_, read)| read).collect();
        reads.sort_by(|a, b| (a.start, &a.name).cmp(&(b.start, &b.name)));
        reads
    }
}
