use crate::alignment_record::{AlignmentSource, ReadRecord};
use crate::config::FragmentConfig;
use crate::faidx::GcLookup;
use crate::fragment::{paired_fragment, single_read_fragment, Fragment, ReadGroupBuffer};
use crate::histogram::HistogramMap;
use crate::partition::Partition;
use crate::queue::PartitionQueue;
use crate::rounding::RoundingUnits;
use crate::target_index::TargetIndex;
use log::debug;
use rustc_hash::FxHashMap;
use std::io;

/// Histograms owned by one worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerHistograms {
    pub all: HistogramMap,
    pub target: HistogramMap,
    pub non_target: HistogramMap,
    /// Per target region, keyed by region id
    pub regions: FxHashMap<usize, HistogramMap>,
}

impl WorkerHistograms {
    pub fn new(units: RoundingUnits) -> Self {
        WorkerHistograms {
            all: HistogramMap::new(units),
            target: HistogramMap::new(units),
            non_target: HistogramMap::new(units),
            regions: FxHashMap::default(),
        }
    }

    /// Fold another worker's histograms into these
    pub fn merge(&mut self, other: WorkerHistograms) {
        self.all.merge_owned(other.all);
        self.target.merge_owned(other.target);
        self.non_target.merge_owned(other.non_target);
        for (id, histogram) in other.regions {
            match self.regions.get_mut(&id) {
                Some(existing) => existing.merge_owned(histogram),
                None => {
                    self.regions.insert(id, histogram);
                }
            }
        }
    }
}

/// Per-worker counters, summed by the driver
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub partitions: usize,
    pub records: u64,
    pub outside_partition: u64,
    pub low_mapping_quality: u64,
    pub paired_fragments: u64,
    pub single_reads: u64,
    pub discordant_reads: u64,
    pub flushed_unmatched: u64,
    pub no_gc: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.partitions += other.partitions;
        self.records += other.records;
        self.outside_partition += other.outside_partition;
        self.low_mapping_quality += other.low_mapping_quality;
        self.paired_fragments += other.paired_fragments;
        self.single_reads += other.single_reads;
        self.discordant_reads += other.discordant_reads;
        self.flushed_unmatched += other.flushed_unmatched;
        self.no_gc += other.no_gc;
    }

    /// Observations that reached the histograms
    pub fn observations(&self) -> u64 {
        self.paired_fragments + self.single_reads - self.no_gc
    }
}

pub struct WorkerResult {
    pub worker_id: usize,
    pub histograms: WorkerHistograms,
    pub stats: WorkerStats,
}

enum WorkerState {
    Idle,
    Dequeue,
    Slice(Partition),
    Flush(Partition),
    Close,
    Done,
}

/// Buckets fragments into the worker's histograms
struct Accumulator<'a, G: GcLookup> {
    min_mapping_quality: u8,
    capture_region_counts: bool,
    target_index: &'a TargetIndex,
    gc_lookup: &'a G,
    histograms: WorkerHistograms,
    stats: WorkerStats,
}

impl<G: GcLookup> Accumulator<'_, G> {
    fn process_read(
        &mut self,
        partition: &Partition,
        buffer: &mut ReadGroupBuffer,
        read: ReadRecord,
    ) -> io::Result<()> {
        self.stats.records += 1;

        // Reads starting in an earlier partition belong to that partition
        if !partition.owns_read_start(read.start) {
            self.stats.outside_partition += 1;
            return Ok(());
        }

        if read.discordant {
            self.stats.discordant_reads += 1;
            return self.score_single(partition, &read);
        }
        if !read.has_mate {
            return self.score_single(partition, &read);
        }

        match buffer.pair_or_store(read) {
            Some((first, second)) => self.score_pair(partition, &first, &second),
            None => Ok(()),
        }
    }

    fn score_single(&mut self, partition: &Partition, read: &ReadRecord) -> io::Result<()> {
        if read.mapping_quality < self.min_mapping_quality {
            self.stats.low_mapping_quality += 1;
            return Ok(());
        }
        self.stats.single_reads += 1;
        self.record(partition, single_read_fragment(read))
    }

    fn score_pair(
        &mut self,
        partition: &Partition,
        first: &ReadRecord,
        second: &ReadRecord,
    ) -> io::Result<()> {
        let below = [first, second]
            .iter()
            .filter(|r| r.mapping_quality < self.min_mapping_quality)
            .count() as u64;
        if below > 0 {
            self.stats.low_mapping_quality += below;
            return Ok(());
        }
        self.stats.paired_fragments += 1;
        self.record(partition, paired_fragment(first, second))
    }

    fn record(&mut self, partition: &Partition, fragment: Fragment) -> io::Result<()> {
        let chromosome = &partition.region.chromosome;
        let Some(gc) = self
            .gc_lookup
            .gc_fraction(chromosome, fragment.start, fragment.end())?
        else {
            self.stats.no_gc += 1;
            return Ok(());
        };

        let histograms = &mut self.histograms;
        histograms
            .all
            .add(fragment.length, gc, fragment.duplicate_count);

        // Fragments can run past the partition end into targets assigned
        // only to the next partition, so consult the whole index
        let fragment_inside = partition.region.contains_position(fragment.end())
            && partition.region.contains_position(fragment.start);
        let overlapping = if fragment_inside && partition.targets.is_empty() {
            Vec::new()
        } else {
            self.target_index
                .overlapping(chromosome, fragment.start, fragment.end())
        };

        let on_target = !overlapping.is_empty();
        if self.capture_region_counts {
            let units = *histograms.all.units();
            for id in overlapping {
                histograms
                    .regions
                    .entry(id)
                    .or_insert_with(|| HistogramMap::new(units))
                    .add(fragment.length, gc, fragment.duplicate_count);
            }
        }

        if on_target {
            histograms
                .target
                .add(fragment.length, gc, fragment.duplicate_count);
        } else {
            histograms
                .non_target
                .add(fragment.length, gc, fragment.duplicate_count);
        }
        Ok(())
    }
}

/// Drains the shared queue, scanning each partition with a private handle
pub struct Worker<'a, S: AlignmentSource, G: GcLookup> {
    id: usize,
    queue: &'a PartitionQueue,
    source: S,
    buffer: ReadGroupBuffer,
    accumulator: Accumulator<'a, G>,
}

impl<'a, S: AlignmentSource, G: GcLookup> Worker<'a, S, G> {
    pub fn new(
        id: usize,
        config: &FragmentConfig,
        queue: &'a PartitionQueue,
        target_index: &'a TargetIndex,
        gc_lookup: &'a G,
        source: S,
    ) -> Self {
        Worker {
            id,
            queue,
            source,
            buffer: ReadGroupBuffer::new(),
            accumulator: Accumulator {
                min_mapping_quality: config.min_mapping_quality,
                capture_region_counts: config.capture_region_counts,
                target_index,
                gc_lookup,
                histograms: WorkerHistograms::new(config.rounding_units()),
                stats: WorkerStats::default(),
            },
        }
    }

    /// Process partitions until the queue is empty
    pub fn run(mut self) -> io::Result<WorkerResult> {
        let mut state = WorkerState::Idle;
        loop {
            state = match state {
                WorkerState::Idle => WorkerState::Dequeue,
                WorkerState::Dequeue => match self.queue.pop() {
                    Some(partition) => WorkerState::Slice(partition),
                    None => WorkerState::Close,
                },
                WorkerState::Slice(partition) => {
                    self.slice(&partition)?;
                    WorkerState::Flush(partition)
                }
                WorkerState::Flush(partition) => {
                    self.flush(&partition)?;
                    self.accumulator.stats.partitions += 1;
                    WorkerState::Dequeue
                }
                WorkerState::Close => {
                    debug_assert!(self.buffer.is_empty());
                    WorkerState::Done
                }
                WorkerState::Done => break,
            };
        }

        debug!(
            "Worker {} done: {} partitions, {} records",
            self.id, self.accumulator.stats.partitions, self.accumulator.stats.records
        );
        Ok(WorkerResult {
            worker_id: self.id,
            histograms: self.accumulator.histograms,
            stats: self.accumulator.stats,
        })
    }

    fn slice(&mut self, partition: &Partition) -> io::Result<()> {
        let Worker {
            source,
            buffer,
            accumulator,
            ..
        } = self;

        let mut failure: Option<io::Error> = None;
        source.fetch_region(&partition.region, &mut |read| {
            if failure.is_none() {
                if let Err(e) = accumulator.process_read(partition, buffer, read) {
                    failure = Some(e);
                }
            }
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Score reads whose mate never showed up in this partition, then clear the buffer
    fn flush(&mut self, partition: &Partition) -> io::Result<()> {
        let unmatched = self.buffer.drain_unmatched();
        if !unmatched.is_empty() {
            debug!(
                "Worker {}: {} unmatched reads in {}",
                self.id,
                unmatched.len(),
                partition.region
            );
        }
        self.accumulator.stats.flushed_unmatched += unmatched.len() as u64;
        for read in &unmatched {
            self.accumulator.score_single(partition, read)?;
        }
        Ok(())
    }
}
