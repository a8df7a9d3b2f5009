use crate::alignment_record::AlignmentSourceOpener;
use crate::config::FragmentConfig;
use crate::faidx::GcLookup;
use crate::histogram::HistogramMap;
use crate::partition::{build_genome_partitions, build_target_partitions, Chromosome, Partition};
use crate::queue::PartitionQueue;
use crate::target_index::TargetIndex;
use crate::worker::{Worker, WorkerHistograms, WorkerResult, WorkerStats};
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use std::io;

/// Merged histograms of a whole run
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub all: HistogramMap,
    pub target: HistogramMap,
    pub non_target: HistogramMap,
    /// Indexed by target region id; empty unless per-region counts were requested
    pub regions: Vec<HistogramMap>,
    pub stats: WorkerStats,
    pub partition_count: usize,
    pub worker_count: usize,
}

/// Chromosomes of the alignment source that pass the configured restriction
pub fn resolve_chromosomes<O: AlignmentSourceOpener>(
    opener: &O,
    config: &FragmentConfig,
) -> io::Result<Vec<Chromosome>> {
    let available = opener.chromosomes()?;
    for requested in &config.chromosomes {
        if !available.iter().any(|c| &c.name == requested) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Chromosome '{requested}' not found in alignment header"),
            ));
        }
    }

    Ok(available
        .into_iter()
        .filter(|c| c.length > 0 && config.includes_chromosome(&c.name))
        .collect())
}

/// Chromosomes with no sequence in the reference; every fragment on them
/// would be dropped for lack of GC
pub fn missing_reference_sequences<'a, G: GcLookup>(
    chromosomes: &'a [Chromosome],
    gc_lookup: &G,
) -> Vec<&'a str> {
    chromosomes
        .iter()
        .filter(|c| !gc_lookup.has_sequence(&c.name))
        .map(|c| c.name.as_str())
        .collect()
}

pub fn build_partitions(
    chromosomes: &[Chromosome],
    config: &FragmentConfig,
    target_index: &TargetIndex,
) -> Vec<Partition> {
    if config.only_target_regions {
        build_target_partitions(chromosomes, target_index)
    } else {
        build_genome_partitions(chromosomes, config.partition_size, target_index)
    }
}

/// Scan the alignment source and return merged fragment histograms.
///
/// Any worker failure (including failing to open its alignment handle)
/// aborts the run with that error.
pub fn run_aggregation<O, G>(
    opener: &O,
    gc_lookup: &G,
    target_index: &TargetIndex,
    config: &FragmentConfig,
) -> io::Result<AggregateResult>
where
    O: AlignmentSourceOpener,
    G: GcLookup,
{
    config.validate(target_index.len())?;

    let chromosomes = resolve_chromosomes(opener, config)?;
    info!("Processing {} chromosomes", chromosomes.len());
    let missing = missing_reference_sequences(&chromosomes, gc_lookup);
    if !missing.is_empty() {
        warn!(
            "{} of {} chromosomes have no reference sequence, their fragments will be dropped: {}",
            missing.len(),
            chromosomes.len(),
            missing.join(", ")
        );
    }

    let partitions = build_partitions(&chromosomes, config, target_index);
    let partition_count = partitions.len();
    let worker_count = std::cmp::min(partition_count, config.threads).max(1);
    info!(
        "Built {} partitions, running {} worker{}",
        partition_count,
        worker_count,
        if worker_count == 1 { "" } else { "s" }
    );

    let queue = PartitionQueue::new(partitions);
    let run_worker = |id: usize| -> io::Result<WorkerResult> {
        let source = opener.open()?;
        Worker::new(id, config, &queue, target_index, gc_lookup, source).run()
    };

    let results: Vec<WorkerResult> = if worker_count <= 1 {
        vec![run_worker(0)?]
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(|i| format!("fragdist-worker-{i}"))
            .build()
            .map_err(|e| io::Error::other(format!("Failed to build worker pool: {e}")))?;
        // One worker per pool thread; broadcast returns once all of them finish
        pool.broadcast(|ctx| run_worker(ctx.index()))
            .into_iter()
            .collect::<io::Result<Vec<_>>>()?
    };

    Ok(merge_results(results, target_index, config, partition_count, worker_count))
}

fn merge_results(
    results: Vec<WorkerResult>,
    target_index: &TargetIndex,
    config: &FragmentConfig,
    partition_count: usize,
    worker_count: usize,
) -> AggregateResult {
    let units = config.rounding_units();
    let mut merged = WorkerHistograms::new(units);
    let mut stats = WorkerStats::default();

    for result in results {
        debug!(
            "Worker {}: {} partitions, {} records, {} pairs, {} single reads",
            result.worker_id,
            result.stats.partitions,
            result.stats.records,
            result.stats.paired_fragments,
            result.stats.single_reads
        );
        stats.merge(&result.stats);
        merged.merge(result.histograms);
    }

    let regions = if config.capture_region_counts {
        let mut regions = vec![HistogramMap::new(units); target_index.len()];
        for (id, histogram) in merged.regions {
            if let Some(slot) = regions.get_mut(id) {
                slot.merge_owned(histogram);
            }
        }
        regions
    } else {
        Vec::new()
    };

    info!(
        "Scanned {} records: {} paired fragments, {} single-read observations ({} discordant, {} unmatched), {} below mapping quality, {} without GC",
        stats.records,
        stats.paired_fragments,
        stats.single_reads,
        stats.discordant_reads,
        stats.flushed_unmatched,
        stats.low_mapping_quality,
        stats.no_gc
    );

    AggregateResult {
        all: merged.all,
        target: merged.target,
        non_target: merged.non_target,
        regions,
        stats,
        partition_count,
        worker_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment_record::{AlignmentSource, InMemoryAlignments, ReadRecord, Strand};
    use crate::faidx::InMemoryReference;
    use crate::region::GenomeRegion;

    fn source() -> InMemoryAlignments {
        let reads = (0..20u64)
            .flat_map(|i| {
                let start = 1 + i * 250;
                ["F", "R"].into_iter().map(move |side| {
                    let reverse = side == "R";
                    (
                        "chr1".to_string(),
                        ReadRecord {
                            name: format!("pair{i}"),
                            start: if reverse { start + 100 } else { start },
                            end: if reverse { start + 149 } else { start + 49 },
                            strand: if reverse { Strand::Reverse } else { Strand::Forward },
                            mapping_quality: 60,
                            leading_soft_clip: 0,
                            trailing_soft_clip: 0,
                            has_mate: true,
                            insert_size: if reverse { -150 } else { 150 },
                            discordant: false,
                            duplicate_count: 0,
                        },
                    )
                })
            })
            .collect();
        InMemoryAlignments::new(
            vec![Chromosome::new("chr1", 5000), Chromosome::new("chrM", 0)],
            reads,
        )
    }

    #[test]
    fn test_resolve_chromosomes() {
        let config = FragmentConfig::default();
        let chromosomes = resolve_chromosomes(&source(), &config).unwrap();
        // Zero-length sequences are dropped
        assert_eq!(chromosomes, vec![Chromosome::new("chr1", 5000)]);

        let missing = FragmentConfig {
            chromosomes: vec!["chr9".to_string()],
            ..Default::default()
        };
        assert!(resolve_chromosomes(&source(), &missing).is_err());
    }

    #[test]
    fn test_missing_reference_sequences() {
        let chromosomes = vec![Chromosome::new("chr1", 5000), Chromosome::new("chr2", 100)];
        let named_differently = InMemoryReference::new()
            .with_sequence("1", b"ACGT")
            .with_sequence("chr2", b"ACGT");
        assert_eq!(
            missing_reference_sequences(&chromosomes, &named_differently),
            vec!["chr1"]
        );

        // The run still succeeds, with every observation dropped
        let result = run_aggregation(
            &source(),
            &named_differently,
            &TargetIndex::empty(),
            &FragmentConfig::default(),
        )
        .unwrap();
        assert!(result.all.is_empty());
        assert_eq!(result.stats.no_gc, 20);
    }

    #[test]
    fn test_run_aggregation_counts_every_pair() {
        let gc = InMemoryReference::new().with_sequence("chr1", &b"GGCA".repeat(1250));
        let config = FragmentConfig {
            partition_size: 1000,
            threads: 3,
            ..Default::default()
        };
        let result = run_aggregation(&source(), &gc, &TargetIndex::empty(), &config).unwrap();

        assert_eq!(result.partition_count, 5);
        assert_eq!(result.worker_count, 3);
        assert_eq!(result.stats.partitions, 5);
        assert_eq!(result.all.total(), 20);
        assert_eq!(result.non_target.total(), 20);
        assert!(result.regions.is_empty());
    }

    #[test]
    fn test_invalid_config_fails_before_scanning() {
        let gc = InMemoryReference::new();
        let config = FragmentConfig {
            only_target_regions: true,
            ..Default::default()
        };
        let err = run_aggregation(&source(), &gc, &TargetIndex::empty(), &config).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    struct FailingOpener;

    struct NeverSource;

    impl AlignmentSource for NeverSource {
        fn fetch_region(
            &mut self,
            _region: &GenomeRegion,
            _visit: &mut dyn FnMut(ReadRecord),
        ) -> io::Result<()> {
            unreachable!()
        }
    }

    impl AlignmentSourceOpener for FailingOpener {
        type Source = NeverSource;

        fn open(&self) -> io::Result<NeverSource> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }

        fn chromosomes(&self) -> io::Result<Vec<Chromosome>> {
            Ok(vec![Chromosome::new("chr1", 10_000)])
        }
    }

    #[test]
    fn test_open_failure_is_fatal() {
        let gc = InMemoryReference::new();
        for threads in [1, 4] {
            let config = FragmentConfig {
                partition_size: 1000,
                threads,
                ..Default::default()
            };
            let err = run_aggregation(&FailingOpener, &gc, &TargetIndex::empty(), &config)
                .unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::NotFound);
        }
    }
}
