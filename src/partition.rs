use crate::region::GenomeRegion;
use crate::target_index::TargetIndex;
use log::debug;

/// Name and length of a reference sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromosome {
    pub name: String,
    pub length: u64,
}

impl Chromosome {
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Chromosome {
            name: name.into(),
            length,
        }
    }
}

/// One unit of work: a genome interval and the target regions overlapping it
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub region: GenomeRegion,
    /// Ids of overlapping target regions, sorted by region start
    pub targets: Vec<usize>,
    /// First alignment start this partition scores. Equal to `region.start`
    /// when partitions tile the chromosome; lower for target-only partitions
    /// so reads overlapping the region from upstream are not lost.
    pub owned_start: u64,
}

impl Partition {
    fn new(region: GenomeRegion, target_index: &TargetIndex) -> Self {
        let targets = target_index.overlapping(&region.chromosome, region.start, region.end);
        Partition {
            owned_start: region.start,
            region,
            targets,
        }
    }

    /// Whether a read starting at `position` is scored by this partition
    pub fn owns_read_start(&self, position: u64) -> bool {
        position >= self.owned_start && position <= self.region.end
    }
}

/// Split every chromosome into windows of `partition_size` bases.
///
/// The last window of a chromosome is shorter when the length is not a
/// multiple of the partition size. A target region spanning a window
/// boundary is assigned to every window it touches.
pub fn build_genome_partitions(
    chromosomes: &[Chromosome],
    partition_size: u64,
    target_index: &TargetIndex,
) -> Vec<Partition> {
    let mut partitions = Vec::new();
    for chrom in chromosomes {
        let mut pos = 1u64;
        while pos <= chrom.length {
            let window_end = std::cmp::min(pos + partition_size - 1, chrom.length);
            partitions.push(Partition::new(
                GenomeRegion::new(chrom.name.clone(), pos, window_end),
                target_index,
            ));
            pos = window_end + 1;
        }
        debug!(
            "  Chromosome {} ({} bp) split into windows of {} bp",
            chrom.name, chrom.length, partition_size
        );
    }
    partitions
}

/// One partition per target region, restricted to the given chromosomes.
///
/// Each partition covers exactly its target region; nearby regions are not
/// grouped together. Partitions do not tile the chromosome, so each one also
/// owns reads starting upstream of it back to the end of the previous
/// partition. A region lying wholly inside an earlier one gets no partition.
pub fn build_target_partitions(
    chromosomes: &[Chromosome],
    target_index: &TargetIndex,
) -> Vec<Partition> {
    let mut partitions = Vec::new();
    for chrom in chromosomes {
        let mut regions: Vec<_> = target_index.regions_on(&chrom.name).collect();
        regions.sort_by_key(|target| (target.region.start, target.region.end, target.id));

        // Last position owned by an earlier partition on this chromosome
        let mut covered_end = 0u64;
        for target in regions {
            let end = std::cmp::min(target.region.end, chrom.length);
            if target.region.start > end {
                continue;
            }
            if end <= covered_end {
                debug!(
                    "  Target {} lies inside an earlier partition",
                    target.region
                );
                continue;
            }
            let mut partition = Partition::new(
                GenomeRegion::new(chrom.name.clone(), target.region.start, end),
                target_index,
            );
            partition.owned_start = covered_end + 1;
            covered_end = end;
            partitions.push(partition);
        }
    }
    partitions
}
