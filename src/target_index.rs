use crate::region::TargetRegion;
use coitrees::{COITree, IntervalNode, IntervalTree};
use rustc_hash::FxHashMap;

/// Largest coordinate a target region may have; the trees store `i32` bounds
pub const MAX_TARGET_COORDINATE: u64 = i32::MAX as u64;

/// Read-only overlap index over target regions, one tree per chromosome.
///
/// Built once before any worker starts and shared by reference afterwards.
pub struct TargetIndex {
    regions: Vec<TargetRegion>,
    trees: FxHashMap<String, COITree<usize, u32>>,
}

impl TargetIndex {
    /// `regions[i].id` must equal `i`
    pub fn new(regions: Vec<TargetRegion>) -> Self {
        debug_assert!(regions.iter().enumerate().all(|(i, t)| t.id == i));
        debug_assert!(regions
            .iter()
            .all(|t| t.region.end <= MAX_TARGET_COORDINATE));
        let mut nodes_by_chrom: FxHashMap<String, Vec<IntervalNode<usize, u32>>> =
            FxHashMap::default();
        for target in &regions {
            // COITree uses closed intervals, same as GenomeRegion
            nodes_by_chrom
                .entry(target.region.chromosome.clone())
                .or_default()
                .push(IntervalNode::new(
                    target.region.start as i32,
                    target.region.end as i32,
                    target.id,
                ));
        }

        let trees = nodes_by_chrom
            .into_iter()
            .map(|(chrom, nodes)| (chrom, COITree::new(&nodes)))
            .collect();

        TargetIndex { regions, trees }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[TargetRegion] {
        &self.regions
    }

    pub fn get(&self, id: usize) -> Option<&TargetRegion> {
        self.regions.get(id)
    }

    /// Ids of target regions overlapping the closed interval, sorted by region start
    pub fn overlapping(&self, chromosome: &str, start: u64, end: u64) -> Vec<usize> {
        let mut ids = Vec::new();
        if start > MAX_TARGET_COORDINATE {
            return ids;
        }
        let end = end.min(MAX_TARGET_COORDINATE);
        if let Some(tree) = self.trees.get(chromosome) {
            tree.query(start as i32, end as i32, |node| {
                let id: usize = node.metadata.to_owned();
                ids.push(id);
            });
        }
        ids.sort_unstable_by_key(|&id| (self.regions[id].region.start, id));
        ids
    }

    /// Regions on `chromosome`, in file order
    pub fn regions_on<'a>(&'a self, chromosome: &'a str) -> impl Iterator<Item = &'a TargetRegion> {
        self.regions
            .iter()
            .filter(move |target| target.region.chromosome == chromosome)
    }
}
