use clap::Parser;
use fragdist::aggregate::run_aggregation;
use fragdist::bam::{BamAlignments, DEFAULT_DUPLICATE_COUNT_TAG};
use fragdist::config::{FragmentConfig, DEFAULT_MIN_MAPPING_QUALITY, DEFAULT_PARTITION_SIZE};
use fragdist::faidx::FastaReference;
use fragdist::output::write_output;
use fragdist::region::{file_exists, load_target_regions};
use fragdist::rounding::{DEFAULT_GC_UNIT, DEFAULT_LENGTH_UNIT};
use fragdist::target_index::TargetIndex;
use log::{error, info};
use std::io;

/// Compute fragment length, duplicate count and GC distributions from an indexed BAM/CRAM.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the coordinate-sorted, indexed BAM/CRAM file.
    #[clap(short = 'b', long, value_parser)]
    bam: String,

    /// Path to the reference FASTA (indexed with samtools faidx, or indexable).
    #[clap(short = 'r', long, value_parser)]
    reference: String,

    /// Path to a BED file with target regions (plain or bgzip-compressed).
    #[clap(short = 'T', long, value_parser)]
    target_regions: Option<String>,

    /// Output path; `.gz`/`.bgz` is written BGZF-compressed. Defaults to stdout.
    #[clap(short = 'o', long, value_parser)]
    output: Option<String>,

    /// Number of worker threads.
    #[clap(short = 't', long, value_parser, default_value_t = num_cpus::get())]
    threads: usize,

    /// Partition size in bases.
    #[clap(long, value_parser, default_value_t = DEFAULT_PARTITION_SIZE)]
    partition_size: u64,

    /// Bucket width for fragment lengths.
    #[clap(long, value_parser, default_value_t = DEFAULT_LENGTH_UNIT)]
    length_unit: u32,

    /// Bucket width for GC fractions.
    #[clap(long, value_parser, default_value_t = DEFAULT_GC_UNIT)]
    gc_unit: f64,

    /// Minimum mapping quality for a read to contribute.
    #[clap(short = 'q', long, value_parser, default_value_t = DEFAULT_MIN_MAPPING_QUALITY)]
    min_mapq: u8,

    /// Only scan the target regions instead of the whole genome.
    #[clap(long, action)]
    only_target_regions: bool,

    /// Write one histogram block per target region.
    #[clap(long, action)]
    capture_region_counts: bool,

    /// Comma-separated list of chromosomes to process (default: all).
    #[clap(short = 'c', long, value_parser, value_delimiter = ',')]
    chromosomes: Vec<String>,

    /// Aux tag holding the consensus duplicate count.
    #[clap(long, value_parser, default_value = DEFAULT_DUPLICATE_COUNT_TAG)]
    duplicate_count_tag: String,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "1")]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> io::Result<()> {
    for (label, path) in [("alignment", &args.bam), ("reference", &args.reference)] {
        if !file_exists(path) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("The {label} file '{path}' does not exist"),
            ));
        }
    }

    let targets = match &args.target_regions {
        Some(path) => load_target_regions(path)?,
        None => Vec::new(),
    };
    info!("Loaded {} target regions", targets.len());
    let target_index = TargetIndex::new(targets);

    let config = FragmentConfig {
        partition_size: args.partition_size,
        fragment_length_unit: args.length_unit,
        gc_percent_unit: args.gc_unit,
        min_mapping_quality: args.min_mapq,
        threads: args.threads,
        only_target_regions: args.only_target_regions,
        capture_region_counts: args.capture_region_counts,
        chromosomes: args.chromosomes,
    };
    config.validate(target_index.len())?;

    let reference = FastaReference::open(&args.reference)?;
    let alignments = BamAlignments::new(
        &args.bam,
        Some(args.reference.as_str()),
        &args.duplicate_count_tag,
    )?;

    let result = run_aggregation(&alignments, &reference, &target_index, &config)?;

    write_output(args.output.as_deref(), &result, &target_index)
}
