use rust_htslib::faidx;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;

/// GC content of the reference over a 1-based inclusive span
pub trait GcLookup: Sync {
    /// Fraction of G/C among called (non-N) bases, or `None` when the
    /// contig is unknown or the span holds no called bases
    fn gc_fraction(&self, chromosome: &str, start: u64, end: u64) -> io::Result<Option<f64>>;

    fn has_sequence(&self, chromosome: &str) -> bool;
}

/// GC fraction of a base slice, ignoring anything that is not A/C/G/T
pub fn gc_fraction_of(seq: &[u8]) -> Option<f64> {
    let mut gc = 0usize;
    let mut called = 0usize;
    for base in seq {
        match base.to_ascii_uppercase() {
            b'G' | b'C' => {
                gc += 1;
                called += 1;
            }
            b'A' | b'T' => called += 1,
            _ => {}
        }
    }
    if called == 0 {
        None
    } else {
        Some(gc as f64 / called as f64)
    }
}

// Per-thread reader cache keyed by FASTA path; workers never share a handle
struct FaidxCache {
    readers: HashMap<String, faidx::Reader>,
}

impl FaidxCache {
    fn new() -> Self {
        FaidxCache {
            readers: HashMap::new(),
        }
    }

    fn get_or_open(&mut self, path: &str) -> io::Result<&mut faidx::Reader> {
        if !self.readers.contains_key(path) {
            let reader = faidx::Reader::from_path(path).map_err(|e| {
                io::Error::other(format!("Failed to open FASTA file '{path}': {e}"))
            })?;
            self.readers.insert(path.to_string(), reader);
        }
        self.readers
            .get_mut(path)
            .ok_or_else(|| io::Error::other(format!("FASTA reader for '{path}' missing")))
    }
}

thread_local! {
    static FAIDX_CACHE: RefCell<FaidxCache> = RefCell::new(FaidxCache::new());
}

/// Indexed reference FASTA used for GC lookups
#[derive(Debug)]
pub struct FastaReference {
    pub fasta_path: String,
    pub sequence_lengths: FxHashMap<String, u64>,
}

impl FastaReference {
    /// Read sequence names and lengths from the `.fai`, creating it if missing
    pub fn open(fasta_path: &str) -> io::Result<Self> {
        let fai_path = format!("{fasta_path}.fai");

        let fai_content = match std::fs::read_to_string(&fai_path) {
            Ok(content) => content,
            Err(_) => match faidx::Reader::from_path(fasta_path) {
                Ok(_) => std::fs::read_to_string(&fai_path)?,
                Err(e) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("Failed to create FASTA index for '{fasta_path}': {e}"),
                    ));
                }
            },
        };

        let mut sequence_lengths = FxHashMap::default();
        for line in fai_content.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() >= 2 && !fields[0].is_empty() {
                if let Ok(length) = fields[1].parse::<u64>() {
                    sequence_lengths.insert(fields[0].to_string(), length);
                }
            }
        }

        Ok(FastaReference {
            fasta_path: fasta_path.to_string(),
            sequence_lengths,
        })
    }

    pub fn sequence_length(&self, seq_name: &str) -> Option<u64> {
        self.sequence_lengths.get(seq_name).copied()
    }

    /// Fetch bases for a 1-based inclusive span, uppercased
    pub fn fetch_sequence(&self, seq_name: &str, start: u64, end: u64) -> io::Result<Vec<u8>> {
        FAIDX_CACHE.with(|cache_cell| -> io::Result<Vec<u8>> {
            let mut cache = cache_cell.borrow_mut();
            let reader = cache.get_or_open(&self.fasta_path)?;

            // fetch_seq takes 0-based inclusive coordinates
            match reader.fetch_seq(seq_name, (start - 1) as usize, (end - 1) as usize) {
                Ok(seq) => {
                    let mut seq_vec = seq.to_vec();
                    unsafe { libc::free(seq.as_ptr() as *mut std::ffi::c_void) }; // Free up memory to avoid memory leak (bug https://github.com/rust-bio/rust-htslib/issues/401#issuecomment-1704290171)
                    seq_vec.make_ascii_uppercase();
                    Ok(seq_vec)
                }
                Err(e) => Err(io::Error::other(format!(
                    "Failed to fetch sequence for {seq_name}:{start}-{end}: {e}"
                ))),
            }
        })
    }
}

impl GcLookup for FastaReference {
    fn gc_fraction(&self, chromosome: &str, start: u64, end: u64) -> io::Result<Option<f64>> {
        let Some(length) = self.sequence_length(chromosome) else {
            return Ok(None);
        };
        let start = start.max(1);
        let end = end.min(length);
        if start > end {
            return Ok(None);
        }
        let seq = self.fetch_sequence(chromosome, start, end)?;
        Ok(gc_fraction_of(&seq))
    }

    fn has_sequence(&self, chromosome: &str) -> bool {
        self.sequence_lengths.contains_key(chromosome)
    }
}

/// Reference sequences held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryReference {
    sequences: FxHashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence(mut self, name: &str, seq: &[u8]) -> Self {
        self.sequences.insert(name.to_string(), seq.to_ascii_uppercase());
        self
    }
}

impl GcLookup for InMemoryReference {
    fn gc_fraction(&self, chromosome: &str, start: u64, end: u64) -> io::Result<Option<f64>> {
        let Some(seq) = self.sequences.get(chromosome) else {
            return Ok(None);
        };
        let first = start.max(1) as usize - 1;
        let last = std::cmp::min(end as usize, seq.len());
        if first >= last {
            return Ok(None);
        }
        Ok(gc_fraction_of(&seq[first..last]))
    }

    fn has_sequence(&self, chromosome: &str) -> bool {
        self.sequences.contains_key(chromosome)
    }
}
