use crate::alignment_record::{AlignmentSource, AlignmentSourceOpener, ReadRecord, Strand};
use crate::partition::Chromosome;
use crate::region::GenomeRegion;
use rust_htslib::bam::record::Aux;
use rust_htslib::bam::{self, Read};
use std::io;

/// Default aux tag holding the consensus duplicate count
pub const DEFAULT_DUPLICATE_COUNT_TAG: &str = "DC";

/// Indexed BAM/CRAM file; every `open` returns an independent reader
pub struct BamAlignments {
    pub bam_path: String,
    /// Reference FASTA, required to decode CRAM
    pub reference_path: Option<String>,
    pub duplicate_count_tag: [u8; 2],
}

impl BamAlignments {
    pub fn new(
        bam_path: &str,
        reference_path: Option<&str>,
        duplicate_count_tag: &str,
    ) -> io::Result<Self> {
        let tag: [u8; 2] = duplicate_count_tag.as_bytes().try_into().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Duplicate count tag must be two characters, got '{duplicate_count_tag}'"),
            )
        })?;
        Ok(BamAlignments {
            bam_path: bam_path.to_string(),
            reference_path: reference_path.map(str::to_string),
            duplicate_count_tag: tag,
        })
    }
}

pub struct BamReader {
    reader: bam::IndexedReader,
    duplicate_count_tag: [u8; 2],
}

impl AlignmentSourceOpener for BamAlignments {
    type Source = BamReader;

    fn open(&self) -> io::Result<BamReader> {
        let mut reader = bam::IndexedReader::from_path(&self.bam_path).map_err(|e| {
            io::Error::other(format!(
                "Failed to open indexed alignment file '{}': {e}",
                self.bam_path
            ))
        })?;
        if let Some(reference_path) = &self.reference_path {
            reader.set_reference(reference_path).map_err(|e| {
                io::Error::other(format!(
                    "Failed to set reference '{reference_path}' for '{}': {e}",
                    self.bam_path
                ))
            })?;
        }
        Ok(BamReader {
            reader,
            duplicate_count_tag: self.duplicate_count_tag,
        })
    }

    fn chromosomes(&self) -> io::Result<Vec<Chromosome>> {
        let handle = self.open()?;
        let header = handle.reader.header();
        let chromosomes = header
            .target_names()
            .iter()
            .enumerate()
            .map(|(tid, name)| {
                Chromosome::new(
                    String::from_utf8_lossy(name),
                    header.target_len(tid as u32).unwrap_or(0),
                )
            })
            .collect();
        Ok(chromosomes)
    }
}

impl AlignmentSource for BamReader {
    fn fetch_region(
        &mut self,
        region: &GenomeRegion,
        visit: &mut dyn FnMut(ReadRecord),
    ) -> io::Result<()> {
        let Some(tid) = self.reader.header().tid(region.chromosome.as_bytes()) else {
            return Ok(());
        };
        // htslib regions are 0-based half-open
        self.reader
            .fetch((tid, region.start - 1, region.end))
            .map_err(|e| io::Error::other(format!("Failed to fetch region {region}: {e}")))?;

        let mut record = bam::Record::new();
        while let Some(result) = self.reader.read(&mut record) {
            result.map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Failed to read alignment record in {region}: {e}"),
                )
            })?;
            if !is_eligible(&record) {
                continue;
            }
            visit(to_read_record(&record, &self.duplicate_count_tag));
        }
        Ok(())
    }
}

/// Primary, mapped, QC-passing records only. Duplicates are kept.
fn is_eligible(record: &bam::Record) -> bool {
    !(record.is_unmapped()
        || record.is_secondary()
        || record.is_supplementary()
        || record.is_quality_check_failed())
}

fn is_discordant(record: &bam::Record) -> bool {
    record.is_paired()
        && !record.is_mate_unmapped()
        && (record.tid() != record.mtid() || !record.is_proper_pair())
}

fn duplicate_count(record: &bam::Record, tag: &[u8; 2]) -> u32 {
    match record.aux(tag) {
        Ok(Aux::I8(v)) => v.max(0) as u32,
        Ok(Aux::U8(v)) => v as u32,
        Ok(Aux::I16(v)) => v.max(0) as u32,
        Ok(Aux::U16(v)) => v as u32,
        Ok(Aux::I32(v)) => v.max(0) as u32,
        Ok(Aux::U32(v)) => v,
        _ => 0,
    }
}

fn to_read_record(record: &bam::Record, duplicate_count_tag: &[u8; 2]) -> ReadRecord {
    let cigar = record.cigar();
    // pos() is 0-based, end_pos() is 0-based exclusive
    let start = record.pos() as u64 + 1;
    let end = std::cmp::max(cigar.end_pos() as u64, start);

    ReadRecord {
        name: String::from_utf8_lossy(record.qname()).into_owned(),
        start,
        end,
        strand: if record.is_reverse() {
            Strand::Reverse
        } else {
            Strand::Forward
        },
        mapping_quality: record.mapq(),
        leading_soft_clip: cigar.leading_softclips().max(0) as u32,
        trailing_soft_clip: cigar.trailing_softclips().max(0) as u32,
        has_mate: record.is_paired() && !record.is_mate_unmapped(),
        insert_size: record.insert_size(),
        discordant: is_discordant(record),
        duplicate_count: duplicate_count(record, duplicate_count_tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_htslib::bam::record::{Cigar, CigarString};

    fn record(flags: u16, cigar: &[Cigar]) -> bam::Record {
        let mut record = bam::Record::new();
        let cigar = CigarString(cigar.to_vec());
        record.set(b"read1", Some(&cigar), b"ACGTACGTAC", &[30; 10]);
        record.set_pos(99);
        record.set_tid(0);
        record.set_mtid(0);
        record.set_mapq(42);
        record.set_insert_size(-180);
        record.set_flags(flags);
        record
    }

    #[test]
    fn test_duplicate_count_tag_validation() {
        assert!(BamAlignments::new("x.bam", None, "DC").is_ok());
        assert!(BamAlignments::new("x.bam", None, "DCX").is_err());
    }

    #[test]
    fn test_to_read_record() {
        // paired, proper pair, reverse strand
        let rec = record(0x1 | 0x2 | 0x10, &[Cigar::SoftClip(2), Cigar::Match(6), Cigar::SoftClip(2)]);
        let read = to_read_record(&rec, b"DC");
        assert_eq!(read.name, "read1");
        assert_eq!(read.start, 100);
        assert_eq!(read.end, 105);
        assert_eq!(read.strand, Strand::Reverse);
        assert_eq!(read.mapping_quality, 42);
        assert_eq!(read.leading_soft_clip, 2);
        assert_eq!(read.trailing_soft_clip, 2);
        assert!(read.has_mate);
        assert!(!read.discordant);
        assert_eq!(read.insert_size, -180);
        assert_eq!(read.duplicate_count, 0);
    }

    #[test]
    fn test_discordant_and_eligibility() {
        let not_proper = record(0x1, &[Cigar::Match(10)]);
        assert!(is_discordant(&not_proper));

        let mut other_chrom = record(0x1 | 0x2, &[Cigar::Match(10)]);
        other_chrom.set_mtid(3);
        assert!(is_discordant(&other_chrom));

        let mate_unmapped = record(0x1 | 0x8, &[Cigar::Match(10)]);
        assert!(!is_discordant(&mate_unmapped));
        assert!(!to_read_record(&mate_unmapped, b"DC").has_mate);

        assert!(is_eligible(&record(0x1 | 0x2 | 0x400, &[Cigar::Match(10)])));
        assert!(!is_eligible(&record(0x100, &[Cigar::Match(10)])));
        assert!(!is_eligible(&record(0x800, &[Cigar::Match(10)])));
        assert!(!is_eligible(&record(0x200, &[Cigar::Match(10)])));
        assert!(!is_eligible(&record(0x4, &[Cigar::Match(10)])));
    }

    #[test]
    fn test_duplicate_count_from_aux() {
        let mut rec = record(0x1 | 0x2, &[Cigar::Match(10)]);
        rec.push_aux(b"DC", Aux::U8(7)).unwrap();
        assert_eq!(duplicate_count(&rec, b"DC"), 7);
        assert_eq!(duplicate_count(&rec, b"XX"), 0);
    }
}
