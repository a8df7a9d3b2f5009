//! Runs the fragdist binary on a small BAM written with rust-htslib

use rust_htslib::bam::{self, header::HeaderRecord, record::Cigar, record::CigarString};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn get_fragdist_binary() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_fragdist") {
        return PathBuf::from(path);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let candidates = [
        manifest_dir.join("target/release/fragdist"),
        manifest_dir.join("target/debug/fragdist"),
    ];
    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }

    PathBuf::from("fragdist")
}

fn write_reference(path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, ">chr1")?;
    let seq = b"ACGTGGCCAT".repeat(300);
    for line in seq.chunks(60) {
        file.write_all(line)?;
        writeln!(file)?;
    }
    Ok(())
}

/// Paired read of 30 matched bases at a 0-based position
fn record(name: &str, pos: i64, reverse: bool, insert_size: i64, duplicate: bool) -> bam::Record {
    let mut record = bam::Record::new();
    let cigar = CigarString(vec![Cigar::Match(30)]);
    record.set(name.as_bytes(), Some(&cigar), &[b'A'; 30], &[30; 30]);
    record.set_tid(0);
    record.set_mtid(0);
    record.set_pos(pos);
    record.set_mapq(60);
    record.set_insert_size(insert_size);
    let mut flags: u16 = 0x1 | 0x2;
    flags |= if reverse { 0x10 | 0x80 } else { 0x20 | 0x40 };
    if duplicate {
        flags |= 0x400;
    }
    record.set_flags(flags);
    record
}

fn write_bam(path: &Path) {
    let mut header = bam::Header::new();
    let mut sq = HeaderRecord::new(b"SQ");
    sq.push_tag(b"SN", "chr1");
    sq.push_tag(b"LN", 3000);
    header.push_record(&sq);

    // Pairs covering 100-150 (twice, second flagged duplicate) and 200-260, 1-based
    let mut records = vec![
        record("p1", 99, false, 51, false),
        record("p2", 99, false, 51, true),
        record("p1", 120, true, -51, false),
        record("p2", 120, true, -51, true),
        record("p3", 199, false, 61, false),
        record("p3", 230, true, -61, false),
    ];
    records.sort_by_key(|r| r.pos());

    let mut writer = bam::Writer::from_path(path, &header, bam::Format::Bam).unwrap();
    for record in &records {
        writer.write(record).unwrap();
    }
    drop(writer);

    bam::index::build(path, None, bam::index::Type::Bai, 1).unwrap();
}

fn run_fragdist(work_dir: &Path, threads: &str, output: &str) -> std::process::Output {
    run_fragdist_with(work_dir, threads, output, &[])
}

fn run_fragdist_with(
    work_dir: &Path,
    threads: &str,
    output: &str,
    extra: &[&str],
) -> std::process::Output {
    Command::new(get_fragdist_binary())
        .current_dir(work_dir)
        .args([
            "-b",
            "reads.bam",
            "-r",
            "ref.fa",
            "-o",
            output,
            "-t",
            threads,
            "--partition-size",
            "500",
            "-v",
            "0",
        ])
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn test_cli_end_to_end() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path().to_path_buf();

    write_reference(&work_dir.join("ref.fa"))?;
    write_bam(&work_dir.join("reads.bam"));

    let single = run_fragdist(&work_dir, "1", "single.tsv");
    assert!(
        single.status.success(),
        "fragdist failed: {}",
        String::from_utf8_lossy(&single.stderr)
    );
    let multi = run_fragdist(&work_dir, "4", "multi.tsv");
    assert!(multi.status.success());

    let single_text = std::fs::read_to_string(work_dir.join("single.tsv"))?;
    let multi_text = std::fs::read_to_string(work_dir.join("multi.tsv"))?;
    assert_eq!(single_text, multi_text);

    let all_rows: Vec<Vec<&str>> = single_text
        .lines()
        .skip(1)
        .map(|line| line.split('\t').collect::<Vec<_>>())
        .filter(|fields| fields[0] == "ALL")
        .collect();
    assert_eq!(all_rows.len(), 2);
    assert_eq!(all_rows[0][1], "50");
    assert_eq!(all_rows[0][2], "0");
    assert_eq!(all_rows[0][4], "2");
    assert_eq!(all_rows[1][1], "60");
    assert_eq!(all_rows[1][4], "1");

    Ok(())
}

#[test]
fn test_cli_target_bed_with_region_counts() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let work_dir = temp_dir.path().to_path_buf();

    write_reference(&work_dir.join("ref.fa"))?;
    write_bam(&work_dir.join("reads.bam"));
    let mut bed = File::create(work_dir.join("targets.bed"))?;
    writeln!(bed, "# capture panel")?;
    writeln!(bed, "chr1\t90\t160\tpanelA")?;
    writeln!(bed, "chr1\t1000\t1100\tpanelB")?;
    drop(bed);

    let extra = ["-T", "targets.bed", "--capture-region-counts"];
    let single = run_fragdist_with(&work_dir, "1", "single.tsv", &extra);
    assert!(
        single.status.success(),
        "fragdist failed: {}",
        String::from_utf8_lossy(&single.stderr)
    );
    let multi = run_fragdist_with(&work_dir, "4", "multi.tsv", &extra);
    assert!(multi.status.success());

    let text = std::fs::read_to_string(work_dir.join("single.tsv"))?;
    assert_eq!(text, std::fs::read_to_string(work_dir.join("multi.tsv"))?);

    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Chromosome\tStart\tEnd\tFragmentLength\tDuplicateCount\tGcPercent\tCount")
    );
    let rows: Vec<Vec<&str>> = lines.map(|line| line.split('\t').collect()).collect();
    let block = |prefix: [&str; 3]| -> Vec<(String, String)> {
        rows.iter()
            .filter(|fields| fields[..3] == prefix)
            .map(|fields| (fields[3].to_string(), fields[6].to_string()))
            .collect()
    };

    let pair = |length: &str, count: &str| (length.to_string(), count.to_string());
    assert_eq!(block(["ALL", "0", "0"]), vec![pair("50", "2"), pair("60", "1")]);
    assert_eq!(block(["TARGET", "0", "0"]), vec![pair("50", "2")]);
    assert_eq!(block(["NON_TARGET", "0", "0"]), vec![pair("60", "1")]);
    // BED start 90 becomes 1-based 91
    assert_eq!(block(["chr1", "91", "160"]), vec![pair("50", "2")]);
    assert!(block(["chr1", "1001", "1100"]).is_empty());

    Ok(())
}

#[test]
fn test_cli_missing_inputs_fail() -> std::io::Result<()> {
    let temp_dir = TempDir::new()?;
    let output = run_fragdist(temp_dir.path(), "1", "out.tsv");
    assert!(!output.status.success());
    assert!(!temp_dir.path().join("out.tsv").exists());
    Ok(())
}
