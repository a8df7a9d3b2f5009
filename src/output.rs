use crate::aggregate::AggregateResult;
use crate::target_index::TargetIndex;
use log::info;
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufWriter, Write};

pub const LABEL_ALL: &str = "ALL";
pub const LABEL_TARGET: &str = "TARGET";
pub const LABEL_NON_TARGET: &str = "NON_TARGET";

pub const HEADER: &str = "RegionLabel\tFragmentLength\tDuplicateCount\tGcPercent\tCount";
pub const REGION_HEADER: &str =
    "Chromosome\tStart\tEnd\tFragmentLength\tDuplicateCount\tGcPercent\tCount";

/// Write the combined table: ALL, TARGET and NON_TARGET blocks, then one
/// block per target region when per-region counts were collected.
pub fn write_table<W: Write>(
    writer: &mut W,
    result: &AggregateResult,
    target_index: &TargetIndex,
) -> io::Result<()> {
    let per_region = !result.regions.is_empty();

    if per_region {
        writeln!(writer, "{REGION_HEADER}")?;
    } else {
        writeln!(writer, "{HEADER}")?;
    }

    for (label, histogram) in [
        (LABEL_ALL, &result.all),
        (LABEL_TARGET, &result.target),
        (LABEL_NON_TARGET, &result.non_target),
    ] {
        if per_region {
            // Summary blocks carry their label in the chromosome column
            histogram.write_rows(writer, &format!("{label}\t0\t0"))?;
        } else {
            histogram.write_rows(writer, label)?;
        }
    }

    if per_region {
        let mut targets: Vec<_> = target_index.regions().iter().collect();
        targets.sort_by(|a, b| {
            natord::compare(&a.region.chromosome, &b.region.chromosome)
                .then(a.region.start.cmp(&b.region.start))
                .then(a.region.end.cmp(&b.region.end))
                .then(a.id.cmp(&b.id))
        });
        for target in targets {
            if let Some(histogram) = result.regions.get(target.id) {
                let prefix = format!(
                    "{}\t{}\t{}",
                    target.region.chromosome, target.region.start, target.region.end
                );
                histogram.write_rows(writer, &prefix)?;
            }
        }
    }

    Ok(())
}

/// Write the table to `path`, BGZF-compressed for `.gz`/`.bgz` paths, or to
/// stdout when no path (or `-`) is given.
pub fn write_output(
    path: Option<&str>,
    result: &AggregateResult,
    target_index: &TargetIndex,
) -> io::Result<()> {
    match path {
        None | Some("-") => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            write_table(&mut writer, result, target_index)?;
            writer.flush()
        }
        Some(path) if [".gz", ".bgz"].iter().any(|e| path.ends_with(e)) => {
            let file = create_output(path)?;
            let mut writer = bgzf::io::Writer::new(file);
            write_table(&mut writer, result, target_index)?;
            writer.finish()?;
            info!("Wrote fragment distribution to {}", path);
            Ok(())
        }
        Some(path) => {
            let file = create_output(path)?;
            let mut writer = BufWriter::new(file);
            write_table(&mut writer, result, target_index)?;
            writer.flush()?;
            info!("Wrote fragment distribution to {}", path);
            Ok(())
        }
    }
}

fn create_output(path: &str) -> io::Result<File> {
    File::create(path).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to create output file '{path}': {e}"),
        )
    })
}
