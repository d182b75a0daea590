use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{debug, error, info, instrument};

use crate::process::rescale::{rescale, Rescaled};

/// Prefix on every transformed file name.
pub const OUTPUT_PREFIX: &str = "crores_";
/// Columns whose values are reported in lakhs.
pub const RESCALE_COLUMNS: &[&str] = &["C", "D"];

#[derive(Debug, Clone, PartialEq)]
pub struct TransformReport {
    pub output: PathBuf,
    pub rows: u64,
    pub windows: usize,
    /// Target columns that were present in the header.
    pub rescaled_columns: Vec<String>,
}

pub type TransformResult = Result<TransformReport>;

/// Per-window tally of how target cells were handled.
#[derive(Debug, Default, Clone, Copy)]
struct CellCounts {
    numeric: usize,
    text: usize,
    missing: usize,
}

/// Reads a CSV in fixed-size row windows, rescales the target columns and writes
/// `crores_<name>` next to the other outputs of the same batch.
#[derive(Debug, Clone)]
pub struct TabularTransformer {
    window_size: usize,
    targets: Vec<String>,
}

impl TabularTransformer {
    pub fn new(window_size: usize) -> Self {
        Self::with_targets(window_size, RESCALE_COLUMNS.iter().map(|c| c.to_string()))
    }

    pub fn with_targets<I, S>(window_size: usize, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            window_size: window_size.max(1),
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    /// Transform `src` into `<out_dir>/crores_<file_name>`.
    ///
    /// Failures are logged here with the file name and returned; nothing is written
    /// to the final path unless the whole file succeeds.
    #[instrument(level = "info", skip(self, src, file_name, out_dir), fields(file = %file_name))]
    pub fn transform_file(&self, src: &Path, file_name: &str, out_dir: &Path) -> TransformResult {
        info!("Processing CSV file: {}", file_name);
        let start = Instant::now();
        match self.transform_inner(src, file_name, out_dir) {
            Ok(report) => {
                info!(
                    rows = report.rows,
                    windows = report.windows,
                    elapsed = ?start.elapsed(),
                    "Saved processed file to {}",
                    report.output.display()
                );
                Ok(report)
            }
            Err(e) => {
                error!("Error processing {}: {:#}", file_name, e);
                Err(e)
            }
        }
    }

    fn transform_inner(&self, src: &Path, file_name: &str, out_dir: &Path) -> TransformResult {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;

        // short rows are padded with empty cells; long ones are rejected below
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(src)
            .with_context(|| format!("opening {}", src.display()))?;
        let headers = rdr
            .headers()
            .with_context(|| format!("reading header of {}", file_name))?
            .clone();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            bail!("{} has no header row", file_name);
        }

        let mut target_idx = Vec::with_capacity(self.targets.len());
        let mut rescaled_columns = Vec::new();
        for col in &self.targets {
            match headers.iter().position(|h| h == col.as_str()) {
                Some(i) => {
                    target_idx.push(i);
                    rescaled_columns.push(col.clone());
                }
                None => info!("column {} not present in {}, skipping", col, file_name),
            }
        }

        let output = out_dir.join(format!("{}{}", OUTPUT_PREFIX, file_name));
        let tmp = out_dir.join(format!(".{}{}.tmp", OUTPUT_PREFIX, file_name));

        let written = self.write_windows(&mut rdr, &headers, &target_idx, &tmp);
        let (rows, windows) = match written {
            Ok(counts) => counts,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e.context(format!("transforming {}", file_name)));
            }
        };

        if rows == 0 {
            info!("{} has a header but no rows", file_name);
        }

        fs::rename(&tmp, &output)
            .with_context(|| format!("moving {} into place", output.display()))?;

        Ok(TransformReport {
            output,
            rows,
            windows,
            rescaled_columns,
        })
    }

    /// Stream windows of `window_size` rows to `tmp`, in input order.
    fn write_windows<R: std::io::Read>(
        &self,
        rdr: &mut csv::Reader<R>,
        headers: &StringRecord,
        target_idx: &[usize],
        tmp: &Path,
    ) -> Result<(u64, usize)> {
        let mut wtr = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_path(tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        wtr.write_record(headers)?;

        let mut records = rdr.records();
        let mut rows = 0u64;
        let mut windows = 0usize;
        loop {
            let window = records
                .by_ref()
                .take(self.window_size)
                .collect::<Result<Vec<StringRecord>, csv::Error>>()
                .with_context(|| format!("reading rows after row {}", rows))?;
            if window.is_empty() {
                break;
            }
            windows += 1;

            let mut counts = CellCounts::default();
            for (n, record) in window.iter().enumerate() {
                if record.len() > headers.len() {
                    bail!(
                        "row {} has {} fields, header has {}",
                        rows + n as u64 + 1,
                        record.len(),
                        headers.len()
                    );
                }
                let out = rescale_record(record, headers.len(), target_idx, &mut counts);
                wtr.write_record(&out)?;
            }
            rows += window.len() as u64;
            debug!(
                window = windows,
                rows = window.len(),
                numeric = counts.numeric,
                text = counts.text,
                missing = counts.missing,
                "processed window"
            );
        }

        wtr.flush().context("flushing output")?;
        Ok((rows, windows))
    }
}

/// Rescale the target cells of one row, padding it out to `width` fields.
fn rescale_record(
    record: &StringRecord,
    width: usize,
    target_idx: &[usize],
    counts: &mut CellCounts,
) -> StringRecord {
    let mut out = StringRecord::with_capacity(record.as_slice().len() + 8, width);
    let cells = record.iter().chain(std::iter::repeat(""));
    for (i, cell) in cells.take(width).enumerate() {
        if !target_idx.contains(&i) {
            out.push_field(cell);
            continue;
        }
        let rescaled = rescale(cell);
        match &rescaled {
            Rescaled::Missing(_) => counts.missing += 1,
            Rescaled::Number(_) => counts.numeric += 1,
            Rescaled::Text(_) => counts.text += 1,
        }
        out.push_field(&rescaled.render());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn run(content: &str, window: usize) -> (tempfile::TempDir, TransformResult) {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("temp_r.csv");
        fs::write(&src, content).unwrap();
        let out_dir = tmp.path().join("out");
        let res = TabularTransformer::new(window).transform_file(&src, "r.csv", &out_dir);
        (tmp, res)
    }

    #[test]
    fn rescales_target_columns() {
        let (tmp, res) = run("A,C\n1,200\n2,text 300 more\n", 10);
        let report = res.unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.rescaled_columns, vec!["C".to_string()]);
        assert_eq!(report.output, tmp.path().join("out").join("crores_r.csv"));
        let text = fs::read_to_string(&report.output).unwrap();
        assert_eq!(text, "A,C\n1,2.0\n2,text 3.0 more\n");
    }

    #[test]
    fn windows_preserve_order() {
        let (_tmp, res) = run("A,C,D\n1,100,1000\n2,200,\n3,300,x 5\n4,400,NA\n5,500,9\n", 2);
        let report = res.unwrap();
        assert_eq!(report.windows, 3);
        assert_eq!(report.rows, 5);
        let text = fs::read_to_string(&report.output).unwrap();
        assert_eq!(
            text,
            "A,C,D\n1,1.0,10.0\n2,2.0,\n3,3.0,x 0.05\n4,4.0,NA\n5,5.0,0.09\n"
        );
    }

    #[test]
    fn other_columns_untouched() {
        let (_tmp, res) = run("A,B\n100,\"1,000\"\n", 10);
        let report = res.unwrap();
        assert!(report.rescaled_columns.is_empty());
        let text = fs::read_to_string(&report.output).unwrap();
        assert_eq!(text, "A,B\n100,\"1,000\"\n");
    }

    #[test]
    fn header_only_writes_header_only_output() {
        let (_tmp, res) = run("A,C\n", 10);
        let report = res.unwrap();
        assert_eq!(report.rows, 0);
        assert_eq!(report.windows, 0);
        assert_eq!(fs::read_to_string(&report.output).unwrap(), "A,C\n");
    }

    #[test]
    fn short_rows_are_padded() {
        let (_tmp, res) = run("A,C,D\n1,200,5\n2,300\n", 10);
        let report = res.unwrap();
        assert_eq!(report.rows, 2);
        let text = fs::read_to_string(&report.output).unwrap();
        assert_eq!(text, "A,C,D\n1,2.0,0.05\n2,3.0,\n");
    }

    #[test]
    fn ragged_rows_fail_without_partial_output() {
        let (tmp, res) = run("A,C\n1,200\n2,300,extra\n", 10);
        assert!(res.is_err());
        let out = tmp.path().join("out");
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
    }

    #[test]
    fn empty_file_is_a_failure() {
        let (_tmp, res) = run("", 10);
        assert!(res.is_err());
    }
}
