// src/extract/mod.rs
use anyhow::{Context, Result};
use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};
use tracing::{error, info, instrument, warn};
use zip::ZipArchive;

/// Daily margin-trading archives are named `mrg_trading_DDMMYY.zip`.
static DAILY_ARCHIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"mrg_trading_(\d{2})(\d{2})(\d{2})\.zip").expect("daily archive pattern is valid")
});

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub files_extracted: usize,
}

/// `("20YY", "MM")` for a daily archive name, `None` for anything else.
pub fn year_month(file_name: &str) -> Option<(String, String)> {
    let caps = DAILY_ARCHIVE.captures(file_name)?;
    let month = caps.get(2)?.as_str();
    let year = caps.get(3)?.as_str();
    Some((format!("20{}", year), month.to_string()))
}

/// Extract every `*.zip` found (recursively) under `input_dir` into `output_dir`.
///
/// With `organize_by_year_month`, daily archives land in `output_dir/20YY/MM/`.
/// Archives that fail to open or extract are counted and skipped.
#[instrument(level = "info", skip(input_dir, output_dir), fields(input = %input_dir.as_ref().display()))]
pub fn extract_all(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    organize_by_year_month: bool,
) -> Result<ExtractSummary> {
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let pattern = format!("{}/**/*.zip", input_dir.display());
    let zips: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("bad glob pattern {}", pattern))?
        .filter_map(Result::ok)
        .collect();

    let mut summary = ExtractSummary::default();
    if zips.is_empty() {
        warn!("No zip files found in {}", input_dir.display());
        return Ok(summary);
    }
    info!("Found {} zip files to extract", zips.len());

    for zip_path in zips {
        let name = zip_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let dest = match year_month(&name) {
            Some((year, month)) if organize_by_year_month => output_dir.join(year).join(month),
            _ => output_dir.to_path_buf(),
        };

        match extract_one(&zip_path, &dest) {
            Ok(n) => {
                info!("Extracted {} file(s) from {} to {}", n, name, dest.display());
                summary.succeeded += 1;
                summary.files_extracted += n;
            }
            Err(e) => {
                error!("Error extracting {}: {:#}", name, e);
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

fn extract_one(zip_path: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).with_context(|| format!("creating {}", dest.display()))?;
    let file = File::open(zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("{} is not a valid zip file", zip_path.display()))?;
    let count = archive.len();
    archive
        .extract(dest)
        .with_context(|| format!("extracting into {}", dest.display()))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, body) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn parses_daily_names() {
        assert_eq!(
            year_month("mrg_trading_140324.zip"),
            Some(("2024".to_string(), "03".to_string()))
        );
        assert_eq!(year_month("fetch_mtf.zip"), None);
    }

    #[test]
    fn organizes_by_year_month() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("data");
        fs::create_dir_all(input.join("nested")).unwrap();
        write_zip(&input.join("mrg_trading_010224.zip"), &[("a.csv", "A\n1\n")]);
        write_zip(
            &input.join("nested").join("other.zip"),
            &[("b.csv", "B\n2\n"), ("c.csv", "C\n3\n")],
        );
        fs::write(input.join("broken.zip"), b"not a zip").unwrap();

        let out = tmp.path().join("extracted");
        let summary = extract_all(&input, &out, true).unwrap();
        assert_eq!(
            summary,
            ExtractSummary {
                succeeded: 2,
                failed: 1,
                files_extracted: 3
            }
        );
        assert!(out.join("2024").join("02").join("a.csv").exists());
        assert!(out.join("b.csv").exists());
    }

    #[test]
    fn flat_layout() {
        let tmp = tempdir().unwrap();
        let input = tmp.path().join("data");
        fs::create_dir_all(&input).unwrap();
        write_zip(&input.join("mrg_trading_010224.zip"), &[("a.csv", "A\n1\n")]);

        let out = tmp.path().join("flat");
        extract_all(&input, &out, false).unwrap();
        assert!(out.join("a.csv").exists());
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let tmp = tempdir().unwrap();
        let summary = extract_all(tmp.path(), tmp.path().join("out"), true).unwrap();
        assert_eq!(summary, ExtractSummary::default());
    }
}
