// src/unpack/mod.rs
use anyhow::{anyhow, bail, Context, Result};
use std::{
    fs::{self, File},
    io::{self, Read, Seek},
    path::{Path, PathBuf},
    time::Instant,
};
use tempfile::TempDir;
use tracing::{error, info, instrument, warn};
use zip::ZipArchive;

use crate::{config::Config, history::ProcessedLedger, process::TabularTransformer};

/// Only archives under this folder of the outer archive are batches.
pub const DATA_FOLDER: &str = "data/";

/// What one pass over the outer archive did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnpackReport {
    /// Qualifying inner archives found under `data/`.
    pub found: usize,
    /// Inner archives processed and recorded in the ledger this run.
    pub processed: Vec<String>,
    /// Inner archives already in the ledger.
    pub skipped: Vec<String>,
    /// Inner archives that failed partway and were left unrecorded.
    pub failed: Vec<String>,
    pub files_transformed: usize,
    pub files_failed: usize,
}

pub type UnpackResult = Result<UnpackReport>;

/// Per-inner-archive file counts.
#[derive(Debug, Default, Clone, Copy)]
struct InnerStats {
    transformed: usize,
    failed: usize,
}

/// Walks `data/*.zip` inside the outer archive and transforms every CSV of every
/// inner archive the ledger has not seen.
#[derive(Debug, Clone)]
pub struct ArchiveUnpacker {
    transformer: TabularTransformer,
    output_root: PathBuf,
    scratch_root: Option<PathBuf>,
}

impl ArchiveUnpacker {
    pub fn new(
        transformer: TabularTransformer,
        output_root: impl Into<PathBuf>,
        scratch_root: Option<PathBuf>,
    ) -> Self {
        Self {
            transformer,
            output_root: output_root.into(),
            scratch_root,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            TabularTransformer::new(config.window_size),
            config.output_root.clone(),
            config.scratch_root.clone(),
        )
    }

    /// One pass over `archive_path`.
    ///
    /// All extraction happens inside a single scratch directory that is removed on
    /// every return path. Opening failures and an empty `data/` folder are errors and
    /// leave the ledger untouched; per-inner-archive failures are logged and skipped.
    #[instrument(level = "info", skip(self, archive_path, ledger), fields(archive = %archive_path.display()))]
    pub fn unpack(&self, archive_path: &Path, ledger: &mut ProcessedLedger) -> UnpackResult {
        let start = Instant::now();
        info!("Processing main zip file: {}", archive_path.display());

        let scratch = self.scratch_dir()?;
        info!("Created temporary directory: {}", scratch.path().display());

        let file = File::open(archive_path)
            .with_context(|| format!("opening {}", archive_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("reading zip archive {}", archive_path.display()))?;

        let inner = list_entries(&mut archive, is_inner_archive)?;
        if inner.is_empty() {
            bail!(
                "no zip files found under {} in {}",
                DATA_FOLDER,
                archive_path.display()
            );
        }
        info!("Found {} zip files in the data folder", inner.len());

        let mut report = UnpackReport {
            found: inner.len(),
            ..UnpackReport::default()
        };

        for (idx, name) in inner {
            if ledger.contains(&name) {
                info!("Skipping already processed: {}", name);
                report.skipped.push(name);
                continue;
            }

            info!("Processing nested zip file: {}", name);
            match self.process_inner(&mut archive, idx, &name, scratch.path()) {
                Ok(stats) => {
                    report.files_transformed += stats.transformed;
                    report.files_failed += stats.failed;
                    if let Err(e) = ledger.record(&name) {
                        error!("Could not record {} as processed: {:#}", name, e);
                        report.failed.push(name);
                        continue;
                    }
                    info!("Completed processing nested zip: {}", name);
                    report.processed.push(name);
                }
                Err(e) => {
                    error!("Error processing nested zip {}: {:#}", name, e);
                    report.failed.push(name);
                }
            }
        }

        info!(
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            elapsed = ?start.elapsed(),
            "Completed processing all nested zip files"
        );
        Ok(report)
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("mtf-scratch-");
        match &self.scratch_root {
            Some(root) => {
                fs::create_dir_all(root)
                    .with_context(|| format!("creating scratch root {}", root.display()))?;
                builder
                    .tempdir_in(root)
                    .with_context(|| format!("creating scratch directory in {}", root.display()))
            }
            None => builder.tempdir().context("creating scratch directory"),
        }
    }

    /// Extract one inner archive and transform each of its CSV files.
    fn process_inner<R: Read + Seek>(
        &self,
        outer: &mut ZipArchive<R>,
        idx: usize,
        name: &str,
        scratch: &Path,
    ) -> Result<InnerStats> {
        let nested_path = extract_entry(outer, idx, scratch)?;

        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("cannot derive output folder from {}", name))?;
        let out_dir = self.output_root.join(stem);
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating output directory {}", out_dir.display()))?;

        let file = File::open(&nested_path)
            .with_context(|| format!("opening extracted {}", nested_path.display()))?;
        let mut nested = ZipArchive::new(file)
            .with_context(|| format!("reading nested zip archive {}", name))?;

        let csvs = list_entries(&mut nested, is_csv)?;
        info!("Found {} CSV files in {}", csvs.len(), name);

        let mut stats = InnerStats::default();
        for (csv_idx, csv_name) in csvs {
            let base = Path::new(&csv_name)
                .file_name()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow!("unusable CSV entry name {}", csv_name))?
                .to_string();
            let scratch_csv = scratch.join(format!("temp_{}", base));

            {
                let mut entry = nested
                    .by_index(csv_idx)
                    .with_context(|| format!("opening {} in {}", csv_name, name))?;
                let mut out = File::create(&scratch_csv)
                    .with_context(|| format!("creating {}", scratch_csv.display()))?;
                io::copy(&mut entry, &mut out)
                    .with_context(|| format!("extracting {} from {}", csv_name, name))?;
            }

            let outcome = self.transformer.transform_file(&scratch_csv, &base, &out_dir);

            if let Err(e) = fs::remove_file(&scratch_csv) {
                warn!("could not remove {}: {}", scratch_csv.display(), e);
            }

            match outcome {
                Ok(_) => stats.transformed += 1,
                Err(_) => stats.failed += 1,
            }
        }

        drop(nested);
        if let Err(e) = fs::remove_file(&nested_path) {
            warn!("could not remove {}: {}", nested_path.display(), e);
        }
        Ok(stats)
    }
}

/// `(index, name)` of the file entries accepted by `keep`, in central-directory order.
fn list_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    keep: fn(&str) -> bool,
) -> Result<Vec<(usize, String)>> {
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .with_context(|| format!("reading zip entry #{}", i))?;
        if entry.is_file() && keep(entry.name()) {
            out.push((i, entry.name().to_string()));
        }
    }
    Ok(out)
}

pub fn is_inner_archive(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".zip") && lower.contains(DATA_FOLDER)
}

pub fn is_csv(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

/// Copy entry `idx` of `archive` to its (sanitised) path under `dest`.
fn extract_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, idx: usize, dest: &Path) -> Result<PathBuf> {
    let mut entry = archive
        .by_index(idx)
        .with_context(|| format!("opening zip entry #{}", idx))?;
    let rel = entry
        .enclosed_name()
        .ok_or_else(|| anyhow!("unsafe entry path {}", entry.name()))?;
    let target = dest.join(rel);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut out =
        File::create(&target).with_context(|| format!("creating {}", target.display()))?;
    io::copy(&mut entry, &mut out).with_context(|| format!("extracting {}", entry.name()))?;
    Ok(target)
}
