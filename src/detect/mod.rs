// src/detect/mod.rs
use anyhow::Result;
use tracing::{error, info};

use crate::{
    config::Config,
    history::{
        last_run::{describe_epoch, modified_secs},
        LastRun, ProcessedLedger,
    },
    unpack::{ArchiveUnpacker, UnpackReport},
};

/// Result of one change check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// The outer archive is not there yet.
    ArchiveMissing,
    /// The archive is no newer than the last handled run.
    Unchanged { modified: f64, last_processed: f64 },
    /// The archive was newer and got a pass. `unpack` is `None` when that pass failed.
    Processed {
        modified: f64,
        unpack: Option<UnpackReport>,
    },
}

/// Compares the outer archive's mtime with the stored timestamp and runs the
/// unpacker when the archive is strictly newer.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    config: Config,
    unpacker: ArchiveUnpacker,
}

impl ChangeDetector {
    pub fn new(config: Config) -> Self {
        let unpacker = ArchiveUnpacker::from_config(&config);
        Self { config, unpacker }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One detection cycle. The stored timestamp advances to the archive's mtime after
    /// every pass, whether or not the pass succeeded; a failed pass is therefore only
    /// retried once the archive changes again.
    pub fn check_for_updates(&self) -> Result<CheckOutcome> {
        let archive = self.config.archive_path();
        if !archive.exists() {
            info!(
                "Main zip file not found at {}. Waiting for it to appear.",
                archive.display()
            );
            return Ok(CheckOutcome::ArchiveMissing);
        }

        let modified = modified_secs(&archive)?;
        let last_run = LastRun::open(self.config.last_run_path())?;
        let last_processed = last_run.load()?;

        if modified <= last_processed {
            info!(
                "No changes to main zip file since last processing ({})",
                describe_epoch(last_processed)
            );
            return Ok(CheckOutcome::Unchanged {
                modified,
                last_processed,
            });
        }

        info!(
            "Detected new or updated main zip file (modified: {})",
            describe_epoch(modified)
        );
        let mut ledger = ProcessedLedger::open(self.config.ledger_path())?;
        info!("{} inner archives already done", ledger.len());

        let unpack = match self.unpacker.unpack(&archive, &mut ledger) {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Error processing main zip file: {:#}", e);
                None
            }
        };

        last_run.store(modified)?;
        Ok(CheckOutcome::Processed { modified, unpack })
    }
}
