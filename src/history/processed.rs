use anyhow::{Context, Result};
use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Line-delimited record of inner-archive entry names that finished processing.
///
/// The file is append-only. Duplicate lines are harmless: on load they collapse into one set entry.
/// An entry that is present is never processed again, whatever its current content.
#[derive(Debug)]
pub struct ProcessedLedger {
    path: PathBuf,
    seen: HashSet<String>,
}

impl ProcessedLedger {
    /// Open the ledger at `path`, creating an empty file (and its directory) on first use.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating ledger directory {}", parent.display()))?;
        }
        if !path.exists() {
            File::create(&path)
                .with_context(|| format!("creating ledger {}", path.display()))?;
        }

        let seen = read_entries(&path)?;
        debug!(ledger = %path.display(), entries = seen.len(), "loaded ledger");
        Ok(Self { path, seen })
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.seen.contains(entry)
    }

    /// Append `entry`. Entries already present are not written twice.
    pub fn record(&mut self, entry: &str) -> Result<()> {
        let entry = entry.trim();
        if entry.is_empty() || self.seen.contains(entry) {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        writeln!(file, "{}", entry)
            .with_context(|| format!("appending to ledger {}", self.path.display()))?;
        self.seen.insert(entry.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn read_entries(path: &Path) -> Result<HashSet<String>> {
    let file = File::open(path).with_context(|| format!("opening ledger {}", path.display()))?;
    let mut set = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("reading ledger {}", path.display()))?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            set.insert(trimmed.to_string());
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_empty_ledger() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("state").join("processed.txt");
        let ledger = ProcessedLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn record_and_contains() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("processed.txt");
        let mut ledger = ProcessedLedger::open(&path).unwrap();

        assert!(!ledger.contains("data/a.zip"));
        ledger.record("data/a.zip").unwrap();
        assert!(ledger.contains("data/a.zip"));

        // same entry again does not grow the file
        ledger.record("data/a.zip").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "data/a.zip\n");
    }

    #[test]
    fn persistence_across_restarts() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("processed.txt");
        {
            let mut ledger = ProcessedLedger::open(&path).unwrap();
            ledger.record("data/a.zip").unwrap();
            ledger.record("data/b.zip").unwrap();
        }
        let ledger = ProcessedLedger::open(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("data/b.zip"));
    }

    #[test]
    fn tolerates_duplicates_and_blank_lines() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("processed.txt");
        fs::write(&path, "data/a.zip\n\n  data/a.zip  \ndata/c.zip\n").unwrap();
        let ledger = ProcessedLedger::open(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains("data/a.zip"));
        assert!(ledger.contains("data/c.zip"));
    }
}
