use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::{
    fs,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};
use tracing::warn;

/// Single-value file holding the outer archive's modification time (epoch seconds)
/// as of the last handled run. Overwritten, never appended.
#[derive(Debug, Clone)]
pub struct LastRun {
    path: PathBuf,
}

impl LastRun {
    /// Open the timestamp file at `path`, writing `0` on first use.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating state directory {}", parent.display()))?;
        }
        let last = Self { path };
        if !last.path.exists() {
            last.store(0.0)?;
        }
        Ok(last)
    }

    /// Stored epoch seconds. Missing or unparsable content reads as 0.
    pub fn load(&self) -> Result<f64> {
        if !self.path.exists() {
            return Ok(0.0);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        match raw.trim().parse::<f64>() {
            Ok(ts) if ts.is_finite() => Ok(ts),
            _ => {
                warn!(file = %self.path.display(), content = raw.trim(), "unreadable timestamp, treating as 0");
                Ok(0.0)
            }
        }
    }

    pub fn store(&self, ts: f64) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, ts.to_string())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Modification time of `path` in fractional epoch seconds.
pub fn modified_secs(path: &Path) -> Result<f64> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading modification time of {}", path.display()))?;
    let since = modified
        .duration_since(UNIX_EPOCH)
        .with_context(|| format!("{} was modified before the epoch", path.display()))?;
    Ok(since.as_secs_f64())
}

/// Local-time rendering of epoch seconds, for log lines.
pub fn describe_epoch(ts: f64) -> String {
    DateTime::from_timestamp_millis((ts * 1000.0) as i64)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("{}s", ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn starts_at_zero() {
        let tmp = tempdir().unwrap();
        let last = LastRun::open(tmp.path().join("last.txt")).unwrap();
        assert_eq!(last.load().unwrap(), 0.0);
        assert!(last.path().exists());
    }

    #[test]
    fn store_overwrites() {
        let tmp = tempdir().unwrap();
        let last = LastRun::open(tmp.path().join("last.txt")).unwrap();
        last.store(1_700_000_000.25).unwrap();
        last.store(1_700_000_100.5).unwrap();
        assert_eq!(last.load().unwrap(), 1_700_000_100.5);
        assert_eq!(fs::read_to_string(last.path()).unwrap(), "1700000100.5");
    }

    #[test]
    fn garbage_reads_as_zero() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("last.txt");
        fs::write(&path, "yesterday").unwrap();
        let last = LastRun::open(&path).unwrap();
        assert_eq!(last.load().unwrap(), 0.0);
    }

    #[test]
    fn reads_file_mtime() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("a.bin");
        let f = File::create(&path).unwrap();
        f.set_modified(UNIX_EPOCH + Duration::from_secs(1_600_000_000))
            .unwrap();
        drop(f);
        assert_eq!(modified_secs(&path).unwrap(), 1_600_000_000.0);
    }
}
