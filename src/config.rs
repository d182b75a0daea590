// src/config.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Rows read per window when transforming a CSV file.
pub const DEFAULT_WINDOW_SIZE: usize = 10_000;
pub const DEFAULT_ARCHIVE_NAME: &str = "fetch_mtf.zip";
pub const LEDGER_FILE: &str = "processed_mtf_files.txt";
pub const LAST_RUN_FILE: &str = "last_processed_time.txt";

/// Everything the pipeline needs to know about where it reads, writes and how often it runs.
/// Built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the outer archive gets downloaded into.
    pub download_path: PathBuf,
    /// File name of the outer archive inside `download_path`.
    pub archive_name: String,
    /// Root of the per-inner-archive output tree.
    pub output_root: PathBuf,
    /// Holds the ledger, the last-run timestamp and the run logs.
    pub state_dir: PathBuf,
    /// Parent for scratch directories; `None` means the system temp dir.
    pub scratch_root: Option<PathBuf>,
    pub window_size: usize,
    /// How often the service loop wakes to look for due work.
    pub poll_interval: Duration,
    /// How often a change check becomes due.
    pub schedule_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_path: expand_home("~/Downloads"),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            output_root: expand_home("~/Documents/MTF_Reports_Processed"),
            state_dir: expand_home("~/Documents/MTF_Processing_Logs"),
            scratch_root: None,
            window_size: DEFAULT_WINDOW_SIZE,
            poll_interval: Duration::from_secs(30 * 60),
            schedule_interval: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// On-disk form; every key is optional and falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    download_path: Option<String>,
    archive_name: Option<String>,
    output_root: Option<String>,
    state_dir: Option<String>,
    scratch_root: Option<String>,
    window_size: Option<usize>,
    poll_interval_secs: Option<u64>,
    schedule_interval_secs: Option<u64>,
}

impl Config {
    /// YAML file named by `MTF_CONFIG` (if any), then `MTF_*` environment overrides.
    pub fn load() -> Result<Self> {
        let base = match env::var("MTF_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(expand_home(&path))?,
            _ => Self::default(),
        };
        Ok(base.with_overrides(|key| env::var(key).ok()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(raw)?;
        let mut cfg = Self::default();
        if let Some(p) = file.download_path {
            cfg.download_path = expand_home(&p);
        }
        if let Some(name) = file.archive_name {
            cfg.archive_name = name;
        }
        if let Some(p) = file.output_root {
            cfg.output_root = expand_home(&p);
        }
        if let Some(p) = file.state_dir {
            cfg.state_dir = expand_home(&p);
        }
        if let Some(p) = file.scratch_root {
            cfg.scratch_root = Some(expand_home(&p));
        }
        if let Some(n) = file.window_size {
            cfg.window_size = n;
        }
        if let Some(secs) = file.poll_interval_secs {
            cfg.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.schedule_interval_secs {
            cfg.schedule_interval = Duration::from_secs(secs);
        }
        Ok(cfg)
    }

    /// Apply `MTF_*` overrides through `lookup`. Values that fail to parse keep the current setting.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(p) = get("MTF_DOWNLOAD_DIR") {
            self.download_path = expand_home(&p);
        }
        if let Some(name) = get("MTF_ARCHIVE_NAME") {
            self.archive_name = name;
        }
        if let Some(p) = get("MTF_OUTPUT_DIR") {
            self.output_root = expand_home(&p);
        }
        if let Some(p) = get("MTF_STATE_DIR") {
            self.state_dir = expand_home(&p);
        }
        if let Some(p) = get("MTF_SCRATCH_DIR") {
            self.scratch_root = Some(expand_home(&p));
        }
        if let Some(n) = get("MTF_WINDOW_SIZE").and_then(|v| v.trim().parse().ok()) {
            self.window_size = n;
        }
        if let Some(secs) = get("MTF_POLL_SECS").and_then(|v| v.trim().parse().ok()) {
            self.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = get("MTF_SCHEDULE_SECS").and_then(|v| v.trim().parse().ok()) {
            self.schedule_interval = Duration::from_secs(secs);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            bail!("window_size must be at least 1");
        }
        if self.archive_name.trim().is_empty() {
            bail!("archive_name must not be empty");
        }
        if self.poll_interval.is_zero() {
            bail!("poll_interval must be non-zero");
        }
        Ok(())
    }

    /// Create the output and state directories.
    pub fn prepare(&self) -> Result<()> {
        for d in [&self.output_root, &self.state_dir] {
            fs::create_dir_all(d).with_context(|| format!("creating directory {}", d.display()))?;
        }
        Ok(())
    }

    pub fn archive_path(&self) -> PathBuf {
        self.download_path.join(&self.archive_name)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join(LEDGER_FILE)
    }

    pub fn last_run_path(&self) -> PathBuf {
        self.state_dir.join(LAST_RUN_FILE)
    }
}

/// Expand a leading `~` to `$HOME`. Left alone when `HOME` is unset.
pub fn expand_home(raw: &str) -> PathBuf {
    let home = env::var_os("HOME").map(PathBuf::from);
    match (raw, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_deployment() {
        let cfg = Config::default();
        assert_eq!(cfg.window_size, 10_000);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1800));
        assert_eq!(cfg.schedule_interval, Duration::from_secs(21_600));
        assert!(cfg.archive_path().ends_with("fetch_mtf.zip"));
        assert!(cfg.ledger_path().ends_with(LEDGER_FILE));
        assert!(cfg.last_run_path().ends_with(LAST_RUN_FILE));
        cfg.validate().unwrap();
    }

    #[test]
    fn yaml_overrides_only_given_keys() {
        let cfg = Config::from_yaml_str(
            "download_path: /srv/in\nwindow_size: 25\nschedule_interval_secs: 60\n",
        )
        .unwrap();
        assert_eq!(cfg.download_path, PathBuf::from("/srv/in"));
        assert_eq!(cfg.window_size, 25);
        assert_eq!(cfg.schedule_interval, Duration::from_secs(60));
        assert_eq!(cfg.archive_name, DEFAULT_ARCHIVE_NAME);
    }

    #[test]
    fn yaml_rejects_unknown_keys() {
        assert!(Config::from_yaml_str("windw_size: 3\n").is_err());
    }

    #[test]
    fn env_overrides_ignore_garbage() {
        let vars: HashMap<&str, &str> = [
            ("MTF_OUTPUT_DIR", "/srv/out"),
            ("MTF_WINDOW_SIZE", "not-a-number"),
            ("MTF_POLL_SECS", "5"),
            ("MTF_ARCHIVE_NAME", "  "),
        ]
        .into_iter()
        .collect();
        let cfg = Config::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.output_root, PathBuf::from("/srv/out"));
        assert_eq!(cfg.window_size, DEFAULT_WINDOW_SIZE);
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.archive_name, DEFAULT_ARCHIVE_NAME);
    }

    #[test]
    fn zero_window_is_invalid() {
        let cfg = Config {
            window_size: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn home_expansion() {
        if let Some(home) = env::var_os("HOME") {
            assert_eq!(expand_home("~/x"), PathBuf::from(home).join("x"));
        }
        assert_eq!(expand_home("/abs/~/x"), PathBuf::from("/abs/~/x"));
    }
}
