// src/logging.rs
use anyhow::{Context, Result};
use chrono::Local;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber: console output plus a plain-text run log under `state_dir`.
/// Returns the path of the run log.
pub fn init(state_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(state_dir)
        .with_context(|| format!("creating log directory {}", state_dir.display()))?;
    let log_path = state_dir.join(run_log_name());
    let file = File::create(&log_path)
        .with_context(|| format!("creating run log {}", log_path.display()))?;

    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env)
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(log_path)
}

fn run_log_name() -> String {
    format!("mtf_processing_{}.log", Local::now().format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_log_is_timestamped() {
        let name = run_log_name();
        assert!(name.starts_with("mtf_processing_"));
        assert!(name.ends_with(".log"));
        // mtf_processing_ + YYYYMMDD_HHMMSS + .log
        assert_eq!(name.len(), "mtf_processing_".len() + 15 + ".log".len());
    }
}
