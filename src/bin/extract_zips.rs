// src/bin/extract_zips.rs
// usage: extract_zips [INPUT_DIR] [OUTPUT_DIR] [--flat]

use anyhow::{bail, Result};
use mtfprocess::extract::extract_all;
use std::{env, path::PathBuf};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut flat = false;
    let mut positional = Vec::new();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--flat" | "-f" => flat = true,
            a if a.starts_with('-') => bail!("unknown flag {}", a),
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    let input = PathBuf::from(positional.next().unwrap_or_else(|| "data".into()));
    let output = PathBuf::from(positional.next().unwrap_or_else(|| "data/extracted".into()));

    let summary = extract_all(&input, &output, !flat)?;

    info!("Total zip files: {}", summary.succeeded + summary.failed);
    info!("Successfully extracted: {}", summary.succeeded);
    info!("Failed to extract: {}", summary.failed);
    info!("Total files extracted: {}", summary.files_extracted);
    info!("All files extracted to: {}", output.display());
    Ok(())
}
