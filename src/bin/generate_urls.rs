// src/bin/generate_urls.rs
// usage: generate_urls [YEARS] [OUT_FILE]

use anyhow::{Context, Result};
use chrono::Local;
use mtfprocess::fetch::urls::{daily_archive_urls, save_urls};
use std::env;
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let mut args = env::args().skip(1);
    let years: u32 = match args.next() {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("YEARS must be a whole number, got {:?}", raw))?,
        None => 10,
    };
    let out = args
        .next()
        .unwrap_or_else(|| "nse_urls_all_days.txt".to_string());

    let urls = daily_archive_urls(Local::now().date_naive(), years);
    info!("Generated {} URLs for all days in the last {} years", urls.len(), years);
    if let (Some(first), Some(last)) = (urls.first(), urls.last()) {
        info!(first = %first, last = %last, "range");
    }

    save_urls(&urls, &out)?;
    info!("Saved {} URLs to {}", urls.len(), out);
    Ok(())
}
