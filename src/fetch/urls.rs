// src/fetch/urls.rs
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Where the exchange publishes one margin-trading archive per day.
pub const DAILY_ARCHIVE_BASE: &str = "https://nsearchives.nseindia.com/content/equities";

/// URL of the daily archive for `date` (`mrg_trading_DDMMYY.zip`).
pub fn daily_archive_url(date: NaiveDate) -> String {
    format!(
        "{}/mrg_trading_{}.zip",
        DAILY_ARCHIVE_BASE,
        date.format("%d%m%y")
    )
}

/// `date` moved back by whole calendar years; Feb 29 clamps to Feb 28.
pub fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    let year = date.year() - years as i32;
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
        .unwrap_or(NaiveDate::MIN)
}

/// One URL per calendar day from `years` before `end` through `end`, oldest first.
pub fn daily_archive_urls(end: NaiveDate, years: u32) -> Vec<String> {
    years_before(end, years)
        .iter_days()
        .take_while(|d| *d <= end)
        .map(daily_archive_url)
        .collect()
}

/// Write `urls` one per line.
pub fn save_urls(urls: &[String], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    for url in urls {
        writeln!(w, "{}", url)?;
    }
    w.flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn formats_ddmmyy() {
        assert_eq!(
            daily_archive_url(d(2024, 3, 5)),
            "https://nsearchives.nseindia.com/content/equities/mrg_trading_050324.zip"
        );
    }

    #[test]
    fn one_year_inclusive() {
        let urls = daily_archive_urls(d(2024, 3, 1), 1);
        // 2023-03-01 ..= 2024-03-01 spans a leap day
        assert_eq!(urls.len(), 367);
        assert!(urls[0].ends_with("mrg_trading_010323.zip"));
        assert!(urls[urls.len() - 1].ends_with("mrg_trading_010324.zip"));
    }

    #[test]
    fn leap_day_clamps() {
        assert_eq!(years_before(d(2024, 2, 29), 1), d(2023, 2, 28));
    }

    #[test]
    fn saves_one_per_line() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("urls.txt");
        let urls = daily_archive_urls(d(2024, 1, 3), 0);
        assert_eq!(urls.len(), 1);
        save_urls(&urls, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
