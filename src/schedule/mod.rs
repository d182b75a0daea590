// src/schedule/mod.rs
use anyhow::Result;
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, error, info};

use crate::{config::Config, detect::ChangeDetector};

/// A job that becomes due every `every`, measured from its last run.
/// Checked by polling; nothing fires on its own.
#[derive(Debug, Clone)]
pub struct Schedule {
    every: Duration,
    next_due: Instant,
}

impl Schedule {
    /// First due `every` after `now`.
    pub fn new(every: Duration, now: Instant) -> Self {
        Self {
            every,
            next_due: next_after(now, every),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    pub fn mark_ran(&mut self, now: Instant) {
        self.next_due = next_after(now, self.every);
    }

    pub fn until_due(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }

    pub fn every(&self) -> Duration {
        self.every
    }
}

fn next_after(now: Instant, every: Duration) -> Instant {
    now.checked_add(every).unwrap_or(now)
}

/// Run the detector once right away, then whenever the schedule is due.
/// Wakes every `poll_interval` to look; returns `Ok(())` once `shutdown` resolves.
pub async fn run_service<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let poll = config.poll_interval;
    let detector = Arc::new(ChangeDetector::new(config));

    tokio::pin!(shutdown);

    tokio::select! {
        res = run_check(&detector) => res?,
        _ = &mut shutdown => {
            info!("Processing automation stopped by user");
            return Ok(());
        }
    }

    let mut schedule = Schedule::new(detector.config().schedule_interval, Instant::now());
    info!(
        "Automated processing set up. Will check for updates every {:?}",
        schedule.every()
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = &mut shutdown => {
                info!("Processing automation stopped by user");
                return Ok(());
            }
        }

        let now = Instant::now();
        if !schedule.is_due(now) {
            debug!(until_due = ?schedule.until_due(now), "nothing due");
            continue;
        }
        run_check(&detector).await?;
        schedule.mark_ran(Instant::now());
    }
}

/// One detector cycle on the blocking pool. Check failures are logged and the loop
/// carries on; a panicked cycle is fatal.
async fn run_check(detector: &Arc<ChangeDetector>) -> Result<()> {
    let detector = Arc::clone(detector);
    match tokio::task::spawn_blocking(move || detector.check_for_updates()).await? {
        Ok(outcome) => debug!(?outcome, "check complete"),
        Err(e) => error!("update check failed: {:?}", e),
    }
    Ok(())
}
