//! Periodic trigger driven by a cron expression

use crate::managers::backup::BackupSet;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parse a seconds-first cron expression (`sec min hour dom month dow [year]`)
/// or a shorthand such as `@hourly`.
pub fn parse_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(expression.trim())
}

/// Time until the next firing after `now`, or None if the schedule never
/// fires again.
pub fn next_delay(schedule: &Schedule, now: DateTime<Utc>) -> Option<(DateTime<Utc>, Duration)> {
    let next = schedule.after(&now).next()?;
    let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
    Some((next, delay))
}

/// Trigger a synchronous run at every firing of `schedule`.
///
/// A firing that finds a run still in progress is skipped. Returns only if
/// the schedule is exhausted.
pub async fn run_schedule(schedule: Schedule, backup_set: Arc<BackupSet>) {
    info!(schedule = %schedule, "Starting cron scheduler");

    while let Some((next, delay)) = next_delay(&schedule, Utc::now()) {
        debug!(next = %next, "Waiting for next scheduled backup");
        tokio::time::sleep(delay).await;

        if !backup_set.run_synchronously().await {
            warn!(scheduled = %next, "Skipped scheduled backup");
        }
    }

    warn!("Cron schedule has no upcoming run, scheduler stopped");
}
