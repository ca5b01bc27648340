//! Cron-driven trigger for scheduled runs.

use crate::destroyer::Destroyer;
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Time until the next fire after `now`, or `None` if the schedule is exhausted.
/// Fields are matched against wall-clock time in `now`'s zone.
pub fn next_delay<Tz: TimeZone>(schedule: &Schedule, now: DateTime<Tz>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    Some((next - now).to_std().unwrap_or_default())
}

/// Fire a scheduled run at every tick of `schedule`, forever. Ticks follow
/// the host's local time zone.
///
/// Ticks are awaited one after another, so a run that outlasts the interval
/// delays the following tick instead of overlapping it.
pub async fn run(destroyer: Arc<Destroyer>, schedule: Schedule) {
    loop {
        let Some(delay) = next_delay(&schedule, Local::now()) else {
            warn!("schedule has no upcoming fire times, scheduler exiting");
            return;
        };
        tokio::time::sleep(delay).await;

        match destroyer.destroy().await {
            Ok(task) => info!(task = task.id, status = %task.status, "scheduled run finished"),
            Err(e) => error!(error = %e, "scheduled run bookkeeping failed"),
        }
    }
}

pub fn spawn(destroyer: Arc<Destroyer>, schedule: Schedule) -> JoinHandle<()> {
    tokio::spawn(run(destroyer, schedule))
}
