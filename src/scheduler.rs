//! Scheduler for the weekly relay jobs
//!
//! Manages the deadline check and weekly reset with support for:
//! - Cron expression parsing
//! - Timezone-aware scheduling
//! - Sleep/wake detection via time-jump polling
//! - Missed job handling (runs if within grace period)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::state::{parse_timezone, AppState};
use crate::types::{ExecutionTrigger, JobId, ScheduleEntry};

/// Grace period for a missed deadline check (2 hours)
const MISSED_JOB_GRACE_PERIOD_SECS: i64 = 7200;

/// Extended grace period for the weekly reset (24 hours), so a laptop asleep
/// over Monday midnight still starts the new week
const MISSED_WEEKLY_JOB_GRACE_PERIOD_SECS: i64 = 86400;

/// A scheduled time within this many seconds of now counts as due
const DUE_WINDOW_SECS: i64 = 120;

/// Time jump threshold to detect sleep/wake (5 minutes)
const TIME_JUMP_THRESHOLD_SECS: i64 = 300;

/// Poll interval for scheduler loop (1 minute)
const POLL_INTERVAL_SECS: u64 = 60;

/// Message sent to trigger job execution
#[derive(Debug, Clone)]
pub struct SchedulerMessage {
    pub job: JobId,
    pub trigger: ExecutionTrigger,
}

/// Scheduler for the deadline check and weekly reset
pub struct Scheduler {
    state: Arc<AppState>,
    sender: mpsc::Sender<SchedulerMessage>,
}

impl Scheduler {
    pub fn new(state: Arc<AppState>, sender: mpsc::Sender<SchedulerMessage>) -> Self {
        Self { state, sender }
    }

    /// Start the scheduler loop
    ///
    /// This runs indefinitely, checking for due jobs every minute.
    /// It also handles sleep/wake detection.
    pub async fn run(&self) {
        let mut last_check = Utc::now();

        loop {
            tokio::time::sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;

            let now = Utc::now();

            // Detect sleep: time jumped more than 5 minutes
            let time_jump = (now - last_check).num_seconds();
            if time_jump > TIME_JUMP_THRESHOLD_SECS {
                log::info!(
                    "Detected system wake (time jumped {} seconds), checking for missed jobs",
                    time_jump
                );
                self.check_missed_jobs(now).await;
            }

            self.check_and_run_due_jobs(now).await;

            last_check = now;
        }
    }

    /// Check for jobs that should run now
    async fn check_and_run_due_jobs(&self, now: DateTime<Utc>) {
        for job in JobId::ALL {
            let entry = self.state.config.schedules.entry(job);
            if !entry.enabled {
                continue;
            }

            let last_run = self.state.get_last_scheduled_run(job);
            match find_due_time(entry, last_run, now, DUE_WINDOW_SECS) {
                Ok(Some(scheduled)) => {
                    self.trigger_job(job, ExecutionTrigger::Scheduled, scheduled)
                        .await;
                }
                Ok(None) => {}
                Err(e) => log::warn!("Schedule for {} is invalid: {}", job, e),
            }
        }
    }

    /// Check for jobs that were missed during sleep
    async fn check_missed_jobs(&self, now: DateTime<Utc>) {
        for job in JobId::ALL {
            let entry = self.state.config.schedules.entry(job);
            if !entry.enabled {
                continue;
            }

            let last_run = self.state.get_last_scheduled_run(job);
            if let Ok(Some(scheduled)) = find_due_time(entry, last_run, now, grace_period_secs(job))
            {
                log::info!("Found missed '{}' job, running now", job);
                self.trigger_job(job, ExecutionTrigger::Missed, scheduled)
                    .await;
            }
        }
    }

    /// Trigger a job execution and mark its scheduled time as handled
    async fn trigger_job(&self, job: JobId, trigger: ExecutionTrigger, scheduled: DateTime<Utc>) {
        self.state.set_last_scheduled_run(job, scheduled);
        if self
            .sender
            .send(SchedulerMessage { job, trigger })
            .await
            .is_err()
        {
            log::error!("Failed to send scheduler message for {:?}", job);
        }
    }
}

/// Grace period for catching up a missed job.
/// The weekly reset uses an extended 24-hour grace period.
pub fn grace_period_secs(job: JobId) -> i64 {
    match job {
        JobId::WeeklyReset => MISSED_WEEKLY_JOB_GRACE_PERIOD_SECS,
        JobId::DeadlineCheck => MISSED_JOB_GRACE_PERIOD_SECS,
    }
}

/// Find the most recent scheduled time in `(now - window, now]` that has not
/// already run.
pub fn find_due_time(
    entry: &ScheduleEntry,
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window_secs: i64,
) -> Result<Option<DateTime<Utc>>, RelayError> {
    let schedule = parse_cron(&entry.cron)?;
    let tz: Tz = parse_timezone(&entry.timezone)?;

    let window_start = (now - chrono::Duration::seconds(window_secs)).with_timezone(&tz);

    let mut due = None;
    for scheduled in schedule.after(&window_start) {
        let scheduled_utc = scheduled.with_timezone(&Utc);

        // Stop if we've passed now
        if scheduled_utc > now {
            break;
        }

        // Skip times that already ran
        if let Some(last) = last_run {
            if last >= scheduled_utc {
                continue;
            }
        }

        due = Some(scheduled_utc);
    }

    Ok(due)
}

/// Parse a cron expression
pub fn parse_cron(expr: &str) -> Result<Schedule, RelayError> {
    // The cron crate expects 6 fields (with seconds), but we use 5-field format
    // Add "0" for seconds at the start
    let full_expr = format!("0 {}", expr);

    full_expr.parse::<Schedule>().map_err(|e| {
        RelayError::Configuration(format!("Invalid cron expression '{}': {}", expr, e))
    })
}

/// Get the next scheduled time for a job
pub fn get_next_run_time(entry: &ScheduleEntry) -> Result<DateTime<Utc>, RelayError> {
    let schedule = parse_cron(&entry.cron)?;
    let tz: Tz = parse_timezone(&entry.timezone)?;

    let next = schedule.upcoming(tz).next().ok_or_else(|| {
        RelayError::Configuration("No upcoming scheduled time".to_string())
    })?;

    Ok(next.with_timezone(&Utc))
}
