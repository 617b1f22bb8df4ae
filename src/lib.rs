//! Timesheet relay: watches a Slack channel for uploaded time-tracking
//! reports, relays a rounded weekly total to a recipient, and reminds the
//! employee when the weekly deadline passes without a report.

pub mod error;
pub mod executor;
pub mod extract;
pub mod intake;
pub mod notification;
pub mod parser;
pub mod relay;
pub mod report;
pub mod rounding;
pub mod scheduler;
pub mod slack;
pub mod state;
pub mod tracker;
pub mod types;

use std::sync::Arc;

use tokio::sync::mpsc;

use error::RelayError;
use extract::DocumentExtractor;
use relay::Relay;
use slack::client::SlackClient;
use state::AppState;
use types::RelayConfig;

/// Channel buffer size for scheduler messages
const SCHEDULER_CHANNEL_SIZE: usize = 32;

/// Wire up the relay and run it until the intake poller stops.
///
/// The scheduler and executor run as background tasks; the intake poller
/// runs on the caller's task.
pub async fn run(config: RelayConfig) -> Result<(), RelayError> {
    let state = Arc::new(AppState::new(config)?);
    let slack = Arc::new(SlackClient::new(&state.config.slack_bot_token));

    let relay = Arc::new(Relay::new(
        state.clone(),
        slack.clone(),
        Arc::new(DocumentExtractor),
        slack.clone(),
    ));

    for job in types::JobId::ALL {
        let entry = state.config.schedules.entry(job);
        if !entry.enabled {
            log::info!("Job '{}' is disabled", job);
            continue;
        }
        match scheduler::get_next_run_time(entry) {
            Ok(next) => log::info!("Job '{}' next runs at {}", job, next),
            Err(e) => log::warn!("Job '{}': {}", job, e),
        }
    }

    let (scheduler_tx, scheduler_rx) = mpsc::channel(SCHEDULER_CHANNEL_SIZE);

    let scheduler_state = state.clone();
    tokio::spawn(async move {
        let scheduler = scheduler::Scheduler::new(scheduler_state, scheduler_tx);
        scheduler.run().await;
    });

    let executor_relay = relay.clone();
    tokio::spawn(async move {
        let executor = executor::Executor::new(executor_relay);
        executor.run(scheduler_rx).await;
    });

    log::info!(
        "Relaying reports from {} to {} for {}",
        state.config.intake_channel,
        state.config.recipient_channel,
        state.config.employee_name
    );

    slack::poller::run_intake_poller(relay, slack).await;
    Ok(())
}
