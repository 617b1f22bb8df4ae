//! Intake channel polling loop.
//!
//! Runs as a long-lived task: reads new messages from the intake channel's
//! history and hands each one to the relay, oldest first. Uploads that
//! happened before startup are not replayed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::relay::{EventOutcome, Relay};

use super::client::{message_to_event, SlackClient};

/// Back-off after a failed history request.
const ERROR_BACKOFF_SECS: u64 = 60;

/// Slack-style timestamp (`seconds.micros`) for `at`.
pub fn slack_ts(at: DateTime<Utc>) -> String {
    format!("{}.{:06}", at.timestamp(), at.timestamp_subsec_micros())
}

/// Background loop that polls the intake channel for uploaded reports.
pub async fn run_intake_poller(relay: Arc<Relay>, slack: Arc<SlackClient>) {
    let channel = relay.state().config.intake_channel.clone();
    let poll_interval = Duration::from_secs(relay.state().config.poll_interval_secs);
    let mut cursor = slack_ts(Utc::now());

    log::info!(
        "Intake poller: watching {} every {}s",
        channel,
        poll_interval.as_secs()
    );

    loop {
        tokio::time::sleep(poll_interval).await;

        let messages = match slack.history_since(&channel, &cursor).await {
            Ok(messages) => messages,
            Err(e) => {
                log::warn!("Intake poller: failed to read history for {}: {}", channel, e);
                tokio::time::sleep(Duration::from_secs(ERROR_BACKOFF_SECS)).await;
                continue;
            }
        };

        if !messages.is_empty() {
            log::debug!("Intake poller: {} new message(s)", messages.len());
        }

        for message in messages {
            // Advance first so a message is never handled twice, even if the
            // relay reports a failure for it.
            cursor = message.ts.clone();

            let Some(event) = message_to_event(&channel, &message) else {
                continue;
            };

            match relay.handle_event(&event, Utc::now()).await {
                EventOutcome::Relayed(summary) => {
                    log::info!("Intake poller: relayed report from message {}", event.ts);
                    log::debug!("Relayed summary: {:?}", summary.rounded);
                }
                EventOutcome::Failed(e) => {
                    log::warn!("Intake poller: message {} failed: {}", event.ts, e);
                }
                EventOutcome::Ignored(_) | EventOutcome::Notified(_) => {}
            }
        }
    }
}
