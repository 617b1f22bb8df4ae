//! Job execution engine
//!
//! Receives scheduler messages and runs the matching relay job. Jobs run one
//! at a time in arrival order, so a reset can never interleave with a
//! deadline check.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::relay::Relay;
use crate::scheduler::SchedulerMessage;

/// Executor runs scheduled jobs against the relay
pub struct Executor {
    relay: Arc<Relay>,
}

impl Executor {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }

    /// Main executor loop - processes messages from the scheduler
    pub async fn run(&self, mut receiver: mpsc::Receiver<SchedulerMessage>) {
        while let Some(msg) = receiver.recv().await {
            log::info!("Running '{}' job (trigger: {:?})", msg.job, msg.trigger);

            if let Err(e) = self.relay.run_job(msg.job).await {
                log::error!(
                    "Job '{}' failed: {} ({})",
                    msg.job,
                    e,
                    e.recovery_suggestion()
                );
            }
        }

        log::info!("Scheduler channel closed, executor stopping");
    }
}
