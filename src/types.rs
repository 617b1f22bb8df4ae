use serde::Deserialize;

/// Configuration stored in ~/.timesheet-relay/config.json
///
/// Every field has a default so the file may be partial or absent; the
/// `RELAY_*` environment variables are applied on top (see `state::load_config`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    #[serde(default)]
    pub slack_bot_token: String,
    /// Channel watched for uploaded reports (usually the bot's DM with the employee).
    #[serde(default)]
    pub intake_channel: String,
    /// Where weekly summaries are relayed.
    #[serde(default)]
    pub recipient_channel: String,
    /// Where deadline reminders go. Falls back to the intake channel.
    #[serde(default)]
    pub reminder_channel: Option<String>,
    #[serde(default = "default_employee_name")]
    pub employee_name: String,
    /// Only accept reports on `deadline_day`.
    #[serde(default)]
    pub restrict_to_deadline_day: bool,
    /// Weekday name or abbreviation, e.g. `Fri` or `friday`.
    #[serde(default = "default_deadline_day")]
    pub deadline_day: String,
    /// Case-insensitive filename fragments identifying a report export.
    #[serde(default = "default_report_keywords")]
    pub report_keywords: Vec<String>,
    /// Ignore uploads outside direct-message channels.
    #[serde(default)]
    pub direct_messages_only: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub schedules: Schedules,
}

fn default_employee_name() -> String {
    "Roxie".to_string()
}

fn default_deadline_day() -> String {
    "Fri".to_string()
}

pub fn default_report_keywords() -> Vec<String> {
    vec!["toggl".to_string(), "track".to_string(), "summary".to_string()]
}

fn default_poll_interval_secs() -> u64 {
    30
}

pub const DEFAULT_TIMEZONE: &str = "America/New_York";

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            slack_bot_token: String::new(),
            intake_channel: String::new(),
            recipient_channel: String::new(),
            reminder_channel: None,
            employee_name: default_employee_name(),
            restrict_to_deadline_day: false,
            deadline_day: default_deadline_day(),
            report_keywords: default_report_keywords(),
            direct_messages_only: false,
            poll_interval_secs: default_poll_interval_secs(),
            schedules: Schedules::default(),
        }
    }
}

impl RelayConfig {
    /// Channel that receives deadline reminders.
    pub fn reminder_destination(&self) -> &str {
        self.reminder_channel
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.intake_channel)
    }
}

/// Schedule configuration for the two weekly jobs
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedules {
    #[serde(default = "ScheduleEntry::default_deadline_check")]
    pub deadline_check: ScheduleEntry,
    #[serde(default = "ScheduleEntry::default_weekly_reset")]
    pub weekly_reset: ScheduleEntry,
}

impl Default for Schedules {
    fn default() -> Self {
        Self {
            deadline_check: ScheduleEntry::default_deadline_check(),
            weekly_reset: ScheduleEntry::default_weekly_reset(),
        }
    }
}

impl Schedules {
    pub fn entry(&self, job: JobId) -> &ScheduleEntry {
        match job {
            JobId::DeadlineCheck => &self.deadline_check,
            JobId::WeeklyReset => &self.weekly_reset,
        }
    }
}

/// A single schedule entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub enabled: bool,
    pub cron: String,
    pub timezone: String,
}

impl ScheduleEntry {
    /// Default deadline check: 5 PM Fridays
    pub fn default_deadline_check() -> Self {
        Self {
            enabled: true,
            cron: "0 17 * * Fri".to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    /// Default weekly reset: midnight Monday
    pub fn default_weekly_reset() -> Self {
        Self {
            enabled: true,
            cron: "0 0 * * Mon".to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }
}

/// Scheduled job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobId {
    DeadlineCheck,
    WeeklyReset,
}

impl JobId {
    pub const ALL: [JobId; 2] = [JobId::DeadlineCheck, JobId::WeeklyReset];
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobId::DeadlineCheck => write!(f, "deadline_check"),
            JobId::WeeklyReset => write!(f, "weekly_reset"),
        }
    }
}

/// What triggered the execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTrigger {
    Scheduled,
    Missed,
}

/// A file attached to an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Authenticated download URL.
    pub url: String,
}

/// Kind of channel an event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    DirectMessage,
    Channel,
}

/// A message-like event from the intake channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub channel: String,
    pub channel_type: ChannelType,
    pub user: Option<String>,
    /// Platform message timestamp, used as the poll cursor.
    pub ts: String,
    pub files: Vec<EventFile>,
}

impl InboundEvent {
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn is_direct_message(&self) -> bool {
        self.channel_type == ChannelType::DirectMessage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: RelayConfig =
            serde_json::from_str(r#"{ "recipientChannel": "C123", "employeeName": "Sam" }"#)
                .unwrap();
        assert_eq!(config.recipient_channel, "C123");
        assert_eq!(config.employee_name, "Sam");
        assert_eq!(config.deadline_day, "Fri");
        assert_eq!(config.report_keywords, default_report_keywords());
        assert_eq!(config.schedules.deadline_check.cron, "0 17 * * Fri");
        assert_eq!(config.schedules.weekly_reset.cron, "0 0 * * Mon");
    }

    #[test]
    fn test_reminder_destination_falls_back_to_intake() {
        let mut config = RelayConfig {
            intake_channel: "D1".to_string(),
            ..RelayConfig::default()
        };
        assert_eq!(config.reminder_destination(), "D1");

        config.reminder_channel = Some(String::new());
        assert_eq!(config.reminder_destination(), "D1");

        config.reminder_channel = Some("D2".to_string());
        assert_eq!(config.reminder_destination(), "D2");
    }

    #[test]
    fn test_job_display_names() {
        assert_eq!(JobId::DeadlineCheck.to_string(), "deadline_check");
        assert_eq!(JobId::WeeklyReset.to_string(), "weekly_reset");
    }
}
