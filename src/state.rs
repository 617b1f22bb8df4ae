use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use parking_lot::Mutex;

use crate::error::RelayError;
use crate::intake::IntakePolicy;
use crate::scheduler::parse_cron;
use crate::tracker::WeeklyTracker;
use crate::types::{JobId, RelayConfig};

/// Application state shared by the intake poller, scheduler and executor
pub struct AppState {
    pub config: RelayConfig,
    /// Zone used for weekday checks on incoming reports.
    pub timezone: Tz,
    pub deadline_day: Weekday,
    pub intake_policy: IntakePolicy,
    pub tracker: WeeklyTracker,
    pub last_scheduled_run: Mutex<HashMap<JobId, DateTime<Utc>>>,
}

impl AppState {
    /// Validate `config` and build the state around it.
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        validate_config(&config)?;

        let timezone = parse_timezone(&config.schedules.deadline_check.timezone)?;
        let deadline_day = parse_weekday(&config.deadline_day)?;
        let intake_policy = IntakePolicy::from_config(&config, deadline_day);

        Ok(Self {
            config,
            timezone,
            deadline_day,
            intake_policy,
            tracker: WeeklyTracker::new(),
            last_scheduled_run: Mutex::new(HashMap::new()),
        })
    }

    /// Record when a scheduled run last occurred
    pub fn set_last_scheduled_run(&self, job: JobId, time: DateTime<Utc>) {
        self.last_scheduled_run.lock().insert(job, time);
    }

    /// Get when a job last ran on schedule
    pub fn get_last_scheduled_run(&self, job: JobId) -> Option<DateTime<Utc>> {
        self.last_scheduled_run.lock().get(&job).cloned()
    }
}

/// Get the canonical config file path (~/.timesheet-relay/config.json)
pub fn config_path() -> Result<PathBuf, RelayError> {
    let home = dirs::home_dir()
        .ok_or_else(|| RelayError::Configuration("Could not find home directory".to_string()))?;
    Ok(home.join(".timesheet-relay").join("config.json"))
}

/// Load configuration from ~/.timesheet-relay/config.json (if present) and
/// the process environment.
pub fn load_config() -> Result<RelayConfig, RelayError> {
    let mut config = match config_path() {
        Ok(path) if path.exists() => read_config_file(&path)?,
        _ => RelayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Read a JSON config file. Missing fields take their defaults.
pub fn read_config_file(path: &Path) -> Result<RelayConfig, RelayError> {
    let content = fs::read_to_string(path).map_err(|e| {
        RelayError::Configuration(format!("Failed to read {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        RelayError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Apply `RELAY_*` / `SLACK_BOT_TOKEN` overrides, looked up through `lookup`.
pub fn apply_env_overrides(
    config: &mut RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), RelayError> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = get("SLACK_BOT_TOKEN") {
        config.slack_bot_token = v;
    }
    if let Some(v) = get("RELAY_INTAKE_CHANNEL") {
        config.intake_channel = v;
    }
    if let Some(v) = get("RELAY_RECIPIENT_CHANNEL") {
        config.recipient_channel = v;
    }
    if let Some(v) = get("RELAY_REMINDER_CHANNEL") {
        config.reminder_channel = Some(v);
    }
    if let Some(v) = get("RELAY_EMPLOYEE_NAME") {
        config.employee_name = v;
    }
    if let Some(v) = get("RELAY_RESTRICT_TO_DEADLINE_DAY") {
        config.restrict_to_deadline_day = parse_flag("RELAY_RESTRICT_TO_DEADLINE_DAY", &v)?;
    }
    if let Some(v) = get("RELAY_DEADLINE_DAY") {
        config.deadline_day = v;
    }
    if let Some(v) = get("RELAY_TIMEZONE") {
        config.schedules.deadline_check.timezone = v.clone();
        config.schedules.weekly_reset.timezone = v;
    }
    if let Some(v) = get("RELAY_POLL_INTERVAL_SECS") {
        config.poll_interval_secs = v.parse().map_err(|_| {
            RelayError::Configuration(format!("RELAY_POLL_INTERVAL_SECS is not a number: {}", v))
        })?;
    }

    Ok(())
}

fn parse_flag(key: &str, value: &str) -> Result<bool, RelayError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RelayError::Configuration(format!(
            "{} must be true or false, got {}",
            key, value
        ))),
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, RelayError> {
    name.parse()
        .map_err(|_| RelayError::Configuration(format!("Invalid timezone: {}", name)))
}

pub fn parse_weekday(name: &str) -> Result<Weekday, RelayError> {
    name.trim()
        .parse()
        .map_err(|_| RelayError::Configuration(format!("Invalid deadline day: {}", name)))
}

/// Check everything the relay needs before any task starts.
pub fn validate_config(config: &RelayConfig) -> Result<(), RelayError> {
    let required = [
        ("SLACK_BOT_TOKEN", &config.slack_bot_token),
        ("RELAY_INTAKE_CHANNEL", &config.intake_channel),
        ("RELAY_RECIPIENT_CHANNEL", &config.recipient_channel),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| *key)
        .collect();
    if !missing.is_empty() {
        return Err(RelayError::Configuration(format!(
            "Missing required settings: {}",
            missing.join(", ")
        )));
    }

    if config.poll_interval_secs == 0 {
        return Err(RelayError::Configuration(
            "pollIntervalSecs must be at least 1".to_string(),
        ));
    }

    parse_weekday(&config.deadline_day)?;

    for job in JobId::ALL {
        let entry = config.schedules.entry(job);
        parse_cron(&entry.cron)?;
        parse_timezone(&entry.timezone)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> RelayConfig {
        RelayConfig {
            slack_bot_token: "xoxb-test".to_string(),
            intake_channel: "D100".to_string(),
            recipient_channel: "D200".to_string(),
            ..RelayConfig::default()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RelayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("SLACK_BOT_TOKEN", "xoxb-1"),
                ("RELAY_INTAKE_CHANNEL", "D1"),
                ("RELAY_RECIPIENT_CHANNEL", " D2 "),
                ("RELAY_EMPLOYEE_NAME", "Sam"),
                ("RELAY_RESTRICT_TO_DEADLINE_DAY", "true"),
                ("RELAY_DEADLINE_DAY", "thursday"),
                ("RELAY_TIMEZONE", "America/Chicago"),
                ("RELAY_POLL_INTERVAL_SECS", "15"),
            ]),
        )
        .unwrap();

        assert_eq!(config.slack_bot_token, "xoxb-1");
        assert_eq!(config.recipient_channel, "D2");
        assert_eq!(config.employee_name, "Sam");
        assert!(config.restrict_to_deadline_day);
        assert_eq!(config.schedules.weekly_reset.timezone, "America/Chicago");
        assert_eq!(config.poll_interval_secs, 15);

        let state = AppState::new(config).unwrap();
        assert_eq!(state.deadline_day, Weekday::Thu);
        assert_eq!(state.intake_policy.restrict_to_day, Some(Weekday::Thu));
        assert_eq!(state.timezone, chrono_tz::America::Chicago);
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = valid_config();
        apply_env_overrides(&mut config, env(&[("RELAY_EMPLOYEE_NAME", "  ")])).unwrap();
        assert_eq!(config.employee_name, "Roxie");
    }

    #[test]
    fn test_bad_flag_rejected() {
        let mut config = RelayConfig::default();
        let err = apply_env_overrides(
            &mut config,
            env(&[("RELAY_RESTRICT_TO_DEADLINE_DAY", "sometimes")]),
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::Configuration(_)));
    }

    #[test]
    fn test_validate_reports_missing_settings() {
        let err = validate_config(&RelayConfig::default()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("SLACK_BOT_TOKEN"));
        assert!(msg.contains("RELAY_RECIPIENT_CHANNEL"));
    }

    #[test]
    fn test_validate_rejects_bad_schedule() {
        let mut config = valid_config();
        config.schedules.deadline_check.cron = "not a cron".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.schedules.weekly_reset.timezone = "Mars/Olympus".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.deadline_day = "Someday".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_read_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "intakeChannel": "D1",
                "recipientChannel": "D2",
                "reportKeywords": ["harvest"],
                "schedules": { "deadlineCheck": { "enabled": true, "cron": "30 16 * * Thu", "timezone": "Europe/London" } }
            }"#,
        )
        .unwrap();

        let config = read_config_file(&path).unwrap();
        assert_eq!(config.intake_channel, "D1");
        assert_eq!(config.report_keywords, vec!["harvest".to_string()]);
        assert_eq!(config.schedules.deadline_check.cron, "30 16 * * Thu");
        assert_eq!(config.schedules.weekly_reset.cron, "0 0 * * Mon");
    }

    #[test]
    fn test_read_config_file_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            read_config_file(&path),
            Err(RelayError::Configuration(_))
        ));
    }

    #[test]
    fn test_last_scheduled_run() {
        let state = AppState::new(valid_config()).unwrap();
        assert!(state.get_last_scheduled_run(JobId::WeeklyReset).is_none());
        let now = Utc::now();
        state.set_last_scheduled_run(JobId::WeeklyReset, now);
        assert_eq!(state.get_last_scheduled_run(JobId::WeeklyReset), Some(now));
        assert!(state.get_last_scheduled_run(JobId::DeadlineCheck).is_none());
    }
}
