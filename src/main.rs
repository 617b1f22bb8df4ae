use std::process::ExitCode;

use timesheet_relay::state::load_config;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load config: {} ({})", e, e.recovery_suggestion());
            return ExitCode::FAILURE;
        }
    };

    match timesheet_relay::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Relay stopped: {} ({})", e, e.recovery_suggestion());
            ExitCode::FAILURE
        }
    }
}
