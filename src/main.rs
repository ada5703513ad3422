use std::process::ExitCode;

use clap::Parser;
use renew_pilot::cli::{cmd_run, init_logging, load_config, load_local_env_overrides, CliArgs};
use renew_pilot::ConfigError;
use tracing::{error, info};

/// Missing required configuration.
const EXIT_MISSING_CONFIG: u8 = 2;
const EXIT_SETUP_FAILURE: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let loaded = match load_config(cli.config.as_ref()).await {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };

    // Held until exit so buffered file logs are flushed.
    let _log_guard = match init_logging(&cli.log_level, cli.debug, loaded.config.paths.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };

    info!("Starting renew-pilot v{}", env!("CARGO_PKG_VERSION"));
    loaded.log_source();
    load_local_env_overrides();
    let mut config = loaded.config;
    config.apply_env_overrides();

    match cmd_run(&cli, &config).await {
        Ok(()) => {
            info!("Command completed successfully");
            ExitCode::SUCCESS
        }
        Err(err) => match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Missing(key)) => {
                error!(key, "required configuration missing");
                eprintln!("error: {}", err);
                ExitCode::from(EXIT_MISSING_CONFIG)
            }
            _ => {
                error!("Command failed: {:#}", err);
                ExitCode::from(EXIT_SETUP_FAILURE)
            }
        },
    }
}
