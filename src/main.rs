use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docker_netview::commands;
use docker_netview::config::cli::CliArgs;
use docker_netview::config::{self, toml::print_default_config};
use docker_netview::AppError;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        print_default_config();
        return Ok(());
    }

    let app_config = config::load_configuration(&cli)?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(app_config.log_level.as_str())
        .with_writer(std::io::stderr)
        .init();

    if cli.validate_config {
        info!("Configuration is valid");
        debug!("{:?}", app_config);
        return Ok(());
    }

    let Some(ref command) = cli.command else {
        CliArgs::command().print_help()?;
        return Ok(());
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    commands::run(command, &app_config, &cancel).await
}
