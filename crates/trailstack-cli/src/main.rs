use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use trailstack_provisioner::ProvisionerError;

mod aws;
mod cli;
mod commands;
mod config;
mod ui;

use cli::{Cli, Commands};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(cli: Cli) -> eyre::Result<ExitCode> {
    let path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };

    if let Commands::Config(command) = &cli.command {
        return commands::config(&path, command);
    }

    let config = commands::effective_config(&path)?;
    let cancel = CancellationToken::new();

    match &cli.command {
        Commands::Apply(args) => commands::apply(&config, args, cancel).await,
        Commands::Destroy(args) => commands::destroy(&config, args, cancel).await,
        Commands::Inventory(args) => commands::inventory(&config, args, cancel).await,
        Commands::Check => commands::check(&config, cancel).await,
        Commands::Config(_) => Ok(ExitCode::SUCCESS),
    }
}

/// Process exit status for an error that ended a command.
///
/// An operator-cancelled wait is not a failure; everything else is.
fn exit_status(err: &eyre::Report) -> u8 {
    match err.downcast_ref::<ProvisionerError>() {
        Some(ProvisionerError::PollCancelled { .. }) => 0,
        _ => 1,
    }
}

/// Engine errors get a one-line message and a hint; anything else goes
/// through color-eyre.
fn report(err: &eyre::Report) -> ExitCode {
    match err.downcast_ref::<ProvisionerError>() {
        Some(ProvisionerError::PollCancelled { name }) => {
            ui::warn(&format!(
                "stopped waiting on {name}; the provider operation continues in the background"
            ));
            ui::dim("run `trailstack inventory` later to see where it ended up");
        }
        Some(engine) => {
            ui::error(&engine.to_string());
            if let Some(hint) = engine.remediation() {
                ui::dim(&format!("hint: {hint}"));
            }
        }
        None => eprintln!("{err:?}"),
    }
    ExitCode::from(exit_status(err))
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(code) => Ok(code),
        Err(err) => Ok(report(&err)),
    }
}
