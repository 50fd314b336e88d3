//! BlueMsg CLI entry point

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bluemsg_cli::{
    cli::Cli,
    commands::CommandDispatcher,
    config::CliAppConfig,
    error::{CliError, Result},
};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", explain(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_configuration(&cli)?;
    config.apply_overrides(cli.radio, cli.name.clone(), cli.json);
    config.validate()?;

    CommandDispatcher::execute(cli, config).await?;
    info!("BlueMsg CLI exited");
    Ok(())
}

/// Setup logging based on verbosity level; `RUST_LOG` wins when set
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or the standard locations
fn load_configuration(cli: &Cli) -> Result<CliAppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
        Ok(CliAppConfig::load_from_file(config_path)?)
    } else {
        Ok(CliAppConfig::load()?)
    }
}

/// Add a hint for the failures users can fix themselves
fn explain(error: &CliError) -> String {
    match error {
        CliError::Radio(bluemsg_radio::RadioError::AdapterNotAvailable(_)) => format!(
            "{}\nhint: try `--radio lan` to chat with devices on the local network",
            error
        ),
        CliError::Radio(bluemsg_radio::RadioError::PermissionDenied(_)) => {
            format!("{}\nhint: the user needs access to the system Bluetooth service", error)
        }
        _ => error.to_string(),
    }
}
