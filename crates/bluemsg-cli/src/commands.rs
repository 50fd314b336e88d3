//! Command handlers for the BlueMsg CLI

use std::time::Duration;
use tracing::info;

use bluemsg_core::{internal::CommandSender, Command, PeerDevice};
use bluemsg_radio::open_radio;
use bluemsg_runtime::{AppEvent, LoggerWrapper, MessagingRuntime, RuntimeBuilder, StatusDetail};

use crate::cli::{Cli, Commands};
use crate::config::CliAppConfig;
use crate::demo;
use crate::error::{CliError, Result};
use crate::terminal_interface::TerminalInterfaceTask;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: CliAppConfig) -> Result<()> {
        match cli.command {
            Commands::Chat => {
                let startup = if config.cli.listen_on_startup {
                    vec![Command::StartListening]
                } else {
                    Vec::new()
                };
                Self::handle_chat_command(config, startup).await
            }
            Commands::Listen { discoverable } => {
                let mut startup = vec![Command::StartListening];
                if discoverable {
                    startup.push(Command::MakeDiscoverable { duration: None });
                }
                Self::handle_chat_command(config, startup).await
            }
            Commands::Connect { address } => {
                let peer = PeerDevice::new(address, None);
                Self::handle_chat_command(config, vec![Command::Connect { peer }]).await
            }
            Commands::Scan { seconds } => Self::handle_scan_command(config, seconds).await,
            Commands::Demo => demo::run_demo(config.cli).await,
            Commands::Config => {
                println!("{}", CliAppConfig::example_config());
                Ok(())
            }
        }
    }

    /// Interactive chat: run the terminal until `/quit`, Ctrl+C or a fatal radio error
    async fn handle_chat_command(config: CliAppConfig, startup: Vec<Command>) -> Result<()> {
        let mut runtime = Self::start_runtime(&config).await?;
        let command_sender = Self::command_sender(&runtime)?;
        let app_events = runtime
            .take_app_event_receiver()
            .ok_or_else(|| CliError::RuntimeStopped("App events already taken".to_string()))?;

        for command in startup {
            Self::send(&command_sender, command).await?;
        }

        let mut terminal = TerminalInterfaceTask::new(command_sender, app_events, LoggerWrapper::default(), config.cli);
        let outcome = tokio::select! {
            result = terminal.run() => result.map_err(CliError::from),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                Ok(())
            }
        };

        runtime.stop().await?;
        outcome
    }

    /// Scan once and print the devices found
    async fn handle_scan_command(mut config: CliAppConfig, seconds: Option<u64>) -> Result<()> {
        if let Some(seconds) = seconds {
            if seconds == 0 {
                return Err(CliError::Input("Scan window must be at least one second".to_string()));
            }
            config.core.coordinator.scan_window = Duration::from_secs(seconds);
        }
        let json = config.cli.json_output;

        let mut runtime = Self::start_runtime(&config).await?;
        let command_sender = Self::command_sender(&runtime)?;
        let mut app_events = runtime
            .take_app_event_receiver()
            .ok_or_else(|| CliError::RuntimeStopped("App events already taken".to_string()))?;

        info!("Scanning for {:?}...", config.core.coordinator.scan_window);
        Self::send(&command_sender, Command::StartScan).await?;

        let mut found = 0;
        loop {
            tokio::select! {
                event = app_events.recv() => {
                    let Some(event) = event else { break };
                    if json {
                        println!("{}", serde_json::to_string(&event)?);
                    }
                    match event {
                        AppEvent::PeerDiscovered { peer } => {
                            found += 1;
                            if !json {
                                println!("  {}. {} [{}]", found, peer.list_name(), peer.address);
                            }
                        }
                        AppEvent::ScanFinished { count } => {
                            if !json {
                                println!("{} device(s) found", count);
                            }
                            break;
                        }
                        AppEvent::Notification { text } if !json => println!("! {}", text),
                        AppEvent::StatusChanged { detail, .. } if ends_scan(&detail) => {
                            if !json {
                                println!("{}", detail);
                            }
                            break;
                        }
                        AppEvent::Stopped => break,
                        _ => {}
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    Self::send(&command_sender, Command::CancelScan).await?;
                    break;
                }
            }
        }

        runtime.stop().await?;
        Ok(())
    }

    async fn start_runtime(config: &CliAppConfig) -> Result<MessagingRuntime> {
        let (radio, capabilities) = open_radio(&config.radio).await?;
        info!("Using {} radio", radio.radio_kind());
        let runtime = RuntimeBuilder::new(radio)
            .with_capabilities(capabilities)
            .with_config(config.core.clone())
            .start()
            .await?;
        Ok(runtime)
    }

    fn command_sender(runtime: &MessagingRuntime) -> Result<CommandSender> {
        runtime
            .command_sender()
            .ok_or_else(|| CliError::RuntimeStopped("Runtime not started".to_string()))
    }

    async fn send(sender: &CommandSender, command: Command) -> Result<()> {
        sender
            .send(command)
            .await
            .map_err(|_| CliError::RuntimeStopped("Coordinator is no longer running".to_string()))
    }
}

/// Status changes after which no `ScanFinished` will follow
fn ends_scan(detail: &StatusDetail) -> bool {
    matches!(
        detail,
        StatusDetail::DiscoveryFailed { .. }
            | StatusDetail::RadioDisabled
            | StatusDetail::RadioUnsupported
            | StatusDetail::PermissionDenied
    )
}
