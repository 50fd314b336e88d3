//! Two simulated devices chatting over an in-memory radio
//!
//! Alice listens and makes herself discoverable, Bob scans, connects and the
//! two trade a message each before Bob hangs up. No radio hardware is touched.

use std::sync::Arc;
use std::time::Duration;

use bluemsg_core::{internal::AppEventReceiver, BluemsgConfig, Command, ConnectionState, Sender, StatusDetail};
use bluemsg_harness::{SimCapabilities, SimulatedAir};
use bluemsg_runtime::{AppEvent, MessagingRuntime, RuntimeBuilder};
use tracing::debug;

use crate::config::CliConfig;
use crate::error::{CliError, Result};

const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// One simulated participant
struct DemoNode {
    label: &'static str,
    runtime: MessagingRuntime,
    events: AppEventReceiver,
    json: bool,
}

impl DemoNode {
    async fn start(air: &SimulatedAir, label: &'static str, config: &BluemsgConfig, json: bool) -> Result<Self> {
        let radio = air.add_device(Some(label));
        let mut runtime = RuntimeBuilder::new(Arc::new(radio))
            .with_capabilities(Arc::new(SimCapabilities::new()))
            .with_config(config.clone())
            .with_no_logging()
            .start()
            .await?;
        let events = runtime
            .take_app_event_receiver()
            .ok_or_else(|| CliError::RuntimeStopped(format!("{} has no app events", label)))?;
        Ok(Self {
            label,
            runtime,
            events,
            json,
        })
    }

    async fn send(&self, command: Command) -> Result<()> {
        debug!("{} <- {:?}", self.label, command);
        Ok(self.runtime.send_command(command).await?)
    }

    /// Print events until one matches
    async fn wait_for<F>(&mut self, description: &str, predicate: F) -> Result<AppEvent>
    where
        F: Fn(&AppEvent) -> bool,
    {
        let deadline = tokio::time::Instant::now() + STEP_TIMEOUT;
        loop {
            let event = tokio::time::timeout_at(deadline, self.events.recv())
                .await
                .map_err(|_| CliError::RuntimeStopped(format!("{} timed out waiting for {}", self.label, description)))?
                .ok_or_else(|| CliError::RuntimeStopped(format!("{} stopped before {}", self.label, description)))?;
            self.print(&event)?;
            if predicate(&event) {
                return Ok(event);
            }
        }
    }

    async fn wait_for_state(&mut self, state: ConnectionState) -> Result<()> {
        let description = format!("state {}", state);
        self.wait_for(&description, |event| {
            matches!(event, AppEvent::StatusChanged { state: s, .. } if *s == state)
        })
        .await?;
        Ok(())
    }

    fn print(&self, event: &AppEvent) -> Result<()> {
        if self.json {
            println!("{{\"node\":\"{}\",\"event\":{}}}", self.label, serde_json::to_string(event)?);
            return Ok(());
        }
        let line = match event {
            AppEvent::StatusChanged { detail, .. } => format!("* {}", detail),
            AppEvent::PeerDiscovered { peer } => format!("found {} [{}]", peer.list_name(), peer.address),
            AppEvent::ScanFinished { count } => format!("scan finished: {} device(s)", count),
            AppEvent::MessageLogged { message } => message.to_string(),
            AppEvent::Notification { text } => format!("! {}", text),
            AppEvent::Snapshot(_) => return Ok(()),
            AppEvent::Stopped => "* Stopped".to_string(),
        };
        println!("{:>6} | {}", self.label, line);
        Ok(())
    }
}

/// Run the scripted two-device conversation
pub async fn run_demo(cli: CliConfig) -> Result<()> {
    let config = BluemsgConfig::default();
    let air = SimulatedAir::new();
    let mut alice = DemoNode::start(&air, "Alice", &config, cli.json_output).await?;
    let mut bob = DemoNode::start(&air, "Bob", &config, cli.json_output).await?;

    alice.send(Command::StartListening).await?;
    alice.wait_for_state(ConnectionState::Listening).await?;
    alice
        .send(Command::MakeDiscoverable {
            duration: Some(Duration::from_secs(60)),
        })
        .await?;
    alice
        .wait_for("discoverability", |event| {
            matches!(
                event,
                AppEvent::StatusChanged {
                    detail: StatusDetail::Discoverable { .. },
                    ..
                }
            )
        })
        .await?;

    bob.send(Command::StartScan).await?;
    let found = bob
        .wait_for("Alice in the scan", |event| {
            matches!(event, AppEvent::PeerDiscovered { peer } if peer.display_name.as_deref() == Some("Alice"))
        })
        .await?;
    let AppEvent::PeerDiscovered { peer } = found else {
        return Err(CliError::RuntimeStopped("unexpected scan result".to_string()));
    };

    bob.send(Command::Connect { peer }).await?;
    bob.wait_for_state(ConnectionState::Connected).await?;
    alice.wait_for_state(ConnectionState::Connected).await?;

    bob.send(Command::Send {
        text: "Hi Alice, it's Bob".to_string(),
    })
    .await?;
    alice.wait_for("Bob's message", is_remote_message).await?;

    alice.send(Command::Send {
        text: "Hello Bob!".to_string(),
    })
    .await?;
    bob.wait_for("Alice's reply", is_remote_message).await?;

    bob.send(Command::Disconnect).await?;
    alice
        .wait_for("the hang-up", |event| {
            matches!(
                event,
                AppEvent::StatusChanged {
                    detail: StatusDetail::Disconnected,
                    ..
                }
            )
        })
        .await?;

    alice.runtime.stop().await?;
    bob.runtime.stop().await?;
    Ok(())
}

fn is_remote_message(event: &AppEvent) -> bool {
    matches!(
        event,
        AppEvent::MessageLogged { message } if matches!(message.sender, Sender::Remote(_))
    )
}
