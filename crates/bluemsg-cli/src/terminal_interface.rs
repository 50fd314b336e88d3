//! Terminal Interface Implementation
//!
//! Line-oriented chat front end: app events from the coordinator are rendered
//! as text (or JSON lines), and input lines are parsed into commands. Plain
//! text is sent as a message; slash commands drive the connection.

use bluemsg_core::{
    internal::{AppEventReceiver, CommandSender, LogLevel, TaskId},
    AppEvent, BluemsgError, BluemsgResult, Command, ConnectionState, Message, PeerDevice,
};
use bluemsg_runtime::LoggerWrapper;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::CliConfig;

/// Messages kept for redraws
const MESSAGE_HISTORY_LIMIT: usize = 100;

pub const HELP_TEXT: &str = "\
Commands:
  /scan               discover nearby devices
  /stop               stop the scan in progress
  /peers              list discovered devices
  /connect <n|addr>   connect to device n from the list, or to an address
  /listen             wait for an inbound connection
  /discoverable [s]   stay visible to scans for s seconds
  /disconnect         close the current connection
  /status             show the current state
  /help               show this help
  /quit               exit
Anything else is sent as a message.";

// ----------------------------------------------------------------------------
// UI State Management
// ----------------------------------------------------------------------------

/// What the terminal knows about the coordinator
#[derive(Debug, Clone)]
pub struct UIState {
    pub connection: ConnectionState,
    pub status: String,
    pub peers: Vec<PeerDevice>,
    pub messages: Vec<Message>,
    pub stopped: bool,
}

impl Default for UIState {
    fn default() -> Self {
        Self {
            connection: ConnectionState::Idle,
            status: "Starting".to_string(),
            peers: Vec::new(),
            messages: Vec::new(),
            stopped: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Input Parsing
// ----------------------------------------------------------------------------

/// One parsed input line
#[derive(Debug, Clone, PartialEq)]
pub enum UserInput {
    Command(Command),
    ListPeers,
    Status,
    Help,
    Quit,
    Invalid(String),
    Empty,
}

/// Parse an input line against the currently listed peers
pub fn parse_input(line: &str, peers: &[PeerDevice]) -> UserInput {
    let line = line.trim();
    if line.is_empty() {
        return UserInput::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return UserInput::Command(Command::Send { text: line.to_string() });
    };

    let mut parts = rest.split_whitespace();
    let verb = parts.next().unwrap_or_default();
    let argument = parts.next();
    match verb {
        "scan" => UserInput::Command(Command::StartScan),
        "stop" => UserInput::Command(Command::CancelScan),
        "peers" => UserInput::ListPeers,
        "listen" => UserInput::Command(Command::StartListening),
        "disconnect" => UserInput::Command(Command::Disconnect),
        "status" => UserInput::Status,
        "help" => UserInput::Help,
        "quit" | "exit" => UserInput::Quit,
        "discoverable" => match argument.map(str::parse::<u64>) {
            None => UserInput::Command(Command::MakeDiscoverable { duration: None }),
            Some(Ok(seconds)) if seconds > 0 => UserInput::Command(Command::MakeDiscoverable {
                duration: Some(Duration::from_secs(seconds)),
            }),
            Some(_) => UserInput::Invalid("Usage: /discoverable [seconds]".to_string()),
        },
        "connect" => match argument {
            None => UserInput::Invalid("Usage: /connect <n|address>".to_string()),
            Some(target) => match target.parse::<usize>() {
                Ok(index) => match index.checked_sub(1).and_then(|i| peers.get(i)) {
                    Some(peer) => UserInput::Command(Command::Connect { peer: peer.clone() }),
                    None => UserInput::Invalid(format!("No device #{} in the list", index)),
                },
                Err(_) => UserInput::Command(Command::Connect {
                    peer: PeerDevice::new(target, None),
                }),
            },
        },
        other => UserInput::Invalid(format!("Unknown command: /{} (try /help)", other)),
    }
}

// ----------------------------------------------------------------------------
// Terminal Interface Task
// ----------------------------------------------------------------------------

/// Terminal interface task managing user input and display updates
pub struct TerminalInterfaceTask {
    state: UIState,
    command_sender: CommandSender,
    app_event_receiver: AppEventReceiver,
    logger: LoggerWrapper,
    config: CliConfig,
    running: bool,
}

impl TerminalInterfaceTask {
    pub fn new(
        command_sender: CommandSender,
        app_event_receiver: AppEventReceiver,
        logger: LoggerWrapper,
        config: CliConfig,
    ) -> Self {
        Self {
            state: UIState::default(),
            command_sender,
            app_event_receiver,
            logger,
            config,
            running: false,
        }
    }

    pub fn state(&self) -> &UIState {
        &self.state
    }

    /// Run against the process's stdin until `/quit` or the coordinator stops
    pub async fn run(&mut self) -> BluemsgResult<()> {
        self.run_with_input(BufReader::new(tokio::io::stdin())).await
    }

    pub async fn run_with_input<R>(&mut self, input: R) -> BluemsgResult<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.logger
            .log_task_event(TaskId::UI, LogLevel::Info, "Terminal interface starting");
        self.running = true;
        if !self.config.json_output {
            println!("Type /help for commands.");
            self.prompt();
        }

        let mut lines = input.lines();
        let mut input_open = true;
        while self.running {
            tokio::select! {
                app_event = self.app_event_receiver.recv() => match app_event {
                    Some(event) => self.display(event)?,
                    None => {
                        self.logger.log_task_event(TaskId::UI, LogLevel::Info, "App event channel closed");
                        break;
                    }
                },
                line = lines.next_line(), if input_open => match line
                    .map_err(|e| BluemsgError::channel_error(format!("Failed to read input: {}", e)))?
                {
                    Some(line) => {
                        self.handle_line(&line).await?;
                        self.prompt();
                    }
                    None => {
                        // End of input: keep rendering until the coordinator stops
                        input_open = false;
                        self.send(Command::Shutdown).await?;
                    }
                },
            }
        }

        self.running = false;
        self.logger
            .log_task_event(TaskId::UI, LogLevel::Info, "Terminal interface stopped");
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> BluemsgResult<()> {
        match parse_input(line, &self.state.peers) {
            UserInput::Command(command) => self.send(command).await?,
            UserInput::ListPeers => {
                for line in self.render_peers() {
                    println!("{}", line);
                }
            }
            UserInput::Status => println!("{} - {}", self.state.connection, self.state.status),
            UserInput::Help => println!("{}", HELP_TEXT),
            UserInput::Quit => self.send(Command::Shutdown).await?,
            UserInput::Invalid(reason) => println!("{}", reason),
            UserInput::Empty => {}
        }
        Ok(())
    }

    fn prompt(&self) {
        if !self.config.json_output {
            print!("{}", self.config.prompt);
            let _ = std::io::stdout().flush();
        }
    }

    async fn send(&self, command: Command) -> BluemsgResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| BluemsgError::channel_error("Coordinator is no longer running"))
    }

    fn display(&mut self, event: AppEvent) -> BluemsgResult<()> {
        if self.config.json_output {
            let json = serde_json::to_string(&event)
                .map_err(|e| BluemsgError::channel_error(format!("Failed to encode event: {}", e)))?;
            self.process_app_event(event);
            println!("{}", json);
        } else {
            for line in self.process_app_event(event) {
                println!("{}", line);
            }
        }
        if self.state.stopped {
            self.running = false;
        }
        Ok(())
    }

    /// Update the UI state and return the lines to print
    pub fn process_app_event(&mut self, event: AppEvent) -> Vec<String> {
        match event {
            AppEvent::StatusChanged { state, detail } => {
                self.state.connection = state;
                self.state.status = detail.to_string();
                vec![format!("* {}", self.state.status)]
            }
            AppEvent::PeerDiscovered { peer } => {
                self.state.peers.push(peer.clone());
                vec![format!("  {}. {} [{}]", self.state.peers.len(), peer.list_name(), peer.address)]
            }
            AppEvent::ScanFinished { count } => {
                vec![format!("* Scan finished: {} device(s). Use /connect <n> to connect.", count)]
            }
            AppEvent::MessageLogged { message } => {
                let line = self.render_message(&message);
                self.state.messages.push(message);
                if self.state.messages.len() > MESSAGE_HISTORY_LIMIT {
                    self.state.messages.remove(0);
                }
                vec![line]
            }
            AppEvent::Notification { text } => vec![format!("! {}", text)],
            AppEvent::Snapshot(snapshot) => {
                self.state.connection = snapshot.state;
                self.state.peers = snapshot.peers;
                self.state.messages = snapshot.messages;
                Vec::new()
            }
            AppEvent::Stopped => {
                self.state.stopped = true;
                vec!["* Stopped".to_string()]
            }
        }
    }

    fn render_message(&self, message: &Message) -> String {
        if self.config.show_timestamps {
            format!(
                "[{}] {}: {}",
                message.timestamp.time_of_day(),
                message.sender.name(),
                message.content
            )
        } else {
            format!("{}: {}", message.sender.name(), message.content)
        }
    }

    fn render_peers(&self) -> Vec<String> {
        if self.state.peers.is_empty() {
            return vec!["No devices found yet. Use /scan.".to_string()];
        }
        self.state
            .peers
            .iter()
            .enumerate()
            .map(|(i, peer)| format!("  {}. {} [{}]", i + 1, peer.list_name(), peer.address))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluemsg_core::{
        internal::{create_app_event_channel, create_command_channel, AppEventSender, CommandReceiver, NoOpLogger},
        ChannelConfig, Sender, StatusDetail, Timestamp,
    };

    fn terminal() -> (TerminalInterfaceTask, CommandReceiver, AppEventSender) {
        let config = ChannelConfig::testing();
        let (command_sender, command_receiver) = create_command_channel(&config);
        let (app_sender, app_events) = create_app_event_channel(&config);
        let cli = CliConfig {
            show_timestamps: false,
            ..CliConfig::default()
        };
        let task = TerminalInterfaceTask::new(command_sender, app_events, LoggerWrapper::NoOp(NoOpLogger), cli);
        (task, command_receiver, app_sender)
    }

    #[test]
    fn test_plain_text_becomes_a_message() {
        assert_eq!(
            parse_input("  hi there ", &[]),
            UserInput::Command(Command::Send {
                text: "hi there".to_string()
            })
        );
        assert_eq!(parse_input("   ", &[]), UserInput::Empty);
    }

    #[test]
    fn test_connect_by_index_and_address() {
        let peers = vec![
            PeerDevice::named("10.0.0.2:4000", "Alice"),
            PeerDevice::new("10.0.0.3:4000", None),
        ];
        assert_eq!(
            parse_input("/connect 2", &peers),
            UserInput::Command(Command::Connect { peer: peers[1].clone() })
        );
        assert!(matches!(parse_input("/connect 3", &peers), UserInput::Invalid(_)));
        assert!(matches!(parse_input("/connect 0", &peers), UserInput::Invalid(_)));
        assert_eq!(
            parse_input("/connect 00:11:22:33:44:55", &peers),
            UserInput::Command(Command::Connect {
                peer: PeerDevice::new("00:11:22:33:44:55", None)
            })
        );
    }

    #[test]
    fn test_slash_commands() {
        assert_eq!(parse_input("/scan", &[]), UserInput::Command(Command::StartScan));
        assert_eq!(parse_input("/stop", &[]), UserInput::Command(Command::CancelScan));
        assert_eq!(parse_input("/disconnect", &[]), UserInput::Command(Command::Disconnect));
        assert_eq!(
            parse_input("/discoverable 60", &[]),
            UserInput::Command(Command::MakeDiscoverable {
                duration: Some(Duration::from_secs(60))
            })
        );
        assert!(matches!(parse_input("/discoverable soon", &[]), UserInput::Invalid(_)));
        assert_eq!(parse_input("/quit", &[]), UserInput::Quit);
        assert!(matches!(parse_input("/dance", &[]), UserInput::Invalid(_)));
    }

    #[test]
    fn test_events_update_state_and_render() {
        let (mut terminal, _commands, _app_events) = terminal();

        let lines = terminal.process_app_event(AppEvent::StatusChanged {
            state: ConnectionState::Listening,
            detail: StatusDetail::Ready,
        });
        assert_eq!(lines, vec!["* Bluetooth enabled - Ready to connect".to_string()]);
        assert_eq!(terminal.state().connection, ConnectionState::Listening);

        let lines = terminal.process_app_event(AppEvent::PeerDiscovered {
            peer: PeerDevice::named("10.0.0.2:4000", "Alice"),
        });
        assert_eq!(lines, vec!["  1. Alice [10.0.0.2:4000]".to_string()]);

        let lines = terminal.process_app_event(AppEvent::MessageLogged {
            message: Message {
                sender: Sender::Remote("Alice".to_string()),
                content: "hello".to_string(),
                timestamp: Timestamp::new(0),
            },
        });
        assert_eq!(lines, vec!["Alice: hello".to_string()]);
        assert_eq!(terminal.state().messages.len(), 1);

        terminal.process_app_event(AppEvent::Stopped);
        assert!(terminal.state().stopped);
    }

    #[tokio::test]
    async fn test_stopped_event_ends_the_loop() {
        let (mut terminal, _commands, app_events) = terminal();
        app_events.send(AppEvent::Stopped).await.unwrap();

        // Input that never yields a line
        let (_writer, reader) = tokio::io::duplex(64);
        let run = tokio::time::timeout(Duration::from_secs(1), terminal.run_with_input(BufReader::new(reader))).await;
        assert!(matches!(run, Ok(Ok(()))));
        assert!(terminal.state().stopped);
    }

    #[tokio::test]
    async fn test_input_lines_reach_the_coordinator() {
        let (mut terminal, mut commands, _app_events) = terminal();
        let input: &[u8] = b"/scan\nhello\n";

        // End of input asks the coordinator to shut down; nothing answers here
        let run = tokio::time::timeout(Duration::from_millis(200), terminal.run_with_input(input)).await;
        assert!(run.is_err(), "runs until the coordinator stops");

        assert_eq!(commands.recv().await, Some(Command::StartScan));
        assert_eq!(
            commands.recv().await,
            Some(Command::Send {
                text: "hello".to_string()
            })
        );
        assert_eq!(commands.recv().await, Some(Command::Shutdown));
    }
}
