//! Coordinator Task Implementation
//!
//! Contains the CoordinatorTask struct and its select loop.

use super::handlers::CoordinatorHandlers;
use super::state::{CoordinatorState, CoordinatorStats, LoggerWrapper};
use crate::workers::WorkerContext;
use bluemsg_core::{
    internal::{AppEventSender, AuditEntry, CommandReceiver, EventReceiver, LogLevel, TaskId},
    BluemsgError, BluemsgResult, Command, ConnectionState, Event,
};
use tracing::{debug, error, info, warn};

// ----------------------------------------------------------------------------
// Coordinator Task
// ----------------------------------------------------------------------------

/// The task that owns all connection state and processes every command and event
pub struct CoordinatorTask {
    /// Connection state, peers, messages and live workers
    state: CoordinatorState,
    /// Shared context handed to every worker
    ctx: WorkerContext,
    /// Channel for receiving commands from the UI
    command_receiver: CommandReceiver,
    /// Channel for receiving events from workers
    event_receiver: EventReceiver,
    /// Channel for sending app events to the UI
    app_event_sender: AppEventSender,
    /// Logger for task communication (using enum for object safety)
    logger: LoggerWrapper,
    /// Whether the task should continue running
    running: bool,
}

impl CoordinatorTask {
    /// Create a new coordinator task
    ///
    /// `ctx.event_sender` must feed `event_receiver`.
    pub fn new(
        ctx: WorkerContext,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        app_event_sender: AppEventSender,
        logger: LoggerWrapper,
    ) -> Self {
        Self {
            state: CoordinatorState::new(),
            ctx,
            command_receiver,
            event_receiver,
            app_event_sender,
            logger,
            running: true,
        }
    }

    /// Run the coordinator loop until shutdown
    pub async fn run(&mut self) -> BluemsgResult<()> {
        self.logger.log_task_event(
            TaskId::Coordinator,
            LogLevel::Info,
            &format!("Coordinator starting on {} radio", self.ctx.radio.radio_kind()),
        );

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(cmd) => {
                            self.logger.log_receive_command(TaskId::UI, TaskId::Coordinator, &cmd);
                            let result = self.process_command(cmd).await;
                            self.flush_app_events().await;
                            if let Err(e) = result {
                                self.handle_error("command", e).await;
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            self.shutdown().await;
                        }
                    }
                }

                event = self.event_receiver.recv() => {
                    match event {
                        Some(evt) => {
                            self.logger.log_receive_event(TaskId::of_event(&evt), TaskId::Coordinator, &evt);
                            let result = self.process_event(evt).await;
                            self.flush_app_events().await;
                            if let Err(e) = result {
                                self.handle_error("event", e).await;
                            }
                        }
                        None => {
                            // The context holds a sender, so this only happens after teardown
                            debug!("Event channel closed");
                        }
                    }
                }
            }
        }

        self.logger.log_task_event(
            TaskId::Coordinator,
            LogLevel::Info,
            &format!(
                "Coordinator stopped after {} commands and {} events",
                self.state.stats.commands_processed, self.state.stats.events_processed
            ),
        );

        Ok(())
    }

    /// Stop the loop after the current message
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.state.stats
    }

    pub fn audit_trail(&self) -> &[AuditEntry] {
        &self.state.audit_trail
    }

    async fn process_command(&mut self, command: Command) -> BluemsgResult<()> {
        self.state.stats.commands_processed += 1;
        let state = &mut self.state;
        let ctx = &self.ctx;

        match command {
            Command::StartListening => CoordinatorHandlers::handle_start_listening(state, ctx, true).await,
            Command::StartScan => CoordinatorHandlers::handle_start_scan(state, ctx).await,
            Command::CancelScan => CoordinatorHandlers::handle_cancel_scan(state, ctx).await,
            Command::Connect { peer } => CoordinatorHandlers::handle_connect(state, ctx, peer).await,
            Command::Send { text } => CoordinatorHandlers::handle_send(state, ctx, text).await,
            Command::Disconnect => CoordinatorHandlers::handle_disconnect(state, ctx).await,
            Command::MakeDiscoverable { duration } => {
                CoordinatorHandlers::handle_make_discoverable(state, ctx, duration).await
            }
            Command::GetSnapshot => CoordinatorHandlers::handle_get_snapshot(state),
            Command::Shutdown => {
                self.running = false;
                CoordinatorHandlers::handle_shutdown(state, ctx).await
            }
        }
    }

    async fn process_event(&mut self, event: Event) -> BluemsgResult<()> {
        self.state.stats.events_processed += 1;
        let state = &mut self.state;
        let ctx = &self.ctx;

        match event {
            Event::PeerFound { scan_id, peer } => CoordinatorHandlers::handle_peer_found(state, scan_id, peer),
            Event::ScanFinished { scan_id } => CoordinatorHandlers::handle_scan_finished(state, scan_id),
            Event::ScanFailed { scan_id, error } => CoordinatorHandlers::handle_scan_failed(state, scan_id, error),
            Event::ListenerAccepted {
                listener_id,
                connection,
            } => CoordinatorHandlers::handle_listener_accepted(state, ctx, listener_id, connection).await,
            Event::ListenerFailed { listener_id, error } => {
                CoordinatorHandlers::handle_listener_failed(state, listener_id, error)
            }
            Event::InitiatorSucceeded {
                attempt_id,
                connection,
            } => CoordinatorHandlers::handle_initiator_succeeded(state, ctx, attempt_id, connection).await,
            Event::InitiatorFailed {
                attempt_id,
                peer,
                error,
            } => CoordinatorHandlers::handle_initiator_failed(state, attempt_id, peer, error),
            Event::MessageReceived { session_id, content } => {
                CoordinatorHandlers::handle_message_received(state, session_id, content)
            }
            Event::SessionDisconnected { session_id, reason } => {
                CoordinatorHandlers::handle_session_disconnected(state, ctx, session_id, reason).await
            }
        }
    }

    /// Unrecoverable errors end the coordinator; everything else is logged
    async fn handle_error(&mut self, source: &str, e: BluemsgError) {
        match e {
            BluemsgError::Transport(ref transport) if transport.is_fatal() => {
                error!("Radio unusable while processing {}, shutting down: {}", source, e);
                self.shutdown().await;
            }
            BluemsgError::Channel { .. } | BluemsgError::Configuration { .. } => {
                error!("Unrecoverable error processing {}, shutting down: {}", source, e);
                self.shutdown().await;
            }
            BluemsgError::StateTransition(_) => {
                warn!("Dropping {}: {}", source, e);
            }
            _ => {
                error!("Error processing {}: {}", source, e);
            }
        }
    }

    async fn shutdown(&mut self) {
        self.running = false;
        if let Err(e) = CoordinatorHandlers::handle_shutdown(&mut self.state, &self.ctx).await {
            warn!("Shutdown incomplete: {}", e);
        }
        self.flush_app_events().await;
    }

    /// Deliver queued app events to the UI in order
    async fn flush_app_events(&mut self) {
        let events = std::mem::take(&mut self.state.outbox);
        for app_event in events {
            self.logger.log_send_app_event(TaskId::Coordinator, TaskId::UI, &app_event);
            self.state.stats.app_events_generated += 1;
            if self.app_event_sender.send(app_event).await.is_err() {
                debug!("UI has gone away; app event dropped");
            }
        }
    }
}
