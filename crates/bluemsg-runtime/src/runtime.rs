//! BlueMsg Runtime
//!
//! Owns the coordinator task and the channels that connect it to the outside
//! world. Applications (CLI, tests, the demo) pick a radio, start the runtime,
//! then talk to it exclusively through `Command`s and `AppEvent`s.
//!
//! ```rust,no_run
//! use bluemsg_core::{AlwaysReady, BluemsgConfig, Command, Radio};
//! use bluemsg_runtime::MessagingRuntime;
//! use std::sync::Arc;
//!
//! # async fn run(radio: Arc<dyn Radio>) -> bluemsg_core::BluemsgResult<()> {
//! let mut runtime = MessagingRuntime::new(radio, Arc::new(AlwaysReady), BluemsgConfig::default());
//! runtime.start().await?;
//! let mut app_events = runtime.take_app_event_receiver().expect("receiver taken once");
//!
//! runtime.send_command(Command::StartScan).await?;
//! while let Some(event) = app_events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

use crate::logic::{CoordinatorTask, LoggerWrapper};
use crate::workers::WorkerContext;
use bluemsg_core::{
    internal::{
        create_app_event_channel, create_command_channel, create_event_channel, AppEventReceiver, CommandSender,
        LogLevel, TaskId,
    },
    AlwaysReady, BluemsgConfig, BluemsgError, BluemsgResult, Capabilities, Command, Radio,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long `stop` waits for the coordinator to wind down before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Messaging Runtime
// ----------------------------------------------------------------------------

/// Runtime hosting one coordinator bound to one radio
pub struct MessagingRuntime {
    /// Configuration for the coordinator and its channels
    config: BluemsgConfig,
    /// Radio backend used by every worker
    radio: Arc<dyn Radio>,
    /// Platform capability checks
    capabilities: Arc<dyn Capabilities>,
    /// Logger wrapper
    logger: LoggerWrapper,
    /// Coordinator task handle
    coordinator_handle: Option<JoinHandle<BluemsgResult<()>>>,
    /// Command sender for external use
    command_sender: Option<CommandSender>,
    /// App event receiver for external use
    app_event_receiver: Option<AppEventReceiver>,
    /// Running state
    running: bool,
}

impl MessagingRuntime {
    /// Create a runtime; nothing runs until `start`
    pub fn new(radio: Arc<dyn Radio>, capabilities: Arc<dyn Capabilities>, config: BluemsgConfig) -> Self {
        Self {
            config,
            radio,
            capabilities,
            logger: LoggerWrapper::default(),
            coordinator_handle: None,
            command_sender: None,
            app_event_receiver: None,
            running: false,
        }
    }

    /// Create a runtime with short timeouts and an always-ready radio
    pub fn for_testing(radio: Arc<dyn Radio>) -> Self {
        Self::new(radio, Arc::new(AlwaysReady), BluemsgConfig::testing())
    }

    /// Replace the task logger
    pub fn with_logger(mut self, logger: LoggerWrapper) -> Self {
        self.logger = logger;
        self
    }

    /// Validate the configuration, create channels and spawn the coordinator
    pub async fn start(&mut self) -> BluemsgResult<()> {
        if self.running {
            return Err(BluemsgError::config_error("Runtime already running"));
        }

        self.config.validate()?;

        let (command_sender, command_receiver) = create_command_channel(&self.config.channels);
        let (event_sender, event_receiver) = create_event_channel(&self.config.channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&self.config.channels);

        let ctx = WorkerContext::new(
            self.radio.clone(),
            self.capabilities.clone(),
            event_sender,
            self.config.coordinator.clone(),
        );
        let mut coordinator =
            CoordinatorTask::new(ctx, command_receiver, event_receiver, app_event_sender, self.logger.clone());

        self.coordinator_handle = Some(tokio::spawn(async move { coordinator.run().await }));
        self.command_sender = Some(command_sender);
        self.app_event_receiver = Some(app_event_receiver);
        self.running = true;

        self.logger.log_task_event(
            TaskId::Coordinator,
            LogLevel::Info,
            &format!("BlueMsg runtime started on {} radio", self.radio.radio_kind()),
        );
        Ok(())
    }

    /// Shut the coordinator down, aborting it if it does not stop in time
    pub async fn stop(&mut self) -> BluemsgResult<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;

        if let Some(sender) = self.command_sender.take() {
            let _ = sender.send(Command::Shutdown).await;
        }

        if let Some(mut handle) = self.coordinator_handle.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(result)) => result?,
                Ok(Err(e)) => warn!("Coordinator task ended abnormally: {}", e),
                Err(_) => {
                    warn!("Coordinator did not stop within {:?}; aborting", SHUTDOWN_GRACE);
                    handle.abort();
                }
            }
        }

        info!("BlueMsg runtime stopped");
        Ok(())
    }

    /// Wait for the coordinator to end on its own (after `Shutdown` or a fatal error)
    pub async fn wait(&mut self) -> BluemsgResult<()> {
        let Some(handle) = self.coordinator_handle.take() else {
            return Ok(());
        };
        self.running = false;
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(BluemsgError::channel_error(format!("Coordinator task panicked: {}", e))),
        }
    }

    /// Get a command sender for external use
    pub fn command_sender(&self) -> Option<CommandSender> {
        self.command_sender.clone()
    }

    /// Send a command to the coordinator
    pub async fn send_command(&self, command: Command) -> BluemsgResult<()> {
        let sender = self
            .command_sender
            .as_ref()
            .ok_or_else(|| BluemsgError::channel_error("Runtime not started"))?;
        sender
            .send(command)
            .await
            .map_err(|_| BluemsgError::channel_error("Failed to send command to coordinator"))
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Whether the coordinator task is alive
    pub fn is_running(&self) -> bool {
        self.running
            && self
                .coordinator_handle
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    pub fn config(&self) -> &BluemsgConfig {
        &self.config
    }

    pub fn radio(&self) -> &Arc<dyn Radio> {
        &self.radio
    }
}

impl Drop for MessagingRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.coordinator_handle.take() {
            // Dropping the coordinator's state cancels every worker
            handle.abort();
        }
    }
}
