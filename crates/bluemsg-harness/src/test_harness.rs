//! High-Level Test Harness
//!
//! Wraps the command sender and app event receiver of one running
//! coordinator. Every event received is kept in a history so scenarios can
//! assert on what happened as well as wait for what should happen next.

use bluemsg_core::{
    internal::{AppEventReceiver, CommandSender},
    AppEvent, BluemsgError, BluemsgResult, Command, ConnectionState, StatusDetail,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default wait for an expected event
pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives one coordinator through its public channels
pub struct TestHarness {
    command_sender: CommandSender,
    app_events: AppEventReceiver,
    history: Vec<AppEvent>,
    label: String,
}

impl TestHarness {
    /// Attach to a started coordinator
    pub fn attach<L: Into<String>>(label: L, command_sender: CommandSender, app_events: AppEventReceiver) -> Self {
        Self {
            command_sender,
            app_events,
            history: Vec::new(),
            label: label.into(),
        }
    }

    /// Send a command to the coordinator
    pub async fn send(&self, command: Command) -> BluemsgResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|e| BluemsgError::channel_error(format!("{}: failed to send command: {}", self.label, e)))
    }

    /// Next event within `timeout`, recorded in the history
    pub async fn next_event(&mut self, timeout: Duration) -> Option<AppEvent> {
        let event = tokio::time::timeout(timeout, self.app_events.recv()).await.ok().flatten()?;
        debug!("{} <- {:?}", self.label, event);
        self.history.push(event.clone());
        Some(event)
    }

    /// Wait for the first event matching `predicate`, skipping others
    pub async fn expect<F>(&mut self, description: &str, predicate: F) -> BluemsgResult<AppEvent>
    where
        F: Fn(&AppEvent) -> bool,
    {
        self.expect_within(description, DEFAULT_EXPECT_TIMEOUT, predicate).await
    }

    pub async fn expect_within<F>(&mut self, description: &str, timeout: Duration, predicate: F) -> BluemsgResult<AppEvent>
    where
        F: Fn(&AppEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_event(remaining).await {
                Some(event) if predicate(&event) => return Ok(event),
                Some(_) => continue,
                None => {
                    return Err(BluemsgError::channel_error(format!(
                        "{}: timed out waiting for {}",
                        self.label, description
                    )))
                }
            }
        }
    }

    /// Wait for a status change into `state`
    pub async fn expect_state(&mut self, state: ConnectionState) -> BluemsgResult<StatusDetail> {
        let description = format!("state {}", state);
        match self
            .expect(&description, |event| matches!(event, AppEvent::StatusChanged { state: s, .. } if *s == state))
            .await?
        {
            AppEvent::StatusChanged { detail, .. } => Ok(detail),
            _ => Err(BluemsgError::channel_error(format!("{}: unexpected event", self.label))),
        }
    }

    /// Wait for a status change carrying `detail`
    pub async fn expect_status(&mut self, detail: StatusDetail) -> BluemsgResult<ConnectionState> {
        let description = format!("status \"{}\"", detail);
        match self
            .expect(&description, |event| matches!(event, AppEvent::StatusChanged { detail: d, .. } if *d == detail))
            .await?
        {
            AppEvent::StatusChanged { state, .. } => Ok(state),
            _ => Err(BluemsgError::channel_error(format!("{}: unexpected event", self.label))),
        }
    }

    /// Collect events until none arrives for `quiet`
    pub async fn settle(&mut self, quiet: Duration) -> Vec<AppEvent> {
        let mut collected = Vec::new();
        while let Some(event) = self.next_event(quiet).await {
            collected.push(event);
        }
        collected
    }

    /// Request a snapshot and wait for it
    pub async fn snapshot(&mut self) -> BluemsgResult<bluemsg_core::Snapshot> {
        self.send(Command::GetSnapshot).await?;
        match self.expect("snapshot", |event| matches!(event, AppEvent::Snapshot(_))).await? {
            AppEvent::Snapshot(snapshot) => Ok(snapshot),
            _ => Err(BluemsgError::channel_error(format!("{}: unexpected event", self.label))),
        }
    }

    /// Every event received so far
    pub fn history(&self) -> &[AppEvent] {
        &self.history
    }

    /// Number of received events matching `predicate`
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&AppEvent) -> bool,
    {
        self.history.iter().filter(|event| predicate(event)).count()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluemsg_core::{internal::create_app_event_channel, internal::create_command_channel, ChannelConfig};

    #[tokio::test]
    async fn test_expect_skips_unrelated_events() {
        let config = ChannelConfig::testing();
        let (command_sender, _command_receiver) = create_command_channel(&config);
        let (app_sender, app_events) = create_app_event_channel(&config);
        let mut harness = TestHarness::attach("unit", command_sender, app_events);

        app_sender.send(AppEvent::Notification { text: "noise".into() }).await.unwrap();
        app_sender
            .send(AppEvent::StatusChanged {
                state: ConnectionState::Listening,
                detail: StatusDetail::Ready,
            })
            .await
            .unwrap();

        let detail = harness.expect_state(ConnectionState::Listening).await.unwrap();
        assert_eq!(detail, StatusDetail::Ready);
        assert_eq!(harness.history().len(), 2);
        assert_eq!(harness.count(|e| matches!(e, AppEvent::Notification { .. })), 1);
    }

    #[tokio::test]
    async fn test_expect_times_out() {
        let config = ChannelConfig::testing();
        let (command_sender, _command_receiver) = create_command_channel(&config);
        let (_app_sender, app_events) = create_app_event_channel(&config);
        let mut harness = TestHarness::attach("unit", command_sender, app_events);

        let result = harness
            .expect_within("anything", Duration::from_millis(50), |_| true)
            .await;
        assert!(result.is_err());
    }
}
