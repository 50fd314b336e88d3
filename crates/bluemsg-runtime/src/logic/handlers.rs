//! Coordinator Command and Event Handlers
//!
//! Every handler runs on the coordinator task with exclusive access to
//! `CoordinatorState`. Handlers queue `AppEvent`s on the state's outbox;
//! the task delivers them after the handler returns, even on error.

use super::state::CoordinatorState;
use crate::workers::{
    discard_connection, InitiatorHandle, ListenerHandle, ScanHandle, SessionHandle, WorkerContext,
};
use bluemsg_core::{
    AppEvent, BluemsgResult, ConnectionEvent, ConnectionState, Message, PeerDevice, RadioConnection,
    RadioReadiness, StateTransitionError, StatusDetail, Timestamp, TransportError, WorkerId,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Command and event handlers for the coordinator task
pub struct CoordinatorHandlers;

impl CoordinatorHandlers {
    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Register the service and wait for an inbound connection
    pub async fn handle_start_listening(
        state: &mut CoordinatorState,
        ctx: &WorkerContext,
        user_initiated: bool,
    ) -> BluemsgResult<()> {
        if state.listener_live() {
            debug!("Listener already running");
            return Ok(());
        }
        if let Err(err) = state.check(ConnectionEvent::StartListening) {
            Self::reject(state, "listen", err);
            return Ok(());
        }
        if !Self::radio_ready(state, ctx, user_initiated).await? {
            return Ok(());
        }

        let listener_id = state.next_worker_id();
        match ListenerHandle::start(ctx, listener_id).await {
            Ok(listener) => {
                state.listener = Some(listener);
                if state.apply(ConnectionEvent::StartListening)? {
                    state.emit_status(StatusDetail::Ready);
                }
                Ok(())
            }
            Err(error) => {
                warn!("Unable to listen: {}", error);
                state.emit_status(Self::radio_detail(&error, |reason| StatusDetail::ListenFailed { reason }));
                if user_initiated {
                    state.notify(format!("Unable to listen: {}", error));
                }
                Self::fail_if_fatal(error)
            }
        }
    }

    /// Start a fresh scan, replacing any scan in progress
    pub async fn handle_start_scan(state: &mut CoordinatorState, ctx: &WorkerContext) -> BluemsgResult<()> {
        if let Err(err) = state.check(ConnectionEvent::ScanRequested) {
            Self::reject(state, "scan", err);
            return Ok(());
        }
        if !Self::radio_ready(state, ctx, true).await? {
            return Ok(());
        }

        // A superseded scan ends silently; the new one reports for both
        Self::stop_scan(state, ctx, false).await;
        state.peers.clear();

        let scan_id = state.next_worker_id();
        state.scan = Some(ScanHandle::start(ctx, scan_id, ctx.config.scan_window));
        state.apply(ConnectionEvent::ScanRequested)?;
        info!("Scan {} started for {:?}", scan_id, ctx.config.scan_window);
        state.emit_status(StatusDetail::Discovering);
        Ok(())
    }

    /// Stop the scan in progress, if any
    pub async fn handle_cancel_scan(state: &mut CoordinatorState, ctx: &WorkerContext) -> BluemsgResult<()> {
        if state.scan.is_none() {
            debug!("No scan to cancel");
            return Ok(());
        }
        Self::stop_scan(state, ctx, true).await;
        if state.apply(ConnectionEvent::ScanEnded)? {
            let found = state.peers.len();
            state.emit_status(StatusDetail::DiscoveryFinished { found });
        }
        Ok(())
    }

    /// Start an outbound attempt, superseding any attempt in flight
    pub async fn handle_connect(
        state: &mut CoordinatorState,
        ctx: &WorkerContext,
        peer: PeerDevice,
    ) -> BluemsgResult<()> {
        if let Err(err) = state.check(ConnectionEvent::ConnectRequested) {
            Self::reject(state, "connect", err);
            return Ok(());
        }
        if !Self::radio_ready(state, ctx, true).await? {
            return Ok(());
        }

        Self::stop_scan(state, ctx, true).await;
        if let Some(previous) = state.initiator.take() {
            debug!("Attempt {} superseded", previous.id());
            previous.cancel();
        }

        let attempt_id = state.next_worker_id();
        let peer_name = peer.status_name().to_string();
        state.initiator = Some(InitiatorHandle::connect(ctx, attempt_id, peer).await);
        state.apply(ConnectionEvent::ConnectRequested)?;
        state.emit_status(StatusDetail::Connecting { peer_name });
        Ok(())
    }

    /// Write one message to the live session
    pub async fn handle_send(state: &mut CoordinatorState, ctx: &WorkerContext, text: String) -> BluemsgResult<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if !state.connection.can_send_messages() {
            debug!("Send ignored while {}", state.connection);
            return Ok(());
        }
        let Some(session) = state.session.as_mut() else {
            debug!("Send ignored: no session");
            return Ok(());
        };

        match session.send(text, ctx.config.write_timeout).await {
            Ok(()) => {
                state.stats.messages_sent += 1;
                let message = state.messages.append(Message::local(text, Timestamp::now())).clone();
                state.emit(AppEvent::MessageLogged { message });
            }
            Err(error) => {
                warn!("Failed to send message: {}", error);
                state.emit_status(StatusDetail::SendFailed {
                    reason: error.to_string(),
                });
                state.notify(format!("Failed to send message: {}", error));
            }
        }
        Ok(())
    }

    /// Close the live session on request
    pub async fn handle_disconnect(state: &mut CoordinatorState, ctx: &WorkerContext) -> BluemsgResult<()> {
        if let Err(err) = state.check(ConnectionEvent::DisconnectRequested) {
            Self::reject(state, "disconnect", err);
            return Ok(());
        }

        state.apply(ConnectionEvent::DisconnectRequested)?;
        state.emit_status(StatusDetail::Disconnecting);
        if let Some(mut session) = state.session.take() {
            session.close(ctx.config.write_timeout).await;
        }
        state.apply(ConnectionEvent::SessionEnded)?;
        state.emit_status(StatusDetail::Disconnected);
        Self::relisten(state, ctx).await
    }

    /// Make this device visible to scans
    pub async fn handle_make_discoverable(
        state: &mut CoordinatorState,
        ctx: &WorkerContext,
        duration: Option<Duration>,
    ) -> BluemsgResult<()> {
        if !Self::radio_ready(state, ctx, true).await? {
            return Ok(());
        }

        let duration = duration.unwrap_or(ctx.config.discoverable_duration);
        match ctx.radio.set_discoverable(duration).await {
            Ok(()) => {
                let detail = StatusDetail::Discoverable {
                    seconds: duration.as_secs(),
                };
                let text = detail.to_string();
                state.emit_status(detail);
                state.notify(text);
                Ok(())
            }
            Err(error) => {
                warn!("Unable to make device discoverable: {}", error);
                state.emit_status(Self::radio_detail(&error, |reason| StatusDetail::ConnectionFailed { reason }));
                state.notify(format!("Unable to make device discoverable: {}", error));
                Self::fail_if_fatal(error)
            }
        }
    }

    /// Answer with the current state, peers and message log
    pub fn handle_get_snapshot(state: &mut CoordinatorState) -> BluemsgResult<()> {
        let snapshot = state.snapshot();
        state.emit(AppEvent::Snapshot(snapshot));
        Ok(())
    }

    /// Cancel every worker and close the session
    pub async fn handle_shutdown(state: &mut CoordinatorState, ctx: &WorkerContext) -> BluemsgResult<()> {
        Self::stop_scan(state, ctx, false).await;
        if let Some(listener) = state.listener.take() {
            listener.cancel();
        }
        if let Some(initiator) = state.initiator.take() {
            initiator.cancel();
        }
        if let Some(mut session) = state.session.take() {
            session.close(ctx.config.write_timeout).await;
        }
        state.apply(ConnectionEvent::Shutdown)?;
        state.emit_status(StatusDetail::Stopped);
        state.emit(AppEvent::Stopped);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Scanner events
    // ------------------------------------------------------------------------

    pub fn handle_peer_found(state: &mut CoordinatorState, scan_id: WorkerId, peer: PeerDevice) -> BluemsgResult<()> {
        if !Self::is_current_scan(state, scan_id) {
            state.stats.stale_events += 1;
            return Ok(());
        }
        if state.peers.insert(peer.clone()) {
            debug!("Discovered {}", peer);
            state.emit(AppEvent::PeerDiscovered { peer });
        }
        Ok(())
    }

    pub fn handle_scan_finished(state: &mut CoordinatorState, scan_id: WorkerId) -> BluemsgResult<()> {
        if !Self::is_current_scan(state, scan_id) {
            state.stats.stale_events += 1;
            return Ok(());
        }
        state.scan = None;
        let found = state.peers.len();
        state.emit(AppEvent::ScanFinished { count: found });
        if state.apply(ConnectionEvent::ScanEnded)? {
            state.emit_status(StatusDetail::DiscoveryFinished { found });
        }
        Ok(())
    }

    pub fn handle_scan_failed(
        state: &mut CoordinatorState,
        scan_id: WorkerId,
        error: TransportError,
    ) -> BluemsgResult<()> {
        if !Self::is_current_scan(state, scan_id) {
            state.stats.stale_events += 1;
            return Ok(());
        }
        state.scan = None;
        state.apply(ConnectionEvent::ScanEnded)?;
        state.emit_status(Self::radio_detail(&error, |reason| StatusDetail::DiscoveryFailed { reason }));
        state.notify(format!("Discovery failed: {}", error));
        Self::fail_if_fatal(error)
    }

    // ------------------------------------------------------------------------
    // Listener events
    // ------------------------------------------------------------------------

    /// An inbound connection arrived; it wins over any pending attempt
    pub async fn handle_listener_accepted(
        state: &mut CoordinatorState,
        ctx: &WorkerContext,
        listener_id: WorkerId,
        connection: RadioConnection,
    ) -> BluemsgResult<()> {
        let current = state.listener.as_ref().map(|listener| listener.id()) == Some(listener_id);
        if !current || state.check(ConnectionEvent::ListenerAccepted).is_err() {
            debug!("Discarding inbound connection from stale listener {}", listener_id);
            state.stats.stale_events += 1;
            discard_connection(connection, ctx.config.write_timeout).await;
            return Ok(());
        }

        // Single use: the accept task has already released the endpoint
        state.listener = None;
        Self::stop_scan(state, ctx, true).await;
        if let Some(initiator) = state.initiator.take() {
            info!("Inbound connection wins over attempt {} to {}", initiator.id(), initiator.peer());
            initiator.cancel();
        }
        Self::open_session(state, ctx, connection).await;
        state.apply(ConnectionEvent::ListenerAccepted)?;
        Self::emit_connected(state);
        Ok(())
    }

    pub fn handle_listener_failed(
        state: &mut CoordinatorState,
        listener_id: WorkerId,
        error: TransportError,
    ) -> BluemsgResult<()> {
        if state.listener.as_ref().map(|listener| listener.id()) != Some(listener_id) {
            state.stats.stale_events += 1;
            return Ok(());
        }
        state.listener = None;

        let changed = state.apply(ConnectionEvent::ListenerStopped)?;
        match error {
            TransportError::Closed | TransportError::Cancelled => {
                debug!("Listener {} closed", listener_id);
                if changed {
                    state.emit_status(StatusDetail::Idle);
                }
                Ok(())
            }
            error => {
                warn!("Listener {} failed: {}", listener_id, error);
                state.emit_status(Self::radio_detail(&error, |reason| StatusDetail::ListenFailed { reason }));
                Self::fail_if_fatal(error)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Initiator events
    // ------------------------------------------------------------------------

    pub async fn handle_initiator_succeeded(
        state: &mut CoordinatorState,
        ctx: &WorkerContext,
        attempt_id: WorkerId,
        connection: RadioConnection,
    ) -> BluemsgResult<()> {
        let current = state.initiator.as_ref().map(|initiator| initiator.id()) == Some(attempt_id);
        if !current || state.check(ConnectionEvent::InitiatorSucceeded).is_err() {
            debug!("Discarding connection from stale attempt {}", attempt_id);
            state.stats.stale_events += 1;
            discard_connection(connection, ctx.config.write_timeout).await;
            return Ok(());
        }

        state.initiator = None;
        if let Some(listener) = state.listener.take() {
            debug!("Listener {} cancelled by outbound connection", listener.id());
            listener.cancel();
        }
        Self::open_session(state, ctx, connection).await;
        state.apply(ConnectionEvent::InitiatorSucceeded)?;
        Self::emit_connected(state);
        Ok(())
    }

    pub fn handle_initiator_failed(
        state: &mut CoordinatorState,
        attempt_id: WorkerId,
        peer: PeerDevice,
        error: TransportError,
    ) -> BluemsgResult<()> {
        if state.initiator.as_ref().map(|initiator| initiator.id()) != Some(attempt_id) {
            state.stats.stale_events += 1;
            return Ok(());
        }
        state.initiator = None;
        state.apply(ConnectionEvent::InitiatorFailed)?;
        info!("Connection to {} failed: {}", peer, error);
        state.emit_status(StatusDetail::for_error(&error));
        state.notify(format!("Connection failed: {}", error));
        Self::fail_if_fatal(error)
    }

    // ------------------------------------------------------------------------
    // Session events
    // ------------------------------------------------------------------------

    pub fn handle_message_received(
        state: &mut CoordinatorState,
        session_id: WorkerId,
        content: String,
    ) -> BluemsgResult<()> {
        let Some(sender) = Self::current_session(state, session_id).map(|session| session.peer().sender_name())
        else {
            state.stats.stale_events += 1;
            return Ok(());
        };
        state.stats.messages_received += 1;
        let message = state.messages.append(Message::remote(sender, content, Timestamp::now())).clone();
        state.emit(AppEvent::MessageLogged { message });
        Ok(())
    }

    /// The session's stream ended; report it exactly once
    pub async fn handle_session_disconnected(
        state: &mut CoordinatorState,
        ctx: &WorkerContext,
        session_id: WorkerId,
        reason: String,
    ) -> BluemsgResult<()> {
        if Self::current_session(state, session_id).is_none() {
            state.stats.stale_events += 1;
            return Ok(());
        }
        if let Some(mut session) = state.session.take() {
            info!("Session with {} ended: {}", session.peer(), reason);
            session.close(ctx.config.write_timeout).await;
        }
        state.apply(ConnectionEvent::SessionEnded)?;
        state.emit_status(StatusDetail::Disconnected);
        Self::relisten(state, ctx).await
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Query capabilities; a failed check is reported and the action skipped
    async fn radio_ready(
        state: &mut CoordinatorState,
        ctx: &WorkerContext,
        user_initiated: bool,
    ) -> BluemsgResult<bool> {
        let readiness = RadioReadiness::check(ctx.capabilities.as_ref()).await;
        let Some(error) = readiness.into_error() else {
            return Ok(true);
        };
        warn!("Radio not ready: {}", error);
        let detail = StatusDetail::for_error(&error);
        let text = detail.to_string();
        state.emit_status(detail);
        if user_initiated {
            state.notify(text);
        }
        Self::fail_if_fatal(error).map(|()| false)
    }

    /// Radio-state errors get their own detail; anything else uses `other`
    fn radio_detail(error: &TransportError, other: impl FnOnce(String) -> StatusDetail) -> StatusDetail {
        if error.is_radio_state() {
            StatusDetail::for_error(error)
        } else {
            other(error.to_string())
        }
    }

    fn fail_if_fatal(error: TransportError) -> BluemsgResult<()> {
        if error.is_fatal() {
            Err(error.into())
        } else {
            Ok(())
        }
    }

    fn reject(state: &mut CoordinatorState, action: &str, err: StateTransitionError) {
        let StateTransitionError::InvalidTransition { reason, .. } = &err;
        debug!("Rejected {}: {}", action, err);
        state.notify(format!("Cannot {}: {}", action, reason));
    }

    fn is_current_scan(state: &CoordinatorState, scan_id: WorkerId) -> bool {
        state.scan.as_ref().map(|scan| scan.id()) == Some(scan_id)
    }

    fn current_session(state: &CoordinatorState, session_id: WorkerId) -> Option<&SessionHandle> {
        state.session.as_ref().filter(|session| session.id() == session_id)
    }

    /// Cancel the scan in progress, optionally reporting how far it got
    async fn stop_scan(state: &mut CoordinatorState, ctx: &WorkerContext, report: bool) {
        if let Some(scan) = state.scan.take() {
            debug!("Cancelling scan {}", scan.id());
            scan.cancel(ctx).await;
            if report {
                let count = state.peers.len();
                state.emit(AppEvent::ScanFinished { count });
            }
        }
    }

    /// Bind a new session to the stream, closing any previous one first
    async fn open_session(state: &mut CoordinatorState, ctx: &WorkerContext, connection: RadioConnection) {
        if let Some(mut previous) = state.session.take() {
            warn!("Closing previous session with {}", previous.peer());
            previous.close(ctx.config.write_timeout).await;
        }
        let session_id = state.next_worker_id();
        state.session = Some(SessionHandle::open(
            session_id,
            connection,
            ctx.event_sender.clone(),
            ctx.config.max_message_size,
        ));
    }

    fn emit_connected(state: &mut CoordinatorState) {
        if let Some(session) = state.session.as_ref() {
            let peer_name = session.peer().status_name().to_string();
            state.emit_status(StatusDetail::Connected { peer_name });
        }
    }

    /// Re-arm the listener after a session ends, when configured
    async fn relisten(state: &mut CoordinatorState, ctx: &WorkerContext) -> BluemsgResult<()> {
        if ctx.config.relisten_after_disconnect && state.connection == ConnectionState::Idle {
            Self::handle_start_listening(state, ctx, false).await?;
        }
        Ok(())
    }
}
