//! Worker Tasks
//!
//! One tokio task per blocking radio operation. Workers never touch
//! coordinator state; they report through `Event`s tagged with their
//! `WorkerId`, and they are cancelled by aborting their task, which drops
//! whatever handle or stream they were blocked on.

pub mod initiator;
pub mod listener;
pub mod scanner;
pub mod session;

pub use initiator::InitiatorHandle;
pub use listener::ListenerHandle;
pub use scanner::ScanHandle;
pub use session::SessionHandle;

use bluemsg_core::{
    internal::{EventSender, TaskId},
    Capabilities, CoordinatorConfig, Event, Radio, RadioConnection, WorkerId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

// ----------------------------------------------------------------------------
// Worker Context
// ----------------------------------------------------------------------------

/// Everything a worker needs to run, shared by all workers of one coordinator
#[derive(Clone)]
pub struct WorkerContext {
    pub radio: Arc<dyn Radio>,
    pub capabilities: Arc<dyn Capabilities>,
    pub event_sender: EventSender,
    pub config: CoordinatorConfig,
}

impl WorkerContext {
    pub fn new(
        radio: Arc<dyn Radio>,
        capabilities: Arc<dyn Capabilities>,
        event_sender: EventSender,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            radio,
            capabilities,
            event_sender,
            config,
        }
    }
}

/// Post an event to the coordinator; a closed channel means it has stopped
pub(crate) async fn post(sender: &EventSender, from: TaskId, event: Event) {
    trace!("{} posting {:?}", from, bluemsg_core::internal::MessageType::from(&event));
    if sender.send(event).await.is_err() {
        debug!("{} dropped event: coordinator has stopped", from);
    }
}

// ----------------------------------------------------------------------------
// Worker Handle
// ----------------------------------------------------------------------------

/// Owning handle of one spawned worker task
///
/// Cancelling is idempotent and also happens when the handle is dropped.
#[derive(Debug)]
pub struct WorkerHandle {
    id: WorkerId,
    task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn<F>(id: WorkerId, future: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        Self {
            id,
            task: Some(tokio::spawn(future)),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Whether the task is still running
    pub fn is_active(&self) -> bool {
        self.task.as_ref().map(|task| !task.is_finished()).unwrap_or(false)
    }

    /// Abort the task. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                trace!("Aborting worker {}", self.id);
            }
            task.abort();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Close a stream that lost arbitration so the remote end sees EOF
pub(crate) async fn discard_connection(connection: RadioConnection, grace: Duration) {
    let RadioConnection { peer, mut stream } = connection;
    debug!("Discarding connection to {}", peer.address);
    let _ = tokio::time::timeout(grace, stream.shutdown()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_aborts() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let mut handle = WorkerHandle::spawn(WorkerId::new(1), async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        assert!(handle.is_active());

        handle.cancel();
        handle.cancel();
        assert!(!handle.is_active());

        // The aborted task drops its sender
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_drop_cancels_worker() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();
        let handle = WorkerHandle::spawn(WorkerId::new(2), async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
        });
        drop(handle);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}
