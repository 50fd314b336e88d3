//! Listener
//!
//! Binds the service endpoint on the caller's task, then waits for a single
//! inbound connection on its own task. Single use: after one accept (or a
//! failure) the worker ends and the endpoint is released.

use super::{post, WorkerContext, WorkerHandle};
use bluemsg_core::{internal::TaskId, Event, TransportError, WorkerId};
use tracing::{debug, info};

/// A bound listener waiting for one inbound connection
#[derive(Debug)]
pub struct ListenerHandle {
    worker: WorkerHandle,
}

impl ListenerHandle {
    /// Register the service and start waiting for a connection
    ///
    /// Registration failures are returned directly; accept failures arrive
    /// later as `Event::ListenerFailed`.
    pub async fn start(ctx: &WorkerContext, listener_id: WorkerId) -> Result<Self, TransportError> {
        let mut endpoint = ctx.radio.listen(&ctx.config.service).await?;
        info!(
            "Listener {} bound to {} ({})",
            listener_id, ctx.config.service.name, ctx.config.service.uuid
        );

        let event_sender = ctx.event_sender.clone();
        let worker = WorkerHandle::spawn(listener_id, async move {
            let event = match endpoint.accept().await {
                Ok(connection) => {
                    info!("Listener {} accepted {}", listener_id, connection.peer);
                    Event::ListenerAccepted {
                        listener_id,
                        connection,
                    }
                }
                Err(error) => {
                    debug!("Listener {} stopped: {}", listener_id, error);
                    Event::ListenerFailed { listener_id, error }
                }
            };
            // Release the endpoint before reporting so the service is unregistered
            drop(endpoint);
            post(&event_sender, TaskId::Listener, event).await;
        });

        Ok(Self { worker })
    }

    pub fn id(&self) -> WorkerId {
        self.worker.id()
    }

    /// Close the endpoint; a pending accept is abandoned silently
    pub fn cancel(mut self) {
        self.worker.cancel();
    }
}
