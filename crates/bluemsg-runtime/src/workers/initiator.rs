//! Initiator
//!
//! One outbound connection attempt. Discovery is stopped before the dial
//! starts; the dial itself runs on its own task bounded by the connect
//! timeout.

use super::{post, WorkerContext, WorkerHandle};
use bluemsg_core::{internal::TaskId, Event, PeerDevice, RadioConnection, TransportError, WorkerId};
use tracing::{info, warn};

/// An in-flight outbound attempt
#[derive(Debug)]
pub struct InitiatorHandle {
    worker: WorkerHandle,
    peer: PeerDevice,
}

impl InitiatorHandle {
    /// Stop discovery, then dial `peer` in the background
    pub async fn connect(ctx: &WorkerContext, attempt_id: WorkerId, peer: PeerDevice) -> Self {
        ctx.radio.cancel_discovery().await;

        let radio = ctx.radio.clone();
        let service = ctx.config.service.clone();
        let budget = ctx.config.connect_timeout;
        let event_sender = ctx.event_sender.clone();
        let target = peer.clone();

        let worker = WorkerHandle::spawn(attempt_id, async move {
            info!("Attempt {} dialing {}", attempt_id, target);
            let outcome = match tokio::time::timeout(budget, radio.dial(&target, &service)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::connect_timeout(target.address.as_str(), budget)),
            };

            let event = match outcome {
                Ok(stream) => Event::InitiatorSucceeded {
                    attempt_id,
                    connection: RadioConnection::new(target, stream),
                },
                Err(error) => {
                    warn!("Attempt {} to {} failed: {}", attempt_id, target.address, error);
                    Event::InitiatorFailed {
                        attempt_id,
                        peer: target,
                        error,
                    }
                }
            };
            post(&event_sender, TaskId::Initiator, event).await;
        });

        Self { worker, peer }
    }

    pub fn id(&self) -> WorkerId {
        self.worker.id()
    }

    pub fn peer(&self) -> &PeerDevice {
        &self.peer
    }

    /// Abandon the attempt; the dial future and any socket it opened are dropped
    pub fn cancel(mut self) {
        self.worker.cancel();
    }
}
