//! Discovery scanner
//!
//! Runs one scan window and forwards every sighting to the coordinator, which
//! owns deduplication. The scan ends with exactly one `ScanFinished` or
//! `ScanFailed` unless the worker is aborted first.

use super::{post, WorkerContext, WorkerHandle};
use bluemsg_core::{internal::TaskId, Event, WorkerId};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A running scan
#[derive(Debug)]
pub struct ScanHandle {
    worker: WorkerHandle,
}

impl ScanHandle {
    /// Start a scan lasting at most `window`
    pub fn start(ctx: &WorkerContext, scan_id: WorkerId, window: Duration) -> Self {
        let ctx = ctx.clone();
        let worker = WorkerHandle::spawn(scan_id, async move {
            run_scan(ctx, scan_id, window).await;
        });
        Self { worker }
    }

    pub fn id(&self) -> WorkerId {
        self.worker.id()
    }

    /// Stop the scan task and the radio scan behind it
    pub async fn cancel(mut self, ctx: &WorkerContext) {
        self.worker.cancel();
        ctx.radio.cancel_discovery().await;
    }
}

async fn run_scan(ctx: WorkerContext, scan_id: WorkerId, window: Duration) {
    let mut sightings = match ctx.radio.discover(window).await {
        Ok(receiver) => receiver,
        Err(error) => {
            warn!("Scan {} could not start: {}", scan_id, error);
            post(&ctx.event_sender, TaskId::Scanner, Event::ScanFailed { scan_id, error }).await;
            return;
        }
    };

    let deadline = Instant::now() + window;
    let mut sighted = 0usize;
    loop {
        tokio::select! {
            sighting = sightings.recv() => match sighting {
                Some(peer) => {
                    sighted += 1;
                    post(&ctx.event_sender, TaskId::Scanner, Event::PeerFound { scan_id, peer }).await;
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline) => {
                debug!("Scan {} window elapsed before the radio closed it", scan_id);
                break;
            }
        }
    }

    debug!("Scan {} finished after {} sightings", scan_id, sighted);
    post(&ctx.event_sender, TaskId::Scanner, Event::ScanFinished { scan_id }).await;
}
