//! Session
//!
//! Exclusive owner of one connected stream. The read half runs a frame
//! decoding loop on its own task; the write half stays with the coordinator
//! so sends are serialized with every other state change.

use super::{post, WorkerHandle};
use bluemsg_core::{
    internal::{message_reader, message_writer, EventSender, TaskId},
    Event, MessageCodec, PeerDevice, RadioConnection, RadioStream, TransportError, WorkerId,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::WriteHalf;
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

type MessageSink = FramedWrite<WriteHalf<Box<dyn RadioStream>>, MessageCodec>;

/// A live connection to one peer
pub struct SessionHandle {
    peer: PeerDevice,
    reader: WorkerHandle,
    writer: Option<MessageSink>,
    max_message_size: usize,
}

impl SessionHandle {
    /// Take ownership of the stream and start reading from it
    pub fn open(
        session_id: WorkerId,
        connection: RadioConnection,
        event_sender: EventSender,
        max_message_size: usize,
    ) -> Self {
        let RadioConnection { peer, stream } = connection;
        let (read_half, write_half) = tokio::io::split(stream);
        info!("Session {} opened with {}", session_id, peer);

        let reader = WorkerHandle::spawn(session_id, async move {
            let mut frames = message_reader(read_half, max_message_size);
            let reason = loop {
                match frames.next().await {
                    Some(Ok(content)) => {
                        post(&event_sender, TaskId::Session, Event::MessageReceived { session_id, content }).await;
                    }
                    Some(Err(err)) => break TransportError::from_stream_io(err).to_string(),
                    None => break "remote closed the connection".to_string(),
                }
            };
            debug!("Session {} read loop ended: {}", session_id, reason);
            post(&event_sender, TaskId::Session, Event::SessionDisconnected { session_id, reason }).await;
        });

        Self {
            peer,
            reader,
            writer: Some(message_writer(write_half, max_message_size)),
            max_message_size,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.reader.id()
    }

    pub fn peer(&self) -> &PeerDevice {
        &self.peer
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Write one message, waiting at most `budget`
    ///
    /// A failed write is reported to the caller only; the read loop decides
    /// when the session is over.
    pub async fn send(&mut self, text: &str, budget: Duration) -> Result<(), TransportError> {
        if text.len() > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: text.len(),
                max_size: self.max_message_size,
            });
        }
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        match tokio::time::timeout(budget, writer.send(text.to_string())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TransportError::from_stream_io(err)),
            Err(_) => Err(TransportError::disconnected(format!(
                "write timed out after {}ms",
                budget.as_millis()
            ))),
        }
    }

    /// Stop reading and shut the write half down. Safe to call more than once.
    pub async fn close(&mut self, grace: Duration) {
        self.reader.cancel();
        if let Some(mut writer) = self.writer.take() {
            match tokio::time::timeout(grace, writer.close()).await {
                Ok(Ok(())) => debug!("Session with {} closed", self.peer.address),
                Ok(Err(err)) => debug!("Session with {} closed uncleanly: {}", self.peer.address, err),
                Err(_) => warn!("Session with {} did not close within {:?}", self.peer.address, grace),
            }
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluemsg_core::internal::{create_event_channel, message_reader, message_writer};
    use bluemsg_core::ChannelConfig;
    use std::time::Duration;

    fn open_pair() -> (SessionHandle, tokio::io::DuplexStream, bluemsg_core::internal::EventReceiver) {
        let (events_tx, events_rx) = create_event_channel(&ChannelConfig::default());
        let (local, remote) = tokio::io::duplex(4096);
        let connection = RadioConnection::new(PeerDevice::named("AA:BB", "Peer"), Box::new(local));
        let session = SessionHandle::open(WorkerId::new(9), connection, events_tx, 1024);
        (session, remote, events_rx)
    }

    #[tokio::test]
    async fn test_inbound_frames_become_events() {
        let (_session, remote, mut events) = open_pair();
        let mut remote_writer = message_writer(remote, 1024);
        remote_writer.send("hi there".to_string()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        match event {
            Event::MessageReceived { session_id, content } => {
                assert_eq!(session_id, WorkerId::new(9));
                assert_eq!(content, "hi there");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_close_reports_disconnect_once() {
        let (_session, remote, mut events) = open_pair();
        drop(remote);

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
        assert!(matches!(event, Event::SessionDisconnected { .. }));

        // The read loop has ended, so the channel yields nothing further
        let next = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
        assert!(!matches!(next, Ok(Some(_))), "only one disconnect expected");
    }

    #[tokio::test]
    async fn test_send_and_close() {
        let (mut session, remote, _events) = open_pair();
        let mut remote_reader = message_reader(remote, 1024);

        session.send("hello", Duration::from_secs(1)).await.unwrap();
        assert_eq!(remote_reader.next().await.unwrap().unwrap(), "hello");

        session.close(Duration::from_secs(1)).await;
        session.close(Duration::from_secs(1)).await;
        assert!(!session.is_open());
        assert!(matches!(
            session.send("late", Duration::from_secs(1)).await,
            Err(TransportError::Closed)
        ));
        assert!(remote_reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_send_rejected() {
        let (mut session, _remote, _events) = open_pair();
        let big = "x".repeat(2048);
        assert!(matches!(
            session.send(&big, Duration::from_secs(1)).await,
            Err(TransportError::MessageTooLarge { size: 2048, max_size: 1024 })
        ));
    }
}
