//! LAN radio tests over the loopback interface

use bluemsg_core::{Capabilities, PeerDevice, Radio, RadioKind, ServiceRecord, TransportError};
use bluemsg_radio::{LanCapabilities, LanRadio, LanRadioConfig};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

fn free_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").expect("bind ephemeral port");
    socket.local_addr().expect("local addr").port()
}

fn radio(name: &str, discovery_port: u16) -> LanRadio {
    LanRadio::new(LanRadioConfig::loopback(discovery_port).with_device_name(name))
}

fn local_peer(radio: &LanRadio) -> PeerDevice {
    let port = radio.stream_port().expect("service registered");
    PeerDevice::new(format!("127.0.0.1:{}", port), None)
}

#[tokio::test]
async fn test_dial_and_accept_exchange_bytes() {
    let port = free_udp_port();
    let alice = radio("Alice", port);
    let bob = radio("Bob", port);
    let service = ServiceRecord::default();

    let mut endpoint = alice.listen(&service).await.unwrap();
    let target = local_peer(&alice);

    let (dialed, accepted) = tokio::join!(bob.dial(&target, &service), async {
        tokio::time::timeout(WAIT, endpoint.accept()).await
    });
    let mut outbound = dialed.unwrap();
    let mut inbound = accepted.expect("accept in time").unwrap();
    assert_eq!(inbound.peer.display_name.as_deref(), Some("Bob"));
    assert!(inbound.peer.address.as_str().starts_with("127.0.0.1:"));

    outbound.write_all(b"ping").await.unwrap();
    let mut buf = [0u8; 4];
    inbound.stream.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"ping");

    inbound.stream.write_all(b"pong").await.unwrap();
    outbound.read_exact(&mut buf).await.unwrap();
    assert_eq!(&buf, b"pong");
}

#[tokio::test]
async fn test_wrong_service_is_turned_away() {
    let port = free_udp_port();
    let alice = radio("Alice", port);
    let bob = radio("Bob", port);

    let mut endpoint = alice.listen(&ServiceRecord::default()).await.unwrap();
    let target = local_peer(&alice);
    let other = ServiceRecord::new(Uuid::new_v4(), "Other");

    let mut stream = bob.dial(&target, &other).await.unwrap();
    let accepted = tokio::time::timeout(Duration::from_millis(300), endpoint.accept()).await;
    assert!(accepted.is_err(), "mismatched service must not be accepted");

    // The rejected stream is closed by the listener
    let mut buf = [0u8; 1];
    let read = tokio::time::timeout(WAIT, stream.read(&mut buf)).await.expect("closed in time");
    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test]
async fn test_single_registration_per_radio() {
    let alice = radio("Alice", free_udp_port());
    let service = ServiceRecord::default();

    let endpoint = alice.listen(&service).await.unwrap();
    assert!(matches!(
        alice.listen(&service).await,
        Err(TransportError::TransportUnavailable { .. })
    ));

    drop(endpoint);
    assert!(alice.stream_port().is_none());
    assert!(alice.listen(&service).await.is_ok());
}

#[tokio::test]
async fn test_dial_without_listener_is_refused() {
    let bob = radio("Bob", free_udp_port());
    let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = unused.local_addr().unwrap();
    drop(unused);

    let result = bob
        .dial(&PeerDevice::new(address.to_string(), None), &ServiceRecord::default())
        .await;
    assert!(matches!(result, Err(TransportError::ConnectRefused { .. })));
}

#[tokio::test]
async fn test_dial_rejects_non_socket_address() {
    let bob = radio("Bob", free_udp_port());
    let result = bob
        .dial(&PeerDevice::new("AA:BB:CC:DD:EE:FF", None), &ServiceRecord::default())
        .await;
    assert!(matches!(result, Err(TransportError::TransportUnavailable { .. })));
}

#[tokio::test]
async fn test_discoverable_device_is_found() {
    let port = free_udp_port();
    let alice = radio("Alice", port);
    let bob = radio("Bob", port);

    let _endpoint = alice.listen(&ServiceRecord::default()).await.unwrap();
    alice.set_discoverable(Duration::from_secs(10)).await.unwrap();
    assert!(alice.is_discoverable());

    let mut sightings = bob.discover(Duration::from_millis(400)).await.unwrap();
    let peer = tokio::time::timeout(WAIT, sightings.recv())
        .await
        .expect("sighting in time")
        .expect("alice announced");
    assert_eq!(peer, local_peer(&alice));
    assert_eq!(peer.display_name.as_deref(), Some("Alice"));

    // The channel closes once the window is over
    let drained = tokio::time::timeout(WAIT, async {
        while sightings.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok());
}

#[tokio::test]
async fn test_hidden_device_is_not_found() {
    let port = free_udp_port();
    let alice = radio("Alice", port);
    let bob = radio("Bob", port);

    let _endpoint = alice.listen(&ServiceRecord::default()).await.unwrap();
    let mut sightings = bob.discover(Duration::from_millis(300)).await.unwrap();
    let first = tokio::time::timeout(WAIT, sightings.recv()).await.expect("window closes");
    assert!(first.is_none());
}

#[tokio::test]
async fn test_cancel_discovery_closes_channel() {
    let bob = radio("Bob", free_udp_port());
    let mut sightings = bob.discover(Duration::from_secs(30)).await.unwrap();
    bob.cancel_discovery().await;

    let next = tokio::time::timeout(WAIT, sightings.recv()).await.expect("closed promptly");
    assert!(next.is_none());
}

#[tokio::test]
async fn test_lan_capabilities_on_loopback() {
    let capabilities = LanCapabilities::new(LanRadioConfig::loopback(free_udp_port()));
    assert!(capabilities.is_radio_supported().await);
    assert!(capabilities.has_required_permissions().await);
    assert!(capabilities.is_radio_enabled().await);
    assert_eq!(radio("Alice", 1).radio_kind(), RadioKind::Lan);
}
