//! Coordinator Scenario Tests
//!
//! Drives real coordinators over the simulated air and checks the app events
//! they report: discovery, listening, messaging, disconnects and capability
//! failures.

use bluemsg_core::{
    AppEvent, BluemsgConfig, BluemsgResult, Command, ConnectionState, CoordinatorConfig, PeerDevice, Radio,
    Sender, ServiceRecord, StatusDetail,
};
use bluemsg_harness::{SimCapabilities, SimRadio, SimulatedAir, TestHarness};
use bluemsg_runtime::{MessagingRuntime, RuntimeBuilder};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const QUIET: Duration = Duration::from_millis(300);

async fn start_node(
    radio: &SimRadio,
    label: &str,
    config: BluemsgConfig,
    capabilities: Arc<SimCapabilities>,
) -> BluemsgResult<(MessagingRuntime, TestHarness)> {
    let mut runtime = RuntimeBuilder::new(Arc::new(radio.clone()))
        .with_capabilities(capabilities)
        .with_config(config)
        .with_no_logging()
        .start()
        .await?;
    let harness = TestHarness::attach(
        label,
        runtime.command_sender().expect("runtime started"),
        runtime.take_app_event_receiver().expect("receiver available"),
    );
    Ok((runtime, harness))
}

async fn start_default_node(radio: &SimRadio, label: &str) -> BluemsgResult<(MessagingRuntime, TestHarness)> {
    start_node(radio, label, BluemsgConfig::testing(), Arc::new(SimCapabilities::new())).await
}

fn is_disconnected(event: &AppEvent) -> bool {
    matches!(
        event,
        AppEvent::StatusChanged {
            detail: StatusDetail::Disconnected,
            ..
        }
    )
}

// ----------------------------------------------------------------------------
// Discovery
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_scan_deduplicates_and_reports_count() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let scanner = air.add_device(Some("Scanner"));
    let a = PeerDevice::named("00:00:00:00:00:0A", "A");
    let b = PeerDevice::new("00:00:00:00:00:0B", None);
    scanner.script_scan(vec![a.clone(), b.clone(), a.clone()]);

    let (_runtime, mut node) = start_default_node(&scanner, "scanner").await?;
    node.send(Command::StartScan).await?;
    assert_eq!(node.expect_state(ConnectionState::Discovering).await?, StatusDetail::Discovering);

    let finished = node
        .expect("scan finished", |e| matches!(e, AppEvent::ScanFinished { .. }))
        .await?;
    assert!(matches!(finished, AppEvent::ScanFinished { count: 2 }));

    let state = node.expect_status(StatusDetail::DiscoveryFinished { found: 2 }).await?;
    assert_eq!(state, ConnectionState::Idle);

    let discovered: Vec<PeerDevice> = node
        .history()
        .iter()
        .filter_map(|e| match e {
            AppEvent::PeerDiscovered { peer } => Some(peer.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(discovered, vec![a.clone(), b.clone()]);

    let snapshot = node.snapshot().await?;
    assert_eq!(snapshot.peers, vec![a, b]);
    assert_eq!(snapshot.peers[1].list_name(), "Unknown Device");
    Ok(())
}

#[tokio::test]
async fn test_cancel_scan_reports_partial_results() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let scanner = air.add_device(Some("Scanner"));
    scanner.script_scan(vec![PeerDevice::named("00:00:00:00:00:0A", "A")]);
    let config = BluemsgConfig::testing()
        .with_coordinator(CoordinatorConfig::default().with_scan_window(Duration::from_secs(30)));

    let (_runtime, mut node) = start_node(&scanner, "scanner", config, Arc::new(SimCapabilities::new())).await?;
    node.send(Command::StartScan).await?;
    node.expect("peer", |e| matches!(e, AppEvent::PeerDiscovered { .. })).await?;

    node.send(Command::CancelScan).await?;
    let finished = node
        .expect("scan finished", |e| matches!(e, AppEvent::ScanFinished { .. }))
        .await?;
    assert!(matches!(finished, AppEvent::ScanFinished { count: 1 }));
    assert_eq!(
        node.expect_status(StatusDetail::DiscoveryFinished { found: 1 }).await?,
        ConnectionState::Idle
    );
    assert!(scanner.stats().discovery_cancels >= 1);
    Ok(())
}

#[tokio::test]
async fn test_scan_keeps_listener_and_returns_to_listening() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    let service = ServiceRecord::default();
    let (_runtime, mut node) = start_default_node(&radio, "node").await?;

    node.send(Command::StartListening).await?;
    assert_eq!(node.expect_status(StatusDetail::Ready).await?, ConnectionState::Listening);

    node.send(Command::StartScan).await?;
    node.expect_state(ConnectionState::Discovering).await?;
    assert!(radio.is_listening(&service));

    assert_eq!(
        node.expect_status(StatusDetail::DiscoveryFinished { found: 0 }).await?,
        ConnectionState::Listening
    );
    Ok(())
}

#[tokio::test]
async fn test_make_discoverable_exposes_device_to_scans() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let hidden = air.add_device(Some("Hidden"));
    let scanner = air.add_device(Some("Scanner"));
    let (_hidden_rt, mut hidden_node) = start_default_node(&hidden, "hidden").await?;
    let (_scanner_rt, mut scanner_node) = start_default_node(&scanner, "scanner").await?;

    scanner_node.send(Command::StartScan).await?;
    let first = scanner_node
        .expect("scan finished", |e| matches!(e, AppEvent::ScanFinished { .. }))
        .await?;
    assert!(matches!(first, AppEvent::ScanFinished { count: 0 }));

    hidden_node
        .send(Command::MakeDiscoverable {
            duration: Some(Duration::from_secs(60)),
        })
        .await?;
    let state = hidden_node.expect_status(StatusDetail::Discoverable { seconds: 60 }).await?;
    assert_eq!(state, ConnectionState::Idle);

    scanner_node.send(Command::StartScan).await?;
    let found = scanner_node
        .expect("hidden device", |e| matches!(e, AppEvent::PeerDiscovered { .. }))
        .await?;
    match found {
        AppEvent::PeerDiscovered { peer } => assert_eq!(peer.address, *hidden.address()),
        other => panic!("unexpected event {:?}", other),
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Listening and Sessions
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_accept_then_read_failure_returns_to_idle_once() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let node_radio = air.add_device(Some("Node"));
    let alice = air.add_device(Some("Alice"));
    let (_runtime, mut node) = start_default_node(&node_radio, "node").await?;

    node.send(Command::StartListening).await?;
    node.expect_status(StatusDetail::Ready).await?;

    let mut stream = alice
        .dial(&node_radio.peer(), &ServiceRecord::default())
        .await
        .expect("listener registered");
    let detail = node.expect_state(ConnectionState::Connected).await?;
    assert_eq!(
        detail,
        StatusDetail::Connected {
            peer_name: "Alice".to_string()
        }
    );

    // A header announcing an impossible frame breaks the session's read loop
    stream.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).await.expect("write header");
    let state = node.expect_status(StatusDetail::Disconnected).await?;
    assert_eq!(state, ConnectionState::Idle);

    node.settle(QUIET).await;
    assert_eq!(node.count(is_disconnected), 1);

    let snapshot = node.snapshot().await?;
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert!(snapshot.connected_peer.is_none());
    assert!(!snapshot.listening);
    Ok(())
}

#[tokio::test]
async fn test_send_round_trip_between_two_nodes() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let alice = air.add_device(Some("Alice"));
    let bob = air.add_device(Some("Bob"));
    let (_alice_rt, mut alice_node) = start_default_node(&alice, "alice").await?;
    let (_bob_rt, mut bob_node) = start_default_node(&bob, "bob").await?;

    bob_node.send(Command::StartListening).await?;
    bob_node.expect_status(StatusDetail::Ready).await?;

    alice_node.send(Command::Connect { peer: bob.peer() }).await?;
    assert_eq!(
        alice_node.expect_state(ConnectionState::Connecting).await?,
        StatusDetail::Connecting {
            peer_name: "Bob".to_string()
        }
    );
    alice_node.expect_state(ConnectionState::Connected).await?;
    bob_node.expect_state(ConnectionState::Connected).await?;

    alice_node
        .send(Command::Send {
            text: "  hello  ".to_string(),
        })
        .await?;

    let sent = alice_node
        .expect("local message", |e| matches!(e, AppEvent::MessageLogged { .. }))
        .await?;
    match sent {
        AppEvent::MessageLogged { message } => {
            assert_eq!(message.sender, Sender::Local);
            assert_eq!(message.content, "hello");
        }
        other => panic!("unexpected event {:?}", other),
    }

    let received = bob_node
        .expect("remote message", |e| matches!(e, AppEvent::MessageLogged { .. }))
        .await?;
    match received {
        AppEvent::MessageLogged { message } => {
            assert_eq!(message.sender, Sender::Remote("Alice".to_string()));
            assert_eq!(message.content, "hello");
        }
        other => panic!("unexpected event {:?}", other),
    }

    bob_node
        .send(Command::Send {
            text: "hi alice".to_string(),
        })
        .await?;
    let reply = alice_node
        .expect("reply", |e| {
            matches!(e, AppEvent::MessageLogged { message } if message.content == "hi alice")
        })
        .await?;
    assert!(matches!(
        reply,
        AppEvent::MessageLogged { message } if message.sender == Sender::Remote("Bob".to_string())
    ));
    Ok(())
}

#[tokio::test]
async fn test_manual_disconnect_notifies_both_sides() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let alice = air.add_device(Some("Alice"));
    let bob = air.add_device(Some("Bob"));
    let (_alice_rt, mut alice_node) = start_default_node(&alice, "alice").await?;
    let (_bob_rt, mut bob_node) = start_default_node(&bob, "bob").await?;

    bob_node.send(Command::StartListening).await?;
    bob_node.expect_status(StatusDetail::Ready).await?;
    alice_node.send(Command::Connect { peer: bob.peer() }).await?;
    alice_node.expect_state(ConnectionState::Connected).await?;
    bob_node.expect_state(ConnectionState::Connected).await?;

    alice_node.send(Command::Disconnect).await?;
    assert_eq!(
        alice_node.expect_state(ConnectionState::Disconnecting).await?,
        StatusDetail::Disconnecting
    );
    assert_eq!(alice_node.expect_status(StatusDetail::Disconnected).await?, ConnectionState::Idle);
    assert_eq!(bob_node.expect_status(StatusDetail::Disconnected).await?, ConnectionState::Idle);

    alice_node.settle(QUIET).await;
    bob_node.settle(QUIET).await;
    assert_eq!(alice_node.count(is_disconnected), 1);
    assert_eq!(bob_node.count(is_disconnected), 1);
    Ok(())
}

#[tokio::test]
async fn test_send_while_not_connected_is_silent_noop() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    let (runtime, mut node) = start_default_node(&radio, "node").await?;

    node.send(Command::Send {
        text: "anyone there?".to_string(),
    })
    .await?;
    node.send(Command::Send { text: "   ".to_string() }).await?;

    assert!(node.settle(QUIET).await.is_empty());
    let snapshot = node.snapshot().await?;
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.state, ConnectionState::Idle);
    assert!(runtime.is_running());
    Ok(())
}

#[tokio::test]
async fn test_connect_while_connected_is_rejected() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let alice = air.add_device(Some("Alice"));
    let bob = air.add_device(Some("Bob"));
    let carol = air.add_device(Some("Carol"));
    let (_alice_rt, mut alice_node) = start_default_node(&alice, "alice").await?;
    let (_bob_rt, mut bob_node) = start_default_node(&bob, "bob").await?;

    bob_node.send(Command::StartListening).await?;
    bob_node.expect_status(StatusDetail::Ready).await?;
    alice_node.send(Command::Connect { peer: bob.peer() }).await?;
    alice_node.expect_state(ConnectionState::Connected).await?;

    alice_node.send(Command::Connect { peer: carol.peer() }).await?;
    let rejected = alice_node
        .expect("rejection", |e| matches!(e, AppEvent::Notification { .. }))
        .await?;
    assert!(matches!(
        rejected,
        AppEvent::Notification { text } if text == "Cannot connect: already connected"
    ));

    let snapshot = alice_node.snapshot().await?;
    assert_eq!(snapshot.state, ConnectionState::Connected);
    assert_eq!(snapshot.connected_peer, Some(bob.peer()));
    Ok(())
}

#[tokio::test]
async fn test_scan_while_connected_is_rejected() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let alice = air.add_device(Some("Alice"));
    let bob = air.add_device(Some("Bob"));
    let (_alice_rt, mut alice_node) = start_default_node(&alice, "alice").await?;
    let (_bob_rt, mut bob_node) = start_default_node(&bob, "bob").await?;

    bob_node.send(Command::StartListening).await?;
    bob_node.expect_status(StatusDetail::Ready).await?;
    alice_node.send(Command::Connect { peer: bob.peer() }).await?;
    alice_node.expect_state(ConnectionState::Connected).await?;
    bob_node.expect_state(ConnectionState::Connected).await?;

    alice_node.send(Command::StartScan).await?;
    let rejected = alice_node
        .expect("rejection", |e| matches!(e, AppEvent::Notification { .. }))
        .await?;
    assert!(matches!(
        rejected,
        AppEvent::Notification { text } if text == "Cannot scan: already connected"
    ));
    assert_eq!(alice_node.snapshot().await?.state, ConnectionState::Connected);
    assert_eq!(alice.stats().scans, 0);

    // Once the session ends, nothing is left scanning behind the resting state
    bob_node.send(Command::Disconnect).await?;
    assert_eq!(alice_node.expect_status(StatusDetail::Disconnected).await?, ConnectionState::Idle);
    alice_node.send(Command::CancelScan).await?;
    alice_node.settle(QUIET).await;
    assert_eq!(
        alice_node.count(|e| matches!(
            e,
            AppEvent::StatusChanged {
                detail: StatusDetail::Discovering,
                ..
            } | AppEvent::ScanFinished { .. }
        )),
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_relisten_after_remote_disconnect() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let node_radio = air.add_device(Some("Node"));
    let alice = air.add_device(Some("Alice"));
    let config = BluemsgConfig::testing()
        .with_coordinator(CoordinatorConfig::default().with_relisten_after_disconnect(true));
    let (_runtime, mut node) = start_node(&node_radio, "node", config, Arc::new(SimCapabilities::new())).await?;

    node.send(Command::StartListening).await?;
    node.expect_status(StatusDetail::Ready).await?;

    let stream = alice
        .dial(&node_radio.peer(), &ServiceRecord::default())
        .await
        .expect("listener registered");
    node.expect_state(ConnectionState::Connected).await?;

    drop(stream);
    node.expect_status(StatusDetail::Disconnected).await?;
    assert_eq!(node.expect_status(StatusDetail::Ready).await?, ConnectionState::Listening);
    assert!(node_radio.is_listening(&ServiceRecord::default()));
    Ok(())
}

// ----------------------------------------------------------------------------
// Failures
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_connect_returns_to_rest_with_notification() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    let absent = air.add_device(Some("Absent"));
    let (_runtime, mut node) = start_default_node(&radio, "node").await?;

    node.send(Command::Connect { peer: absent.peer() }).await?;
    node.expect_state(ConnectionState::Connecting).await?;
    let detail = node.expect_state(ConnectionState::Idle).await?;
    assert!(matches!(detail, StatusDetail::ConnectionFailed { .. }));
    assert_eq!(detail.to_string(), "Connection failed");

    let notification = node
        .expect("notification", |e| matches!(e, AppEvent::Notification { .. }))
        .await?;
    assert!(matches!(notification, AppEvent::Notification { text } if text.starts_with("Connection failed")));
    Ok(())
}

#[tokio::test]
async fn test_listen_failure_is_reported() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    radio.fail_next_listen("service record rejected");
    let (_runtime, mut node) = start_default_node(&radio, "node").await?;

    node.send(Command::StartListening).await?;
    let detail = node
        .expect("listen failure", |e| {
            matches!(
                e,
                AppEvent::StatusChanged {
                    detail: StatusDetail::ListenFailed { .. },
                    ..
                }
            )
        })
        .await?;
    assert!(matches!(
        detail,
        AppEvent::StatusChanged { state: ConnectionState::Idle, detail: StatusDetail::ListenFailed { reason } }
            if reason.contains("service record rejected")
    ));
    Ok(())
}

#[tokio::test]
async fn test_scan_failure_is_reported() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    radio.fail_next_scan("adapter busy");
    let (_runtime, mut node) = start_default_node(&radio, "node").await?;

    node.send(Command::StartScan).await?;
    node.expect_state(ConnectionState::Discovering).await?;
    let detail = node.expect_state(ConnectionState::Idle).await?;
    assert!(matches!(detail, StatusDetail::DiscoveryFailed { reason } if reason.contains("adapter busy")));
    node.expect("notification", |e| matches!(e, AppEvent::Notification { .. }))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_disabled_radio_blocks_scan() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    let capabilities = Arc::new(SimCapabilities::new());
    capabilities.set_enabled(false);
    let (runtime, mut node) = start_node(&radio, "node", BluemsgConfig::testing(), capabilities.clone()).await?;

    node.send(Command::StartScan).await?;
    assert_eq!(node.expect_status(StatusDetail::RadioDisabled).await?, ConnectionState::Idle);
    let notification = node
        .expect("notification", |e| matches!(e, AppEvent::Notification { .. }))
        .await?;
    assert!(matches!(notification, AppEvent::Notification { text } if text == "Bluetooth is disabled"));
    assert_eq!(radio.stats().scans, 0);

    capabilities.set_enabled(true);
    node.send(Command::StartScan).await?;
    node.expect_state(ConnectionState::Discovering).await?;
    assert!(runtime.is_running());
    Ok(())
}

#[tokio::test]
async fn test_missing_permission_blocks_listen() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    let capabilities = Arc::new(SimCapabilities::new());
    capabilities.set_permitted(false);
    let (_runtime, mut node) = start_node(&radio, "node", BluemsgConfig::testing(), capabilities).await?;

    node.send(Command::StartListening).await?;
    assert_eq!(node.expect_status(StatusDetail::PermissionDenied).await?, ConnectionState::Idle);
    assert!(!radio.is_listening(&ServiceRecord::default()));
    Ok(())
}

#[tokio::test]
async fn test_unsupported_radio_stops_coordinator() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    let capabilities = Arc::new(SimCapabilities::new());
    capabilities.set_supported(false);
    let (mut runtime, mut node) = start_node(&radio, "node", BluemsgConfig::testing(), capabilities).await?;

    node.send(Command::StartListening).await?;
    node.expect_status(StatusDetail::RadioUnsupported).await?;
    node.expect("stopped", |e| matches!(e, AppEvent::Stopped)).await?;

    tokio::time::timeout(Duration::from_secs(2), runtime.wait())
        .await
        .expect("coordinator ends")?;
    assert!(!runtime.is_running());
    Ok(())
}

#[tokio::test]
async fn test_shutdown_releases_listener() -> BluemsgResult<()> {
    let air = SimulatedAir::new();
    let radio = air.add_device(Some("Node"));
    let (mut runtime, mut node) = start_default_node(&radio, "node").await?;

    node.send(Command::StartListening).await?;
    node.expect_status(StatusDetail::Ready).await?;
    assert!(radio.is_listening(&ServiceRecord::default()));

    runtime.stop().await?;
    assert_eq!(node.expect_status(StatusDetail::Stopped).await?, ConnectionState::Idle);
    node.expect("stopped", |e| matches!(e, AppEvent::Stopped)).await?;

    // The accept task is aborted asynchronously
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!radio.is_listening(&ServiceRecord::default()));
    Ok(())
}
