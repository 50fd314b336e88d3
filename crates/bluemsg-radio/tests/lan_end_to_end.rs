//! Two coordinators talking over the LAN radio on loopback

use bluemsg_core::{AppEvent, BluemsgConfig, BluemsgResult, Command, ConnectionState, PeerDevice, Sender, StatusDetail};
use bluemsg_harness::TestHarness;
use bluemsg_radio::{LanCapabilities, LanRadio, LanRadioConfig};
use bluemsg_runtime::{MessagingRuntime, RuntimeBuilder};
use std::sync::Arc;
use std::time::Duration;

fn free_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").expect("bind ephemeral port");
    socket.local_addr().expect("local addr").port()
}

async fn start_node(config: LanRadioConfig, label: &str) -> BluemsgResult<(Arc<LanRadio>, MessagingRuntime, TestHarness)> {
    let radio = Arc::new(LanRadio::new(config.clone()));
    let mut runtime = RuntimeBuilder::new(radio.clone())
        .with_capabilities(Arc::new(LanCapabilities::new(config)))
        .with_config(BluemsgConfig::testing())
        .with_no_logging()
        .start()
        .await?;
    let harness = TestHarness::attach(
        label,
        runtime.command_sender().expect("runtime started"),
        runtime.take_app_event_receiver().expect("receiver available"),
    );
    Ok((radio, runtime, harness))
}

#[tokio::test]
async fn test_discover_connect_and_chat_over_lan() -> BluemsgResult<()> {
    let port = free_udp_port();
    let (alice_radio, _alice_runtime, mut alice) =
        start_node(LanRadioConfig::loopback(port).with_device_name("Alice"), "alice").await?;
    let (_bob_radio, _bob_runtime, mut bob) =
        start_node(LanRadioConfig::loopback(port).with_device_name("Bob"), "bob").await?;

    alice.send(Command::StartListening).await?;
    alice.expect_status(StatusDetail::Ready).await?;
    alice
        .send(Command::MakeDiscoverable {
            duration: Some(Duration::from_secs(30)),
        })
        .await?;
    alice
        .expect_status(StatusDetail::Discoverable { seconds: 30 })
        .await?;

    bob.send(Command::StartScan).await?;
    let found = bob
        .expect("alice discovered", |e| matches!(e, AppEvent::PeerDiscovered { .. }))
        .await?;
    let AppEvent::PeerDiscovered { peer } = found else {
        unreachable!("matched above");
    };
    let expected = PeerDevice::new(
        format!("127.0.0.1:{}", alice_radio.stream_port().expect("alice registered")),
        None,
    );
    assert_eq!(peer, expected);
    assert_eq!(peer.list_name(), "Alice");

    bob.send(Command::Connect { peer }).await?;
    assert_eq!(
        bob.expect_state(ConnectionState::Connected).await?,
        StatusDetail::Connected {
            peer_name: "Alice".to_string()
        }
    );
    assert_eq!(
        alice.expect_state(ConnectionState::Connected).await?,
        StatusDetail::Connected {
            peer_name: "Bob".to_string()
        }
    );

    bob.send(Command::Send {
        text: "hello over the wire".to_string(),
    })
    .await?;
    let received = alice
        .expect("message", |e| matches!(e, AppEvent::MessageLogged { .. }))
        .await?;
    let AppEvent::MessageLogged { message } = received else {
        unreachable!("matched above");
    };
    assert_eq!(message.content, "hello over the wire");
    assert_eq!(message.sender, Sender::Remote("Bob".to_string()));

    bob.send(Command::Disconnect).await?;
    alice.expect_status(StatusDetail::Disconnected).await?;
    Ok(())
}
