//! BlueMsg Harness
//!
//! Testing infrastructure for BlueMsg that needs no radio hardware:
//!
//! - **SimulatedAir / SimRadio**: an in-memory radio medium. Devices listen,
//!   dial and scan each other over duplex pipes; scans can be scripted and
//!   dials held back to stage races.
//! - **SimCapabilities**: capability checks that can be switched off.
//! - **TestHarness** (feature `testing`): collects a coordinator's app events
//!   and waits for the ones a scenario expects.
//!
//! ```rust,ignore
//! let air = SimulatedAir::new();
//! let alice = air.add_device(Some("Alice"));
//! let bob = air.add_device(Some("Bob"));
//! bob.set_visible(true);
//!
//! let mut runtime = MessagingRuntime::for_testing(Arc::new(alice));
//! runtime.start().await?;
//! let mut harness = TestHarness::attach(
//!     "alice",
//!     runtime.command_sender().unwrap(),
//!     runtime.take_app_event_receiver().unwrap(),
//! );
//! harness.send(Command::StartScan).await?;
//! harness.expect("bob", |e| matches!(e, AppEvent::PeerDiscovered { .. })).await?;
//! ```

pub mod air;
pub mod capabilities;

#[cfg(feature = "testing")]
mod test_harness;

pub use air::{SimRadio, SimRadioStats, SimulatedAir};
pub use capabilities::SimCapabilities;

#[cfg(feature = "testing")]
pub use test_harness::{TestHarness, DEFAULT_EXPECT_TIMEOUT};
