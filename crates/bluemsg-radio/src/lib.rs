//! Radio backends for BlueMsg
//!
//! Implementations of the `Radio` and `Capabilities` traits from
//! `bluemsg-core`:
//!
//! - [`LanRadio`] - UDP probe/announce discovery and TCP streams on a local
//!   network. Works anywhere and is the default backend.
//! - `RfcommRadio` - Bluetooth Classic RFCOMM through BlueZ. Needs the `bluez`
//!   feature and Linux.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bluemsg_radio::{open_radio, LanRadioConfig, RadioConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RadioConfig::new().with_lan(LanRadioConfig::new().with_device_name("Alice"));
//! let (radio, _capabilities) = open_radio(&config).await?;
//! println!("Using the {} radio", radio.radio_kind());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
pub mod lan;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "bluez", target_os = "linux"))] {
        mod bluez;
        pub use bluez::{BluezCapabilities, RfcommListenHandle, RfcommRadio};
    }
}

pub use config::{LanRadioConfig, RadioBackend, RadioConfig, RfcommConfig};
pub use error::RadioError;
pub use lan::{LanCapabilities, LanListenHandle, LanRadio};

use bluemsg_core::{Capabilities, Radio};
use std::sync::Arc;

/// Open the backend selected by `config` together with its capability checks
pub async fn open_radio(config: &RadioConfig) -> Result<(Arc<dyn Radio>, Arc<dyn Capabilities>), RadioError> {
    config.validate().map_err(RadioError::AdapterNotAvailable)?;
    match config.backend {
        RadioBackend::Lan => Ok((
            Arc::new(LanRadio::new(config.lan.clone())),
            Arc::new(LanCapabilities::new(config.lan.clone())),
        )),
        RadioBackend::Bluez => open_bluez(config).await,
    }
}

cfg_if::cfg_if! {
    if #[cfg(all(feature = "bluez", target_os = "linux"))] {
        async fn open_bluez(config: &RadioConfig) -> Result<(Arc<dyn Radio>, Arc<dyn Capabilities>), RadioError> {
            let capabilities = BluezCapabilities::new(&config.rfcomm).await;
            let radio = RfcommRadio::new(config.rfcomm.clone()).await?;
            Ok((Arc::new(radio), Arc::new(capabilities)))
        }
    } else {
        async fn open_bluez(_config: &RadioConfig) -> Result<(Arc<dyn Radio>, Arc<dyn Capabilities>), RadioError> {
            Err(RadioError::AdapterNotAvailable(
                "Bluetooth support requires Linux and the `bluez` feature".to_string(),
            ))
        }
    }
}
