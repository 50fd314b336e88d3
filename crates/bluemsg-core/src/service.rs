//! Service identity shared by the listening and the dialing side

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known service UUID both ends must agree on
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0xfa87c0d0_afac_11de_8a39_0800200c9a66);

/// Human-readable service name registered alongside the UUID
pub const SERVICE_NAME: &str = "BluetoothMessaging";

/// Named, UUID-identified service endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub uuid: Uuid,
    pub name: String,
}

impl ServiceRecord {
    pub fn new<N: Into<String>>(uuid: Uuid, name: N) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self::new(SERVICE_UUID, SERVICE_NAME)
    }
}
