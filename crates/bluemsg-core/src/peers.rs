//! Discovered peer list
//!
//! Ordered by first sighting, deduplicated by address. Owned and written only
//! by the coordinator; presentation gets copies.

use crate::types::{PeerAddress, PeerDevice};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct DiscoveredPeers {
    peers: Vec<PeerDevice>,
    seen: HashSet<PeerAddress>,
}

impl DiscoveredPeers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting. Returns `true` only for a previously unseen address.
    pub fn insert(&mut self, peer: PeerDevice) -> bool {
        if !self.seen.insert(peer.address.clone()) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    pub fn clear(&mut self) {
        self.peers.clear();
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.seen.contains(address)
    }

    pub fn get(&self, index: usize) -> Option<&PeerDevice> {
        self.peers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerDevice> {
        self.peers.iter()
    }

    pub fn to_vec(&self) -> Vec<PeerDevice> {
        self.peers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_keep_first_sighting() {
        let mut peers = DiscoveredPeers::new();
        assert!(peers.insert(PeerDevice::new("A", None)));
        assert!(peers.insert(PeerDevice::named("B", "Bob")));
        assert!(!peers.insert(PeerDevice::named("A", "Alice")));

        let addresses: Vec<&str> = peers.iter().map(|p| p.address.as_str()).collect();
        assert_eq!(addresses, vec!["A", "B"]);
        assert_eq!(peers.get(0).and_then(|p| p.display_name.clone()), None);
    }

    #[test]
    fn test_clear_forgets_addresses() {
        let mut peers = DiscoveredPeers::new();
        peers.insert(PeerDevice::new("A", None));
        peers.clear();
        assert!(peers.is_empty());
        assert!(peers.insert(PeerDevice::new("A", None)));
    }
}
