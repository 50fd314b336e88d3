//! Property-based tests for the discovered peer list
//!
//! For any sequence of sightings the list holds each address exactly once,
//! in the order the addresses were first seen.

use bluemsg_core::{DiscoveredPeers, PeerDevice};
use proptest::prelude::*;
use std::collections::HashSet;

/// Generate addresses from a small pool so duplicates are common
fn arb_address() -> impl Strategy<Value = String> {
    (0u8..12).prop_map(|n| format!("00:11:22:33:44:{:02X}", n))
}

/// Generate an optional device name
fn arb_name() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,15}").unwrap())
}

fn arb_sighting() -> impl Strategy<Value = PeerDevice> {
    (arb_address(), arb_name()).prop_map(|(address, name)| PeerDevice::new(address, name))
}

proptest! {
    /// Property: no address appears twice
    #[test]
    fn no_duplicate_addresses(sightings in prop::collection::vec(arb_sighting(), 0..64)) {
        let mut peers = DiscoveredPeers::new();
        for peer in sightings.iter().cloned() {
            peers.insert(peer);
        }

        let mut seen = HashSet::new();
        for peer in peers.iter() {
            prop_assert!(seen.insert(peer.address.clone()));
        }

        let distinct: HashSet<_> = sightings.iter().map(|p| p.address.clone()).collect();
        prop_assert_eq!(peers.len(), distinct.len());
    }

    /// Property: list order equals first-seen order
    #[test]
    fn first_seen_order_is_kept(sightings in prop::collection::vec(arb_sighting(), 0..64)) {
        let mut peers = DiscoveredPeers::new();
        let mut expected = Vec::new();
        let mut seen = HashSet::new();

        for peer in sightings {
            if seen.insert(peer.address.clone()) {
                expected.push(peer.address.clone());
            }
            peers.insert(peer);
        }

        let actual: Vec<_> = peers.iter().map(|p| p.address.clone()).collect();
        prop_assert_eq!(actual, expected);
    }

    /// Property: insert reports true exactly for new addresses
    #[test]
    fn insert_result_matches_novelty(sightings in prop::collection::vec(arb_sighting(), 0..64)) {
        let mut peers = DiscoveredPeers::new();
        for peer in sightings {
            let was_known = peers.contains(&peer.address);
            prop_assert_eq!(peers.insert(peer), !was_known);
        }
    }
}

#[test]
fn scan_with_repeated_sighting_keeps_two_peers() {
    let mut peers = DiscoveredPeers::new();
    for address in ["A", "B", "A"] {
        peers.insert(PeerDevice::new(address, None));
    }
    let addresses: Vec<&str> = peers.iter().map(|p| p.address.as_str()).collect();
    assert_eq!(addresses, vec!["A", "B"]);
    assert_eq!(peers.len(), 2);
}
