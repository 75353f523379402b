// crates/tessera-core/src/netmap.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::identity::PeerId;

/// The roster of storage nodes recognized for one epoch.
///
/// Node order is whatever the source produced; it carries no meaning beyond
/// giving iteration a deterministic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMap {
    /// Epoch this roster belongs to.
    pub epoch: u64,
    /// Registered nodes.
    pub nodes: Vec<NodeInfo>,
}

/// Information about a single node in the network map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node public key.
    pub public_key: PeerId,
    /// Announced network addresses (multiaddr strings).
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl NodeInfo {
    pub fn new(public_key: PeerId) -> Self {
        Self {
            public_key,
            addresses: Vec::new(),
        }
    }
}

impl NetworkMap {
    pub fn new(epoch: u64, nodes: Vec<NodeInfo>) -> Self {
        Self { epoch, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node keys in roster order, each key once (first occurrence wins).
    /// Keys are compared byte for byte.
    pub fn distinct_peers(&self) -> Vec<PeerId> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        self.nodes
            .iter()
            .map(|n| n.public_key)
            .filter(|key| seen.insert(*key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(b: u8) -> PeerId {
        PeerId::from_bytes([b; 32])
    }

    #[test]
    fn distinct_peers_drops_repeated_keys() {
        let nm = NetworkMap::new(
            3,
            vec![
                NodeInfo::new(peer(2)),
                NodeInfo::new(peer(1)),
                NodeInfo::new(peer(2)),
                NodeInfo::new(peer(3)),
                NodeInfo::new(peer(1)),
            ],
        );
        assert_eq!(nm.len(), 5);
        assert_eq!(nm.distinct_peers(), vec![peer(2), peer(1), peer(3)]);
    }

    #[test]
    fn addresses_default_when_missing() {
        let json = format!(r#"{{"epoch":1,"nodes":[{{"public_key":"{}"}}]}}"#, peer(4));
        let nm: NetworkMap = serde_json::from_str(&json).unwrap();
        assert!(nm.nodes[0].addresses.is_empty());
        assert_eq!(nm.distinct_peers(), vec![peer(4)]);
    }
}
