// crates/tessera-daemon/src/netmap.rs
//
// Network map sources available to the daemon.
//
// - StaticNetworkMap: the configured roster, identical for every epoch.
// - CachedNetworkMap: per-epoch cache in front of another source.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use tessera_core::{Epoch, NetworkMap, NetworkMapSource, NodeInfo, PeerId, TesseraError};

/// Roster taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticNetworkMap {
    nodes: Vec<NodeInfo>,
}

impl StaticNetworkMap {
    pub fn new(peers: Vec<PeerId>) -> Self {
        Self {
            nodes: peers.into_iter().map(NodeInfo::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl NetworkMapSource for StaticNetworkMap {
    async fn roster_for_epoch(&self, epoch: u64) -> Result<NetworkMap, TesseraError> {
        Ok(NetworkMap::new(epoch, self.nodes.clone()))
    }
}

/// Caches the network maps of the most recent epochs.
///
/// Holds at most `capacity` maps; inserting beyond that evicts the lowest
/// epoch. Failed lookups are not cached.
pub struct CachedNetworkMap<S> {
    inner: S,
    capacity: usize,
    cache: Mutex<BTreeMap<Epoch, NetworkMap>>,
}

impl<S: NetworkMapSource> CachedNetworkMap<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Epochs currently cached, ascending.
    #[allow(dead_code)]
    pub fn cached_epochs(&self) -> Vec<Epoch> {
        self.cache.lock().keys().copied().collect()
    }
}

#[async_trait]
impl<S: NetworkMapSource> NetworkMapSource for CachedNetworkMap<S> {
    async fn roster_for_epoch(&self, epoch: u64) -> Result<NetworkMap, TesseraError> {
        let cached = self.cache.lock().get(&epoch).cloned();
        if let Some(nm) = cached {
            return Ok(nm);
        }

        let nm = self.inner.roster_for_epoch(epoch).await?;

        let mut cache = self.cache.lock();
        cache.insert(epoch, nm.clone());
        while cache.len() > self.capacity {
            if let Some((evicted, _)) = cache.pop_first() {
                tracing::trace!(epoch = evicted, "Evicted cached network map");
            }
        }
        Ok(nm)
    }
}
