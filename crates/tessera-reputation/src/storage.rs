// crates/tessera-reputation/src/storage.rs
//
// Epoch-scoped storage of locally observed trust.
//
// Observations (was a request to a peer satisfactory or not) are counted per
// peer and per epoch. A peer's trust for the epoch is the exact ratio
// satisfactory / total, so it always lies in [0, 1].
//
// Locking is partitioned: the epoch map is a DashMap (sharded locks) and each
// epoch accumulator carries its own RwLock, so writers for the open epoch
// never contend with a report reading a closed one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use tessera_core::{Epoch, PeerId, TesseraError, Trust, TrustValue};

use crate::handler::TrustHandler;

/// Parameters of a single trust observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatePrm {
    pub epoch: Epoch,
    pub peer: PeerId,
    /// Whether the interaction with the peer was satisfactory.
    pub satisfactory: bool,
}

impl UpdatePrm {
    pub fn new(epoch: Epoch, peer: PeerId, satisfactory: bool) -> Self {
        Self {
            epoch,
            peer,
            satisfactory,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    satisfactory: u64,
    total: u64,
}

/// Trust observations accumulated for one epoch.
#[derive(Debug)]
pub struct EpochTrustValueStorage {
    epoch: Epoch,
    items: RwLock<HashMap<PeerId, Counters>>,
}

impl EpochTrustValueStorage {
    /// Create an empty accumulator for `epoch`.
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Number of peers with at least one observation.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Record one observation about `peer`.
    pub fn update(&self, peer: PeerId, satisfactory: bool) {
        let mut items = self.items.write();
        let counters = items.entry(peer).or_default();
        counters.total += 1;
        if satisfactory {
            counters.satisfactory += 1;
        }
    }

    /// Current per-peer trust values, ordered by peer id.
    pub fn snapshot(&self) -> Result<Vec<Trust>, TesseraError> {
        let items = self.items.read();
        let mut trusts = Vec::with_capacity(items.len());
        for (peer, c) in items.iter().filter(|(_, c)| c.total > 0) {
            let value = TrustValue::from_ratio(c.satisfactory, c.total)?;
            trusts.push(Trust::new(*peer, value));
        }
        trusts.sort_by(|a, b| a.peer().cmp(b.peer()));
        Ok(trusts)
    }

    /// Pass every recorded trust value to `handler`.
    ///
    /// Fails with [`TesseraError::NoPositiveTrust`] before touching the
    /// handler when no peer has a positive value. Otherwise every recorded
    /// peer is emitted (zero values included) and the number of emitted
    /// records is returned. A handler error stops the iteration and is
    /// returned as is.
    ///
    /// Entries are snapshotted first so no lock is held across the handler.
    pub async fn iterate(&self, handler: &mut dyn TrustHandler) -> Result<usize, TesseraError> {
        let trusts = self.snapshot()?;
        if trusts.iter().all(|t| t.value().is_zero()) {
            return Err(TesseraError::NoPositiveTrust);
        }

        let mut emitted = 0;
        for trust in trusts {
            handler.handle(trust).await?;
            emitted += 1;
        }
        Ok(emitted)
    }
}

/// Read side of local trust storage used by the reporting path.
///
/// `data_for_epoch` answers [`TesseraError::NoPositiveTrust`] when the epoch
/// has no recorded data; every other error is a storage fault.
#[async_trait]
pub trait LocalTrustStore: Send + Sync {
    async fn data_for_epoch(&self, epoch: Epoch)
        -> Result<Arc<EpochTrustValueStorage>, TesseraError>;
}

/// Process-wide in-memory trust storage, one accumulator per epoch.
///
/// Accumulators are created lazily on the first observation for an epoch
/// and are never removed; retention is left to the owner of the storage.
#[derive(Debug, Default)]
pub struct TrustStorage {
    items: DashMap<Epoch, Arc<EpochTrustValueStorage>>,
}

impl TrustStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation, creating the epoch accumulator if needed.
    pub fn update(&self, prm: UpdatePrm) {
        let epoch_storage = self
            .items
            .entry(prm.epoch)
            .or_insert_with(|| Arc::new(EpochTrustValueStorage::new(prm.epoch)))
            .clone();
        // The shard guard is dropped above; only the epoch lock is taken here.
        epoch_storage.update(prm.peer, prm.satisfactory);
    }

    /// Accumulator for `epoch`, if any observation was recorded.
    pub fn get(&self, epoch: Epoch) -> Option<Arc<EpochTrustValueStorage>> {
        self.items.get(&epoch).map(|e| e.value().clone())
    }

    /// Epochs that have an accumulator, ascending.
    pub fn epochs(&self) -> Vec<Epoch> {
        let mut epochs: Vec<Epoch> = self.items.iter().map(|e| *e.key()).collect();
        epochs.sort_unstable();
        epochs
    }
}

#[async_trait]
impl LocalTrustStore for TrustStorage {
    async fn data_for_epoch(
        &self,
        epoch: Epoch,
    ) -> Result<Arc<EpochTrustValueStorage>, TesseraError> {
        self.get(epoch).ok_or(TesseraError::NoPositiveTrust)
    }
}
