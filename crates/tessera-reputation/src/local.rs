// crates/tessera-reputation/src/local.rs
//
// Local trust source: what this node reports about its peers for an epoch.
//
// Recorded observations are reported as they are. When there are none, the
// node falls back to the EigenTrust prior for unknown peers: a uniform
// opinion of 1/n over every other node in the epoch's network map
// (Kamvar et al., "The EigenTrust Algorithm", section 4.5). The two are
// never mixed within one run.

use std::sync::Arc;

use async_trait::async_trait;

use tessera_core::{Epoch, NetworkMapSource, PeerId, TesseraError, Trust, TrustValue};

use crate::controller::{ReportContext, Source, TrustIterator};
use crate::handler::TrustHandler;
use crate::storage::{EpochTrustValueStorage, LocalTrustStore};

/// [`Source`] backed by local trust storage and the network map.
pub struct LocalTrustSource {
    storage: Arc<dyn LocalTrustStore>,
    netmap: Arc<dyn NetworkMapSource>,
    local_key: PeerId,
}

impl LocalTrustSource {
    pub fn new(
        storage: Arc<dyn LocalTrustStore>,
        netmap: Arc<dyn NetworkMapSource>,
        local_key: PeerId,
    ) -> Self {
        Self {
            storage,
            netmap,
            local_key,
        }
    }

    /// Bind an iterator to the epoch of `ctx`.
    ///
    /// An epoch without data is not an error: the iterator will use the
    /// uniform fallback. Any other storage error is returned.
    pub async fn iterator_for(&self, ctx: &ReportContext) -> Result<LocalTrustIterator, TesseraError> {
        let epoch_storage = match self.storage.data_for_epoch(ctx.epoch()).await {
            Ok(s) => Some(s),
            Err(e) if e.is_no_positive_trust() => None,
            Err(e) => return Err(e),
        };

        Ok(LocalTrustIterator {
            epoch: ctx.epoch(),
            epoch_storage,
            netmap: self.netmap.clone(),
            local_key: self.local_key,
        })
    }
}

#[async_trait]
impl Source for LocalTrustSource {
    async fn init_iterator(
        &self,
        ctx: &ReportContext,
    ) -> Result<Box<dyn TrustIterator>, TesseraError> {
        let it = self.iterator_for(ctx).await?;
        Ok(Box::new(it))
    }
}

/// Local trust for one epoch: recorded values, or the uniform fallback.
pub struct LocalTrustIterator {
    epoch: Epoch,
    epoch_storage: Option<Arc<EpochTrustValueStorage>>,
    netmap: Arc<dyn NetworkMapSource>,
    local_key: PeerId,
}

impl LocalTrustIterator {
    /// Uniform trust over the distinct peers of the roster other than the
    /// local node. Repeated roster entries count once.
    async fn iterate_fallback(&self, handler: &mut dyn TrustHandler) -> Result<(), TesseraError> {
        let nm = self.netmap.roster_for_epoch(self.epoch).await?;

        let peers: Vec<PeerId> = nm
            .distinct_peers()
            .into_iter()
            .filter(|peer| *peer != self.local_key)
            .collect();
        let denominator = peers.len() as u64;

        if denominator == 0 {
            tracing::debug!(
                epoch = self.epoch,
                roster = nm.len(),
                "No peers besides the local node, nothing to report"
            );
            return Ok(());
        }

        let p = TrustValue::ONE.checked_div(TrustValue::from_int(denominator))?;

        tracing::debug!(
            epoch = self.epoch,
            peers = denominator,
            share = %p,
            "No positive trust recorded, reporting uniform trust"
        );

        for peer in peers {
            handler.handle(Trust::new(peer, p)).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl TrustIterator for LocalTrustIterator {
    async fn iterate(&mut self, handler: &mut dyn TrustHandler) -> Result<(), TesseraError> {
        if let Some(epoch_storage) = &self.epoch_storage {
            let mut counted = Counted {
                inner: &mut *handler,
                emitted: 0,
            };
            match epoch_storage.iterate(&mut counted).await {
                Ok(_) => return Ok(()),
                Err(e) if e.is_no_positive_trust() && counted.emitted == 0 => {}
                Err(e) => return Err(e),
            }
        }

        self.iterate_fallback(handler).await
    }
}

/// Counts records that made it through to the wrapped handler.
struct Counted<'a> {
    inner: &'a mut dyn TrustHandler,
    emitted: usize,
}

#[async_trait]
impl<'a> TrustHandler for Counted<'a> {
    async fn handle(&mut self, trust: Trust) -> Result<(), TesseraError> {
        self.inner.handle(trust).await?;
        self.emitted += 1;
        Ok(())
    }
}
