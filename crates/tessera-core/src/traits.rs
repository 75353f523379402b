// crates/tessera-core/src/traits.rs

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TesseraError;
use crate::netmap::NetworkMap;

/// Source of per-epoch network maps.
///
/// Implemented by the daemon (static roster, per-epoch cache). Read-only from
/// the reputation subsystem's point of view.
#[async_trait]
pub trait NetworkMapSource: Send + Sync {
    /// Retrieve the roster recognized for `epoch`.
    async fn roster_for_epoch(&self, epoch: u64) -> Result<NetworkMap, TesseraError>;
}

#[async_trait]
impl<T: NetworkMapSource + ?Sized> NetworkMapSource for Arc<T> {
    async fn roster_for_epoch(&self, epoch: u64) -> Result<NetworkMap, TesseraError> {
        (**self).roster_for_epoch(epoch).await
    }
}
