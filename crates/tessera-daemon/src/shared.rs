// crates/tessera-daemon/src/shared.rs
//
// DaemonSharedState: process-wide state for the Tessera daemon.
//
// Constructed once in main.rs, then injected into the reporting pipeline.
// The trust storage is written by the request path and read by reports.

use std::sync::Arc;
use std::time::Instant;

use tessera_core::{NetworkMapSource, PeerId};
use tessera_reputation::{
    CompositeCheck, LocalTrustSource, NotSelfCheck, Target, TrustController, TrustStorage,
    ValueRangeCheck,
};

#[derive(Clone)]
pub struct DaemonSharedState {
    /// Public key of this node.
    pub local_key: PeerId,
    /// Local trust observations, one accumulator per epoch.
    ///
    /// Nothing in the daemon writes here. Observations are fed in by the
    /// node's request path through [`TrustStorage::update`]; until a producer
    /// is attached, every report is the uniform fallback over the roster.
    pub trust_storage: Arc<TrustStorage>,
    /// Network map used for the uniform fallback.
    pub netmap: Arc<dyn NetworkMapSource>,
    /// Daemon start time for uptime calculation.
    pub start_time: Instant,
}

impl DaemonSharedState {
    pub fn new(local_key: PeerId, netmap: Arc<dyn NetworkMapSource>) -> Self {
        Self {
            local_key,
            trust_storage: Arc::new(TrustStorage::new()),
            netmap,
            start_time: Instant::now(),
        }
    }

    /// Controller reporting this node's local trust into `target`, with the
    /// standard record checks.
    pub fn trust_controller(&self, target: Arc<dyn Target>) -> TrustController {
        let source = LocalTrustSource::new(
            self.trust_storage.clone(),
            self.netmap.clone(),
            self.local_key,
        );
        TrustController::new(Arc::new(source), target).with_checks(
            CompositeCheck::default()
                .with(ValueRangeCheck)
                .with(NotSelfCheck::new(self.local_key)),
        )
    }
}

#[cfg(test)]
mod tests {
    use tessera_core::TrustValue;
    use tessera_reputation::{MemoryTarget, ReportPrm, UpdatePrm};

    use super::*;
    use crate::netmap::StaticNetworkMap;

    fn peer(b: u8) -> PeerId {
        PeerId::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn controller_reports_recorded_trust() {
        let netmap = Arc::new(StaticNetworkMap::new(vec![peer(1), peer(2), peer(3)]));
        let state = DaemonSharedState::new(peer(1), netmap);
        state.trust_storage.update(UpdatePrm::new(2, peer(2), true));
        state.trust_storage.update(UpdatePrm::new(2, peer(3), false));

        let target = MemoryTarget::new();
        let summary = state
            .trust_controller(Arc::new(target.clone()))
            .report(ReportPrm::new(2))
            .await
            .unwrap();

        assert_eq!(summary.written, 2);
        let report = target.report(2).unwrap();
        assert_eq!(report[&peer(2)], TrustValue::ONE);
        assert_eq!(report[&peer(3)], TrustValue::ZERO);
    }

    #[tokio::test]
    async fn self_observation_is_rejected() {
        let netmap = Arc::new(StaticNetworkMap::new(vec![peer(1), peer(2)]));
        let state = DaemonSharedState::new(peer(1), netmap);
        state.trust_storage.update(UpdatePrm::new(5, peer(1), true));

        let target = MemoryTarget::new();
        let err = state
            .trust_controller(Arc::new(target.clone()))
            .report(ReportPrm::new(5))
            .await
            .unwrap_err();
        assert!(matches!(err, tessera_core::TesseraError::InvalidTrust(_)));
        // The writer is still closed, committing an empty report.
        assert_eq!(target.report(5).map(|r| r.len()), Some(0));
    }
}
