// crates/tessera-daemon/src/reporter.rs
//
// EpochReporter: bridges epoch boundary events to local trust reports.
//
// When epoch `e` begins, epoch `e - 1` is closed and its local trust is
// reported. Reports run on the worker pool; the event loop never waits for
// one to finish.

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use tessera_core::Epoch;

use crate::epoch_events::EpochEvent;
use crate::pool::{ReportPoolHandle, SubmitOutcome};

pub struct EpochReporter {
    events: broadcast::Receiver<EpochEvent>,
    pool: ReportPoolHandle,
    shutdown: watch::Receiver<bool>,
}

impl EpochReporter {
    pub fn new(
        events: broadcast::Receiver<EpochEvent>,
        pool: ReportPoolHandle,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            events,
            pool,
            shutdown,
        }
    }

    /// Submit the report triggered by `event`, if any.
    ///
    /// Returns the reported epoch and the submission outcome. The first
    /// epoch has no predecessor, so `NewEpoch { epoch: 0 }` reports nothing.
    pub fn on_event(&self, event: EpochEvent) -> Option<(Epoch, SubmitOutcome)> {
        let Some(closed) = event.epoch().checked_sub(1) else {
            tracing::debug!("Epoch 0 started, no previous epoch to report");
            return None;
        };

        let outcome = self.pool.submit(closed);
        tracing::debug!(epoch = closed, ?outcome, "Local trust report submitted");
        Some((closed, outcome))
    }

    /// Consume epoch events until shutdown or until the scheduler goes away.
    pub async fn run(mut self) {
        tracing::info!("Epoch reporter started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("Epoch reporter received shutdown signal");
                    break;
                }
                event = self.events.recv() => match event {
                    Ok(event) => {
                        self.on_event(event);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Epoch reporter lagged behind epoch events");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Epoch event channel closed");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use tessera_core::{PeerId, TesseraError, Trust, TrustValue};
    use tessera_reputation::{
        MemoryTarget, ReportContext, Source, TrustController, TrustHandler, TrustIterator,
    };

    use super::*;
    use crate::pool::ReportPool;

    /// Source recording which epochs were reported.
    #[derive(Default)]
    struct EpochLog {
        epochs: Arc<Mutex<Vec<Epoch>>>,
    }

    struct Single;

    #[async_trait]
    impl TrustIterator for Single {
        async fn iterate(&mut self, handler: &mut dyn TrustHandler) -> Result<(), TesseraError> {
            handler
                .handle(Trust::new(PeerId::from_bytes([1; 32]), TrustValue::ONE))
                .await
        }
    }

    #[async_trait]
    impl Source for EpochLog {
        async fn init_iterator(
            &self,
            ctx: &ReportContext,
        ) -> Result<Box<dyn TrustIterator>, TesseraError> {
            self.epochs.lock().push(ctx.epoch());
            Ok(Box::new(Single))
        }
    }

    fn pool() -> (ReportPool, MemoryTarget, Arc<Mutex<Vec<Epoch>>>) {
        let source = EpochLog::default();
        let epochs = source.epochs.clone();
        let target = MemoryTarget::new();
        let controller = Arc::new(TrustController::new(
            Arc::new(source),
            Arc::new(target.clone()),
        ));
        (ReportPool::spawn(controller, 2, 8), target, epochs)
    }

    #[tokio::test]
    async fn new_epoch_reports_previous_one() {
        let (pool, target, _) = pool();
        let (_tx, rx) = broadcast::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let reporter = EpochReporter::new(rx, pool.handle(), shutdown_rx);

        assert_eq!(
            reporter.on_event(EpochEvent::NewEpoch { epoch: 11 }),
            Some((10, SubmitOutcome::Queued))
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while target.report(10).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn epoch_zero_schedules_nothing() {
        let (pool, _, epochs) = pool();
        let (_tx, rx) = broadcast::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let reporter = EpochReporter::new(rx, pool.handle(), shutdown_rx);

        assert_eq!(reporter.on_event(EpochEvent::NewEpoch { epoch: 0 }), None);
        pool.shutdown().await;
        assert!(epochs.lock().is_empty());
    }

    #[tokio::test]
    async fn run_forwards_events_until_shutdown() {
        let (pool, target, epochs) = pool();
        let (tx, rx) = broadcast::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(EpochReporter::new(rx, pool.handle(), shutdown_rx).run());

        for epoch in 0..=3 {
            tx.send(EpochEvent::NewEpoch { epoch }).unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while target.epochs() != vec![0, 1, 2] {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        pool.shutdown().await;

        let mut seen = epochs.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn run_stops_when_scheduler_is_gone() {
        let (pool, _, _) = pool();
        let (tx, rx) = broadcast::channel::<EpochEvent>(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(EpochReporter::new(rx, pool.handle(), shutdown_rx).run());

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        pool.shutdown().await;
    }
}
