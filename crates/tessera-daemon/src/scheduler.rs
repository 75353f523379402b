// crates/tessera-daemon/src/scheduler.rs
//
// Epoch scheduler for the Tessera daemon.
//
// Advances the epoch counter at a fixed interval and publishes a NewEpoch
// event for every boundary crossed.

use std::time::Duration;

use tokio::sync::{broadcast, watch};

use tessera_core::Epoch;

use crate::epoch_events::EpochEvent;

/// Scheduler that ticks epochs and broadcasts boundary events.
pub struct EpochScheduler {
    /// Wall-clock length of one epoch.
    interval: Duration,
    /// The epoch currently in progress.
    current_epoch: Epoch,
    events: broadcast::Sender<EpochEvent>,
    shutdown: watch::Receiver<bool>,
}

impl EpochScheduler {
    /// Create a scheduler starting in `start_epoch`.
    pub fn new(
        interval: Duration,
        start_epoch: Epoch,
        events: broadcast::Sender<EpochEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            interval,
            current_epoch: start_epoch,
            events,
            shutdown,
        }
    }

    #[allow(dead_code)]
    pub fn current_epoch(&self) -> Epoch {
        self.current_epoch
    }

    /// Run the scheduler loop until the shutdown signal fires.
    pub async fn run(&mut self) {
        tracing::info!(
            "Epoch scheduler started (interval={:?}, epoch={})",
            self.interval,
            self.current_epoch
        );

        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately; the epoch in progress is not
        // a boundary.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("Epoch scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    self.advance_epoch();
                }
            }
        }
    }

    /// Move to the next epoch and announce the boundary.
    pub fn advance_epoch(&mut self) -> Epoch {
        self.current_epoch += 1;
        tracing::info!("=== EPOCH {} BOUNDARY ===", self.current_epoch);

        if self
            .events
            .send(EpochEvent::NewEpoch {
                epoch: self.current_epoch,
            })
            .is_err()
        {
            tracing::debug!(
                epoch = self.current_epoch,
                "No subscribers for epoch event"
            );
        }
        self.current_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_publishes_new_epoch() {
        let (tx, mut rx) = broadcast::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut scheduler = EpochScheduler::new(Duration::from_secs(60), 4, tx, shutdown_rx);

        assert_eq!(scheduler.advance_epoch(), 5);
        assert_eq!(scheduler.advance_epoch(), 6);

        assert_eq!(rx.try_recv().unwrap(), EpochEvent::NewEpoch { epoch: 5 });
        assert_eq!(rx.try_recv().unwrap(), EpochEvent::NewEpoch { epoch: 6 });
        assert_eq!(scheduler.current_epoch(), 6);
    }

    #[test]
    fn advance_without_subscribers_still_counts() {
        let (tx, _) = broadcast::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut scheduler = EpochScheduler::new(Duration::from_secs(60), 0, tx, shutdown_rx);
        assert_eq!(scheduler.advance_epoch(), 1);
    }

    #[tokio::test]
    async fn run_ticks_until_shutdown() {
        let (tx, mut rx) = broadcast::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut scheduler = EpochScheduler::new(Duration::from_millis(5), 0, tx, shutdown_rx);
        let task = tokio::spawn(async move {
            scheduler.run().await;
            scheduler.current_epoch()
        });

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, EpochEvent::NewEpoch { epoch: 1 });

        shutdown_tx.send(true).unwrap();
        let last = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(last >= 1);
    }
}
