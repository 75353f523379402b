// crates/tessera-daemon/src/pool.rs
//
// Bounded worker pool running local trust reports.
//
// A fixed number of tokio tasks drain a bounded queue of epochs. Submission
// never blocks: when the queue is full the request is dropped, and the next
// epoch boundary produces a fresh one. An epoch that is already queued or
// running is not queued again, so runs for the same epoch never overlap while
// runs for different epochs proceed independently.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use tessera_core::Epoch;
use tessera_reputation::{ReportPrm, TrustController};

/// Result of a report submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The report was queued.
    Queued,
    /// A report for the same epoch is already queued or running.
    AlreadyPending,
    /// The backlog is full; the request was dropped.
    BacklogFull,
    /// The pool is shutting down.
    ShutDown,
}

/// Cloneable submission side of a [`ReportPool`].
#[derive(Clone)]
pub struct ReportPoolHandle {
    tx: mpsc::Sender<Epoch>,
    pending: Arc<Mutex<HashSet<Epoch>>>,
    shutdown: watch::Receiver<bool>,
}

impl ReportPoolHandle {
    /// Queue a local trust report for `epoch` without waiting.
    pub fn submit(&self, epoch: Epoch) -> SubmitOutcome {
        if *self.shutdown.borrow() {
            return SubmitOutcome::ShutDown;
        }

        if !self.pending.lock().insert(epoch) {
            tracing::debug!(epoch, "Local trust report already pending");
            return SubmitOutcome::AlreadyPending;
        }

        match self.tx.try_send(epoch) {
            Ok(()) => SubmitOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.pending.lock().remove(&epoch);
                tracing::warn!(epoch, "Report backlog full, dropping local trust report");
                SubmitOutcome::BacklogFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.pending.lock().remove(&epoch);
                SubmitOutcome::ShutDown
            }
        }
    }

    /// Number of epochs queued or running.
    #[allow(dead_code)]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Fixed-size pool of report workers.
pub struct ReportPool {
    handle: ReportPoolHandle,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl ReportPool {
    /// Spawn `workers` tasks (at least one) sharing a backlog of `backlog`
    /// requests (at least one).
    pub fn spawn(controller: Arc<TrustController>, workers: usize, backlog: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel(backlog.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let pending = Arc::new(Mutex::new(HashSet::new()));

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    controller.clone(),
                    rx.clone(),
                    pending.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        tracing::info!(workers, backlog = backlog.max(1), "Report pool started");

        Self {
            handle: ReportPoolHandle {
                tx,
                pending,
                shutdown: shutdown_rx,
            },
            shutdown_tx,
            workers: handles,
        }
    }

    pub fn handle(&self) -> ReportPoolHandle {
        self.handle.clone()
    }

    #[allow(dead_code)]
    pub fn submit(&self, epoch: Epoch) -> SubmitOutcome {
        self.handle.submit(epoch)
    }

    /// Signal every worker to stop and wait for them. A worker finishes its
    /// current run first; queued requests are dropped.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!("Report worker terminated abnormally: {}", e);
            }
        }
        tracing::info!("Report pool stopped");
    }
}

async fn run_worker(
    id: usize,
    controller: Arc<TrustController>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Epoch>>>,
    pending: Arc<Mutex<HashSet<Epoch>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.changed() => None,
                epoch = rx.recv() => epoch,
            }
        };
        let Some(epoch) = next else {
            break;
        };

        tracing::debug!(worker = id, epoch, "Running local trust report");
        // Own task per run: a panicking source or sink fails only this run.
        let run = tokio::spawn({
            let controller = controller.clone();
            async move { controller.report(ReportPrm::new(epoch)).await }
        });
        match run.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!(epoch, error = %e, "Could not report local trust");
            }
            Err(e) => {
                tracing::error!(epoch, error = %e, "Local trust report aborted");
            }
        }
        pending.lock().remove(&epoch);
    }
    tracing::debug!(worker = id, "Report worker exiting");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use tessera_core::{PeerId, TesseraError, Trust, TrustValue};
    use tessera_reputation::{
        MemoryTarget, ReportContext, Source, TrustHandler, TrustIterator,
    };

    use super::*;

    fn peer(b: u8) -> PeerId {
        PeerId::from_bytes([b; 32])
    }

    /// Source that announces every run and, for gated epochs, waits for a
    /// permit before producing its single record.
    struct GatedSource {
        started: Arc<Notify>,
        release: Arc<Semaphore>,
        gated: fn(Epoch) -> bool,
    }

    struct OneRecord;

    #[async_trait]
    impl TrustIterator for OneRecord {
        async fn iterate(&mut self, handler: &mut dyn TrustHandler) -> Result<(), TesseraError> {
            handler.handle(Trust::new(peer(1), TrustValue::ONE)).await
        }
    }

    #[async_trait]
    impl Source for GatedSource {
        async fn init_iterator(
            &self,
            ctx: &ReportContext,
        ) -> Result<Box<dyn TrustIterator>, TesseraError> {
            self.started.notify_one();
            if (self.gated)(ctx.epoch()) {
                self.release
                    .acquire()
                    .await
                    .map_err(|e| TesseraError::Storage(e.to_string()))?
                    .forget();
            }
            Ok(Box::new(OneRecord))
        }
    }

    struct Fixture {
        pool: ReportPool,
        target: MemoryTarget,
        started: Arc<Notify>,
        release: Arc<Semaphore>,
    }

    fn fixture(workers: usize, backlog: usize, gated: fn(Epoch) -> bool) -> Fixture {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Semaphore::new(0));
        let target = MemoryTarget::new();
        let source = Arc::new(GatedSource {
            started: started.clone(),
            release: release.clone(),
            gated,
        });
        let controller = Arc::new(TrustController::new(source, Arc::new(target.clone())));
        Fixture {
            pool: ReportPool::spawn(controller, workers, backlog),
            target,
            started,
            release,
        }
    }

    async fn wait_for_report(target: &MemoryTarget, epoch: Epoch) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while target.report(epoch).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn wait_until_idle(handle: &ReportPoolHandle) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.pending() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn runs_submitted_reports() {
        let f = fixture(2, 4, |_| false);
        assert_eq!(f.pool.submit(3), SubmitOutcome::Queued);
        wait_for_report(&f.target, 3).await;
        assert_eq!(f.target.report(3).unwrap().len(), 1);
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn same_epoch_is_coalesced_while_pending() {
        let f = fixture(1, 4, |_| true);
        let handle = f.pool.handle();

        assert_eq!(handle.submit(5), SubmitOutcome::Queued);
        f.started.notified().await;
        assert_eq!(handle.submit(5), SubmitOutcome::AlreadyPending);

        f.release.add_permits(1);
        wait_for_report(&f.target, 5).await;
        wait_until_idle(&handle).await;

        f.release.add_permits(1);
        assert_eq!(handle.submit(5), SubmitOutcome::Queued);
        wait_until_idle(&handle).await;
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn full_backlog_drops_request() {
        let f = fixture(1, 1, |_| true);

        assert_eq!(f.pool.submit(1), SubmitOutcome::Queued);
        f.started.notified().await;
        // The only worker is busy with epoch 1; one slot left in the queue.
        assert_eq!(f.pool.submit(2), SubmitOutcome::Queued);
        assert_eq!(f.pool.submit(3), SubmitOutcome::BacklogFull);

        f.release.add_permits(2);
        wait_for_report(&f.target, 1).await;
        wait_for_report(&f.target, 2).await;
        assert!(f.target.report(3).is_none());

        // Dropped requests are not remembered as pending.
        f.release.add_permits(1);
        assert_eq!(f.pool.submit(3), SubmitOutcome::Queued);
        wait_for_report(&f.target, 3).await;
        f.pool.shutdown().await;
    }

    #[tokio::test]
    async fn blocked_epoch_does_not_hold_up_the_next() {
        let f = fixture(2, 4, |epoch| epoch == 7);

        assert_eq!(f.pool.submit(7), SubmitOutcome::Queued);
        f.started.notified().await;
        assert_eq!(f.pool.submit(8), SubmitOutcome::Queued);

        wait_for_report(&f.target, 8).await;
        assert!(f.target.report(7).is_none());

        f.release.add_permits(1);
        wait_for_report(&f.target, 7).await;
        f.pool.shutdown().await;
    }

    /// Source that panics for one epoch and reports a single record otherwise.
    struct PanickingSource {
        panic_epoch: Epoch,
    }

    #[async_trait]
    impl Source for PanickingSource {
        async fn init_iterator(
            &self,
            ctx: &ReportContext,
        ) -> Result<Box<dyn TrustIterator>, TesseraError> {
            if ctx.epoch() == self.panic_epoch {
                panic!("source crashed for epoch {}", ctx.epoch());
            }
            Ok(Box::new(OneRecord))
        }
    }

    #[tokio::test]
    async fn panicking_run_does_not_stop_the_worker() {
        let target = MemoryTarget::new();
        let controller = Arc::new(TrustController::new(
            Arc::new(PanickingSource { panic_epoch: 1 }),
            Arc::new(target.clone()),
        ));
        let pool = ReportPool::spawn(controller, 1, 4);
        let handle = pool.handle();

        assert_eq!(handle.submit(1), SubmitOutcome::Queued);
        wait_until_idle(&handle).await;
        assert!(target.report(1).is_none());

        // The same worker keeps serving, and the crashed epoch can be retried.
        assert_eq!(handle.submit(2), SubmitOutcome::Queued);
        wait_for_report(&target, 2).await;
        wait_until_idle(&handle).await;
        assert_eq!(handle.submit(1), SubmitOutcome::Queued);
        wait_until_idle(&handle).await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_refused() {
        let f = fixture(1, 1, |_| false);
        let handle = f.pool.handle();
        f.pool.shutdown().await;
        assert_eq!(handle.submit(1), SubmitOutcome::ShutDown);
    }
}
