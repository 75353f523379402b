// crates/tessera-reputation/src/controller.rs
//
// Orchestration of one local trust report.
//
// A report binds a Source (what to say) and a Target (where to say it) to an
// epoch, streams every record from the source iterator into the target
// writer, and always closes the writer. Failed runs are not retried: the next
// epoch boundary triggers a fresh report.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use tessera_core::{Epoch, PeerId, TesseraError, Trust};

use crate::checks::{CompositeCheck, TrustCheck};
use crate::handler::TrustHandler;
use crate::state::{ReportRun, ReportState};

/// Epoch-bound context shared by the source and target of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportContext {
    epoch: Epoch,
}

impl ReportContext {
    pub fn new(epoch: Epoch) -> Self {
        Self { epoch }
    }

    /// Epoch being reported.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

/// Iterator over the trust records of one epoch.
#[async_trait]
pub trait TrustIterator: Send {
    /// Call `handler` once per record, in any order. Stops at the first
    /// handler error and returns it.
    async fn iterate(&mut self, handler: &mut dyn TrustHandler) -> Result<(), TesseraError>;
}

/// Producer of per-epoch trust iterators.
#[async_trait]
pub trait Source: Send + Sync {
    async fn init_iterator(
        &self,
        ctx: &ReportContext,
    ) -> Result<Box<dyn TrustIterator>, TesseraError>;
}

/// Epoch-bound reporting sink.
///
/// Accepts zero or more `write` calls followed by exactly one `close`.
#[async_trait]
pub trait Writer: Send {
    async fn write(&mut self, trust: Trust) -> Result<(), TesseraError>;

    async fn close(&mut self) -> Result<(), TesseraError>;
}

/// Producer of per-epoch writers.
#[async_trait]
pub trait Target: Send + Sync {
    async fn init_writer(&self, ctx: &ReportContext) -> Result<Box<dyn Writer>, TesseraError>;
}

/// Parameters of a single report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPrm {
    epoch: Epoch,
}

impl ReportPrm {
    pub fn new(epoch: Epoch) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }
}

/// Outcome of a successful report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportSummary {
    pub epoch: Epoch,
    /// Records accepted by the writer.
    pub written: usize,
}

/// Drives local trust reports from a [`Source`] into a [`Target`].
pub struct TrustController {
    source: Arc<dyn Source>,
    target: Arc<dyn Target>,
    checks: CompositeCheck,
}

impl TrustController {
    pub fn new(source: Arc<dyn Source>, target: Arc<dyn Target>) -> Self {
        Self {
            source,
            target,
            checks: CompositeCheck::default(),
        }
    }

    /// Run `checks` on every record before it is written. A failing check
    /// aborts the run.
    pub fn with_checks(mut self, checks: CompositeCheck) -> Self {
        if checks.is_empty() {
            tracing::debug!("Trust controller configured without record checks");
        } else {
            tracing::debug!(checks = checks.len(), "Trust controller record checks configured");
        }
        self.checks = checks;
        self
    }

    /// Report local trust for `prm.epoch()`.
    ///
    /// Sequence: init iterator, init writer, iterate into the writer, close
    /// the writer. Once the writer exists it is closed exactly once whatever
    /// happens during iteration. The first failure is the one returned; a
    /// close error after an earlier failure is only logged.
    pub async fn report(&self, prm: ReportPrm) -> Result<ReportSummary, TesseraError> {
        let epoch = prm.epoch();
        let ctx = ReportContext::new(epoch);
        let mut run = ReportRun::new(epoch);

        run.advance(ReportState::IteratorInit)?;

        let mut iterator = match self.source.init_iterator(&ctx).await {
            Ok(it) => it,
            Err(e) => return Err(fail(&mut run, e, "could not initialize iterator")),
        };
        let mut writer = match self.target.init_writer(&ctx).await {
            Ok(w) => w,
            Err(e) => return Err(fail(&mut run, e, "could not initialize writer")),
        };

        let iterated = match run.advance(ReportState::Iterating) {
            Ok(()) => {
                let mut handler = CheckedWriter::new(writer.as_mut(), &self.checks);
                iterator
                    .iterate(&mut handler)
                    .await
                    .map(|()| handler.written)
            }
            Err(e) => Err(e),
        };

        let closing = run.advance(ReportState::Closing);
        let closed = writer.close().await;

        let result = match (iterated, closing.and(closed)) {
            (Ok(written), Ok(())) => Ok(ReportSummary { epoch, written }),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                tracing::warn!(
                    epoch,
                    error = %close_err,
                    "Could not close local trust writer after failed iteration"
                );
                Err(e)
            }
        };

        match result {
            Ok(summary) => {
                run.advance(ReportState::Done)?;
                tracing::info!(
                    epoch,
                    written = summary.written,
                    "Local trust report complete"
                );
                Ok(summary)
            }
            Err(e) => Err(fail(&mut run, e, "local trust report failed")),
        }
    }
}

/// Move `run` to Failed, log `err` and hand it back.
fn fail(run: &mut ReportRun, err: TesseraError, msg: &str) -> TesseraError {
    if let Err(state_err) = run.advance(ReportState::Failed) {
        tracing::error!(error = %state_err, "Report state machine rejected failure");
    }
    tracing::debug!(state_path = ?run.history(), "{}: {}", msg, err);
    err
}

/// Handler feeding a writer, enforcing the configured checks and the
/// one-record-per-peer rule of a run.
struct CheckedWriter<'a> {
    writer: &'a mut dyn Writer,
    checks: &'a CompositeCheck,
    seen: HashSet<PeerId>,
    written: usize,
}

impl<'a> CheckedWriter<'a> {
    fn new(writer: &'a mut dyn Writer, checks: &'a CompositeCheck) -> Self {
        Self {
            writer,
            checks,
            seen: HashSet::new(),
            written: 0,
        }
    }
}

#[async_trait]
impl<'a> TrustHandler for CheckedWriter<'a> {
    async fn handle(&mut self, trust: Trust) -> Result<(), TesseraError> {
        self.checks.check(&trust)?;
        if !self.seen.insert(*trust.peer()) {
            return Err(TesseraError::InvalidTrust(format!(
                "duplicate record for peer {}",
                trust.peer()
            )));
        }
        self.writer.write(trust).await?;
        self.written += 1;
        Ok(())
    }
}
