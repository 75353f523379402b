// crates/tessera-reputation/src/sink.rs
//
// Reporting sinks for local trust.
//
// - LogTarget: writes each record as a structured log line.
// - MemoryTarget: keeps the latest report per epoch in memory.
// - FanoutTarget: forwards one run to several targets.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use tessera_core::{Epoch, PeerId, TesseraError, Trust, TrustValue};

use crate::controller::{ReportContext, Target, Writer};

/// Target logging every record at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTarget;

struct LogWriter {
    epoch: Epoch,
}

#[async_trait]
impl Target for LogTarget {
    async fn init_writer(&self, ctx: &ReportContext) -> Result<Box<dyn Writer>, TesseraError> {
        Ok(Box::new(LogWriter { epoch: ctx.epoch() }))
    }
}

#[async_trait]
impl Writer for LogWriter {
    async fn write(&mut self, trust: Trust) -> Result<(), TesseraError> {
        tracing::info!(
            epoch = self.epoch,
            peer = %trust.peer(),
            value = %trust.value(),
            "new local trust"
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TesseraError> {
        Ok(())
    }
}

/// Target collecting reports in memory.
///
/// Within one run, a repeated write for the same peer overwrites the earlier
/// value. The run's records become visible on `close`, replacing any
/// previous report for the same epoch.
#[derive(Debug, Clone, Default)]
pub struct MemoryTarget {
    reports: Arc<DashMap<Epoch, HashMap<PeerId, TrustValue>>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed report for `epoch`.
    pub fn report(&self, epoch: Epoch) -> Option<HashMap<PeerId, TrustValue>> {
        self.reports.get(&epoch).map(|r| r.value().clone())
    }

    /// Epochs with a committed report, ascending.
    pub fn epochs(&self) -> Vec<Epoch> {
        let mut epochs: Vec<Epoch> = self.reports.iter().map(|r| *r.key()).collect();
        epochs.sort_unstable();
        epochs
    }
}

struct MemoryWriter {
    epoch: Epoch,
    pending: HashMap<PeerId, TrustValue>,
    reports: Arc<DashMap<Epoch, HashMap<PeerId, TrustValue>>>,
}

#[async_trait]
impl Target for MemoryTarget {
    async fn init_writer(&self, ctx: &ReportContext) -> Result<Box<dyn Writer>, TesseraError> {
        Ok(Box::new(MemoryWriter {
            epoch: ctx.epoch(),
            pending: HashMap::new(),
            reports: self.reports.clone(),
        }))
    }
}

#[async_trait]
impl Writer for MemoryWriter {
    async fn write(&mut self, trust: Trust) -> Result<(), TesseraError> {
        self.pending.insert(*trust.peer(), trust.value());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TesseraError> {
        let report = std::mem::take(&mut self.pending);
        self.reports.insert(self.epoch, report);
        Ok(())
    }
}

/// Target duplicating every run into each of its inner targets.
#[derive(Clone, Default)]
pub struct FanoutTarget {
    targets: Vec<Arc<dyn Target>>,
}

impl FanoutTarget {
    pub fn new(targets: Vec<Arc<dyn Target>>) -> Self {
        Self { targets }
    }

    pub fn push(&mut self, target: Arc<dyn Target>) {
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

struct FanoutWriter {
    writers: Vec<Box<dyn Writer>>,
}

#[async_trait]
impl Target for FanoutTarget {
    async fn init_writer(&self, ctx: &ReportContext) -> Result<Box<dyn Writer>, TesseraError> {
        let mut writers = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            match target.init_writer(ctx).await {
                Ok(w) => writers.push(w),
                Err(e) => {
                    // Release what was already acquired.
                    let mut partial = FanoutWriter { writers };
                    if let Err(close_err) = partial.close().await {
                        tracing::warn!(
                            epoch = ctx.epoch(),
                            error = %close_err,
                            "Could not close partially initialized fan-out writer"
                        );
                    }
                    return Err(e);
                }
            }
        }
        Ok(Box::new(FanoutWriter { writers }))
    }
}

#[async_trait]
impl Writer for FanoutWriter {
    async fn write(&mut self, trust: Trust) -> Result<(), TesseraError> {
        for w in self.writers.iter_mut() {
            w.write(trust).await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TesseraError> {
        let mut first_err = None;
        for w in self.writers.iter_mut() {
            if let Err(e) = w.close().await {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
