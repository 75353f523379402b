// crates/tessera-reputation/src/state.rs
//
// Per-run state machine for local trust reports.
//
// Valid transitions:
//   Idle -> IteratorInit -> Iterating -> Closing -> Done
//   Any non-terminal state -> Failed

use std::fmt;

use tessera_core::{Epoch, TesseraError};

/// Lifecycle states of a single report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    /// Run created, nothing acquired yet.
    Idle,
    /// Binding the source iterator and the target writer to the epoch.
    IteratorInit,
    /// Streaming trust records from the iterator into the writer.
    Iterating,
    /// Releasing the writer.
    Closing,
    /// Run completed successfully.
    Done,
    /// Run aborted by an error.
    Failed,
}

impl ReportState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportState::Done | ReportState::Failed)
    }
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportState::Idle => write!(f, "Idle"),
            ReportState::IteratorInit => write!(f, "IteratorInit"),
            ReportState::Iterating => write!(f, "Iterating"),
            ReportState::Closing => write!(f, "Closing"),
            ReportState::Done => write!(f, "Done"),
            ReportState::Failed => write!(f, "Failed"),
        }
    }
}

/// Tracks the progress of one report run and rejects transitions that would
/// re-enter an earlier state.
#[derive(Debug)]
pub struct ReportRun {
    epoch: Epoch,
    current: ReportState,
    history: Vec<ReportState>,
}

impl ReportRun {
    /// Create a run for `epoch` in the Idle state.
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            current: ReportState::Idle,
            history: vec![ReportState::Idle],
        }
    }

    pub fn current(&self) -> ReportState {
        self.current
    }

    /// Every state visited so far, in order.
    pub fn history(&self) -> &[ReportState] {
        &self.history
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns an error if the transition is not valid.
    pub fn advance(&mut self, next: ReportState) -> Result<(), TesseraError> {
        let valid = match (self.current, next) {
            (from, ReportState::Failed) => !from.is_terminal(),
            (ReportState::Idle, ReportState::IteratorInit) => true,
            (ReportState::IteratorInit, ReportState::Iterating) => true,
            (ReportState::Iterating, ReportState::Closing) => true,
            (ReportState::Closing, ReportState::Done) => true,
            _ => false,
        };

        if !valid {
            return Err(TesseraError::InvalidState(format!(
                "report for epoch {}: {} -> {}",
                self.epoch, self.current, next
            )));
        }

        tracing::debug!(
            epoch = self.epoch,
            "Report state transition: {} -> {}",
            self.current,
            next
        );
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}
