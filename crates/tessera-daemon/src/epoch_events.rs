// crates/tessera-daemon/src/epoch_events.rs
//
// Epoch event types broadcast from the scheduler to daemon tasks.
//
// The EpochScheduler publishes events on a tokio broadcast channel.
// The EpochReporter subscribes to trigger local trust reports.

use tessera_core::Epoch;

/// Events emitted by the epoch scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochEvent {
    /// The epoch boundary was crossed and a new epoch has begun.
    NewEpoch {
        /// The new epoch number (just started).
        epoch: Epoch,
    },
}

impl EpochEvent {
    /// Epoch carried by the event.
    pub fn epoch(&self) -> Epoch {
        match self {
            EpochEvent::NewEpoch { epoch } => *epoch,
        }
    }
}
