// crates/tessera-reputation/src/lib.rs
//
// tessera-reputation: Local trust accounting and reporting for Tessera
// storage nodes.
//
// Every node records whether its interactions with peers were satisfactory.
// At each epoch boundary the controller turns those observations into
// normalized local trust (or a uniform prior when nothing was observed) and
// streams it into a reporting sink.

pub mod checks;
pub mod controller;
pub mod handler;
pub mod local;
pub mod sink;
pub mod state;
pub mod storage;

pub use checks::{CompositeCheck, NotSelfCheck, TrustCheck, ValueRangeCheck};
pub use controller::{
    ReportContext, ReportPrm, ReportSummary, Source, Target, TrustController, TrustIterator,
    Writer,
};
pub use handler::TrustHandler;
pub use local::{LocalTrustIterator, LocalTrustSource};
pub use sink::{FanoutTarget, LogTarget, MemoryTarget};
pub use state::{ReportRun, ReportState};
pub use storage::{EpochTrustValueStorage, LocalTrustStore, TrustStorage, UpdatePrm};
