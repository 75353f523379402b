// crates/tessera-core/src/lib.rs
//
// tessera-core: Core types, traits, and trust primitives for the Tessera
// storage node.
//
// This is the leaf crate every other crate in the workspace depends on. It
// defines peer identities, exact-ratio trust values, network map types, the
// network map source contract, and the shared error type.

pub mod error;
pub mod identity;
pub mod netmap;
pub mod traits;
pub mod trust;

/// Epoch number: a monotonically increasing reporting period identifier.
pub type Epoch = u64;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use tessera_core::{PeerId, Trust, TrustValue};`

pub use error::TesseraError;
pub use identity::{PeerId, PEER_ID_LEN};
pub use netmap::{NetworkMap, NodeInfo};
pub use traits::NetworkMapSource;
pub use trust::{Trust, TrustValue};
