// crates/tessera-reputation/src/handler.rs

use async_trait::async_trait;

use tessera_core::{TesseraError, Trust};

/// Consumer of trust records produced during one reporting run.
///
/// Returning an error stops the producer immediately; the error is handed
/// back to whoever drove the iteration.
#[async_trait]
pub trait TrustHandler: Send {
    async fn handle(&mut self, trust: Trust) -> Result<(), TesseraError>;
}

#[async_trait]
impl<F> TrustHandler for F
where
    F: FnMut(Trust) -> Result<(), TesseraError> + Send,
{
    async fn handle(&mut self, trust: Trust) -> Result<(), TesseraError> {
        self(trust)
    }
}
