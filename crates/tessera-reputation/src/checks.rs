// crates/tessera-reputation/src/checks.rs
//
// Pluggable validity checks applied to trust records before they reach a
// reporting sink. Checks are composed in order and the first failure wins.

use tessera_core::{PeerId, TesseraError, Trust};

/// A single predicate over an outgoing trust record.
pub trait TrustCheck: Send + Sync {
    fn check(&self, trust: &Trust) -> Result<(), TesseraError>;
}

/// Ordered list of checks, short-circuiting on the first failure.
#[derive(Default)]
pub struct CompositeCheck {
    checks: Vec<Box<dyn TrustCheck>>,
}

impl CompositeCheck {
    /// Append a check; it runs after every check already present.
    pub fn with(mut self, check: impl TrustCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl TrustCheck for CompositeCheck {
    fn check(&self, trust: &Trust) -> Result<(), TesseraError> {
        for check in &self.checks {
            check.check(trust)?;
        }
        Ok(())
    }
}

/// Rejects values outside `[0, 1]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueRangeCheck;

impl TrustCheck for ValueRangeCheck {
    fn check(&self, trust: &Trust) -> Result<(), TesseraError> {
        if trust.value().in_unit_range() {
            Ok(())
        } else {
            Err(TesseraError::InvalidTrust(format!(
                "value {} for peer {} is outside [0, 1]",
                trust.value(),
                trust.peer()
            )))
        }
    }
}

/// Rejects opinions about the local node itself.
#[derive(Debug, Clone, Copy)]
pub struct NotSelfCheck {
    local: PeerId,
}

impl NotSelfCheck {
    pub fn new(local: PeerId) -> Self {
        Self { local }
    }
}

impl TrustCheck for NotSelfCheck {
    fn check(&self, trust: &Trust) -> Result<(), TesseraError> {
        if trust.peer() == &self.local {
            Err(TesseraError::InvalidTrust(format!(
                "self trust for {}",
                self.local
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tessera_core::TrustValue;

    use super::*;

    struct Counting(Arc<AtomicUsize>);

    impl TrustCheck for Counting {
        fn check(&self, _trust: &Trust) -> Result<(), TesseraError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn peer(b: u8) -> PeerId {
        PeerId::from_bytes([b; 32])
    }

    #[test]
    fn empty_composite_accepts_everything() {
        let check = CompositeCheck::default();
        assert!(check.is_empty());
        assert!(check
            .check(&Trust::new(peer(1), TrustValue::from_int(5)))
            .is_ok());
    }

    #[test]
    fn range_check() {
        assert!(ValueRangeCheck
            .check(&Trust::new(peer(1), TrustValue::ONE))
            .is_ok());
        let err = ValueRangeCheck
            .check(&Trust::new(peer(1), TrustValue::from_int(2)))
            .unwrap_err();
        assert!(matches!(err, TesseraError::InvalidTrust(_)));
    }

    #[test]
    fn not_self_check() {
        let check = NotSelfCheck::new(peer(1));
        assert!(check.check(&Trust::new(peer(2), TrustValue::ONE)).is_ok());
        assert!(check.check(&Trust::new(peer(1), TrustValue::ONE)).is_err());
    }

    #[test]
    fn composite_short_circuits_on_first_failure() {
        let counter = Arc::new(AtomicUsize::new(0));
        let check = CompositeCheck::default()
            .with(Counting(counter.clone()))
            .with(NotSelfCheck::new(peer(1)))
            .with(Counting(counter.clone()));
        assert_eq!(check.len(), 3);

        assert!(check.check(&Trust::new(peer(1), TrustValue::ONE)).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(check.check(&Trust::new(peer(2), TrustValue::ONE)).is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
