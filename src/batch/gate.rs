//! Concurrency gate: a counting permit pool bounding in-flight item operations.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ItemFailure;

/// How many item operations may run at once
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConcurrencyLimit {
    /// At most this many operations in flight
    Bounded(NonZeroUsize),
    /// No limit
    Unbounded,
}

impl ConcurrencyLimit {
    /// Bounded limit; zero is treated as one
    pub fn bounded(max: usize) -> Self {
        Self::Bounded(NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN))
    }

    /// The bound, if any
    pub fn get(&self) -> Option<usize> {
        match self {
            Self::Bounded(n) => Some(n.get()),
            Self::Unbounded => None,
        }
    }
}

/// Permit pool shared by every task of one batch.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone, Debug)]
pub struct ConcurrencyGate {
    limit: ConcurrencyLimit,
    semaphore: Option<Arc<Semaphore>>,
}

impl ConcurrencyGate {
    /// Create a gate for the given limit
    pub fn new(limit: ConcurrencyLimit) -> Self {
        let semaphore = match limit {
            ConcurrencyLimit::Bounded(n) => Some(Arc::new(Semaphore::new(n.get()))),
            ConcurrencyLimit::Unbounded => None,
        };
        Self { limit, semaphore }
    }

    /// Gate admitting at most `max` operations at once
    pub fn bounded(max: usize) -> Self {
        Self::new(ConcurrencyLimit::bounded(max))
    }

    /// Gate that never blocks
    pub fn unbounded() -> Self {
        Self::new(ConcurrencyLimit::Unbounded)
    }

    /// Configured limit
    pub fn limit(&self) -> ConcurrencyLimit {
        self.limit
    }

    /// Permits currently free (`None` when unbounded)
    pub fn available_permits(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Wait until a permit is free.
    ///
    /// The permit is returned to the pool when the [`GatePermit`] is dropped,
    /// so release happens exactly once on every exit path, unwinding included.
    pub async fn acquire(&self) -> Result<GatePermit, ItemFailure> {
        match &self.semaphore {
            Some(semaphore) => {
                let permit = Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| ItemFailure::internal("concurrency gate closed"))?;
                Ok(GatePermit {
                    _permit: Some(permit),
                })
            }
            None => Ok(GatePermit { _permit: None }),
        }
    }
}

/// A held slot in a [`ConcurrencyGate`]; released on drop
#[must_use = "the permit is released as soon as it is dropped"]
#[derive(Debug)]
pub struct GatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}
