//! Fault reporting for the sweeper.
//!
//! A sweep pass never propagates a failure. Faults raised while removing one
//! expired pair are handed to a [`FaultReporter`] so the owning application
//! can surface them through its own logging.
//!
//! - `TracingReporter`: forwards faults to `tracing` at warn level
//! - `NoOpReporter`: discards faults

use crate::error::CacheError;

/// Sink for faults raised inside a sweep pass.
///
/// Implementations must be `Send + Sync`; the sweeper calls them from its
/// own thread of execution.
pub trait FaultReporter: Send + Sync {
    fn report(&self, fault: &CacheError);
}

/// Reports faults through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FaultReporter for TracingReporter {
    fn report(&self, fault: &CacheError) {
        tracing::warn!(error = %fault, "sweep fault");
    }
}

/// Discards every fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReporter;

impl FaultReporter for NoOpReporter {
    #[inline]
    fn report(&self, _fault: &CacheError) {}
}
