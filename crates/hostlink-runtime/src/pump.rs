//! The callback pump
//!
//! One call to `pump` drains a pipe's queue and dispatches each
//! notification to every matching registration. The loop is synchronous,
//! runs on the caller's thread, and never runs twice at once for the
//! same pipe.
//!
//! Fault policy:
//!
//! - abort: the first faulting sink ends the cycle; the rest of the
//!   snapshot is carried over to the next one
//! - isolate: the fault is contained, reported, and draining continues

use crate::callbacks::CallbackTable;
use crate::diagnostics::FaultChannel;
use crate::queue::CallbackQueue;
use crate::tls::{self, DispatchUserGuard};
use hostlink_core::error::{ApiError, ApiResult, DispatchFault, FaultCause};
use hostlink_core::handle::PipeHandle;
use hostlink_core::{kerror, ktrace};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// How one cycle behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpPolicy {
    pub failure_isolation: bool,
    pub reentrancy_guard: bool,
    pub scratch_retain_bytes: usize,
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Notifications taken from the queue
    pub drained: usize,
    /// Sink invocations, faulting ones included
    pub dispatched: usize,
    /// Sink invocations that faulted
    pub faults: usize,
    /// Notifications left for the next cycle after an abort
    pub carried: usize,
}

/// Releases thread scratch however the cycle ends.
struct ReleaseOnExit(usize);

impl Drop for ReleaseOnExit {
    fn drop(&mut self) {
        tls::release_thread_memory(self.0);
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one pump cycle for `pipe`.
///
/// An unknown or closed pipe is not an error: nothing is dispatched.
pub fn pump(
    queue: &CallbackQueue,
    callbacks: &CallbackTable,
    faults: &FaultChannel,
    pipe: PipeHandle,
    include_background: bool,
    policy: PumpPolicy,
) -> ApiResult<PumpStats> {
    let _release = ReleaseOnExit(policy.scratch_retain_bytes);
    let mut stats = PumpStats::default();

    let Some(pq) = queue.get(pipe) else {
        return Ok(stats);
    };
    let _guard = if policy.reentrancy_guard {
        match pq.try_begin_pump() {
            Some(g) => Some(g),
            None => return Err(ApiError::PumpReentered(pipe)),
        }
    } else {
        None
    };

    let mut batch = pq.snapshot(include_background);
    stats.drained = batch.len();

    while let Some(n) = batch.pop_front() {
        // A sink may close the pipe; the rest of the batch goes with it.
        if !pq.is_open() {
            break;
        }
        for reg in callbacks.matching(&n) {
            if !reg.is_active() {
                continue;
            }
            stats.dispatched += 1;

            let outcome = {
                let _user = DispatchUserGuard::enter(n.pipe, n.user);
                panic::catch_unwind(AssertUnwindSafe(|| reg.sink().on_notification(&n)))
            };

            let cause = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(fault)) => FaultCause::Returned(fault.0),
                Err(payload) if !policy.failure_isolation => {
                    stats.faults += 1;
                    stats.carried = batch.len();
                    kerror!(
                        "{} panicked on kind {} (pipe {}, seq {}); aborting cycle, {} carried over",
                        reg.id(),
                        n.kind,
                        pipe,
                        n.seq,
                        stats.carried
                    );
                    pq.carry_over(batch);
                    panic::resume_unwind(payload);
                }
                Err(payload) => FaultCause::Panicked(panic_message(&*payload)),
            };

            stats.faults += 1;
            let fault = DispatchFault {
                pipe: n.pipe,
                user: n.user,
                kind: n.kind,
                seq: n.seq,
                registration: reg.id(),
                cause,
            };
            if policy.failure_isolation {
                faults.report(fault);
            } else {
                stats.carried = batch.len();
                kerror!("dispatch aborted: {}; {} carried over", fault, stats.carried);
                pq.carry_over(batch);
                return Err(ApiError::Dispatch(fault));
            }
        }
    }

    ktrace!(
        "pump: pipe {} drained {} dispatched {} faults {}",
        pipe,
        stats.drained,
        stats.dispatched,
        stats.faults
    );
    Ok(stats)
}
