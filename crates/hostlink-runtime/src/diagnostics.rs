//! Diagnostics: the dispatch fault channel and crash hook pass-through

use crate::config::defaults;
use crossbeam_queue::ArrayQueue;
use hostlink_core::error::DispatchFault;
use hostlink_core::traits::{CrashHandlerConfig, CrashReporter};
use hostlink_core::{kdebug, kwarn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Called for every fault as it is reported.
pub type FaultHook = Arc<dyn Fn(&DispatchFault) + Send + Sync>;

/// Faults contained by the pump in isolation mode.
///
/// Bounded: once full, each new fault evicts the oldest one and the
/// eviction is counted in `dropped`.
pub struct FaultChannel {
    faults: ArrayQueue<DispatchFault>,
    dropped: AtomicU64,
    hook: RwLock<Option<FaultHook>>,
}

impl Default for FaultChannel {
    fn default() -> Self {
        Self::with_capacity(defaults::FAULT_CAPACITY)
    }
}

impl FaultChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel holding at most `capacity` faults (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            faults: ArrayQueue::new(capacity.max(1)),
            dropped: AtomicU64::new(0),
            hook: RwLock::new(None),
        }
    }

    pub fn report(&self, fault: DispatchFault) {
        kwarn!("dispatch fault contained: {}", fault);
        let hook = self.hook.read().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(hook) = hook {
            hook(&fault);
        }
        if self.faults.force_push(fault).is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drain every fault reported so far, oldest first.
    pub fn take(&self) -> Vec<DispatchFault> {
        std::iter::from_fn(|| self.faults.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.faults.len()
    }

    pub fn capacity(&self) -> usize {
        self.faults.capacity()
    }

    /// Faults evicted because the channel was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    pub fn set_hook(&self, hook: Option<FaultHook>) {
        *self.hook.write().unwrap_or_else(|e| e.into_inner()) = hook;
    }
}

/// Forwards crash hooks to the installed reporter, if any.
#[derive(Default)]
pub struct CrashHooks {
    reporter: RwLock<Option<Arc<dyn CrashReporter>>>,
}

impl CrashHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reporter(&self, reporter: Option<Arc<dyn CrashReporter>>) {
        *self.reporter.write().unwrap_or_else(|e| e.into_inner()) = reporter;
    }

    fn with(&self, what: &str, f: impl FnOnce(&dyn CrashReporter)) {
        let reporter = self.reporter.read().unwrap_or_else(|e| e.into_inner()).clone();
        match reporter {
            Some(r) => f(&*r),
            None => kdebug!("crash: {} dropped, no reporter installed", what),
        }
    }

    pub fn use_crash_handler(&self, config: CrashHandlerConfig) {
        self.with("use_crash_handler", |r| r.install(config));
    }

    pub fn set_app_id(&self, app_id: u32) {
        self.with("set_app_id", |r| r.set_app_id(app_id));
    }

    pub fn set_comment(&self, comment: &str) {
        self.with("set_mini_dump_comment", |r| r.set_comment(comment));
    }

    pub fn write_dump(&self, exception_code: u32, build_id: u32) {
        self.with("write_mini_dump", |r| r.write_dump(exception_code, build_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostlink_core::error::{FaultCause, RegistrationId};
    use hostlink_core::handle::{PipeHandle, UserHandle};
    use hostlink_module::LogCrashReporter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fault(seq: u64) -> DispatchFault {
        DispatchFault {
            pipe: PipeHandle::new(1),
            user: UserHandle::new(1),
            kind: 100,
            seq,
            registration: RegistrationId(1),
            cause: FaultCause::Returned("nope".into()),
        }
    }

    #[test]
    fn test_take_in_order() {
        let ch = FaultChannel::new();
        ch.report(fault(1));
        ch.report(fault(2));
        assert_eq!(ch.len(), 2);
        let seqs: Vec<_> = ch.take().iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert!(ch.is_empty());
    }

    #[test]
    fn test_bounded_keeps_newest() {
        let ch = FaultChannel::with_capacity(4);
        for seq in 0..10_000 {
            ch.report(fault(seq));
        }
        assert_eq!(ch.len(), 4);
        assert_eq!(ch.dropped(), 9_996);
        let seqs: Vec<_> = ch.take().iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![9_996, 9_997, 9_998, 9_999]);
        assert_eq!(FaultChannel::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_hook() {
        let ch = FaultChannel::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        ch.set_hook(Some(Arc::new(move |_: &DispatchFault| {
            h.fetch_add(1, Ordering::SeqCst);
        })));
        ch.report(fault(1));
        ch.set_hook(None);
        ch.report(fault(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_crash_pass_through() {
        let hooks = CrashHooks::new();
        hooks.write_dump(1, 1);

        let reporter = Arc::new(LogCrashReporter::new());
        hooks.set_reporter(Some(reporter.clone()));
        hooks.set_app_id(480);
        hooks.set_comment("level 3");
        hooks.write_dump(0xC000_0005, 42);
        assert_eq!(reporter.dumps_written(), 1);
        assert_eq!(reporter.app_id(), Some(480));
        assert_eq!(reporter.comment().as_deref(), Some("level 3"));
    }
}
