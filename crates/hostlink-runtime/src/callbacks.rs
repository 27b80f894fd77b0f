//! Callback registrations
//!
//! A registration binds a sink to a pipe and a range of notification
//! kinds, optionally filtered to one user. Registrations are kept in
//! creation order; dispatch walks them in that order.

use hostlink_core::error::RegistrationId;
use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::notification::{KindRange, Notification};
use hostlink_core::traits::CallbackSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub struct Registration {
    id: RegistrationId,
    pipe: PipeHandle,
    range: KindRange,
    user: Option<UserHandle>,
    sink: Arc<dyn CallbackSink>,
    active: AtomicBool,
}

impl Registration {
    #[inline]
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    #[inline]
    pub fn pipe(&self) -> PipeHandle {
        self.pipe
    }

    #[inline]
    pub fn range(&self) -> KindRange {
        self.range
    }

    #[inline]
    pub fn user(&self) -> Option<UserHandle> {
        self.user
    }

    /// False once unregistered, even if a pump cycle still holds it.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn sink(&self) -> &dyn CallbackSink {
        &*self.sink
    }

    fn matches(&self, n: &Notification) -> bool {
        self.pipe == n.pipe
            && self.range.contains(n.kind)
            && self.user.map_or(true, |u| u == n.user)
            && self.is_active()
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("pipe", &self.pipe)
            .field("range", &self.range)
            .field("user", &self.user)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Every live registration.
pub struct CallbackTable {
    next_id: AtomicU64,
    regs: RwLock<Vec<Arc<Registration>>>,
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackTable {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            regs: RwLock::new(Vec::new()),
        }
    }

    pub fn register(
        &self,
        pipe: PipeHandle,
        range: KindRange,
        user: Option<UserHandle>,
        sink: Arc<dyn CallbackSink>,
    ) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let reg = Arc::new(Registration {
            id,
            pipe,
            range,
            user,
            sink,
            active: AtomicBool::new(true),
        });
        self.regs.write().unwrap_or_else(|e| e.into_inner()).push(reg);
        id
    }

    /// Remove a registration. Takes effect immediately, including for the
    /// rest of a pump cycle in progress.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let mut regs = self.regs.write().unwrap_or_else(|e| e.into_inner());
        match regs.iter().position(|r| r.id == id) {
            Some(idx) => {
                regs.remove(idx).deactivate();
                true
            }
            None => false,
        }
    }

    /// Active registrations for `n`, in registration order.
    ///
    /// Returned as owned handles so sinks may register or unregister
    /// while being dispatched.
    pub fn matching(&self, n: &Notification) -> Vec<Arc<Registration>> {
        self.regs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.matches(n))
            .cloned()
            .collect()
    }

    /// Remove every registration on `pipe`. Returns how many.
    pub fn purge_pipe(&self, pipe: PipeHandle) -> usize {
        let mut regs = self.regs.write().unwrap_or_else(|e| e.into_inner());
        let before = regs.len();
        regs.retain(|r| {
            if r.pipe == pipe {
                r.deactivate();
                false
            } else {
                true
            }
        });
        before - regs.len()
    }

    pub fn count(&self, pipe: PipeHandle) -> usize {
        self.regs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.pipe == pipe)
            .count()
    }
}
