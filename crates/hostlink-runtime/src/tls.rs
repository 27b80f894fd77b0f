//! Thread-local state for hostlink
//!
//! Two pieces of per-thread state:
//!
//! - the pipe/user of the notification currently being dispatched on
//!   this thread, which is what `current_user()` reports during a sink
//! - a scratch buffer that remote calls stage their replies in, released
//!   after every pump cycle

use hostlink_core::handle::{PipeHandle, UserHandle};
use std::cell::{Cell, RefCell};

thread_local! {
    /// Pipe of the notification being dispatched (0 = none)
    static DISPATCH_PIPE: Cell<u32> = const { Cell::new(0) };

    /// User of the notification being dispatched (0 = none)
    static DISPATCH_USER: Cell<u32> = const { Cell::new(0) };

    /// Reply staging buffer for remote calls
    static SCRATCH: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

/// The user whose notification is being dispatched on this thread.
#[inline]
pub fn dispatch_user() -> Option<UserHandle> {
    UserHandle::new(DISPATCH_USER.with(|cell| cell.get())).to_option()
}

/// The pipe whose notification is being dispatched on this thread.
#[inline]
pub fn dispatch_pipe() -> Option<PipeHandle> {
    PipeHandle::new(DISPATCH_PIPE.with(|cell| cell.get())).to_option()
}

/// Are we inside a sink invocation?
#[inline]
pub fn is_dispatching() -> bool {
    DISPATCH_USER.with(|cell| cell.get() != 0)
}

/// Sets the dispatch pipe/user for its lifetime and restores the previous
/// values on drop, including during unwinding.
pub struct DispatchUserGuard {
    prev_pipe: u32,
    prev_user: u32,
}

impl DispatchUserGuard {
    pub fn enter(pipe: PipeHandle, user: UserHandle) -> Self {
        let prev_pipe = DISPATCH_PIPE.with(|cell| cell.replace(pipe.as_u32()));
        let prev_user = DISPATCH_USER.with(|cell| cell.replace(user.as_u32()));
        Self { prev_pipe, prev_user }
    }
}

impl Drop for DispatchUserGuard {
    fn drop(&mut self) {
        DISPATCH_PIPE.with(|cell| cell.set(self.prev_pipe));
        DISPATCH_USER.with(|cell| cell.set(self.prev_user));
    }
}

/// Run `f` with this thread's scratch buffer, cleared.
///
/// A nested call (a sink making a remote call from inside another remote
/// call's reply handler) gets a fresh temporary buffer.
pub fn with_scratch<R>(f: impl FnOnce(&mut Vec<u8>) -> R) -> R {
    SCRATCH.with(|cell| match cell.try_borrow_mut() {
        Ok(mut buf) => {
            buf.clear();
            f(&mut buf)
        }
        Err(_) => f(&mut Vec::new()),
    })
}

/// Capacity currently held by this thread's scratch buffer.
pub fn scratch_capacity() -> usize {
    SCRATCH.with(|cell| cell.try_borrow().map(|b| b.capacity()).unwrap_or(0))
}

/// Drop this thread's scratch memory, keeping at most `retain` bytes.
///
/// A no-op while the buffer is in use further up the stack.
pub fn release_thread_memory(retain: usize) {
    SCRATCH.with(|cell| {
        if let Ok(mut buf) = cell.try_borrow_mut() {
            buf.clear();
            buf.shrink_to(retain);
        }
    });
}
