//! Pending notifications and kind ranges

use crate::handle::{PipeHandle, UserHandle};
use crate::subsystem::{Subsystem, KIND_BLOCK};
use core::fmt;

/// Which queue a notification waits in until the next pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueClass {
    /// Drained on every pump cycle.
    Foreground,
    /// Drained only when the pump is asked to include background queues.
    Background,
}

/// A notification produced by the service and waiting for dispatch.
///
/// Consumed exactly once, in arrival order (`seq`), then discarded.
#[derive(Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: u32,
    pub payload: Vec<u8>,
    pub pipe: PipeHandle,
    pub user: UserHandle,
    pub class: QueueClass,
    /// Arrival order within the pipe. Assigned by the queue.
    pub seq: u64,
}

impl Notification {
    /// Subsystem whose kind block contains this notification.
    pub fn subsystem(&self) -> Option<Subsystem> {
        Subsystem::owning(self.kind)
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("kind", &self.kind)
            .field("payload_len", &self.payload.len())
            .field("pipe", &self.pipe)
            .field("user", &self.user)
            .field("class", &self.class)
            .field("seq", &self.seq)
            .finish()
    }
}

/// An inclusive range of notification kinds a registration listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KindRange {
    first: u32,
    last: u32,
}

impl KindRange {
    /// `first..=last`. Swapped bounds are normalized.
    pub const fn new(first: u32, last: u32) -> Self {
        if first <= last {
            Self { first, last }
        } else {
            Self { first: last, last: first }
        }
    }

    /// Exactly one kind.
    pub const fn single(kind: u32) -> Self {
        Self { first: kind, last: kind }
    }

    /// The whole kind block owned by a subsystem.
    pub const fn subsystem(s: Subsystem) -> Self {
        let base = s.callback_base();
        Self { first: base, last: base + KIND_BLOCK - 1 }
    }

    #[inline]
    pub const fn contains(&self, kind: u32) -> bool {
        kind >= self.first && kind <= self.last
    }

    pub const fn first(&self) -> u32 {
        self.first
    }

    pub const fn last(&self) -> u32 {
        self.last
    }
}

impl From<u32> for KindRange {
    fn from(kind: u32) -> Self {
        KindRange::single(kind)
    }
}
