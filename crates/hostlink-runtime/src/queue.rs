//! Per-pipe notification queues
//!
//! Each open pipe owns a foreground queue, a background queue and, per
//! class, a carry-over queue of notifications an aborted pump cycle did
//! not get to. Arrival sequence numbers are shared across the classes,
//! so a snapshot that includes both can be merged back into arrival
//! order. Carried background notifications stay background: only a
//! cycle that asks for background queues sees them.

use hostlink_core::handle::{PipeHandle, UserHandle};
use hostlink_core::notification::{Notification, QueueClass};
use hostlink_core::service::NotificationOutlet;
use hostlink_core::ktrace;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Default)]
struct Pending {
    foreground: VecDeque<Notification>,
    background: VecDeque<Notification>,
    carried_fg: VecDeque<Notification>,
    carried_bg: VecDeque<Notification>,
    next_seq: u64,
}

/// Queues for one pipe.
pub struct PipeQueue {
    pipe: PipeHandle,
    pending: Mutex<Pending>,
    open: AtomicBool,
    pumping: AtomicBool,
}

impl PipeQueue {
    fn new(pipe: PipeHandle) -> Self {
        Self {
            pipe,
            pending: Mutex::new(Pending::default()),
            open: AtomicBool::new(true),
            pumping: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[inline]
    pub fn pipe(&self) -> PipeHandle {
        self.pipe
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn push(&self, user: UserHandle, kind: u32, payload: Vec<u8>, class: QueueClass) -> bool {
        let mut p = self.lock();
        if !self.is_open() {
            return false;
        }
        let seq = p.next_seq;
        p.next_seq += 1;
        let n = Notification {
            kind,
            payload,
            pipe: self.pipe,
            user,
            class,
            seq,
        };
        match class {
            QueueClass::Foreground => p.foreground.push_back(n),
            QueueClass::Background => p.background.push_back(n),
        }
        true
    }

    /// Take everything due this cycle in one locked swap: carried-over
    /// notifications first, then the queued ones in arrival order.
    pub fn snapshot(&self, include_background: bool) -> VecDeque<Notification> {
        let mut p = self.lock();
        let carried_fg = std::mem::take(&mut p.carried_fg);
        let fg = std::mem::take(&mut p.foreground);
        if include_background {
            let carried_bg = std::mem::take(&mut p.carried_bg);
            let bg = std::mem::take(&mut p.background);
            let mut batch = merge_by_seq(carried_fg, carried_bg);
            batch.extend(merge_by_seq(fg, bg));
            batch
        } else {
            let mut batch = carried_fg;
            batch.extend(fg);
            batch
        }
    }

    /// Put undispatched notifications back at the front of their class
    /// for the next cycle.
    pub fn carry_over(&self, remaining: VecDeque<Notification>) {
        if remaining.is_empty() {
            return;
        }
        let mut p = self.lock();
        if !self.is_open() {
            return;
        }
        let (mut fg, mut bg): (VecDeque<_>, VecDeque<_>) = remaining
            .into_iter()
            .partition(|n| n.class == QueueClass::Foreground);
        fg.extend(p.carried_fg.drain(..));
        bg.extend(p.carried_bg.drain(..));
        p.carried_fg = fg;
        p.carried_bg = bg;
    }

    /// Notifications waiting, by class, carried-over ones included.
    pub fn pending(&self) -> (usize, usize) {
        let p = self.lock();
        (
            p.foreground.len() + p.carried_fg.len(),
            p.background.len() + p.carried_bg.len(),
        )
    }

    /// Mark this pipe as being pumped. `None` if it already is.
    pub fn try_begin_pump(self: &Arc<Self>) -> Option<PumpGuard> {
        self.pumping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PumpGuard { queue: self.clone() })
    }

    pub fn is_pumping(&self) -> bool {
        self.pumping.load(Ordering::Acquire)
    }

    fn close(&self) -> usize {
        let mut p = self.lock();
        self.open.store(false, Ordering::Release);
        let dropped = p.foreground.len()
            + p.background.len()
            + p.carried_fg.len()
            + p.carried_bg.len();
        p.foreground.clear();
        p.background.clear();
        p.carried_fg.clear();
        p.carried_bg.clear();
        dropped
    }
}

/// Clears the pumping flag on drop, including during unwinding.
pub struct PumpGuard {
    queue: Arc<PipeQueue>,
}

impl Drop for PumpGuard {
    fn drop(&mut self) {
        self.queue.pumping.store(false, Ordering::Release);
    }
}

fn merge_by_seq(
    mut a: VecDeque<Notification>,
    mut b: VecDeque<Notification>,
) -> VecDeque<Notification> {
    let mut out = VecDeque::with_capacity(a.len() + b.len());
    loop {
        let take_a = match (a.front(), b.front()) {
            (Some(x), Some(y)) => x.seq < y.seq,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_a { a.pop_front() } else { b.pop_front() };
        out.extend(next);
    }
    out
}

/// All pipes' queues.
#[derive(Default)]
pub struct CallbackQueue {
    pipes: RwLock<HashMap<PipeHandle, Arc<PipeQueue>>>,
}

impl CallbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, pipe: PipeHandle) {
        self.pipes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(pipe)
            .or_insert_with(|| Arc::new(PipeQueue::new(pipe)));
    }

    /// Drop a pipe's queues. Returns the number of notifications discarded.
    pub fn close(&self, pipe: PipeHandle) -> usize {
        let queue = self
            .pipes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&pipe);
        queue.map(|q| q.close()).unwrap_or(0)
    }

    pub fn get(&self, pipe: PipeHandle) -> Option<Arc<PipeQueue>> {
        self.pipes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pipe)
            .cloned()
    }

    /// Queue a notification. False if the pipe is not open.
    pub fn enqueue(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        kind: u32,
        payload: Vec<u8>,
        class: QueueClass,
    ) -> bool {
        match self.get(pipe) {
            Some(q) => {
                ktrace!("queue: pipe {} user {} kind {} ({:?})", pipe, user, kind, class);
                q.push(user, kind, payload, class)
            }
            None => false,
        }
    }

    /// `(foreground, background)` waiting on `pipe`.
    pub fn pending(&self, pipe: PipeHandle) -> (usize, usize) {
        self.get(pipe).map(|q| q.pending()).unwrap_or((0, 0))
    }
}

/// The outlet handed to the backing service. Cheap to clone; usable from
/// any thread.
#[derive(Clone)]
pub struct NotificationPoster {
    queue: Arc<CallbackQueue>,
}

impl NotificationPoster {
    pub fn new(queue: Arc<CallbackQueue>) -> Self {
        Self { queue }
    }

    pub fn post_foreground(&self, pipe: PipeHandle, user: UserHandle, kind: u32, payload: Vec<u8>) -> bool {
        self.queue.enqueue(pipe, user, kind, payload, QueueClass::Foreground)
    }

    pub fn post_background(&self, pipe: PipeHandle, user: UserHandle, kind: u32, payload: Vec<u8>) -> bool {
        self.queue.enqueue(pipe, user, kind, payload, QueueClass::Background)
    }
}

impl NotificationOutlet for NotificationPoster {
    fn post(
        &self,
        pipe: PipeHandle,
        user: UserHandle,
        kind: u32,
        payload: Vec<u8>,
        class: QueueClass,
    ) -> bool {
        self.queue.enqueue(pipe, user, kind, payload, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: PipeHandle = PipeHandle::new(1);
    const U: UserHandle = UserHandle::new(1);

    fn kinds(batch: &VecDeque<Notification>) -> Vec<u32> {
        batch.iter().map(|n| n.kind).collect()
    }

    #[test]
    fn test_enqueue_requires_open_pipe() {
        let q = CallbackQueue::new();
        assert!(!q.enqueue(P, U, 100, vec![], QueueClass::Foreground));
        q.open(P);
        assert!(q.enqueue(P, U, 100, vec![], QueueClass::Foreground));
        assert_eq!(q.pending(P), (1, 0));
    }

    #[test]
    fn test_snapshot_foreground_only() {
        let q = CallbackQueue::new();
        q.open(P);
        q.enqueue(P, U, 1, vec![], QueueClass::Foreground);
        q.enqueue(P, U, 2, vec![], QueueClass::Background);
        q.enqueue(P, U, 3, vec![], QueueClass::Foreground);

        let pq = q.get(P).unwrap();
        assert_eq!(kinds(&pq.snapshot(false)), vec![1, 3]);
        assert_eq!(q.pending(P), (0, 1));
        assert_eq!(kinds(&pq.snapshot(true)), vec![2]);
    }

    #[test]
    fn test_snapshot_merges_arrival_order() {
        let q = CallbackQueue::new();
        q.open(P);
        q.enqueue(P, U, 1, vec![], QueueClass::Background);
        q.enqueue(P, U, 2, vec![], QueueClass::Foreground);
        q.enqueue(P, U, 3, vec![], QueueClass::Background);
        q.enqueue(P, U, 4, vec![], QueueClass::Foreground);

        let batch = q.get(P).unwrap().snapshot(true);
        assert_eq!(kinds(&batch), vec![1, 2, 3, 4]);
        assert!(batch.iter().zip(batch.iter().skip(1)).all(|(a, b)| a.seq < b.seq));
    }

    #[test]
    fn test_carry_over_goes_first() {
        let q = CallbackQueue::new();
        q.open(P);
        let pq = q.get(P).unwrap();
        q.enqueue(P, U, 1, vec![], QueueClass::Foreground);
        q.enqueue(P, U, 2, vec![], QueueClass::Foreground);
        let mut batch = pq.snapshot(false);
        batch.pop_front();

        q.enqueue(P, U, 3, vec![], QueueClass::Foreground);
        pq.carry_over(batch);
        assert_eq!(q.pending(P), (2, 0));
        assert_eq!(kinds(&pq.snapshot(false)), vec![2, 3]);
    }

    #[test]
    fn test_carried_background_waits_for_background_cycle() {
        let q = CallbackQueue::new();
        q.open(P);
        let pq = q.get(P).unwrap();
        q.enqueue(P, U, 1, vec![], QueueClass::Foreground);
        q.enqueue(P, U, 2, vec![], QueueClass::Background);
        q.enqueue(P, U, 3, vec![], QueueClass::Foreground);
        let mut batch = pq.snapshot(true);
        batch.pop_front();

        pq.carry_over(batch);
        assert_eq!(q.pending(P), (1, 1));
        assert_eq!(kinds(&pq.snapshot(false)), vec![3]);
        assert_eq!(kinds(&pq.snapshot(true)), vec![2]);
        assert_eq!(q.pending(P), (0, 0));
    }

    #[test]
    fn test_close_discards() {
        let q = CallbackQueue::new();
        q.open(P);
        let pq = q.get(P).unwrap();
        q.enqueue(P, U, 1, vec![], QueueClass::Foreground);
        q.enqueue(P, U, 2, vec![], QueueClass::Background);
        assert_eq!(q.close(P), 2);
        assert!(!pq.is_open());
        assert!(q.get(P).is_none());
        assert!(!q.enqueue(P, U, 3, vec![], QueueClass::Foreground));
    }

    #[test]
    fn test_pump_guard() {
        let q = CallbackQueue::new();
        q.open(P);
        let pq = q.get(P).unwrap();
        let g = pq.try_begin_pump().unwrap();
        assert!(pq.try_begin_pump().is_none());
        drop(g);
        assert!(!pq.is_pumping());
        assert!(pq.try_begin_pump().is_some());
    }

    #[test]
    fn test_poster_from_threads() {
        let q = Arc::new(CallbackQueue::new());
        q.open(P);
        let poster = NotificationPoster::new(q.clone());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let poster = poster.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        assert!(poster.post_foreground(P, U, t * 1000 + i, vec![]));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let batch = q.get(P).unwrap().snapshot(false);
        assert_eq!(batch.len(), 200);
        let seqs: Vec<u64> = batch.iter().map(|n| n.seq).collect();
        assert_eq!(seqs, (0..200).collect::<Vec<_>>());
    }
}
