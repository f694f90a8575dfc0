//! Partition queues: one FIFO backlog per request kind.
//!
//! Insertion order is service order. A request lives in at most one queue,
//! and only while awaiting dispatch. Queue depth is the sole saturation
//! signal the macro scheduler consumes.

use std::collections::VecDeque;

use super::request::{QueuedRequest, RequestId};
use super::worker::Pool;

/// The two FIFO backlogs, plus an optional shared depth cap.
pub struct PartitionQueues {
    long: VecDeque<QueuedRequest>,
    short: VecDeque<QueuedRequest>,
    /// Per-queue depth cap. `None` means unbounded; backlog growth is then
    /// a signal for rebalancing, not an error.
    max_depth: Option<usize>,
}

impl PartitionQueues {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self { long: VecDeque::new(), short: VecDeque::new(), max_depth }
    }

    fn deque(&self, kind: Pool) -> &VecDeque<QueuedRequest> {
        match kind {
            Pool::Long => &self.long,
            Pool::Short => &self.short,
        }
    }

    fn deque_mut(&mut self, kind: Pool) -> &mut VecDeque<QueuedRequest> {
        match kind {
            Pool::Long => &mut self.long,
            Pool::Short => &mut self.short,
        }
    }

    pub fn len(&self, kind: Pool) -> usize {
        self.deque(kind).len()
    }

    pub fn is_empty(&self, kind: Pool) -> bool {
        self.deque(kind).is_empty()
    }

    /// Whether `kind`'s queue is at its configured cap.
    pub fn is_full(&self, kind: Pool) -> bool {
        self.max_depth.is_some_and(|max| self.len(kind) >= max)
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Append to the tail of `request.kind`'s queue.
    pub fn push(&mut self, request: QueuedRequest) {
        self.deque_mut(request.kind).push_back(request);
    }

    /// Pop the oldest request of the given kind.
    pub fn pop(&mut self, kind: Pool) -> Option<QueuedRequest> {
        self.deque_mut(kind).pop_front()
    }

    /// Remove a queued request by id. No side effects beyond removal.
    pub fn remove(&mut self, id: RequestId) -> Option<QueuedRequest> {
        for kind in [Pool::Long, Pool::Short] {
            let q = self.deque_mut(kind);
            if let Some(pos) = q.iter().position(|r| r.id == id) {
                return q.remove(pos);
            }
        }
        None
    }

    /// Drain every queued request, oldest first per queue. Used at shutdown.
    pub fn drain_all(&mut self) -> Vec<QueuedRequest> {
        let mut out = Vec::with_capacity(self.long.len() + self.short.len());
        out.extend(self.short.drain(..));
        out.extend(self.long.drain(..));
        out
    }
}
