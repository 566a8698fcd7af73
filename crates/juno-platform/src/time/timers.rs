use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::HashSet;

/// Handle to a scheduled timer, usable for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    deadline_ns: u64,
    seq: u64,
    event: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline_ns == other.deadline_ns && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline_ns, self.seq).cmp(&(other.deadline_ns, other.seq))
    }
}

/// One-shot timer queue over virtual time.
///
/// Stores device-defined event values; devices pull due events with
/// [`TimerQueue::pop_due`] and dispatch them in their own timer handlers.
/// Two events never tie: equal deadlines are broken by scheduling order.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    cancelled: HashSet<u64>,
    next_seq: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Schedules `event` to come due at the absolute virtual time
    /// `deadline_ns`. A deadline already in the past is delivered on the next
    /// [`TimerQueue::pop_due`] call.
    pub fn schedule(&mut self, deadline_ns: u64, event: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            deadline_ns,
            seq,
            event,
        }));
        TimerId(seq)
    }

    /// Cancels a scheduled timer. Cancelling an already-delivered (or
    /// already-cancelled) timer is a no-op.
    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id.0);
    }

    /// The deadline of the next live timer, if any.
    pub fn next_deadline(&mut self) -> Option<u64> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(e)| e.deadline_ns)
    }

    /// Removes and returns the next event whose deadline is `<= now_ns`,
    /// together with its deadline. Returns `None` once nothing else is due.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<(u64, T)> {
        self.discard_cancelled();
        let due = matches!(self.heap.peek(), Some(Reverse(e)) if e.deadline_ns <= now_ns);
        if !due {
            return None;
        }
        let Reverse(entry) = self.heap.pop().expect("peeked entry vanished");
        Some((entry.deadline_ns, entry.event))
    }

    pub fn is_empty(&mut self) -> bool {
        self.discard_cancelled();
        self.heap.is_empty()
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(e)) = self.heap.peek() {
            if self.cancelled.remove(&e.seq) {
                self.heap.pop();
            } else {
                break;
            }
        }
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
