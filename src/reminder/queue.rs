//! Min-heap of pending reminder deadlines.
//!
//! Cancellation is lazy: `cancel_all` only forgets the sequence numbers of a
//! todo, and stale heap entries are dropped when they reach the top or when
//! they outnumber the live ones.
//!
//! Each entry also keeps the wall-clock time it was asked for. The monotonic
//! deadline stops while the machine sleeps, so `pop_wall_due` catches up on
//! reminders whose wall-clock time has already passed.

use chrono::NaiveDateTime;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tokio::time::Instant;

/// Below this many heap entries stale ones are never compacted eagerly.
const COMPACT_MIN_ENTRIES: usize = 64;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    deadline: Instant,
    seq: u64,
    fire_at: NaiveDateTime,
    todo_id: String,
}

#[derive(Debug, Default)]
pub struct ReminderQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    pending: HashMap<String, HashSet<u64>>,
    next_seq: u64,
}

impl ReminderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a one-shot reminder due at `deadline`, which corresponds to the
    /// wall-clock time `fire_at`. Deadlines at or before `now` are dropped and
    /// `false` is returned.
    pub fn schedule(
        &mut self,
        todo_id: &str,
        deadline: Instant,
        fire_at: NaiveDateTime,
        now: Instant,
    ) -> bool {
        if deadline <= now {
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        self.pending
            .entry(todo_id.to_string())
            .or_default()
            .insert(seq);
        self.heap.push(Reverse(Entry {
            deadline,
            seq,
            fire_at,
            todo_id: todo_id.to_string(),
        }));
        true
    }

    /// Forgets every pending reminder of one todo. Returns how many were dropped.
    pub fn cancel_all(&mut self, todo_id: &str) -> usize {
        let cancelled = self
            .pending
            .remove(todo_id)
            .map(|seqs| seqs.len())
            .unwrap_or(0);
        self.compact_if_stale();
        cancelled
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }

    /// Earliest live deadline, if any.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse(entry)| entry.deadline)
    }

    /// Removes and returns the todo ids whose deadline has passed, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();

        while let Some(Reverse(top)) = self.heap.peek() {
            if top.deadline > now {
                break;
            }

            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };

            if self.take_pending(&entry) {
                due.push(entry.todo_id);
            }
        }

        due
    }

    /// Removes and returns live reminders whose wall-clock time is at or
    /// before `now`, even if their monotonic deadline is still ahead.
    pub fn pop_wall_due(&mut self, now: NaiveDateTime) -> Vec<String> {
        let mut overdue: Vec<(NaiveDateTime, u64, String)> = self
            .heap
            .iter()
            .map(|Reverse(entry)| entry)
            .filter(|entry| entry.fire_at <= now && self.is_live(entry))
            .map(|entry| (entry.fire_at, entry.seq, entry.todo_id.clone()))
            .collect();
        overdue.sort();

        let mut due = Vec::with_capacity(overdue.len());
        for (_, seq, todo_id) in overdue {
            if self.forget(&todo_id, seq) {
                due.push(todo_id);
            }
        }

        self.compact_if_stale();
        due
    }

    pub fn pending_for(&self, todo_id: &str) -> usize {
        self.pending.get(todo_id).map(|seqs| seqs.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.pending.values().map(|seqs| seqs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_live(&self, entry: &Entry) -> bool {
        self.pending
            .get(&entry.todo_id)
            .is_some_and(|seqs| seqs.contains(&entry.seq))
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.is_live(top) {
                break;
            }
            self.heap.pop();
        }
    }

    fn take_pending(&mut self, entry: &Entry) -> bool {
        self.forget(&entry.todo_id, entry.seq)
    }

    fn forget(&mut self, todo_id: &str, seq: u64) -> bool {
        let Some(seqs) = self.pending.get_mut(todo_id) else {
            return false;
        };

        let removed = seqs.remove(&seq);
        if seqs.is_empty() {
            self.pending.remove(todo_id);
        }
        removed
    }

    /// Rebuilds the heap from live entries once stale ones are the majority.
    fn compact_if_stale(&mut self) {
        let live = self.len();
        if self.heap.len() < COMPACT_MIN_ENTRIES || self.heap.len() <= live * 2 {
            return;
        }

        let heap = std::mem::take(&mut self.heap);
        self.heap = heap
            .into_iter()
            .filter(|Reverse(entry)| self.is_live(entry))
            .collect();
    }
}
