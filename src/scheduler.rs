//! Rebuild Scheduler
//!
//! Coalesces "this needs rebuilding" requests into at most one pending
//! rebuild per key per turn. Two independent tables: one keyed by element
//! (`<select>` elements) and one keyed by repeat record. Tasks share one queue, so
//! they run in the order their keys were first requested.
//!
//! A turn ends when the host calls `Engine::flush()`. The queue is taken as a
//! whole at that point; anything requested while it drains lands in the
//! next turn.

use markup5ever_rcdom::Handle;
use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;

use crate::dom;
use crate::registry::{DeepBinding, RecordId, RepeatBinding};

/// Pending-flag table for one kind of key.
#[derive(Debug)]
pub struct CoalescingTable<K> {
    pending: HashSet<K>,
}

impl<K> Default for CoalescingTable<K> {
    fn default() -> Self {
        CoalescingTable {
            pending: HashSet::new(),
        }
    }
}

impl<K: Hash + Eq> CoalescingTable<K> {
    /// Flag `key` as pending. False when it already was.
    pub fn request(&mut self, key: K) -> bool {
        self.pending.insert(key)
    }

    pub fn complete(&mut self, key: &K) {
        self.pending.remove(key);
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Task {
    Select(Rc<DeepBinding>),
    Repeat(Rc<RepeatBinding>),
}

impl Task {
    /// Node whose attachment decides whether the rebuild still runs.
    pub fn node(&self) -> &Handle {
        match self {
            Task::Select(record) => &record.node,
            Task::Repeat(record) => &record.anchor,
        }
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: Vec<Task>,
    elements: CoalescingTable<usize>,
    repeats: CoalescingTable<RecordId>,
    turns: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `<select>` refresh for the record's element.
    pub fn request_select(&mut self, record: &Rc<DeepBinding>) -> bool {
        if !self.elements.request(dom::node_key(&record.node)) {
            return false;
        }
        self.queue.push(Task::Select(record.clone()));
        true
    }

    pub fn request_repeat(&mut self, record: &Rc<RepeatBinding>) -> bool {
        if !self.repeats.request(record.id) {
            return false;
        }
        self.queue.push(Task::Repeat(record.clone()));
        true
    }

    /// End the current turn: hand over everything queued so far.
    pub fn take_turn(&mut self) -> Vec<Task> {
        if !self.queue.is_empty() {
            self.turns += 1;
        }
        std::mem::take(&mut self.queue)
    }

    /// Clear the pending flag right before the task runs.
    pub fn complete(&mut self, task: &Task) {
        match task {
            Task::Select(record) => self.elements.complete(&dom::node_key(&record.node)),
            Task::Repeat(record) => self.repeats.complete(&record.id),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Turns that had at least one task.
    pub fn turns(&self) -> u64 {
        self.turns
    }
}
