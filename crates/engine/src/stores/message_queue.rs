//! Bounded per-NPC inboxes of pending actions.
//!
//! One mutex covers the whole mapping. Every critical section is a handful of
//! `VecDeque` operations and never awaits, so a `std::sync::Mutex` is used.
//! A poisoned lock is logged and reported as a failed operation; it never
//! propagates a panic to the caller.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use npc_domain::{ActionMessage, NpcId};

use crate::infrastructure::ports::ClockPort;

/// Per-NPC bound used when none is configured.
pub const DEFAULT_INBOX_CAPACITY: usize = 1000;

pub struct MessageQueue {
    inboxes: Mutex<HashMap<NpcId, VecDeque<ActionMessage>>>,
    capacity: usize,
    clock: Arc<dyn ClockPort>,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages per NPC.
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            inboxes: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(
        &self,
        operation: &'static str,
    ) -> Option<MutexGuard<'_, HashMap<NpcId, VecDeque<ActionMessage>>>> {
        match self.inboxes.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::error!(operation, "NPC message queue lock poisoned");
                None
            }
        }
    }

    /// Append `message` to the inbox of `npc_id`.
    ///
    /// Messages without a timestamp are stamped with the current time. When
    /// the inbox is full the oldest entries are evicted until the new message
    /// fits. Returns `false` only on an internal fault.
    pub fn add_message(&self, npc_id: &NpcId, mut message: ActionMessage) -> bool {
        if message.timestamp.is_none() {
            message.timestamp = Some(self.clock.now());
        }

        let Some(mut inboxes) = self.lock("add_message") else {
            return false;
        };

        let inbox = inboxes.entry(npc_id.clone()).or_default();
        let mut evicted = 0usize;
        while inbox.len() >= self.capacity {
            inbox.pop_front();
            evicted += 1;
        }
        inbox.push_back(message);
        drop(inboxes);

        if evicted > 0 {
            tracing::warn!(
                npc_id = %npc_id,
                evicted,
                capacity = self.capacity,
                "NPC inbox full, dropped oldest messages"
            );
        }
        true
    }

    /// Snapshot of the inbox in arrival order. The inbox is left untouched.
    pub fn get_messages(&self, npc_id: &NpcId) -> Vec<ActionMessage> {
        self.lock("get_messages")
            .and_then(|inboxes| {
                inboxes
                    .get(npc_id)
                    .map(|inbox| inbox.iter().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Remove and return every pending message in arrival order.
    ///
    /// The read and the clear happen under one lock acquisition, so a message
    /// added concurrently is either returned here or left for the next call.
    pub fn take_messages(&self, npc_id: &NpcId) -> Vec<ActionMessage> {
        self.lock("take_messages")
            .and_then(|mut inboxes| inboxes.remove(npc_id))
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Drop every pending message for `npc_id`. Clearing an empty or unknown
    /// inbox succeeds.
    pub fn clear_messages(&self, npc_id: &NpcId) -> bool {
        match self.lock("clear_messages") {
            Some(mut inboxes) => {
                inboxes.remove(npc_id);
                true
            }
            None => false,
        }
    }

    pub fn get_queue_size(&self, npc_id: &NpcId) -> usize {
        self.lock("get_queue_size")
            .and_then(|inboxes| inboxes.get(npc_id).map(VecDeque::len))
            .unwrap_or(0)
    }

    pub fn get_total_queue_size(&self) -> usize {
        self.lock("get_total_queue_size")
            .map(|inboxes| inboxes.values().map(VecDeque::len).sum())
            .unwrap_or(0)
    }

    /// Drop every inbox. Used when the manager shuts down.
    pub fn clear_all(&self) -> bool {
        match self.lock("clear_all") {
            Some(mut inboxes) => {
                inboxes.clear();
                true
            }
            None => false,
        }
    }
}
