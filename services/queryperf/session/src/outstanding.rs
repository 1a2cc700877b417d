//! The set of exchanges currently in flight.

use std::collections::VecDeque;

use qperf_wire::Qid;

use crate::slot::ExchangeSlot;

/// Ordered window of in-flight slots
///
/// The tail holds the most recently issued slot. Lookup is a linear scan by
/// message id; position carries no meaning beyond issue order.
#[derive(Default)]
pub struct Outstanding {
    slots: VecDeque<ExchangeSlot>,
}

impl Outstanding {
    /// Create an empty set sized for `window` slots
    pub fn with_capacity(window: usize) -> Self {
        Self {
            slots: VecDeque::with_capacity(window),
        }
    }

    /// Append a slot at the tail
    pub fn push(&mut self, slot: ExchangeSlot) {
        self.slots.push_back(slot);
    }

    /// Position of the slot waiting on `qid`
    pub fn find_by_id(&self, qid: Qid) -> Option<usize> {
        self.slots.iter().position(|slot| slot.matches(qid))
    }

    /// Slot at `idx`
    pub fn get(&self, idx: usize) -> Option<&ExchangeSlot> {
        self.slots.get(idx)
    }

    /// Mutable slot at `idx`
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut ExchangeSlot> {
        self.slots.get_mut(idx)
    }

    /// Move the slot at `idx` to the tail
    pub fn move_to_tail(&mut self, idx: usize) {
        if let Some(slot) = self.slots.remove(idx) {
            self.slots.push_back(slot);
        }
    }

    /// Evict and drop the slot at `idx`, cancelling its timer
    pub fn remove(&mut self, idx: usize) -> bool {
        self.slots.remove(idx).is_some()
    }

    /// Drop every slot
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Number of slots in flight
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is in flight
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Message ids in issue order (head first)
    pub fn ids(&self) -> Vec<Option<Qid>> {
        self.slots.iter().map(|slot| slot.qid()).collect()
    }
}
