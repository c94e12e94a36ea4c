use crate::store::ArrayRef;
use serde::{Deserialize, Serialize};

///
/// UndoEntry
///
/// Before-image of one persistent byte range, written ahead of the write it
/// protects. Rollback restores entries in reverse log order.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UndoEntry {
    pub(crate) array: ArrayRef,
    pub(crate) offset: usize,
    pub(crate) before: Vec<u8>,
}

///
/// CommitLog
///
/// Bounded undo log. `used` counts charged bytes, including the per-entry
/// overhead, and never exceeds `max`.
///

#[derive(Clone, Debug)]
pub(crate) struct CommitLog {
    entries: Vec<UndoEntry>,
    used: u32,
    max: u32,
    entry_overhead: u32,
}

impl CommitLog {
    pub(crate) const fn new(max: u32, entry_overhead: u32) -> Self {
        Self {
            entries: Vec::new(),
            used: 0,
            max,
            entry_overhead,
        }
    }

    /// Bytes charged for an entry protecting `payload` bytes.
    pub(crate) fn entry_cost(&self, payload: usize) -> u64 {
        u64::from(self.entry_overhead).saturating_add(payload as u64)
    }

    pub(crate) const fn used(&self) -> u32 {
        self.used
    }

    pub(crate) const fn max(&self) -> u32 {
        self.max
    }

    pub(crate) const fn unused(&self) -> u32 {
        self.max - self.used
    }

    pub(crate) const fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn fits(&self, payload: usize) -> bool {
        self.entry_cost(payload) <= u64::from(self.unused())
    }

    /// Append an entry. Callers check [`Self::fits`] first.
    pub(crate) fn push(&mut self, entry: UndoEntry) {
        let cost = self.entry_cost(entry.before.len());
        debug_assert!(cost <= u64::from(self.unused()), "undo entry exceeds commit capacity");

        self.used = self.used.saturating_add(cost as u32).min(self.max);
        self.entries.push(entry);
    }

    /// Drain every entry in log order, leaving the log empty.
    pub(crate) fn take(&mut self) -> Vec<UndoEntry> {
        self.used = 0;
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }
}
