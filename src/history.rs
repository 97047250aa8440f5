use std::collections::VecDeque;

use crate::types::HistoryEntry;

/// Session-scoped record of completed generations, newest first.
///
/// Entries are never evicted; the ledger grows for the life of the session.
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an entry.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate newest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Owned copy, newest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}
