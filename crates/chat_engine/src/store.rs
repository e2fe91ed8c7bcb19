use std::collections::HashMap;

use tracing::warn;

use crate::message::{DedupKey, Message};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Messages appended by this merge.
    pub added: usize,
    /// Whether the rendered log differs from before the merge. Covers both
    /// appends and pending echoes upgraded to confirmed entries.
    pub changed: bool,
}

/// Ordered message log with dedup-key identity. Insertion order is arrival
/// order: server order for merged batches, immediate append for local
/// echoes. Invariant: no two entries share a dedup key.
#[derive(Default)]
pub struct MessageStore {
    entries: Vec<Message>,
    index: HashMap<DedupKey, usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges a full server batch, walking it in server order. Keys already
    /// in the log and same-batch duplicates are dropped. A confirmed message
    /// whose id-less fallback key matches a pending echo replaces that echo
    /// in place instead of appending a duplicate.
    pub fn merge(&mut self, batch: Vec<Message>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for message in batch {
            let key = message.dedup_key();
            if let Some(&at) = self.index.get(&key) {
                // Same logical message seen again. An echo that produced an
                // identical key is upgraded to its confirmed copy.
                if self.entries[at].is_pending() && !message.is_pending() {
                    self.entries[at].confirm();
                    outcome.changed = true;
                }
                continue;
            }
            if let Some(fallback) = message.fallback_key() {
                if let Some(&at) = self.index.get(&fallback) {
                    if self.entries[at].is_pending() {
                        self.index.remove(&fallback);
                        self.index.insert(key, at);
                        self.entries[at] = message;
                        outcome.changed = true;
                        continue;
                    }
                }
            }
            self.index.insert(key, self.entries.len());
            self.entries.push(message);
            outcome.added += 1;
            outcome.changed = true;
        }
        outcome
    }

    /// Appends a locally synthesized message. Returns false (and leaves the
    /// log untouched) if its key is already present.
    pub fn append_local(&mut self, message: Message) -> bool {
        let key = message.dedup_key();
        if self.index.contains_key(&key) {
            warn!(?key, "dropping local append with duplicate key");
            return false;
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(message);
        true
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
