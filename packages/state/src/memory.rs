//! An in-memory [`StateDb`] with the host backend's snapshot semantics.
//!
//! Production deployments plug the precompile into the chain's real state
//! database; this implementation backs unit tests, mirroring the journaled
//! snapshot/revert model EVM backends expose.

use std::collections::HashMap;

use alloy_primitives::B256;

use crate::StateDb;

/// Journaled in-memory slot store.
#[derive(Debug, Default)]
pub struct InMemoryStateDb {
    slots: HashMap<B256, Vec<u8>>,
    // One entry per overwrite: the key and its pre-write value.
    journal: Vec<(B256, Option<Vec<u8>>)>,
}

/// Handle returned by [`InMemoryStateDb::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot(usize);

impl InMemoryStateDb {
    /// Marks the current state; a later [`Self::revert_to`] restores it.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.journal.len())
    }

    /// Undoes every write made since `snapshot` was taken.
    pub fn revert_to(&mut self, snapshot: Snapshot) {
        while self.journal.len() > snapshot.0 {
            let Some((key, prior)) = self.journal.pop() else {
                break;
            };
            match prior {
                Some(value) => {
                    self.slots.insert(key, value);
                }
                None => {
                    self.slots.remove(&key);
                }
            }
        }
    }

    /// Discards journal entries, making all writes permanent.
    pub fn commit(&mut self) {
        self.journal.clear();
    }
}

impl StateDb for InMemoryStateDb {
    fn get(&self, key: B256) -> Option<Vec<u8>> {
        self.slots.get(&key).cloned()
    }

    fn set(&mut self, key: B256, value: Vec<u8>) {
        let prior = self.slots.insert(key, value);
        self.journal.push((key, prior));
    }

    fn exists(&self, key: B256) -> bool {
        self.slots.contains_key(&key)
    }
}
