use pingboard_common::protocol::HostRecord;
use std::collections::HashMap;
use std::sync::Arc;

/// The authoritative host table.
///
/// Records are kept in first-seen order and indexed by address, so applying
/// a batch of N records to a table of M costs O(N + M) at most. A record for
/// a known address replaces the stored one wholesale; the last one applied
/// wins, whatever its embedded timestamp says.
#[derive(Debug, Default)]
pub struct HostStore {
    records: Vec<HostRecord>,
    index: HashMap<String, usize>,
    revision: u64,
}

impl HostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a server batch. Returns whether the table changed.
    pub fn apply_batch(&mut self, records: impl IntoIterator<Item = HostRecord>) -> bool {
        let mut changed = false;
        for record in records {
            changed |= self.upsert(record);
        }
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Writes a locally created host before any push confirms it. A later
    /// batch for the same address simply overwrites it.
    pub fn apply_optimistic_write(&mut self, record: HostRecord) -> bool {
        let changed = self.upsert(record);
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Immutable copy of the table in insertion order.
    pub fn snapshot(&self) -> Arc<[HostRecord]> {
        Arc::from(self.records.as_slice())
    }

    pub fn get(&self, address: &str) -> Option<&HostRecord> {
        self.index.get(address).map(|&slot| &self.records[slot])
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Bumped once per apply call that changed the table.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn upsert(&mut self, record: HostRecord) -> bool {
        match self.index.get(&record.address) {
            Some(&slot) => {
                if self.records[slot] == record {
                    return false;
                }
                self.records[slot] = record;
            }
            None => {
                self.index.insert(record.address.clone(), self.records.len());
                self.records.push(record);
            }
        }
        true
    }
}
