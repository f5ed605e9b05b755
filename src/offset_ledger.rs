//! Broadcasting-mode offset watermark tracking.
//!
//! In clustering mode the broker owns the committed position and the
//! engine acks/nacks individual messages. In broadcasting mode every
//! consumer instance tracks its own position locally; `OffsetLedger` is
//! that per-partition bookkeeping structure. It does not persist
//! anything itself. The broadcasting-offset commit collaborator
//! (out of scope, per spec.md §1) reads `committed_offset()`.

use std::collections::BTreeMap;

/// One tracked position: the partition offset and whether consumption
/// of the message at that offset has concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRecord {
    pub offset: i64,
    pub release: bool,
}

/// Strictly-increasing set of `OffsetRecord`s for one partition.
///
/// Not internally synchronized. Callers (the `MessageStore`, guarded
/// by its own lock) own exclusive access for the duration of a mutation.
#[derive(Debug, Default)]
pub struct OffsetLedger {
    records: BTreeMap<i64, bool>,
}

impl OffsetLedger {
    pub fn new() -> Self {
        Self { records: BTreeMap::new() }
    }

    /// Record a freshly cached batch of offsets as `release=false`.
    ///
    /// Applies the roll-forward rule first: if the ledger currently
    /// holds exactly one record and it is already released, that
    /// record is dropped before the new offsets are inserted.
    pub fn record_cached(&mut self, offsets: impl IntoIterator<Item = i64>) {
        if self.records.len() == 1 {
            if let Some((_, released)) = self.records.iter().next() {
                if *released {
                    self.records.clear();
                }
            }
        }
        for offset in offsets {
            self.records.insert(offset, false);
        }
    }

    /// Mark one offset's consumption as concluded, then compact the
    /// released prefix down to a single watermark record.
    pub fn release(&mut self, offset: i64) {
        if let Some(flag) = self.records.get_mut(&offset) {
            *flag = true;
        }
        while self.records.len() > 1 {
            let mut iter = self.records.iter();
            let first_released = iter.next().map(|(_, r)| *r).unwrap_or(false);
            let second_released = iter.next().map(|(_, r)| *r).unwrap_or(false);
            if first_released && second_released {
                let first_key = *self.records.keys().next().unwrap();
                self.records.remove(&first_key);
            } else {
                break;
            }
        }
    }

    /// The offset of the most advanced record in the released prefix,
    /// i.e. the position safe to commit. `None` if nothing is released.
    pub fn committed_offset(&self) -> Option<i64> {
        let mut committed = None;
        for (&offset, &released) in self.records.iter() {
            if released {
                committed = Some(offset);
            } else {
                break;
            }
        }
        committed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    fn records(&self) -> Vec<OffsetRecord> {
        self.records.iter().map(|(&offset, &release)| OffsetRecord { offset, release }).collect()
    }
}
