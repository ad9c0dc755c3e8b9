//! Per-job result storage.
//!
//! The [`ResultStore`] is written by every in-flight probe task of a job
//! and read by pollers at the same time. Records live in a sharded map, so
//! a write locks one shard for the duration of a single merge and a
//! snapshot copies one record at a time. No lock is ever held across an
//! `.await`.

use crate::core::ResultRecord;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// What an [`ResultStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The subdomain was new.
    Inserted,
    /// The subdomain existed and the incoming fields were merged.
    Merged,
    /// The record had no name and was dropped.
    Rejected,
}

#[derive(Debug)]
struct Slot {
    /// First-seen order.
    seq: u64,
    record: ResultRecord,
}

/// Append-only, concurrently writable collection of result records.
///
/// # Examples
///
/// ```rust
/// use subscout::core::ResultRecord;
/// use subscout::store::ResultStore;
///
/// let store = ResultStore::new();
/// store.upsert(ResultRecord::new("www.example.com").with_http_status(200));
/// store.upsert(ResultRecord::new("www.example.com").with_https_status(301));
///
/// let records = store.snapshot();
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].http_status, Some(200));
/// assert_eq!(records[0].https_status, Some(301));
/// ```
#[derive(Debug, Default)]
pub struct ResultStore {
    records: DashMap<String, Slot>,
    next_seq: AtomicU64,
}

impl ResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, or merges it into the stored record with the same
    /// subdomain.
    ///
    /// Present fields overwrite, absent fields leave stored values alone.
    /// Safe to call from any number of tasks at once.
    pub fn upsert(&self, record: ResultRecord) -> UpsertOutcome {
        if record.subdomain.is_empty() {
            return UpsertOutcome::Rejected;
        }

        match self.records.entry(record.subdomain.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().record.merge(&record);
                UpsertOutcome::Merged
            }
            Entry::Vacant(entry) => {
                // Assigned under the shard lock so order matches first insertion.
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                entry.insert(Slot { seq, record });
                UpsertOutcome::Inserted
            }
        }
    }

    /// Returns a copy of the record for `subdomain`, if any.
    pub fn get(&self, subdomain: &str) -> Option<ResultRecord> {
        self.records.get(subdomain).map(|slot| slot.record.clone())
    }

    /// Returns `true` if a record exists for `subdomain`.
    pub fn contains(&self, subdomain: &str) -> bool {
        self.records.contains_key(subdomain)
    }

    /// Returns a point-in-time copy of all records in first-seen order.
    ///
    /// Every returned record is internally consistent (copied under its
    /// shard lock). Records inserted while the snapshot is taken may or may
    /// not be included, and since the copy walks one shard at a time, a
    /// later record can appear without an earlier one that was inserted
    /// concurrently. The next snapshot places the missing record back at
    /// its first-seen position, so a running job's result list is not
    /// guaranteed to grow only at the end. Once writers have stopped, as
    /// for a terminal job, snapshots are complete and stable.
    pub fn snapshot(&self) -> Vec<ResultRecord> {
        let mut slots: Vec<(u64, ResultRecord)> = self
            .records
            .iter()
            .map(|slot| (slot.seq, slot.record.clone()))
            .collect();
        slots.sort_unstable_by_key(|(seq, _)| *seq);
        slots.into_iter().map(|(_, record)| record).collect()
    }

    /// Number of distinct subdomains stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that answered at least one HTTP probe.
    pub fn active_count(&self) -> usize {
        self.records
            .iter()
            .filter(|slot| slot.record.is_active())
            .count()
    }
}
