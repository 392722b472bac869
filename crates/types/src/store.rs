//! In-memory record stores.
//!
//! Both stores are append-only. The block table is keyed by height and
//! resolves duplicate heights according to a [`MergePolicy`].

use crate::{BlockHeight, BlockRecord, SubmissionRecord};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// How a block table treats a height it has already seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergePolicy {
    /// Keep the first record observed for a height; later ones are dropped.
    #[default]
    FirstSeenWins,

    /// Replace the stored record with the latest one observed.
    ///
    /// Noisy duplicate log lines skew latencies under this policy.
    LastWriteWins,
}

/// Two records for one height that disagree on the block contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightConflict {
    /// Record kept in the table.
    pub retained: BlockRecord,
    /// Record that lost the merge.
    pub discarded: BlockRecord,
}

/// Result of inserting into a [`BlockTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// First record for this height.
    Inserted,
    /// Height already present; the merge policy decided which record stays.
    Duplicate,
    /// Height already present with a different transaction count.
    Conflict,
}

/// Height-keyed table of block-commit records.
#[derive(Debug, Clone, Default)]
pub struct BlockTable {
    policy: MergePolicy,
    blocks: BTreeMap<BlockHeight, BlockRecord>,
    duplicates: usize,
    conflicts: Vec<HeightConflict>,
}

impl BlockTable {
    /// Create an empty table with the given merge policy.
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Insert a record, applying the merge policy on duplicate heights.
    pub fn insert(&mut self, record: BlockRecord) -> InsertOutcome {
        let existing = match self.blocks.entry(record.height) {
            Entry::Vacant(slot) => {
                slot.insert(record);
                return InsertOutcome::Inserted;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        self.duplicates += 1;
        let conflicting = existing.conflicts_with(&record);

        let discarded = match self.policy {
            MergePolicy::FirstSeenWins => record,
            MergePolicy::LastWriteWins => std::mem::replace(existing, record),
        };

        if conflicting {
            self.conflicts.push(HeightConflict {
                retained: existing.clone(),
                discarded,
            });
            InsertOutcome::Conflict
        } else {
            InsertOutcome::Duplicate
        }
    }

    pub fn get(&self, height: BlockHeight) -> Option<&BlockRecord> {
        self.blocks.get(&height)
    }

    /// Records in ascending height order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockRecord> {
        self.blocks.values()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of records dropped or replaced because their height was already present.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Duplicates that disagreed with the stored record.
    pub fn conflicts(&self) -> &[HeightConflict] {
        &self.conflicts
    }
}

impl Extend<BlockRecord> for BlockTable {
    fn extend<I: IntoIterator<Item = BlockRecord>>(&mut self, iter: I) {
        for record in iter {
            self.insert(record);
        }
    }
}

/// Append-only list of submission records in arrival order.
#[derive(Debug, Clone, Default)]
pub struct SubmissionStore {
    records: Vec<SubmissionRecord>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: SubmissionRecord) {
        self.records.push(record);
    }

    pub fn as_slice(&self) -> &[SubmissionRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubmissionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records with a resolved height.
    pub fn resolved(&self) -> usize {
        self.records.iter().filter(|r| r.is_resolved()).count()
    }
}

impl From<Vec<SubmissionRecord>> for SubmissionStore {
    fn from(records: Vec<SubmissionRecord>) -> Self {
        Self { records }
    }
}
