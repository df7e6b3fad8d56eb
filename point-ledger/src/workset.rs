//! In-memory working set of one member's entries
//!
//! Every mutating operation loads the member's entries under the member
//! lock, runs the engine logic against this copy, and commits the touched
//! rows in one atomic batch. An error anywhere before the commit leaves the
//! store untouched.

use crate::error::Result;
use crate::storage::{CommitSet, Storage};
use crate::types::{EntryId, LedgerEntry, MemberId, RelationKey};
use std::collections::BTreeSet;

/// One member's entries, ascending by id, plus the change tracking needed to
/// build a [`CommitSet`]
#[derive(Debug)]
pub struct WorkSet {
    member_id: MemberId,
    /// Entries ascending by id; engines index into this directly
    pub entries: Vec<LedgerEntry>,
    changed: BTreeSet<EntryId>,
    deleted: Vec<LedgerEntry>,
}

impl WorkSet {
    /// Load a member's entries from storage
    pub fn load(storage: &Storage, member_id: &MemberId) -> Result<Self> {
        Ok(Self {
            member_id: member_id.clone(),
            entries: storage.load_member_entries(member_id)?,
            changed: BTreeSet::new(),
            deleted: Vec::new(),
        })
    }

    /// Empty working set (unit tests)
    #[cfg(test)]
    pub fn empty(member_id: MemberId) -> Self {
        Self {
            member_id,
            entries: Vec::new(),
            changed: BTreeSet::new(),
            deleted: Vec::new(),
        }
    }

    /// Owning member
    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    /// Sum of all deltas (the authoritative balance)
    pub fn total(&self) -> i64 {
        self.entries.iter().map(|e| e.delta).sum()
    }

    /// Balance snapshot of the newest entry, 0 with no entries
    pub fn running_total(&self) -> i64 {
        self.entries.last().map_or(0, |e| e.balance_after)
    }

    /// Position of the entry carrying a relation key
    pub fn find_relation(&self, relation: &RelationKey) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.relation.as_ref() == Some(relation))
    }

    /// Position of an entry by id (entries are sorted by id)
    pub fn position_of(&self, id: EntryId) -> Option<usize> {
        self.entries.binary_search_by_key(&id, |e| e.id).ok()
    }

    /// Mark an existing entry as modified
    pub fn touch(&mut self, id: EntryId) {
        self.changed.insert(id);
    }

    /// Append a new entry at the tail
    pub fn append(&mut self, entry: LedgerEntry) -> EntryId {
        let id = entry.id;
        debug_assert!(self.entries.last().map_or(true, |last| last.id < id));
        self.changed.insert(id);
        self.entries.push(entry);
        id
    }

    /// Remove an entry, staging its deletion
    pub fn remove(&mut self, index: usize) -> LedgerEntry {
        let entry = self.entries.remove(index);
        self.changed.remove(&entry.id);
        self.deleted.push(entry.clone());
        entry
    }

    /// Drain the staged changes into a commit set
    ///
    /// The entries themselves stay in place so the caller can still read the
    /// post-operation totals.
    pub fn take_commit(&mut self) -> CommitSet {
        let changed = std::mem::take(&mut self.changed);
        CommitSet {
            upserts: self
                .entries
                .iter()
                .filter(|e| changed.contains(&e.id))
                .cloned()
                .collect(),
            deletes: std::mem::take(&mut self.deleted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryStatus;

    fn entry(id: u64, delta: i64, balance_after: i64) -> LedgerEntry {
        LedgerEntry {
            id: EntryId::from_raw(id),
            member_id: MemberId::new("alice"),
            delta,
            description: String::new(),
            consumed: 0,
            status: if delta > 0 {
                EntryStatus::Active
            } else {
                EntryStatus::Expired
            },
            expires_at: None,
            relation: None,
            balance_after,
            drawn_from: vec![],
        }
    }

    #[test]
    fn test_totals() {
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        assert_eq!(ws.total(), 0);
        assert_eq!(ws.running_total(), 0);

        ws.append(entry(1, 50, 50));
        ws.append(entry(2, -20, 30));
        assert_eq!(ws.total(), 30);
        assert_eq!(ws.running_total(), 30);
    }

    #[test]
    fn test_commit_collects_only_touched_entries() {
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        ws.append(entry(1, 50, 50));
        ws.append(entry(2, 20, 70));
        let _ = ws.take_commit();

        ws.entries[0].consumed = 10;
        ws.touch(EntryId::from_raw(1));

        let commit = ws.take_commit();
        assert_eq!(commit.upserts.len(), 1);
        assert_eq!(commit.upserts[0].id, EntryId::from_raw(1));
        assert!(commit.deletes.is_empty());

        // Second drain is empty
        assert!(ws.take_commit().is_empty());
    }

    #[test]
    fn test_remove_stages_deletion() {
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        ws.append(entry(1, 50, 50));
        ws.append(entry(2, 20, 70));
        let _ = ws.take_commit();

        let removed = ws.remove(0);
        assert_eq!(removed.id, EntryId::from_raw(1));
        assert_eq!(ws.entries.len(), 1);

        let commit = ws.take_commit();
        assert!(commit.upserts.is_empty());
        assert_eq!(commit.deletes.len(), 1);
    }

    #[test]
    fn test_position_of() {
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        ws.append(entry(3, 10, 10));
        ws.append(entry(7, 10, 20));

        assert_eq!(ws.position_of(EntryId::from_raw(7)), Some(1));
        assert_eq!(ws.position_of(EntryId::from_raw(5)), None);
    }
}
