//! Member directory seam
//!
//! Member accounts live outside this engine (the surrounding forum owns
//! them); the engine only needs to check that a recipient exists and to push
//! the cached point balance after each unit of work. The directory is
//! injected explicitly instead of reached through a process-wide service.

use crate::error::Result;
use crate::types::MemberId;
use dashmap::DashMap;

/// External member account, referenced by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberAccount {
    /// Member id
    pub id: MemberId,
    /// Cached point balance, updated only by this engine
    pub point_balance: i64,
}

/// Lookup and balance write-back for member accounts
pub trait MemberDirectory: Send + Sync {
    /// Fetch a member by id; `None` when the member does not exist
    fn fetch(&self, id: &MemberId) -> Result<Option<MemberAccount>>;

    /// Persist the cached point balance for a member
    ///
    /// Unknown members are ignored: the entry that triggered the update is
    /// already durable and the next sweep reconciles the cache.
    fn update_balance(&self, id: &MemberId, balance: i64) -> Result<()>;
}

/// In-memory member directory for tests and single-process embedding
#[derive(Debug, Default)]
pub struct MemoryMemberDirectory {
    members: DashMap<MemberId, i64>,
}

impl MemoryMemberDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member with a zero balance
    pub fn register(&self, id: MemberId) {
        self.members.entry(id).or_insert(0);
    }

    /// Current cached balance, if the member exists
    pub fn balance(&self, id: &MemberId) -> Option<i64> {
        self.members.get(id).map(|b| *b)
    }
}

impl MemberDirectory for MemoryMemberDirectory {
    fn fetch(&self, id: &MemberId) -> Result<Option<MemberAccount>> {
        Ok(self.members.get(id).map(|b| MemberAccount {
            id: id.clone(),
            point_balance: *b,
        }))
    }

    fn update_balance(&self, id: &MemberId, balance: i64) -> Result<()> {
        if let Some(mut b) = self.members.get_mut(id) {
            *b = balance;
        }
        Ok(())
    }
}
