//! Main ledger orchestration layer
//!
//! This module ties storage, policy and the engines into the boundary API
//! the surrounding site code consumes: grant, spend, reverse, balance and
//! history. Every mutating call runs as one serialized unit of work for its
//! member; operations on different members proceed in parallel.
//!
//! # Example
//!
//! ```no_run
//! use point_ledger::{Config, MemberId, MemoryMemberDirectory, PointLedger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> point_ledger::Result<()> {
//!     let members = Arc::new(MemoryMemberDirectory::new());
//!     members.register(MemberId::new("alice"));
//!
//!     let ledger = PointLedger::open(Config::default(), members)?;
//!     ledger
//!         .grant(&MemberId::new("alice"), 100, "welcome", None, None)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

use crate::{
    accrual,
    member::MemberDirectory,
    metrics::Metrics,
    policy::PointPolicy,
    reversal,
    storage::{Storage, StorageStats},
    sweep,
    types::{EntryId, LedgerEntry, MemberId, PointSums, RelationKey},
    workset::WorkSet,
    Config, Result,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

/// The point ledger engine
pub struct PointLedger {
    storage: Arc<Storage>,

    /// External member accounts (cached balance write-back)
    members: Arc<dyn MemberDirectory>,

    /// Expiry and ordering policy, fixed at open
    policy: PointPolicy,

    /// One logical writer per member
    locks: DashMap<MemberId, Arc<Mutex<()>>>,

    metrics: Metrics,
}

impl std::fmt::Debug for PointLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointLedger")
            .field("policy", &self.policy)
            .field("members_locked", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl PointLedger {
    /// Open the ledger with configuration and an injected member directory
    pub fn open(config: Config, members: Arc<dyn MemberDirectory>) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let policy = PointPolicy::from_config(&config.point);
        let metrics = Metrics::new()?;

        Ok(Self {
            storage,
            members,
            policy,
            locks: DashMap::new(),
            metrics,
        })
    }

    fn member_lock(&self, member_id: &MemberId) -> Arc<Mutex<()>> {
        self.locks
            .entry(member_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Apply a signed point delta to a member
    ///
    /// Positive deltas accrue a credit; negative deltas route through the
    /// consumption engine and may push the balance negative. Silent no-ops
    /// (returning `Ok(None)`): ledger disabled, zero delta, unknown member,
    /// duplicate relation key.
    pub async fn grant(
        &self,
        member_id: &MemberId,
        delta: i64,
        description: &str,
        relation: Option<RelationKey>,
        expire_days: Option<u32>,
    ) -> Result<Option<EntryId>> {
        if !self.policy.is_enabled() || delta == 0 {
            return Ok(None);
        }
        if self.members.fetch(member_id)?.is_none() {
            return Ok(None);
        }

        let started = Instant::now();
        let lock = self.member_lock(member_id);
        let _guard = lock.lock().await;

        // Idempotent retry: the key is already recorded
        if let Some(relation) = &relation {
            if self.storage.find_relation(member_id, relation)?.is_some() {
                return Ok(None);
            }
        }

        let now = Utc::now();
        let mut ws = WorkSet::load(&self.storage, member_id)?;

        let total_before = ws.total();
        sweep::run(&mut ws, &self.storage, &self.policy, now);
        let forfeited = total_before - ws.total();

        let id = accrual::grant_entry(
            &mut ws,
            &self.storage,
            &self.policy,
            now,
            delta,
            description,
            relation,
            expire_days,
        );

        self.storage.apply(&ws.take_commit())?;
        self.members.update_balance(member_id, ws.running_total())?;

        self.metrics.record_forfeited(forfeited);
        if id.is_some() {
            self.metrics.record_entry(delta);
        }
        self.metrics
            .record_op_duration(started.elapsed().as_secs_f64());

        Ok(id)
    }

    /// Spend points: a keyed debit drawn from the member's credits
    pub async fn spend(
        &self,
        member_id: &MemberId,
        amount: i64,
        description: &str,
        relation: Option<RelationKey>,
    ) -> Result<Option<EntryId>> {
        if amount <= 0 {
            return Ok(None);
        }
        self.grant(member_id, -amount, description, relation, None)
            .await
    }

    /// Undo the entry previously recorded for a relation key
    ///
    /// Returns `false` when no entry carries the key (nothing to undo).
    pub async fn reverse(&self, member_id: &MemberId, relation: &RelationKey) -> Result<bool> {
        let started = Instant::now();
        let lock = self.member_lock(member_id);
        let _guard = lock.lock().await;

        if self.storage.find_relation(member_id, relation)?.is_none() {
            return Ok(false);
        }

        let now = Utc::now();
        let mut ws = WorkSet::load(&self.storage, member_id)?;

        let reversed = reversal::reverse(&mut ws, &self.policy, now, relation);

        self.storage.apply(&ws.take_commit())?;
        if reversed {
            self.members.update_balance(member_id, ws.running_total())?;
            self.metrics.record_reversal();
        }
        self.metrics
            .record_op_duration(started.elapsed().as_secs_f64());

        Ok(reversed)
    }

    /// Current balance: sweeps first, then returns the sum of all deltas
    /// and refreshes the member's cached balance
    pub async fn get_balance(&self, member_id: &MemberId) -> Result<i64> {
        let lock = self.member_lock(member_id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        let mut ws = WorkSet::load(&self.storage, member_id)?;

        let total_before = ws.total();
        if sweep::run(&mut ws, &self.storage, &self.policy, now) {
            self.storage.apply(&ws.take_commit())?;
            self.metrics.record_forfeited(total_before - ws.total());
        }

        let total = ws.total();
        if self.members.fetch(member_id)?.is_some() {
            self.members.update_balance(member_id, total)?;
        }

        Ok(total)
    }

    /// Page through a member's history, newest entry first
    ///
    /// History reads do not sweep; staleness is resolved by the next
    /// balance read.
    pub async fn list_history(
        &self,
        member_id: &MemberId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let lock = self.member_lock(member_id);
        let _guard = lock.lock().await;

        let mut entries = self.storage.load_member_entries(member_id)?;
        entries.reverse();
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    /// Number of history entries for a member
    pub async fn count_history(&self, member_id: &MemberId) -> Result<u64> {
        let lock = self.member_lock(member_id);
        let _guard = lock.lock().await;

        Ok(self.storage.load_member_entries(member_id)?.len() as u64)
    }

    /// Earned/spent sums over a member's full history
    pub async fn sum_history(&self, member_id: &MemberId) -> Result<PointSums> {
        let lock = self.member_lock(member_id);
        let _guard = lock.lock().await;

        let mut sums = PointSums::default();
        for entry in self.storage.load_member_entries(member_id)? {
            if entry.delta > 0 {
                sums.earned += entry.delta;
            } else {
                sums.spent += entry.delta;
            }
        }
        Ok(sums)
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Storage statistics
    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.storage.get_stats()
    }
}
