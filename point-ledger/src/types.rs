//! Core types for the point ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (i64 point amounts)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Member identifier (forum login id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId(String);

impl MemberId {
    /// Create new member ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger entry identifier
///
/// Globally monotonic, assigned at insert. For a fixed member, ascending
/// `EntryId` is the entry ordering every invariant is stated against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EntryId(u64);

impl EntryId {
    /// Create from raw value
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Big-endian key bytes (sorts numerically in RocksDB)
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relation key: the `(table, id, action)` triple identifying the site event
/// that caused an entry
///
/// At most one entry per member may carry a given key; it is the idempotency
/// and reversal lookup handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationKey {
    /// Source table ("write_free", "member", ...)
    pub table: String,
    /// Row id within the source table
    pub id: String,
    /// Action discriminator ("write", "download", ...)
    pub action: String,
}

impl RelationKey {
    /// Create new relation key
    pub fn new(
        table: impl Into<String>,
        id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.table, self.id, self.action)
    }
}

/// Entry lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryStatus {
    /// Credit with spendable capacity (or a freshly restored one)
    Active = 0,
    /// Capacity closed by time: forfeited, past expiry, or a plain debit
    Expired = 1,
    /// Credit drawn down to zero by spends (distinct from time-based expiry)
    FullyConsumed = 2,
}

/// Consumption edge: a debit's record of one credit it drew down
///
/// Recording edges makes reversal restoration exact: a reversed debit gives
/// capacity back to precisely these credits, and a reversed credit knows
/// which debits lost their backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    /// Credit entry the points were drawn from
    pub credit_id: EntryId,
    /// Amount drawn (always positive)
    pub amount: i64,
}

/// One record of a balance change for a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID (monotonic, defines per-member ordering)
    pub id: EntryId,

    /// Owning member
    pub member_id: MemberId,

    /// Signed point amount: positive = credit (earn), negative = debit
    /// (spend or forfeiture)
    pub delta: i64,

    /// Free-text reason (no semantic weight to the engine)
    pub description: String,

    /// How much of this credit has been drawn down by later debits;
    /// meaningful only for credits, `0 <= consumed <= delta`
    pub consumed: i64,

    /// Lifecycle status
    pub status: EntryStatus,

    /// Date after which remaining capacity is swept; `None` = never
    pub expires_at: Option<DateTime<Utc>>,

    /// Idempotency / reversal key, when the entry was caused by a keyed
    /// site action
    pub relation: Option<RelationKey>,

    /// Member's running total immediately after this entry was inserted
    pub balance_after: i64,

    /// For debits: the exact credits this entry drew down
    #[serde(default)]
    pub drawn_from: Vec<Draw>,
}

impl LedgerEntry {
    /// Positive delta
    pub fn is_credit(&self) -> bool {
        self.delta > 0
    }

    /// Negative delta
    pub fn is_debit(&self) -> bool {
        self.delta < 0
    }

    /// Remaining spendable capacity of a credit
    pub fn available(&self) -> i64 {
        if self.is_credit() {
            self.delta - self.consumed
        } else {
            0
        }
    }

    /// Credit that can still be drawn from
    pub fn is_spendable(&self) -> bool {
        self.status == EntryStatus::Active && self.available() > 0
    }

    /// Expiry has passed at `now` (entries without a date never expire)
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(t) if t < now)
    }

    /// Total amount this debit drew from credits
    pub fn drawn_total(&self) -> i64 {
        self.drawn_from.iter().map(|d| d.amount).sum()
    }
}

/// Positive/negative sums over a member's full history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointSums {
    /// Sum of all positive deltas
    pub earned: i64,
    /// Sum of all negative deltas (non-positive)
    pub spent: i64,
}
