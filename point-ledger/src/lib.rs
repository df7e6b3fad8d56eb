//! Point Ledger Engine
//!
//! Per-member reward-point ledger: grants, ordered spending, lazy expiry
//! and exact reversal, backed by an append-mostly RocksDB entry log.
//!
//! # Architecture
//!
//! - **Entry log**: every balance change is one signed entry carrying a
//!   running-balance snapshot
//! - **Single writer per member**: all mutation for one member runs inside
//!   one serialized unit of work; members do not contend with each other
//! - **Lazy expiry**: no background task; expired credit is forfeited at the
//!   head of the next balance read
//! - **Draw edges**: every debit records exactly which credits it consumed,
//!   so reversal compensates the right entries
//!
//! # Invariants
//!
//! - Running balance: each entry's snapshot is the previous snapshot plus
//!   its delta, and the cached member balance equals the newest snapshot
//! - Consumption bound: a credit's consumed amount stays within `[0, delta]`
//! - Keyed idempotency: at most one entry per member per relation key

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod ledger;
pub mod member;
pub mod metrics;
pub mod policy;
pub mod storage;
pub mod types;

mod accrual;
mod consumption;
mod reversal;
mod sweep;
mod workset;

// Re-exports
pub use config::{Config, PointPolicyConfig, RocksDbConfig};
pub use error::{Error, Result};
pub use ledger::PointLedger;
pub use member::{MemberAccount, MemberDirectory, MemoryMemberDirectory};
pub use policy::{ConsumeOrder, PointPolicy};
pub use storage::{Storage, StorageStats};
pub use sweep::FORFEIT_DESCRIPTION;
pub use types::{
    Draw, EntryId, EntryStatus, LedgerEntry, MemberId, PointSums, RelationKey,
};
