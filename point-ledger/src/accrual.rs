//! Accrual engine: creating ledger entries
//!
//! A positive delta becomes an active credit stamped with its expiry date; a
//! negative delta first draws down credits through the consumption engine
//! and lands as an already-closed debit carrying the draw edges. Keyed
//! grants are idempotent: a relation key that is already present makes the
//! whole call a no-op.

use crate::policy::PointPolicy;
use crate::storage::Storage;
use crate::types::{EntryId, EntryStatus, LedgerEntry, RelationKey};
use crate::workset::WorkSet;
use crate::{consumption, sweep};
use chrono::{DateTime, Utc};

/// Create the ledger entry for a grant (or spend, for negative `delta`)
///
/// The working set must already be swept; `balance_after` is computed from
/// the post-sweep sum of deltas. Returns `None` for a duplicate relation
/// key.
pub(crate) fn grant_entry(
    ws: &mut WorkSet,
    storage: &Storage,
    policy: &PointPolicy,
    now: DateTime<Utc>,
    delta: i64,
    description: &str,
    relation: Option<RelationKey>,
    expire_days: Option<u32>,
) -> Option<EntryId> {
    debug_assert!(delta != 0);

    if let Some(relation) = &relation {
        if ws.find_relation(relation).is_some() {
            return None;
        }
    }

    let (status, expires_at, drawn_from) = if delta > 0 {
        (EntryStatus::Active, policy.credit_expiry(now, expire_days), vec![])
    } else {
        let draws = consumption::spend(ws, policy.consume_order(), -delta);
        // A debit carries no forward capacity; close it on the spot
        (EntryStatus::Expired, Some(now), draws)
    };

    let balance_after = ws.total() + delta;
    let id = storage.allocate_entry_id();

    tracing::debug!(
        member_id = %ws.member_id(),
        entry_id = %id,
        delta,
        balance_after,
        "Ledger entry created"
    );

    Some(ws.append(LedgerEntry {
        id,
        member_id: ws.member_id().clone(),
        delta,
        description: description.to_string(),
        consumed: 0,
        status,
        expires_at,
        relation,
        balance_after,
        drawn_from,
    }))
}

/// Append the forfeiture debit for a sweep
///
/// Separate from [`grant_entry`]: forfeiture offsets the swept credits
/// directly and must not draw down anything, carries no relation key, and
/// uses the fixed description the sweep is recognized by.
pub(crate) fn forfeit_entry(
    ws: &mut WorkSet,
    storage: &Storage,
    now: DateTime<Utc>,
    forfeited: i64,
) -> EntryId {
    debug_assert!(forfeited > 0);

    let balance_after = ws.total() - forfeited;
    let id = storage.allocate_entry_id();

    ws.append(LedgerEntry {
        id,
        member_id: ws.member_id().clone(),
        delta: -forfeited,
        description: sweep::FORFEIT_DESCRIPTION.to_string(),
        consumed: 0,
        status: EntryStatus::Expired,
        expires_at: Some(now),
        relation: None,
        balance_after,
        drawn_from: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PointPolicyConfig};
    use crate::types::MemberId;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn policy(term_days: u32) -> PointPolicy {
        PointPolicy::from_config(&PointPolicyConfig {
            enabled: true,
            term_days,
        })
    }

    #[test]
    fn test_credit_entry_fields() {
        let (storage, _temp) = test_storage();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        let now = Utc::now();

        let id = grant_entry(
            &mut ws,
            &storage,
            &policy(10),
            now,
            100,
            "post reward",
            None,
            None,
        )
        .unwrap();

        let entry = &ws.entries[0];
        assert_eq!(entry.id, id);
        assert_eq!(entry.delta, 100);
        assert_eq!(entry.status, EntryStatus::Active);
        assert_eq!(entry.expires_at, Some(now + chrono::Duration::days(9)));
        assert_eq!(entry.balance_after, 100);
        assert!(entry.drawn_from.is_empty());
    }

    #[test]
    fn test_duplicate_relation_key_is_noop() {
        let (storage, _temp) = test_storage();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        let now = Utc::now();
        let relation = RelationKey::new("write_free", "7", "write");

        let first = grant_entry(
            &mut ws,
            &storage,
            &policy(0),
            now,
            10,
            "post",
            Some(relation.clone()),
            None,
        );
        assert!(first.is_some());

        let second = grant_entry(
            &mut ws,
            &storage,
            &policy(0),
            now,
            10,
            "post",
            Some(relation),
            None,
        );
        assert_eq!(second, None);
        assert_eq!(ws.entries.len(), 1);
    }

    #[test]
    fn test_debit_draws_and_closes() {
        let (storage, _temp) = test_storage();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        let now = Utc::now();
        let p = policy(0);

        grant_entry(&mut ws, &storage, &p, now, 100, "earn", None, None).unwrap();
        let debit_id =
            grant_entry(&mut ws, &storage, &p, now, -30, "spend", None, None).unwrap();

        let debit = &ws.entries[1];
        assert_eq!(debit.id, debit_id);
        assert_eq!(debit.status, EntryStatus::Expired);
        assert_eq!(debit.expires_at, Some(now));
        assert_eq!(debit.drawn_total(), 30);
        assert_eq!(debit.balance_after, 70);
        assert_eq!(ws.entries[0].consumed, 30);
    }
}
