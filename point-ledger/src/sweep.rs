//! Expiry sweep: lazy forfeiture of expired credit capacity
//!
//! There is no background expiration task. The sweep runs synchronously at
//! the head of every balance read (and every grant, which needs the
//! post-sweep total): whatever unconsumed capacity sits in active credits
//! past their expiry date is offset by one forfeiture debit, and the swept
//! credits are closed so a second sweep finds nothing.

use crate::accrual;
use crate::policy::PointPolicy;
use crate::storage::Storage;
use crate::types::EntryStatus;
use crate::workset::WorkSet;
use chrono::{DateTime, Utc};

/// Description carried by every forfeiture entry
pub const FORFEIT_DESCRIPTION: &str = "points forfeited";

/// Sweep one member's expired credits; returns whether anything changed
pub(crate) fn run(
    ws: &mut WorkSet,
    storage: &Storage,
    policy: &PointPolicy,
    now: DateTime<Utc>,
) -> bool {
    if !policy.expires() {
        return false;
    }

    let stale: Vec<usize> = ws
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            e.is_credit() && e.status == EntryStatus::Active && e.is_past_expiry(now)
        })
        .map(|(i, _)| i)
        .collect();

    if stale.is_empty() {
        return false;
    }

    let forfeited: i64 = stale.iter().map(|&i| ws.entries[i].available()).sum();

    // Capacity is closed once any part of an entry has passed expiry,
    // no matter how much of it was actually forfeited
    for &i in &stale {
        ws.entries[i].status = EntryStatus::Expired;
        let id = ws.entries[i].id;
        ws.touch(id);
    }

    if forfeited > 0 {
        accrual::forfeit_entry(ws, storage, now, forfeited);
        tracing::debug!(
            member_id = %ws.member_id(),
            forfeited,
            swept_entries = stale.len(),
            "Expired points forfeited"
        );
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, PointPolicyConfig};
    use crate::types::{EntryId, LedgerEntry, MemberId};
    use chrono::Duration;
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

    fn credit(
        id: u64,
        delta: i64,
        consumed: i64,
        expires_at: Option<DateTime<Utc>>,
        balance_after: i64,
    ) -> LedgerEntry {
        LedgerEntry {
            id: EntryId::from_raw(id),
            member_id: MemberId::new("alice"),
            delta,
            description: String::new(),
            consumed,
            status: EntryStatus::Active,
            expires_at,
            relation: None,
            balance_after,
            drawn_from: vec![],
        }
    }

    #[test]
    fn test_sweep_noop_when_expiry_disabled() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        ws.append(credit(1, 10, 0, Some(now - Duration::days(5)), 10));

        assert!(!run(&mut ws, &storage, &policy(0), now));
        assert_eq!(ws.entries.len(), 1);
        assert_eq!(ws.entries[0].status, EntryStatus::Active);
    }

    #[test]
    fn test_sweep_forfeits_unconsumed_remainder() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        // +10 credit, 3 already consumed, expired in the past
        ws.append(credit(1, 10, 3, Some(now - Duration::days(1)), 10));

        assert!(run(&mut ws, &storage, &policy(30), now));

        assert_eq!(ws.entries.len(), 2);
        assert_eq!(ws.entries[0].status, EntryStatus::Expired);

        let forfeit = &ws.entries[1];
        assert_eq!(forfeit.delta, -7);
        assert_eq!(forfeit.description, FORFEIT_DESCRIPTION);
        assert_eq!(forfeit.status, EntryStatus::Expired);
        assert_eq!(forfeit.relation, None);
        assert_eq!(forfeit.balance_after, 3);
        assert_eq!(ws.total(), 3);
    }

    #[test]
    fn test_sweep_twice_forfeits_once() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        ws.append(credit(1, 10, 0, Some(now - Duration::days(1)), 10));

        assert!(run(&mut ws, &storage, &policy(30), now));
        assert!(!run(&mut ws, &storage, &policy(30), now));

        let forfeits = ws
            .entries
            .iter()
            .filter(|e| e.description == FORFEIT_DESCRIPTION)
            .count();
        assert_eq!(forfeits, 1);
    }

    #[test]
    fn test_sweep_spares_live_and_unexpiring_credits() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        ws.append(credit(1, 10, 0, Some(now + Duration::days(5)), 10));
        ws.append(credit(2, 20, 0, None, 30));

        assert!(!run(&mut ws, &storage, &policy(30), now));
        assert!(ws.entries.iter().all(|e| e.status == EntryStatus::Active));
    }

    #[test]
    fn test_sweep_closes_entry_even_with_nothing_to_forfeit() {
        let (storage, _temp) = test_storage();
        let now = Utc::now();
        let mut ws = WorkSet::empty(MemberId::new("alice"));
        // Fully drawn down, then expired: nothing to forfeit but still closed
        ws.append(credit(1, 10, 10, Some(now - Duration::days(1)), 10));

        assert!(run(&mut ws, &storage, &policy(30), now));
        assert_eq!(ws.entries.len(), 1);
        assert_eq!(ws.entries[0].status, EntryStatus::Expired);
    }
}
