//! Point policy: expiry computation and consumption ordering
//!
//! The ordering of the spend walk depends on whether expiration is enabled.
//! Rather than re-deciding that in each engine, the comparator is selected
//! once from the policy and passed around as a value.

use crate::config::PointPolicyConfig;
use crate::types::LedgerEntry;
use chrono::{DateTime, Duration, Utc};

/// Runtime point policy, derived from configuration at open
#[derive(Debug, Clone, Copy)]
pub struct PointPolicy {
    enabled: bool,
    term_days: u32,
}

impl PointPolicy {
    /// Build from configuration
    pub fn from_config(config: &PointPolicyConfig) -> Self {
        Self {
            enabled: config.enabled,
            term_days: config.term_days,
        }
    }

    /// Ledger switched on at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Credits carry an expiry date
    pub fn expires(&self) -> bool {
        self.term_days > 0
    }

    /// Expiry date for a new credit granted at `now`
    ///
    /// `None` when expiration is disabled; otherwise the longer of the
    /// requested lifetime and the configured default, counted inclusive of
    /// the grant day.
    pub fn credit_expiry(
        &self,
        now: DateTime<Utc>,
        requested_days: Option<u32>,
    ) -> Option<DateTime<Utc>> {
        if self.term_days == 0 {
            return None;
        }
        let days = requested_days.unwrap_or(0).max(self.term_days);
        Some(now + Duration::days(i64::from(days) - 1))
    }

    /// Comparator for the spend walk
    pub fn consume_order(&self) -> ConsumeOrder {
        if self.expires() {
            ConsumeOrder::ExpiryThenId
        } else {
            ConsumeOrder::Fifo
        }
    }
}

/// Ordering of spendable credits during a spend walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOrder {
    /// Insertion order only
    Fifo,
    /// Soonest-expiring credit first, insertion order as tie-break;
    /// credits without an expiry date sort last
    ExpiryThenId,
}

impl ConsumeOrder {
    /// Sort key for a candidate credit
    pub fn sort_key(&self, entry: &LedgerEntry) -> (i64, u64) {
        match self {
            ConsumeOrder::Fifo => (0, entry.id.raw()),
            ConsumeOrder::ExpiryThenId => (
                entry.expires_at.map_or(i64::MAX, |t| t.timestamp()),
                entry.id.raw(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryId, EntryStatus, MemberId};

    fn credit(id: u64, expires_at: Option<DateTime<Utc>>) -> LedgerEntry {
        LedgerEntry {
            id: EntryId::from_raw(id),
            member_id: MemberId::new("alice"),
            delta: 10,
            description: String::new(),
            consumed: 0,
            status: EntryStatus::Active,
            expires_at,
            relation: None,
            balance_after: 10,
            drawn_from: vec![],
        }
    }

    fn policy(term_days: u32) -> PointPolicy {
        PointPolicy::from_config(&PointPolicyConfig {
            enabled: true,
            term_days,
        })
    }

    #[test]
    fn test_expiry_disabled_yields_no_date() {
        let now = Utc::now();
        assert_eq!(policy(0).credit_expiry(now, Some(14)), None);
    }

    #[test]
    fn test_expiry_uses_longer_of_requested_and_default() {
        let now = Utc::now();
        let p = policy(10);

        // Default term, counted inclusive of the grant day
        assert_eq!(p.credit_expiry(now, None), Some(now + Duration::days(9)));
        // Longer request wins
        assert_eq!(
            p.credit_expiry(now, Some(30)),
            Some(now + Duration::days(29))
        );
        // Shorter request does not shorten the default
        assert_eq!(
            p.credit_expiry(now, Some(3)),
            Some(now + Duration::days(9))
        );
    }

    #[test]
    fn test_fifo_order_ignores_expiry() {
        let now = Utc::now();
        let soon = credit(2, Some(now + Duration::days(1)));
        let late = credit(1, Some(now + Duration::days(30)));

        let order = ConsumeOrder::Fifo;
        assert!(order.sort_key(&late) < order.sort_key(&soon));
    }

    #[test]
    fn test_expiry_order_spends_soonest_first() {
        let now = Utc::now();
        let soon = credit(2, Some(now + Duration::days(1)));
        let late = credit(1, Some(now + Duration::days(30)));
        let never = credit(3, None);

        let order = ConsumeOrder::ExpiryThenId;
        assert!(order.sort_key(&soon) < order.sort_key(&late));
        assert!(order.sort_key(&late) < order.sort_key(&never));
    }
}
