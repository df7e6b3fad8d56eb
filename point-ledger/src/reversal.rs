//! Reversal engine: exactly undoing a keyed entry
//!
//! Deleting an entry must not disturb anything recorded after it. The draw
//! edges make the compensation explicit in both directions: a reversed
//! debit hands capacity back to the credits it actually drew from, and a
//! reversed credit re-draws the backing its dependent debits lost from the
//! credits that remain. Afterwards every later entry's balance snapshot is
//! corrected by the removed delta.

use crate::consumption;
use crate::policy::PointPolicy;
use crate::types::{EntryId, RelationKey};
use crate::workset::WorkSet;
use chrono::{DateTime, Utc};

/// Undo the entry recorded for `relation`; `false` when no such entry exists
pub(crate) fn reverse(
    ws: &mut WorkSet,
    policy: &PointPolicy,
    now: DateTime<Utc>,
    relation: &RelationKey,
) -> bool {
    let Some(index) = ws.find_relation(relation) else {
        return false;
    };

    let entry = ws.remove(index);

    if entry.is_credit() {
        rehome_orphaned_draws(ws, policy, entry.id);
    } else if !entry.drawn_from.is_empty() {
        consumption::restore(ws, now, &entry.drawn_from);
    }

    // Cascade: later snapshots never included this entry
    for later in ws.entries.iter_mut().filter(|e| e.id > entry.id) {
        later.balance_after -= entry.delta;
    }
    let touched: Vec<EntryId> = ws
        .entries
        .iter()
        .filter(|e| e.id > entry.id)
        .map(|e| e.id)
        .collect();
    for id in touched {
        ws.touch(id);
    }

    tracing::debug!(
        member_id = %ws.member_id(),
        entry_id = %entry.id,
        delta = entry.delta,
        relation = %relation,
        "Ledger entry reversed"
    );

    true
}

/// Re-draw the backing that debits lose when `credit_id` disappears
///
/// Oldest debit first: its edges into the removed credit are dropped and the
/// orphaned amount is drawn again from the remaining spendable credits. A
/// shortfall is tolerated the same way an overdrawn spend is.
fn rehome_orphaned_draws(ws: &mut WorkSet, policy: &PointPolicy, credit_id: EntryId) {
    let orphaned: Vec<(EntryId, i64)> = ws
        .entries
        .iter_mut()
        .filter(|e| e.is_debit())
        .filter_map(|debit| {
            let before = debit.drawn_total();
            debit.drawn_from.retain(|d| d.credit_id != credit_id);
            let lost = before - debit.drawn_total();
            (lost > 0).then_some((debit.id, lost))
        })
        .collect();

    for (debit_id, lost) in orphaned {
        let draws = consumption::spend(ws, policy.consume_order(), lost);
        if let Some(i) = ws.position_of(debit_id) {
            ws.entries[i].drawn_from.extend(draws);
        }
        ws.touch(debit_id);
    }
}
