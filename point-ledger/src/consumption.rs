//! Consumption engine: drawing down credit capacity and giving it back
//!
//! `spend` walks the member's spendable credits in policy order and bumps
//! their `consumed` counters; `restore` is its exact mirror, driven by the
//! draw edges a debit recorded. The engine never rejects a spend: when the
//! candidates run out the caller's debit simply pushes the balance negative.

use crate::policy::ConsumeOrder;
use crate::types::{Draw, EntryStatus};
use crate::workset::WorkSet;
use chrono::{DateTime, Utc};

/// Draw `amount` points from the member's spendable credits
///
/// Returns the edges recording exactly which credits were drawn and by how
/// much; the sum of the edge amounts may be short of `amount` when capacity
/// runs out.
pub(crate) fn spend(ws: &mut WorkSet, order: ConsumeOrder, amount: i64) -> Vec<Draw> {
    debug_assert!(amount > 0);

    let mut candidates: Vec<usize> = ws
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_spendable())
        .map(|(i, _)| i)
        .collect();
    candidates.sort_by_key(|&i| order.sort_key(&ws.entries[i]));

    let mut remaining = amount;
    let mut draws = Vec::new();

    for i in candidates {
        if remaining == 0 {
            break;
        }

        let available = ws.entries[i].available();
        let drawn = if available > remaining {
            ws.entries[i].consumed += remaining;
            remaining
        } else {
            let credit = &mut ws.entries[i];
            credit.consumed = credit.delta;
            credit.status = EntryStatus::FullyConsumed;
            available
        };
        remaining -= drawn;

        draws.push(Draw {
            credit_id: ws.entries[i].id,
            amount: drawn,
        });
        let id = ws.entries[i].id;
        ws.touch(id);
    }

    draws
}

/// Give drawn-down capacity back to the exact credits named by `draws`
///
/// Time-swept (`Expired`) credits are skipped entirely: their unconsumed
/// remainder was already offset by a forfeiture debit, and touching the
/// counter would break that accounting. A fully consumed credit becomes
/// spendable again only while its expiry window is still open; past-expiry
/// credits keep their status so the sweep cannot forfeit the restored
/// capacity a second time. Edges pointing at credits that were since
/// reversed are skipped.
pub(crate) fn restore(ws: &mut WorkSet, now: DateTime<Utc>, draws: &[Draw]) {
    for draw in draws {
        let Some(i) = ws.position_of(draw.credit_id) else {
            continue;
        };

        let credit = &mut ws.entries[i];
        if credit.status == EntryStatus::Expired {
            continue;
        }
        credit.consumed = (credit.consumed - draw.amount).max(0);
        if credit.status == EntryStatus::FullyConsumed
            && credit.consumed < credit.delta
            && !credit.is_past_expiry(now)
        {
            credit.status = EntryStatus::Active;
        }
        ws.touch(draw.credit_id);
    }
}
