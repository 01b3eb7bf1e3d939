//! Folding the activity log into per-coin holding deltas

use crate::types::{ActivityDelta, ActivityEvent, ActivityKind, DeltaMap};

/// Orders events chronologically
///
/// Events without a date come first; ties keep their transaction id order
/// so the fold is deterministic across backends.
pub fn sort_chronologically(events: &mut [ActivityEvent]) {
    events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.tx_id.cmp(&b.tx_id)));
}

/// Folds an ordered sequence of events into deltas keyed by coin id
///
/// A buy adds its amount, a sell subtracts it and the running amount is
/// clamped at zero after every subtraction. Other kinds only register the
/// coin. The symbol of the first event seen for a coin is kept.
pub fn fold_activity<'a, I>(events: I) -> DeltaMap
where
    I: IntoIterator<Item = &'a ActivityEvent>,
{
    let mut deltas = DeltaMap::new();

    for event in events {
        let delta = deltas
            .entry(event.id.clone())
            .or_insert_with(|| ActivityDelta {
                symbol: event.symbol.clone(),
                amount: 0.0,
            });

        match event.kind {
            ActivityKind::Buy => delta.amount += event.amount,
            ActivityKind::Sell => delta.amount = (delta.amount - event.amount).max(0.0),
            ActivityKind::Transfer | ActivityKind::Other => {}
        }
    }

    deltas
}
