//! The history collaborator: durable record of past selections per group.

use std::collections::BTreeSet;

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::Selection;

/// Read/write contract the engine needs from persistence.
///
/// Implementations must make `upsert` last-writer-wins per
/// `(group_id, service_date)` and must never expose a half-written selection
/// to a concurrent `recent` call.
pub trait HistoryStore {
    /// Past selections of a group, most recent service date first.
    fn recent(&self, group_id: &str, limit: usize) -> Result<Vec<Selection>>;

    /// Insert or overwrite the selection for its `(group_id, service_date)`.
    ///
    /// Overwriting keeps the stored `id` and `created_at` and advances
    /// `updated_at`. Returns the selection as stored.
    fn upsert(&self, selection: &Selection) -> Result<Selection>;

    /// Remove the selection of a group for a date. Returns whether one existed.
    fn delete(&self, group_id: &str, service_date: NaiveDate) -> Result<bool>;
}

/// Hymn numbers a group used in its last `lookback` services.
///
/// The stored selection for `service_date` itself is skipped, since that is
/// the record a new build for the same date replaces. Recomputed on every
/// call; never cached.
pub fn history_window<H: HistoryStore + ?Sized>(
    store: &H,
    group_id: &str,
    service_date: NaiveDate,
    lookback: usize,
) -> Result<BTreeSet<u32>> {
    if lookback == 0 {
        return Ok(BTreeSet::new());
    }

    let window: BTreeSet<u32> = store
        .recent(group_id, lookback.saturating_add(1))?
        .iter()
        .filter(|s| s.service_date != service_date)
        .take(lookback)
        .flat_map(|s| s.hymn_numbers())
        .collect();

    tracing::debug!(
        "History window for group '{}' covers {} hymns over {} services",
        group_id,
        window.len(),
        lookback
    );
    Ok(window)
}
