//! Selection engine: builds a selection, swaps one of its entries, and lists
//! the replacement candidates for a slot.
//!
//! All three operations go through [`SelectionEngine::pool`], which applies
//! the slot table from [`rules`] and the repetition-avoidance policy:
//!
//! 1. Start from every catalog hymn the slot rule admits. An empty set here
//!    is [`SelectionError::CatalogExhausted`].
//! 2. Drop hymns already taken by the selection.
//! 3. Drop hymns in the group's history window, unless that would leave
//!    nothing, in which case history is ignored for this slot only.
//!
//! Randomness is always supplied by the caller so draws are reproducible
//! with a seeded generator.

pub mod dates;
pub mod rules;
mod swap;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::error::SelectionError;
use crate::history::{history_window, HistoryStore};
use crate::models::*;

pub use rules::{fill_order, slot_rules, FestiveSlot, SlotRule, SACRAMENT_POSITION};

/// Number of previous services whose hymns are avoided by default.
pub const DEFAULT_LOOKBACK: usize = 4;

/// Tunable choices of the selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPolicy {
    /// How many previous services of a group form its history window.
    pub lookback: usize,
    /// Which slot of a festive service must carry the occasion.
    pub festive_slot: FestiveSlot,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            festive_slot: FestiveSlot::Opening,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionEngine {
    catalog: Arc<Catalog>,
    policy: SelectionPolicy,
}

impl SelectionEngine {
    pub fn new(catalog: Arc<Catalog>, policy: SelectionPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn rules_for(&self, constraints: &ServiceConstraints) -> Vec<SlotRule> {
        slot_rules(constraints, self.policy.festive_slot)
    }

    /// Build a new selection without persisting it.
    ///
    /// When the input names a group, its history window is read from `store`
    /// and avoided where the catalog allows. The service date defaults to the
    /// next upcoming Sunday.
    pub fn build<H, R>(
        &self,
        input: &BuildSelectionInput,
        store: &H,
        rng: &mut R,
    ) -> Result<Selection, SelectionError>
    where
        H: HistoryStore + ?Sized,
        R: Rng + ?Sized,
    {
        let constraints = input.constraints()?;
        let service_date = input
            .service_date
            .unwrap_or_else(dates::default_service_date);

        let recent = match input.group_id.as_deref() {
            Some(group_id) => {
                history_window(store, group_id, service_date, self.policy.lookback)?
            }
            None => BTreeSet::new(),
        };

        let rules = self.rules_for(&constraints);
        let mut chosen: Vec<Option<&Hymn>> = vec![None; rules.len()];
        let mut taken = BTreeSet::new();

        for idx in fill_order(&rules) {
            let position = idx + 1;
            let pool = self.pool(rules[idx], &constraints, position, &taken, &recent)?;
            let hymn = *pool.choose(rng).ok_or_else(|| {
                SelectionError::CatalogExhausted(format!(
                    "not enough distinct hymns for slot {} ({})",
                    position, rules[idx]
                ))
            })?;
            taken.insert(hymn.number);
            chosen[idx] = Some(hymn);
        }

        let entries: Vec<Entry> = chosen
            .into_iter()
            .enumerate()
            .filter_map(|(idx, hymn)| hymn.map(|h| Entry::from_hymn(idx + 1, h)))
            .collect();

        tracing::info!(
            "Built selection of {} hymns for {} (group: {})",
            entries.len(),
            service_date,
            input.group_id.as_deref().unwrap_or("-")
        );

        let now = Utc::now();
        Ok(Selection {
            id: Uuid::new_v4(),
            group_id: input.group_id.clone(),
            service_date,
            is_first_sunday: constraints.is_first_sunday,
            is_festive: constraints.is_festive,
            occasion: constraints.occasion,
            include_special_occasions: constraints.include_special_occasions,
            entries,
            created_at: now,
            updated_at: now,
        })
    }

    /// Persist a selection. Saving again for the same group and date
    /// overwrites the stored entries and keeps the original `created_at`.
    pub fn save<H>(&self, store: &H, selection: &Selection) -> Result<Selection, SelectionError>
    where
        H: HistoryStore + ?Sized,
    {
        let saved = store.upsert(selection)?;
        tracing::info!(
            "Saved selection {} for group '{}' on {}",
            saved.id,
            saved.group_id.as_deref().unwrap_or("-"),
            saved.service_date
        );
        Ok(saved)
    }

    /// Candidate hymns for one slot, ordered by hymn number.
    ///
    /// May be empty when every admissible hymn is already taken. Fails only
    /// when the rule admits no catalog hymn at all.
    pub(crate) fn pool(
        &self,
        rule: SlotRule,
        constraints: &ServiceConstraints,
        position: usize,
        taken: &BTreeSet<u32>,
        recent: &BTreeSet<u32>,
    ) -> Result<Vec<&Hymn>, SelectionError> {
        let eligible: Vec<&Hymn> = self
            .catalog
            .all_hymns()
            .iter()
            .filter(|h| rule.admits(h, constraints))
            .collect();

        if eligible.is_empty() {
            tracing::error!("No catalog hymn fits slot {} ({})", position, rule);
            return Err(SelectionError::CatalogExhausted(format!(
                "no hymn in the catalog fits slot {} ({})",
                position, rule
            )));
        }

        let unused: Vec<&Hymn> = eligible
            .into_iter()
            .filter(|h| !taken.contains(&h.number))
            .collect();
        let fresh: Vec<&Hymn> = unused
            .iter()
            .copied()
            .filter(|h| !recent.contains(&h.number))
            .collect();

        if fresh.is_empty() && !unused.is_empty() {
            tracing::warn!(
                "All {} candidates for slot {} were used recently, ignoring history for this slot",
                unused.len(),
                position
            );
            return Ok(unused);
        }

        Ok(fresh)
    }

    /// Rule, constraints and the hymns at every other position, for a slot
    /// of an existing selection.
    fn slot_context<'s>(
        &self,
        selection: &'s Selection,
        position: usize,
    ) -> Result<(SlotRule, ServiceConstraints, &'s Entry, BTreeSet<u32>), SelectionError> {
        let constraints = selection.constraints()?;
        let rules = self.rules_for(&constraints);

        let rule = position
            .checked_sub(1)
            .and_then(|idx| rules.get(idx))
            .copied()
            .ok_or_else(|| {
                SelectionError::InvalidConstraint(format!(
                    "position {} is outside a selection of {} hymns",
                    position,
                    rules.len()
                ))
            })?;

        let entry = selection.entry(position).ok_or_else(|| {
            SelectionError::InvalidConstraint(format!(
                "selection has no entry at position {}",
                position
            ))
        })?;

        let others = selection
            .entries
            .iter()
            .filter(|e| e.position != position)
            .map(|e| e.hymn_number)
            .collect();

        Ok((rule, constraints, entry, others))
    }

    fn recent_for<H>(
        &self,
        selection: &Selection,
        store: &H,
    ) -> Result<BTreeSet<u32>, SelectionError>
    where
        H: HistoryStore + ?Sized,
    {
        match selection.group_id.as_deref() {
            Some(group_id) => Ok(history_window(
                store,
                group_id,
                selection.service_date,
                self.policy.lookback,
            )?),
            None => Ok(BTreeSet::new()),
        }
    }
}
