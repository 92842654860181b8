//! Swap resolver and eligibility query.

use rand::seq::SliceRandom;
use rand::Rng;

use super::SelectionEngine;
use crate::error::SelectionError;
use crate::history::HistoryStore;
use crate::models::{Candidate, Entry, Selection};

impl SelectionEngine {
    /// Produce a replacement for the entry at `position`.
    ///
    /// `excluded_hymn_number` must be the hymn currently at that position.
    /// With an explicit `replacement_hymn_number` the hymn is validated
    /// against the slot rule and the rest of the selection; otherwise one is
    /// drawn from the slot's candidates, excluding the removed hymn and every
    /// hymn at another position, and avoiding the group's recent history when
    /// possible.
    ///
    /// The selection itself is not modified.
    pub fn swap<H, R>(
        &self,
        selection: &Selection,
        position: usize,
        excluded_hymn_number: u32,
        replacement_hymn_number: Option<u32>,
        store: &H,
        rng: &mut R,
    ) -> Result<Entry, SelectionError>
    where
        H: HistoryStore + ?Sized,
        R: Rng + ?Sized,
    {
        let (rule, constraints, current, mut taken) = self.slot_context(selection, position)?;

        if current.hymn_number != excluded_hymn_number {
            return Err(SelectionError::InvalidConstraint(format!(
                "position {} holds hymn {}, not {}",
                position, current.hymn_number, excluded_hymn_number
            )));
        }

        if let Some(number) = replacement_hymn_number {
            let hymn = self.catalog().get(number).ok_or_else(|| {
                SelectionError::InvalidReplacement(format!("hymn {} is not in the catalog", number))
            })?;
            if number == excluded_hymn_number {
                return Err(SelectionError::InvalidReplacement(format!(
                    "hymn {} is the one being replaced",
                    number
                )));
            }
            if taken.contains(&number) {
                return Err(SelectionError::InvalidReplacement(format!(
                    "hymn {} already appears in this selection",
                    number
                )));
            }
            if !rule.admits(hymn, &constraints) {
                return Err(SelectionError::InvalidReplacement(format!(
                    "hymn {} ({}) does not fit slot {} ({})",
                    number, hymn.category, position, rule
                )));
            }

            tracing::info!(
                "Replacing hymn {} with {} at position {}",
                excluded_hymn_number,
                number,
                position
            );
            return Ok(Entry::from_hymn(position, hymn));
        }

        taken.insert(excluded_hymn_number);
        let recent = self.recent_for(selection, store)?;
        let pool = self.pool(rule, &constraints, position, &taken, &recent)?;
        let hymn = *pool.choose(rng).ok_or_else(|| {
            SelectionError::CatalogExhausted(format!(
                "no alternative hymn for slot {} ({})",
                position, rule
            ))
        })?;

        tracing::info!(
            "Replacing hymn {} with random pick {} at position {}",
            excluded_hymn_number,
            hymn.number,
            position
        );
        Ok(Entry::from_hymn(position, hymn))
    }

    /// The hymns a random swap at `position` would choose from, ordered by
    /// number, plus the hymn currently there flagged with `is_current`.
    pub fn candidates<H>(
        &self,
        selection: &Selection,
        position: usize,
        store: &H,
    ) -> Result<Vec<Candidate>, SelectionError>
    where
        H: HistoryStore + ?Sized,
    {
        let (rule, constraints, current, mut taken) = self.slot_context(selection, position)?;
        taken.insert(current.hymn_number);

        let recent = self.recent_for(selection, store)?;
        let pool = self.pool(rule, &constraints, position, &taken, &recent)?;

        let mut candidates: Vec<Candidate> = pool
            .into_iter()
            .map(|hymn| Candidate {
                hymn: hymn.clone(),
                is_current: false,
            })
            .collect();

        if let Some(hymn) = self.catalog().get(current.hymn_number) {
            candidates.push(Candidate {
                hymn: hymn.clone(),
                is_current: true,
            });
            candidates.sort_by_key(|c| c.hymn.number);
        }

        Ok(candidates)
    }
}
