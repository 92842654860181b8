//! The operations exposed to outer surfaces, wired to a catalog, a history
//! database and a process-local random generator.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::db::{Database, EntryUpdate};
use crate::engine::{SelectionEngine, SelectionPolicy};
use crate::error::SelectionError;
use crate::models::*;

pub struct HymnService {
    engine: SelectionEngine,
    db: Database,
    rng: Mutex<StdRng>,
}

impl HymnService {
    /// Create a service drawing from an entropy-seeded generator, or from
    /// `seed` when given.
    pub fn new(
        catalog: Arc<Catalog>,
        db: Database,
        policy: SelectionPolicy,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            engine: SelectionEngine::new(catalog, policy),
            db,
            rng: Mutex::new(rng),
        }
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        self.engine.catalog()
    }

    /// Build a selection and, unless told otherwise, store it for its group.
    ///
    /// Without a group there is no history lookup and nothing is stored.
    /// Asking to persist a group-less selection is a caller error; a store
    /// failure while persisting fails the whole call.
    pub fn build_selection(
        &self,
        input: BuildSelectionInput,
    ) -> Result<Selection, SelectionError> {
        let persist = input.persist.unwrap_or(input.group_id.is_some());
        if persist && input.group_id.is_none() {
            return Err(SelectionError::InvalidConstraint(
                "a group is required to persist a selection".to_string(),
            ));
        }

        let selection = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            self.engine.build(&input, &self.db, &mut *rng)
        }
        .map_err(log_failure)?;

        if persist {
            self.engine.save(&self.db, &selection)
        } else {
            Ok(selection)
        }
    }

    /// Replace one entry of a stored selection and persist the change.
    pub fn swap_entry(
        &self,
        selection_id: Uuid,
        input: SwapEntryInput,
    ) -> Result<Entry, SelectionError> {
        let selection = self.load_selection(selection_id)?;

        let entry = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            self.engine.swap(
                &selection,
                input.position,
                input.current_hymn_number,
                input.replacement_hymn_number,
                &self.db,
                &mut *rng,
            )
        }
        .map_err(log_failure)?;

        let update = self
            .db
            .replace_entry(selection_id, input.current_hymn_number, &entry)?;
        match update {
            EntryUpdate::Replaced => Ok(entry),
            EntryUpdate::Missing => Err(SelectionError::NotFound(format!(
                "selection {} has no entry at position {}",
                selection_id, entry.position
            ))),
            EntryUpdate::Stale { found } => {
                Err(log_failure(SelectionError::InvalidConstraint(format!(
                    "position {} now holds hymn {}, not {}",
                    entry.position, found, input.current_hymn_number
                ))))
            }
            EntryUpdate::Duplicate { position } => {
                Err(log_failure(SelectionError::InvalidReplacement(format!(
                    "hymn {} is already at position {}",
                    entry.hymn_number, position
                ))))
            }
        }
    }

    /// Replacement candidates for one position of a stored selection.
    pub fn list_candidates(
        &self,
        selection_id: Uuid,
        position: usize,
    ) -> Result<Vec<Candidate>, SelectionError> {
        let selection = self.load_selection(selection_id)?;
        self.engine
            .candidates(&selection, position, &self.db)
            .map_err(log_failure)
    }

    /// Past selections of a group, most recent first.
    pub fn group_history(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<Selection>, SelectionError> {
        Ok(self.db.get_group_history(group_id, limit)?)
    }

    pub fn delete_group_selection(
        &self,
        group_id: &str,
        service_date: NaiveDate,
    ) -> Result<bool, SelectionError> {
        let deleted = self.db.delete_selection(group_id, service_date)?;
        if deleted {
            tracing::info!("Deleted selection of group '{}' for {}", group_id, service_date);
        }
        Ok(deleted)
    }

    pub fn get_selection(&self, selection_id: Uuid) -> Result<Selection, SelectionError> {
        self.load_selection(selection_id)
    }

    pub fn groups(&self) -> Result<Vec<String>, SelectionError> {
        Ok(self.db.list_groups()?)
    }

    /// One random catalog hymn matching every criterion of the filter.
    pub fn find_hymn(&self, filter: &HymnFilter) -> Option<Hymn> {
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        self.catalog().pick(filter, &mut *rng).cloned()
    }

    fn load_selection(&self, selection_id: Uuid) -> Result<Selection, SelectionError> {
        self.db
            .get_selection(selection_id)?
            .ok_or_else(|| SelectionError::NotFound(format!("selection {}", selection_id)))
    }
}

fn log_failure(e: SelectionError) -> SelectionError {
    if e.is_caller_fault() {
        tracing::warn!("Rejected request: {}", e);
    } else {
        tracing::error!("Selection failed: {}", e);
    }
    e
}
