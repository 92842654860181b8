use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Hymn, Occasion};
use crate::error::SelectionError;

/// The liturgical shape of a service: how many hymns, and which theme.
///
/// Constructed only through [`ServiceConstraints::new`], which enforces that
/// an occasion is given if and only if the service is festive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConstraints {
    pub is_first_sunday: bool,
    pub is_festive: bool,
    pub occasion: Option<Occasion>,
    /// Explicit opt-in letting a non-festive service draw from
    /// "Occasioni speciali" in its general slots.
    pub include_special_occasions: bool,
}

impl ServiceConstraints {
    pub fn new(
        is_first_sunday: bool,
        is_festive: bool,
        occasion: Option<Occasion>,
        include_special_occasions: bool,
    ) -> Result<Self, SelectionError> {
        match (is_festive, occasion) {
            (true, None) => Err(SelectionError::InvalidConstraint(
                "an occasion is required for a festive service".to_string(),
            )),
            (false, Some(o)) => Err(SelectionError::InvalidConstraint(format!(
                "occasion '{}' given for a non-festive service",
                o
            ))),
            _ => Ok(Self {
                is_first_sunday,
                is_festive,
                occasion,
                include_special_occasions,
            }),
        }
    }

    /// 3 hymns on the first Sunday of the month, 4 otherwise.
    pub fn slot_count(&self) -> usize {
        if self.is_first_sunday {
            3
        } else {
            4
        }
    }

    /// The requested occasion, only when the service is festive.
    pub fn festive_occasion(&self) -> Option<Occasion> {
        if self.is_festive {
            self.occasion
        } else {
            None
        }
    }
}

/// One hymn in a selection.
///
/// Holds the hymn number as a weak reference into the catalog, plus the title
/// and category as they were when the entry was chosen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// 1-based position within the selection.
    pub position: usize,
    pub hymn_number: u32,
    pub title: String,
    pub category: String,
}

impl Entry {
    pub fn from_hymn(position: usize, hymn: &Hymn) -> Self {
        Self {
            position,
            hymn_number: hymn.number,
            title: hymn.title.clone(),
            category: hymn.category.clone(),
        }
    }
}

/// The ordered hymn list for one service of one group.
///
/// A selection without a `group_id` is a pure random draw and is never
/// persisted. Persisted selections are unique per `(group_id, service_date)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Selection {
    pub id: Uuid,
    pub group_id: Option<String>,
    /// Calendar date of the service the hymns are for.
    pub service_date: NaiveDate,
    pub is_first_sunday: bool,
    pub is_festive: bool,
    pub occasion: Option<Occasion>,
    #[serde(default)]
    pub include_special_occasions: bool,
    pub entries: Vec<Entry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Selection {
    pub fn constraints(&self) -> Result<ServiceConstraints, SelectionError> {
        ServiceConstraints::new(
            self.is_first_sunday,
            self.is_festive,
            self.occasion,
            self.include_special_occasions,
        )
    }

    pub fn entry(&self, position: usize) -> Option<&Entry> {
        self.entries.iter().find(|e| e.position == position)
    }

    pub fn hymn_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|e| e.hymn_number)
    }

    pub fn contains(&self, hymn_number: u32) -> bool {
        self.hymn_numbers().any(|n| n == hymn_number)
    }
}

/// A hymn offered as a replacement at a given position.
///
/// The hymn currently occupying the position is included and flagged, so a
/// caller can display it distinctly among the alternatives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    #[serde(flatten)]
    pub hymn: Hymn,
    pub is_current: bool,
}

/// Input for building a new selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSelectionInput {
    /// Group whose history is consulted. `None` means a pure random draw
    /// with no history lookup and no persistence.
    pub group_id: Option<String>,
    /// Defaults to the next upcoming Sunday.
    pub service_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_first_sunday: bool,
    #[serde(default)]
    pub is_festive: bool,
    pub occasion: Option<Occasion>,
    #[serde(default)]
    pub include_special_occasions: bool,
    /// Defaults to `true` when a group is given.
    pub persist: Option<bool>,
}

impl BuildSelectionInput {
    pub fn constraints(&self) -> Result<ServiceConstraints, SelectionError> {
        ServiceConstraints::new(
            self.is_first_sunday,
            self.is_festive,
            self.occasion,
            self.include_special_occasions,
        )
    }
}

/// Input for replacing one entry of a stored selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapEntryInput {
    pub position: usize,
    /// The hymn the caller believes occupies `position`.
    pub current_hymn_number: u32,
    /// Explicit replacement; a random eligible hymn is drawn when omitted.
    pub replacement_hymn_number: Option<u32>,
}
