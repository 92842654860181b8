//! Declarative slot table shared by build, swap and candidate listing.
//!
//! Each position of a selection maps to one [`SlotRule`]. The three engine
//! operations never test categories or tags directly; they only ask the rule
//! whether it admits a hymn, so they cannot disagree about eligibility.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Hymn, Occasion, ServiceConstraints, SACRAMENT_CATEGORY};

/// Position (1-based) that always holds the sacrament hymn.
pub const SACRAMENT_POSITION: usize = 2;

/// Which slot of a festive service is required to carry the occasion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FestiveSlot {
    /// The first hymn.
    #[default]
    Opening,
    /// The last hymn (3rd on a first Sunday, 4th otherwise).
    Closing,
}

impl FestiveSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Closing => "closing",
        }
    }

    /// 1-based position of the themed slot in a selection of `slot_count`.
    pub fn position(&self, slot_count: usize) -> usize {
        match self {
            Self::Opening => 1,
            Self::Closing => slot_count,
        }
    }
}

impl FromStr for FestiveSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "opening" => Ok(Self::Opening),
            "closing" => Ok(Self::Closing),
            other => Err(format!(
                "unknown festive slot '{}' (expected opening or closing)",
                other
            )),
        }
    }
}

/// Eligibility rule for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRule {
    /// Only hymns of the sacrament category.
    Sacrament,
    /// Only non-sacrament hymns carrying the occasion.
    Themed(Occasion),
    /// Any non-sacrament hymn. "Occasioni speciali" only on festive services
    /// or when explicitly requested.
    General,
}

impl SlotRule {
    /// Whether `hymn` may occupy a slot with this rule on the given service.
    ///
    /// On top of the per-slot check, every slot rejects hymns themed for an
    /// occasion other than the service's own (any occasion at all when the
    /// service is not festive).
    pub fn admits(&self, hymn: &Hymn, constraints: &ServiceConstraints) -> bool {
        let fits_service = match constraints.festive_occasion() {
            Some(occasion) => !Occasion::ALL
                .iter()
                .any(|other| *other != occasion && hymn.carries(*other)),
            None => !hymn.is_themed(),
        };
        if !fits_service {
            return false;
        }

        match self {
            Self::Sacrament => hymn.is_sacrament(),
            Self::Themed(occasion) => !hymn.is_sacrament() && hymn.carries(*occasion),
            Self::General => {
                !hymn.is_sacrament()
                    && (constraints.is_festive
                        || constraints.include_special_occasions
                        || !hymn.is_special_occasion())
            }
        }
    }

    /// Fill order: the most constrained slots draw first so a general slot
    /// never takes the only hymn a stricter slot could use.
    fn rank(&self) -> u8 {
        match self {
            Self::Sacrament => 0,
            Self::Themed(_) => 1,
            Self::General => 2,
        }
    }
}

impl fmt::Display for SlotRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sacrament => write!(f, "category '{}'", SACRAMENT_CATEGORY),
            Self::Themed(occasion) => write!(f, "occasion '{}'", occasion.tag()),
            Self::General => f.write_str("general"),
        }
    }
}

/// The rule for each position of a service, in position order.
pub fn slot_rules(constraints: &ServiceConstraints, festive_slot: FestiveSlot) -> Vec<SlotRule> {
    let count = constraints.slot_count();
    let themed = constraints
        .festive_occasion()
        .map(|occasion| (festive_slot.position(count), occasion));

    (1..=count)
        .map(|position| match themed {
            _ if position == SACRAMENT_POSITION => SlotRule::Sacrament,
            Some((themed_position, occasion)) if themed_position == position => {
                SlotRule::Themed(occasion)
            }
            _ => SlotRule::General,
        })
        .collect()
}

/// Zero-based slot indexes in the order they should be drawn.
pub fn fill_order(rules: &[SlotRule]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rules.len()).collect();
    order.sort_by_key(|&idx| rules[idx].rank());
    order
}
