//! Plain-text rendering of selections for the terminal.

use crate::engine::dates::format_service_date;
use crate::models::{Candidate, Selection};

const CURRENT: char = '●';
const OTHER: char = '○';

/// Render one selection.
///
/// Example output:
/// ```text
/// Sunday, December 15, 2024 · Rione Nord · festive (christmas)
///   1. #  201  Astro del ciel  [Natale]
///   2. #  169  Mentre ci accostiamo  [Sacramento]
///   3. #   85  Quanto è grande Iddio  [Restaurazione]
///   4. #  204  Oh venite, fedeli  [Natale]
/// ```
pub fn render_selection(selection: &Selection) -> String {
    let mut output = String::new();

    output.push_str(&format_service_date(selection.service_date));
    if let Some(group_id) = &selection.group_id {
        output.push_str(" · ");
        output.push_str(group_id);
    }
    for label in labels(selection) {
        output.push_str(" · ");
        output.push_str(&label);
    }
    output.push('\n');

    for entry in &selection.entries {
        output.push_str(&format!(
            "  {}. #{:>5}  {}  [{}]\n",
            entry.position, entry.hymn_number, entry.title, entry.category
        ));
    }

    output
}

/// Render a group's history, one block per selection, separated by blank lines.
pub fn render_history(selections: &[Selection]) -> String {
    if selections.is_empty() {
        return "No selections recorded.\n".to_string();
    }

    selections
        .iter()
        .map(render_selection)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a candidate list, marking the hymn currently in the slot.
pub fn render_candidates(candidates: &[Candidate]) -> String {
    let mut output = String::new();
    for candidate in candidates {
        let marker = if candidate.is_current { CURRENT } else { OTHER };
        output.push_str(&format!(
            "{} #{:>5}  {}  [{}]\n",
            marker, candidate.hymn.number, candidate.hymn.title, candidate.hymn.category
        ));
    }
    output
}

fn labels(selection: &Selection) -> Vec<String> {
    let mut labels = Vec::new();
    if selection.is_first_sunday {
        labels.push("first Sunday".to_string());
    }
    if selection.is_festive {
        match selection.occasion {
            Some(occasion) => labels.push(format!("festive ({})", occasion)),
            None => labels.push("festive".to_string()),
        }
    }
    labels
}
