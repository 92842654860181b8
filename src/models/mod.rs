//! Domain models for hymn selection.
//!
//! # Core Concepts
//!
//! - [`Hymn`]: Immutable catalog entry, tagged with a category and zero or
//!   more occasion tags.
//! - [`Selection`]: The ordered hymn list for one service of one group
//!   (a ward). Owns its [`Entry`] values outright; entries reference hymns by
//!   number only.
//! - [`ServiceConstraints`]: First-Sunday / festive flags that decide how many
//!   slots a selection has and what each slot admits.
//! - [`Candidate`]: A hymn offered as a replacement for one slot.

mod hymn;
mod selection;

pub use hymn::*;
pub use selection::*;
