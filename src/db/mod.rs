mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::history::HistoryStore;
use crate::models::*;

const SELECTION_COLUMNS: &str = "id, group_id, service_date, is_first_sunday, is_festive, occasion,
     include_special_occasions, created_at, updated_at";

/// Outcome of [`Database::replace_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryUpdate {
    Replaced,
    /// No such selection, or no entry at that position.
    Missing,
    /// The position holds a different hymn than the caller expected.
    Stale { found: u32 },
    /// The replacement already sits at another position.
    Duplicate { position: usize },
}

/// SQLite-backed history store.
///
/// One row per `(group_id, service_date)` in `selections`, with its entries
/// in `selection_entries`. Every write that touches both tables runs in a
/// single transaction.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Location of the database in the user's data directory.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "hymn-selector")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(dirs.data_dir().join("hymns.db"))
    }

    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Selection reads
    // ============================================================

    pub fn get_selection(&self, id: Uuid) -> Result<Option<Selection>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let selection = conn
            .query_row(
                &format!("SELECT {} FROM selections WHERE id = ?", SELECTION_COLUMNS),
                [id.to_string()],
                selection_from_row,
            )
            .optional()?;

        match selection {
            Some(mut selection) => {
                selection.entries = load_entries(&conn, selection.id)?;
                Ok(Some(selection))
            }
            None => Ok(None),
        }
    }

    pub fn get_selection_for_date(
        &self,
        group_id: &str,
        service_date: NaiveDate,
    ) -> Result<Option<Selection>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let selection = conn
            .query_row(
                &format!(
                    "SELECT {} FROM selections WHERE group_id = ? AND service_date = ?",
                    SELECTION_COLUMNS
                ),
                (group_id, format_date(service_date)),
                selection_from_row,
            )
            .optional()?;

        match selection {
            Some(mut selection) => {
                selection.entries = load_entries(&conn, selection.id)?;
                Ok(Some(selection))
            }
            None => Ok(None),
        }
    }

    /// Past selections of a group, most recent service date first.
    pub fn get_group_history(&self, group_id: &str, limit: usize) -> Result<Vec<Selection>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM selections WHERE group_id = ?
             ORDER BY service_date DESC LIMIT ?",
            SELECTION_COLUMNS
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut selections = stmt
            .query_map((group_id, limit), selection_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for selection in &mut selections {
            selection.entries = load_entries(&conn, selection.id)?;
        }

        Ok(selections)
    }

    /// Groups with at least one stored selection, by name.
    pub fn list_groups(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt =
            conn.prepare("SELECT DISTINCT group_id FROM selections ORDER BY group_id")?;
        let groups = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(groups)
    }

    // ============================================================
    // Selection writes
    // ============================================================

    /// Insert or overwrite the selection stored for its group and date.
    ///
    /// An existing record keeps its `id` and `created_at`; its flags and
    /// entries are replaced and `updated_at` is set to now.
    pub fn upsert_selection(&self, selection: &Selection) -> Result<Selection> {
        let Some(group_id) = selection.group_id.as_deref() else {
            bail!("Cannot store a selection without a group");
        };

        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let now = Utc::now();
        let service_date = format_date(selection.service_date);

        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT id, created_at FROM selections WHERE group_id = ? AND service_date = ?",
                (group_id, &service_date),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (id, created_at) = match existing {
            Some((id, created_at)) => {
                tx.execute(
                    "UPDATE selections
                     SET is_first_sunday = ?, is_festive = ?, occasion = ?,
                         include_special_occasions = ?, updated_at = ?
                     WHERE id = ?",
                    (
                        selection.is_first_sunday,
                        selection.is_festive,
                        selection.occasion.map(|o| o.as_str()),
                        selection.include_special_occasions,
                        now.to_rfc3339(),
                        &id,
                    ),
                )?;
                tx.execute(
                    "DELETE FROM selection_entries WHERE selection_id = ?",
                    [&id],
                )?;
                (parse_uuid(id), parse_datetime(created_at))
            }
            None => {
                tx.execute(
                    "INSERT INTO selections (id, group_id, service_date, is_first_sunday, is_festive,
                         occasion, include_special_occasions, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    (
                        selection.id.to_string(),
                        group_id,
                        &service_date,
                        selection.is_first_sunday,
                        selection.is_festive,
                        selection.occasion.map(|o| o.as_str()),
                        selection.include_special_occasions,
                        selection.created_at.to_rfc3339(),
                        now.to_rfc3339(),
                    ),
                )?;
                (selection.id, selection.created_at)
            }
        };

        for entry in &selection.entries {
            tx.execute(
                "INSERT INTO selection_entries (selection_id, position, hymn_number, title, category)
                 VALUES (?, ?, ?, ?, ?)",
                (
                    id.to_string(),
                    entry.position as i64,
                    entry.hymn_number,
                    &entry.title,
                    &entry.category,
                ),
            )?;
        }

        tx.commit()?;

        Ok(Selection {
            id,
            created_at,
            updated_at: now,
            ..selection.clone()
        })
    }

    /// Replace the single entry at `entry.position` and bump `updated_at`.
    ///
    /// The stored row must still hold `expected_current`, and no other
    /// position may already hold `entry.hymn_number`; both are checked in the
    /// same transaction as the write, so concurrent swaps cannot commit a
    /// duplicate hymn.
    pub fn replace_entry(
        &self,
        selection_id: Uuid,
        expected_current: u32,
        entry: &Entry,
    ) -> Result<EntryUpdate> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;
        let id = selection_id.to_string();

        let found: Option<u32> = tx
            .query_row(
                "SELECT hymn_number FROM selection_entries WHERE selection_id = ? AND position = ?",
                (&id, entry.position as i64),
                |row| row.get(0),
            )
            .optional()?;
        match found {
            None => return Ok(EntryUpdate::Missing),
            Some(found) if found != expected_current => {
                return Ok(EntryUpdate::Stale { found });
            }
            Some(_) => {}
        }

        let duplicate: Option<i64> = tx
            .query_row(
                "SELECT position FROM selection_entries
                 WHERE selection_id = ? AND hymn_number = ? AND position != ?",
                (&id, entry.hymn_number, entry.position as i64),
                |row| row.get(0),
            )
            .optional()?;
        if let Some(position) = duplicate {
            return Ok(EntryUpdate::Duplicate {
                position: position as usize,
            });
        }

        tx.execute(
            "UPDATE selection_entries SET hymn_number = ?, title = ?, category = ?
             WHERE selection_id = ? AND position = ?",
            (
                entry.hymn_number,
                &entry.title,
                &entry.category,
                &id,
                entry.position as i64,
            ),
        )?;
        tx.execute(
            "UPDATE selections SET updated_at = ? WHERE id = ?",
            (Utc::now().to_rfc3339(), &id),
        )?;
        tx.commit()?;

        Ok(EntryUpdate::Replaced)
    }

    pub fn delete_selection(&self, group_id: &str, service_date: NaiveDate) -> Result<bool> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let id: Option<String> = tx
            .query_row(
                "SELECT id FROM selections WHERE group_id = ? AND service_date = ?",
                (group_id, format_date(service_date)),
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else {
            return Ok(false);
        };

        tx.execute("DELETE FROM selection_entries WHERE selection_id = ?", [&id])?;
        tx.execute("DELETE FROM selections WHERE id = ?", [&id])?;
        tx.commit()?;

        Ok(true)
    }
}

impl HistoryStore for Database {
    fn recent(&self, group_id: &str, limit: usize) -> Result<Vec<Selection>> {
        self.get_group_history(group_id, limit)
    }

    fn upsert(&self, selection: &Selection) -> Result<Selection> {
        self.upsert_selection(selection)
    }

    fn delete(&self, group_id: &str, service_date: NaiveDate) -> Result<bool> {
        self.delete_selection(group_id, service_date)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// Map a row selected with [`SELECTION_COLUMNS`]; entries are loaded separately.
fn selection_from_row(row: &Row<'_>) -> rusqlite::Result<Selection> {
    let created_at = parse_datetime(row.get::<_, String>(7)?);
    Ok(Selection {
        id: parse_uuid(row.get::<_, String>(0)?),
        group_id: Some(row.get(1)?),
        service_date: parse_date(row.get::<_, String>(2)?),
        is_first_sunday: row.get(3)?,
        is_festive: row.get(4)?,
        occasion: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| s.parse().ok()),
        include_special_occasions: row.get(6)?,
        entries: Vec::new(),
        created_at,
        updated_at: row
            .get::<_, Option<String>>(8)?
            .map(parse_datetime)
            .unwrap_or(created_at),
    })
}

fn load_entries(conn: &Connection, selection_id: Uuid) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(
        "SELECT position, hymn_number, title, category
         FROM selection_entries WHERE selection_id = ? ORDER BY position",
    )?;

    let entries = stmt
        .query_map([selection_id.to_string()], |row| {
            Ok(Entry {
                position: row.get::<_, i64>(0)? as usize,
                hymn_number: row.get(1)?,
                title: row.get(2)?,
                category: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: String) -> NaiveDate {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").unwrap_or_default()
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
