use std::thread::sleep;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use hymn_selector::db::{Database, EntryUpdate};
use hymn_selector::history::{history_window, HistoryStore};
use hymn_selector::models::*;
use speculate2::speculate;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn entry(position: usize, hymn_number: u32) -> Entry {
    Entry {
        position,
        hymn_number,
        title: format!("Inno {}", hymn_number),
        category: if position == 2 { "Sacramento" } else { "Inni" }.to_string(),
    }
}

fn selection(group: &str, service_date: NaiveDate, numbers: &[u32]) -> Selection {
    let now = Utc::now();
    Selection {
        id: Uuid::new_v4(),
        group_id: Some(group.to_string()),
        service_date,
        is_first_sunday: numbers.len() == 3,
        is_festive: false,
        occasion: None,
        include_special_occasions: false,
        entries: numbers
            .iter()
            .enumerate()
            .map(|(idx, n)| entry(idx + 1, *n))
            .collect(),
        created_at: now,
        updated_at: now,
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "upsert_selection" {
        it "stores a selection with its entries" {
            let saved = db
                .upsert_selection(&selection("Rione Nord", date(2024, 12, 8), &[1, 10, 2, 3]))
                .expect("Failed to save");

            let found = db.get_selection(saved.id).expect("Query failed").expect("Not found");
            assert_eq!(found.group_id.as_deref(), Some("Rione Nord"));
            assert_eq!(found.service_date, date(2024, 12, 8));
            assert_eq!(found.entries, saved.entries);
            assert_eq!(found.hymn_numbers().collect::<Vec<_>>(), vec![1, 10, 2, 3]);
        }

        it "round-trips the festive flags" {
            let festive = Selection {
                is_festive: true,
                occasion: Some(Occasion::Easter),
                include_special_occasions: true,
                ..selection("Rione Nord", date(2025, 4, 20), &[300, 10, 2, 3])
            };
            let saved = db.upsert_selection(&festive).expect("Failed to save");

            let found = db.get_selection(saved.id).unwrap().unwrap();
            assert!(found.is_festive);
            assert_eq!(found.occasion, Some(Occasion::Easter));
            assert!(found.include_special_occasions);
        }

        it "overwrites the record for the same group and date" {
            let first = db
                .upsert_selection(&selection("Rione Nord", date(2024, 12, 8), &[1, 10, 2, 3]))
                .expect("Failed to save");
            sleep(Duration::from_millis(5));
            let second = db
                .upsert_selection(&selection("Rione Nord", date(2024, 12, 8), &[4, 11, 5]))
                .expect("Failed to save");

            assert_eq!(second.id, first.id);
            assert_eq!(second.created_at, first.created_at);
            assert!(second.updated_at > first.updated_at);

            let history = db.get_group_history("Rione Nord", 10).unwrap();
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].hymn_numbers().collect::<Vec<_>>(), vec![4, 11, 5]);
            assert!(history[0].is_first_sunday);
        }

        it "keeps groups apart" {
            db.upsert_selection(&selection("Rione Nord", date(2024, 12, 8), &[1, 10, 2, 3])).unwrap();
            db.upsert_selection(&selection("Rione Sud", date(2024, 12, 8), &[4, 11, 5, 6])).unwrap();

            assert_eq!(db.get_group_history("Rione Nord", 10).unwrap().len(), 1);
            assert_eq!(db.get_group_history("Rione Sud", 10).unwrap().len(), 1);
        }

        it "refuses a selection without a group" {
            let orphan = Selection {
                group_id: None,
                ..selection("x", date(2024, 12, 8), &[1, 10, 2, 3])
            };
            assert!(db.upsert_selection(&orphan).is_err());
        }
    }

    describe "get_group_history" {
        it "returns the most recent services first, up to the limit" {
            for day in [1, 15, 8, 22] {
                db.upsert_selection(&selection("Rione Nord", date(2024, 12, day), &[day, 10, 30, 31]))
                    .unwrap();
            }

            let history = db.get_group_history("Rione Nord", 3).unwrap();
            let dates: Vec<NaiveDate> = history.iter().map(|s| s.service_date).collect();
            assert_eq!(dates, vec![date(2024, 12, 22), date(2024, 12, 15), date(2024, 12, 8)]);
        }

        it "is empty for an unknown group" {
            assert!(db.get_group_history("Nessuno", 10).unwrap().is_empty());
        }
    }

    describe "history_window" {
        it "skips the record for the requested date" {
            db.upsert_selection(&selection("Test", date(2024, 12, 1), &[1, 10, 2, 3])).unwrap();
            db.upsert_selection(&selection("Test", date(2024, 12, 8), &[4, 11, 5, 6])).unwrap();

            let window = history_window(&db, "Test", date(2024, 12, 8), 4).unwrap();
            assert_eq!(window.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 10]);
        }

        it "covers only the last lookback services" {
            for day in 1..=6 {
                db.upsert_selection(&selection("Test", date(2024, 11, day), &[day, 100 + day, 50, 51]))
                    .unwrap();
            }

            let window = history_window(&db, "Test", date(2024, 11, 30), 2).unwrap();
            assert!(window.contains(&6) && window.contains(&5));
            assert!(!window.contains(&4));
        }

        it "accepts an unbounded lookback" {
            db.upsert_selection(&selection("Test", date(2024, 12, 1), &[1, 10, 2, 3])).unwrap();
            let window = history_window(&db, "Test", date(2024, 12, 8), usize::MAX).unwrap();
            assert_eq!(window.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 10]);
        }

        it "is empty with a zero lookback" {
            db.upsert_selection(&selection("Test", date(2024, 12, 1), &[1, 10, 2, 3])).unwrap();
            assert!(history_window(&db, "Test", date(2024, 12, 8), 0).unwrap().is_empty());
        }
    }

    describe "replace_entry" {
        it "replaces one position and bumps updated_at" {
            let saved = db
                .upsert_selection(&selection("Test", date(2024, 12, 8), &[1, 10, 2, 3]))
                .unwrap();
            sleep(Duration::from_millis(5));

            let update = db.replace_entry(saved.id, 2, &entry(3, 7)).unwrap();
            assert_eq!(update, EntryUpdate::Replaced);

            let found = db.get_selection(saved.id).unwrap().unwrap();
            assert_eq!(found.hymn_numbers().collect::<Vec<_>>(), vec![1, 10, 7, 3]);
            assert_eq!(found.entries[2].title, "Inno 7");
            assert!(found.updated_at > saved.created_at);
        }

        it "reports a missing position or selection" {
            let saved = db
                .upsert_selection(&selection("Test", date(2024, 12, 1), &[1, 10, 2]))
                .unwrap();
            assert_eq!(db.replace_entry(saved.id, 3, &entry(4, 7)).unwrap(), EntryUpdate::Missing);
            assert_eq!(
                db.replace_entry(Uuid::new_v4(), 1, &entry(1, 7)).unwrap(),
                EntryUpdate::Missing
            );
        }

        it "refuses when the position no longer holds the expected hymn" {
            let saved = db
                .upsert_selection(&selection("Test", date(2024, 12, 8), &[1, 10, 2, 3]))
                .unwrap();

            assert_eq!(db.replace_entry(saved.id, 1, &entry(1, 4)).unwrap(), EntryUpdate::Replaced);
            // a second writer still believing position 1 holds hymn 1
            assert_eq!(
                db.replace_entry(saved.id, 1, &entry(1, 5)).unwrap(),
                EntryUpdate::Stale { found: 4 }
            );

            let found = db.get_selection(saved.id).unwrap().unwrap();
            assert_eq!(found.hymn_numbers().collect::<Vec<_>>(), vec![4, 10, 2, 3]);
        }

        it "refuses a hymn already held at another position" {
            let saved = db
                .upsert_selection(&selection("Test", date(2024, 12, 8), &[1, 10, 2, 3]))
                .unwrap();

            // two swaps drawn from the same snapshot both picked hymn 4
            assert_eq!(db.replace_entry(saved.id, 1, &entry(1, 4)).unwrap(), EntryUpdate::Replaced);
            assert_eq!(
                db.replace_entry(saved.id, 2, &entry(3, 4)).unwrap(),
                EntryUpdate::Duplicate { position: 1 }
            );

            let found = db.get_selection(saved.id).unwrap().unwrap();
            assert_eq!(found.hymn_numbers().collect::<Vec<_>>(), vec![4, 10, 2, 3]);
        }
    }

    describe "delete_selection" {
        it "removes the selection and its entries" {
            let saved = db
                .upsert_selection(&selection("Test", date(2024, 12, 8), &[1, 10, 2, 3]))
                .unwrap();

            assert!(db.delete("Test", date(2024, 12, 8)).unwrap());
            assert!(db.get_selection(saved.id).unwrap().is_none());
            assert!(db.get_selection_for_date("Test", date(2024, 12, 8)).unwrap().is_none());
        }

        it "returns false when nothing is stored" {
            assert!(!db.delete_selection("Test", date(2024, 12, 8)).unwrap());
        }
    }

    describe "list_groups" {
        it "lists each group once, by name" {
            db.upsert_selection(&selection("Rione Sud", date(2024, 12, 1), &[1, 10, 2])).unwrap();
            db.upsert_selection(&selection("Rione Nord", date(2024, 12, 1), &[1, 10, 2])).unwrap();
            db.upsert_selection(&selection("Rione Nord", date(2024, 12, 8), &[3, 10, 4, 5])).unwrap();

            assert_eq!(db.list_groups().unwrap(), vec!["Rione Nord", "Rione Sud"]);
        }
    }

    describe "get_selection_for_date" {
        it "finds the record of a group for a date" {
            let saved = db
                .upsert_selection(&selection("Test", date(2024, 12, 8), &[1, 10, 2, 3]))
                .unwrap();

            let found = db.get_selection_for_date("Test", date(2024, 12, 8)).unwrap().unwrap();
            assert_eq!(found.id, saved.id);
            assert!(db.get_selection_for_date("Other", date(2024, 12, 8)).unwrap().is_none());
        }
    }
}
