//! Read-only index of every hymn, loaded once per process.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{CatalogStats, Hymn, HymnFilter};

/// The hymn catalog, sorted by hymn number.
#[derive(Debug, Clone)]
pub struct Catalog {
    hymns: Vec<Hymn>,
}

impl Catalog {
    /// Build a catalog from an in-memory list.
    ///
    /// Fails when the list is empty, or when a number is zero or repeated.
    pub fn new(mut hymns: Vec<Hymn>) -> Result<Self> {
        if hymns.is_empty() {
            bail!("Catalog contains no hymns");
        }

        let mut seen = HashSet::with_capacity(hymns.len());
        for hymn in &hymns {
            if hymn.number == 0 {
                bail!("Hymn '{}' has an invalid number 0", hymn.title);
            }
            if !seen.insert(hymn.number) {
                bail!("Duplicate hymn number {}", hymn.number);
            }
        }

        hymns.sort_by_key(|h| h.number);
        Ok(Self { hymns })
    }

    /// Load a catalog from a JSON array on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read hymn data file {}", path.display()))?;
        let hymns: Vec<Hymn> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid hymn data in {}", path.display()))?;

        let catalog = Self::new(hymns)
            .with_context(|| format!("Failed to load hymn data from {}", path.display()))?;
        tracing::info!("Loaded {} hymns from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn all_hymns(&self) -> &[Hymn] {
        &self.hymns
    }

    pub fn len(&self) -> usize {
        self.hymns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hymns.is_empty()
    }

    pub fn get(&self, number: u32) -> Option<&Hymn> {
        self.hymns
            .binary_search_by_key(&number, |h| h.number)
            .ok()
            .map(|idx| &self.hymns[idx])
    }

    /// All hymns matching every criterion of the filter, by number.
    pub fn find(&self, filter: &HymnFilter) -> Vec<&Hymn> {
        self.hymns.iter().filter(|h| filter.matches(h)).collect()
    }

    /// One random hymn matching the filter, if any.
    pub fn pick<R: Rng + ?Sized>(&self, filter: &HymnFilter, rng: &mut R) -> Option<&Hymn> {
        self.find(filter).choose(rng).copied()
    }

    /// Distinct categories, sorted case-insensitively. Spelling variants
    /// that differ only in case collapse to the first spelling seen.
    pub fn categories(&self) -> Vec<String> {
        distinct(self.hymns.iter().map(|h| h.category.trim()))
    }

    /// Distinct tags, sorted. Case variants collapse as in [`Self::categories`].
    pub fn tags(&self) -> Vec<String> {
        distinct(
            self.hymns
                .iter()
                .flat_map(|h| h.tags.iter().map(|t| t.trim())),
        )
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            total_hymns: self.hymns.len(),
            categories: self.categories().len(),
            tags: self.tags().len(),
            sacrament_hymns: self.hymns.iter().filter(|h| h.is_sacrament()).count(),
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut by_key: BTreeMap<String, String> = BTreeMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        by_key
            .entry(value.to_lowercase())
            .or_insert_with(|| value.to_string());
    }
    by_key.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn hymn(number: u32, category: &str, tags: &[&str]) -> Hymn {
        Hymn {
            number,
            title: format!("Inno {}", number),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            composers: vec![],
            authors: vec![],
            audio_url: None,
        }
    }

    #[test]
    fn test_rejects_duplicate_numbers() {
        let err = Catalog::new(vec![hymn(1, "Inni", &[]), hymn(1, "Inni", &[])]).unwrap_err();
        assert!(err.to_string().contains("Duplicate hymn number 1"));
    }

    #[test]
    fn test_rejects_empty_catalog() {
        assert!(Catalog::new(vec![]).is_err());
    }

    #[test]
    fn test_get_finds_by_number_regardless_of_input_order() {
        let catalog =
            Catalog::new(vec![hymn(30, "Inni", &[]), hymn(2, "Sacramento", &[]), hymn(11, "Inni", &[])])
                .unwrap();

        assert_eq!(catalog.get(11).map(|h| h.number), Some(11));
        assert!(catalog.get(12).is_none());
        let numbers: Vec<u32> = catalog.all_hymns().iter().map(|h| h.number).collect();
        assert_eq!(numbers, vec![2, 11, 30]);
    }

    #[test]
    fn test_find_combines_criteria() {
        let catalog = Catalog::new(vec![
            hymn(1, "Natale", &["natale"]),
            hymn(2, "Inni", &["natale", "lode"]),
            hymn(3, "Inni", &["lode"]),
        ])
        .unwrap();

        let filter = HymnFilter {
            number: None,
            category: Some("inni".into()),
            tag: Some("NATALE".into()),
        };
        let found: Vec<u32> = catalog.find(&filter).iter().map(|h| h.number).collect();
        assert_eq!(found, vec![2]);

        let mut rng = StdRng::seed_from_u64(1);
        let none = HymnFilter {
            number: Some(99),
            ..HymnFilter::default()
        };
        assert!(catalog.pick(&none, &mut rng).is_none());
    }

    #[test]
    fn test_categories_tags_and_stats() {
        let catalog = Catalog::new(vec![
            hymn(1, "Sacramento", &[]),
            hymn(2, "sacramento", &["pasqua"]),
            hymn(3, "Restaurazione", &["Pasqua", "lode"]),
        ])
        .unwrap();

        assert_eq!(catalog.categories(), vec!["Restaurazione", "Sacramento"]);
        assert_eq!(catalog.tags(), vec!["lode", "pasqua"]);
        assert_eq!(
            catalog.stats(),
            CatalogStats {
                total_hymns: 3,
                categories: 2,
                tags: 2,
                sacrament_hymns: 2,
            }
        );
    }

    #[test]
    fn test_load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"songNumber": 3, "title": "Lode", "bookSectionTitle": "Restaurazione", "tags": []}},
                {{"number": 5, "title": "Pane", "category": "Sacramento"}}]"#
        )
        .unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get(5).unwrap().is_sacrament());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = Catalog::load("/nonexistent/hymns.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read hymn data file"));
    }
}
