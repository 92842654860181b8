use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Category every second-slot hymn must belong to.
pub const SACRAMENT_CATEGORY: &str = "Sacramento";

/// Category reserved for festive services or an explicit opt-in.
pub const SPECIAL_OCCASIONS_CATEGORY: &str = "Occasioni speciali";

/// An immutable entry of the hymn catalog.
///
/// The catalog is loaded once at startup and never mutated. Selections keep
/// only the hymn `number` plus a denormalized copy of `title` and `category`,
/// so a later catalog update never rewrites history.
///
/// Deserialization accepts both the canonical field names and the ones used
/// by the scraped hymnbook export (`songNumber`, `bookSectionTitle`), and
/// `tags` as either a list or a comma-separated string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hymn {
    #[serde(alias = "songNumber")]
    pub number: u32,
    pub title: String,
    #[serde(alias = "bookSectionTitle")]
    pub category: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub composers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl Hymn {
    /// Case-insensitive category comparison.
    pub fn is_category(&self, category: &str) -> bool {
        self.category.trim().eq_ignore_ascii_case(category.trim())
    }

    /// Case-insensitive tag lookup.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.tags.iter().any(|t| t.trim().eq_ignore_ascii_case(tag))
    }

    pub fn is_sacrament(&self) -> bool {
        self.is_category(SACRAMENT_CATEGORY)
    }

    pub fn is_special_occasion(&self) -> bool {
        self.is_category(SPECIAL_OCCASIONS_CATEGORY)
    }

    /// A hymn carries an occasion when it is tagged with the occasion label
    /// or filed under a category of the same name. The category match is
    /// deliberate: catalog sections such as "Natale" hold hymns that are not
    /// always tagged.
    pub fn carries(&self, occasion: Occasion) -> bool {
        self.has_tag(occasion.tag()) || self.is_category(occasion.tag())
    }

    /// Whether the hymn carries any occasion at all.
    pub fn is_themed(&self) -> bool {
        Occasion::ALL.iter().any(|o| self.carries(*o))
    }
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTags {
        List(Vec<String>),
        Joined(String),
    }

    let raw = Option::<RawTags>::deserialize(deserializer)?;
    let tags = match raw {
        Some(RawTags::List(list)) => list,
        Some(RawTags::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };

    Ok(tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// A festive occasion a service can be themed around.
///
/// Serialized as `christmas` / `easter`; the Italian tag labels `natale` /
/// `pasqua` are accepted as aliases everywhere an occasion is parsed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Occasion {
    #[serde(alias = "natale")]
    Christmas,
    #[serde(alias = "pasqua")]
    Easter,
}

impl Occasion {
    pub const ALL: [Occasion; 2] = [Occasion::Christmas, Occasion::Easter];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Christmas => "christmas",
            Self::Easter => "easter",
        }
    }

    /// The catalog tag marking hymns appropriate for this occasion.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Christmas => "natale",
            Self::Easter => "pasqua",
        }
    }
}

impl FromStr for Occasion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "christmas" | "natale" => Ok(Self::Christmas),
            "easter" | "pasqua" => Ok(Self::Easter),
            other => Err(format!(
                "unknown occasion '{}' (expected christmas/natale or easter/pasqua)",
                other
            )),
        }
    }
}

impl fmt::Display for Occasion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter for single-hymn lookups. All criteria are combined with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HymnFilter {
    pub number: Option<u32>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl HymnFilter {
    pub fn matches(&self, hymn: &Hymn) -> bool {
        self.number.map_or(true, |n| hymn.number == n)
            && self.category.as_deref().map_or(true, |c| hymn.is_category(c))
            && self.tag.as_deref().map_or(true, |t| hymn.has_tag(t))
    }
}

/// Summary counts over the loaded catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogStats {
    pub total_hymns: usize,
    pub categories: usize,
    pub tags: usize,
    pub sacrament_hymns: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_scraped_field_names() {
        let hymn: Hymn = serde_json::from_str(
            r#"{"songNumber": 7, "title": "Gioia al mondo", "bookSectionTitle": "Natale", "tags": "natale, lode"}"#,
        )
        .unwrap();

        assert_eq!(hymn.number, 7);
        assert_eq!(hymn.category, "Natale");
        assert_eq!(hymn.tags, vec!["natale", "lode"]);
        assert!(hymn.composers.is_empty());
        assert!(hymn.audio_url.is_none());
    }

    #[test]
    fn test_carries_occasion_by_tag_or_category() {
        let tagged = Hymn {
            number: 1,
            title: "A".into(),
            category: "Inni".into(),
            tags: vec!["Pasqua".into()],
            composers: vec![],
            authors: vec![],
            audio_url: None,
        };
        let filed = Hymn {
            number: 2,
            title: "B".into(),
            category: "natale".into(),
            tags: vec![],
            composers: vec![],
            authors: vec![],
            audio_url: None,
        };

        assert!(tagged.carries(Occasion::Easter));
        assert!(!tagged.carries(Occasion::Christmas));
        assert!(filed.carries(Occasion::Christmas));
        assert!(filed.is_themed());
    }

    #[test]
    fn test_occasion_parses_both_spellings() {
        assert_eq!("natale".parse::<Occasion>().unwrap(), Occasion::Christmas);
        assert_eq!("Easter".parse::<Occasion>().unwrap(), Occasion::Easter);
        assert!("pentecoste".parse::<Occasion>().is_err());

        let parsed: Occasion = serde_json::from_str("\"pasqua\"").unwrap();
        assert_eq!(parsed, Occasion::Easter);
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"easter\"");
    }
}
