//! Saint records and their category tags

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SaintfestError};

const MAX_NAME_LEN: usize = 200;

/// Boolean tags carried by every saint. Brackets draw their regions from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaintCategory {
    Martyr,
    Bishop,
    Mystic,
    Virgin,
    Pope,
    DoctorOfTheChurch,
    Religious,
    Founder,
    Missionary,
    Apostle,
    Layperson,
    Royalty,
    Hermit,
}

impl SaintCategory {
    pub const ALL: [SaintCategory; 13] = [
        SaintCategory::Martyr,
        SaintCategory::Bishop,
        SaintCategory::Mystic,
        SaintCategory::Virgin,
        SaintCategory::Pope,
        SaintCategory::DoctorOfTheChurch,
        SaintCategory::Religious,
        SaintCategory::Founder,
        SaintCategory::Missionary,
        SaintCategory::Apostle,
        SaintCategory::Layperson,
        SaintCategory::Royalty,
        SaintCategory::Hermit,
    ];

    /// Column name used in import files and query strings.
    pub fn column(self) -> &'static str {
        match self {
            SaintCategory::Martyr => "martyr",
            SaintCategory::Bishop => "bishop",
            SaintCategory::Mystic => "mystic",
            SaintCategory::Virgin => "virgin",
            SaintCategory::Pope => "pope",
            SaintCategory::DoctorOfTheChurch => "doctor_of_the_church",
            SaintCategory::Religious => "religious",
            SaintCategory::Founder => "founder",
            SaintCategory::Missionary => "missionary",
            SaintCategory::Apostle => "apostle",
            SaintCategory::Layperson => "layperson",
            SaintCategory::Royalty => "royalty",
            SaintCategory::Hermit => "hermit",
        }
    }

    /// Plural title, used for bracket regions.
    pub fn label(self) -> &'static str {
        match self {
            SaintCategory::Martyr => "Martyrs",
            SaintCategory::Bishop => "Bishops",
            SaintCategory::Mystic => "Mystics",
            SaintCategory::Virgin => "Virgins",
            SaintCategory::Pope => "Popes",
            SaintCategory::DoctorOfTheChurch => "Doctors of the Church",
            SaintCategory::Religious => "Religious",
            SaintCategory::Founder => "Founders",
            SaintCategory::Missionary => "Missionaries",
            SaintCategory::Apostle => "Apostles",
            SaintCategory::Layperson => "Laypeople",
            SaintCategory::Royalty => "Royalty",
            SaintCategory::Hermit => "Hermits",
        }
    }

    /// Lenient lookup for spreadsheet headers: accepts `Martyr`, `is_martyr`,
    /// `Martyrs`, `Doctor of the Church` and the like.
    pub fn from_header(header: &str) -> Option<Self> {
        let normalized = normalize_key(header);
        let key = normalized.strip_prefix("is_").unwrap_or(&normalized);

        Self::ALL.into_iter().find(|c| {
            let column = c.column();
            key == column
                || normalize_key(c.label()) == key
                || key.strip_suffix('s') == Some(column)
        })
    }
}

impl fmt::Display for SaintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl std::str::FromStr for SaintCategory {
    type Err = SaintfestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_header(s).ok_or_else(|| SaintfestError::Invalid(format!("unknown category '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Saint {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub feast_day: Option<String>,
    pub patronage: Option<String>,
    pub biography: Option<String>,
    pub image_url: Option<String>,
    pub born: Option<String>,
    pub died: Option<String>,
    pub canonized: Option<String>,
    pub categories: BTreeSet<SaintCategory>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Saint {
    pub fn has_category(&self, category: SaintCategory) -> bool {
        self.categories.contains(&category)
    }
}

/// Writable fields of a saint (create, update, import).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSaint {
    pub name: String,
    #[serde(default)]
    pub feast_day: Option<String>,
    #[serde(default)]
    pub patronage: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub born: Option<String>,
    #[serde(default)]
    pub died: Option<String>,
    #[serde(default)]
    pub canonized: Option<String>,
    #[serde(default)]
    pub categories: BTreeSet<SaintCategory>,
}

impl NewSaint {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, categories: &[SaintCategory]) -> Self {
        self.categories.extend(categories.iter().copied());
        self
    }

    /// Trim text fields, turn blank optionals into `None`, and check the name.
    pub fn validated(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(SaintfestError::Invalid("saint name must not be empty".to_string()));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(SaintfestError::Invalid(format!(
                "saint name longer than {} characters",
                MAX_NAME_LEN
            )));
        }
        if slugify(&self.name).is_empty() {
            return Err(SaintfestError::Invalid(format!(
                "saint name '{}' has no letters or digits",
                self.name
            )));
        }

        for field in [
            &mut self.feast_day,
            &mut self.patronage,
            &mut self.biography,
            &mut self.image_url,
            &mut self.born,
            &mut self.died,
            &mut self.canonized,
        ] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        Ok(self)
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Lowercase ASCII alphanumerics joined by single dashes.
///
/// "St. Thérèse of Lisieux" → "st-th-r-se-of-lisieux"
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Trim, lowercase, spaces and dashes to underscores.
pub(crate) fn normalize_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}
