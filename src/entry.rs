//! Catalog entry model and the validated inputs for creating and updating one.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::EntryId;

/// Earliest accepted release year.
pub const MIN_YEAR: i32 = 1888;
/// Latest accepted release year.
pub const MAX_YEAR: i32 = 2100;

/// A movie in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "_id")]
    pub id: EntryId,
    pub title: String,
    pub director: String,
    pub year: i32,
    pub genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CatalogEntry {
    /// Merge `patch` over this entry. `id` and fields the patch leaves unset
    /// are kept.
    pub fn apply(&mut self, patch: &EntryPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(director) = &patch.director {
            self.director.clone_from(director);
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(genre) = &patch.genre {
            self.genre.clone_from(genre);
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
    }
}

/// Input for creating an entry. Holding one proves the fields are valid.
///
/// ```rust
/// use movieapp_client::NewEntry;
///
/// let entry = NewEntry::new("Alien", "Ridley Scott", 1979, "Sci-Fi")?
///     .with_description("In space no one can hear you scream.");
/// assert_eq!(entry.title(), "Alien");
/// # Ok::<(), movieapp_client::ValidationError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEntry {
    title: String,
    director: String,
    year: i32,
    genre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl NewEntry {
    /// # Errors
    ///
    /// Returns [`ValidationError::Blank`] for an empty text field and
    /// [`ValidationError::YearOutOfRange`] for an implausible year.
    pub fn new(
        title: impl Into<String>,
        director: impl Into<String>,
        year: i32,
        genre: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            title: non_blank("title", title.into())?,
            director: non_blank("director", director.into())?,
            year: checked_year(year)?,
            genre: non_blank("genre", genre.into())?,
            description: None,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        let trimmed = description.trim();
        self.description = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn director(&self) -> &str {
        &self.director
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn genre(&self) -> &str {
        &self.genre
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The entry the service would store for this input under `id`.
    #[must_use]
    pub fn into_entry(self, id: EntryId) -> CatalogEntry {
        CatalogEntry {
            id,
            title: self.title,
            director: self.director,
            year: self.year,
            genre: self.genre,
            description: self.description,
        }
    }
}

/// Partial update. Unset fields are left untouched both remotely and in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    director: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl EntryPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::Blank`] if `title` is blank.
    pub fn title(mut self, title: impl Into<String>) -> Result<Self, ValidationError> {
        self.title = Some(non_blank("title", title.into())?);
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::Blank`] if `director` is blank.
    pub fn director(mut self, director: impl Into<String>) -> Result<Self, ValidationError> {
        self.director = Some(non_blank("director", director.into())?);
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::YearOutOfRange`] for an implausible year.
    pub fn year(mut self, year: i32) -> Result<Self, ValidationError> {
        self.year = Some(checked_year(year)?);
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::Blank`] if `genre` is blank.
    pub fn genre(mut self, genre: impl Into<String>) -> Result<Self, ValidationError> {
        self.genre = Some(non_blank("genre", genre.into())?);
        Ok(self)
    }

    /// Set the description. Blank input leaves the field unset, as
    /// [`NewEntry::with_description`] does.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        let trimmed = description.trim();
        self.description = (!trimmed.is_empty()).then(|| trimmed.to_owned());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.director.is_none()
            && self.year.is_none()
            && self.genre.is_none()
            && self.description.is_none()
    }

    /// Reject a patch that would change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPatch`] when no field is set.
    pub fn validated(self) -> Result<Self, ValidationError> {
        if self.is_empty() {
            Err(ValidationError::EmptyPatch)
        } else {
            Ok(self)
        }
    }
}

fn non_blank(field: &'static str, value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Blank(field))
    } else if trimmed.len() == value.len() {
        Ok(value)
    } else {
        Ok(trimmed.to_owned())
    }
}

fn checked_year(year: i32) -> Result<i32, ValidationError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(ValidationError::YearOutOfRange(year))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alien() -> CatalogEntry {
        NewEntry::new("Alien", "Ridley Scott", 1979, "Sci-Fi")
            .unwrap()
            .into_entry(EntryId::from("m1"))
    }

    #[test]
    fn entry_decodes_wire_shape() {
        let entry: CatalogEntry = serde_json::from_value(json!({
            "_id": "m1",
            "title": "X",
            "director": "D",
            "year": 2001,
            "genre": "Drama",
            "comments": [],
            "__v": 0
        }))
        .unwrap();

        assert_eq!(entry.id, EntryId::from("m1"));
        assert_eq!(entry.year, 2001);
        assert_eq!(entry.description, None);
    }

    #[test]
    fn new_entry_rejects_blank_fields() {
        assert_eq!(
            NewEntry::new("  ", "D", 2000, "G"),
            Err(ValidationError::Blank("title"))
        );
        assert_eq!(
            NewEntry::new("T", "", 2000, "G"),
            Err(ValidationError::Blank("director"))
        );
        assert_eq!(
            NewEntry::new("T", "D", 2000, "\t"),
            Err(ValidationError::Blank("genre"))
        );
    }

    #[test]
    fn new_entry_rejects_implausible_year() {
        assert_eq!(
            NewEntry::new("T", "D", 1700, "G"),
            Err(ValidationError::YearOutOfRange(1700))
        );
        assert!(NewEntry::new("T", "D", MIN_YEAR, "G").is_ok());
        assert!(NewEntry::new("T", "D", MAX_YEAR, "G").is_ok());
    }

    #[test]
    fn new_entry_trims_and_serializes_without_empty_description() {
        let entry = NewEntry::new(" Heat ", "Michael Mann", 1995, "Crime")
            .unwrap()
            .with_description("   ");
        assert_eq!(entry.title(), "Heat");
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"title": "Heat", "director": "Michael Mann", "year": 1995, "genre": "Crime"})
        );
    }

    #[test]
    fn patch_merges_over_entry_preserving_id_and_unset_fields() {
        let mut entry = alien();
        let patch = EntryPatch::new().title("Aliens").unwrap().year(1986).unwrap();

        entry.apply(&patch);

        assert_eq!(entry.id, EntryId::from("m1"));
        assert_eq!(entry.title, "Aliens");
        assert_eq!(entry.year, 1986);
        assert_eq!(entry.director, "Ridley Scott");
        assert_eq!(entry.genre, "Sci-Fi");
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = EntryPatch::new().genre("Horror").unwrap();
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"genre": "Horror"}));
    }

    #[test]
    fn empty_patch_is_rejected() {
        assert_eq!(EntryPatch::new().validated(), Err(ValidationError::EmptyPatch));
        assert!(EntryPatch::new().description("x").validated().is_ok());
    }

    #[test]
    fn blank_patch_description_is_ignored() {
        let mut entry = alien();
        entry.description = Some("In space".into());

        let patch = EntryPatch::new().description(" \t ");
        assert!(patch.is_empty());
        assert_eq!(patch.clone().validated(), Err(ValidationError::EmptyPatch));

        let patch = patch.title("Alien 3").unwrap();
        entry.apply(&patch);
        assert_eq!(entry.description.as_deref(), Some("In space"));
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"title": "Alien 3"}));
    }
}
