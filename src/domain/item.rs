use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A stored learning item (one flashcard).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
  pub id: i64,
  pub language: String,
  pub front: String,
  pub back: String,
  /// Comma-delimited, as entered.
  pub tags: String,
  pub example: String,
  pub notes: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Item {
  pub fn tag_list(&self) -> Vec<String> {
    split_tags(&self.tags)
  }

  /// True if one of the item's tags equals `tag`, ignoring whitespace.
  pub fn has_tag(&self, tag: &str) -> bool {
    let wanted = strip_whitespace(tag);
    !wanted.is_empty()
      && self
        .tags
        .split(',')
        .any(|t| strip_whitespace(t) == wanted)
  }
}

/// Editable content of an item, used for both create and update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFields {
  pub language: String,
  pub front: String,
  pub back: String,
  pub tags: String,
  pub example: String,
  pub notes: String,
}

impl ItemFields {
  pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
    Self {
      front: front.into(),
      back: back.into(),
      ..Default::default()
    }
  }

  pub fn with_language(mut self, language: impl Into<String>) -> Self {
    self.language = language.into();
    self
  }

  pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
    self.tags = tags.into();
    self
  }

  pub fn with_example(mut self, example: impl Into<String>) -> Self {
    self.example = example.into();
    self
  }

  pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
    self.notes = notes.into();
    self
  }

  /// Trim every field and check that front and back are present.
  ///
  /// An empty language falls back to `default_language`.
  pub fn normalized(&self, default_language: &str) -> Result<ItemFields> {
    let front = self.front.trim();
    let back = self.back.trim();
    if front.is_empty() {
      return Err(Error::validation("front must not be empty"));
    }
    if back.is_empty() {
      return Err(Error::validation("back must not be empty"));
    }

    let language = match self.language.trim() {
      "" => default_language.trim(),
      lang => lang,
    };

    Ok(ItemFields {
      language: language.to_string(),
      front: front.to_string(),
      back: back.to_string(),
      tags: self.tags.trim().to_string(),
      example: self.example.trim().to_string(),
      notes: self.notes.trim().to_string(),
    })
  }
}

/// Split a comma-delimited tag string into trimmed, non-empty tags.
pub fn split_tags(tags: &str) -> Vec<String> {
  tags
    .split(',')
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(String::from)
    .collect()
}

pub(crate) fn strip_whitespace(s: &str) -> String {
  s.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item_with_tags(tags: &str) -> Item {
    let now = Utc::now();
    Item {
      id: 1,
      language: "fr".into(),
      front: "chat".into(),
      back: "cat".into(),
      tags: tags.into(),
      example: String::new(),
      notes: String::new(),
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn test_normalized_trims_all_fields() {
    let fields = ItemFields::new("  chat ", "\tcat\n")
      .with_language(" en ")
      .with_tags(" animals, pets ")
      .with_example("  Le chat dort. ")
      .with_notes(" masculine ");

    let norm = fields.normalized("fr").unwrap();
    assert_eq!(norm.language, "en");
    assert_eq!(norm.front, "chat");
    assert_eq!(norm.back, "cat");
    assert_eq!(norm.tags, "animals, pets");
    assert_eq!(norm.example, "Le chat dort.");
    assert_eq!(norm.notes, "masculine");
  }

  #[test]
  fn test_normalized_defaults_language() {
    let norm = ItemFields::new("chat", "cat").normalized("fr").unwrap();
    assert_eq!(norm.language, "fr");

    let norm = ItemFields::new("chat", "cat")
      .with_language("   ")
      .normalized("fr")
      .unwrap();
    assert_eq!(norm.language, "fr");
  }

  #[test]
  fn test_normalized_rejects_blank_front() {
    let err = ItemFields::new("   ", "cat").normalized("fr").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn test_normalized_rejects_blank_back() {
    let err = ItemFields::new("chat", "").normalized("fr").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn test_split_tags() {
    assert_eq!(split_tags(" verbs ,  A1,, Food "), vec!["verbs", "A1", "Food"]);
    assert!(split_tags("").is_empty());
    assert!(split_tags(" , ,").is_empty());
  }

  #[test]
  fn test_split_tags_keeps_duplicates_and_case() {
    assert_eq!(split_tags("food,Food,food"), vec!["food", "Food", "food"]);
  }

  #[test]
  fn test_has_tag_ignores_whitespace() {
    let item = item_with_tags("daily life, A1");
    assert!(item.has_tag("dailylife"));
    assert!(item.has_tag(" daily  life "));
    assert!(item.has_tag("A1"));
    assert!(!item.has_tag("a1"));
    assert!(!item.has_tag("daily"));
    assert!(!item.has_tag(""));
  }

  #[test]
  fn test_tag_list() {
    let item = item_with_tags("verbs, irregular");
    assert_eq!(item.tag_list(), vec!["verbs", "irregular"]);
  }
}
