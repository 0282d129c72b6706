//! A single row of a mapping list.

use serde::{Deserialize, Serialize};

/// One entry in a mapping list, tying a metadata value to wiki entities.
///
/// `frequency` counts how often the value occurs in the current batch;
/// zero-frequency entries with mapped data are kept as "preserved" so that
/// mapping work is never thrown away between batches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingEntry {
    pub name: String,
    pub more: String,
    pub frequency: u32,
    pub technique: Vec<String>,
    pub creator: String,
    pub wikidata: String,
    pub link: String,
    pub category: Vec<String>,
    pub other: String,
}

impl MappingEntry {
    /// A fresh, unmapped entry for a newly encountered value.
    pub fn new(name: impl Into<String>, frequency: u32) -> Self {
        Self {
            name: name.into(),
            frequency,
            ..Self::default()
        }
    }

    /// Whether any field beyond name and frequency carries data.
    pub fn is_mapped(&self) -> bool {
        !self.more.is_empty()
            || !self.technique.is_empty()
            || !self.creator.is_empty()
            || !self.wikidata.is_empty()
            || !self.link.is_empty()
            || !self.category.is_empty()
            || !self.other.is_empty()
    }

    /// Fill empty fields from a previous mapping, without overwriting.
    pub fn fill_from(&mut self, previous: &MappingEntry) {
        if self.more.is_empty() {
            self.more = previous.more.clone();
        }
        if self.technique.is_empty() {
            self.technique = previous.technique.clone();
        }
        if self.creator.is_empty() {
            self.creator = previous.creator.clone();
        }
        if self.wikidata.is_empty() {
            self.wikidata = previous.wikidata.clone();
        }
        if self.link.is_empty() {
            self.link = previous.link.clone();
        }
        if self.category.is_empty() {
            self.category = previous.category.clone();
        }
        if self.other.is_empty() {
            self.other = previous.other.clone();
        }
    }

    /// Look up a field by its list-template parameter name.
    ///
    /// List fields are joined with `delimiter`. Returns `None` for unknown
    /// parameter names.
    pub fn field(&self, key: &str, delimiter: &str) -> Option<String> {
        match key {
            "name" => Some(self.name.clone()),
            "more" => Some(self.more.clone()),
            "frequency" => Some(self.frequency.to_string()),
            "technique" => Some(self.technique.join(delimiter)),
            "creator" => Some(self.creator.clone()),
            "wikidata" => Some(self.wikidata.clone()),
            "link" => Some(self.link.clone()),
            "category" => Some(self.category.join(delimiter)),
            "other" => Some(self.other.clone()),
            _ => None,
        }
    }

    /// Set a field by its list-template parameter name.
    ///
    /// List fields are split on `delimiter` with entries trimmed. Returns
    /// false for unknown parameter names.
    pub fn set_field(&mut self, key: &str, value: &str, delimiter: &str) -> bool {
        let as_list = |v: &str| -> Vec<String> {
            v.split(delimiter)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        match key {
            "name" => self.name = value.to_string(),
            "more" => self.more = value.to_string(),
            "frequency" => self.frequency = value.parse().unwrap_or(0),
            "technique" => self.technique = as_list(value),
            "creator" => self.creator = value.to_string(),
            "wikidata" => self.wikidata = value.to_string(),
            "link" => self.link = value.to_string(),
            "category" => self.category = as_list(value),
            "other" => self.other = value.to_string(),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_is_unmapped() {
        let entry = MappingEntry::new("Kastellet", 5);
        assert_eq!(entry.name, "Kastellet");
        assert_eq!(entry.frequency, 5);
        assert!(!entry.is_mapped());
    }

    #[test]
    fn any_data_field_counts_as_mapped() {
        let mut entry = MappingEntry::new("x", 0);
        entry.category = vec!["Some category".to_string()];
        assert!(entry.is_mapped());

        let mut entry = MappingEntry::new("x", 0);
        entry.other = "note".to_string();
        assert!(entry.is_mapped());
    }

    #[test]
    fn fill_from_does_not_overwrite() {
        let mut entry = MappingEntry::new("x", 3);
        entry.creator = "Kept".to_string();
        let mut previous = MappingEntry::new("x", 0);
        previous.creator = "Dropped".to_string();
        previous.link = "Added".to_string();

        entry.fill_from(&previous);
        assert_eq!(entry.creator, "Kept");
        assert_eq!(entry.link, "Added");
    }

    #[test]
    fn field_roundtrip_with_lists() {
        let mut entry = MappingEntry::default();
        assert!(entry.set_field("category", "A / B", "/"));
        assert_eq!(entry.category, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(entry.field("category", "/"), Some("A/B".to_string()));
        assert!(!entry.set_field("unknown", "x", "/"));
        assert_eq!(entry.field("unknown", "/"), None);
    }

    #[test]
    fn serde_fills_missing_fields() {
        let entry: MappingEntry =
            serde_json::from_str(r#"{"name": "only name", "frequency": 2}"#)
                .expect("valid entry");
        assert_eq!(entry.name, "only name");
        assert_eq!(entry.frequency, 2);
        assert!(entry.technique.is_empty());
    }
}
