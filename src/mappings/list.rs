//! Template based wikitext list pages and their local JSON mirrors.

use super::{merge_mapping_tables, merge_mappings, Counter, MappingEntry};
use crate::common::{self, CommonError};
use crate::template::{extract_templates, render_block_template};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Errors from mapping-list handling.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("a header template is necessary for outputting as a wikipage")]
    MissingHeaderTemplate,
}

/// Tunable behaviour of a mapping list.
#[derive(Debug, Clone)]
pub struct MappingListOptions {
    /// The value marking a mapping as not applicable, as opposed to unmapped.
    pub na_value: String,
    /// Delimiter separating entries of list-valued fields.
    pub list_delimiter: String,
}

impl Default for MappingListOptions {
    fn default() -> Self {
        Self {
            na_value: "-".to_string(),
            list_delimiter: "/".to_string(),
        }
    }
}

/// A template based wikitext list mapping metadata values to wiki entries.
///
/// The list lives on a wiki page, is mirrored locally as
/// `commons-<page>.json` and rendered back as `commons-<page>.wiki`.
pub struct MappingList {
    /// Full page title, including prefixes.
    page_title: String,
    /// Final component of the page title, used in file names.
    page_name: String,
    /// (entry field, template parameter) pairs, in output order.
    parameters: Vec<(String, String)>,
    header_template: Option<String>,
    row_template: String,
    mapping_dir: PathBuf,
    wikitext_dir: PathBuf,
    options: MappingListOptions,
}

impl MappingList {
    pub fn new(
        page_title: impl Into<String>,
        parameters: &[&str],
        header_template: Option<String>,
        row_template: impl Into<String>,
        mapping_dir: impl Into<PathBuf>,
        wikitext_dir: impl Into<PathBuf>,
        options: MappingListOptions,
    ) -> Result<Self, MappingError> {
        let page_title = page_title.into();
        let page_name = page_title
            .rsplit('/')
            .next()
            .unwrap_or(&page_title)
            .to_string();
        let mapping_dir = mapping_dir.into();
        let wikitext_dir = wikitext_dir.into();
        common::create_dir(&mapping_dir)?;
        common::create_dir(&wikitext_dir)?;
        Ok(Self {
            page_title,
            page_name,
            parameters: parameters
                .iter()
                .map(|p| (p.to_string(), p.to_string()))
                .collect(),
            header_template,
            row_template: row_template.into(),
            mapping_dir,
            wikitext_dir,
            options,
        })
    }

    /// The on-wiki page title of this list.
    pub fn page_title(&self) -> &str {
        &self.page_title
    }

    /// Path of the local JSON mirror.
    pub fn mapping_file(&self) -> PathBuf {
        self.mapping_dir
            .join(format!("commons-{}.json", self.page_name))
    }

    /// Path of the rendered wikitext output.
    pub fn wikitext_file(&self) -> PathBuf {
        self.wikitext_dir
            .join(format!("commons-{}.wiki", self.page_name))
    }

    /// Parse fetched page contents and overwrite the local JSON mirror.
    pub fn store_scraped(&self, contents: &str) -> Result<PathBuf, MappingError> {
        let entries = self.parse_entries(contents);
        let path = self.mapping_file();
        common::write_json(&path, &entries)?;
        Ok(path)
    }

    /// Return the entries of every row-template instance in the contents.
    ///
    /// `<small>`-tags are stripped, list fields split on the list delimiter
    /// and identical duplicate rows dropped. Unrecognised parameters are
    /// logged and skipped.
    pub fn parse_entries(&self, contents: &str) -> Vec<MappingEntry> {
        let mut units: Vec<MappingEntry> = Vec::new();
        for raw in extract_templates(contents, &self.row_template) {
            let mut entry = MappingEntry::default();
            for (key, value) in &raw {
                let value = value.replace("<small>", "").replace("</small>", "");
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if !entry.set_field(key, value, &self.options.list_delimiter) {
                    warn!("Unrecognised parameter: {} = {}", key, value);
                }
            }
            if !units.contains(&entry) {
                units.push(entry);
            }
        }
        units
    }

    /// Load the local JSON mirror, empty when never scraped.
    pub fn load_old_mappings(&self) -> Result<Vec<MappingEntry>, MappingError> {
        let path = self.mapping_file();
        if path.exists() {
            Ok(common::read_json(&path)?)
        } else {
            Ok(Vec::new())
        }
    }

    /// Merge a batch's value counts with the locally mirrored mappings.
    pub fn mappings_merger(
        &self,
        need_mapping: &Counter,
    ) -> Result<(Vec<(u32, MappingEntry)>, Vec<MappingEntry>), MappingError> {
        let old = self.load_old_mappings()?;
        let need = need_mapping
            .most_common()
            .into_iter()
            .map(|(name, freq)| (name, None, freq))
            .collect();
        Ok(merge_mappings(need, old))
    }

    /// Merge several counters sharing this list, one table per counter.
    pub fn multi_table_mappings_merger(
        &self,
        need_mapping: &BTreeMap<String, Counter>,
    ) -> Result<
        (
            BTreeMap<String, Vec<(u32, MappingEntry)>>,
            Vec<MappingEntry>,
        ),
        MappingError,
    > {
        let old = self.load_old_mappings()?;
        Ok(merge_mapping_tables(need_mapping, &old))
    }

    /// Render merged mappings to the local `.wiki` file.
    pub fn save_as_wikitext(
        &self,
        new_data: &[(u32, MappingEntry)],
        preserved_data: &[MappingEntry],
        intro_text: &str,
    ) -> Result<PathBuf, MappingError> {
        let mut sections = BTreeMap::new();
        if !new_data.is_empty() {
            sections.insert(String::new(), new_data.to_vec());
        }
        let text = self.mappings_to_wikipage(&sections, preserved_data, intro_text)?;
        let path = self.wikitext_file();
        common::write_file(&path, &text)?;
        Ok(path)
    }

    /// Render merged multi-table mappings to the local `.wiki` file.
    pub fn save_tables_as_wikitext(
        &self,
        new_data: &BTreeMap<String, Vec<(u32, MappingEntry)>>,
        preserved_data: &[MappingEntry],
        intro_text: &str,
    ) -> Result<PathBuf, MappingError> {
        let text = self.mappings_to_wikipage(new_data, preserved_data, intro_text)?;
        let path = self.wikitext_file();
        common::write_file(&path, &text)?;
        Ok(path)
    }

    /// Output mappings as a wikipage, one table per (non-empty) section.
    ///
    /// An empty section title renders the table without a heading.
    /// Still-unused previous mappings land in a final "Preserved mappings"
    /// section.
    pub fn mappings_to_wikipage(
        &self,
        new_data: &BTreeMap<String, Vec<(u32, MappingEntry)>>,
        preserved_data: &[MappingEntry],
        intro_text: &str,
    ) -> Result<String, MappingError> {
        let mut wiki = format!("{}\n", intro_text);

        for (title, data) in new_data {
            if data.is_empty() {
                continue;
            }
            if !title.is_empty() {
                wiki.push_str(&format!("\n==={}===\n", title));
            }
            wiki.push_str(&self.mapping_to_table(data)?);
        }

        if !preserved_data.is_empty() {
            let with_freqs: Vec<(u32, MappingEntry)> = preserved_data
                .iter()
                .map(|entry| (0, entry.clone()))
                .collect();
            wiki.push_str("\n===Preserved mappings===\n");
            wiki.push_str(&self.mapping_to_table(&with_freqs)?);
        }

        Ok(wiki.trim().to_string())
    }

    /// Output one mapping dataset as a wikitable, most frequent rows first.
    pub fn mapping_to_table(
        &self,
        data: &[(u32, MappingEntry)],
    ) -> Result<String, MappingError> {
        let header = self
            .header_template
            .as_deref()
            .ok_or(MappingError::MissingHeaderTemplate)?;

        let mut data = data.to_vec();
        // ties broken by name to limit re-arranging of preserved rows
        data.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.name.cmp(&a.1.name)));

        let mut body = String::new();
        for (_, entry) in &data {
            body.push_str(&self.make_list_row(entry));
            body.push('\n');
        }
        Ok(format!("{}\n{}|}}\n", header, body))
    }

    /// Render the row template for a single entry.
    pub fn make_list_row(&self, entry: &MappingEntry) -> String {
        let params: Vec<(String, String)> = self
            .parameters
            .iter()
            .map(|(field, template_key)| {
                let value = entry
                    .field(field, &self.options.list_delimiter)
                    .unwrap_or_default();
                (template_key.clone(), value)
            })
            .collect();
        render_block_template(&self.row_template, &params)
    }

    /// Clean a scraped list and key it by one of its fields.
    ///
    /// Entries whose key field is empty or already taken are skipped with a
    /// warning. With `require` given, at least one of those fields must be
    /// non-empty for the entry to be returned.
    pub fn consume_entries(
        &self,
        units: Vec<MappingEntry>,
        key_field: &str,
        require: Option<&[&str]>,
    ) -> BTreeMap<String, MappingEntry> {
        let delimiter = self.options.list_delimiter.clone();
        let mut presentable = BTreeMap::new();
        for entry in units {
            let entry = self.clean_entry(entry);
            if let Some(require) = require {
                let any_filled = require.iter().any(|field| {
                    entry
                        .field(field, &delimiter)
                        .map_or(false, |v| !v.is_empty())
                });
                if !any_filled {
                    continue;
                }
            }

            let key = entry.field(key_field, &delimiter).unwrap_or_default();
            if key.is_empty() {
                warn!("The field intended as dict key was empty!");
                continue;
            }
            if presentable.contains_key(&key) {
                warn!("The dict key was not unique! - {}", key);
                continue;
            }
            presentable.insert(key, entry);
        }
        presentable
    }

    /// Strip table formatting unrelated to real data from a scraped entry.
    ///
    /// `{{!}}` becomes a plain pipe and not-applicable markers are dropped.
    /// Entries are not safe to convert back to a wikitable after this.
    pub fn clean_entry(&self, mut entry: MappingEntry) -> MappingEntry {
        let na = &self.options.na_value;
        let clean_str = |value: &mut String| {
            *value = value.replace("{{!}}", "|");
            if value == na {
                value.clear();
            }
        };
        let clean_list = |value: &mut Vec<String>| {
            *value = value
                .iter()
                .map(|v| v.replace("{{!}}", "|"))
                .filter(|v| v != na)
                .collect();
        };

        clean_str(&mut entry.more);
        clean_str(&mut entry.creator);
        clean_str(&mut entry.wikidata);
        clean_str(&mut entry.link);
        clean_str(&mut entry.other);
        clean_list(&mut entry.technique);
        clean_list(&mut entry.category);
        entry
    }
}
