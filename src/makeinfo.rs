//! Generation of per-file description pages, filenames and categories.
//!
//! A batch is processed into a JSON file keyed by the original filename,
//! each record carrying the filled-in info template, the new filename and
//! the content/maintenance categories. That file then drives `prep` and
//! `upload`.

use crate::common::{self, CommonError};
use crate::config::{BatchConfig, MappingsConfig};
use crate::csv::{csv_file_to_dict, Cell, CsvError, CsvOptions, Row};
use crate::dates;
use crate::mappings::{Counter, MappingEntry, MappingError, MappingList, MappingListOptions};
use crate::template::render_block_template;
use crate::text;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from info generation.
#[derive(Debug, Error)]
pub enum InfoError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("a base name must be provided when the input is not a plain file")]
    MissingBaseName,
}

/// The processed info for one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoRecord {
    /// Filled-in information (or similar) template
    pub info: String,
    /// Filename to use on the wiki, without extension
    pub filename: String,
    /// Content categories, without "Category:" prefix
    pub cats: Vec<String>,
    /// Maintenance categories, without "Category:" prefix
    pub meta_cats: Vec<String>,
    /// Structured data statements to attach after upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdc: Option<serde_json::Value>,
}

/// Render a complete file description page for one record.
pub fn make_info_page(record: &InfoRecord) -> String {
    let mut txt = record.info.clone();

    if !record.meta_cats.is_empty() {
        txt.push_str("\n\n<!-- Metadata categories -->\n");
        for cat in &record.meta_cats {
            txt.push_str(&format!("[[Category:{}]]\n", cat));
        }
    }

    if !record.cats.is_empty() {
        txt.push_str("\n\n<!-- Content categories -->\n");
        for cat in &record.cats {
            txt.push_str(&format!("[[Category:{}]]\n", cat));
        }
    }

    txt
}

/// A maintenance category name under the batch's base category.
pub fn make_maintenance_cat(base_meta_cat: &str, cat: &str) -> String {
    format!("{}: {}", base_meta_cat, cat)
}

/// Turns batch metadata into uploadable info records.
///
/// Implementors supply the per-item logic; `make_info` and `run` tie the
/// stages together and write the `<base>.json` and `<base>.filenames.txt`
/// outputs.
pub trait InfoMaker {
    type Item;

    /// Load the metadata file and store the per-file items.
    fn load_and_process(&mut self, in_file: &Path) -> Result<(), InfoError>;

    /// Load any mapping files and package them appropriately.
    fn load_mappings(&mut self) -> Result<(), InfoError>;

    /// All processed items.
    fn items(&self) -> Vec<&Self::Item>;

    /// The original filename, without extension, of a media file.
    fn get_original_filename(&self, item: &Self::Item) -> String;

    /// A filled-in information (or similar) template for a single file.
    fn make_info_template(&self, item: &Self::Item) -> String;

    /// A descriptive filename for a single media file, without extension.
    fn generate_filename(&self, item: &Self::Item) -> String;

    /// Categories related to the media file contents.
    fn generate_content_cats(&self, item: &Self::Item) -> Vec<String>;

    /// Maintenance categories for a media file.
    fn generate_meta_cats(&self, item: &Self::Item, content_cats: &[String]) -> Vec<String>;

    /// Structured data statements for a media file, if any.
    fn generate_sdc(&self, _item: &Self::Item) -> Option<serde_json::Value> {
        None
    }

    /// Build the records for every item, keyed by original filename.
    fn make_info(&self) -> BTreeMap<String, InfoRecord> {
        let mut out = BTreeMap::new();
        for item in self.items() {
            let cats = self.generate_content_cats(item);
            let record = InfoRecord {
                info: self.make_info_template(item),
                filename: self.generate_filename(item),
                meta_cats: self.generate_meta_cats(item, &cats),
                sdc: self.generate_sdc(item),
                cats,
            };
            out.insert(self.get_original_filename(item), record);
        }
        out
    }

    /// Full run: load data and mappings, build records, write outputs.
    ///
    /// Returns the path of the JSON output. The base name defaults to the
    /// input file with its extension dropped.
    fn run(&mut self, in_file: &Path, base_name: Option<&Path>) -> Result<PathBuf, InfoError> {
        let base = match base_name {
            Some(base) => base.to_path_buf(),
            None => in_file.with_extension(""),
        };
        if base.as_os_str().is_empty() {
            return Err(InfoError::MissingBaseName);
        }

        self.load_and_process(in_file)?;
        self.load_mappings()?;
        let out_data = self.make_info();

        // append rather than Path::with_extension, base names may contain dots
        let json_file = PathBuf::from(format!("{}.json", base.display()));
        common::write_json(&json_file, &out_data)?;
        info!("Created {}", json_file.display());

        let filenames_file = PathBuf::from(format!("{}.filenames.txt", base.display()));
        let mut out = String::new();
        for (original, record) in &out_data {
            out.push_str(&format!("{}|{}\n", original, record.filename));
        }
        common::write_file(&filenames_file, &out)?;
        info!("Created {}", filenames_file.display());

        Ok(json_file)
    }
}

/// Config-driven info maker for pipe-delimited CSV metadata.
pub struct CsvInfoMaker {
    batch: BatchConfig,
    mappings_cfg: MappingsConfig,
    batch_cat: String,
    data: BTreeMap<String, Row>,
    people: BTreeMap<String, MappingEntry>,
    keywords: BTreeMap<String, MappingEntry>,
}

impl CsvInfoMaker {
    pub fn new(batch: BatchConfig, mappings_cfg: MappingsConfig) -> Self {
        let batch_cat = make_maintenance_cat(&batch.base_meta_cat, &batch.batch_label);
        Self {
            batch,
            mappings_cfg,
            batch_cat,
            data: BTreeMap::new(),
            people: BTreeMap::new(),
            keywords: BTreeMap::new(),
        }
    }

    /// The maintenance category gathering this batch.
    pub fn batch_cat(&self) -> &str {
        &self.batch_cat
    }

    /// The mapping list for a named page under the configured prefix.
    pub fn mapping_list(&self, name: &str) -> Result<MappingList, MappingError> {
        MappingList::new(
            self.mappings_cfg.page_title(name),
            &["name", "frequency", "creator", "wikidata", "link", "category"],
            Some(self.mappings_cfg.header_template.clone()),
            self.mappings_cfg.row_template.clone(),
            &self.mappings_cfg.mapping_dir,
            &self.mappings_cfg.wikitext_dir,
            MappingListOptions {
                na_value: self.mappings_cfg.na_value.clone(),
                list_delimiter: self.mappings_cfg.list_delimiter.clone(),
            },
        )
    }

    /// Count every people and keyword value in the batch, per list.
    pub fn harvest_counters(&self) -> BTreeMap<String, Counter> {
        let mut people = Counter::new();
        let mut keywords = Counter::new();
        for row in self.data.values() {
            for col in &self.batch.people_columns {
                people.add_all(Self::cell_entries(row, col));
            }
            for col in &self.batch.keyword_columns {
                keywords.add_all(Self::cell_entries(row, col));
            }
        }
        let mut counters = BTreeMap::new();
        if !people.is_empty() {
            counters.insert("People".to_string(), people);
        }
        if !keywords.is_empty() {
            counters.insert("Keywords".to_string(), keywords);
        }
        counters
    }

    fn cell_text(row: &Row, column: &str) -> String {
        match row.get(column) {
            Some(Cell::Str(s)) => s.clone(),
            Some(Cell::List(l)) => l.join("; "),
            None => String::new(),
        }
    }

    fn cell_entries(row: &Row, column: &str) -> Vec<String> {
        row.get(column)
            .map(|cell| cell.entries())
            .unwrap_or_default()
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Format a creator value through the people mapping.
    ///
    /// Mapped creators use their mapped form, everything else gets the
    /// "Last, First" order flipped.
    fn format_person(&self, name: &str) -> String {
        if let Some(entry) = self.people.get(name) {
            if !entry.creator.is_empty() {
                return entry.creator.clone();
            }
        }
        text::flip_name(name)
    }

    fn format_param_value(&self, row: &Row, column: &str) -> String {
        if column == self.batch.date_column {
            let raw = Self::cell_text(row, column);
            return match dates::std_date(&raw) {
                Some(parsed) => parsed,
                None => {
                    warn!("Unable to parse date: {}", raw);
                    raw
                }
            };
        }
        if self.batch.people_columns.iter().any(|c| c == column) {
            let people: Vec<String> = Self::cell_entries(row, column)
                .iter()
                .map(|name| self.format_person(name))
                .collect();
            return people.join("; ");
        }
        Self::cell_text(row, column)
    }
}

impl InfoMaker for CsvInfoMaker {
    type Item = Row;

    fn load_and_process(&mut self, in_file: &Path) -> Result<(), InfoError> {
        let key_cols: Vec<&str> = self.batch.key_columns.iter().map(String::as_str).collect();
        let lists: Vec<&str> = self.batch.list_columns.iter().map(String::as_str).collect();
        let opts = CsvOptions {
            lists: if lists.is_empty() { None } else { Some(&lists) },
            delimiter: self.batch.delimiter,
            list_delimiter: self.batch.list_delimiter,
            ..CsvOptions::default()
        };
        self.data = csv_file_to_dict(in_file, &key_cols, &self.batch.header, &opts)?;
        info!("Loaded {} metadata rows", self.data.len());
        Ok(())
    }

    fn load_mappings(&mut self) -> Result<(), InfoError> {
        let people_list = self.mapping_list("People")?;
        let entries = people_list.load_old_mappings()?;
        self.people = people_list.consume_entries(
            entries,
            "name",
            Some(&["creator", "wikidata", "link", "category"]),
        );

        let keyword_list = self.mapping_list("Keywords")?;
        let entries = keyword_list.load_old_mappings()?;
        self.keywords = keyword_list.consume_entries(entries, "name", Some(&["category"]));

        info!(
            "Loaded mappings: {} people, {} keywords",
            self.people.len(),
            self.keywords.len()
        );
        Ok(())
    }

    fn items(&self) -> Vec<&Row> {
        self.data.values().collect()
    }

    fn get_original_filename(&self, item: &Row) -> String {
        if !self.batch.original_filename_column.is_empty() {
            return Self::cell_text(item, &self.batch.original_filename_column);
        }
        self.batch
            .key_columns
            .iter()
            .map(|col| Self::cell_text(item, col))
            .collect::<Vec<_>>()
            .join(":")
    }

    fn make_info_template(&self, item: &Row) -> String {
        let params: Vec<(String, String)> = self
            .batch
            .template_params
            .iter()
            .map(|tp| (tp.param.clone(), self.format_param_value(item, &tp.column)))
            .collect();
        let mut info = render_block_template(&self.batch.info_template, &params);
        for footer in &self.batch.footer_templates {
            info.push('\n');
            info.push_str(footer);
        }
        info
    }

    fn generate_filename(&self, item: &Row) -> String {
        text::format_filename(
            &Self::cell_text(item, &self.batch.description_column),
            &self.batch.institution,
            &Self::cell_text(item, &self.batch.idno_column),
        )
    }

    fn generate_content_cats(&self, item: &Row) -> Vec<String> {
        let mut cats = BTreeSet::new();
        for col in &self.batch.keyword_columns {
            for value in Self::cell_entries(item, col) {
                if let Some(entry) = self.keywords.get(&value) {
                    cats.extend(entry.category.iter().cloned());
                }
            }
        }
        for col in &self.batch.people_columns {
            for value in Self::cell_entries(item, col) {
                if let Some(entry) = self.people.get(&value) {
                    cats.extend(entry.category.iter().cloned());
                }
            }
        }
        cats.into_iter().collect()
    }

    fn generate_meta_cats(&self, _item: &Row, content_cats: &[String]) -> Vec<String> {
        let mut meta_cats = vec![self.batch_cat.clone()];
        if content_cats.is_empty() {
            meta_cats.push(make_maintenance_cat(
                &self.batch.base_meta_cat,
                "needing categorisation",
            ));
        }
        meta_cats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(cats: &[&str], meta_cats: &[&str]) -> InfoRecord {
        InfoRecord {
            info: "{{Information}}".to_string(),
            filename: "New name".to_string(),
            cats: cats.iter().map(|s| s.to_string()).collect(),
            meta_cats: meta_cats.iter().map(|s| s.to_string()).collect(),
            sdc: None,
        }
    }

    #[test]
    fn info_page_with_both_category_blocks() {
        let page = make_info_page(&record(&["Cat A"], &["Batch: x"]));
        assert_eq!(
            page,
            "{{Information}}\n\n<!-- Metadata categories -->\n[[Category:Batch: x]]\n\n\n<!-- Content categories -->\n[[Category:Cat A]]\n"
        );
    }

    #[test]
    fn info_page_without_categories() {
        let page = make_info_page(&record(&[], &[]));
        assert_eq!(page, "{{Information}}");
    }

    fn test_batch_config() -> BatchConfig {
        BatchConfig {
            header: "idno|namn|beskrivning|datering|fotograf|amnesord".to_string(),
            key_columns: vec!["idno".to_string()],
            list_columns: vec!["amnesord".to_string()],
            description_column: "beskrivning".to_string(),
            date_column: "datering".to_string(),
            idno_column: "idno".to_string(),
            people_columns: vec!["fotograf".to_string()],
            keyword_columns: vec!["amnesord".to_string()],
            institution: "Example Museum".to_string(),
            info_template: "Photograph".to_string(),
            template_params: vec![
                tp("title", "namn"),
                tp("description", "beskrivning"),
                tp("date", "datering"),
                tp("photographer", "fotograf"),
            ],
            footer_templates: vec!["{{PD-old-70}}".to_string()],
            base_meta_cat: "Media from the Example Museum".to_string(),
            batch_label: "2026-08".to_string(),
            ..BatchConfig::default()
        }
    }

    fn tp(param: &str, column: &str) -> crate::config::TemplateParam {
        crate::config::TemplateParam {
            param: param.to_string(),
            column: column.to_string(),
        }
    }

    fn test_maker(tmp: &TempDir) -> CsvInfoMaker {
        let mappings_cfg = MappingsConfig {
            mapping_dir: tmp.path().join("connections"),
            wikitext_dir: tmp.path().join("connections"),
            ..MappingsConfig::default()
        };
        CsvInfoMaker::new(test_batch_config(), mappings_cfg)
    }

    const CSV_DATA: &str = "idno|namn|beskrivning|datering|fotograf|amnesord\n\
        1921/A.1|Skeppet|Ett skepp i hamn|1921-09-17|Jansson, Eugen|fartyg;hamnar\n\
        1921/A.2|Okand|En bild|ca 1921|Okand|\n";

    fn seed_mappings(maker: &CsvInfoMaker) {
        let list = maker.mapping_list("People").expect("list");
        let mut entry = MappingEntry::new("Jansson, Eugen", 1);
        entry.creator = "{{Creator:Eugen Jansson}}".to_string();
        entry.category = vec!["Photographs by Eugen Jansson".to_string()];
        common::write_json(list.mapping_file(), &vec![entry]).expect("seed people");

        let list = maker.mapping_list("Keywords").expect("list");
        let mut entry = MappingEntry::new("fartyg", 1);
        entry.category = vec!["Ships".to_string()];
        common::write_json(list.mapping_file(), &vec![entry]).expect("seed keywords");
    }

    #[test]
    fn run_writes_json_and_filenames() {
        let tmp = TempDir::new().unwrap();
        let in_file = tmp.path().join("metadata.csv");
        std::fs::write(&in_file, CSV_DATA).unwrap();

        let mut maker = test_maker(&tmp);
        seed_mappings(&maker);
        let json_file = maker.run(&in_file, None).expect("run");
        assert_eq!(json_file, tmp.path().join("metadata.json"));

        let records: BTreeMap<String, InfoRecord> =
            common::read_json(&json_file).expect("read output");
        assert_eq!(records.len(), 2);

        let first = &records["1921/A.1"];
        assert!(first.info.contains("{{Photograph"));
        assert!(first.info.contains("| date = 1921-09-17"));
        assert!(first
            .info
            .contains("| photographer = {{Creator:Eugen Jansson}}"));
        assert!(first.info.ends_with("{{PD-old-70}}"));
        assert_eq!(
            first.cats,
            vec![
                "Photographs by Eugen Jansson".to_string(),
                "Ships".to_string()
            ]
        );
        assert_eq!(
            first.meta_cats,
            vec!["Media from the Example Museum: 2026-08".to_string()]
        );
        assert_eq!(
            first.filename,
            "Ett skepp i hamn - Example Museum - 1921-A.1"
        );

        let second = &records["1921/A.2"];
        assert!(second.info.contains("| date = {{other date|ca|1921}}"));
        // unmapped photographer is name-flipped, single names unchanged
        assert!(second.info.contains("| photographer = Okand"));
        assert!(second
            .meta_cats
            .contains(&"Media from the Example Museum: needing categorisation".to_string()));

        let filenames =
            std::fs::read_to_string(tmp.path().join("metadata.filenames.txt")).unwrap();
        let mut lines = filenames.lines();
        assert_eq!(
            lines.next(),
            Some("1921/A.1|Ett skepp i hamn - Example Museum - 1921-A.1")
        );
    }

    #[test]
    fn harvest_counters_counts_values() {
        let tmp = TempDir::new().unwrap();
        let in_file = tmp.path().join("metadata.csv");
        std::fs::write(&in_file, CSV_DATA).unwrap();

        let mut maker = test_maker(&tmp);
        maker.load_and_process(&in_file).expect("load");
        let counters = maker.harvest_counters();

        let people = counters.get("People").expect("people counter");
        assert_eq!(
            people.most_common(),
            vec![
                ("Jansson, Eugen".to_string(), 1),
                ("Okand".to_string(), 1)
            ]
        );
        let keywords = counters.get("Keywords").expect("keyword counter");
        assert_eq!(keywords.len(), 2);
    }
}
