//! Mapping-list configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the on-wiki mapping lists live and how their tables are built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingsConfig {
    /// Page prefix under which the lists are found,
    /// e.g. "Commons:Batch uploading/ExampleMuseum"
    #[serde(default)]
    pub page_prefix: String,
    /// List page names under the prefix, e.g. ["People", "Keywords"]
    #[serde(default = "default_lists")]
    pub lists: Vec<String>,
    /// Directory for scraped JSON mirrors
    #[serde(default = "default_connections_dir")]
    pub mapping_dir: PathBuf,
    /// Directory for rendered wikitext lists
    #[serde(default = "default_connections_dir")]
    pub wikitext_dir: PathBuf,
    /// Name of the row template
    #[serde(default = "default_row_template")]
    pub row_template: String,
    /// The header template, including any parameters and "{{ }}"
    #[serde(default = "default_header_template")]
    pub header_template: String,
    /// Wikitext to top rendered list pages with
    #[serde(default)]
    pub intro_text: String,
    /// Value marking a mapping as not applicable
    #[serde(default = "default_na_value")]
    pub na_value: String,
    /// Delimiter for list values inside table cells
    #[serde(default = "default_list_delimiter")]
    pub list_delimiter: String,
}

fn default_lists() -> Vec<String> {
    vec!["People".to_string(), "Keywords".to_string()]
}

fn default_connections_dir() -> PathBuf {
    PathBuf::from("connections")
}

fn default_row_template() -> String {
    "mapping-row".to_string()
}

fn default_header_template() -> String {
    "{{mapping-head}}".to_string()
}

fn default_na_value() -> String {
    "-".to_string()
}

fn default_list_delimiter() -> String {
    "/".to_string()
}

impl Default for MappingsConfig {
    fn default() -> Self {
        Self {
            page_prefix: String::new(),
            lists: default_lists(),
            mapping_dir: default_connections_dir(),
            wikitext_dir: default_connections_dir(),
            row_template: default_row_template(),
            header_template: default_header_template(),
            intro_text: String::new(),
            na_value: default_na_value(),
            list_delimiter: default_list_delimiter(),
        }
    }
}

impl MappingsConfig {
    /// Full page title of a named list.
    pub fn page_title(&self, list: &str) -> String {
        if self.page_prefix.is_empty() {
            list.to_string()
        } else {
            format!("{}/{}", self.page_prefix, list)
        }
    }
}
