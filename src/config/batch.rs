//! Metadata parsing and info-page generation configuration

use serde::{Deserialize, Serialize};

/// One parameter of the info template, filled from a metadata column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateParam {
    /// Template parameter name
    pub param: String,
    /// Metadata column feeding it
    pub column: String,
}

/// How a batch's metadata file maps onto description pages and filenames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Expected header row, exactly as it appears in the file
    pub header: String,
    /// Column(s) forming the per-file key, combined with ":"
    pub key_columns: Vec<String>,
    /// Columns holding list values
    #[serde(default)]
    pub list_columns: Vec<String>,
    /// Cell delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Delimiter inside list cells
    #[serde(default = "default_list_delimiter")]
    pub list_delimiter: char,
    /// Column holding the original (extension-less) filename.
    /// Falls back to the combined key columns when empty.
    #[serde(default)]
    pub original_filename_column: String,
    /// Column feeding the descriptive part of the new filename
    #[serde(default = "default_description_column")]
    pub description_column: String,
    /// Column holding the raw date, normalized before templating
    #[serde(default = "default_date_column")]
    pub date_column: String,
    /// Column holding the institution's item id
    #[serde(default = "default_idno_column")]
    pub idno_column: String,
    /// Columns holding names to run through the people mapping
    #[serde(default)]
    pub people_columns: Vec<String>,
    /// Columns holding values to run through the keyword mapping
    #[serde(default)]
    pub keyword_columns: Vec<String>,
    /// Institution name used in filenames and as the info source
    #[serde(default)]
    pub institution: String,
    /// Name of the info template, e.g. "Photograph"
    #[serde(default = "default_info_template")]
    pub info_template: String,
    /// Ordered (template param, column) pairs filling the info template
    #[serde(default)]
    pub template_params: Vec<TemplateParam>,
    /// Wikitext appended after the info template, typically license templates
    #[serde(default)]
    pub footer_templates: Vec<String>,
    /// Base name of the maintenance categories
    pub base_meta_cat: String,
    /// Label of this particular batch
    pub batch_label: String,
}

fn default_delimiter() -> char {
    '|'
}

fn default_list_delimiter() -> char {
    ';'
}

fn default_description_column() -> String {
    "description".to_string()
}

fn default_date_column() -> String {
    "date".to_string()
}

fn default_idno_column() -> String {
    "idno".to_string()
}

fn default_info_template() -> String {
    "Photograph".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            header: String::new(),
            key_columns: Vec::new(),
            list_columns: Vec::new(),
            delimiter: default_delimiter(),
            list_delimiter: default_list_delimiter(),
            original_filename_column: String::new(),
            description_column: default_description_column(),
            date_column: default_date_column(),
            idno_column: default_idno_column(),
            people_columns: Vec::new(),
            keyword_columns: Vec::new(),
            institution: String::new(),
            info_template: default_info_template(),
            template_params: Vec::new(),
            footer_templates: Vec::new(),
            base_meta_cat: String::new(),
            batch_label: String::new(),
        }
    }
}
