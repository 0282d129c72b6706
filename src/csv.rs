//! Pipe-delimited CSV parsing.
//!
//! Institution metadata arrives as `|`-separated CSV without quoting. Cells
//! may hold `;`-separated lists and column headings may repeat, in which case
//! the repeated columns are concatenated into lists.

use crate::common::{strip_list_entries, trim_list};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors from CSV parsing and serialization.
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header mismatch\nexpected: {expected}\nfound: {found}")]
    HeaderMismatch { expected: String, found: String },

    #[error("key column '{0}' not found in header")]
    KeyColNotFound(String),

    #[error("key columns must not be empty")]
    EmptyKeyCol,

    #[error("key column '{0}' must not be a list or non-unique column")]
    SpecialKeyCol(String),

    #[error("all '{label}'-columns must be in the header, '{column}' is not")]
    UnknownColumn { label: String, column: String },

    #[error("unexpected non-unique columns found: {0}")]
    UnexpectedNonUnique(String),

    #[error("non-unique key found: {0}")]
    NonUniqueKey(String),

    #[error("row has {found} cells, header has {expected}: {row}")]
    RowLength {
        expected: usize,
        found: usize,
        row: String,
    },
}

/// A single cell: either a plain value or a list column's entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Str(String),
    List(Vec<String>),
}

impl Cell {
    /// The plain value, or `None` for list cells.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            Cell::List(_) => None,
        }
    }

    /// The entries of this cell, a plain value counting as one entry.
    pub fn entries(&self) -> Vec<String> {
        match self {
            Cell::Str(s) => vec![s.clone()],
            Cell::List(l) => l.clone(),
        }
    }
}

/// One parsed row, keyed by column heading.
pub type Row = BTreeMap<String, Cell>;

/// Tuning knobs for `csv_file_to_dict`.
pub struct CsvOptions<'a> {
    /// Whether repeated column headings are expected.
    pub non_unique: bool,
    /// Columns to keep. `None` keeps all.
    pub keep: Option<&'a [&'a str]>,
    /// Columns whose cells are lists.
    pub lists: Option<&'a [&'a str]>,
    pub delimiter: char,
    pub list_delimiter: char,
}

impl Default for CsvOptions<'_> {
    fn default() -> Self {
        Self {
            non_unique: false,
            keep: None,
            lists: None,
            delimiter: '|',
            list_delimiter: ';',
        }
    }
}

/// Open a CSV file and return the header cells plus the remaining lines.
pub fn open_csv_file(
    path: impl AsRef<Path>,
    delimiter: char,
) -> Result<(Vec<String>, Vec<String>), CsvError> {
    let text = std::fs::read_to_string(path)?;
    let mut lines: Vec<String> = text.trim().split('\n').map(|l| l.to_string()).collect();
    if lines.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let header: Vec<String> = lines.remove(0).split(delimiter).map(String::from).collect();
    Ok((strip_list_entries(&header), strip_list_entries(&lines)))
}

/// Identify the column index for each of the given labels.
fn find_cols(
    find: Option<&[&str]>,
    label: &str,
    header: &[String],
    default_all: bool,
) -> Result<BTreeMap<String, usize>, CsvError> {
    let mut cols = BTreeMap::new();
    match find {
        None => {
            if default_all {
                for (i, h) in header.iter().enumerate() {
                    // later duplicates win, matching index-of-last semantics
                    cols.insert(h.clone(), i);
                }
            }
        }
        Some(find) => {
            for f in find {
                match header.iter().position(|h| h == f) {
                    Some(i) => {
                        cols.insert(f.to_string(), i);
                    }
                    None => {
                        return Err(CsvError::UnknownColumn {
                            label: label.to_string(),
                            column: f.to_string(),
                        })
                    }
                }
            }
        }
    }
    Ok(cols)
}

/// Identify repeated column headings and their positions.
fn find_non_unique_cols(
    header: &[String],
    keep: &BTreeMap<String, usize>,
    non_unique: bool,
) -> Result<BTreeMap<String, Vec<usize>>, CsvError> {
    let mut positions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, h) in header.iter().enumerate() {
        positions.entry(h.clone()).or_default().push(i);
    }
    positions.retain(|_, v| v.len() > 1);

    if !non_unique && positions.keys().any(|k| keep.contains_key(k)) {
        let names: Vec<&str> = positions.keys().map(String::as_str).collect();
        return Err(CsvError::UnexpectedNonUnique(names.join(", ")));
    }
    Ok(positions)
}

fn validate_key_cols(
    key_cols: &[&str],
    lists: Option<&[&str]>,
    non_unique_cols: &BTreeMap<String, Vec<usize>>,
    keep: &BTreeMap<String, usize>,
    header: &[String],
) -> Result<(), CsvError> {
    for key in key_cols {
        if key.is_empty() {
            return Err(CsvError::EmptyKeyCol);
        }
        if lists.map_or(false, |l| l.contains(key)) || non_unique_cols.contains_key(*key) {
            return Err(CsvError::SpecialKeyCol(key.to_string()));
        }
        if !header.iter().any(|h| h == key) || !keep.contains_key(*key) {
            return Err(CsvError::KeyColNotFound(key.to_string()));
        }
    }
    Ok(())
}

/// Parse a CSV file into a map of rows, keyed by one or more key columns.
///
/// Multiple key columns are combined with `":"`. The header row must match
/// `header_check` exactly, including column order. Repeated column headings
/// are concatenated into lists when `opts.non_unique` allows them. Note that
/// that structure does not survive a `dict_to_csv_file` round trip.
pub fn csv_file_to_dict(
    path: impl AsRef<Path>,
    key_cols: &[&str],
    header_check: &str,
    opts: &CsvOptions,
) -> Result<BTreeMap<String, Row>, CsvError> {
    let (header, lines) = open_csv_file(path, opts.delimiter)?;

    let expected: Vec<&str> = header_check.split(opts.delimiter).collect();
    if expected != header.iter().map(String::as_str).collect::<Vec<_>>() {
        return Err(CsvError::HeaderMismatch {
            expected: header_check.to_string(),
            found: header.join(&opts.delimiter.to_string()),
        });
    }

    let cols = find_cols(opts.keep, "keep", &header, true)?;
    let non_unique_cols = find_non_unique_cols(&header, &cols, opts.non_unique)?;
    let listify = find_cols(opts.lists, "lists", &header, false)?;
    validate_key_cols(key_cols, opts.lists, &non_unique_cols, &cols, &header)?;

    let key_col_nums: Vec<usize> = key_cols
        .iter()
        .map(|k| {
            header
                .iter()
                .position(|h| h == k)
                .ok_or_else(|| CsvError::KeyColNotFound(k.to_string()))
        })
        .collect::<Result<_, _>>()?;

    let mut result = BTreeMap::new();
    for line in &lines {
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(opts.delimiter).collect();
        if parts.len() != header.len() {
            return Err(CsvError::RowLength {
                expected: header.len(),
                found: parts.len(),
                row: line.clone(),
            });
        }

        let key = key_col_nums
            .iter()
            .map(|&n| parts[n].trim())
            .collect::<Vec<_>>()
            .join(":");
        if result.contains_key(&key) {
            return Err(CsvError::NonUniqueKey(key));
        }

        let mut row = Row::new();
        for (col, &num) in &cols {
            let cell = if let Some(nums) = non_unique_cols.get(col) {
                let mut values = Vec::new();
                for &n in nums {
                    if listify.contains_key(col) {
                        values.extend(
                            parts[n]
                                .trim()
                                .split(opts.list_delimiter)
                                .map(String::from),
                        );
                    } else {
                        values.push(parts[n].trim().to_string());
                    }
                }
                Cell::List(trim_list(&values))
            } else if listify.contains_key(col) {
                let values: Vec<String> = parts[num]
                    .trim()
                    .split(opts.list_delimiter)
                    .map(String::from)
                    .collect();
                Cell::List(trim_list(&values))
            } else {
                Cell::Str(parts[num].trim().to_string())
            };
            row.insert(col.clone(), cell);
        }
        result.insert(key, row);
    }

    Ok(result)
}

/// Write a map of rows back out as CSV, columns given by a header string.
///
/// List cells are joined with the list delimiter. Every header field must be
/// present in the rows.
pub fn dict_to_csv_file(
    path: impl AsRef<Path>,
    data: &BTreeMap<String, Row>,
    header: &str,
    opts: &CsvOptions,
) -> Result<(), CsvError> {
    let mut output = format!("{}\n", header);
    let columns: Vec<&str> = header.split(opts.delimiter).collect();

    if let Some(first) = data.values().next() {
        if let Some(missing) = columns.iter().find(|c| !first.contains_key(**c)) {
            return Err(CsvError::HeaderMismatch {
                expected: header.to_string(),
                found: format!("rows lack column '{}'", missing),
            });
        }
    }

    let list_sep = opts.list_delimiter.to_string();
    for row in data.values() {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(*c) {
                Some(Cell::Str(s)) => s.clone(),
                Some(Cell::List(l)) => l.join(&list_sep),
                None => String::new(),
            })
            .collect();
        output.push_str(&cells.join(&opts.delimiter.to_string()));
        output.push('\n');
    }

    std::fs::write(path, output)?;
    Ok(())
}
