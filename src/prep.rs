//! Prepare files for upload by writing description pages and renaming them.
//!
//! Matches files on disk against the generated info data, writes a `.info`
//! side-car next to each renamed file and logs the old-to-new name pairs.

use crate::common::{self, CommonError, LogFile};
use crate::makeinfo::{make_info_page, InfoRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Name of the rename log written into the output directory.
const GENERATOR_LOG: &str = "generator.log";

/// Errors from upload preparation.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid directory: {0}")]
    NotADirectory(PathBuf),

    #[error("non-unique file key: {0}")]
    NonUniqueKey(String),
}

/// One matched file, ready for renaming.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Current location of the file
    pub path: PathBuf,
    /// Lower-cased file extension, with leading dot
    pub ext: String,
    /// Extension-less original filename, the key into the info data
    pub key: String,
    /// The generated info for this file
    pub record: InfoRecord,
}

/// Summary of a preparation run.
#[derive(Debug, Default)]
pub struct PrepSummary {
    pub found: usize,
    pub matched: usize,
}

/// Prepare an upload.
///
/// Finds media files under `in_path`, matches them against the keys of the
/// generated info data, writes `.info` pages and moves the files, renamed,
/// into `out_path`. Emptied subdirectories are removed afterwards.
pub fn run(
    in_path: &Path,
    out_path: &Path,
    data_path: &Path,
    file_exts: &[String],
) -> Result<PrepSummary, PrepError> {
    let data: BTreeMap<String, InfoRecord> = common::read_json(data_path)?;

    if !in_path.is_dir() {
        return Err(PrepError::NotADirectory(in_path.to_path_buf()));
    }
    let found_files = find_files(in_path, file_exts, true);
    let hitlist = make_hitlist(&found_files, &data)?;
    let summary = PrepSummary {
        found: found_files.len(),
        matched: hitlist.len(),
    };

    make_and_rename(&hitlist, out_path)?;
    remove_empty_directories(in_path, true)?;
    Ok(summary)
}

/// All files under a directory with one of the given extensions.
///
/// Extension matching is case insensitive and expects leading dots.
pub fn find_files(path: &Path, file_exts: &[String], subdirs: bool) -> Vec<PathBuf> {
    let max_depth = if subdirs { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        if file_exts.contains(&ext) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    files
}

/// Match found files against the info data by extension-less basename.
pub fn make_hitlist(
    files: &[PathBuf],
    data: &BTreeMap<String, InfoRecord>,
) -> Result<Vec<Hit>, PrepError> {
    let mut hitlist = Vec::new();
    let mut processed_keys = Vec::new();
    for file in files {
        let key = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let record = match data.get(&key) {
            Some(record) => record.clone(),
            None => {
                debug!("No info data for {}", file.display());
                continue;
            }
        };
        if processed_keys.contains(&key) {
            return Err(PrepError::NonUniqueKey(key));
        }
        processed_keys.push(key.clone());
        let ext = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        hitlist.push(Hit {
            path: file.clone(),
            ext,
            key,
            record,
        });
    }
    Ok(hitlist)
}

/// Write the `.info` pages and move the matched files into place.
pub fn make_and_rename(hitlist: &[Hit], out_path: &Path) -> Result<(), PrepError> {
    common::create_dir(out_path)?;
    let mut log = LogFile::new(out_path, GENERATOR_LOG)?;

    for hit in hitlist {
        let base_name = out_path.join(&hit.record.filename);

        // append rather than Path::with_extension, filenames may contain dots
        let mut info_file = base_name.clone().into_os_string();
        info_file.push(".info");
        common::write_file(PathBuf::from(info_file), &make_info_page(&hit.record))?;

        let mut target = base_name.into_os_string();
        target.push(&hit.ext);
        let target = PathBuf::from(target);
        std::fs::rename(&hit.path, &target)?;

        log.write_line(&format!(
            "{}|{}",
            hit.path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            target
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        ))?;
    }
    info!("{}", log.close_and_confirm()?);
    Ok(())
}

/// Remove empty subdirectories, bottom up. The starting directory is kept.
pub fn remove_empty_directories(path: &Path, top: bool) -> Result<(), PrepError> {
    if !path.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if entry.path().is_dir() {
            remove_empty_directories(&entry.path(), false)?;
        }
    }

    if !top {
        if std::fs::read_dir(path)?.next().is_none() {
            std::fs::remove_dir(path)?;
        } else {
            warn!("Not removing non-empty directory: {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exts() -> Vec<String> {
        vec![".tif".to_string(), ".jpg".to_string()]
    }

    fn record(filename: &str) -> InfoRecord {
        InfoRecord {
            info: "{{Information}}".to_string(),
            filename: filename.to_string(),
            cats: vec!["Cat".to_string()],
            meta_cats: Vec::new(),
            sdc: None,
        }
    }

    #[test]
    fn find_files_filters_and_recurses() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.TIF"), "x").unwrap();
        std::fs::write(tmp.path().join("b.txt"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("sub")).unwrap();
        std::fs::write(tmp.path().join("sub/c.jpg"), "x").unwrap();

        let found = find_files(tmp.path(), &exts(), true);
        assert_eq!(found.len(), 2);

        let flat = find_files(tmp.path(), &exts(), false);
        assert_eq!(flat, vec![tmp.path().join("a.TIF")]);
    }

    #[test]
    fn hitlist_matches_on_basename() {
        let tmp = TempDir::new().unwrap();
        let files = vec![tmp.path().join("photo_01.tif"), tmp.path().join("other.tif")];
        let mut data = BTreeMap::new();
        data.insert("photo_01".to_string(), record("New name"));

        let hits = make_hitlist(&files, &data).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, "photo_01");
        assert_eq!(hits[0].ext, ".tif");
    }

    #[test]
    fn hitlist_rejects_duplicate_keys() {
        let tmp = TempDir::new().unwrap();
        let files = vec![
            tmp.path().join("a/photo_01.tif"),
            tmp.path().join("b/photo_01.jpg"),
        ];
        let mut data = BTreeMap::new();
        data.insert("photo_01".to_string(), record("New name"));

        let err = make_hitlist(&files, &data).unwrap_err();
        assert!(matches!(err, PrepError::NonUniqueKey(k) if k == "photo_01"));
    }

    #[test]
    fn run_renames_and_writes_info() {
        let tmp = TempDir::new().unwrap();
        let in_dir = tmp.path().join("in");
        let out_dir = tmp.path().join("out");
        std::fs::create_dir_all(in_dir.join("sub")).unwrap();
        std::fs::write(in_dir.join("sub/photo_01.tif"), "image bytes").unwrap();
        std::fs::write(in_dir.join("unrelated.txt"), "keep me").unwrap();

        let mut data = BTreeMap::new();
        data.insert("photo_01".to_string(), record("A ship - Museum - 01"));
        let data_path = tmp.path().join("batch.json");
        common::write_json(&data_path, &data).unwrap();

        let summary = run(&in_dir, &out_dir, &data_path, &exts()).unwrap();
        assert_eq!(summary.found, 1);
        assert_eq!(summary.matched, 1);

        assert!(out_dir.join("A ship - Museum - 01.tif").is_file());
        let info =
            std::fs::read_to_string(out_dir.join("A ship - Museum - 01.info")).unwrap();
        assert!(info.contains("[[Category:Cat]]"));

        // the emptied subdirectory is gone, the root stays
        assert!(!in_dir.join("sub").exists());
        assert!(in_dir.join("unrelated.txt").is_file());

        let log = std::fs::read_to_string(out_dir.join(GENERATOR_LOG)).unwrap();
        assert_eq!(log, "photo_01.tif|A ship - Museum - 01.tif\n");
    }
}
