//! Uploading prepared files or URLs to the wiki.
//!
//! Directory uploads expect a `.info` side-car next to each media file and
//! sort the pair into `Uploaded`, `Uploaded_errors` or `Uploaded_warnings`
//! afterwards. URL uploads run off the generated info JSON directly and log
//! every outcome class to its own file so a later run can be fed from them.

use crate::api::{ApiError, UploadResponse, WikiClient};
use crate::common::{self, CommonError, LogFile};
use crate::config::UploadConfig;
use crate::makeinfo::{make_info_page, InfoRecord};
use crate::prep::find_files;
use crate::sdc;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const URL_PROTOCOLS: &[&str] = &["http", "https"];

/// Errors from the upload stage.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("not a valid directory: {0}")]
    NotADirectory(PathBuf),

    #[error("{0}: Found url with a disallowed protocol")]
    DisallowedProtocol(String),

    #[error("{0}: Found url without a file extension")]
    MissingExtension(String),

    #[error("{0}: Found url with a disallowed file extension ({1})")]
    DisallowedExtension(String, String),
}

/// Which upload warnings may be overridden.
#[derive(Debug, Clone, Copy, Default)]
pub struct WarningPolicy {
    /// Ignore the filepage-already-exists warning
    pub overwrite_page_exists: bool,
    /// Ignore the duplicate-file warning
    pub upload_if_duplicate: bool,
    /// Ignore the bad-prefix warning
    pub upload_if_badprefix: bool,
    /// Ignore every warning
    pub ignore_all: bool,
}

impl WarningPolicy {
    fn ignored_codes(&self) -> BTreeSet<&'static str> {
        let mut codes = BTreeSet::new();
        if self.overwrite_page_exists {
            codes.insert("exists");
        }
        if self.upload_if_duplicate {
            codes.insert("duplicate");
        }
        if self.upload_if_badprefix {
            codes.insert("bad-prefix");
        }
        codes
    }

    /// Whether every raised warning may be overridden.
    fn allows(&self, response: &UploadResponse) -> bool {
        if self.ignore_all {
            return true;
        }
        let ignored = self.ignored_codes();
        response
            .warning_codes()
            .iter()
            .all(|code| ignored.contains(code))
    }
}

/// The media to upload: a local file or a public URL.
pub enum MediaSource<'a> {
    File(&'a Path),
    Url(&'a str),
}

/// Outcome of a single upload attempt.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    /// Human readable one-liner for the run log
    pub log: String,
    /// Warning details when the upload was blocked by warnings
    pub warning: Option<String>,
    /// Error details when the upload failed
    pub error: Option<String>,
}

impl UploadOutcome {
    fn success(file_name: &str) -> Self {
        Self {
            log: format!("{}: success", file_name),
            ..Self::default()
        }
    }

    fn warning(file_name: &str, response: &UploadResponse) -> Self {
        let details = serde_json::to_string(&response.warnings).unwrap_or_default();
        Self {
            log: format!("Warning: {}: {}", file_name, details),
            warning: Some(details),
            error: None,
        }
    }

    fn error(file_name: &str, error: impl std::fmt::Display) -> Self {
        Self {
            log: format!("Error: {}: {}", file_name, error),
            warning: None,
            error: Some(error.to_string()),
        }
    }
}

/// Upload a single file or URL, overriding only the allowed warnings.
///
/// The first attempt never overrides warnings. When every raised warning is
/// covered by the policy the upload is retried with warnings ignored.
pub async fn upload_single_file(
    client: &mut WikiClient,
    file_name: &str,
    media: MediaSource<'_>,
    text: &str,
    policy: WarningPolicy,
    chunk_size: u64,
) -> UploadOutcome {
    let mut ignore_warnings = policy.ignore_all;
    loop {
        let attempt = match &media {
            MediaSource::File(path) => {
                client
                    .upload_file(file_name, path, text, text, ignore_warnings, chunk_size)
                    .await
            }
            MediaSource::Url(url) => {
                client
                    .upload_by_url(file_name, url, text, text, ignore_warnings)
                    .await
            }
        };
        let response = match attempt {
            Ok(response) => response,
            Err(error) => return UploadOutcome::error(file_name, error),
        };

        if response.is_success() {
            return UploadOutcome::success(file_name);
        }
        if response.result == "Warning" {
            if !ignore_warnings && policy.allows(&response) {
                ignore_warnings = true;
                continue;
            }
            return UploadOutcome::warning(file_name, &response);
        }
        return UploadOutcome::error(
            file_name,
            format!("unexpected upload result '{}'", response.result),
        );
    }
}

/// Options shared by the bulk upload entry points.
#[derive(Debug, Default)]
pub struct UploadJobOptions {
    /// Stop after this many upload attempts
    pub cutoff: Option<usize>,
    /// Print what would be uploaded without uploading
    pub test: bool,
    /// Echo the log line of every attempt
    pub verbose: bool,
    /// Attach structured data after successful uploads
    pub with_sdc: bool,
    /// Only these urls are uploaded (url uploads)
    pub only: Option<Vec<String>>,
    /// These urls are skipped (url uploads)
    pub skip: Option<Vec<String>>,
}

/// Counts for a finished upload run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: usize,
    pub warnings: usize,
    pub errors: usize,
    pub skipped: usize,
}

/// Upload every matched media file in a directory.
///
/// Each media file needs a `.info` side-car holding the full description
/// page. Processed pairs are moved into the outcome directory.
pub async fn up_all(
    client: &mut WikiClient,
    in_path: &Path,
    cfg: &UploadConfig,
    opts: &UploadJobOptions,
) -> Result<UploadStats, UploadError> {
    if !in_path.is_dir() {
        return Err(UploadError::NotADirectory(in_path.to_path_buf()));
    }

    let done_dir = in_path.join(&cfg.done_dir);
    let error_dir = in_path.join(cfg.error_dir());
    let warning_dir = in_path.join(cfg.warning_dir());
    common::create_dir(&done_dir)?;
    common::create_dir(&error_dir)?;
    common::create_dir(&warning_dir)?;

    let mut flog = LogFile::new(in_path, "uploader.log")?;
    let policy = WarningPolicy {
        upload_if_badprefix: true,
        ..WarningPolicy::default()
    };
    let chunk_size = if cfg.chunked {
        cfg.chunk_size_bytes()
    } else {
        0
    };

    let mut stats = UploadStats::default();
    let mut counter = 0;
    for file in find_files(in_path, &cfg.file_exts, false) {
        if opts.cutoff.map_or(false, |cutoff| counter >= cutoff) {
            break;
        }
        let base_name = file_name_of(&file);
        let info_file = file.with_extension("info");
        if !info_file.exists() {
            flog.write_with_timestamp(&format!(
                "{}: Found multimedia file without info",
                base_name
            ))?;
            stats.skipped += 1;
            continue;
        }
        let text = common::read_file(&info_file)?;

        if opts.test {
            info!(
                "Test upload \"{}\" with the following description:\n{}\n",
                base_name, text
            );
            counter += 1;
            continue;
        }

        let outcome = upload_single_file(
            client,
            &base_name,
            MediaSource::File(&file),
            &text,
            policy,
            chunk_size,
        )
        .await;

        let target_dir = if outcome.error.is_some() {
            stats.errors += 1;
            &error_dir
        } else if outcome.warning.is_some() {
            stats.warnings += 1;
            &warning_dir
        } else {
            stats.uploaded += 1;
            &done_dir
        };
        if opts.verbose {
            info!("{}", outcome.log);
        }
        flog.write_with_timestamp(&outcome.log)?;
        std::fs::rename(&file, target_dir.join(&base_name))?;
        std::fs::rename(&info_file, target_dir.join(file_name_of(&info_file)))?;
        counter += 1;
    }

    info!("{}", flog.close_and_confirm()?);
    Ok(stats)
}

/// Upload every file given as a URL key of a generated info JSON.
///
/// Separate log files per outcome class land in an `upload_logs` directory
/// next to the info file, so later runs can be filtered with only/skip.
pub async fn up_all_from_url(
    client: &mut WikiClient,
    info_path: &Path,
    file_exts: &[String],
    opts: &UploadJobOptions,
) -> Result<UploadStats, UploadError> {
    let mut info_datas: BTreeMap<String, InfoRecord> = common::read_json(info_path)?;

    let output_dir = info_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("upload_logs");
    common::create_dir(&output_dir)?;

    let mut success_log = LogFile::new(&output_dir, "success.log")?;
    let mut warning_log = LogFile::new(&output_dir, "warnings.log")?;
    let mut error_log = LogFile::new(&output_dir, "errors.log")?;
    let mut flog = LogFile::new(&output_dir, "uploader.log")?;

    // filtering based on entries in only/skip
    if let Some(only) = &opts.only {
        info_datas.retain(|url, _| only.contains(url));
    }
    if let Some(skip) = &opts.skip {
        info_datas.retain(|url, _| !skip.contains(url));
    }
    flog.write_with_timestamp(&format!(
        "{} files remain to upload after filtering",
        info_datas.len()
    ))?;

    let policy = WarningPolicy {
        upload_if_badprefix: true,
        ..WarningPolicy::default()
    };

    let mut stats = UploadStats::default();
    let mut counter = 0;
    for (url, record) in &info_datas {
        if opts.cutoff.map_or(false, |cutoff| counter >= cutoff) {
            break;
        }

        let ext = match verify_url_file_extension(url, file_exts) {
            Ok(ext) => ext,
            Err(error) => {
                flog.write_with_timestamp(&error.to_string())?;
                stats.skipped += 1;
                continue;
            }
        };
        if record.info.is_empty() {
            flog.write_with_timestamp(&format!(
                "{}: Found url missing the info field (at least)",
                url
            ))?;
            stats.skipped += 1;
            continue;
        }
        if record.filename.is_empty() {
            flog.write_with_timestamp(&format!(
                "{}: Found url missing the output filename",
                url
            ))?;
            stats.skipped += 1;
            continue;
        }

        let text = make_info_page(record);
        let filename = format!("{}{}", record.filename, ext);

        if opts.test {
            info!(
                "Test upload \"{}\" from \"{}\" with the following description:\n{}\n",
                filename, url, text
            );
            counter += 1;
            continue;
        }

        let outcome = upload_single_file(
            client,
            &filename,
            MediaSource::Url(url),
            &text,
            policy,
            0,
        )
        .await;

        if outcome.error.is_some() {
            stats.errors += 1;
            error_log.write_line(url)?;
        } else if outcome.warning.is_some() {
            stats.warnings += 1;
            warning_log.write_line(url)?;
        } else {
            stats.uploaded += 1;
            success_log.write_line(url)?;
            if opts.with_sdc {
                if let Some(sdc_data) = &record.sdc {
                    if let Err(error) =
                        sdc::upload_sdc(client, &format!("File:{}", filename), sdc_data).await
                    {
                        warn!("{}: SDC upload failed: {}", filename, error);
                        flog.write_with_timestamp(&format!(
                            "{}: SDC upload failed: {}",
                            filename, error
                        ))?;
                    }
                }
            }
        }
        if opts.verbose {
            info!("{}", outcome.log);
        }
        flog.write_with_timestamp(&outcome.log)?;
        counter += 1;
    }

    for log in [success_log, warning_log, error_log, flog] {
        info!("{}", log.close_and_confirm()?);
    }
    Ok(stats)
}

/// Check that a URL has an allowed protocol and file extension.
///
/// Returns the extension, with leading dot.
pub fn verify_url_file_extension(
    url: &str,
    file_exts: &[String],
) -> Result<String, UploadError> {
    let protocol = url.split("://").next().unwrap_or_default();
    if !URL_PROTOCOLS.contains(&protocol) {
        return Err(UploadError::DisallowedProtocol(url.to_string()));
    }

    let last_segment = url.rsplit('/').next().unwrap_or_default();
    let ext = match last_segment.rfind('.') {
        Some(pos) if pos + 1 < last_segment.len() => last_segment[pos..].to_lowercase(),
        _ => return Err(UploadError::MissingExtension(url.to_string())),
    };

    if !file_exts.contains(&ext) {
        return Err(UploadError::DisallowedExtension(url.to_string(), ext));
    }
    Ok(ext)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exts() -> Vec<String> {
        vec![".tif".to_string(), ".jpg".to_string()]
    }

    #[test]
    fn url_extension_accepted() {
        assert_eq!(
            verify_url_file_extension("https://example.org/media/a.TIF", &exts()).unwrap(),
            ".tif"
        );
    }

    #[test]
    fn url_protocol_rejected() {
        let err = verify_url_file_extension("ftp://example.org/a.tif", &exts()).unwrap_err();
        assert!(matches!(err, UploadError::DisallowedProtocol(_)));
        let err = verify_url_file_extension("file://etc/a.tif", &exts()).unwrap_err();
        assert!(matches!(err, UploadError::DisallowedProtocol(_)));
    }

    #[test]
    fn url_without_extension_rejected() {
        let err = verify_url_file_extension("https://example.org/media", &exts()).unwrap_err();
        assert!(matches!(err, UploadError::MissingExtension(_)));
    }

    #[test]
    fn url_with_bad_extension_rejected() {
        let err =
            verify_url_file_extension("https://example.org/a.exe", &exts()).unwrap_err();
        assert!(matches!(err, UploadError::DisallowedExtension(_, ext) if ext == ".exe"));
    }

    #[test]
    fn policy_allows_only_ignored_codes() {
        let policy = WarningPolicy {
            upload_if_badprefix: true,
            ..WarningPolicy::default()
        };
        let mut response = UploadResponse {
            result: "Warning".to_string(),
            ..UploadResponse::default()
        };
        response
            .warnings
            .insert("bad-prefix".to_string(), json!("x"));
        assert!(policy.allows(&response));

        response.warnings.insert("exists".to_string(), json!("x"));
        assert!(!policy.allows(&response));

        let ignore_all = WarningPolicy {
            ignore_all: true,
            ..WarningPolicy::default()
        };
        assert!(ignore_all.allows(&response));
    }
}
