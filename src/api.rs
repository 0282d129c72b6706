//! Async client for the MediaWiki action API.
//!
//! Covers the slice of the API the toolkit needs: login and tokens, page
//! reads and edits, (chunked) file uploads and the wikibase entity calls
//! used for structured data.

use crate::config::SiteConfig;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("login failed: {0}")]
    Login(String),

    #[error("no {0} token in response")]
    MissingToken(String),

    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("malformed API response: {0}")]
    BadResponse(String),
}

/// Outcome of an upload request.
#[derive(Debug, Clone, Default)]
pub struct UploadResponse {
    /// "Success", "Warning" or "Continue"
    pub result: String,
    /// Filename as normalized by the wiki
    pub filename: Option<String>,
    /// Warning code to details, non-empty only for "Warning"
    pub warnings: BTreeMap<String, Value>,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        self.result == "Success"
    }

    pub fn warning_codes(&self) -> Vec<&str> {
        self.warnings.keys().map(String::as_str).collect()
    }
}

/// A logged-in connection to one wiki.
pub struct WikiClient {
    http: reqwest::Client,
    api_url: String,
    username: String,
    password: String,
    csrf_token: Option<String>,
}

impl WikiClient {
    /// Build a client from the site configuration. Call `login` before use.
    pub fn new(site: &SiteConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(site.user_agent.clone())
            .timeout(std::time::Duration::from_secs(site.request_timeout_secs))
            .cookie_store(true)
            .build()?;
        Ok(Self {
            http,
            api_url: site.api_url.clone(),
            username: site.username.clone(),
            password: site.password().map_err(|e| ApiError::Login(e.to_string()))?,
            csrf_token: None,
        })
    }

    /// POST a form to the API and return the parsed body.
    async fn post(&self, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let mut form: Vec<(&str, &str)> = vec![("format", "json")];
        form.extend_from_slice(params);
        let response = self
            .http
            .post(&self.api_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Self::check_api_error(&body)?;
        Ok(body)
    }

    /// GET an API query and return the parsed body.
    async fn get(&self, params: &[(&str, &str)]) -> Result<Value, ApiError> {
        let mut query: Vec<(&str, &str)> = vec![("format", "json")];
        query.extend_from_slice(params);
        let response = self
            .http
            .get(&self.api_url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;
        Self::check_api_error(&body)?;
        Ok(body)
    }

    fn check_api_error(body: &Value) -> Result<(), ApiError> {
        if let Some(error) = body.get("error") {
            return Err(ApiError::Api {
                code: error
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                info: error
                    .get("info")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
        Ok(())
    }

    async fn fetch_token(&self, token_type: &str) -> Result<String, ApiError> {
        let body = self
            .get(&[("action", "query"), ("meta", "tokens"), ("type", token_type)])
            .await?;
        body.pointer(&format!("/query/tokens/{}token", token_type))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| ApiError::MissingToken(token_type.to_string()))
    }

    /// Log in and cache a CSRF token for subsequent writes.
    pub async fn login(&mut self) -> Result<(), ApiError> {
        let login_token = self.fetch_token("login").await?;
        let body = self
            .post(&[
                ("action", "login"),
                ("lgname", &self.username),
                ("lgpassword", &self.password),
                ("lgtoken", &login_token),
            ])
            .await?;
        let result = body
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if result != "Success" {
            let reason = body
                .pointer("/login/reason")
                .and_then(Value::as_str)
                .unwrap_or(result);
            return Err(ApiError::Login(reason.to_string()));
        }
        info!("Logged in as {}", self.username);
        self.csrf_token = Some(self.fetch_token("csrf").await?);
        Ok(())
    }

    async fn csrf_token(&mut self) -> Result<String, ApiError> {
        if let Some(token) = &self.csrf_token {
            return Ok(token.clone());
        }
        let token = self.fetch_token("csrf").await?;
        self.csrf_token = Some(token.clone());
        Ok(token)
    }

    /// The current wikitext of a page, `None` when the page does not exist.
    pub async fn get_wikitext(&self, title: &str) -> Result<Option<String>, ApiError> {
        let body = self
            .get(&[
                ("action", "query"),
                ("prop", "revisions"),
                ("rvprop", "content"),
                ("rvslots", "main"),
                ("titles", title),
            ])
            .await?;
        let pages = body
            .pointer("/query/pages")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::BadResponse("no pages in query response".to_string()))?;
        for page in pages.values() {
            if page.get("missing").is_some() {
                return Ok(None);
            }
            if let Some(content) = page
                .pointer("/revisions/0/slots/main/*")
                .and_then(Value::as_str)
            {
                return Ok(Some(content.to_string()));
            }
        }
        Ok(None)
    }

    /// Whether a page exists.
    pub async fn page_exists(&self, title: &str) -> Result<bool, ApiError> {
        let body = self
            .get(&[("action", "query"), ("titles", title)])
            .await?;
        let pages = body
            .pointer("/query/pages")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::BadResponse("no pages in query response".to_string()))?;
        Ok(pages.values().all(|page| page.get("missing").is_none()))
    }

    /// The page id of a page, `None` when it does not exist.
    pub async fn page_id(&self, title: &str) -> Result<Option<u64>, ApiError> {
        let body = self
            .get(&[("action", "query"), ("titles", title)])
            .await?;
        let pages = body
            .pointer("/query/pages")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::BadResponse("no pages in query response".to_string()))?;
        Ok(pages
            .values()
            .find_map(|page| page.get("pageid").and_then(Value::as_u64)))
    }

    /// Replace the text of a page.
    pub async fn edit(&mut self, title: &str, text: &str, summary: &str) -> Result<(), ApiError> {
        let token = self.csrf_token().await?;
        self.post(&[
            ("action", "edit"),
            ("title", title),
            ("text", text),
            ("summary", summary),
            ("token", &token),
        ])
        .await?;
        debug!("Edited {}", title);
        Ok(())
    }

    /// Members of a category, optionally limited to one namespace.
    ///
    /// Follows continuation so the full category is returned.
    pub async fn category_members(
        &self,
        category: &str,
        namespace: Option<u32>,
        member_type: &str,
    ) -> Result<Vec<String>, ApiError> {
        let title = with_prefix(category, "Category:");
        let ns = namespace.map(|n| n.to_string());
        let mut members = Vec::new();
        let mut cont: Option<String> = None;
        loop {
            let mut params: Vec<(&str, &str)> = vec![
                ("action", "query"),
                ("list", "categorymembers"),
                ("cmtitle", &title),
                ("cmtype", member_type),
                ("cmlimit", "max"),
            ];
            if let Some(ns) = &ns {
                params.push(("cmnamespace", ns));
            }
            if let Some(cont) = &cont {
                params.push(("cmcontinue", cont));
            }
            let body = self.get(&params).await?;
            if let Some(batch) = body
                .pointer("/query/categorymembers")
                .and_then(Value::as_array)
            {
                members.extend(
                    batch
                        .iter()
                        .filter_map(|m| m.get("title").and_then(Value::as_str))
                        .map(String::from),
                );
            }
            match body
                .pointer("/continue/cmcontinue")
                .and_then(Value::as_str)
            {
                Some(next) => cont = Some(next.to_string()),
                None => break,
            }
        }
        Ok(members)
    }

    /// The categories a page belongs to, with "Category:" prefixes.
    pub async fn page_categories(&self, title: &str) -> Result<Vec<String>, ApiError> {
        let body = self
            .get(&[
                ("action", "query"),
                ("prop", "categories"),
                ("cllimit", "max"),
                ("titles", title),
            ])
            .await?;
        let pages = body
            .pointer("/query/pages")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::BadResponse("no pages in query response".to_string()))?;
        let mut categories = Vec::new();
        for page in pages.values() {
            if let Some(cats) = page.get("categories").and_then(Value::as_array) {
                categories.extend(
                    cats.iter()
                        .filter_map(|c| c.get("title").and_then(Value::as_str))
                        .map(String::from),
                );
            }
        }
        Ok(categories)
    }

    /// Upload a local file, chunked when `chunk_size` is non-zero.
    pub async fn upload_file(
        &mut self,
        file_name: &str,
        path: &Path,
        text: &str,
        comment: &str,
        ignore_warnings: bool,
        chunk_size: u64,
    ) -> Result<UploadResponse, ApiError> {
        let bytes = tokio::fs::read(path).await?;
        if chunk_size == 0 || (bytes.len() as u64) <= chunk_size {
            return self
                .upload_direct(file_name, bytes, text, comment, ignore_warnings)
                .await;
        }
        self.upload_chunked(file_name, bytes, text, comment, ignore_warnings, chunk_size)
            .await
    }

    async fn upload_direct(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        text: &str,
        comment: &str,
        ignore_warnings: bool,
    ) -> Result<UploadResponse, ApiError> {
        let token = self.csrf_token().await?;
        let mut form = Form::new()
            .text("format", "json")
            .text("action", "upload")
            .text("filename", file_name.to_string())
            .text("text", text.to_string())
            .text("comment", comment.to_string())
            .text("token", token)
            .part(
                "file",
                Part::bytes(bytes).file_name(file_name.to_string()),
            );
        if ignore_warnings {
            form = form.text("ignorewarnings", "1");
        }
        let body: Value = self
            .http
            .post(&self.api_url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::check_api_error(&body)?;
        Self::parse_upload_response(&body)
    }

    async fn upload_chunked(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        text: &str,
        comment: &str,
        ignore_warnings: bool,
        chunk_size: u64,
    ) -> Result<UploadResponse, ApiError> {
        let token = self.csrf_token().await?;
        let filesize = bytes.len().to_string();
        let mut filekey: Option<String> = None;
        let mut offset: usize = 0;

        while offset < bytes.len() {
            let end = usize::min(offset + chunk_size as usize, bytes.len());
            let chunk = bytes[offset..end].to_vec();
            let mut form = Form::new()
                .text("format", "json")
                .text("action", "upload")
                .text("stash", "1")
                .text("filename", file_name.to_string())
                .text("filesize", filesize.clone())
                .text("offset", offset.to_string())
                .text("token", token.clone())
                .part(
                    "chunk",
                    Part::bytes(chunk).file_name(file_name.to_string()),
                );
            if let Some(key) = &filekey {
                form = form.text("filekey", key.clone());
            }
            let body: Value = self
                .http
                .post(&self.api_url)
                .multipart(form)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Self::check_api_error(&body)?;
            filekey = body
                .pointer("/upload/filekey")
                .and_then(Value::as_str)
                .map(String::from);
            if filekey.is_none() {
                return Err(ApiError::BadResponse(
                    "chunked upload returned no filekey".to_string(),
                ));
            }
            offset = end;
            debug!("Uploaded chunk, offset now {}/{}", offset, bytes.len());
        }

        let filekey = filekey
            .ok_or_else(|| ApiError::BadResponse("empty file for chunked upload".to_string()))?;
        let mut params: Vec<(&str, &str)> = vec![
            ("action", "upload"),
            ("filename", file_name),
            ("filekey", &filekey),
            ("text", text),
            ("comment", comment),
            ("token", &token),
        ];
        if ignore_warnings {
            params.push(("ignorewarnings", "1"));
        }
        let body = self.post(&params).await?;
        Self::parse_upload_response(&body)
    }

    /// Upload a file the wiki fetches itself from a public URL.
    pub async fn upload_by_url(
        &mut self,
        file_name: &str,
        url: &str,
        text: &str,
        comment: &str,
        ignore_warnings: bool,
    ) -> Result<UploadResponse, ApiError> {
        let token = self.csrf_token().await?;
        let mut params: Vec<(&str, &str)> = vec![
            ("action", "upload"),
            ("filename", file_name),
            ("url", url),
            ("text", text),
            ("comment", comment),
            ("token", &token),
        ];
        if ignore_warnings {
            params.push(("ignorewarnings", "1"));
        }
        let body = self.post(&params).await?;
        Self::parse_upload_response(&body)
    }

    fn parse_upload_response(body: &Value) -> Result<UploadResponse, ApiError> {
        let upload = body
            .get("upload")
            .ok_or_else(|| ApiError::BadResponse("no upload in response".to_string()))?;
        let result = upload
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let filename = upload
            .get("filename")
            .and_then(Value::as_str)
            .map(String::from);
        let warnings = upload
            .get("warnings")
            .and_then(Value::as_object)
            .map(|w| {
                w.iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect::<BTreeMap<String, Value>>()
            })
            .unwrap_or_default();
        Ok(UploadResponse {
            result,
            filename,
            warnings,
        })
    }

    /// The wikibase entity for an id, e.g. "M12345" for file pages.
    pub async fn wb_get_entity(&self, id: &str) -> Result<Value, ApiError> {
        let body = self
            .get(&[("action", "wbgetentities"), ("ids", id)])
            .await?;
        body.pointer(&format!("/entities/{}", id))
            .cloned()
            .ok_or_else(|| ApiError::BadResponse(format!("no entity {} in response", id)))
    }

    /// Write structured data to a wikibase entity.
    pub async fn wb_edit_entity(
        &mut self,
        id: &str,
        data: &Value,
        summary: &str,
    ) -> Result<(), ApiError> {
        let token = self.csrf_token().await?;
        let data = serde_json::to_string(data)?;
        self.post(&[
            ("action", "wbeditentity"),
            ("id", id),
            ("data", &data),
            ("summary", summary),
            ("token", &token),
        ])
        .await?;
        debug!("Edited entity {}", id);
        Ok(())
    }
}

/// Prefix a title unless it already carries the prefix.
pub fn with_prefix(title: &str, prefix: &str) -> String {
    if title.starts_with(prefix) {
        title.to_string()
    } else {
        format!("{}{}", prefix, title)
    }
}
