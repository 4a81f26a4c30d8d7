//! File-backed document storage for the editor.
//!
//! The filesystem is the only state: every call reads from or writes to disk,
//! and concurrent writers simply overwrite each other.

use crate::codec::{self, CodecError};
use crate::config::Settings;
use crate::document::{
    Example, ExampleBody, ExampleRequest, ExampleResponse, HttpMethod, Meta, RequestDefinition,
    Status,
};
use crate::loader::{self, LoadError, LoadOutcome};
use crate::environment::ENVIRONMENTS_DIR;
use crate::parser::{self, ParseError, LITERAL_DELIMITER};
use crate::serializer;
use crate::tree::{self, TreeNode};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("placeholder regex should be valid"));

/// Errors raised by [`DocumentStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] CodecError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Create/update payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestInput {
    pub name: String,
    pub method: String,
    pub url: String,
    pub description: String,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub body: String,
    pub response_status: Option<Status>,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: String,
}

impl RequestInput {
    /// Check the required fields and return the parsed method.
    pub fn validate(&self) -> Result<HttpMethod, StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("name is required".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(StoreError::InvalidInput("url is required".to_string()));
        }
        let method = self
            .method
            .parse()
            .map_err(|e: crate::document::UnknownMethod| StoreError::InvalidInput(e.to_string()))?;

        check_line("name", &self.name)?;
        check_url(self.url.trim())?;
        check_line("description", &self.description)?;
        check_map("headers", &self.headers)?;
        check_map("query params", &self.query_params)?;
        check_map("response headers", &self.response_headers)?;
        if let Some(status) = &self.response_status {
            check_line("status text", &status.text)?;
        }
        check_literal("body", &self.body)?;
        check_literal("response body", &self.response_body)?;
        Ok(method)
    }
}

fn invalid(message: String) -> StoreError {
    StoreError::InvalidInput(message)
}

/// A value written as the right-hand side of a `key: value` line.
///
/// Braces outside `{{placeholders}}` would be read back as block structure.
fn check_line(field: &str, value: &str) -> Result<(), StoreError> {
    check_single_line(field, value)?;
    if PLACEHOLDER.replace_all(value, "").contains(['{', '}']) {
        return Err(invalid(format!(
            "{} cannot contain braces outside {{{{placeholders}}}}",
            field
        )));
    }
    Ok(())
}

/// URLs may also carry balanced `{param}` segments, but not in first position.
fn check_url(url: &str) -> Result<(), StoreError> {
    check_single_line("url", url)?;

    let bare = PLACEHOLDER.replace_all(url, "");
    let mut depth = 0usize;
    for ch in bare.chars() {
        match ch {
            '{' if depth == 0 => depth = 1,
            '}' if depth == 1 => depth = 0,
            '{' | '}' => return Err(invalid("url has unbalanced braces".to_string())),
            _ => {}
        }
    }
    if depth != 0 {
        return Err(invalid("url has unbalanced braces".to_string()));
    }
    if url.starts_with('{') && !url.starts_with("{{") {
        return Err(invalid("url cannot start with a {param} segment".to_string()));
    }
    Ok(())
}

fn check_map(field: &str, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
    for (key, value) in entries {
        if key.trim().is_empty() {
            return Err(invalid(format!("{} cannot have an empty key", field)));
        }
        if key.contains(':') {
            return Err(invalid(format!("{} key cannot contain ':': {}", field, key)));
        }
        check_line(&format!("{} key", field), key)?;
        check_line(&format!("{} value for {}", field, key), value)?;
    }
    Ok(())
}

fn check_single_line(field: &str, value: &str) -> Result<(), StoreError> {
    if value.contains(['\n', '\r']) {
        return Err(invalid(format!("{} must be a single line", field)));
    }
    check_literal(field, value)
}

/// Bodies are stored between `'''` delimiters and cannot contain one.
fn check_literal(field: &str, value: &str) -> Result<(), StoreError> {
    if value.contains(LITERAL_DELIMITER) {
        return Err(invalid(format!(
            "{} cannot contain {}",
            field, LITERAL_DELIMITER
        )));
    }
    Ok(())
}

/// A stored document as shown to the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: String,
    pub name: String,
    pub method: Option<HttpMethod>,
    pub url: String,
    pub description: String,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    pub body: String,
    pub response_status: Status,
    pub response_headers: BTreeMap<String, String>,
    pub response_body: String,
}

impl RequestView {
    fn new(id: &str, doc: RequestDefinition) -> Self {
        let response = doc.example.response;
        Self {
            id: id.to_string(),
            name: doc.meta.name,
            method: doc.method,
            url: doc.url,
            description: doc.example.description,
            headers: doc.headers,
            query_params: doc.query_params,
            body: doc.body,
            response_status: response.status,
            response_headers: response.headers,
            response_body: response.body.content,
        }
    }
}

/// Replace characters that are not allowed in file names with `-`.
pub fn sanitize_filename(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect()
}

/// CRUD over the documents of one collection directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    base_dir: PathBuf,
    settings: Settings,
}

impl DocumentStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_settings(base_dir, Settings::default())
    }

    pub fn with_settings(base_dir: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            base_dir: base_dir.into(),
            settings,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Rescan the collection and build the navigation tree.
    pub fn tree(&self) -> Result<TreeNode, StoreError> {
        let docs: Vec<_> = loader::scan(&self.base_dir, &self.settings)?
            .into_iter()
            .filter_map(|outcome| match outcome {
                LoadOutcome::Loaded(doc) => Some(doc),
                LoadOutcome::Skipped { path, reason } => {
                    debug!(path = %path.display(), reason = %reason, "Not listing file");
                    None
                }
            })
            .collect();

        Ok(tree::build_tree(&docs, &self.base_dir))
    }

    pub fn get(&self, id: &str) -> Result<RequestView, StoreError> {
        let path = codec::resolve(&self.base_dir, id)?;
        let doc = self.read(id, &path)?;
        Ok(RequestView::new(id, doc))
    }

    /// Write a new document and return its id.
    ///
    /// The file goes to `<base>/<url folders>/<sanitized name>.bru`; an existing
    /// file at that path is overwritten.
    pub fn create(&self, input: &RequestInput) -> Result<String, StoreError> {
        let method = input.validate()?;
        let path = self.generate_path(&input.url, &input.name)?;

        let mut response_headers = input.response_headers.clone();
        if response_headers.is_empty() {
            response_headers.insert(
                "content-type".to_string(),
                self.settings.default_content_type.clone(),
            );
        }
        let status = input.response_status.clone().unwrap_or_else(|| Status {
            code: 200,
            text: "OK".to_string(),
        });

        let doc = build_document(input, method, status, response_headers);
        self.write(&path, &doc)?;

        let id = codec::id_for(&self.base_dir, &path);
        info!(path = %path.display(), id = %id, "Created request");
        Ok(id)
    }

    /// Replace the document behind `id`.
    ///
    /// Response headers and status are carried over from the existing file when
    /// the input leaves them out.
    pub fn update(&self, id: &str, input: &RequestInput) -> Result<(), StoreError> {
        let path = codec::resolve(&self.base_dir, id)?;
        let existing = self.read(id, &path)?;
        let method = input.validate()?;

        let response_headers = if input.response_headers.is_empty() {
            existing.example.response.headers
        } else {
            input.response_headers.clone()
        };
        let status = match input.response_status.clone() {
            Some(mut status) => {
                if status.text.trim().is_empty() {
                    status.text = existing.example.response.status.text;
                }
                status
            }
            None => existing.example.response.status,
        };

        let doc = build_document(input, method, status, response_headers);
        self.write(&path, &doc)?;

        info!(path = %path.display(), "Updated request");
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = codec::resolve(&self.base_dir, id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "Deleted request");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Path for a new document.
    pub fn generate_path(&self, url: &str, name: &str) -> Result<PathBuf, StoreError> {
        let file_name = sanitize_filename(name);
        if file_name.is_empty() {
            return Err(StoreError::InvalidInput("name is required".to_string()));
        }

        let segments = tree::url_segments(url);
        let mut path = self.base_dir.clone();
        if let Some((_, folders)) = segments.split_last() {
            for folder in folders.iter().filter(|f| **f != "." && **f != "..") {
                let folder = sanitize_folder(folder);
                // The scanner never enters `environments`.
                if folder == ENVIRONMENTS_DIR {
                    path.push(format!("_{}", folder));
                } else {
                    path.push(folder);
                }
            }
        }
        path.push(format!("{}.bru", file_name));
        Ok(path)
    }

    fn read(&self, id: &str, path: &Path) -> Result<RequestDefinition, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let mut doc = parser::parse_document(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        doc.file_path = path.to_path_buf();
        Ok(doc)
    }

    fn write(&self, path: &Path, doc: &RequestDefinition) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        std::fs::write(path, serializer::serialize(doc)).map_err(|e| StoreError::io(path, e))
    }
}

/// Folder names keep `:` so dynamic segments stay recognizable.
fn sanitize_folder(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            '\\' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect()
}

fn build_document(
    input: &RequestInput,
    method: HttpMethod,
    status: Status,
    response_headers: BTreeMap<String, String>,
) -> RequestDefinition {
    let name = input.name.trim().to_string();
    let url = input.url.trim().to_string();

    RequestDefinition {
        file_path: PathBuf::new(),
        meta: Meta {
            name: name.clone(),
            kind: "http".to_string(),
            seq: 1,
        },
        method: Some(method),
        url: url.clone(),
        headers: input.headers.clone(),
        query_params: input.query_params.clone(),
        body: input.body.clone(),
        example: Example {
            name: format!("{} Example", name),
            description: input.description.clone(),
            request: ExampleRequest {
                url,
                method: method.to_string(),
                mode: "none".to_string(),
            },
            response: ExampleResponse {
                headers: response_headers,
                status,
                body: ExampleBody {
                    kind: "json".to_string(),
                    content: input.response_body.clone(),
                },
            },
        },
    }
}
