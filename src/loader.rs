//! Collection directory scanning.
//!
//! Every `.bru` file below the collection root yields exactly one
//! [`LoadOutcome`]; a bad file never stops the scan.

use crate::config::{MissingExamplePolicy, Settings};
use crate::document::{ExampleBody, RequestDefinition, Status};
use crate::environment::ENVIRONMENTS_DIR;
use crate::parser::{self, ParseError};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Why a file was left out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("file could not be read: {0}")]
    Unreadable(String),
    #[error("path is not valid UTF-8")]
    NonUtf8Path,
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("no method block")]
    MissingMethod,
    #[error("method block has no url")]
    MissingUrl,
    #[error("example has no response status")]
    MissingExample,
}

/// Result of loading one file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(RequestDefinition),
    Skipped { path: PathBuf, reason: SkipReason },
}

/// Errors that abort a scan.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("collection directory not found: {0}")]
    MissingDirectory(PathBuf),
    #[error("invalid ignore pattern: {0}")]
    InvalidIgnore(#[from] globset::Error),
}

fn ignore_set(patterns: &[String]) -> Result<GlobSet, LoadError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Parse one file and check it has what a route needs.
pub fn load_file(path: &Path) -> LoadOutcome {
    let skipped = |reason| LoadOutcome::Skipped {
        path: path.to_path_buf(),
        reason,
    };

    if path.to_str().is_none() {
        return skipped(SkipReason::NonUtf8Path);
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => return skipped(SkipReason::Unreadable(e.to_string())),
    };

    let mut doc = match parser::parse_document(&content) {
        Ok(doc) => doc,
        Err(e) => return skipped(SkipReason::Parse(e)),
    };

    if doc.method.is_none() {
        return skipped(SkipReason::MissingMethod);
    }
    if doc.url.trim().is_empty() {
        return skipped(SkipReason::MissingUrl);
    }

    doc.file_path = path.to_path_buf();
    LoadOutcome::Loaded(doc)
}

/// Walk `base_dir` and load every document in it.
///
/// The `environments` directory is not descended into and file names matching
/// one of the ignore globs are passed over silently. Entries are visited in
/// file-name order, so the outcome list is deterministic.
pub fn scan(base_dir: &Path, settings: &Settings) -> Result<Vec<LoadOutcome>, LoadError> {
    if !base_dir.is_dir() {
        return Err(LoadError::MissingDirectory(base_dir.to_path_buf()));
    }
    let ignore = ignore_set(&settings.ignore)?;

    let walker = WalkDir::new(base_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && entry.file_name() == ENVIRONMENTS_DIR)
        });

    let mut outcomes = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                warn!(path = %path.display(), error = %e, "Failed to access path");
                outcomes.push(LoadOutcome::Skipped {
                    path,
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension() != Some(OsStr::new("bru")) {
            continue;
        }
        if ignore.is_match(entry.file_name()) {
            debug!(path = %path.display(), "Ignoring file");
            continue;
        }

        outcomes.push(load_file(path));
    }

    Ok(outcomes)
}

/// Fill in the response served for a document without an example.
pub fn synthesize_example(doc: &mut RequestDefinition) {
    let method = doc.method.map(|m| m.as_str()).unwrap_or_default();
    let body = serde_json::json!({
        "message": format!("Mock response for {}", doc.display_name()),
        "method": method,
        "url": doc.url,
    });

    let response = &mut doc.example.response;
    response.status = Status {
        code: 200,
        text: "OK".to_string(),
    };
    if !response
        .headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type"))
    {
        response
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
    }
    response.body = ExampleBody {
        kind: "json".to_string(),
        content: body.to_string(),
    };
}

/// Scan `base_dir` and return the documents that can be served.
///
/// Skipped files are logged; documents without an example response are
/// handled according to the configured [`MissingExamplePolicy`].
pub fn load_documents(
    base_dir: &Path,
    settings: &Settings,
) -> Result<Vec<RequestDefinition>, LoadError> {
    let mut docs = Vec::new();

    for outcome in scan(base_dir, settings)? {
        let mut doc = match outcome {
            LoadOutcome::Loaded(doc) => doc,
            LoadOutcome::Skipped { path, reason } => {
                warn!(path = %path.display(), reason = %reason, "Skipping file");
                continue;
            }
        };

        if !doc.has_example_response() {
            match settings.missing_example {
                MissingExamplePolicy::Skip => {
                    warn!(
                        path = %doc.file_path.display(),
                        reason = %SkipReason::MissingExample,
                        "Skipping file"
                    );
                    continue;
                }
                MissingExamplePolicy::Synthesize => {
                    debug!(path = %doc.file_path.display(), "Synthesizing example response");
                    synthesize_example(&mut doc);
                }
            }
        }

        docs.push(doc);
    }

    Ok(docs)
}
