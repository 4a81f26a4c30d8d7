//! URL pattern compilation and path matching.
//!
//! Document URLs look like `{{baseUrl}}/users/:id`. Compiling substitutes
//! environment variables, drops whatever placeholders remain and rewrites
//! `:name` parameters into `{name}` captures, giving a pattern such as
//! `/users/{id}` that [`RoutePattern::matches`] can test request paths against.

use crate::environment::Environment;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder regex should be valid"));

static ORIGIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/?#]*").expect("origin regex should be valid")
});

static PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":(\w+)").expect("param regex should be valid"));

static SLASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"/+").expect("slash regex should be valid"));

/// Compile a raw document URL into a routable pattern.
pub fn compile(raw_url: &str, env: &Environment) -> RoutePattern {
    // Substituted values are not rescanned.
    let substituted = PLACEHOLDER.replace_all(raw_url, |caps: &Captures| {
        let name = caps[1].trim();
        env.get(name)
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string())
    });
    let stripped = PLACEHOLDER.replace_all(&substituted, "");

    let without_origin = ORIGIN.replace(&stripped, "");
    let path = match without_origin.find(['?', '#']) {
        Some(end) => &without_origin[..end],
        None => &without_origin[..],
    };

    let params = PARAM.replace_all(path, "{$1}");
    let rooted = format!("/{}", params);
    let collapsed = SLASHES.replace_all(&rooted, "/");

    RoutePattern::parse(trim_trailing_slash(&collapsed))
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route pattern such as `/users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse an already compiled pattern.
    pub fn parse(pattern: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut in_param = false;
        let mut param_name = String::new();

        for ch in pattern.chars() {
            if ch == '{' && !in_param {
                if !current.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current)));
                }
                in_param = true;
                param_name.clear();
            } else if ch == '}' && in_param {
                if !param_name.is_empty() {
                    segments.push(Segment::Param(std::mem::take(&mut param_name)));
                }
                in_param = false;
            } else if in_param {
                param_name.push(ch);
            } else {
                current.push(ch);
            }
        }

        if !current.is_empty() {
            segments.push(Segment::Literal(current));
        }

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the captures, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn param_count(&self) -> usize {
        self.param_names().count()
    }

    /// Match a request path, returning the percent-decoded captures.
    ///
    /// A capture never spans a `/` and must be non-empty. The whole path has
    /// to be consumed; a single trailing slash on the request is tolerated.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut remaining = trim_trailing_slash(path);

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    remaining = remaining.strip_prefix(lit.as_str())?;
                }
                Segment::Param(name) => {
                    let segment_end = remaining.find('/').unwrap_or(remaining.len());
                    let end_pos = match self.segments.get(i + 1) {
                        Some(Segment::Literal(next)) if !next.starts_with('/') => {
                            remaining[..segment_end].find(next.as_str())?
                        }
                        _ => segment_end,
                    };

                    if end_pos == 0 {
                        return None;
                    }

                    let value = &remaining[..end_pos];
                    let decoded = urlencoding::decode(value)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| value.to_string());
                    params.insert(name.clone(), decoded);
                    remaining = &remaining[end_pos..];
                }
            }
        }

        remaining.is_empty().then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
