//! In-memory model of one `.bru` request definition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// HTTP methods a document can declare.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
}

impl HttpMethod {
    /// All methods, in the order method blocks are looked up.
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::GET,
        HttpMethod::POST,
        HttpMethod::PUT,
        HttpMethod::DELETE,
        HttpMethod::PATCH,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
        }
    }

    /// Name of the DSL block declaring this method.
    pub fn block_name(&self) -> &'static str {
        match self {
            HttpMethod::GET => "get",
            HttpMethod::POST => "post",
            HttpMethod::PUT => "put",
            HttpMethod::DELETE => "delete",
            HttpMethod::PATCH => "patch",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a supported HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// `meta { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub seq: u32,
}

/// `example.request` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRequest {
    pub url: String,
    pub method: String,
    pub mode: String,
}

/// `example.response.status` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
    pub code: u16,
    pub text: String,
}

/// `example.response.body` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// `example.response` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleResponse {
    pub headers: BTreeMap<String, String>,
    pub status: Status,
    pub body: ExampleBody,
}

/// `example { ... }` block: the recorded pair the mock server replays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub name: String,
    pub description: String,
    pub request: ExampleRequest,
    pub response: ExampleResponse,
}

/// One parsed `.bru` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDefinition {
    /// Backing file. Empty for documents parsed from a bare string.
    pub file_path: PathBuf,
    pub meta: Meta,
    pub method: Option<HttpMethod>,
    /// Raw URL pattern, may hold `:param` and `{{var}}` tokens.
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    /// Raw request payload.
    pub body: String,
    pub example: Example,
}

impl RequestDefinition {
    /// Name used in logs and the editor tree.
    pub fn display_name(&self) -> &str {
        if self.meta.name.is_empty() {
            &self.url
        } else {
            &self.meta.name
        }
    }

    /// Whether the example carries a usable response status.
    pub fn has_example_response(&self) -> bool {
        self.example.response.status.code != 0
    }
}
