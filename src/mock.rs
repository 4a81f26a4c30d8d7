//! Mock response synthesis.
//!
//! Turns a document's recorded example into the response served for a matched
//! request, filling `{{param}}` placeholders with captured path parameters.

use crate::document::RequestDefinition;
use crate::environment::Environment;
use crate::matcher::{Params, Routes};
use crate::pattern;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder regex should be valid"));

/// Content type added when the example declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// A synthesized response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl MockResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of placeholder interpolation.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpolated {
    /// Substitution produced valid JSON.
    Applied(Value),
    /// Substitution broke the JSON; the original value is kept.
    Fallback(Value),
}

impl Interpolated {
    pub fn into_value(self) -> Value {
        match self {
            Interpolated::Applied(value) | Interpolated::Fallback(value) => value,
        }
    }
}

/// Replace every `{{name}}` in the serialized form of `json` with the captured
/// value of `name`, then parse the result again.
///
/// Replacement is textual, so a placeholder standing alone as a string value
/// stays a string (`"{{id}}"` becomes `"42"`).
pub fn interpolate(json: &Value, params: &Params) -> Interpolated {
    let Ok(text) = serde_json::to_string(json) else {
        return Interpolated::Fallback(json.clone());
    };

    // One pass, so captured values are never rescanned for placeholders.
    let text = PLACEHOLDER.replace_all(&text, |caps: &Captures| match params.get(&caps[1]) {
        Some(value) => value.clone(),
        None => caps[0].to_string(),
    });

    match serde_json::from_str(&text) {
        Ok(value) => Interpolated::Applied(value),
        Err(e) => {
            debug!(error = %e, "Interpolated body is not valid JSON, using the original");
            Interpolated::Fallback(json.clone())
        }
    }
}

/// Builds responses from document examples.
#[derive(Debug, Clone)]
pub struct MockEngine {
    default_content_type: String,
}

impl MockEngine {
    pub fn new(default_content_type: impl Into<String>) -> Self {
        Self {
            default_content_type: default_content_type.into(),
        }
    }

    pub fn default_content_type(&self) -> &str {
        &self.default_content_type
    }

    /// Synthesize the response for `doc` given the captured path parameters.
    pub fn respond(&self, doc: &RequestDefinition, params: &Params) -> MockResponse {
        let response = &doc.example.response;

        let body = self.body(doc, params);

        let mut headers: Vec<(String, String)> = response
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let has_content_type = headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));
        if !has_content_type {
            headers.push((
                "Content-Type".to_string(),
                self.default_content_type.clone(),
            ));
        }

        MockResponse {
            status: response.status.code,
            headers,
            body,
        }
    }

    fn body(&self, doc: &RequestDefinition, params: &Params) -> Option<String> {
        let content = doc.example.response.body.content.trim();
        if content.is_empty() {
            return None;
        }

        let json: Value = match serde_json::from_str(content) {
            Ok(json) => json,
            Err(e) => {
                warn!(
                    file = %doc.file_path.display(),
                    error = %e,
                    "Example body is not valid JSON, responding without a body"
                );
                return None;
            }
        };

        let value = interpolate(&json, params).into_value();
        serde_json::to_string(&value).ok()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_TYPE)
    }
}

/// Handler type stored in the mock route table.
pub type MockHandler = Box<dyn Fn(&Params) -> MockResponse + Send + Sync>;

/// Register one route per document.
///
/// Documents without a method are skipped, as are documents whose route is
/// already taken. Returns the number of routes the table accepted.
pub fn register_routes<R>(
    routes: &mut R,
    docs: Vec<RequestDefinition>,
    env: &Environment,
    engine: Arc<MockEngine>,
) -> usize
where
    R: Routes<Handler = MockHandler>,
{
    let mut registered = 0;

    for doc in docs {
        let Some(method) = doc.method else {
            continue;
        };
        let pattern = pattern::compile(&doc.url, env);
        let shown = pattern.to_string();
        let file = doc.file_path.clone();

        let engine = Arc::clone(&engine);
        let handler: MockHandler = Box::new(move |params| engine.respond(&doc, params));
        if !routes.register(method, pattern, handler) {
            continue;
        }

        info!(
            method = %method,
            pattern = %shown,
            file = %file.display(),
            "Registered mock route"
        );
        registered += 1;
    }

    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HttpMethod;
    use crate::matcher::RouteTable;
    use crate::parser::parse_document;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn doc(status: u16, content: &str) -> RequestDefinition {
        let mut doc = RequestDefinition {
            method: Some(HttpMethod::GET),
            url: "/users/:id".to_string(),
            ..Default::default()
        };
        doc.example.response.status.code = status;
        doc.example.response.body.content = content.to_string();
        doc
    }

    #[test]
    fn test_interpolate_string_values() {
        let json = json!({"id": "{{id}}", "name": "User {{id}}", "static": "x"});
        let result = interpolate(&json, &params(&[("id", "42")]));
        assert_eq!(
            result,
            Interpolated::Applied(json!({"id": "42", "name": "User 42", "static": "x"}))
        );
    }

    #[test]
    fn test_interpolate_falls_back_on_broken_json() {
        let json = json!({"name": "{{name}}"});
        let result = interpolate(&json, &params(&[("name", "a\"b")]));
        assert_eq!(result, Interpolated::Fallback(json));
    }

    #[test]
    fn test_interpolate_leaves_unknown_placeholders() {
        let json = json!({"id": "{{other}}"});
        let result = interpolate(&json, &params(&[("id", "1")]));
        assert_eq!(result.into_value(), json);
    }

    #[test]
    fn test_respond_substitutes_params() {
        let engine = MockEngine::default();
        let response = engine.respond(&doc(201, r#"{"id":"{{id}}"}"#), &params(&[("id", "42")]));

        assert_eq!(response.status, 201);
        assert_eq!(response.body.as_deref(), Some(r#"{"id":"42"}"#));
        assert_eq!(response.header("content-type"), Some("application/json"));
    }

    #[test]
    fn test_respond_keeps_declared_content_type() {
        let engine = MockEngine::new("text/plain");
        let mut doc = doc(200, "");
        doc.example
            .response
            .headers
            .insert("content-type".to_string(), "application/vnd.api+json".to_string());
        doc.example
            .response
            .headers
            .insert("x-request-id".to_string(), "abc".to_string());

        let response = engine.respond(&doc, &Params::new());
        assert_eq!(response.headers.len(), 2);
        assert_eq!(response.header("Content-Type"), Some("application/vnd.api+json"));
        assert_eq!(response.header("x-request-id"), Some("abc"));
        assert_eq!(response.body, None);
    }

    #[test]
    fn test_respond_invalid_body_is_absent() {
        let engine = MockEngine::default();
        let response = engine.respond(&doc(500, "{not json"), &Params::new());
        assert_eq!(response.status, 500);
        assert_eq!(response.body, None);
    }

    #[test]
    fn test_register_routes_end_to_end() {
        let text = "get {\n  url: {{baseUrl}}/users/:id\n}\nexample {\n  response: {\n    status: {\n      code: 201\n    }\n    body: {\n      type: json\n      content: '''\n{\"id\":\"{{id}}\"}\n      '''\n    }\n  }\n}\n";
        let doc = parse_document(text).unwrap();
        let no_method = RequestDefinition::default();

        let mut table: RouteTable<MockHandler> = RouteTable::new();
        let env = Environment::empty("local");
        let count = register_routes(
            &mut table,
            vec![doc, no_method],
            &env,
            Arc::new(MockEngine::default()),
        );
        assert_eq!(count, 1);

        let (handler, params) = table.resolve("GET", "/users/42").unwrap();
        let response = handler(&params);
        assert_eq!(response.status, 201);
        assert_eq!(response.body.as_deref(), Some(r#"{"id":"42"}"#));
    }

    #[test]
    fn test_register_routes_counts_accepted_only() {
        let first = doc(200, r#"{"n":1}"#);
        let second = doc(200, r#"{"n":2}"#);

        let mut table: RouteTable<MockHandler> = RouteTable::new();
        let count = register_routes(
            &mut table,
            vec![first, second],
            &Environment::empty("local"),
            Arc::new(MockEngine::default()),
        );
        assert_eq!(count, 1);
        assert_eq!(table.len(), 1);

        let (handler, params) = table.resolve("GET", "/users/1").unwrap();
        assert_eq!(handler(&params).body.as_deref(), Some(r#"{"n":1}"#));
    }

    #[test]
    fn test_interpolate_does_not_rescan_values() {
        let json = json!({"a": "{{a}}", "b": "{{b}}"});
        // Each map gets its own hasher seed, so iteration order varies.
        for _ in 0..16 {
            let captured = params(&[("a", "{{b}}"), ("b", "{{a}}")]);
            assert_eq!(
                interpolate(&json, &captured),
                Interpolated::Applied(json!({"a": "{{b}}", "b": "{{a}}"}))
            );
        }
    }
}
