//! Browser editor: CRUD API and HTML views over the document store.
//!
//! Requests sent by htmx (`HX-Request` header) get HTML fragments; everything
//! else gets a JSON envelope `{"success": .., "data": .., "error": ..}`.

use crate::document::{HttpMethod, Status};
use crate::matcher::{RouteTable, Routes};
use crate::pattern::RoutePattern;
use crate::server::{HttpRequest, HttpResponse};
use crate::store::{DocumentStore, RequestInput, StoreError};
use crate::template::TemplateEngine;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Header sent with mutating responses so the sidebar reloads.
pub const TRIGGER_HEADER: &str = "HX-Trigger";
pub const REQUESTS_CHANGED: &str = "requestsChanged";

/// Errors surfaced by editor handlers.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("template registration failed: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
    #[error("render failed: {0}")]
    Render(#[from] handlebars::RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<handlebars::TemplateError> for EditorError {
    fn from(e: handlebars::TemplateError) -> Self {
        EditorError::Template(Box::new(e))
    }
}

impl EditorError {
    fn status(&self) -> (u16, &'static str, String) {
        match self {
            EditorError::Store(StoreError::NotFound(_)) => {
                (404, "NOT_FOUND", "Request not found".to_string())
            }
            EditorError::Store(StoreError::InvalidId(_)) => {
                (400, "BAD_REQUEST", "Invalid request id".to_string())
            }
            EditorError::Store(StoreError::InvalidInput(message))
            | EditorError::BadRequest(message) => (400, "BAD_REQUEST", message.clone()),
            _ => (500, "INTERNAL_ERROR", "Internal server error".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiError {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiError>,
}

fn success<T: Serialize>(status: u16, data: Option<T>) -> HttpResponse {
    HttpResponse::json(
        status,
        &Envelope {
            success: true,
            data,
            error: None,
        },
    )
}

fn failure(err: &EditorError) -> HttpResponse {
    let (status, code, message) = err.status();
    if status >= 500 {
        error!(error = %err, "Editor request failed");
    } else {
        debug!(error = %err, status, "Editor request rejected");
    }

    HttpResponse::json(
        status,
        &Envelope::<()> {
            success: false,
            data: None,
            error: Some(ApiError { code, message }),
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorRoute {
    Index,
    List,
    Get,
    Create,
    Update,
    Delete,
}

/// Editor request handler.
pub struct Editor {
    store: DocumentStore,
    templates: TemplateEngine,
    routes: RouteTable<EditorRoute>,
}

impl Editor {
    /// Build the editor. Fails when the embedded templates do not register.
    pub fn new(store: DocumentStore) -> Result<Self, EditorError> {
        let templates = TemplateEngine::new()?;

        let mut routes = RouteTable::new();
        let collection = RoutePattern::parse("/api/requests");
        let item = RoutePattern::parse("/api/requests/{id}");
        routes.register(HttpMethod::GET, RoutePattern::parse("/"), EditorRoute::Index);
        routes.register(HttpMethod::GET, collection.clone(), EditorRoute::List);
        routes.register(HttpMethod::POST, collection, EditorRoute::Create);
        routes.register(HttpMethod::GET, item.clone(), EditorRoute::Get);
        routes.register(HttpMethod::PUT, item.clone(), EditorRoute::Update);
        routes.register(HttpMethod::DELETE, item, EditorRoute::Delete);

        Ok(Self {
            store,
            templates,
            routes,
        })
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Handle `req` if it targets an editor route.
    pub fn handle(&self, req: &HttpRequest) -> Option<HttpResponse> {
        let (route, params) = self.routes.resolve(&req.method, &req.path)?;
        let id = params.get("id").map(String::as_str).unwrap_or_default();

        let result = match route {
            EditorRoute::Index => self.index(),
            EditorRoute::List => self.list(req),
            EditorRoute::Get => self.get(req, id),
            EditorRoute::Create => self.create(req),
            EditorRoute::Update => self.update(req, id),
            EditorRoute::Delete => self.delete(id),
        };

        Some(result.unwrap_or_else(|e| failure(&e)))
    }

    fn index(&self) -> Result<HttpResponse, EditorError> {
        let tree = self.store.tree()?;
        Ok(HttpResponse::html(200, self.templates.render_index(&tree)?))
    }

    fn list(&self, req: &HttpRequest) -> Result<HttpResponse, EditorError> {
        let tree = self.store.tree()?;
        if is_htmx(req) {
            return Ok(HttpResponse::html(200, self.templates.render_sidebar(&tree)?));
        }
        Ok(success(200, Some(&tree)))
    }

    fn get(&self, req: &HttpRequest, id: &str) -> Result<HttpResponse, EditorError> {
        let view = self.store.get(id)?;
        if is_htmx(req) {
            return Ok(HttpResponse::html(200, self.templates.render_editor(Some(&view))?));
        }
        Ok(success(200, Some(&view)))
    }

    fn create(&self, req: &HttpRequest) -> Result<HttpResponse, EditorError> {
        let input = parse_input(req)?;
        let id = self.store.create(&input)?;
        Ok(success(201, Some(serde_json::json!({ "id": id })))
            .with_header(TRIGGER_HEADER, REQUESTS_CHANGED))
    }

    fn update(&self, req: &HttpRequest, id: &str) -> Result<HttpResponse, EditorError> {
        let input = parse_input(req)?;
        self.store.update(id, &input)?;
        Ok(success(200, Some(serde_json::json!({ "id": id })))
            .with_header(TRIGGER_HEADER, REQUESTS_CHANGED))
    }

    fn delete(&self, id: &str) -> Result<HttpResponse, EditorError> {
        self.store.delete(id)?;
        Ok(success::<()>(200, None).with_header(TRIGGER_HEADER, REQUESTS_CHANGED))
    }
}

fn is_htmx(req: &HttpRequest) -> bool {
    req.header("HX-Request")
        .is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}

/// Decode a create/update payload, either JSON or an HTML form.
pub fn parse_input(req: &HttpRequest) -> Result<RequestInput, EditorError> {
    let is_json = req
        .header("Content-Type")
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"));

    if is_json {
        return serde_json::from_slice(&req.body)
            .map_err(|e| EditorError::BadRequest(format!("invalid JSON body: {}", e)));
    }

    Ok(parse_form(&req.body))
}

fn parse_form(body: &[u8]) -> RequestInput {
    let fields: Vec<(String, String)> = url::form_urlencoded::parse(body)
        .into_owned()
        .collect();

    let response_status = form_value(&fields, "status_code")
        .trim()
        .parse::<u16>()
        .ok()
        .map(|code| Status {
            code,
            text: form_value(&fields, "status_text").trim().to_string(),
        });

    RequestInput {
        name: form_value(&fields, "name"),
        method: form_value(&fields, "method"),
        url: form_value(&fields, "url"),
        description: form_value(&fields, "example_description"),
        headers: form_pairs(&fields, "req_header_key[]", "req_header_value[]"),
        query_params: form_pairs(&fields, "param_key[]", "param_value[]"),
        body: form_value(&fields, "request_body"),
        response_status,
        response_headers: form_pairs(&fields, "resp_header_key[]", "resp_header_value[]"),
        response_body: form_value(&fields, "response_body"),
    }
}

fn form_value(fields: &[(String, String)], key: &str) -> String {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or_default()
}

fn form_values<'a>(fields: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    fields
        .iter()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .collect()
}

/// Zip repeated `key[]`/`value[]` fields into a mapping, dropping blank keys.
fn form_pairs(
    fields: &[(String, String)],
    keys: &str,
    values: &str,
) -> BTreeMap<String, String> {
    form_values(fields, keys)
        .into_iter()
        .zip(form_values(fields, values))
        .filter(|(k, _)| !k.trim().is_empty())
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> (tempfile::TempDir, Editor) {
        let dir = tempfile::tempdir().unwrap();
        let editor = Editor::new(DocumentStore::new(dir.path())).unwrap();
        (dir, editor)
    }

    fn form(method: &str, path: &str, body: &str) -> HttpRequest {
        HttpRequest::new(method, path)
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body(body.as_bytes().to_vec())
    }

    fn json_body(response: &HttpResponse) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn test_parse_form_pairs() {
        let input = parse_form(
            b"name=Get+User&method=GET&url=%2Fusers%2F%3Aid\
              &req_header_key%5B%5D=Accept&req_header_value%5B%5D=application%2Fjson\
              &req_header_key%5B%5D=&req_header_value%5B%5D=dropped\
              &param_key%5B%5D=page&param_value%5B%5D=1\
              &status_code=201&status_text=Created",
        );
        assert_eq!(input.name, "Get User");
        assert_eq!(input.url, "/users/:id");
        assert_eq!(input.headers.len(), 1);
        assert_eq!(input.headers["Accept"], "application/json");
        assert_eq!(input.query_params["page"], "1");
        assert_eq!(
            input.response_status,
            Some(Status {
                code: 201,
                text: "Created".to_string()
            })
        );
        assert!(input.response_headers.is_empty());
    }

    #[test]
    fn test_parse_form_without_status() {
        let input = parse_form(b"name=X&method=GET&url=%2Fx&status_code=abc");
        assert_eq!(input.response_status, None);
    }

    #[test]
    fn test_create_then_get_json() {
        let (_dir, editor) = editor();

        let response = editor
            .handle(&form(
                "POST",
                "/api/requests",
                "name=Ping&method=GET&url=%2Fping&response_body=%7B%7D",
            ))
            .unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.header(TRIGGER_HEADER), Some(REQUESTS_CHANGED));
        let body = json_body(&response);
        assert_eq!(body["success"], true);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let response = editor
            .handle(&HttpRequest::new("GET", &format!("/api/requests/{}", id)))
            .unwrap();
        assert_eq!(response.status, 200);
        let body = json_body(&response);
        assert_eq!(body["data"]["name"], "Ping");
        assert_eq!(body["data"]["responseStatus"]["code"], 200);
    }

    #[test]
    fn test_htmx_requests_get_html() {
        let (_dir, editor) = editor();
        let id = editor
            .store()
            .create(&RequestInput {
                name: "List Users".to_string(),
                method: "GET".to_string(),
                url: "/users".to_string(),
                ..Default::default()
            })
            .unwrap();

        let sidebar = editor
            .handle(&HttpRequest::new("GET", "/api/requests").with_header("HX-Request", "true"))
            .unwrap();
        assert_eq!(sidebar.status, 200);
        assert!(sidebar.header("Content-Type").unwrap().starts_with("text/html"));
        assert!(String::from_utf8_lossy(&sidebar.body).contains("List Users"));

        let form = editor
            .handle(
                &HttpRequest::new("GET", &format!("/api/requests/{}", id))
                    .with_header("hx-request", "true"),
            )
            .unwrap();
        assert!(String::from_utf8_lossy(&form.body).contains("request-form"));
    }

    #[test]
    fn test_list_json() {
        let (_dir, editor) = editor();
        let response = editor.handle(&HttpRequest::new("GET", "/api/requests")).unwrap();
        let body = json_body(&response);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["name"], "root");
    }

    #[test]
    fn test_error_mapping() {
        let (_dir, editor) = editor();

        let missing = editor
            .handle(&HttpRequest::new("GET", "/api/requests/Z2hvc3QuYnJ1"))
            .unwrap();
        assert_eq!(missing.status, 404);
        let body = json_body(&missing);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let bad = editor
            .handle(&form("POST", "/api/requests", "name=&method=GET&url=%2Fx"))
            .unwrap();
        assert_eq!(bad.status, 400);
        assert_eq!(json_body(&bad)["error"]["code"], "BAD_REQUEST");

        let bad_json = editor
            .handle(
                &HttpRequest::new("POST", "/api/requests")
                    .with_header("Content-Type", "application/json")
                    .with_body(b"{not json".to_vec()),
            )
            .unwrap();
        assert_eq!(bad_json.status, 400);

        let multiline = editor
            .handle(&form(
                "POST",
                "/api/requests",
                "name=X&method=GET&url=%2Fx&example_description=one%0Atwo",
            ))
            .unwrap();
        assert_eq!(multiline.status, 400);
        assert_eq!(json_body(&multiline)["error"]["code"], "BAD_REQUEST");
    }

    #[test]
    fn test_update_and_delete() {
        let (_dir, editor) = editor();
        let id = editor
            .store()
            .create(&RequestInput {
                name: "Ping".to_string(),
                method: "GET".to_string(),
                url: "/ping".to_string(),
                ..Default::default()
            })
            .unwrap();
        let item = format!("/api/requests/{}", id);

        let update = HttpRequest::new("PUT", &item)
            .with_header("Content-Type", "application/json")
            .with_body(br#"{"name":"Ping","method":"GET","url":"/ping","responseBody":"{\"pong\":true}"}"#.to_vec());
        let response = editor.handle(&update).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header(TRIGGER_HEADER), Some(REQUESTS_CHANGED));
        assert_eq!(editor.store().get(&id).unwrap().response_body, "{\"pong\":true}");

        let response = editor.handle(&HttpRequest::new("DELETE", &item)).unwrap();
        assert_eq!(response.status, 200);
        let response = editor.handle(&HttpRequest::new("GET", &item)).unwrap();
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_non_editor_paths_pass_through() {
        let (_dir, editor) = editor();
        assert!(editor.handle(&HttpRequest::new("GET", "/users/1")).is_none());
        assert!(editor.handle(&HttpRequest::new("PATCH", "/api/requests")).is_none());
    }

    #[test]
    fn test_index_page() {
        let (_dir, editor) = editor();
        let response = editor.handle(&HttpRequest::new("GET", "/")).unwrap();
        assert_eq!(response.status, 200);
        assert!(String::from_utf8_lossy(&response.body).contains("<!DOCTYPE html>"));
    }
}
