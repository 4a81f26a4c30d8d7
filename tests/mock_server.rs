//! End-to-end behaviour of the mock server, driven through `App::handle`.

use bru_mock_server::{App, HttpRequest, ServerConfig};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

const GET_USER: &str = r#"meta {
  name: Get User
  type: http
  seq: 1
}

get {
  url: {{baseUrl}}/users/:id
}

example {
  response: {
    status: {
      code: 201
      text: Created
    }
    body: {
      type: json
      content: '''
        {"id": "{{id}}"}
      '''
    }
  }
}
"#;

const NO_EXAMPLE: &str = "meta {\n  name: Draft\n}\n\npost {\n  url: /drafts\n}\n";

fn config(dir: &Path, ui: bool) -> ServerConfig {
    ServerConfig {
        dir: dir.to_path_buf(),
        ui,
        ..Default::default()
    }
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[test]
fn test_collection_routes() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("users")).unwrap();
    fs::write(dir.path().join("users/get-user.bru"), GET_USER).unwrap();
    fs::write(dir.path().join("draft.bru"), NO_EXAMPLE).unwrap();
    fs::write(dir.path().join("collection.bru"), "meta {\n  name: Collection\n}\n").unwrap();

    let app = App::build(&config(dir.path(), false)).unwrap();
    assert_eq!(app.route_count(), 1);

    let response = app.handle(&HttpRequest::new("GET", "/users/42"));
    assert_eq!(response.status, 201);
    assert_eq!(json_body(&response.body), json!({"id": "42"}));

    // Documents without an example are skipped by default.
    let response = app.handle(&HttpRequest::new("POST", "/drafts"));
    assert_eq!(response.status, 404);
    assert_eq!(
        json_body(&response.body),
        json!({"error": "Route not found", "path": "/drafts", "method": "POST"})
    );
}

#[test]
fn test_editor_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::build(&config(dir.path(), true)).unwrap();

    let create = HttpRequest::new("POST", "/api/requests")
        .with_header("Content-Type", "application/json")
        .with_body(
            serde_json::to_vec(&json!({
                "name": "Get Order",
                "method": "GET",
                "url": "/orders/:id",
                "responseBody": "{\"order\": \"{{id}}\"}"
            }))
            .unwrap(),
        );
    let response = app.handle(&create);
    assert_eq!(response.status, 201);
    assert_eq!(response.header("HX-Trigger"), Some("requestsChanged"));
    let id = json_body(&response.body)["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.handle(&HttpRequest::new("GET", &format!("/api/requests/{}", id)));
    assert_eq!(response.status, 200);
    let view = json_body(&response.body);
    assert_eq!(view["data"]["name"], "Get Order");
    assert_eq!(view["data"]["url"], "/orders/:id");

    // Mock routes are registered at startup, so a fresh app serves the new file.
    let restarted = App::build(&config(dir.path(), true)).unwrap();
    let response = restarted.handle(&HttpRequest::new("GET", "/orders/9"));
    assert_eq!(response.status, 200);
    assert_eq!(json_body(&response.body), json!({"order": "9"}));

    let response = app.handle(&HttpRequest::new("DELETE", &format!("/api/requests/{}", id)));
    assert_eq!(response.status, 200);

    let response = app.handle(&HttpRequest::new("GET", &format!("/api/requests/{}", id)));
    assert_eq!(response.status, 404);
    assert_eq!(json_body(&response.body)["error"]["code"], "NOT_FOUND");
}

#[test]
fn test_editor_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::build(&config(dir.path(), true)).unwrap();

    let id = bru_mock_server::codec::encode(Path::new("../outside.bru"));
    let response = app.handle(&HttpRequest::new("GET", &format!("/api/requests/{}", id)));
    assert_eq!(response.status, 400);
}
