//! HTTP front door.
//!
//! [`App`] decides what to answer for a request without touching a socket;
//! [`serve`] feeds it requests from a `tiny_http` listener.

use crate::config::{ServerConfig, Settings};
use crate::editor::Editor;
use crate::environment::{self, Environment};
use crate::loader;
use crate::matcher::{RouteTable, Routes};
use crate::mock::{self, MockEngine, MockHandler, MockResponse};
use crate::store::DocumentStore;
use anyhow::Context;
use serde::Serialize;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A request as seen by [`App::handle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a request for `target`, which may carry a `?query`.
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method: method.to_ascii_uppercase(),
            path: path.to_string(),
            query,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A response produced by [`App::handle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(serde_json::to_vec(value).unwrap_or_default())
    }

    pub fn html(status: u16, html: String) -> Self {
        Self::new(status)
            .with_header("Content-Type", "text/html; charset=utf-8")
            .with_body(html.into_bytes())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl From<MockResponse> for HttpResponse {
    fn from(response: MockResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body.map(String::into_bytes).unwrap_or_default(),
        }
    }
}

/// The mock server: editor routes, mock routes, then a JSON 404.
pub struct App {
    settings: Settings,
    editor: Option<Editor>,
    routes: RouteTable<MockHandler>,
}

impl App {
    /// Load the collection and build every route.
    ///
    /// A missing collection directory or broken editor templates are fatal. A
    /// missing or unreadable environment only costs the substitutions.
    pub fn build(config: &ServerConfig) -> anyhow::Result<Self> {
        let settings = config.settings.clone();

        let env = match environment::load_environment(&config.env, &config.dir) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "Continuing without environment variables");
                Environment::empty(config.env.as_str())
            }
        };
        info!(env = %env.name(), vars = env.len(), "Loaded environment");

        let docs = loader::load_documents(&config.dir, &settings).with_context(|| {
            format!("Failed to load collection from {}", config.dir.display())
        })?;

        let engine = Arc::new(MockEngine::new(settings.default_content_type.clone()));
        let mut routes = RouteTable::new();
        let registered = mock::register_routes(&mut routes, docs, &env, engine);
        info!(
            routes = routes.len(),
            documents = registered,
            dir = %config.dir.display(),
            "Mock routes ready"
        );

        let editor = if config.ui {
            let store = DocumentStore::with_settings(config.dir.clone(), settings.clone());
            Some(Editor::new(store).context("Failed to initialize editor templates")?)
        } else {
            None
        };

        Ok(Self {
            settings,
            editor,
            routes,
        })
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn has_editor(&self) -> bool {
        self.editor.is_some()
    }

    pub fn handle(&self, req: &HttpRequest) -> HttpResponse {
        if let Some(response) = self.editor.as_ref().and_then(|editor| editor.handle(req)) {
            debug!(method = %req.method, path = %req.path, status = response.status, "Editor request");
            return response;
        }

        if let Some((handler, params)) = self.routes.resolve(&req.method, &req.path) {
            let response = handler(&params);
            if self.settings.log_matches {
                info!(
                    method = %req.method,
                    path = %req.path,
                    status = response.status,
                    "Mock request matched"
                );
            }
            return response.into();
        }

        if self.settings.log_unmatched {
            warn!(method = %req.method, path = %req.path, "No route matched");
        }
        HttpResponse::json(
            404,
            &serde_json::json!({
                "error": "Route not found",
                "path": req.path,
                "method": req.method,
            }),
        )
    }
}

/// Bind the listener.
pub fn bind(addr: SocketAddr) -> anyhow::Result<tiny_http::Server> {
    tiny_http::Server::http(addr)
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))
}

/// Answer requests one at a time until the server is unblocked.
pub fn serve(app: &App, server: &tiny_http::Server) {
    for mut request in server.incoming_requests() {
        let req = match read_request(&mut request) {
            Ok(req) => req,
            Err(e) => {
                warn!(error = %e, "Failed to read request body");
                let response = tiny_http::Response::from_string("Bad Request")
                    .with_status_code(tiny_http::StatusCode(400));
                if let Err(e) = request.respond(response) {
                    debug!(error = %e, "Failed to send response");
                }
                continue;
            }
        };

        let response = app.handle(&req);
        if let Err(e) = write_response(request, response) {
            error!(method = %req.method, path = %req.path, error = %e, "Failed to send response");
        }
    }
    info!("Listener stopped");
}

fn read_request(request: &mut tiny_http::Request) -> io::Result<HttpRequest> {
    let mut body = Vec::new();
    request.as_reader().read_to_end(&mut body)?;

    let mut req = HttpRequest::new(&request.method().to_string(), request.url()).with_body(body);
    req.headers = request
        .headers()
        .iter()
        .map(|h| (h.field.to_string(), h.value.to_string()))
        .collect();
    Ok(req)
}

fn write_response(request: tiny_http::Request, response: HttpResponse) -> io::Result<()> {
    let mut out = tiny_http::Response::from_data(response.body)
        .with_status_code(tiny_http::StatusCode(response.status));
    for (name, value) in &response.headers {
        match tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => out.add_header(header),
            Err(()) => warn!(header = %name, "Dropping invalid response header"),
        }
    }
    request.respond(out)
}
