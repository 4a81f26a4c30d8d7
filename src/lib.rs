//! Bruno Mock Server
//!
//! Serves mock HTTP responses from a directory of Bruno `.bru` request
//! documents, and optionally a browser editor for those documents.
//!
//! # Features
//!
//! - **Collection Loading**: Every `.bru` file with a method, URL and example
//!   response becomes a route
//! - **Environments**: `{{var}}` placeholders resolve from
//!   `environments/<env>.bru`
//! - **Path Parameters**: `:id` and `{id}` segments are captured and
//!   substituted into `{{id}}` placeholders of the example body
//! - **Editor**: Browse, create, update and delete documents from the browser
//!
//! # Example Document
//!
//! ```text
//! meta {
//!   name: Get User
//! }
//!
//! get {
//!   url: {{baseUrl}}/users/:id
//! }
//!
//! example {
//!   response: {
//!     status: {
//!       code: 200
//!     }
//!     body: {
//!       type: json
//!       content: '''
//!         {"id": "{{id}}"}
//!       '''
//!     }
//!   }
//! }
//! ```

pub mod codec;
pub mod config;
pub mod document;
pub mod editor;
pub mod environment;
pub mod loader;
pub mod matcher;
pub mod mock;
pub mod parser;
pub mod pattern;
pub mod serializer;
pub mod server;
pub mod store;
pub mod template;
pub mod tree;

pub use config::ServerConfig;
pub use document::{HttpMethod, RequestDefinition};
pub use parser::parse_document;
pub use serializer::serialize;
pub use server::{App, HttpRequest, HttpResponse};
pub use store::DocumentStore;
