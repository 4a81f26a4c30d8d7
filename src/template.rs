//! HTML views for the editor.
//!
//! Uses Handlebars with templates embedded in the binary.

use crate::store::RequestView;
use crate::tree::TreeNode;
use handlebars::Handlebars;
use serde::Serialize;

const INDEX: &str = include_str!("../templates/index.hbs");
const SIDEBAR: &str = include_str!("../templates/sidebar.hbs");
const EDITOR: &str = include_str!("../templates/editor.hbs");
const TREE_NODE: &str = include_str!("../templates/tree_node.hbs");

/// Template engine for the editor pages and partials.
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

const METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

#[derive(Debug, Serialize)]
struct PageContext<'a> {
    tree: Option<&'a TreeNode>,
    request: Option<&'a RequestView>,
    methods: [&'static str; 5],
}

impl<'a> PageContext<'a> {
    fn new(tree: Option<&'a TreeNode>, request: Option<&'a RequestView>) -> Self {
        Self {
            tree,
            request,
            methods: METHODS,
        }
    }
}

impl TemplateEngine {
    /// Register all templates and helpers.
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);

        handlebars.register_helper("displayUrl", Box::new(display_url_helper));
        handlebars.register_helper("displayParam", Box::new(display_param_helper));
        handlebars.register_helper("eq", Box::new(eq_helper));

        handlebars.register_partial("tree_node", TREE_NODE)?;
        handlebars.register_partial("sidebar", SIDEBAR)?;
        handlebars.register_partial("editor", EDITOR)?;
        handlebars.register_template_string("index", INDEX)?;
        handlebars.register_template_string("sidebar", SIDEBAR)?;
        handlebars.register_template_string("editor", EDITOR)?;

        Ok(Self { handlebars })
    }

    /// Full page with the sidebar and an empty editor.
    pub fn render_index(&self, tree: &TreeNode) -> Result<String, handlebars::RenderError> {
        self.handlebars
            .render("index", &PageContext::new(Some(tree), None))
    }

    /// Sidebar fragment.
    pub fn render_sidebar(&self, tree: &TreeNode) -> Result<String, handlebars::RenderError> {
        self.handlebars
            .render("sidebar", &PageContext::new(Some(tree), None))
    }

    /// Editor form, blank when `request` is `None`.
    pub fn render_editor(
        &self,
        request: Option<&RequestView>,
    ) -> Result<String, handlebars::RenderError> {
        self.handlebars
            .render("editor", &PageContext::new(None, request))
    }
}

/// Show `{param}` segments as `[param]`, with a leading slash.
pub fn display_url(url: &str) -> String {
    let replaced: String = url
        .chars()
        .map(|c| match c {
            '{' => '[',
            '}' => ']',
            c => c,
        })
        .collect();

    if replaced.is_empty() || replaced.starts_with('/') {
        replaced
    } else {
        format!("/{}", replaced)
    }
}

/// Wrap a parameter name as `[name]`.
pub fn display_param(name: &str) -> String {
    format!("[{}]", name)
}

// Custom Handlebars helpers

fn display_url_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let url = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&handlebars::html_escape(&display_url(url)))?;
    Ok(())
}

fn display_param_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let name = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(&handlebars::html_escape(&display_param(name)))?;
    Ok(())
}

fn eq_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    let left = h.param(0).map(|v| v.value());
    let right = h.param(1).map(|v| v.value());
    if left.is_some() && left == right {
        out.write("selected")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{HttpMethod, Status};
    use std::collections::BTreeMap;

    fn tree() -> TreeNode {
        let mut users = TreeNode::folder("users", false);
        let mut id = TreeNode::folder("id", true);
        id.children.push(TreeNode::request(
            "User Posts",
            Some(HttpMethod::GET),
            "/users/{id}/posts",
            "dXNlcnM",
        ));
        users.children.push(id);

        let mut root = TreeNode::folder("root", false);
        root.children.push(users);
        root
    }

    #[test]
    fn test_display_url() {
        assert_eq!(display_url("users/{id}"), "/users/[id]");
        assert_eq!(display_url("/ping"), "/ping");
        assert_eq!(display_url(""), "");
        assert_eq!(display_param("id"), "[id]");
    }

    #[test]
    fn test_sidebar_renders_nested_tree() {
        let engine = TemplateEngine::new().unwrap();
        let html = engine.render_sidebar(&tree()).unwrap();

        assert!(html.contains("users"));
        assert!(html.contains("[id]"));
        assert!(html.contains("User Posts"));
        assert!(html.contains("/users/[id]/posts"));
        assert!(html.contains("/api/requests/dXNlcnM"));
    }

    #[test]
    fn test_index_includes_sidebar() {
        let engine = TemplateEngine::new().unwrap();
        let html = engine.render_index(&tree()).unwrap();
        assert!(html.contains("<html"));
        assert!(html.contains("User Posts"));
    }

    #[test]
    fn test_editor_form() {
        let engine = TemplateEngine::new().unwrap();
        let view = RequestView {
            id: "abc".to_string(),
            name: "Create <Order>".to_string(),
            method: Some(HttpMethod::POST),
            url: "/orders".to_string(),
            description: String::new(),
            headers: [("X-Trace".to_string(), "on".to_string())].into_iter().collect(),
            query_params: BTreeMap::new(),
            body: String::new(),
            response_status: Status {
                code: 201,
                text: "Created".to_string(),
            },
            response_headers: BTreeMap::new(),
            response_body: "{\"ok\":true}".to_string(),
        };

        let html = engine.render_editor(Some(&view)).unwrap();
        assert!(html.contains("hx-put=\"/api/requests/abc\""));
        assert!(html.contains("Create &lt;Order&gt;"));
        assert!(html.contains("value=\"201\""));
        assert!(html.contains("X-Trace"));
        assert!(html.contains("<option value=\"POST\" selected>"));

        let blank = engine.render_editor(None).unwrap();
        assert!(blank.contains("hx-post=\"/api/requests\""));
    }
}
