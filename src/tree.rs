//! Navigation tree for the editor sidebar.
//!
//! Documents are grouped by URL segment: `/users/:id/posts` lands in folder
//! `users`, then dynamic folder `id`, as a request leaf named after the
//! document.

use crate::codec;
use crate::document::{HttpMethod, RequestDefinition};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Request,
}

/// A folder or request in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub is_dynamic: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn folder(name: impl Into<String>, is_dynamic: bool) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
            method: None,
            url: None,
            id: None,
            is_dynamic,
            children: Vec::new(),
        }
    }

    pub fn request(
        name: impl Into<String>,
        method: Option<HttpMethod>,
        url: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Request,
            method,
            url: Some(url.into()),
            id: Some(id.into()),
            is_dynamic: false,
            children: Vec::new(),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Number of request leaves below this node.
    pub fn request_count(&self) -> usize {
        match self.kind {
            NodeKind::Request => 1,
            NodeKind::Folder => self.children.iter().map(TreeNode::request_count).sum(),
        }
    }

    fn child_folder(&mut self, name: &str, is_dynamic: bool) -> &mut TreeNode {
        let index = match self
            .children
            .iter()
            .position(|child| child.is_folder() && child.name == name)
        {
            Some(index) => {
                self.children[index].is_dynamic |= is_dynamic;
                index
            }
            None => {
                self.children.push(TreeNode::folder(name, is_dynamic));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    fn insert_request(&mut self, leaf: TreeNode) {
        let existing = self.children.iter_mut().find(|child| {
            child.kind == NodeKind::Request && child.method == leaf.method && child.url == leaf.url
        });

        match existing {
            Some(current) => {
                if leaf.id < current.id {
                    *current = leaf;
                }
            }
            None => self.children.push(leaf),
        }
    }

    fn sort(&mut self) {
        self.children.sort_by(compare_nodes);
        for child in &mut self.children {
            child.sort();
        }
    }
}

fn compare_nodes(a: &TreeNode, b: &TreeNode) -> Ordering {
    a.kind
        .cmp(&b.kind)
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.method.cmp(&b.method))
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.id.cmp(&b.id))
}

/// Split a document URL into path segments.
///
/// A leading slash and a leading `{{...}}` placeholder are dropped, and empty
/// segments are skipped.
pub fn url_segments(url: &str) -> Vec<&str> {
    let mut rest = url.trim().trim_start_matches('/');
    if let Some(after) = rest.strip_prefix("{{") {
        if let Some(end) = after.find("}}") {
            rest = &after[end + 2..];
        }
    }

    rest.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Bare name of a path segment, and whether it is a parameter.
fn segment_name(segment: &str) -> (&str, bool) {
    if let Some(name) = segment.strip_prefix(':') {
        return (name, true);
    }
    if let Some(inner) = segment.strip_prefix('{') {
        return (inner.strip_suffix('}').unwrap_or(inner), true);
    }
    (segment, false)
}

/// Group documents into a tree rooted at a folder named `root`.
///
/// The result does not depend on the order of `docs`.
pub fn build_tree(docs: &[RequestDefinition], base_dir: &Path) -> TreeNode {
    let mut root = TreeNode::folder("root", false);

    for doc in docs {
        let segments = url_segments(&doc.url);
        let id = codec::id_for(base_dir, &doc.file_path);

        let mut node = &mut root;
        if let Some((_, folders)) = segments.split_last() {
            for segment in folders {
                let (name, is_dynamic) = segment_name(segment);
                node = node.child_folder(name, is_dynamic);
            }
        }

        let name = if doc.meta.name.is_empty() {
            segments.last().copied().unwrap_or(doc.url.as_str())
        } else {
            doc.meta.name.as_str()
        };
        node.insert_request(TreeNode::request(name, doc.method, doc.url.as_str(), id));
    }

    root.sort();
    root
}
