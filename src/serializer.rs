//! Renders a [`RequestDefinition`] back to canonical `.bru` text.

use crate::document::RequestDefinition;
use crate::parser::LITERAL_DELIMITER;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Serialize a document.
///
/// Block order is fixed: `meta`, the method block, `headers`, `params:query`,
/// `body:json`, then `example`. Empty mappings and an empty request body are
/// omitted; the example block is always written.
pub fn serialize(doc: &RequestDefinition) -> String {
    let mut out = String::new();

    out.push_str("meta {\n");
    let _ = writeln!(out, "  name: {}", doc.meta.name);
    let _ = writeln!(out, "  type: {}", doc.meta.kind);
    let _ = writeln!(out, "  seq: {}", doc.meta.seq);
    out.push_str("}\n\n");

    if let Some(method) = doc.method {
        let _ = writeln!(out, "{} {{", method.block_name());
        let _ = writeln!(out, "  url: {}", doc.url);
        out.push_str("}\n\n");
    }

    if !doc.headers.is_empty() {
        write_map_block(&mut out, "headers", &doc.headers);
    }
    if !doc.query_params.is_empty() {
        write_map_block(&mut out, "params:query", &doc.query_params);
    }
    if !doc.body.is_empty() {
        out.push_str("body:json {\n");
        write_literal(&mut out, "  ", &doc.body);
        out.push_str("}\n\n");
    }

    write_example(&mut out, doc);
    out
}

fn write_map_block(out: &mut String, name: &str, entries: &BTreeMap<String, String>) {
    let _ = writeln!(out, "{} {{", name);
    for (key, value) in entries {
        let _ = writeln!(out, "  {}: {}", key, value);
    }
    out.push_str("}\n\n");
}

/// Write `content` verbatim between delimiter lines indented by `indent`.
fn write_literal(out: &mut String, indent: &str, content: &str) {
    let _ = writeln!(out, "{}{}", indent, LITERAL_DELIMITER);
    out.push_str(content);
    out.push('\n');
    let _ = writeln!(out, "{}{}", indent, LITERAL_DELIMITER);
}

fn write_example(out: &mut String, doc: &RequestDefinition) {
    let example = &doc.example;
    let response = &example.response;

    out.push_str("example {\n");
    let _ = writeln!(out, "  name: {}", example.name);
    if !example.description.is_empty() {
        let _ = writeln!(out, "  description: {}", example.description);
    }
    out.push('\n');

    out.push_str("  request: {\n");
    let _ = writeln!(out, "    url: {}", example.request.url);
    let _ = writeln!(out, "    method: {}", example.request.method);
    let _ = writeln!(out, "    mode: {}", example.request.mode);
    out.push_str("  }\n\n");

    out.push_str("  response: {\n");
    if !response.headers.is_empty() {
        out.push_str("    headers: {\n");
        for (key, value) in &response.headers {
            let _ = writeln!(out, "      {}: {}", key, value);
        }
        out.push_str("    }\n\n");
    }

    out.push_str("    status: {\n");
    let _ = writeln!(out, "      code: {}", response.status.code);
    let _ = writeln!(out, "      text: {}", response.status.text);
    out.push_str("    }\n\n");

    out.push_str("    body: {\n");
    let _ = writeln!(out, "      type: {}", response.body.kind);
    let _ = writeln!(out, "      content: {}", LITERAL_DELIMITER);
    out.push_str(&response.body.content);
    out.push('\n');
    let _ = writeln!(out, "      {}", LITERAL_DELIMITER);
    out.push_str("    }\n");

    out.push_str("  }\n");
    out.push_str("}\n");
}
