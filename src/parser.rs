//! Parser for the `.bru` block format.
//!
//! A document is a sequence of named blocks:
//!
//! ```text
//! meta {
//!   name: Get User
//!   seq: 1
//! }
//!
//! get {
//!   url: {{baseUrl}}/users/:id
//! }
//! ```
//!
//! Blocks nest (`example` holds `request:` and `response:`), so a block's inner
//! text is scanned again with the same procedure. Text between `'''`
//! delimiters is literal: braces inside it are not counted, which is what lets
//! a JSON body sit inside an outer block.

use crate::document::{
    Example, ExampleBody, ExampleRequest, ExampleResponse, HttpMethod, Meta, RequestDefinition,
    Status,
};
use std::collections::BTreeMap;

/// Delimiter wrapping literal body content.
pub const LITERAL_DELIMITER: &str = "'''";

/// Errors returned by [`parse_document`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The text holds no complete block at all.
    #[error("document contains no blocks")]
    Empty,
}

/// Top-level contents of a span of DSL text.
///
/// Only the outermost level is decoded; nested blocks are kept as raw spans of
/// the input and can be handed back to [`Section::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section<'a> {
    fields: Vec<(&'a str, &'a str)>,
    blocks: Vec<(&'a str, &'a str)>,
}

/// The block currently being accumulated.
struct Frame<'a> {
    name: &'a str,
    body_start: usize,
    depth: usize,
}

impl<'a> Section<'a> {
    /// Scan `text` line by line and split it into fields and blocks.
    ///
    /// A block whose braces never balance is dropped.
    pub fn parse(text: &'a str) -> Self {
        let mut section = Section::default();
        let mut frame: Option<Frame<'a>> = None;
        let mut in_literal = false;
        let mut offset = 0;

        for line in text.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();

            if in_literal {
                if line.contains(LITERAL_DELIMITER) {
                    in_literal = false;
                }
                continue;
            }

            if let Some(open) = frame.as_mut() {
                if let Some(end) = advance(&mut open.depth, &mut in_literal, line) {
                    section
                        .blocks
                        .push((open.name, &text[open.body_start..line_start + end]));
                    frame = None;
                }
                continue;
            }

            match block_opener(line) {
                Some((name, brace)) => {
                    let body_start = line_start + brace + 1;
                    let mut depth = 1;
                    match advance(&mut depth, &mut in_literal, &line[brace + 1..]) {
                        Some(end) => section
                            .blocks
                            .push((name, &text[body_start..body_start + end])),
                        None => {
                            frame = Some(Frame {
                                name,
                                body_start,
                                depth,
                            })
                        }
                    }
                }
                None => {
                    if let Some(field) = field(line) {
                        section.fields.push(field);
                    }
                    in_literal = opens_literal(line);
                }
            }
        }

        section
    }

    /// Raw inner text of the named block. Later blocks shadow earlier ones.
    pub fn block(&self, name: &str) -> Option<&'a str> {
        self.blocks
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, body)| *body)
    }

    /// Names of all complete blocks, in document order.
    pub fn block_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.blocks.iter().map(|(name, _)| *name)
    }

    /// Value of a `key: value` field. Later fields shadow earlier ones.
    pub fn field(&self, key: &str) -> Option<&'a str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| *value)
    }

    /// All fields as an owned mapping.
    pub fn field_map(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.blocks.is_empty()
    }
}

/// Feed one line (or the remainder of an opener line) into an open block.
///
/// Returns the byte offset of the brace that closes the block, if any.
/// Braces inside `'''` literals are ignored; an unclosed literal switches the
/// scanner into literal mode for the following lines.
fn advance(depth: &mut usize, in_literal: &mut bool, segment: &str) -> Option<usize> {
    let mut rest = segment;
    let mut consumed = 0;

    loop {
        let delimiter = rest.find(LITERAL_DELIMITER);
        let counted = &rest[..delimiter.unwrap_or(rest.len())];

        for (i, ch) in counted.char_indices() {
            match ch {
                '{' => *depth += 1,
                '}' => {
                    *depth -= 1;
                    if *depth == 0 {
                        return Some(consumed + i);
                    }
                }
                _ => {}
            }
        }

        let start = delimiter?;
        let literal = &rest[start + LITERAL_DELIMITER.len()..];
        match literal.find(LITERAL_DELIMITER) {
            Some(len) => {
                let skip = start + 2 * LITERAL_DELIMITER.len() + len;
                consumed += skip;
                rest = &rest[skip..];
            }
            None => {
                *in_literal = true;
                return None;
            }
        }
    }
}

/// Detect `name {` at the start of a line.
///
/// The opening brace is the first `{` that is not part of a `{{placeholder}}`,
/// and the name before it must be a single non-empty word. A trailing colon is
/// stripped from the name.
fn block_opener(line: &str) -> Option<(&str, usize)> {
    let bytes = line.as_bytes();
    let brace = (0..bytes.len()).find(|&i| {
        bytes[i] == b'{' && bytes.get(i + 1) != Some(&b'{') && (i == 0 || bytes[i - 1] != b'{')
    })?;

    let head = &line[..brace];
    if head.contains(LITERAL_DELIMITER) {
        return None;
    }
    let name = head.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name.strip_suffix(':').unwrap_or(name), brace))
}

fn field(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.trim().split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn opens_literal(line: &str) -> bool {
    line.matches(LITERAL_DELIMITER).count() % 2 == 1
}

/// Read the value of `key`, honouring `'''` literals.
///
/// The opening delimiter may follow the key on the same line or sit alone on
/// the next line. Every line after it is kept verbatim until a line holding the
/// closing delimiter.
pub fn literal_field(text: &str, key: &str) -> Option<String> {
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let Some((k, rest)) = line.trim().split_once(':') else {
            continue;
        };
        if k.trim() != key {
            continue;
        }

        let rest = rest.trim();
        if let Some(inline) = rest.strip_prefix(LITERAL_DELIMITER) {
            if let Some(end) = inline.find(LITERAL_DELIMITER) {
                return Some(inline[..end].to_string());
            }
            let mut captured = capture_literal(&mut lines);
            if !inline.is_empty() {
                captured.insert(0, inline);
            }
            return Some(captured.join("\n"));
        }
        if !rest.is_empty() {
            return Some(rest.to_string());
        }

        return match lines.next() {
            Some(next) if next.trim().starts_with(LITERAL_DELIMITER) => {
                Some(capture_literal(&mut lines).join("\n"))
            }
            _ => Some(String::new()),
        };
    }

    None
}

fn capture_literal<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut captured = Vec::new();
    for line in lines {
        if line.contains(LITERAL_DELIMITER) {
            break;
        }
        captured.push(line);
    }
    captured
}

/// Body of a `body:json` block: a `'''` literal, or the raw trimmed text.
fn request_body(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.by_ref().map(str::trim).find(|l| !l.is_empty());

    match first {
        Some(line) if line.starts_with(LITERAL_DELIMITER) => capture_literal(&mut lines).join("\n"),
        Some(_) => text.trim().to_string(),
        None => String::new(),
    }
}

fn parse_number<T: std::str::FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or_default()
}

fn owned(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn parse_meta(text: &str) -> Meta {
    let section = Section::parse(text);
    Meta {
        name: owned(section.field("name")),
        kind: owned(section.field("type")),
        seq: parse_number(section.field("seq")),
    }
}

fn parse_example(text: &str) -> Example {
    let section = Section::parse(text);

    let request = section
        .block("request")
        .map(|body| {
            let request = Section::parse(body);
            ExampleRequest {
                url: owned(request.field("url")),
                method: owned(request.field("method")),
                mode: owned(request.field("mode")),
            }
        })
        .unwrap_or_default();

    let response = section
        .block("response")
        .map(parse_example_response)
        .unwrap_or_default();

    Example {
        name: owned(section.field("name")),
        description: owned(section.field("description")),
        request,
        response,
    }
}

fn parse_example_response(text: &str) -> ExampleResponse {
    let section = Section::parse(text);

    let headers = section
        .block("headers")
        .map(|body| Section::parse(body).field_map())
        .unwrap_or_default();

    let status = section
        .block("status")
        .map(|body| {
            let status = Section::parse(body);
            Status {
                code: parse_number(status.field("code")),
                text: owned(status.field("text")),
            }
        })
        .unwrap_or_default();

    let body = section
        .block("body")
        .map(|body| ExampleBody {
            kind: owned(Section::parse(body).field("type")),
            content: literal_field(body, "content").unwrap_or_default(),
        })
        .unwrap_or_default();

    ExampleResponse {
        headers,
        status,
        body,
    }
}

/// Parse one `.bru` document.
///
/// Missing blocks leave the matching fields at their defaults; deciding
/// whether such a document is usable is left to the caller.
pub fn parse_document(text: &str) -> Result<RequestDefinition, ParseError> {
    let root = Section::parse(text);
    if root.block_names().next().is_none() {
        return Err(ParseError::Empty);
    }

    let mut doc = RequestDefinition::default();

    if let Some(meta) = root.block("meta") {
        doc.meta = parse_meta(meta);
    }

    let method_block = HttpMethod::ALL
        .into_iter()
        .find_map(|method| root.block(method.block_name()).map(|body| (method, body)));
    if let Some((method, body)) = method_block {
        doc.method = Some(method);
        doc.url = owned(Section::parse(body).field("url"));
    }

    if let Some(headers) = root.block("headers") {
        doc.headers = Section::parse(headers).field_map();
    }
    if let Some(params) = root.block("params:query") {
        doc.query_params = Section::parse(params).field_map();
    }
    if let Some(body) = root.block("body:json") {
        doc.body = request_body(body);
    }
    if let Some(example) = root.block("example") {
        doc.example = parse_example(example);
    }

    Ok(doc)
}
