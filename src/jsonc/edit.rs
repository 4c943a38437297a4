//! In-place structural edits.
//!
//! Edits are computed as byte ranges against the original text and spliced in,
//! so everything outside the touched ranges is returned unchanged.

use serde_json::{Map, Value};
use thiserror::Error;

use super::parser::{parse_tree, Node, NodeKind, ParseError};
use super::scanner::{next_significant, Scanner, TokenKind};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("cannot parse document: {0}")]
    Parse(#[from] ParseError),
    #[error("cannot edit `{path}`: not an object")]
    NotAnObject { path: String },
    #[error("empty property path")]
    EmptyPath,
}

/// Set `path` to `value`, creating missing intermediate objects.
pub fn set_value(text: &str, path: &[&str], value: &Value) -> Result<String, EditError> {
    if path.is_empty() {
        return Err(EditError::EmptyPath);
    }
    let layout = Layout::detect(text);

    let Some(root) = parse_tree(text)? else {
        return Ok(insert_root(text, &nest(path, value), &layout));
    };
    let inline_root = is_single_line(text, &root) && !root.children.is_empty();

    let mut node = &root;
    for (depth, key) in path.iter().enumerate() {
        if node.kind != NodeKind::Object {
            return Err(EditError::NotAnObject {
                path: display_path(&path[..depth]),
            });
        }
        match node.property(text, key) {
            Some(prop) => {
                let Some(existing) = prop.value() else {
                    return Err(EditError::NotAnObject {
                        path: display_path(&path[..=depth]),
                    });
                };
                if depth + 1 == path.len() {
                    let content = if is_single_line(text, node) {
                        value.to_string()
                    } else {
                        render(value, indent_of_line(text, existing.offset), &layout)
                    };
                    return Ok(apply(
                        text,
                        vec![Edit::replace(existing.offset, existing.length, content)],
                    ));
                }
                node = existing;
            }
            None => {
                let inserted = nest(&path[depth + 1..], value);
                let edits = insert_property(text, node, key, &inserted, &layout, inline_root);
                return Ok(apply(text, edits));
            }
        }
    }

    Ok(text.to_string())
}

/// Remove every property at `path`. A missing path leaves the text unchanged.
pub fn remove_value(text: &str, path: &[&str]) -> Result<String, EditError> {
    let Some((last, parents)) = path.split_last() else {
        return Err(EditError::EmptyPath);
    };

    let mut current = text.to_string();
    loop {
        let Some(root) = parse_tree(&current)? else {
            return Ok(current);
        };
        let Some(object) = walk(&root, &current, parents) else {
            return Ok(current);
        };
        let Some(index) = object.property_index(&current, last) else {
            return Ok(current);
        };

        let updated = apply(&current, remove_property(&current, object, index));
        if updated == current {
            return Ok(current);
        }
        current = updated;
    }
}

/// Document with no value: the new root goes after the last comment, keeping it.
fn insert_root(text: &str, root: &Value, layout: &Layout) -> String {
    let rendered = render(root, "", layout);

    let mut at = None;
    let mut scanner = Scanner::new(text);
    loop {
        let token = scanner.next_token();
        match token.kind {
            TokenKind::LineComment | TokenKind::BlockComment => at = Some(token.end()),
            TokenKind::LineBreak if at == Some(token.offset) => at = Some(token.end()),
            TokenKind::Eof => break,
            _ => {}
        }
    }

    let Some(at) = at else {
        return format!("{rendered}{}", layout.eol);
    };
    let mut out = text[..at].to_string();
    if !out.ends_with('\n') {
        out.push_str(layout.eol);
    }
    out.push_str(&rendered);
    out.push_str(layout.eol);
    out.push_str(&text[at..]);
    out
}

fn walk<'n>(root: &'n Node, text: &str, path: &[&str]) -> Option<&'n Node> {
    let mut node = root;
    for key in path {
        if node.kind != NodeKind::Object {
            return None;
        }
        node = node.property(text, key)?.value()?;
    }
    (node.kind == NodeKind::Object).then_some(node)
}

fn insert_property(
    text: &str,
    object: &Node,
    key: &str,
    value: &Value,
    layout: &Layout,
    inline_root: bool,
) -> Vec<Edit> {
    let key_json = Value::from(key).to_string();
    let open = object.offset;
    let close = object.end() - 1;

    let Some(last) = object.children.last() else {
        if inline_root {
            let content = format!("{key_json}: {value}");
            return if text[open + 1..close].trim().is_empty() {
                vec![Edit::replace(open + 1, close - open - 1, content)]
            } else {
                vec![Edit::insert(close, content)]
            };
        }

        let base = indent_of_line(text, open);
        let indent = format!("{base}{}", layout.unit);
        let rendered = format!("{key_json}: {}", render(value, &indent, layout));

        // Keep comments that sit inside the empty object.
        let mut at = open + 1;
        let mut scanner = Scanner::at(text, open + 1);
        loop {
            let token = scanner.next_token();
            if token.offset >= close || !token.kind.is_trivia() {
                break;
            }
            if matches!(token.kind, TokenKind::LineComment | TokenKind::BlockComment) {
                at = token.end();
            }
        }

        return if text[at..close].contains('\n') {
            vec![Edit::insert(at, format!("{}{indent}{rendered}", layout.eol))]
        } else {
            vec![Edit::replace(
                at,
                close - at,
                format!("{eol}{indent}{rendered}{eol}{base}", eol = layout.eol),
            )]
        };
    };

    let after_last = next_significant(text, last.end());
    let trailing_comma = after_last.kind == TokenKind::Comma;

    if is_single_line(text, object) {
        return vec![Edit::insert(last.end(), format!(", {key_json}: {value}"))];
    }

    let indent = if starts_own_line(text, last.offset) {
        indent_of_line(text, last.offset).to_string()
    } else {
        format!("{}{}", indent_of_line(text, open), layout.unit)
    };

    let mut edits = Vec::new();
    let tail_from = if trailing_comma {
        after_last.end()
    } else {
        edits.push(Edit::insert(last.end(), ",".to_string()));
        last.end()
    };
    let tail = line_tail(text, tail_from);
    edits.push(Edit::insert(
        tail.content_end,
        format!("{}{indent}{key_json}: {}", layout.eol, render(value, &indent, layout)),
    ));
    edits
}

fn remove_property(text: &str, object: &Node, index: usize) -> Vec<Edit> {
    let props = &object.children;
    let prop = &props[index];
    let is_last = index + 1 == props.len();

    let after = next_significant(text, prop.end());
    let own_comma = after.kind == TokenKind::Comma;
    let own_end = if own_comma { after.end() } else { prop.end() };

    let (begin, end) = if !is_single_line(text, object) && starts_own_line(text, prop.offset) {
        let tail = line_tail(text, own_end);
        match tail.newline_end {
            Some(newline_end) => (line_start(text, prop.offset), newline_end),
            None if tail.next_kind == TokenKind::CloseBrace => (line_start(text, prop.offset), tail.content_end),
            None => (prop.offset, tail.next_offset),
        }
    } else if !is_last {
        (prop.offset, props[index + 1].offset)
    } else if index > 0 {
        (props[index - 1].end(), prop.end())
    } else {
        (open_inner(object), own_end)
    };

    if props.len() == 1 {
        let open = object.offset + 1;
        let close = object.end() - 1;
        let leftover = format!("{}{}", &text[open..begin.max(open)], &text[end.min(close)..close]);
        if leftover.trim().is_empty() {
            return vec![Edit::replace(open, close - open, String::new())];
        }
    }

    let mut edits = vec![Edit::replace(begin, end - begin, String::new())];

    // A removed last property on its own line leaves the previous separator dangling.
    if is_last && index > 0 && !own_comma && begin != props[index - 1].end() {
        let separator = next_significant(text, props[index - 1].end());
        if separator.kind == TokenKind::Comma {
            edits.push(Edit::replace(separator.offset, separator.len, String::new()));
        }
    }
    edits
}

fn open_inner(object: &Node) -> usize {
    object.offset + 1
}

struct Edit {
    offset: usize,
    length: usize,
    content: String,
}

impl Edit {
    fn insert(offset: usize, content: String) -> Self {
        Self::replace(offset, 0, content)
    }

    fn replace(offset: usize, length: usize, content: String) -> Self {
        Self { offset, length, content }
    }
}

/// Splice edits into `text`. Edits at the same offset keep their list order.
fn apply(text: &str, edits: Vec<Edit>) -> String {
    let mut ordered: Vec<(usize, Edit)> = edits.into_iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| b.offset.cmp(&a.offset).then(ib.cmp(ia)));

    let mut out = text.to_string();
    for (_, edit) in ordered {
        out.replace_range(edit.offset..edit.offset + edit.length, &edit.content);
    }
    out
}

struct Layout {
    unit: String,
    eol: &'static str,
}

impl Layout {
    fn detect(text: &str) -> Self {
        let eol = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let mut smallest: Option<usize> = None;
        for line in text.lines() {
            let trimmed = line.trim_start_matches([' ', '\t']);
            if trimmed.is_empty() || trimmed.starts_with('*') {
                continue;
            }
            let leading = &line[..line.len() - trimmed.len()];
            if leading.starts_with('\t') {
                return Self {
                    unit: "\t".to_string(),
                    eol,
                };
            }
            let width = leading.len();
            if width > 0 && smallest.map_or(true, |s| width < s) {
                smallest = Some(width);
            }
        }
        Self {
            unit: " ".repeat(smallest.unwrap_or(2)),
            eol,
        }
    }
}

fn render(value: &Value, indent: &str, layout: &Layout) -> String {
    let inner = format!("{indent}{}", layout.unit);
    match value {
        Value::Object(map) if !map.is_empty() => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{inner}{}: {}", Value::from(k.as_str()), render(v, &inner, layout)))
                .collect();
            wrap('{', '}', &entries, indent, layout)
        }
        Value::Array(items) if !items.is_empty() => {
            let entries: Vec<String> = items
                .iter()
                .map(|v| format!("{inner}{}", render(v, &inner, layout)))
                .collect();
            wrap('[', ']', &entries, indent, layout)
        }
        other => other.to_string(),
    }
}

fn wrap(open: char, close: char, entries: &[String], indent: &str, layout: &Layout) -> String {
    let separator = format!(",{}", layout.eol);
    format!(
        "{open}{eol}{body}{eol}{indent}{close}",
        eol = layout.eol,
        body = entries.join(&separator)
    )
}

fn nest(path: &[&str], value: &Value) -> Value {
    path.iter().rev().fold(value.clone(), |inner, key| {
        let mut map = Map::new();
        map.insert((*key).to_string(), inner);
        Value::Object(map)
    })
}

fn display_path(path: &[&str]) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.join(".")
    }
}

fn is_single_line(text: &str, node: &Node) -> bool {
    !text[node.offset..node.end()].contains('\n')
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

fn indent_of_line(text: &str, pos: usize) -> &str {
    let start = line_start(text, pos);
    let line = &text[start..];
    let width = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..width]
}

fn starts_own_line(text: &str, pos: usize) -> bool {
    text[line_start(text, pos)..pos].chars().all(|c| c == ' ' || c == '\t')
}

struct LineTail {
    /// End of the last comment on the line, or the start position.
    content_end: usize,
    /// End of the line break, when nothing but trivia precedes it.
    newline_end: Option<usize>,
    next_kind: TokenKind,
    next_offset: usize,
}

fn line_tail(text: &str, from: usize) -> LineTail {
    let mut scanner = Scanner::at(text, from);
    let mut content_end = from;
    loop {
        let token = scanner.next_token();
        match token.kind {
            TokenKind::Whitespace => {}
            TokenKind::LineComment | TokenKind::BlockComment => content_end = token.end(),
            kind => {
                return LineTail {
                    content_end,
                    newline_end: (kind == TokenKind::LineBreak).then(|| token.end()),
                    next_kind: kind,
                    next_offset: token.offset,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonc::parse;
    use serde_json::json;

    fn server() -> Value {
        json!({"command": "npx", "args": ["-y", "@smithery/foo"]})
    }

    #[test]
    fn inserts_into_empty_document() {
        let out = set_value("  \n", &["mcpServers", "foo"], &server()).unwrap();
        assert_eq!(
            out,
            "{\n  \"mcpServers\": {\n    \"foo\": {\n      \"command\": \"npx\",\n      \"args\": [\n        \"-y\",\n        \"@smithery/foo\"\n      ]\n    }\n  }\n}\n"
        );
    }

    #[test]
    fn comment_only_document_keeps_comments() {
        let out = set_value("// managed by hand\n", &["mcpServers", "foo"], &json!(1)).unwrap();
        assert_eq!(out, "// managed by hand\n{\n  \"mcpServers\": {\n    \"foo\": 1\n  }\n}\n");

        let out = set_value("/* a */ /* b */", &["k"], &json!(true)).unwrap();
        assert_eq!(out, "/* a */ /* b */\n{\n  \"k\": true\n}\n");
        assert_eq!(parse(&out).unwrap(), Some(json!({"k": true})));
    }

    #[test]
    fn inserts_into_empty_nested_object() {
        let text = "{\n  \"mcpServers\": {}\n}\n";
        let out = set_value(text, &["mcpServers", "x"], &json!({"command": "docker"})).unwrap();
        assert_eq!(out, "{\n  \"mcpServers\": {\n    \"x\": {\n      \"command\": \"docker\"\n    }\n  }\n}\n");
    }

    #[test]
    fn inserts_into_bare_empty_root() {
        let out = set_value("{}", &["mcpServers", "x"], &json!(1)).unwrap();
        assert_eq!(out, "{\n  \"mcpServers\": {\n    \"x\": 1\n  }\n}");
    }

    #[test]
    fn appends_after_last_sibling_keeping_comments() {
        let text = "{\n    // my servers\n    \"mcpServers\": {\n        \"a\": 1 // keep\n    },\n    \"other\": true\n}\n";
        let out = set_value(text, &["mcpServers", "b"], &json!(2)).unwrap();
        assert_eq!(
            out,
            "{\n    // my servers\n    \"mcpServers\": {\n        \"a\": 1, // keep\n        \"b\": 2\n    },\n    \"other\": true\n}\n"
        );
    }

    #[test]
    fn respects_trailing_comma() {
        let text = "{\n  \"a\": 1,\n}";
        let out = set_value(text, &["b"], &json!(2)).unwrap();
        assert_eq!(out, "{\n  \"a\": 1,\n  \"b\": 2\n}");
        assert_eq!(parse(&out).unwrap().unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn overwrites_existing_value_in_place() {
        let text = "{\n  /* c */\n  \"mcpServers\": {\n    \"foo\": {\"command\": \"old\"},\n    \"bar\": 2\n  }\n}";
        let out = set_value(text, &["mcpServers", "foo"], &json!({"command": "new"})).unwrap();
        assert_eq!(
            out,
            "{\n  /* c */\n  \"mcpServers\": {\n    \"foo\": {\n      \"command\": \"new\"\n    },\n    \"bar\": 2\n  }\n}"
        );
    }

    #[test]
    fn single_line_objects_stay_inline() {
        let out = set_value(r#"{"a": 1}"#, &["b"], &json!({"c": [1]})).unwrap();
        assert_eq!(out, r#"{"a": 1, "b": {"c":[1]}}"#);
    }

    #[test]
    fn creates_missing_intermediate_object() {
        let text = "{\n\t\"other\": true\n}";
        let out = set_value(text, &["mcpServers", "x"], &json!(1)).unwrap();
        assert_eq!(out, "{\n\t\"other\": true,\n\t\"mcpServers\": {\n\t\t\"x\": 1\n\t}\n}");
    }

    #[test]
    fn keeps_crlf_line_endings() {
        let text = "{\r\n  \"mcpServers\": {}\r\n}\r\n";
        let out = set_value(text, &["mcpServers", "x"], &json!(1)).unwrap();
        assert_eq!(out, "{\r\n  \"mcpServers\": {\r\n    \"x\": 1\r\n  }\r\n}\r\n");
    }

    #[test]
    fn rejects_non_object_parent() {
        let err = set_value(r#"{"mcpServers": []}"#, &["mcpServers", "x"], &json!(1)).unwrap_err();
        assert!(matches!(err, EditError::NotAnObject { ref path } if path == "mcpServers"));
        assert!(matches!(set_value("[]", &["a"], &json!(1)), Err(EditError::NotAnObject { .. })));
        assert!(matches!(set_value("{", &["a"], &json!(1)), Err(EditError::Parse(_))));
    }

    #[test]
    fn removes_middle_property_line() {
        let text = "{\n  \"a\": 1,\n  \"b\": 2, // about b\n  // about c\n  \"c\": 3\n}";
        let out = remove_value(text, &["b"]).unwrap();
        assert_eq!(out, "{\n  \"a\": 1,\n  // about c\n  \"c\": 3\n}");
    }

    #[test]
    fn removes_last_property_and_dangling_comma() {
        let text = "{\n  \"a\": 1, // about a\n  \"b\": 2\n}";
        let out = remove_value(text, &["b"]).unwrap();
        assert_eq!(out, "{\n  \"a\": 1 // about a\n}");
    }

    #[test]
    fn removing_only_property_collapses_object() {
        let text = "{\n  \"mcpServers\": {\n    \"foo\": {\n      \"command\": \"npx\"\n    }\n  }\n}\n";
        let out = remove_value(text, &["mcpServers", "foo"]).unwrap();
        assert_eq!(out, "{\n  \"mcpServers\": {}\n}\n");
    }

    #[test]
    fn removing_only_property_keeps_comments() {
        let text = "{\n  // nothing else\n  \"a\": 1\n}";
        let out = remove_value(text, &["a"]).unwrap();
        assert_eq!(out, "{\n  // nothing else\n}");
    }

    #[test]
    fn removes_inline_properties() {
        assert_eq!(remove_value(r#"{"a": 1, "b": 2}"#, &["a"]).unwrap(), r#"{"b": 2}"#);
        assert_eq!(remove_value(r#"{"a": 1, "b": 2}"#, &["b"]).unwrap(), r#"{"a": 1}"#);
        assert_eq!(remove_value(r#"{"a": 1}"#, &["a"]).unwrap(), "{}");
    }

    #[test]
    fn removes_all_duplicates() {
        let text = "{\n  \"a\": 1,\n  \"b\": 2,\n  \"a\": 3\n}";
        let out = remove_value(text, &["a"]).unwrap();
        assert_eq!(out, "{\n  \"b\": 2\n}");
    }

    #[test]
    fn removing_missing_path_is_noop() {
        let text = "{ /* c */ \"a\": 1 }";
        assert_eq!(remove_value(text, &["b"]).unwrap(), text);
        assert_eq!(remove_value(text, &["a", "b"]).unwrap(), text);
        assert_eq!(remove_value("", &["a"]).unwrap(), "");
    }
}
