//! Tolerant tree parser: comments and trailing commas are accepted.

use serde_json::{Map, Value};
use thiserror::Error;

use super::scanner::{ScanError, Scanner, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Array,
    Property,
    String,
    Number,
    Boolean,
    Null,
}

/// A value in the document, located by byte offsets.
///
/// A `Property` always has exactly two children: the key string and the value.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub offset: usize,
    pub length: usize,
    pub children: Vec<Node>,
}

impl Node {
    fn leaf(kind: NodeKind, token: Token) -> Self {
        Self {
            kind,
            offset: token.offset,
            length: token.len,
            children: Vec::new(),
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Unescaped key of a property node.
    pub fn key(&self, text: &str) -> Option<String> {
        if self.kind != NodeKind::Property {
            return None;
        }
        let key = self.children.first()?;
        serde_json::from_str(&text[key.offset..key.end()]).ok()
    }

    /// Value of a property node.
    pub fn value(&self) -> Option<&Node> {
        if self.kind == NodeKind::Property {
            self.children.get(1)
        } else {
            None
        }
    }

    /// The effective (last) property named `key` of an object node.
    pub fn property(&self, text: &str, key: &str) -> Option<&Node> {
        self.children
            .iter()
            .rev()
            .find(|p| p.key(text).as_deref() == Some(key))
    }

    /// Index of the first property named `key` of an object node.
    pub fn property_index(&self, text: &str, key: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|p| p.key(text).as_deref() == Some(key))
    }

    fn to_value(&self, text: &str) -> Result<Value, ParseError> {
        let raw = &text[self.offset..self.end()];
        match self.kind {
            NodeKind::Object => {
                let mut map = Map::new();
                for prop in &self.children {
                    let key = prop
                        .key(text)
                        .ok_or_else(|| ParseError::new("invalid property name", prop.offset))?;
                    let value = prop.value().ok_or_else(|| ParseError::new("value expected", prop.end()))?;
                    map.insert(key, value.to_value(text)?);
                }
                Ok(Value::Object(map))
            }
            NodeKind::Array => self
                .children
                .iter()
                .map(|item| item.to_value(text))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            NodeKind::String => serde_json::from_str::<String>(raw)
                .map(Value::String)
                .map_err(|_| ParseError::new("invalid string", self.offset)),
            NodeKind::Number => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Number(_)) => Ok(v),
                _ => Err(ParseError::new("invalid number", self.offset)),
            },
            NodeKind::Boolean => Ok(Value::Bool(raw == "true")),
            NodeKind::Null => Ok(Value::Null),
            NodeKind::Property => Err(ParseError::new("property outside object", self.offset)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    fn new(message: &str, offset: usize) -> Self {
        Self {
            message: message.to_string(),
            offset,
        }
    }
}

/// Parse into a located tree. Empty or whitespace-only input has no root.
pub fn parse_tree(text: &str) -> Result<Option<Node>, ParseError> {
    let mut parser = Parser::new(text);
    parser.advance()?;
    if parser.current.kind == TokenKind::Eof {
        return Ok(None);
    }
    let root = parser.parse_value()?;
    if parser.current.kind != TokenKind::Eof {
        return Err(ParseError::new("end of file expected", parser.current.offset));
    }
    Ok(Some(root))
}

/// Parse into a plain value. Duplicate keys resolve to the last occurrence.
pub fn parse(text: &str) -> Result<Option<Value>, ParseError> {
    match parse_tree(text)? {
        Some(root) => root.to_value(text).map(Some),
        None => Ok(None),
    }
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            scanner: Scanner::new(text),
            current: Token {
                kind: TokenKind::Eof,
                offset: 0,
                len: 0,
                error: None,
            },
        }
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        loop {
            let token = self.scanner.next_token();
            match token.error {
                Some(ScanError::UnterminatedComment) => {
                    return Err(ParseError::new("unterminated comment", token.offset))
                }
                Some(ScanError::UnterminatedString) => {
                    return Err(ParseError::new("unterminated string", token.offset))
                }
                None => {}
            }
            if !token.kind.is_trivia() {
                self.current = token;
                return Ok(());
            }
        }
    }

    fn parse_value(&mut self) -> Result<Node, ParseError> {
        let token = self.current;
        let kind = match token.kind {
            TokenKind::OpenBrace => return self.parse_object(),
            TokenKind::OpenBracket => return self.parse_array(),
            TokenKind::String => NodeKind::String,
            TokenKind::Number => NodeKind::Number,
            TokenKind::True | TokenKind::False => NodeKind::Boolean,
            TokenKind::Null => NodeKind::Null,
            _ => return Err(ParseError::new("value expected", token.offset)),
        };
        self.advance()?;
        Ok(Node::leaf(kind, token))
    }

    fn parse_object(&mut self) -> Result<Node, ParseError> {
        let start = self.current.offset;
        let mut children = Vec::new();
        self.advance()?;
        loop {
            match self.current.kind {
                TokenKind::CloseBrace => break,
                TokenKind::String => {}
                TokenKind::Eof => return Err(ParseError::new("closing brace expected", self.current.offset)),
                _ => return Err(ParseError::new("property name expected", self.current.offset)),
            }

            let key = Node::leaf(NodeKind::String, self.current);
            self.advance()?;
            if self.current.kind != TokenKind::Colon {
                return Err(ParseError::new("colon expected", self.current.offset));
            }
            self.advance()?;
            let value = self.parse_value()?;
            children.push(Node {
                kind: NodeKind::Property,
                offset: key.offset,
                length: value.end() - key.offset,
                children: vec![key, value],
            });

            match self.current.kind {
                TokenKind::Comma => self.advance()?,
                TokenKind::CloseBrace => {}
                _ => return Err(ParseError::new("comma expected", self.current.offset)),
            }
        }

        let end = self.current.end();
        self.advance()?;
        Ok(Node {
            kind: NodeKind::Object,
            offset: start,
            length: end - start,
            children,
        })
    }

    fn parse_array(&mut self) -> Result<Node, ParseError> {
        let start = self.current.offset;
        let mut children = Vec::new();
        self.advance()?;
        loop {
            match self.current.kind {
                TokenKind::CloseBracket => break,
                TokenKind::Eof => return Err(ParseError::new("closing bracket expected", self.current.offset)),
                _ => {}
            }

            children.push(self.parse_value()?);

            match self.current.kind {
                TokenKind::Comma => self.advance()?,
                TokenKind::CloseBracket => {}
                _ => return Err(ParseError::new("comma expected", self.current.offset)),
            }
        }

        let end = self.current.end();
        self.advance()?;
        Ok(Node {
            kind: NodeKind::Array,
            offset: start,
            length: end - start,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_comments_and_trailing_commas() {
        let text = r#"
        // servers
        {
            "mcpServers": {
                "a": { "command": "npx", "args": ["-y", "x",], }, /* after */
            },
        }
        "#;
        let value = parse(text).unwrap().unwrap();
        assert_eq!(value, json!({"mcpServers": {"a": {"command": "npx", "args": ["-y", "x"]}}}));
    }

    #[test]
    fn empty_document_has_no_root() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("  \n\t// only a comment\n").unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("{ \"a\": }").is_err());
        assert!(parse("{ \"a\" 1 }").is_err());
        assert!(parse("{ \"a\": 1 \"b\": 2 }").is_err());
        assert!(parse("{ \"a\": 1 } extra").is_err());
        assert!(parse("{ , }").is_err());
        assert!(parse("{ \"a\": 1").is_err());
        assert!(parse("/* open").is_err());
    }

    #[test]
    fn duplicate_keys_resolve_to_last() {
        let value = parse(r#"{"a": 1, "a": 2}"#).unwrap().unwrap();
        assert_eq!(value, json!({"a": 2}));
    }

    #[test]
    fn tree_locates_properties() {
        let text = r#"{ "a": 1, "b!": [true, null] }"#;
        let root = parse_tree(text).unwrap().unwrap();
        assert_eq!(root.kind, NodeKind::Object);
        assert_eq!(root.children.len(), 2);

        let b = root.property(text, "b!").unwrap();
        let value = b.value().unwrap();
        assert_eq!(value.kind, NodeKind::Array);
        assert_eq!(&text[value.offset..value.end()], "[true, null]");
        assert_eq!(root.property_index(text, "a"), Some(0));
        assert!(root.property(text, "missing").is_none());
    }

    #[test]
    fn invalid_number_fails_value_conversion() {
        assert!(parse_tree("-").is_ok());
        assert!(parse("-").is_err());
    }
}
