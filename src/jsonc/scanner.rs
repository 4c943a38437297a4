//! Byte-offset tokenizer for JSON with comments.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Colon,
    Comma,
    String,
    Number,
    True,
    False,
    Null,
    LineComment,
    BlockComment,
    Whitespace,
    LineBreak,
    Unknown,
    Eof,
}

impl TokenKind {
    /// Tokens that carry no structure: comments, spaces and line breaks.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment | TokenKind::BlockComment | TokenKind::Whitespace | TokenKind::LineBreak
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanError {
    UnterminatedString,
    UnterminatedComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub len: usize,
    pub error: Option<ScanError>,
}

impl Token {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

pub struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self::at(text, 0)
    }

    /// Start scanning at `pos`, which must be a token boundary.
    pub fn at(text: &'a str, pos: usize) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: pos.min(text.len()),
        }
    }

    pub fn next_token(&mut self) -> Token {
        let start = self.pos;
        if start >= self.bytes.len() {
            return self.token(TokenKind::Eof, start, None);
        }

        let kind = match self.bytes[start] {
            b' ' | b'\t' => {
                self.pos = self.skip_while(start, |b| b == b' ' || b == b'\t');
                TokenKind::Whitespace
            }
            b'\r' => {
                self.pos = if self.bytes.get(start + 1) == Some(&b'\n') { start + 2 } else { start + 1 };
                TokenKind::LineBreak
            }
            b'\n' => {
                self.pos = start + 1;
                TokenKind::LineBreak
            }
            b'{' => self.single(TokenKind::OpenBrace),
            b'}' => self.single(TokenKind::CloseBrace),
            b'[' => self.single(TokenKind::OpenBracket),
            b']' => self.single(TokenKind::CloseBracket),
            b':' => self.single(TokenKind::Colon),
            b',' => self.single(TokenKind::Comma),
            b'"' => return self.scan_string(start),
            b'/' => return self.scan_comment(start),
            b'-' | b'0'..=b'9' => {
                self.pos = self.scan_number(start);
                TokenKind::Number
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.pos = self.skip_while(start, |b| b.is_ascii_alphanumeric() || b == b'_');
                match &self.text[start..self.pos] {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    _ => TokenKind::Unknown,
                }
            }
            _ => {
                let ch = self.text[start..].chars().next().unwrap_or('\0');
                self.pos = start + ch.len_utf8().max(1);
                if ch == '\u{feff}' {
                    TokenKind::Whitespace
                } else {
                    TokenKind::Unknown
                }
            }
        };

        self.token(kind, start, None)
    }

    fn token(&self, kind: TokenKind, start: usize, error: Option<ScanError>) -> Token {
        Token {
            kind,
            offset: start,
            len: self.pos - start,
            error,
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn skip_while(&self, mut pos: usize, pred: impl Fn(u8) -> bool) -> usize {
        while pos < self.bytes.len() && pred(self.bytes[pos]) {
            pos += 1;
        }
        pos
    }

    fn scan_string(&mut self, start: usize) -> Token {
        let mut pos = start + 1;
        loop {
            match self.bytes.get(pos) {
                None | Some(b'\r') | Some(b'\n') => {
                    self.pos = pos.min(self.bytes.len());
                    return self.token(TokenKind::String, start, Some(ScanError::UnterminatedString));
                }
                Some(b'"') => {
                    self.pos = pos + 1;
                    return self.token(TokenKind::String, start, None);
                }
                Some(b'\\') => pos += 2,
                Some(_) => pos += 1,
            }
        }
    }

    fn scan_comment(&mut self, start: usize) -> Token {
        match self.bytes.get(start + 1) {
            Some(b'/') => {
                self.pos = self.skip_while(start + 2, |b| b != b'\r' && b != b'\n');
                self.token(TokenKind::LineComment, start, None)
            }
            Some(b'*') => match self.text[start + 2..].find("*/") {
                Some(rel) => {
                    self.pos = start + 2 + rel + 2;
                    self.token(TokenKind::BlockComment, start, None)
                }
                None => {
                    self.pos = self.bytes.len();
                    self.token(TokenKind::BlockComment, start, Some(ScanError::UnterminatedComment))
                }
            },
            _ => {
                self.pos = start + 1;
                self.token(TokenKind::Unknown, start, None)
            }
        }
    }

    fn scan_number(&self, start: usize) -> usize {
        let mut pos = start;
        if self.bytes[pos] == b'-' {
            pos += 1;
        }
        pos = self.skip_while(pos, |b| b.is_ascii_digit());
        if self.bytes.get(pos) == Some(&b'.') {
            pos = self.skip_while(pos + 1, |b| b.is_ascii_digit());
        }
        if matches!(self.bytes.get(pos), Some(b'e') | Some(b'E')) {
            pos += 1;
            if matches!(self.bytes.get(pos), Some(b'+') | Some(b'-')) {
                pos += 1;
            }
            pos = self.skip_while(pos, |b| b.is_ascii_digit());
        }
        pos
    }
}

/// First non-trivia token at or after `from`.
pub fn next_significant(text: &str, from: usize) -> Token {
    let mut scanner = Scanner::at(text, from);
    loop {
        let token = scanner.next_token();
        if !token.kind.is_trivia() {
            return token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(text);
        let mut out = Vec::new();
        loop {
            let token = scanner.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn scans_structure_and_comments() {
        let text = "{ // note\r\n  \"a\": [1, true] /* x */ }";
        assert_eq!(
            kinds(text),
            vec![
                TokenKind::OpenBrace,
                TokenKind::Whitespace,
                TokenKind::LineComment,
                TokenKind::LineBreak,
                TokenKind::Whitespace,
                TokenKind::String,
                TokenKind::Colon,
                TokenKind::Whitespace,
                TokenKind::OpenBracket,
                TokenKind::Number,
                TokenKind::Comma,
                TokenKind::Whitespace,
                TokenKind::True,
                TokenKind::CloseBracket,
                TokenKind::Whitespace,
                TokenKind::BlockComment,
                TokenKind::Whitespace,
                TokenKind::CloseBrace,
            ]
        );
    }

    #[test]
    fn string_with_escaped_quote_is_one_token() {
        let mut scanner = Scanner::new(r#""say \"hi\"" rest"#);
        let token = scanner.next_token();
        assert_eq!(token.kind, TokenKind::String);
        assert_eq!(token.len, 12);
        assert!(token.error.is_none());
    }

    #[test]
    fn reports_unterminated_string_and_comment() {
        let mut scanner = Scanner::new("\"open\n");
        assert_eq!(scanner.next_token().error, Some(ScanError::UnterminatedString));

        let mut scanner = Scanner::new("/* never closed");
        let token = scanner.next_token();
        assert_eq!(token.kind, TokenKind::BlockComment);
        assert_eq!(token.error, Some(ScanError::UnterminatedComment));
    }

    #[test]
    fn next_significant_skips_trivia() {
        let text = "1 /* c */ // d\n ,";
        let token = next_significant(text, 1);
        assert_eq!(token.kind, TokenKind::Comma);
        assert_eq!(token.offset, text.len() - 1);
    }

    #[test]
    fn unknown_words_and_symbols() {
        assert_eq!(kinds("nope"), vec![TokenKind::Unknown]);
        assert_eq!(kinds("é"), vec![TokenKind::Unknown]);
    }
}
