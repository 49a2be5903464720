//! JSON text parsing and rendering.
//!
//! An ordinary recursive-descent parser over a byte cursor. On failure the
//! error carries the byte position, building stops, and the tree built so
//! far is returned alongside for diagnostics — callers must check the
//! error before trusting the tree (an aborted parse leaves the root null).

use std::fmt::Write as _;

use itertools::Itertools;

use crate::error::{Error, Result, MAX_DEPTH};
use crate::tree::{Node, NodeId, Tree};

/// Parses a JSON document. Returns the tree together with the first error
/// encountered, if any.
pub fn parse(source: &str) -> (Tree, Option<Error>) {
    let mut parser = Parser::new(source);
    match parser.parse_document() {
        Ok(root) => {
            parser.tree.set_root(root);
            (parser.tree, None)
        }
        Err(err) => (parser.tree, Some(err)),
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    tree: Tree,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Parser {
            src: source.as_bytes(),
            pos: 0,
            tree: Tree::new(),
        }
    }

    fn parse_document(&mut self) -> Result<NodeId> {
        self.skip_whitespace();
        let root = self.parse_value(0)?;
        self.skip_whitespace();
        if self.pos < self.src.len() {
            return Err(Error::UnexpectedToken { position: self.pos });
        }
        Ok(root)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn maybe(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == byte => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(Error::UnexpectedToken { position: self.pos }),
            None => Err(Error::UnexpectedEndOfInput),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.bump();
        }
    }

    fn expect_keyword(&mut self, keyword: &[u8]) -> Result<()> {
        let end = self.pos + keyword.len();
        if self.src.get(self.pos..end) == Some(keyword) {
            self.pos = end;
            Ok(())
        } else {
            Err(Error::UnexpectedToken { position: self.pos })
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<NodeId> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthExceeded);
        }
        match self.peek() {
            Some(b'"') => {
                let content = self.parse_string_literal()?;
                Ok(self.tree.alloc(Node::String(content)))
            }
            Some(b'{') => self.parse_object(depth),
            Some(b'[') => self.parse_array(depth),
            Some(b't') => {
                self.expect_keyword(b"true")?;
                Ok(self.tree.alloc(Node::Bool(true)))
            }
            Some(b'f') => {
                self.expect_keyword(b"false")?;
                Ok(self.tree.alloc(Node::Bool(false)))
            }
            Some(b'n') => {
                self.expect_keyword(b"null")?;
                Ok(self.tree.alloc(Node::Null))
            }
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            Some(_) => Err(Error::UnexpectedToken { position: self.pos }),
            None => Err(Error::UnexpectedEndOfInput),
        }
    }

    fn parse_object(&mut self, depth: usize) -> Result<NodeId> {
        self.expect(b'{')?;
        let object = self.tree.alloc(Node::Object(Vec::new()));
        self.skip_whitespace();
        if self.maybe(b'}') {
            return Ok(object);
        }
        loop {
            self.skip_whitespace();
            let key = self.parse_string_literal()?;
            self.skip_whitespace();
            self.expect(b':')?;
            self.skip_whitespace();
            let value = self.parse_value(depth + 1)?;
            // Duplicate keys are accepted here; lookups return the first.
            self.tree.push_entry(object, key, value)?;
            self.skip_whitespace();
            if !self.maybe(b',') {
                break;
            }
        }
        self.expect(b'}')?;
        Ok(object)
    }

    fn parse_array(&mut self, depth: usize) -> Result<NodeId> {
        self.expect(b'[')?;
        let array = self.tree.alloc(Node::Array(Vec::new()));
        self.skip_whitespace();
        if self.maybe(b']') {
            return Ok(array);
        }
        loop {
            self.skip_whitespace();
            let value = self.parse_value(depth + 1)?;
            self.tree.push(array, value)?;
            self.skip_whitespace();
            if !self.maybe(b',') {
                break;
            }
        }
        self.expect(b']')?;
        Ok(array)
    }

    fn parse_number(&mut self) -> Result<NodeId> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
        ) {
            self.bump();
        }
        // The scanned range is pure ASCII.
        let text = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| Error::UnexpectedToken { position: start })?;
        let node = if text.contains(['.', 'e', 'E']) {
            Node::Float(
                text.parse::<f64>()
                    .map_err(|_| Error::UnexpectedToken { position: start })?,
            )
        } else {
            match text.parse::<i64>() {
                Ok(v) => Node::Int(v),
                // Out of i64 range; keep the value as a float.
                Err(_) => Node::Float(
                    text.parse::<f64>()
                        .map_err(|_| Error::UnexpectedToken { position: start })?,
                ),
            }
        };
        Ok(self.tree.alloc(node))
    }

    fn parse_string_literal(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None => return Err(Error::UnexpectedEndOfInput),
                Some(b'"') => {
                    self.bump();
                    break;
                }
                Some(b'\\') => {
                    self.bump();
                    self.parse_escape(&mut bytes)?;
                }
                Some(byte) => {
                    bytes.push(byte);
                    self.bump();
                }
            }
        }
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    fn parse_escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let position = self.pos;
        let escaped = match self.peek() {
            None => return Err(Error::UnexpectedEndOfInput),
            Some(b'b') => 0x08,
            Some(b'f') => 0x0c,
            Some(b'n') => b'\n',
            Some(b'r') => b'\r',
            Some(b't') => b'\t',
            Some(b'"') => b'"',
            Some(b'\\') => b'\\',
            Some(b'/') => b'/',
            Some(b'u') => {
                self.bump();
                let ch = self.parse_unicode_escape()?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                return Ok(());
            }
            Some(_) => return Err(Error::UnexpectedToken { position }),
        };
        out.push(escaped);
        self.bump();
        Ok(())
    }

    fn parse_unicode_escape(&mut self) -> Result<char> {
        let position = self.pos;
        let first = self.parse_hex4()?;
        // Surrogate pairs arrive as two consecutive \uXXXX escapes.
        let code = if (0xd800..=0xdbff).contains(&first) {
            self.expect(b'\\')?;
            self.expect(b'u')?;
            let second = self.parse_hex4()?;
            if !(0xdc00..=0xdfff).contains(&second) {
                return Err(Error::UnexpectedToken { position });
            }
            0x10000 + ((first - 0xd800) << 10) + (second - 0xdc00)
        } else {
            first
        };
        char::from_u32(code).ok_or(Error::UnexpectedToken { position })
    }

    fn parse_hex4(&mut self) -> Result<u32> {
        let end = self.pos + 4;
        let digits = self
            .src
            .get(self.pos..end)
            .ok_or(Error::UnexpectedEndOfInput)?;
        let text =
            std::str::from_utf8(digits).map_err(|_| Error::UnexpectedToken { position: self.pos })?;
        let code = u32::from_str_radix(text, 16)
            .map_err(|_| Error::UnexpectedToken { position: self.pos })?;
        self.pos = end;
        Ok(code)
    }
}

/// Renders a tree back to JSON text: objects pretty-printed with two-space
/// indentation, arrays inline, declared child order preserved.
pub fn render(tree: &Tree) -> String {
    let mut out = String::new();
    render_value(tree, tree.root(), 0, &mut out);
    out
}

fn render_value(tree: &Tree, id: NodeId, level: usize, out: &mut String) {
    match tree.node(id) {
        Node::Null => out.push_str("null"),
        Node::Bool(true) => out.push_str("true"),
        Node::Bool(false) => out.push_str("false"),
        Node::Int(v) => {
            let _ = write!(out, "{}", v);
        }
        Node::Float(v) => render_float(*v, out),
        Node::String(s) => render_string(s, out),
        Node::Array(items) => {
            out.push('[');
            // Child ids are cheap copies; format each in declared order.
            let rendered = items
                .iter()
                .map(|item| {
                    let mut piece = String::new();
                    render_value(tree, *item, level + 1, &mut piece);
                    piece
                })
                .join(", ");
            out.push_str(&rendered);
            out.push(']');
        }
        Node::Object(entries) => {
            out.push_str("{\n");
            for (i, (key, value)) in entries.iter().enumerate() {
                indent(level + 1, out);
                render_string(key, out);
                out.push_str(": ");
                render_value(tree, *value, level + 1, out);
                if i + 1 != entries.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(level, out);
            out.push('}');
        }
    }
}

fn render_float(v: f64, out: &mut String) {
    if !v.is_finite() {
        // NaN and infinities have no JSON spelling.
        out.push_str("null");
    } else if v.fract() == 0.0 {
        let _ = write!(out, "{:.1}", v);
    } else {
        let _ = write!(out, "{}", v);
    }
}

fn render_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("  ");
    }
}
