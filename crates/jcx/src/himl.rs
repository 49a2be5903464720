//! HIML text parsing and rendering.
//!
//! HIML is a JSON-like nested-tag notation. The root of a document is an
//! implicit object; statements inside an object are `key = value` pairs,
//! named blocks `tag { ... }`, anonymous blocks `{ ... }`, and bare string
//! tokens. Named and anonymous blocks are collected into a synthetic
//! `_children` array entry, and a block's tag name is recorded under a
//! synthetic `_type` string entry. Leaf values are always strings — the
//! notation has no numeric or boolean literals. `//` starts a line
//! comment. A comma between statements is optional when a line break
//! separates them.
//!
//! Like the JSON parser, errors carry a byte position and come back next
//! to the partially built tree.

use std::fmt::Write as _;

use crate::error::{Error, Result, MAX_DEPTH};
use crate::tree::{Node, NodeId, Tree};

pub const TYPE_KEY: &str = "_type";
pub const CHILDREN_KEY: &str = "_children";

/// Parses a HIML document into a tree rooted at an implicit object.
pub fn parse(source: &str) -> (Tree, Option<Error>) {
    let mut parser = Parser::new(source);
    match parser.parse_object(None, true, 0) {
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

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    /// Skips spaces, line breaks and `//` comments, returning how many
    /// line breaks were crossed; a statement may end at a line break
    /// instead of a comma.
    fn skip_whitespace(&mut self) -> usize {
        let mut lines = 0;
        loop {
            match self.peek() {
                Some(b' ' | b'\t') => self.bump(),
                Some(b'\r' | b'\n') => {
                    lines += 1;
                    self.bump();
                }
                Some(b'/') if self.src.get(self.pos + 1) == Some(&b'/') => {
                    while !matches!(self.peek(), None | Some(b'\r' | b'\n')) {
                        self.bump();
                    }
                }
                _ => return lines,
            }
        }
    }

    fn parse_object(
        &mut self,
        tag_name: Option<String>,
        is_root: bool,
        depth: usize,
    ) -> Result<NodeId> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthExceeded);
        }
        let object = self.tree.alloc(Node::Object(Vec::new()));
        if let Some(tag) = tag_name {
            let tag_node = self.tree.alloc(Node::String(tag));
            self.tree.push_entry(object, TYPE_KEY, tag_node)?;
        }

        if is_root {
            self.skip_whitespace();
        } else {
            self.bump(); // opening brace, checked by the caller
            self.skip_whitespace();
            if self.peek() == Some(b'}') {
                self.bump();
                return Ok(object);
            }
        }

        let children = self.tree.alloc(Node::Array(Vec::new()));
        self.tree.push_entry(object, CHILDREN_KEY, children)?;

        loop {
            if is_root && self.peek().is_none() {
                break;
            }
            let mut lines;
            if self.peek() == Some(b'{') {
                let child = self.parse_object(None, false, depth + 1)?;
                self.tree.push(children, child)?;
                lines = self.skip_whitespace();
            } else {
                let key = self.parse_string_token()?;
                lines = self.skip_whitespace();
                match self.peek() {
                    Some(b'=') => {
                        self.bump();
                        self.skip_whitespace();
                        let value = self.parse_value(depth + 1)?;
                        lines = self.skip_whitespace();
                        let tag = self.tree.node(value).as_str().map(str::to_string);
                        if self.peek() == Some(b'{') && tag.is_some() {
                            // `key = tag { ... }`: the token names the block.
                            let block = self.parse_object(tag, false, depth + 1)?;
                            self.tree.push_entry(object, key, block)?;
                            lines = self.skip_whitespace();
                        } else {
                            self.tree.push_entry(object, key, value)?;
                        }
                    }
                    Some(b'{') => {
                        let block = self.parse_object(Some(key), false, depth + 1)?;
                        self.tree.push(children, block)?;
                        lines = self.skip_whitespace();
                    }
                    _ => {
                        let bare = self.tree.alloc(Node::String(key));
                        self.tree.push(children, bare)?;
                    }
                }
            }

            match self.peek() {
                Some(b',') => {
                    self.bump();
                    self.skip_whitespace();
                }
                Some(b'}') if !is_root => {
                    self.bump();
                    break;
                }
                None => {
                    if is_root {
                        break;
                    }
                    return Err(Error::UnexpectedEndOfInput);
                }
                _ => {
                    if lines == 0 {
                        return Err(Error::UnexpectedToken { position: self.pos });
                    }
                }
            }
        }
        Ok(object)
    }

    fn parse_value(&mut self, depth: usize) -> Result<NodeId> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(Error::UnexpectedEndOfInput),
            Some(b'{') => self.parse_object(None, false, depth),
            Some(_) => {
                let token = self.parse_string_token()?;
                Ok(self.tree.alloc(Node::String(token)))
            }
        }
    }

    fn parse_string_token(&mut self) -> Result<String> {
        if self.peek() == Some(b'"') {
            self.bump();
            return self.parse_quoted_rest();
        }
        let start = self.pos;
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None
                | Some(b' ' | b'\t' | b'\r' | b'\n' | b'{' | b'}' | b'=' | b',' | b'"') => break,
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
        if bytes.is_empty() {
            return match self.peek() {
                None => Err(Error::UnexpectedEndOfInput),
                Some(_) => Err(Error::UnexpectedToken { position: start }),
            };
        }
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    fn parse_quoted_rest(&mut self) -> Result<String> {
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
            Some(_) => return Err(Error::UnexpectedToken { position: self.pos }),
        };
        out.push(escaped);
        self.bump();
        Ok(())
    }
}

/// Renders a tree in HIML shape back to HIML text. The root object's
/// statements appear without surrounding braces.
pub fn render(tree: &Tree) -> String {
    let mut out = String::new();
    match tree.node(tree.root()) {
        Node::Object(_) => render_statements(tree, tree.root(), 0, &mut out),
        _ => {
            render_leaf(tree, tree.root(), &mut out);
            out.push('\n');
        }
    }
    out
}

fn render_statements(tree: &Tree, object: NodeId, level: usize, out: &mut String) {
    let Node::Object(entries) = tree.node(object) else {
        return;
    };
    for (key, value) in entries {
        if key == TYPE_KEY {
            continue;
        }
        if key == CHILDREN_KEY {
            if let Node::Array(items) = tree.node(*value) {
                for item in items {
                    indent(level, out);
                    match tree.node(*item) {
                        Node::Object(_) => render_block(tree, *item, level, out),
                        _ => render_leaf(tree, *item, out),
                    }
                    out.push('\n');
                }
            }
            continue;
        }
        indent(level, out);
        render_token(key, out);
        out.push_str(" = ");
        match tree.node(*value) {
            Node::Object(_) => render_block(tree, *value, level, out),
            _ => render_leaf(tree, *value, out),
        }
        out.push('\n');
    }
}

fn render_block(tree: &Tree, object: NodeId, level: usize, out: &mut String) {
    if let Some(tag) = tree.entry(object, TYPE_KEY) {
        if let Some(name) = tree.node(tag).as_str() {
            render_token(name, out);
            out.push(' ');
        }
    }
    out.push_str("{\n");
    render_statements(tree, object, level + 1, out);
    indent(level, out);
    out.push('}');
}

fn render_leaf(tree: &Tree, id: NodeId, out: &mut String) {
    match tree.node(id) {
        Node::String(s) => render_token(s, out),
        Node::Null => render_token("null", out),
        Node::Bool(b) => render_token(&b.to_string(), out),
        Node::Int(v) => render_token(&v.to_string(), out),
        Node::Float(v) => render_token(&v.to_string(), out),
        // Arrays outside `_children` have no HIML spelling; render their
        // items as a brace-less run would not re-parse, so quote a marker.
        Node::Array(_) | Node::Object(_) => render_token("", out),
    }
}

fn render_token(token: &str, out: &mut String) {
    let needs_quotes = token.is_empty()
        || token.contains("//")
        || token
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '\r' | '\n' | '{' | '}' | '=' | ',' | '"' | '\\'));
    if !needs_quotes {
        out.push_str(token);
        return;
    }
    out.push('"');
    for c in token.chars() {
        match c {
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn indent(level: usize, out: &mut String) {
    let _ = write!(out, "{}", "  ".repeat(level));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse_ok(source: &str) -> Tree {
        let (tree, err) = parse(source);
        assert_eq!(err, None, "parse failed for {source:?}");
        tree
    }

    #[test]
    fn test_pairs_and_bare_tokens() {
        let tree = parse_ok("name = probe\nmode = \"deep scan\"\nstandalone\n");
        let root = tree.root();
        let name = tree.entry(root, "name").unwrap();
        assert_eq!(tree.node(name).as_str(), Some("probe"));
        let mode = tree.entry(root, "mode").unwrap();
        assert_eq!(tree.node(mode).as_str(), Some("deep scan"));

        let children = tree.entry(root, CHILDREN_KEY).unwrap();
        assert_eq!(tree.node(children).len(), 1);
        let bare = tree.at(children, 0).unwrap();
        assert_eq!(tree.node(bare).as_str(), Some("standalone"));
    }

    #[test]
    fn test_named_block_records_tag() {
        let tree = parse_ok("engine {\n  thrust = high\n}\n");
        let root = tree.root();
        let children = tree.entry(root, CHILDREN_KEY).unwrap();
        let block = tree.at(children, 0).unwrap();
        let tag = tree.entry(block, TYPE_KEY).unwrap();
        assert_eq!(tree.node(tag).as_str(), Some("engine"));
        let thrust = tree.entry(block, "thrust").unwrap();
        assert_eq!(tree.node(thrust).as_str(), Some("high"));
    }

    #[test]
    fn test_tagged_pair_value() {
        let tree = parse_ok("probe = lander {\n  legs = four\n}\n");
        let root = tree.root();
        let probe = tree.entry(root, "probe").unwrap();
        let tag = tree.entry(probe, TYPE_KEY).unwrap();
        assert_eq!(tree.node(tag).as_str(), Some("lander"));
        let legs = tree.entry(probe, "legs").unwrap();
        assert_eq!(tree.node(legs).as_str(), Some("four"));
    }

    #[test]
    fn test_anonymous_block_and_empty_block() {
        let tree = parse_ok("{ a = b }\nshell {}\n");
        let root = tree.root();
        let children = tree.entry(root, CHILDREN_KEY).unwrap();
        assert_eq!(tree.node(children).len(), 2);

        let anon = tree.at(children, 0).unwrap();
        assert!(tree.entry(anon, TYPE_KEY).is_none());
        assert!(tree.entry(anon, "a").is_some());

        // An empty block keeps only its tag, no `_children`.
        let shell = tree.at(children, 1).unwrap();
        assert!(tree.entry(shell, TYPE_KEY).is_some());
        assert!(tree.entry(shell, CHILDREN_KEY).is_none());
    }

    #[test]
    fn test_comments_and_commas() {
        let tree = parse_ok("// header comment\na = 1, b = 2 // trailing\nc = 3\n");
        let root = tree.root();
        for (key, expected) in [("a", "1"), ("b", "2"), ("c", "3")] {
            let id = tree.entry(root, key).unwrap();
            assert_eq!(tree.node(id).as_str(), Some(expected), "key {key}");
        }
    }

    #[test]
    fn test_statements_need_separation() {
        // Two pairs on one line with no comma is an error...
        let (_, err) = parse("a = 1 b = 2");
        assert!(matches!(err, Some(Error::UnexpectedToken { .. })));
        // ...but a line break separates fine.
        let (_, err) = parse("a = 1\nb = 2");
        assert_eq!(err, None);
    }

    #[rstest]
    #[case("block {")]
    #[case("a =")]
    fn test_unterminated_input(#[case] source: &str) {
        let (_, err) = parse(source);
        assert_eq!(err, Some(Error::UnexpectedEndOfInput));
    }

    #[test]
    fn test_empty_document_is_empty_root() {
        let tree = parse_ok("");
        let root = tree.root();
        let children = tree.entry(root, CHILDREN_KEY).unwrap();
        assert_eq!(tree.node(children).len(), 0);
    }

    #[rstest]
    #[case("name = probe\n")]
    #[case("engine {\n  thrust = high\n}\n")]
    #[case("probe = lander {\n  legs = four\n}\n")]
    #[case("a = 1\nbare\n{ x = y }\n")]
    #[case("quoted = \"two words\"\n")]
    #[case("deep {\n  deeper {\n    leaf = v\n  }\n}\n")]
    fn test_parse_render_fixpoint(#[case] source: &str) {
        let first = parse_ok(source);
        let text = render(&first);
        let second = parse_ok(&text);
        assert_eq!(first, second, "render produced {text:?}");
    }

    #[test]
    fn test_depth_limit() {
        let deep = "a {\n".repeat(500) + &"}\n".repeat(500);
        let (_, err) = parse(&deep);
        assert_eq!(err, Some(Error::DepthExceeded));
    }
}
