use std::fmt::{self, Display, Formatter};

use crate::arena::{Arena, ArenaId};
use crate::error::{Error, Result};

pub type NodeId = ArenaId<Node>;

/// The closed set of value tags. One byte on the wire in the zero-copy
/// format, so the discriminants are part of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Null = 0,
    String = 1,
    Array = 2,
    Object = 3,
    Int = 4,
    Float = 5,
    Bool = 6,
}

impl ValueKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ValueKind::Null),
            1 => Some(ValueKind::String),
            2 => Some(ValueKind::Array),
            3 => Some(ValueKind::Object),
            4 => Some(ValueKind::Int),
            5 => Some(ValueKind::Float),
            6 => Some(ValueKind::Bool),
            _ => None,
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
        };
        write!(f, "{}", name)
    }
}

/// One value in a mutable tree. Fully typed at construction; the kind of a
/// node never changes. Composite nodes hold their children as ordered
/// handles into the owning [`Tree`]'s arena, so insertion order is final
/// order and enumeration never sorts.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<NodeId>),
    Object(Vec<(String, NodeId)>),
}

impl Node {
    pub fn kind(&self) -> ValueKind {
        match self {
            Node::Null => ValueKind::Null,
            Node::Bool(_) => ValueKind::Bool,
            Node::Int(_) => ValueKind::Int,
            Node::Float(_) => ValueKind::Float,
            Node::String(_) => ValueKind::String,
            Node::Array(_) => ValueKind::Array,
            Node::Object(_) => ValueKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Node::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Node::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// Child count for composites, 0 for leaves.
    pub fn len(&self) -> usize {
        match self {
            Node::Array(items) => items.len(),
            Node::Object(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<bool> for Node {
    fn from(v: bool) -> Self {
        Node::Bool(v)
    }
}

impl From<i64> for Node {
    fn from(v: i64) -> Self {
        Node::Int(v)
    }
}

impl From<f64> for Node {
    fn from(v: f64) -> Self {
        Node::Float(v)
    }
}

impl From<String> for Node {
    fn from(v: String) -> Self {
        Node::String(v)
    }
}

impl From<&str> for Node {
    fn from(v: &str) -> Self {
        Node::String(v.to_string())
    }
}

/// A mutable value tree: an arena of nodes plus the root handle.
///
/// Nodes are created during parsing or building, consumed by a codec's
/// write path, and dropped all at once with the tree. Handles from one
/// tree must never be fed to another.
#[derive(Debug, Clone)]
pub struct Tree {
    arena: Arena<Node>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty tree whose root is `null`.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.alloc(Node::Null);
        Tree { arena, root }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut arena = Arena::with_capacity(capacity.max(1));
        let root = arena.alloc(Node::Null);
        Tree { arena, root }
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        self.arena.alloc(node)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    /// Borrow a node. Panics on a handle from a different tree that is out
    /// of range; use [`Tree::get`] for fallible access.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.arena[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    /// Total number of nodes allocated in this tree.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Appends a child to an Array node. Unchecked O(1) insertion.
    pub fn push(&mut self, array: NodeId, child: NodeId) -> Result<()> {
        match self.arena.get_mut(array) {
            Some(Node::Array(items)) => {
                items.push(child);
                Ok(())
            }
            Some(other) => Err(Error::TypeMismatch {
                expected: ValueKind::Array,
                found: other.kind(),
            }),
            None => Err(Error::TypeMismatch {
                expected: ValueKind::Array,
                found: ValueKind::Null,
            }),
        }
    }

    /// Appends a `(key, value)` entry to an Object node without looking at
    /// existing keys. Duplicate keys are permitted on this path; it is the
    /// insertion discipline the decoders and text parsers use.
    pub fn push_entry(
        &mut self,
        object: NodeId,
        key: impl Into<String>,
        child: NodeId,
    ) -> Result<()> {
        match self.arena.get_mut(object) {
            Some(Node::Object(entries)) => {
                entries.push((key.into(), child));
                Ok(())
            }
            Some(other) => Err(Error::TypeMismatch {
                expected: ValueKind::Object,
                found: other.kind(),
            }),
            None => Err(Error::TypeMismatch {
                expected: ValueKind::Object,
                found: ValueKind::Null,
            }),
        }
    }

    /// Checked insert: scans existing keys and refuses to add a duplicate,
    /// leaving the tree unchanged. O(n) in the entry count.
    pub fn set(&mut self, object: NodeId, key: impl Into<String>, child: NodeId) -> Result<()> {
        let key = key.into();
        match self.arena.get_mut(object) {
            Some(Node::Object(entries)) => {
                if entries.iter().any(|(k, _)| *k == key) {
                    return Err(Error::DuplicateKey(key));
                }
                entries.push((key, child));
                Ok(())
            }
            Some(other) => Err(Error::TypeMismatch {
                expected: ValueKind::Object,
                found: other.kind(),
            }),
            None => Err(Error::TypeMismatch {
                expected: ValueKind::Object,
                found: ValueKind::Null,
            }),
        }
    }

    /// Linear scan for the first entry with the given key. There is no
    /// secondary index; callers needing fast repeated lookup build their
    /// own over the materialized tree.
    pub fn entry(&self, object: NodeId, key: &str) -> Option<NodeId> {
        match self.get(object)? {
            Node::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, id)| *id),
            _ => None,
        }
    }

    pub fn at(&self, array: NodeId, index: usize) -> Option<NodeId> {
        match self.get(array)? {
            Node::Array(items) => items.get(index).copied(),
            _ => None,
        }
    }
}

fn float_eq(a: f64, b: f64) -> bool {
    // NaN compares equal to itself by bit pattern so round-tripped trees
    // containing NaN still compare equal; -0.0 == 0.0 stays true.
    a == b || a.to_bits() == b.to_bits()
}

fn node_eq(a: &Tree, a_id: NodeId, b: &Tree, b_id: NodeId) -> bool {
    match (a.get(a_id), b.get(b_id)) {
        (Some(Node::Null), Some(Node::Null)) => true,
        (Some(Node::Bool(x)), Some(Node::Bool(y))) => x == y,
        (Some(Node::Int(x)), Some(Node::Int(y))) => x == y,
        (Some(Node::Float(x)), Some(Node::Float(y))) => float_eq(*x, *y),
        (Some(Node::String(x)), Some(Node::String(y))) => x == y,
        (Some(Node::Array(xs)), Some(Node::Array(ys))) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|(x, y)| node_eq(a, *x, b, *y))
        }
        (Some(Node::Object(xs)), Some(Node::Object(ys))) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys.iter())
                    .all(|((xk, xv), (yk, yv))| xk == yk && node_eq(a, *xv, b, *yv))
        }
        _ => false,
    }
}

/// Structural equality from the roots: same tags, same leaf values, same
/// child order, same keys. Arena identity is irrelevant.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        node_eq(self, self.root, other, other.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_object() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let obj = tree.alloc(Node::Object(Vec::new()));
        tree.set_root(obj);
        (tree, obj)
    }

    #[rstest]
    #[case(0, Some(ValueKind::Null))]
    #[case(3, Some(ValueKind::Object))]
    #[case(6, Some(ValueKind::Bool))]
    #[case(7, None)]
    #[case(0xff, None)]
    fn test_kind_from_u8(#[case] tag: u8, #[case] expected: Option<ValueKind>) {
        assert_eq!(ValueKind::from_u8(tag), expected);
    }

    #[test]
    fn test_set_rejects_duplicate_and_leaves_tree_unchanged() {
        let (mut tree, obj) = sample_object();
        let one = tree.alloc(Node::Int(1));
        let two = tree.alloc(Node::Int(2));
        tree.set(obj, "a", one).unwrap();
        assert_eq!(
            tree.set(obj, "a", two),
            Err(Error::DuplicateKey("a".to_string()))
        );
        assert_eq!(tree.node(obj).len(), 1);
        assert_eq!(tree.entry(obj, "a"), Some(one));
    }

    #[test]
    fn test_push_entry_permits_duplicates_first_match_wins() {
        let (mut tree, obj) = sample_object();
        let one = tree.alloc(Node::Int(1));
        let two = tree.alloc(Node::Int(2));
        tree.push_entry(obj, "a", one).unwrap();
        tree.push_entry(obj, "a", two).unwrap();
        assert_eq!(tree.node(obj).len(), 2);
        assert_eq!(tree.entry(obj, "a"), Some(one));
    }

    #[test]
    fn test_push_on_object_is_type_mismatch() {
        let (mut tree, obj) = sample_object();
        let child = tree.alloc(Node::Null);
        assert_eq!(
            tree.push(obj, child),
            Err(Error::TypeMismatch {
                expected: ValueKind::Array,
                found: ValueKind::Object,
            })
        );
    }

    #[test]
    fn test_insertion_order_is_enumeration_order() {
        let (mut tree, obj) = sample_object();
        for key in ["zebra", "apple", "mango"] {
            let child = tree.alloc(Node::Null);
            tree.set(obj, key, child).unwrap();
        }
        let Node::Object(entries) = tree.node(obj) else {
            panic!("expected object");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_structural_equality_ignores_arena_layout() {
        let mut left = Tree::new();
        let arr = left.alloc(Node::Array(Vec::new()));
        left.set_root(arr);
        let x = left.alloc(Node::Int(1));
        left.push(arr, x).unwrap();

        // Same shape, different allocation order.
        let mut right = Tree::new();
        let y = right.alloc(Node::Int(1));
        let arr = right.alloc(Node::Array(vec![y]));
        right.set_root(arr);

        assert_eq!(left, right);
    }

    #[rstest]
    #[case(Node::Float(f64::NAN), Node::Float(f64::NAN), true)]
    #[case(Node::Float(0.0), Node::Float(-0.0), true)]
    #[case(Node::Float(1.5), Node::Float(1.5), true)]
    #[case(Node::Float(1.5), Node::Float(2.5), false)]
    #[case(Node::Int(1), Node::Float(1.0), false)]
    fn test_leaf_equality(#[case] a: Node, #[case] b: Node, #[case] expected: bool) {
        let mut left = Tree::new();
        let id = left.alloc(a);
        left.set_root(id);
        let mut right = Tree::new();
        let id = right.alloc(b);
        right.set_root(id);
        assert_eq!(left == right, expected);
    }
}
