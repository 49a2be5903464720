use rustc_hash::FxHashMap;

use crate::error::{Error, Result, MAX_DEPTH};
use crate::tree::{Node, NodeId, Tree};

/// Deduplicated table of the unique string contents in a tree, in
/// first-seen order.
///
/// Every encoder builds the pool with a full pre-pass over the tree before
/// emitting any value bytes: reference indices (and, in the zero-copy
/// format, pool byte offsets) can only be assigned once the final pool
/// layout is known. Object keys are pooled exactly like string values.
#[derive(Debug, Default)]
pub struct StringPool {
    table: FxHashMap<String, u32>,
    entries: Vec<String>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks the tree and interns every string value and object key.
    pub fn collect(tree: &Tree, root: NodeId) -> Result<Self> {
        let mut pool = StringPool::new();
        pool.visit(tree, root, 0)?;
        Ok(pool)
    }

    fn visit(&mut self, tree: &Tree, id: NodeId, depth: usize) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthExceeded);
        }
        match tree.get(id) {
            Some(Node::String(s)) => {
                self.intern(s);
            }
            Some(Node::Array(items)) => {
                for item in items {
                    self.visit(tree, *item, depth + 1)?;
                }
            }
            Some(Node::Object(entries)) => {
                for (key, value) in entries {
                    self.intern(key);
                    self.visit(tree, *value, depth + 1)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns the stable index for `content`, adding it on first sight.
    pub fn intern(&mut self, content: &str) -> u32 {
        if let Some(index) = self.table.get(content) {
            return *index;
        }
        let index = self.entries.len() as u32;
        self.table.insert(content.to_string(), index);
        self.entries.push(content.to_string());
        index
    }

    pub fn index_of(&self, content: &str) -> Option<u32> {
        self.table.get(content).copied()
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.entries.get(index as usize).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_content_keyed() {
        let mut pool = StringPool::new();
        let a = pool.intern("hello");
        let b = pool.intern("world");
        let c = pool.intern("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_collect_pools_keys_and_values_in_first_seen_order() {
        let mut tree = Tree::new();
        let obj = tree.alloc(Node::Object(Vec::new()));
        tree.set_root(obj);
        let a = tree.alloc(Node::from("hello"));
        let b = tree.alloc(Node::from("hello"));
        tree.set(obj, "a", a).unwrap();
        tree.set(obj, "b", b).unwrap();

        let pool = StringPool::collect(&tree, tree.root()).unwrap();
        let entries: Vec<_> = pool.iter().collect();
        assert_eq!(entries, ["a", "hello", "b"]);
        assert_eq!(pool.index_of("hello"), Some(1));
    }

    #[test]
    fn test_collect_rejects_runaway_nesting() {
        let mut tree = Tree::new();
        let mut current = tree.alloc(Node::Array(Vec::new()));
        tree.set_root(current);
        for _ in 0..300 {
            let inner = tree.alloc(Node::Array(Vec::new()));
            tree.push(current, inner).unwrap();
            current = inner;
        }
        assert_eq!(
            StringPool::collect(&tree, tree.root()).unwrap_err(),
            Error::DepthExceeded
        );
    }
}
