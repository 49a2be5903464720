//! Pooled binary codec: the compact tag-nibble format.
//!
//! Layout: `[i32 pool_count][pool entries][root value]`, all integers
//! little-endian. Pool entries are String-tagged packed lengths followed by
//! the raw UTF-8 bytes. String values never appear inline at their use
//! site; the writer replaces each one with a Ref carrying its pool index,
//! which is how repeated strings cost one payload plus a byte or two per
//! occurrence.
//!
//! This format has no framing header. Buffers that start with the shared
//! magic belong to the legacy or zero-copy variants (see `format`).

use std::io::{Read, Write};

use crate::error::{Error, Result, MAX_DEPTH};
use crate::pack::{self, Major};
use crate::pool::StringPool;
use crate::tree::{Node, NodeId, Tree, ValueKind};

pub fn encode(tree: &Tree) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_to(tree, &mut out)?;
    Ok(out)
}

/// Serializes a tree to a stream. The string pool is finalized by a full
/// pre-pass before any value bytes go out.
pub fn encode_to<W: Write>(tree: &Tree, out: &mut W) -> Result<()> {
    let pool = StringPool::collect(tree, tree.root())?;
    out.write_all(&(pool.len() as i32).to_le_bytes())?;
    for entry in pool.iter() {
        pack::write_packed(out, Major::String, entry.len() as i64)?;
        out.write_all(entry.as_bytes())?;
    }
    write_value(tree, tree.root(), &pool, out, 0)
}

pub fn decode(bytes: &[u8]) -> Result<Tree> {
    decode_from(&mut &bytes[..])
}

/// Reads one serialized tree from a stream, materializing every node into
/// a fresh arena. Decoded trees fully own their storage; pool references
/// are resolved to independent string copies.
pub fn decode_from<R: Read>(input: &mut R) -> Result<Tree> {
    let mut count = [0u8; 4];
    input.read_exact(&mut count)?;
    let pool_count =
        usize::try_from(i32::from_le_bytes(count)).map_err(|_| Error::TruncatedRecord)?;

    let mut pool = Vec::with_capacity(pool_count.min(4096));
    for _ in 0..pool_count {
        pool.push(read_pool_string(input)?);
    }

    let mut tree = Tree::new();
    let root = read_value(input, &pool, &mut tree, 0)?;
    tree.set_root(root);
    Ok(tree)
}

pub(crate) fn write_value<W: Write>(
    tree: &Tree,
    id: NodeId,
    pool: &StringPool,
    out: &mut W,
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::DepthExceeded);
    }
    match tree.node(id) {
        Node::Null => out.write_all(&[pack::tag(Major::Primitive, pack::SUB_NULL)])?,
        Node::Bool(true) => out.write_all(&[pack::tag(Major::Primitive, pack::SUB_TRUE)])?,
        Node::Bool(false) => out.write_all(&[pack::tag(Major::Primitive, pack::SUB_FALSE)])?,
        Node::Int(value) => pack::write_packed(out, Major::Int, *value)?,
        Node::Float(value) => {
            if *value == 0.0 {
                out.write_all(&[pack::tag(Major::Float, 0)])?;
            } else {
                out.write_all(&[pack::tag(Major::Float, pack::SUB_I64)])?;
                out.write_all(&value.to_le_bytes())?;
            }
        }
        Node::String(s) => write_ref(s, pool, out)?,
        Node::Array(items) => {
            pack::write_packed(out, Major::Array, items.len() as i64)?;
            for item in items {
                write_value(tree, *item, pool, out, depth + 1)?;
            }
        }
        Node::Object(entries) => {
            pack::write_packed(out, Major::Object, entries.len() as i64)?;
            for (key, value) in entries {
                write_ref(key, pool, out)?;
                write_value(tree, *value, pool, out, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn write_ref<W: Write>(content: &str, pool: &StringPool, out: &mut W) -> Result<()> {
    let index = pool
        .index_of(content)
        .ok_or_else(|| Error::Io(format!("string missing from pool: {content:?}")))?;
    pack::write_packed(out, Major::Ref, i64::from(index))
}

fn read_u8<R: Read>(input: &mut R) -> Result<u8> {
    let mut byte = [0u8; 1];
    input.read_exact(&mut byte)?;
    Ok(byte[0])
}

pub(crate) fn major_kind(major: Major) -> ValueKind {
    match major {
        Major::Primitive => ValueKind::Null,
        Major::Int => ValueKind::Int,
        Major::Float => ValueKind::Float,
        Major::Array => ValueKind::Array,
        Major::Object => ValueKind::Object,
        Major::String | Major::Ref => ValueKind::String,
    }
}

fn read_string_body<R: Read>(input: &mut R, subtype: u8) -> Result<String> {
    let len = usize::try_from(pack::read_packed(input, subtype)?)
        .map_err(|_| Error::TruncatedRecord)?;
    let mut bytes = vec![0u8; len];
    input.read_exact(&mut bytes).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::TruncatedRecord
        } else {
            Error::Io(err.to_string())
        }
    })?;
    String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
}

fn read_pool_string<R: Read>(input: &mut R) -> Result<String> {
    let tag = read_u8(input)?;
    let major = Major::from_tag(tag).ok_or(Error::UnknownTypeTag(tag))?;
    if major != Major::String {
        return Err(Error::TypeMismatch {
            expected: ValueKind::String,
            found: major_kind(major),
        });
    }
    read_string_body(input, pack::subtype(tag))
}

/// Object keys are conventionally Refs; inline strings are accepted too.
fn read_key<R: Read>(input: &mut R, pool: &[String]) -> Result<String> {
    let tag = read_u8(input)?;
    let subtype = pack::subtype(tag);
    let major = Major::from_tag(tag).ok_or(Error::UnknownTypeTag(tag))?;
    match major {
        Major::Ref => Ok(resolve_ref(input, pool, subtype)?.unwrap_or_default()),
        Major::String => read_string_body(input, subtype),
        other => Err(Error::TypeMismatch {
            expected: ValueKind::String,
            found: major_kind(other),
        }),
    }
}

/// A reference beyond the pool decodes as `None`; the caller maps that to
/// Null. Unreachable from buffers this writer produced.
fn resolve_ref<R: Read>(input: &mut R, pool: &[String], subtype: u8) -> Result<Option<String>> {
    let index = pack::read_packed(input, subtype)?;
    let resolved = usize::try_from(index)
        .ok()
        .and_then(|i| pool.get(i))
        .cloned();
    Ok(resolved)
}

fn read_value<R: Read>(
    input: &mut R,
    pool: &[String],
    tree: &mut Tree,
    depth: usize,
) -> Result<NodeId> {
    if depth > MAX_DEPTH {
        return Err(Error::DepthExceeded);
    }
    let tag = read_u8(input)?;
    let subtype = pack::subtype(tag);
    let node = match Major::from_tag(tag).ok_or(Error::UnknownTypeTag(tag))? {
        Major::Primitive => match subtype {
            pack::SUB_TRUE => Node::Bool(true),
            pack::SUB_FALSE => Node::Bool(false),
            _ => Node::Null,
        },
        Major::Int => Node::Int(pack::read_packed(input, subtype)?),
        Major::Float => match subtype {
            s if s <= 10 => Node::Float(f64::from(s)),
            pack::SUB_I32 => {
                let mut buf = [0u8; 4];
                input.read_exact(&mut buf).map_err(|_| Error::TruncatedRecord)?;
                Node::Float(f64::from(f32::from_le_bytes(buf)))
            }
            pack::SUB_I64 => {
                let mut buf = [0u8; 8];
                input.read_exact(&mut buf).map_err(|_| Error::TruncatedRecord)?;
                Node::Float(f64::from_le_bytes(buf))
            }
            _ => Node::Float(0.0),
        },
        Major::String => Node::String(read_string_body(input, subtype)?),
        Major::Ref => match resolve_ref(input, pool, subtype)? {
            Some(content) => Node::String(content),
            None => Node::Null,
        },
        Major::Array => {
            let count = pack::read_packed(input, subtype)?.max(0) as usize;
            let array = tree.alloc(Node::Array(Vec::with_capacity(count.min(4096))));
            for _ in 0..count {
                let child = read_value(input, pool, tree, depth + 1)?;
                tree.push(array, child)?;
            }
            return Ok(array);
        }
        Major::Object => {
            let count = pack::read_packed(input, subtype)?.max(0) as usize;
            let object = tree.alloc(Node::Object(Vec::with_capacity(count.min(4096))));
            for _ in 0..count {
                let key = read_key(input, pool)?;
                let value = read_value(input, pool, tree, depth + 1)?;
                tree.push_entry(object, key, value)?;
            }
            return Ok(object);
        }
    };
    Ok(tree.alloc(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn leaf_tree(node: Node) -> Tree {
        let mut tree = Tree::new();
        let id = tree.alloc(node);
        tree.set_root(id);
        tree
    }

    #[test]
    fn test_empty_object_layout() {
        let tree = leaf_tree(Node::Object(Vec::new()));
        let bytes = encode(&tree).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0x40]);

        let back = decode(&bytes).unwrap();
        assert_eq!(back.node(back.root()).kind(), ValueKind::Object);
        assert_eq!(back.node(back.root()).len(), 0);
    }

    #[test]
    fn test_small_int_array_layout() {
        let mut tree = Tree::new();
        let arr = tree.alloc(Node::Array(Vec::new()));
        tree.set_root(arr);
        for v in [1i64, 2, 3] {
            let child = tree.alloc(Node::Int(v));
            tree.push(arr, child).unwrap();
        }
        let bytes = encode(&tree).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0x33, 0x11, 0x12, 0x13]);
        assert_eq!(decode(&bytes).unwrap(), tree);
    }

    #[test]
    fn test_shared_string_pools_once() {
        let mut tree = Tree::new();
        let obj = tree.alloc(Node::Object(Vec::new()));
        tree.set_root(obj);
        let a = tree.alloc(Node::from("hello"));
        let b = tree.alloc(Node::from("hello"));
        tree.set(obj, "a", a).unwrap();
        tree.set(obj, "b", b).unwrap();

        let bytes = encode(&tree).unwrap();
        let needle: &[u8] = b"hello";
        let occurrences = bytes.windows(5).filter(|w| *w == needle).count();
        assert_eq!(occurrences, 1);
        assert_eq!(i32::from_le_bytes(bytes[0..4].try_into().unwrap()), 3);

        let back = decode(&bytes).unwrap();
        assert_eq!(back, tree);
        let a = back.entry(back.root(), "a").unwrap();
        let b = back.entry(back.root(), "b").unwrap();
        assert_eq!(back.node(a).as_str(), Some("hello"));
        assert_eq!(back.node(b).as_str(), Some("hello"));
    }

    #[rstest]
    #[case(Node::Null)]
    #[case(Node::Bool(true))]
    #[case(Node::Bool(false))]
    #[case(Node::Int(0))]
    #[case(Node::Int(-1))]
    #[case(Node::Int(i64::MAX))]
    #[case(Node::Float(0.0))]
    #[case(Node::Float(-2.75))]
    #[case(Node::String(String::new()))]
    #[case(Node::from("snowman \u{2603}"))]
    fn test_leaf_round_trip(#[case] node: Node) {
        let tree = leaf_tree(node);
        assert_eq!(decode(&encode(&tree).unwrap()).unwrap(), tree);
    }

    #[test]
    fn test_int_leaf_sizes() {
        // Small ints and -1 are one byte after the pool header; any i64 is
        // at most nine.
        for v in 0..=10i64 {
            assert_eq!(encode(&leaf_tree(Node::Int(v))).unwrap().len(), 4 + 1);
        }
        assert_eq!(encode(&leaf_tree(Node::Int(-1))).unwrap().len(), 4 + 1);
        assert_eq!(encode(&leaf_tree(Node::Int(i64::MIN))).unwrap().len(), 4 + 9);
    }

    #[test]
    fn test_zero_float_is_one_byte_nonzero_is_nine() {
        assert_eq!(encode(&leaf_tree(Node::Float(0.0))).unwrap().len(), 4 + 1);
        assert_eq!(encode(&leaf_tree(Node::Float(0.5))).unwrap().len(), 4 + 9);
    }

    #[test]
    fn test_reader_accepts_f32_subtype_writer_never_emits() {
        let mut bytes = vec![0, 0, 0, 0];
        bytes.push(pack::tag(Major::Float, pack::SUB_I32));
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        let tree = decode(&bytes).unwrap();
        assert_eq!(tree.node(tree.root()).as_float(), Some(1.5));
    }

    #[test]
    fn test_ref_out_of_pool_decodes_null() {
        let bytes = vec![0, 0, 0, 0, pack::tag(Major::Ref, 4)];
        let tree = decode(&bytes).unwrap();
        assert!(tree.node(tree.root()).is_null());
    }

    #[test]
    fn test_unknown_major_is_fatal() {
        let bytes = vec![0, 0, 0, 0, 0x70];
        assert_eq!(decode(&bytes).unwrap_err(), Error::UnknownTypeTag(0x70));
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0, 0])]
    fn test_missing_header_is_end_of_input(#[case] bytes: &[u8]) {
        assert_eq!(decode(bytes).unwrap_err(), Error::UnexpectedEndOfInput);
    }

    #[test]
    fn test_truncated_payload_is_fatal() {
        let tree = leaf_tree(Node::Float(6.25));
        let bytes = encode(&tree).unwrap();
        assert_eq!(decode(&bytes[..7]).unwrap_err(), Error::TruncatedRecord);
    }

    #[test]
    fn test_duplicate_keys_survive_decode() {
        let mut tree = Tree::new();
        let obj = tree.alloc(Node::Object(Vec::new()));
        tree.set_root(obj);
        let one = tree.alloc(Node::Int(1));
        let two = tree.alloc(Node::Int(2));
        tree.push_entry(obj, "k", one).unwrap();
        tree.push_entry(obj, "k", two).unwrap();

        let back = decode(&encode(&tree).unwrap()).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.node(back.root()).len(), 2);
    }

    #[test]
    fn test_nesting_beyond_limit_fails_cleanly() {
        let mut tree = Tree::new();
        let mut current = tree.alloc(Node::Array(Vec::new()));
        tree.set_root(current);
        for _ in 0..1000 {
            let inner = tree.alloc(Node::Array(Vec::new()));
            tree.push(current, inner).unwrap();
            current = inner;
        }
        assert_eq!(encode(&tree).unwrap_err(), Error::DepthExceeded);
    }
}
