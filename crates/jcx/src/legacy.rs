//! Legacy framing of the pooled format.
//!
//! The historical precursor of the headerless pooled stream: same
//! tag-nibble value encoding, but framed with the shared 4-byte magic and
//! version 1, and pool strings carry a trailing NUL after their packed
//! length (readers skip length + 1). Reads go by cursor position over an
//! in-memory buffer rather than through a stream. Decoding is semantically
//! identical to the pooled format; the two are one family with two framing
//! variants, and a third framing would need a new version number.

use crate::error::{Error, Result, MAX_DEPTH};
use crate::format::{LEGACY_VERSION, MAGIC};
use crate::pack::{self, ByteReader, Major};
use crate::pool::StringPool;
use crate::pooled::{major_kind, write_value};
use crate::tree::{Node, NodeId, Tree, ValueKind};

pub fn encode(tree: &Tree) -> Result<Vec<u8>> {
    let pool = StringPool::collect(tree, tree.root())?;
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&LEGACY_VERSION.to_le_bytes());
    out.extend_from_slice(&(pool.len() as i32).to_le_bytes());
    for entry in pool.iter() {
        pack::write_packed(&mut out, Major::String, entry.len() as i64)?;
        out.extend_from_slice(entry.as_bytes());
        out.push(0);
    }
    write_value(tree, tree.root(), &pool, &mut out, 0)?;
    Ok(out)
}

pub fn decode(bytes: &[u8]) -> Result<Tree> {
    let mut input = ByteReader::new(bytes);
    if input.take(4).map_err(|_| Error::InvalidMagic)? != MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = input.read_u32().map_err(|_| Error::InvalidMagic)?;
    if version != LEGACY_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let pool_count =
        usize::try_from(input.read_i32()?).map_err(|_| Error::TruncatedRecord)?;
    let mut pool = Vec::with_capacity(pool_count.min(4096));
    for _ in 0..pool_count {
        pool.push(read_pool_string(&mut input)?);
    }

    let mut tree = Tree::new();
    let root = read_value(&mut input, &pool, &mut tree, 0)?;
    tree.set_root(root);
    Ok(tree)
}

fn read_pool_string(input: &mut ByteReader<'_>) -> Result<String> {
    let tag = input.read_u8()?;
    let major = Major::from_tag(tag).ok_or(Error::UnknownTypeTag(tag))?;
    if major != Major::String {
        return Err(Error::TypeMismatch {
            expected: ValueKind::String,
            found: major_kind(major),
        });
    }
    let len =
        usize::try_from(input.read_packed(pack::subtype(tag))?).map_err(|_| Error::TruncatedRecord)?;
    let content = std::str::from_utf8(input.take(len)?).map_err(|_| Error::InvalidUtf8)?;
    input.skip(1)?; // terminator
    Ok(content.to_string())
}

fn read_key(input: &mut ByteReader<'_>, pool: &[String]) -> Result<String> {
    let tag = input.read_u8()?;
    let subtype = pack::subtype(tag);
    match Major::from_tag(tag).ok_or(Error::UnknownTypeTag(tag))? {
        Major::Ref => Ok(resolve_ref(input, pool, subtype)?.unwrap_or_default()),
        Major::String => {
            let len = usize::try_from(input.read_packed(subtype)?)
                .map_err(|_| Error::TruncatedRecord)?;
            let content =
                std::str::from_utf8(input.take(len)?).map_err(|_| Error::InvalidUtf8)?;
            Ok(content.to_string())
        }
        other => Err(Error::TypeMismatch {
            expected: ValueKind::String,
            found: major_kind(other),
        }),
    }
}

fn resolve_ref(
    input: &mut ByteReader<'_>,
    pool: &[String],
    subtype: u8,
) -> Result<Option<String>> {
    let index = input.read_packed(subtype)?;
    Ok(usize::try_from(index)
        .ok()
        .and_then(|i| pool.get(i))
        .cloned())
}

fn read_value(
    input: &mut ByteReader<'_>,
    pool: &[String],
    tree: &mut Tree,
    depth: usize,
) -> Result<NodeId> {
    if depth > MAX_DEPTH {
        return Err(Error::DepthExceeded);
    }
    let tag = input.read_u8()?;
    let subtype = pack::subtype(tag);
    let node = match Major::from_tag(tag).ok_or(Error::UnknownTypeTag(tag))? {
        Major::Primitive => match subtype {
            pack::SUB_TRUE => Node::Bool(true),
            pack::SUB_FALSE => Node::Bool(false),
            _ => Node::Null,
        },
        Major::Int => Node::Int(input.read_packed(subtype)?),
        Major::Float => match subtype {
            s if s <= 10 => Node::Float(f64::from(s)),
            pack::SUB_I32 => Node::Float(f64::from(input.read_f32()?)),
            pack::SUB_I64 => Node::Float(input.read_f64()?),
            _ => Node::Float(0.0),
        },
        Major::String => {
            let len = usize::try_from(input.read_packed(subtype)?)
                .map_err(|_| Error::TruncatedRecord)?;
            let content =
                std::str::from_utf8(input.take(len)?).map_err(|_| Error::InvalidUtf8)?;
            Node::String(content.to_string())
        }
        Major::Ref => match resolve_ref(input, pool, subtype)? {
            Some(content) => Node::String(content),
            None => Node::Null,
        },
        Major::Array => {
            let count = input.read_packed(subtype)?.max(0) as usize;
            let array = tree.alloc(Node::Array(Vec::with_capacity(count.min(4096))));
            for _ in 0..count {
                let child = read_value(input, pool, tree, depth + 1)?;
                tree.push(array, child)?;
            }
            return Ok(array);
        }
        Major::Object => {
            let count = input.read_packed(subtype)?.max(0) as usize;
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
