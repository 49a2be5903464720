use crate::error::{Error, Result, MAX_DEPTH};
use crate::format::{MAGIC, ZERO_COPY_VERSION};
use crate::tree::{Node, NodeId, Tree, ValueKind};

use super::{HEADER_SIZE, RECORD_SIZE};

/// Validates the header and returns a view of the root record.
///
/// No bytes are copied and nothing is allocated; the returned view borrows
/// the buffer, which must outlive every view derived from it.
pub fn view(bytes: &[u8]) -> Result<ValueView<'_>> {
    if bytes.len() < HEADER_SIZE || bytes[0..4] != MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != ZERO_COPY_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let root = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    ValueView::at_offset(bytes, root)
}

fn read_u32_at(buf: &[u8], at: usize) -> Result<u32> {
    let end = at.checked_add(4).ok_or(Error::TruncatedRecord)?;
    let bytes = buf.get(at..end).ok_or(Error::TruncatedRecord)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_cstr(buf: &[u8], at: usize) -> Result<&str> {
    let rest = buf.get(at..).ok_or(Error::TruncatedRecord)?;
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::TruncatedRecord)?;
    std::str::from_utf8(&rest[..nul]).map_err(|_| Error::InvalidUtf8)
}

/// A borrowed handle to one record in a zero-copy buffer.
///
/// Kind and record bounds are validated when the view is constructed, so
/// the leaf accessors are infallible lookups; only operations that follow
/// offsets (strings, children, keys) can hit corruption and return errors.
#[derive(Debug, Clone, Copy)]
pub struct ValueView<'a> {
    buf: &'a [u8],
    offset: usize,
    kind: ValueKind,
}

impl<'a> ValueView<'a> {
    pub(crate) fn at_offset(buf: &'a [u8], offset: usize) -> Result<Self> {
        let end = offset.checked_add(RECORD_SIZE).ok_or(Error::TruncatedRecord)?;
        let record = buf.get(offset..end).ok_or(Error::TruncatedRecord)?;
        let kind = ValueKind::from_u8(record[8]).ok_or(Error::UnknownTypeTag(record[8]))?;
        Ok(ValueView { buf, offset, kind })
    }

    fn record(&self) -> &'a [u8] {
        &self.buf[self.offset..self.offset + RECORD_SIZE]
    }

    fn payload_pair(&self) -> (u32, u32) {
        let r = self.record();
        (
            u32::from_le_bytes([r[0], r[1], r[2], r[3]]),
            u32::from_le_bytes([r[4], r[5], r[6], r[7]]),
        )
    }

    /// Buffer position all stored offsets are relative to: this record's
    /// address minus its recorded own position.
    fn base(&self) -> Result<usize> {
        let (self_offset, _) = self.payload_pair();
        self.offset
            .checked_sub(self_offset as usize)
            .ok_or(Error::TruncatedRecord)
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_null(&self) -> bool {
        self.kind == ValueKind::Null
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            ValueKind::Bool => Some(self.record()[0] != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind {
            ValueKind::Int => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&self.record()[0..8]);
                Some(i64::from_le_bytes(bytes))
            }
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.kind {
            ValueKind::Float => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&self.record()[0..8]);
                Some(f64::from_le_bytes(bytes))
            }
            _ => None,
        }
    }

    /// String content, borrowed from the pool section of the buffer.
    pub fn as_str(&self) -> Result<&'a str> {
        if self.kind != ValueKind::String {
            return Err(Error::TypeMismatch {
                expected: ValueKind::String,
                found: self.kind,
            });
        }
        let (_, pool_pos) = self.payload_pair();
        let at = self
            .base()?
            .checked_add(pool_pos as usize)
            .ok_or(Error::TruncatedRecord)?;
        read_cstr(self.buf, at)
    }

    /// Child count for composites, 0 for leaves.
    pub fn len(&self) -> usize {
        match self.kind {
            ValueKind::Array | ValueKind::Object => self.payload_pair().1 as usize,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn child_at(&self, table_pos: usize) -> Result<ValueView<'a>> {
        let stored = read_u32_at(self.buf, table_pos)?;
        let child = self
            .base()?
            .checked_add(stored as usize)
            .ok_or(Error::TruncatedRecord)?;
        ValueView::at_offset(self.buf, child)
    }

    /// Array element by index. `Ok(None)` when this is not an array or the
    /// index is past the end; errors only on a corrupt buffer.
    pub fn at(&self, index: usize) -> Result<Option<ValueView<'a>>> {
        if self.kind != ValueKind::Array || index >= self.len() {
            return Ok(None);
        }
        let table_pos = self.offset + RECORD_SIZE + 4 * index;
        Ok(Some(self.child_at(table_pos)?))
    }

    /// Object entry by position: `(key, value)`.
    pub fn entry(&self, index: usize) -> Result<Option<(&'a str, ValueView<'a>)>> {
        if self.kind != ValueKind::Object || index >= self.len() {
            return Ok(None);
        }
        let slot = self.offset + RECORD_SIZE + 8 * index;
        let key_pos = read_u32_at(self.buf, slot)?;
        let key_at = self
            .base()?
            .checked_add(key_pos as usize)
            .ok_or(Error::TruncatedRecord)?;
        let key = read_cstr(self.buf, key_at)?;
        let value = self.child_at(slot + 4)?;
        Ok(Some((key, value)))
    }

    /// Linear scan of the object's table for the first entry whose key
    /// bytes match. There is no secondary index.
    pub fn get(&self, key: &str) -> Result<Option<ValueView<'a>>> {
        for index in 0..self.len() {
            if let Some((found, value)) = self.entry(index)? {
                if found == key {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<ValueView<'a>>> + '_ {
        (0..self.len()).map(|i| {
            self.at(i)
                .and_then(|child| child.ok_or(Error::TruncatedRecord))
        })
    }

    pub fn entries(&self) -> impl Iterator<Item = Result<(&'a str, ValueView<'a>)>> + '_ {
        (0..self.len()).map(|i| {
            self.entry(i)
                .and_then(|entry| entry.ok_or(Error::TruncatedRecord))
        })
    }

    /// Copies the viewed structure into an owned tree.
    pub fn materialize(&self) -> Result<Tree> {
        let mut tree = Tree::new();
        let root = self.build(&mut tree, 0)?;
        tree.set_root(root);
        Ok(tree)
    }

    fn build(&self, tree: &mut Tree, depth: usize) -> Result<NodeId> {
        if depth > MAX_DEPTH {
            return Err(Error::DepthExceeded);
        }
        let node = match self.kind {
            ValueKind::Null => Node::Null,
            ValueKind::Bool => Node::Bool(self.record()[0] != 0),
            ValueKind::Int => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&self.record()[0..8]);
                Node::Int(i64::from_le_bytes(bytes))
            }
            ValueKind::Float => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&self.record()[0..8]);
                Node::Float(f64::from_le_bytes(bytes))
            }
            ValueKind::String => Node::String(self.as_str()?.to_string()),
            ValueKind::Array => {
                let array = tree.alloc(Node::Array(Vec::with_capacity(self.len().min(4096))));
                for index in 0..self.len() {
                    let child = self
                        .at(index)?
                        .ok_or(Error::TruncatedRecord)?
                        .build(tree, depth + 1)?;
                    tree.push(array, child)?;
                }
                return Ok(array);
            }
            ValueKind::Object => {
                let object = tree.alloc(Node::Object(Vec::with_capacity(self.len().min(4096))));
                for index in 0..self.len() {
                    let (key, value) = self.entry(index)?.ok_or(Error::TruncatedRecord)?;
                    let child = value.build(tree, depth + 1)?;
                    tree.push_entry(object, key, child)?;
                }
                return Ok(object);
            }
        };
        Ok(tree.alloc(node))
    }
}
