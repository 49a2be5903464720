use crate::error::{Error, Result, MAX_DEPTH};
use crate::format::{MAGIC, ZERO_COPY_VERSION};
use crate::pool::StringPool;
use crate::tree::{Node, NodeId, Tree, ValueKind};

use super::{FLAG_OFFSETS, RECORD_SIZE};

/// Serializes a tree into the zero-copy layout.
///
/// Two passes by necessity: string deduplication decides which pool offsets
/// exist, and records embed those offsets, so the pool must be complete
/// before the first record byte is emitted.
pub fn encode(tree: &Tree) -> Result<Vec<u8>> {
    let pool = StringPool::collect(tree, tree.root())?;

    let mut buf = Vec::new();
    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&ZERO_COPY_VERSION.to_le_bytes());
    let root_slot = buf.len();
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&(pool.len() as u32).to_le_bytes());

    let mut pool_offsets = Vec::with_capacity(pool.len());
    for entry in pool.iter() {
        pool_offsets.push(buf.len() as u32);
        buf.extend_from_slice(entry.as_bytes());
        buf.push(0);
    }

    let root_offset = buf.len() as u32;
    buf[root_slot..root_slot + 4].copy_from_slice(&root_offset.to_le_bytes());

    write_value(tree, tree.root(), &pool, &pool_offsets, &mut buf, 0)?;
    Ok(buf)
}

fn pool_offset(pool: &StringPool, offsets: &[u32], content: &str) -> Result<u32> {
    pool.index_of(content)
        .and_then(|index| offsets.get(index as usize).copied())
        .ok_or_else(|| Error::Io(format!("string missing from pool: {content:?}")))
}

fn push_record(buf: &mut Vec<u8>, payload: [u8; 8], kind: ValueKind, flag: u8) {
    buf.extend_from_slice(&payload);
    buf.push(kind as u8);
    buf.push(flag);
    buf.extend_from_slice(&[0u8; RECORD_SIZE - 10]);
}

fn offset_pair(self_offset: u32, size_or_pos: u32) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[0..4].copy_from_slice(&self_offset.to_le_bytes());
    payload[4..8].copy_from_slice(&size_or_pos.to_le_bytes());
    payload
}

fn write_value(
    tree: &Tree,
    id: NodeId,
    pool: &StringPool,
    pool_offsets: &[u32],
    buf: &mut Vec<u8>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::DepthExceeded);
    }
    let self_offset = buf.len() as u32;
    match tree.node(id) {
        Node::Null => push_record(buf, [0u8; 8], ValueKind::Null, 0),
        Node::Bool(b) => {
            let mut payload = [0u8; 8];
            payload[0] = u8::from(*b);
            push_record(buf, payload, ValueKind::Bool, 0);
        }
        Node::Int(v) => push_record(buf, v.to_le_bytes(), ValueKind::Int, 0),
        Node::Float(v) => push_record(buf, v.to_le_bytes(), ValueKind::Float, 0),
        Node::String(s) => {
            let pos = pool_offset(pool, pool_offsets, s)?;
            push_record(
                buf,
                offset_pair(self_offset, pos),
                ValueKind::String,
                FLAG_OFFSETS,
            );
        }
        Node::Array(items) => {
            push_record(
                buf,
                offset_pair(self_offset, items.len() as u32),
                ValueKind::Array,
                FLAG_OFFSETS,
            );
            let table = buf.len();
            buf.resize(table + 4 * items.len(), 0);
            for (i, item) in items.iter().enumerate() {
                let child_offset = buf.len() as u32;
                let slot = table + 4 * i;
                buf[slot..slot + 4].copy_from_slice(&child_offset.to_le_bytes());
                write_value(tree, *item, pool, pool_offsets, buf, depth + 1)?;
            }
        }
        Node::Object(entries) => {
            push_record(
                buf,
                offset_pair(self_offset, entries.len() as u32),
                ValueKind::Object,
                FLAG_OFFSETS,
            );
            let table = buf.len();
            buf.resize(table + 8 * entries.len(), 0);
            for (i, (key, value)) in entries.iter().enumerate() {
                let slot = table + 8 * i;
                let key_pos = pool_offset(pool, pool_offsets, key)?;
                buf[slot..slot + 4].copy_from_slice(&key_pos.to_le_bytes());
                let value_offset = buf.len() as u32;
                buf[slot + 4..slot + 8].copy_from_slice(&value_offset.to_le_bytes());
                write_value(tree, *value, pool, pool_offsets, buf, depth + 1)?;
            }
        }
    }
    Ok(())
}
