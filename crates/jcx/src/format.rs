//! The single entry point over the three wire formats.
//!
//! The pooled stream, its legacy framing and the zero-copy layout are three
//! incompatible byte layouts kept deliberately distinct: persisted files
//! depend on their exact bytes. Buffers carrying the shared magic dispatch
//! on the version field; anything else is the headerless pooled stream.

use std::fmt::{self, Display, Formatter};

use crate::error::{Error, Result};
use crate::tree::Tree;
use crate::{legacy, pooled, zerocopy};

pub const MAGIC: [u8; 4] = *b"JCXX";
pub const LEGACY_VERSION: u32 = 1;
pub const ZERO_COPY_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Compact tag-nibble stream with a string pool, no framing header.
    Pooled,
    /// The pooled family's historical framing: magic, version 1,
    /// NUL-terminated pool strings.
    Legacy,
    /// Relocatable offset-indexed records, version 2.
    ZeroCopy,
}

impl Format {
    /// Identifies which format a buffer carries. Buffers with the magic
    /// but an unknown version are rejected.
    pub fn sniff(bytes: &[u8]) -> Result<Format> {
        if bytes.len() < 8 || bytes[0..4] != MAGIC {
            return Ok(Format::Pooled);
        }
        match u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) {
            LEGACY_VERSION => Ok(Format::Legacy),
            ZERO_COPY_VERSION => Ok(Format::ZeroCopy),
            other => Err(Error::UnsupportedVersion(other)),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Pooled => "pooled",
            Format::Legacy => "legacy",
            Format::ZeroCopy => "zero-copy",
        };
        write!(f, "{}", name)
    }
}

pub fn encode(tree: &Tree, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Pooled => pooled::encode(tree),
        Format::Legacy => legacy::encode(tree),
        Format::ZeroCopy => zerocopy::encode(tree),
    }
}

/// Decodes a buffer of any format into an owned tree, sniffing which
/// codec wrote it. Zero-copy buffers are materialized; use
/// [`zerocopy::view`] directly to navigate them without allocation.
pub fn decode(bytes: &[u8]) -> Result<Tree> {
    match Format::sniff(bytes)? {
        Format::Pooled => pooled::decode(bytes),
        Format::Legacy => legacy::decode(bytes),
        Format::ZeroCopy => zerocopy::view(bytes)?.materialize(),
    }
}
