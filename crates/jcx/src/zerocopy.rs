//! Zero-copy codec: O(1) field access straight off the written buffer.
//!
//! Layout: `[4B magic][u32 version][u32 root_offset][u32 pool_count]`
//! followed by the pool of NUL-terminated UTF-8 strings, then the value
//! records, written depth-first with each composite's children appended
//! after its index table. Every value is a fixed 16-byte record; composite
//! records are followed by one u32 child offset per array element, or a
//! (u32 key offset, u32 value offset) pair per object entry.
//!
//! Offsets stored in the buffer are the writer's absolute positions, and a
//! record also stores its own position (`self_offset`). A reader resolves
//! everything relative to the record in hand:
//! `base = record_offset - self_offset; child = base + table[i]`. No
//! absolute pointer ever lands in the buffer, so it can be mapped, copied
//! or shared at any address and stays navigable.
//!
//! Buffers are read-only once written; concurrent readers are safe. Every
//! access is bounds-checked, and anything that would read past the end of
//! the buffer fails with `TruncatedRecord`.

mod view;
mod writer;

pub use view::{view, ValueView};
pub use writer::encode;

/// Fixed byte size of one value record.
pub const RECORD_SIZE: usize = 16;
/// Magic + version + root offset + pool count.
pub(crate) const HEADER_SIZE: usize = 16;
/// Flag byte for records whose payload holds offsets rather than a value.
pub(crate) const FLAG_OFFSETS: u8 = 1;
