//! `jcx` is a compact binary serialization engine for JSON-like trees:
//! null, boolean, integer, float, string, array, object.
//!
//! Two goals drive the formats: minimal size (variable-width integer
//! packing plus string deduplication through a pool) and, in the zero-copy
//! layout, navigation straight off the serialized buffer with no
//! allocation and no object graph.
//!
//! ## Examples
//!
//! ```
//! use jcx::{Node, Tree};
//!
//! let mut tree = Tree::new();
//! let obj = tree.alloc(Node::Object(Vec::new()));
//! tree.set_root(obj);
//! let name = tree.alloc(Node::from("voyager"));
//! tree.set(obj, "name", name).unwrap();
//!
//! // Size-optimized pooled stream.
//! let bytes = jcx::pooled::encode(&tree).unwrap();
//! assert_eq!(jcx::pooled::decode(&bytes).unwrap(), tree);
//!
//! // Zero-copy: field access without materializing anything.
//! let bytes = jcx::zerocopy::encode(&tree).unwrap();
//! let root = jcx::zerocopy::view(&bytes).unwrap();
//! let name = root.get("name").unwrap().unwrap();
//! assert_eq!(name.as_str().unwrap(), "voyager");
//!
//! // Or parse JSON text and let the front door pick the codec.
//! let (tree, err) = jcx::json::parse(r#"{"a": [1, 2, 3]}"#);
//! assert!(err.is_none());
//! let bytes = jcx::encode(&tree, jcx::Format::ZeroCopy).unwrap();
//! assert_eq!(jcx::decode(&bytes).unwrap(), tree);
//! ```

mod arena;
mod error;
mod format;
pub mod himl;
pub mod json;
pub mod legacy;
mod pack;
mod pool;
pub mod pooled;
mod tree;
pub mod zerocopy;

pub use arena::{Arena, ArenaId};
pub use error::{Error, Result, SourceError, MAX_DEPTH};
pub use format::{decode, encode, Format, LEGACY_VERSION, MAGIC, ZERO_COPY_VERSION};
pub use pool::StringPool;
pub use tree::{Node, NodeId, Tree, ValueKind};
pub use zerocopy::ValueView;
