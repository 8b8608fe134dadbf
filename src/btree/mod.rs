//! # Dynamic-Size B+Tree Node Layout
//!
//! This module implements the node layout engine for BurrowDB's B+tree
//! index. Nodes hold keys and values of variable serialized length, so the
//! page cannot be divided into fixed slots. Instead each page carries an
//! offset array at its head and a downward-growing entry heap at its tail.
//!
//! ## Page Layout
//!
//! ```text
//! +-----------------------------+
//! | NodeHeader (12 bytes)       |  type, flags, key_count, generation,
//! |                             |  right sibling
//! +-----------------------------+
//! | alloc_offset (2B)           |  lowest heap byte written so far
//! | dead_space   (2B)           |  bytes held by tombstoned blobs
//! +-----------------------------+
//! | Offset array                |  grows downward from offset 16
//! |   leaf:     [off0][off1]..  |  2 bytes per entry
//! |   internal: [child0]        |  8-byte child pointers interleaved,
//! |     [off0,child1]           |  one more child than keys
//! |     [off1,child2]..         |
//! +-----------------------------+
//! | Free space                  |
//! +-----------------------------+
//! | Entry heap                  |  grows upward from page end
//! |   leaf blob:                |
//! |     [keySize][valueSize]    |
//! |     [key..][value..]        |
//! |   internal blob:            |
//! |     [keySize][key..]        |
//! +-----------------------------+
//! ```
//!
//! The high bit of a blob's key size word is the tombstone bit. Removal
//! tombstones the blob and closes the offset-array hole; the bytes stay in
//! the heap and are accounted in `dead_space` until [`DynamicNode::
//! defragment_leaf`] compacts the heap toward the page end.
//!
//! ## Space Protocol
//!
//! The tree layer asks [`DynamicNode::leaf_overflow`] before every insert.
//! `No` means the entry fits the gap between offset array and heap,
//! `NeedDefrag` means it fits once dead space is reclaimed, and `Yes` means
//! the node must split. [`DynamicNode::split_leaf`] halves *used space*
//! rather than entry count, so a node full of tiny entries and a node with
//! a few huge ones both split evenly.
//!
//! ## Collaborator Seams
//!
//! Keys and values pass through the [`Layout`] capability object, and child
//! pointers through the generation-safe codec in [`pointer`]. The tree
//! algorithms above decide ordering and positions; the node only ever sees
//! logical slot indices.

mod defrag;
mod layout;
mod node;
pub mod pointer;
mod split;

pub use layout::{BytesLayout, Layout};
pub use node::{
    DynamicNode, Overflow, BYTE_POS_ALLOC_OFFSET, BYTE_POS_DEAD_SPACE, DYNAMIC_HEADER_SIZE,
};
pub use split::SplitPropagation;
