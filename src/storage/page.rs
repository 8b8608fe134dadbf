//! # Node Header Layout
//!
//! Every node page begins with a fixed 12-byte header holding the base tree
//! fields. The dynamic-size layout appends its own two words (alloc offset
//! and dead space) right after it; those are owned by the node engine in
//! `btree`, not by this struct.
//!
//! ## Header Layout (12 bytes)
//!
//! ```text
//! Offset  Size  Field          Description
//! ------  ----  -------------  -------------------------------------
//! 0       1     node_type      Internal (0x01) or Leaf (0x02)
//! 1       1     flags          Reserved, written as zero
//! 2       2     key_count      Number of live entries in the node
//! 4       4     generation     Generation the node was written under
//! 8       4     right_sibling  Right sibling page (0 = none)
//! ```
//!
//! ## Zero-Copy Access
//!
//! `NodeHeader` uses `zerocopy` with unaligned little-endian fields so it
//! can be viewed in place at the start of any page buffer:
//!
//! ```text
//! let header = NodeHeader::from_bytes(&page[..12])?;
//! ```

use eyre::{ensure, Result};
use zerocopy::{
    byteorder::{LittleEndian, U16, U32},
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
};

pub const NODE_HEADER_SIZE: usize = 12;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Unknown = 0x00,
    Internal = 0x01,
    Leaf = 0x02,
}

impl PageType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x01 => PageType::Internal,
            0x02 => PageType::Leaf,
            _ => PageType::Unknown,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    node_type: u8,
    flags: u8,
    key_count: U16<LittleEndian>,
    generation: U32<LittleEndian>,
    right_sibling: U32<LittleEndian>,
}

impl NodeHeader {
    pub fn new(node_type: PageType, generation: u32) -> Self {
        Self {
            node_type: node_type as u8,
            flags: 0,
            key_count: U16::new(0),
            generation: U32::new(generation),
            right_sibling: U32::new(0),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        Self::ref_from_bytes(&data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        Self::mut_from_bytes(&mut data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn write_to(&self, data: &mut [u8]) -> Result<()> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        data[..NODE_HEADER_SIZE].copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn node_type(&self) -> PageType {
        PageType::from_byte(self.node_type)
    }

    pub fn set_node_type(&mut self, node_type: PageType) {
        self.node_type = node_type as u8;
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags;
    }

    pub fn key_count(&self) -> u16 {
        self.key_count.get()
    }

    pub fn set_key_count(&mut self, count: u16) {
        self.key_count = U16::new(count);
    }

    pub fn generation(&self) -> u32 {
        self.generation.get()
    }

    pub fn set_generation(&mut self, generation: u32) {
        self.generation = U32::new(generation);
    }

    pub fn right_sibling(&self) -> u32 {
        self.right_sibling.get()
    }

    pub fn set_right_sibling(&mut self, page_no: u32) {
        self.right_sibling = U32::new(page_no);
    }
}

/// Light structural check used by the layer handing pages to the engine. A
/// fully zeroed header is valid (freshly allocated page).
pub fn validate_page(data: &[u8]) -> Result<()> {
    let header = NodeHeader::from_bytes(data)?;

    let is_zeroed = header.node_type == 0 && header.flags == 0 && header.key_count() == 0;
    if is_zeroed {
        return Ok(());
    }

    ensure!(
        header.node_type() != PageType::Unknown,
        "invalid node type: {:02x}",
        header.node_type
    );

    Ok(())
}
