//! # Dynamic-Size Node Engine
//!
//! [`DynamicNode`] is the layout engine for one node page: it places entry
//! blobs in the heap, maintains the offset array, tracks free and dead
//! space, and answers the overflow and underflow questions the tree layer
//! asks before mutating.
//!
//! ## Design Notes
//!
//! The engine is a pure transformation over page bytes plus the external
//! [`Layout`] codec; it owns no page state itself. Every operation receives
//! a [`PageCursor`] held exclusively by the caller for the duration of the
//! call, runs to completion, and reports structural corruption through the
//! cursor's sticky exception instead of panicking.
//!
//! Insertion prepends the blob at `alloc_offset - blob size` and opens a
//! hole in the offset array. Removal tombstones the blob in place, bumps
//! `dead_space`, and closes the hole; the heap is only rewritten when the
//! space accountant demands a defragmentation (see the `defrag` module).
//!
//! ## Unsupported Operations
//!
//! The dynamic-size layout is intentionally partial: internal-node splits
//! and leaf rebalancing across siblings are not implemented in this
//! snapshot. The corresponding operations return errors; the tree layer
//! must not call them on dynamic-size nodes.

use std::fmt;
use std::fmt::Write as _;

use eyre::{bail, ensure, Result};

use crate::btree::layout::Layout;
use crate::btree::pointer::{self, CHILD_POINTER_SIZE};
use crate::config::{LEAST_NUMBER_OF_ENTRIES_PER_PAGE, MAX_PAGE_SIZE, MINIMUM_ENTRY_SIZE_CAP};
use crate::encoding::dynsize::{
    has_tombstone, put_key_offset, put_key_size, put_tombstone, put_value_size, read_key_offset,
    read_key_size, read_value_size, strip_tombstone, BYTE_SIZE_KEY_SIZE, BYTE_SIZE_OFFSET,
    BYTE_SIZE_TOTAL_OVERHEAD, BYTE_SIZE_VALUE_SIZE,
};
use crate::storage::{NodeHeader, PageCursor, PageType, NODE_HEADER_SIZE};

/// Byte position of the alloc-offset word, right after the base header.
pub const BYTE_POS_ALLOC_OFFSET: usize = NODE_HEADER_SIZE;

/// Byte position of the dead-space word.
pub const BYTE_POS_DEAD_SPACE: usize = BYTE_POS_ALLOC_OFFSET + BYTE_SIZE_OFFSET;

/// End of the fixed header; the offset array starts here.
pub const DYNAMIC_HEADER_SIZE: usize = BYTE_POS_DEAD_SPACE + BYTE_SIZE_OFFSET;

/// Answer of the leaf space accountant for an incoming entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// The entry fits the gap between offset array and heap.
    No,
    /// The entry fits once tombstoned blobs are reclaimed.
    NeedDefrag,
    /// The node must split.
    Yes,
}

pub struct DynamicNode<L: Layout> {
    pub(super) page_size: usize,
    pub(super) key_value_size_cap: usize,
    pub(super) layout: L,
}

impl<L: Layout> DynamicNode<L> {
    /// Builds the engine for a given page size. Fails with a metadata
    /// mismatch when the page cannot hold the minimum number of entries at
    /// a sane per-entry cap.
    pub fn new(page_size: usize, layout: L) -> Result<Self> {
        ensure!(
            page_size <= MAX_PAGE_SIZE,
            "metadata mismatch: page size {}B does not fit the {}-byte offset word (max {}B)",
            page_size,
            BYTE_SIZE_OFFSET,
            MAX_PAGE_SIZE
        );

        let total_space = page_size.saturating_sub(DYNAMIC_HEADER_SIZE);
        let key_value_size_cap = (total_space / LEAST_NUMBER_OF_ENTRIES_PER_PAGE)
            .saturating_sub(BYTE_SIZE_TOTAL_OVERHEAD);

        ensure!(
            key_value_size_cap >= MINIMUM_ENTRY_SIZE_CAP,
            "metadata mismatch: need to fit at least {} key-value entries per leaf page, \
             which caps entries at {}B with page size {}B; the cap must be at least {}B",
            LEAST_NUMBER_OF_ENTRIES_PER_PAGE,
            key_value_size_cap,
            page_size,
            MINIMUM_ENTRY_SIZE_CAP
        );

        Ok(Self {
            page_size,
            key_value_size_cap,
            layout,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Hard cap on a single serialized key or value. The tree layer must
    /// enforce it before handing entries to the node.
    pub fn key_value_size_cap(&self) -> usize {
        self.key_value_size_cap
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    // ------------------------------------------------------------------
    // Header access
    // ------------------------------------------------------------------

    /// Brings up a fresh node page: base header plus the dynamic fields.
    pub fn initialize(&self, cursor: &mut PageCursor<'_>, node_type: PageType, generation: u32) {
        {
            // INVARIANT: pages handed to the engine match the validated page size
            let header = NodeHeader::from_bytes_mut(cursor.bytes_mut()).unwrap();
            header.set_node_type(node_type);
            header.set_flags(0);
            header.set_key_count(0);
            header.set_generation(generation);
            header.set_right_sibling(0);
        }
        self.write_additional_header(cursor);
    }

    /// Writes the dynamic header fields: an empty heap ending at the page
    /// end and no dead space.
    pub fn write_additional_header(&self, cursor: &mut PageCursor<'_>) {
        self.set_alloc_offset(cursor, self.page_size);
        self.set_dead_space(cursor, 0);
    }

    pub fn node_type(&self, cursor: &PageCursor<'_>) -> PageType {
        // INVARIANT: pages handed to the engine match the validated page size
        NodeHeader::from_bytes(cursor.bytes()).unwrap().node_type()
    }

    pub fn key_count(&self, cursor: &PageCursor<'_>) -> usize {
        // INVARIANT: pages handed to the engine match the validated page size
        NodeHeader::from_bytes(cursor.bytes()).unwrap().key_count() as usize
    }

    pub fn set_key_count(&self, cursor: &mut PageCursor<'_>, key_count: usize) {
        // INVARIANT: pages handed to the engine match the validated page size
        let header = NodeHeader::from_bytes_mut(cursor.bytes_mut()).unwrap();
        header.set_key_count(key_count as u16);
    }

    pub fn generation(&self, cursor: &PageCursor<'_>) -> u32 {
        NodeHeader::from_bytes(cursor.bytes()).unwrap().generation()
    }

    pub fn right_sibling(&self, cursor: &PageCursor<'_>) -> u32 {
        NodeHeader::from_bytes(cursor.bytes()).unwrap().right_sibling()
    }

    pub fn set_right_sibling(&self, cursor: &mut PageCursor<'_>, page_no: u32) {
        let header = NodeHeader::from_bytes_mut(cursor.bytes_mut()).unwrap();
        header.set_right_sibling(page_no);
    }

    /// Lowest heap byte written so far. Free space lies between the end of
    /// the offset array and this offset.
    pub fn alloc_offset(&self, cursor: &mut PageCursor<'_>) -> usize {
        cursor.set_offset(BYTE_POS_ALLOC_OFFSET);
        read_key_offset(cursor) as usize
    }

    pub(super) fn set_alloc_offset(&self, cursor: &mut PageCursor<'_>, alloc_offset: usize) {
        cursor.set_offset(BYTE_POS_ALLOC_OFFSET);
        put_key_offset(cursor, alloc_offset as u16);
    }

    /// Bytes held by tombstoned blobs, reclaimable by defragmentation.
    pub fn dead_space(&self, cursor: &mut PageCursor<'_>) -> usize {
        cursor.set_offset(BYTE_POS_DEAD_SPACE);
        let dead_space = read_key_size(cursor);
        debug_assert!(
            !has_tombstone(dead_space),
            "tombstone bit set in dead space word"
        );
        dead_space as usize
    }

    pub(super) fn set_dead_space(&self, cursor: &mut PageCursor<'_>, dead_space: usize) {
        cursor.set_offset(BYTE_POS_DEAD_SPACE);
        put_key_size(cursor, dead_space as u16);
    }

    // ------------------------------------------------------------------
    // Entry reads
    // ------------------------------------------------------------------

    /// Reads the key at logical position `pos` into `into`.
    pub fn key_at(
        &self,
        cursor: &mut PageCursor<'_>,
        into: &mut L::Key,
        pos: usize,
        node_type: PageType,
    ) {
        self.place_cursor_at_actual_key(cursor, pos, node_type);

        let key_size = read_key_size(cursor);
        if key_size as usize > self.key_value_size_cap {
            cursor.set_cursor_exception(format!(
                "read unreliable key, key_size={}, key_value_size_cap={}, key_has_tombstone={}",
                strip_tombstone(key_size),
                self.key_value_size_cap,
                has_tombstone(key_size)
            ));
        }
        if node_type == PageType::Leaf {
            cursor.advance(BYTE_SIZE_VALUE_SIZE);
        }
        self.layout
            .read_key(cursor, into, strip_tombstone(key_size) as usize);
    }

    /// Reads the value at logical position `pos` (leaf only).
    pub fn value_at(&self, cursor: &mut PageCursor<'_>, into: &mut L::Value, pos: usize) {
        self.place_cursor_at_actual_key(cursor, pos, PageType::Leaf);

        let key_size = read_key_size(cursor);
        let value_size = read_value_size(cursor);
        if value_size as usize > self.key_value_size_cap {
            cursor.set_cursor_exception(format!(
                "read unreliable value, value_size={}, key_value_size_cap={}",
                value_size, self.key_value_size_cap
            ));
        }
        cursor.advance(strip_tombstone(key_size) as usize);
        self.layout
            .read_value(cursor, into, value_size as usize);
    }

    /// Overwrites the value at `pos` in place when the new value has the
    /// same serialized length as the stored one. Returns `false` without
    /// mutating otherwise; the tree layer then falls back to remove plus
    /// insert.
    pub fn set_value_at(&self, cursor: &mut PageCursor<'_>, value: &L::Value, pos: usize) -> bool {
        self.place_cursor_at_actual_key(cursor, pos, PageType::Leaf);

        // The stored key size is read through the offset-width reader. The
        // two words share a width and live entries never carry the tombstone
        // bit, so the values agree.
        let key_size = read_key_offset(cursor);
        let old_value_size = read_value_size(cursor);
        let new_value_size = self.layout.value_size(value);
        if old_value_size as usize == new_value_size {
            cursor.advance(key_size as usize);
            self.layout.write_value(cursor, value);
            return true;
        }
        false
    }

    /// Reads the child pointer at child position `pos` (internal only).
    pub fn child_at(
        &self,
        cursor: &mut PageCursor<'_>,
        pos: usize,
        stable_generation: u32,
        unstable_generation: u32,
    ) -> u32 {
        cursor.set_offset(self.child_offset(pos));
        pointer::read_child(cursor, stable_generation, unstable_generation, pos)
    }

    pub fn set_child_at(
        &self,
        cursor: &mut PageCursor<'_>,
        child: u32,
        pos: usize,
        _stable_generation: u32,
        unstable_generation: u32,
    ) {
        cursor.set_offset(self.child_offset(pos));
        pointer::write_child(cursor, child, unstable_generation);
    }

    // ------------------------------------------------------------------
    // Inserts
    // ------------------------------------------------------------------

    /// Inserts a key/value entry at logical position `pos` in a leaf. The
    /// caller must have checked [`DynamicNode::leaf_overflow`] first and is
    /// responsible for bumping the key count afterwards.
    pub fn insert_key_value_at(
        &self,
        cursor: &mut PageCursor<'_>,
        key: &L::Key,
        value: &L::Value,
        pos: usize,
        key_count: usize,
    ) {
        let current_offset = self.alloc_offset(cursor);
        let key_size = self.layout.key_size(key);
        let value_size = self.layout.value_size(value);
        let blob_size = BYTE_SIZE_KEY_SIZE + BYTE_SIZE_VALUE_SIZE + key_size + value_size;
        let Some(new_offset) = current_offset.checked_sub(blob_size) else {
            cursor.set_cursor_exception(format!(
                "leaf heap exhausted: alloc_offset={current_offset}, entry needs {blob_size} bytes"
            ));
            return;
        };

        cursor.set_offset(new_offset);
        put_key_size(cursor, key_size as u16);
        put_value_size(cursor, value_size as u16);
        self.layout.write_key(cursor, key);
        self.layout.write_value(cursor, value);

        self.set_alloc_offset(cursor, new_offset);

        self.insert_slots_at(
            cursor,
            pos,
            1,
            key_count,
            self.key_pos_offset_leaf(0),
            BYTE_SIZE_OFFSET,
        );
        cursor.set_offset(self.key_pos_offset_leaf(pos));
        put_key_offset(cursor, new_offset as u16);
    }

    /// Inserts a separator key and its right child at key position `pos` in
    /// an internal node.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_key_and_right_child_at(
        &self,
        cursor: &mut PageCursor<'_>,
        key: &L::Key,
        child: u32,
        pos: usize,
        key_count: usize,
        _stable_generation: u32,
        unstable_generation: u32,
    ) {
        let current_offset = self.alloc_offset(cursor);
        let key_size = self.layout.key_size(key);
        let blob_size = BYTE_SIZE_KEY_SIZE + key_size;
        let Some(new_offset) = current_offset.checked_sub(blob_size) else {
            cursor.set_cursor_exception(format!(
                "internal heap exhausted: alloc_offset={current_offset}, key needs {blob_size} bytes"
            ));
            return;
        };

        cursor.set_offset(new_offset);
        put_key_size(cursor, key_size as u16);
        self.layout.write_key(cursor, key);

        self.set_alloc_offset(cursor, new_offset);

        self.insert_slots_at(
            cursor,
            pos,
            1,
            key_count,
            self.key_pos_offset_internal(0),
            self.key_child_size(),
        );
        cursor.set_offset(self.key_pos_offset_internal(pos));
        put_key_offset(cursor, new_offset as u16);
        pointer::write_child(cursor, child, unstable_generation);
    }

    // ------------------------------------------------------------------
    // Removes
    // ------------------------------------------------------------------

    /// Tombstones the entry at `pos`, grows the dead space account, and
    /// closes the offset-array hole. The caller decrements the key count.
    pub fn remove_key_value_at(&self, cursor: &mut PageCursor<'_>, pos: usize, key_count: usize) {
        self.place_cursor_at_actual_key(cursor, pos, PageType::Leaf);
        let key_offset = cursor.offset();
        let key_size = strip_tombstone(read_key_size(cursor)) as usize;
        let value_size = read_value_size(cursor) as usize;
        cursor.set_offset(key_offset);
        put_tombstone(cursor);

        let dead_space = self.dead_space(cursor);
        self.set_dead_space(
            cursor,
            dead_space + key_size + value_size + BYTE_SIZE_KEY_SIZE + BYTE_SIZE_VALUE_SIZE,
        );

        self.remove_slot_at(
            cursor,
            pos,
            key_count,
            self.key_pos_offset_leaf(0),
            BYTE_SIZE_OFFSET,
        );
    }

    /// Tombstones key `key_pos` and shifts out its slot together with the
    /// child to its right. Internal nodes do not track dead space in this
    /// layout.
    pub fn remove_key_and_right_child_at(
        &self,
        cursor: &mut PageCursor<'_>,
        key_pos: usize,
        key_count: usize,
    ) {
        self.place_cursor_at_actual_key(cursor, key_pos, PageType::Internal);
        put_tombstone(cursor);

        self.remove_slot_at(
            cursor,
            key_pos,
            key_count,
            self.key_pos_offset_internal(0),
            self.key_child_size(),
        );
    }

    /// Tombstones key `key_pos` and shifts out the slot holding the key and
    /// the child to its left, then relocates the trailing rightmost child
    /// into the vacated last position.
    pub fn remove_key_and_left_child_at(
        &self,
        cursor: &mut PageCursor<'_>,
        key_pos: usize,
        key_count: usize,
    ) {
        self.place_cursor_at_actual_key(cursor, key_pos, PageType::Internal);
        put_tombstone(cursor);

        self.remove_slot_at(
            cursor,
            key_pos,
            key_count,
            self.key_pos_offset_internal(0) - self.child_size(),
            self.key_child_size(),
        );

        // Move last child
        cursor.copy_within(
            self.child_offset(key_count),
            self.child_offset(key_count - 1),
            self.child_size(),
        );
    }

    // ------------------------------------------------------------------
    // Space accounting
    // ------------------------------------------------------------------

    /// Classifies whether a new leaf entry fits this node.
    pub fn leaf_overflow(
        &self,
        cursor: &mut PageCursor<'_>,
        key_count: usize,
        new_key: &L::Key,
        new_value: &L::Value,
    ) -> Overflow {
        let dead_space = self.dead_space(cursor) as isize;
        let alloc_space = self.alloc_space(cursor, key_count, PageType::Leaf);

        let key_size = self.layout.key_size(new_key);
        let value_size = self.layout.value_size(new_value);
        let needed_space = (key_size + value_size + BYTE_SIZE_TOTAL_OVERHEAD) as isize;

        if needed_space < alloc_space {
            Overflow::No
        } else if needed_space < alloc_space + dead_space {
            Overflow::NeedDefrag
        } else {
            Overflow::Yes
        }
    }

    /// Internal nodes have no deferred reclamation; the question is only
    /// whether the alloc gap holds the new key and child.
    pub fn internal_overflow(
        &self,
        cursor: &mut PageCursor<'_>,
        key_count: usize,
        new_key: &L::Key,
    ) -> bool {
        let alloc_space = self.alloc_space(cursor, key_count, PageType::Internal);
        let needed_space = self.total_space_of_key_child(new_key) as isize;

        needed_space > alloc_space
    }

    /// A leaf underflows when more than half of its total space is
    /// available (alloc gap plus dead space). Rebalance and merge decisions
    /// belong to the tree layer.
    pub fn leaf_underflow(&self, cursor: &mut PageCursor<'_>, key_count: usize) -> bool {
        let half_space = self.half_space() as isize;
        let alloc_space = self.alloc_space(cursor, key_count, PageType::Leaf);
        let dead_space = self.dead_space(cursor) as isize;
        let available_space = alloc_space + dead_space;

        available_space > half_space
    }

    /// Sanity bound for a key count read off a page: no page can hold more
    /// entries than its total space divided by the per-entry overhead.
    pub fn reasonable_key_count(&self, key_count: usize) -> bool {
        key_count <= self.total_space() / BYTE_SIZE_TOTAL_OVERHEAD
    }

    pub(super) fn alloc_space(
        &self,
        cursor: &mut PageCursor<'_>,
        key_count: usize,
        node_type: PageType,
    ) -> isize {
        let alloc_offset = self.alloc_offset(cursor);
        let end_of_offset_array = match node_type {
            PageType::Leaf => self.key_pos_offset_leaf(key_count),
            _ => self.key_pos_offset_internal(key_count),
        };
        alloc_offset as isize - end_of_offset_array as isize
    }

    // ------------------------------------------------------------------
    // Unsupported operations
    // ------------------------------------------------------------------

    pub fn set_key_at(
        &self,
        _cursor: &mut PageCursor<'_>,
        _key: &L::Key,
        _pos: usize,
        _node_type: PageType,
    ) -> Result<()> {
        bail!("set_key_at is not supported by the dynamic-size node layout")
    }

    pub fn leaf_max_key_count(&self) -> Result<usize> {
        bail!("leaf_max_key_count is not supported by the dynamic-size node layout")
    }

    pub fn reasonable_child_count(&self, _child_count: usize) -> Result<bool> {
        bail!("reasonable_child_count is not supported by the dynamic-size node layout")
    }

    pub fn can_rebalance_leaves(
        &self,
        _left_key_count: usize,
        _right_key_count: usize,
    ) -> Result<bool> {
        bail!("can_rebalance_leaves is not supported by the dynamic-size node layout")
    }

    pub fn can_merge_leaves(
        &self,
        _left_key_count: usize,
        _right_key_count: usize,
    ) -> Result<bool> {
        bail!("can_merge_leaves is not supported by the dynamic-size node layout")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn split_internal(
        &self,
        _left_cursor: &mut PageCursor<'_>,
        _left_key_count: usize,
        _right_cursor: &mut PageCursor<'_>,
        _insert_pos: usize,
        _new_key: &L::Key,
        _new_right_child: u32,
        _stable_generation: u32,
        _unstable_generation: u32,
    ) -> Result<()> {
        bail!("split_internal is not supported by the dynamic-size node layout")
    }

    pub fn move_key_values_from_left_to_right(
        &self,
        _left_cursor: &mut PageCursor<'_>,
        _left_key_count: usize,
        _right_cursor: &mut PageCursor<'_>,
        _right_key_count: usize,
        _from_pos_in_left: usize,
    ) -> Result<()> {
        bail!("move_key_values_from_left_to_right is not supported by the dynamic-size node layout")
    }

    // ------------------------------------------------------------------
    // Offset array geometry
    // ------------------------------------------------------------------

    /// Seeks the cursor to the blob of logical position `pos`, validating
    /// the offset read from the slot against the page bounds.
    pub(super) fn place_cursor_at_actual_key(
        &self,
        cursor: &mut PageCursor<'_>,
        pos: usize,
        node_type: PageType,
    ) {
        cursor.set_offset(self.key_pos_offset(pos, node_type));

        let key_offset = read_key_offset(cursor) as usize;
        if key_offset > self.page_size {
            cursor.set_cursor_exception(format!(
                "tried to read key at offset {key_offset}, page size is {}",
                self.page_size
            ));
        }

        cursor.set_offset(key_offset);
    }

    pub(super) fn key_pos_offset(&self, pos: usize, node_type: PageType) -> usize {
        match node_type {
            PageType::Leaf => self.key_pos_offset_leaf(pos),
            _ => self.key_pos_offset_internal(pos),
        }
    }

    pub(super) fn key_pos_offset_leaf(&self, pos: usize) -> usize {
        DYNAMIC_HEADER_SIZE + pos * BYTE_SIZE_OFFSET
    }

    pub(super) fn key_pos_offset_internal(&self, pos: usize) -> usize {
        // header + child0 + pos * (offset word + child pointer)
        DYNAMIC_HEADER_SIZE + self.child_size() + pos * self.key_child_size()
    }

    /// Byte position of the child pointer to the left of key `pos`.
    pub(super) fn child_offset(&self, pos: usize) -> usize {
        self.key_pos_offset_internal(pos) - self.child_size()
    }

    pub(super) fn key_child_size(&self) -> usize {
        BYTE_SIZE_OFFSET + CHILD_POINTER_SIZE
    }

    pub(super) fn child_size(&self) -> usize {
        CHILD_POINTER_SIZE
    }

    /// Shifts slots `[pos..total_slot_count)` right by `num_slots` pitches
    /// to open a hole.
    pub(super) fn insert_slots_at(
        &self,
        cursor: &mut PageCursor<'_>,
        pos: usize,
        num_slots: usize,
        total_slot_count: usize,
        base_offset: usize,
        slot_size: usize,
    ) {
        let from = base_offset + pos * slot_size;
        let to = base_offset + (pos + num_slots) * slot_size;
        let len = (total_slot_count - pos) * slot_size;
        cursor.copy_within(from, to, len);
    }

    /// Shifts slots `[pos + 1..total_slot_count)` left by one pitch,
    /// closing the hole at `pos`.
    pub(super) fn remove_slot_at(
        &self,
        cursor: &mut PageCursor<'_>,
        pos: usize,
        total_slot_count: usize,
        base_offset: usize,
        slot_size: usize,
    ) {
        let from = base_offset + (pos + 1) * slot_size;
        let to = base_offset + pos * slot_size;
        let len = (total_slot_count - pos - 1) * slot_size;
        cursor.copy_within(from, to, len);
    }

    // ------------------------------------------------------------------
    // Space geometry
    // ------------------------------------------------------------------

    pub(super) fn total_space(&self) -> usize {
        self.page_size - DYNAMIC_HEADER_SIZE
    }

    pub(super) fn half_space(&self) -> usize {
        self.total_space() / 2
    }

    pub(super) fn total_space_of_key_value(&self, key: &L::Key, value: &L::Value) -> usize {
        BYTE_SIZE_TOTAL_OVERHEAD + self.layout.key_size(key) + self.layout.value_size(value)
    }

    pub(super) fn total_space_of_key_child(&self, key: &L::Key) -> usize {
        BYTE_SIZE_OFFSET + BYTE_SIZE_KEY_SIZE + self.child_size() + self.layout.key_size(key)
    }

    /// Per-entry byte cost of the existing entry at `pos`, offset slot
    /// included.
    pub(super) fn total_space_of_key_value_at(
        &self,
        cursor: &mut PageCursor<'_>,
        pos: usize,
    ) -> usize {
        self.place_cursor_at_actual_key(cursor, pos, PageType::Leaf);
        let key_size = strip_tombstone(read_key_size(cursor)) as usize;
        let value_size = read_value_size(cursor) as usize;
        BYTE_SIZE_TOTAL_OVERHEAD + key_size + value_size
    }

    // ------------------------------------------------------------------
    // Debugging
    // ------------------------------------------------------------------

    /// Renders header, offset array, and heap for debugging. Tombstoned
    /// blobs are marked `X`, live ones `_`; key and value bytes are not
    /// decoded.
    pub fn describe_node(&self, cursor: &mut PageCursor<'_>) -> String {
        let saved_offset = cursor.offset();
        let mut out = String::new();

        let node_type = self.node_type(cursor);
        let key_count = self.key_count(cursor);
        let alloc_offset = self.alloc_offset(cursor);
        let dead_space = self.dead_space(cursor);
        let _ = write!(
            out,
            "[type={node_type:?}|key_count={key_count}|alloc_offset={alloc_offset}|dead_space={dead_space}]"
        );

        out.push('[');
        for pos in 0..key_count {
            if pos > 0 {
                out.push(',');
            }
            cursor.set_offset(self.key_pos_offset(pos, node_type));
            let _ = write!(out, "{}", read_key_offset(cursor));
        }
        out.push(']');

        let mut current_offset = alloc_offset;
        while current_offset < self.page_size {
            cursor.set_offset(current_offset);
            let raw_key_size = read_key_size(cursor);
            let key_size = strip_tombstone(raw_key_size) as usize;
            let mut blob_size = BYTE_SIZE_KEY_SIZE + key_size;
            let marker = if has_tombstone(raw_key_size) { 'X' } else { '_' };
            let _ = write!(out, "[{current_offset}|{marker}|{key_size}");
            if node_type == PageType::Leaf {
                let value_size = read_value_size(cursor) as usize;
                blob_size += BYTE_SIZE_VALUE_SIZE + value_size;
                let _ = write!(out, "|{value_size}");
            }
            out.push(']');
            if cursor.cursor_exception().is_some() {
                out.push_str("[unreadable]");
                break;
            }
            current_offset += blob_size;
        }

        cursor.set_offset(saved_offset);
        out
    }
}

impl<L: Layout> fmt::Debug for DynamicNode<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicNode")
            .field("page_size", &self.page_size)
            .field("key_value_size_cap", &self.key_value_size_cap)
            .finish()
    }
}
