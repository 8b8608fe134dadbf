//! # Leaf Defragmentation
//!
//! Removal tombstones blobs in place, so over time the heap becomes a mix
//! of live and dead ranges. The defragmenter compacts every live blob
//! toward the page end and resets the dead space account, restoring one
//! contiguous free gap below the offset array.
//!
//! ## Algorithm
//!
//! One heap walk records every blob start into a dead or an alive stack.
//! Offsets are pushed in ascending heap order, so popping drains the stacks
//! from the highest offsets down and the compaction proceeds right to left:
//!
//! ```text
//! BEFORE MOVE
//!                   v       alive_range_offset
//! [X][_][_][X][_][X][_][_]
//!            ^   ^          dead_range_offset
//!            |_____________ move_offset
//!
//! AFTER MOVE
//!                v          alive_range_offset
//! [X][_][_][X][X][_][_][_]
//!          ^                dead_range_offset
//! ```
//!
//! Each round locates the next dead range under the compacted region, then
//! the run of live blobs below it, and slides that run upward over the gap.
//! A run larger than the gap is moved in gap-sized windows so the copy
//! never overlaps incorrectly; the gap accumulates as lower runs have to
//! travel past every dead range above them. Afterwards the offset array is
//! rewritten through an old-to-new offset table and `dead_space` drops to
//! zero.
//!
//! Only leaves are defragmented; internal nodes tombstone removed keys but
//! never reclaim them in this layout.

use smallvec::SmallVec;

use crate::btree::layout::Layout;
use crate::btree::node::DynamicNode;
use crate::encoding::dynsize::{
    has_tombstone, put_key_offset, read_key_offset, read_key_size, read_value_size,
    strip_tombstone, BYTE_SIZE_KEY_SIZE, BYTE_SIZE_OFFSET, BYTE_SIZE_VALUE_SIZE,
};
use crate::storage::PageCursor;

/// Stack of blob offsets. Pushed in ascending heap order and drained from
/// the top, so `poll` yields the highest remaining offset. An empty stack
/// peeks as -1, which orders it below every real offset.
struct OffsetStack {
    slots: SmallVec<[i32; 32]>,
}

impl OffsetStack {
    fn new() -> Self {
        Self {
            slots: SmallVec::new(),
        }
    }

    fn push(&mut self, offset: i32) {
        self.slots.push(offset);
    }

    fn peek(&self) -> i32 {
        self.slots.last().copied().unwrap_or(-1)
    }

    fn poll(&mut self) -> i32 {
        self.slots.pop().unwrap_or(-1)
    }

    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<L: Layout> DynamicNode<L> {
    /// Compacts every live blob toward the page end, rewrites the offset
    /// array, and resets `dead_space` to zero.
    pub fn defragment_leaf(&self, cursor: &mut PageCursor<'_>) {
        let mut dead_keys_offset = OffsetStack::new();
        let mut alive_keys_offset = OffsetStack::new();
        self.record_dead_and_alive(cursor, &mut dead_keys_offset, &mut alive_keys_offset);

        let max_key_count = self.page_size
            / (BYTE_SIZE_KEY_SIZE + BYTE_SIZE_OFFSET + BYTE_SIZE_VALUE_SIZE);
        let mut old_offset: SmallVec<[i32; 32]> = SmallVec::from_elem(0, max_key_count);
        let mut new_offset: SmallVec<[i32; 32]> = SmallVec::from_elem(0, max_key_count);
        let mut old_offset_cursor = 0usize;
        let mut new_offset_cursor = 0usize;

        // Everything at or above this offset is live and in its final place.
        let mut alive_range_offset = self.page_size as i32;

        // The rightmost run of live blobs is already flush against the page
        // end and does not need to move.
        while dead_keys_offset.peek() < alive_keys_offset.peek() {
            alive_range_offset = alive_keys_offset.poll();
        }

        loop {
            // Locate the next range of dead blobs.
            let mut dead_range_offset = alive_range_offset;
            while alive_keys_offset.peek() < dead_keys_offset.peek() {
                dead_range_offset = dead_keys_offset.poll();
            }

            // Locate the run of live blobs below it.
            let mut move_offset = dead_range_offset;
            while dead_keys_offset.peek() < alive_keys_offset.peek() {
                let move_key = alive_keys_offset.poll();
                old_offset[old_offset_cursor] = move_key;
                old_offset_cursor += 1;
                move_offset = move_key;
            }

            // Record where the run lands. The gap accumulates across rounds
            // because lower runs travel past every dead range above them.
            let dead_range_size = alive_range_offset - dead_range_offset;
            while old_offset_cursor > new_offset_cursor {
                new_offset[new_offset_cursor] = old_offset[new_offset_cursor] + dead_range_size;
                new_offset_cursor += 1;
            }

            // Slide the run upward in gap-sized windows, then move the
            // residual in one final copy.
            while move_offset < dead_range_offset - dead_range_size {
                dead_range_offset -= dead_range_size;
                alive_range_offset -= dead_range_size;
                cursor.copy_within(
                    dead_range_offset as usize,
                    alive_range_offset as usize,
                    dead_range_size as usize,
                );
            }
            let last_block_size = dead_range_offset - move_offset;
            dead_range_offset -= last_block_size;
            alive_range_offset -= last_block_size;
            cursor.copy_within(
                dead_range_offset as usize,
                alive_range_offset as usize,
                last_block_size as usize,
            );

            if alive_keys_offset.is_empty() {
                break;
            }
        }

        self.set_alloc_offset(cursor, alive_range_offset as usize);

        // Rewrite the offset array through the old-to-new table.
        let key_count = self.key_count(cursor);
        'key_pos: for pos in 0..key_count {
            let key_pos_offset = self.key_pos_offset_leaf(pos);
            cursor.set_offset(key_pos_offset);
            let key_offset = read_key_offset(cursor) as i32;
            for index in 0..old_offset_cursor {
                if key_offset == old_offset[index] {
                    cursor.set_offset(key_pos_offset);
                    put_key_offset(cursor, new_offset[index] as u16);
                    continue 'key_pos;
                }
            }
        }

        self.set_dead_space(cursor, 0);
    }

    /// Walks the heap from the alloc offset to the page end, pushing every
    /// blob start onto the dead or the alive stack in ascending order.
    fn record_dead_and_alive(
        &self,
        cursor: &mut PageCursor<'_>,
        dead_keys_offset: &mut OffsetStack,
        alive_keys_offset: &mut OffsetStack,
    ) {
        let mut current_offset = self.alloc_offset(cursor);
        while current_offset < self.page_size {
            cursor.set_offset(current_offset);
            let key_size = read_key_size(cursor);
            let value_size = read_value_size(cursor);
            let dead = has_tombstone(key_size);
            let key_size = strip_tombstone(key_size);

            if dead {
                dead_keys_offset.push(current_offset as i32);
            } else {
                alive_keys_offset.push(current_offset as i32);
            }
            current_offset +=
                key_size as usize + value_size as usize + BYTE_SIZE_KEY_SIZE + BYTE_SIZE_VALUE_SIZE;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::btree::layout::BytesLayout;
    use crate::btree::node::DynamicNode;
    use crate::encoding::dynsize::{
        has_tombstone, read_key_size, read_value_size, strip_tombstone, BYTE_SIZE_KEY_SIZE,
        BYTE_SIZE_VALUE_SIZE,
    };
    use crate::storage::{PageCursor, PageType};

    const PAGE_SIZE: usize = 256;

    fn node() -> DynamicNode<BytesLayout> {
        DynamicNode::new(PAGE_SIZE, BytesLayout).unwrap()
    }

    fn leaf_page(node: &DynamicNode<BytesLayout>) -> Vec<u8> {
        let mut page = vec![0u8; PAGE_SIZE];
        let mut cursor = PageCursor::new(&mut page);
        node.initialize(&mut cursor, PageType::Leaf, 1);
        page
    }

    /// Walks the heap and returns (offset, dead, blob_size) triples.
    fn heap_blobs(
        node: &DynamicNode<BytesLayout>,
        cursor: &mut PageCursor<'_>,
    ) -> Vec<(usize, bool, usize)> {
        let mut blobs = Vec::new();
        let mut offset = node.alloc_offset(cursor);
        while offset < PAGE_SIZE {
            cursor.set_offset(offset);
            let raw = read_key_size(cursor);
            let value_size = read_value_size(cursor) as usize;
            let key_size = strip_tombstone(raw) as usize;
            let blob_size = BYTE_SIZE_KEY_SIZE + BYTE_SIZE_VALUE_SIZE + key_size + value_size;
            blobs.push((offset, has_tombstone(raw), blob_size));
            offset += blob_size;
        }
        assert_eq!(offset, PAGE_SIZE, "heap walk must end exactly at page end");
        blobs
    }

    #[test]
    fn defragment_reclaims_single_tombstone() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        node.insert_key_value_at(&mut cursor, &b"hello".to_vec(), &b"world".to_vec(), 0, 0);
        node.set_key_count(&mut cursor, 1);
        node.remove_key_value_at(&mut cursor, 0, 1);
        node.set_key_count(&mut cursor, 0);

        node.insert_key_value_at(&mut cursor, &b"xx".to_vec(), &b"yy".to_vec(), 0, 0);
        node.set_key_count(&mut cursor, 1);
        assert_eq!(node.alloc_offset(&mut cursor), 234);

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.alloc_offset(&mut cursor), 248);
        assert_eq!(node.dead_space(&mut cursor), 0);

        let blobs = heap_blobs(&node, &mut cursor);
        assert_eq!(blobs, vec![(248, false, 8)]);

        let mut key = Vec::new();
        let mut value = Vec::new();
        node.key_at(&mut cursor, &mut key, 0, PageType::Leaf);
        node.value_at(&mut cursor, &mut value, 0);
        assert_eq!(key, b"xx");
        assert_eq!(value, b"yy");
        assert!(cursor.check_and_clear_exception().is_ok());
    }

    #[test]
    fn defragment_without_tombstones_is_a_no_op() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        node.insert_key_value_at(&mut cursor, &b"aa".to_vec(), &b"11".to_vec(), 0, 0);
        node.insert_key_value_at(&mut cursor, &b"bb".to_vec(), &b"22".to_vec(), 1, 1);
        node.set_key_count(&mut cursor, 2);

        let alloc_before = node.alloc_offset(&mut cursor);
        let blobs_before = heap_blobs(&node, &mut cursor);

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.alloc_offset(&mut cursor), alloc_before);
        assert_eq!(heap_blobs(&node, &mut cursor), blobs_before);
    }

    #[test]
    fn defragment_empty_heap_is_a_no_op() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.alloc_offset(&mut cursor), PAGE_SIZE);
        assert_eq!(node.dead_space(&mut cursor), 0);
        assert!(cursor.check_and_clear_exception().is_ok());
    }

    #[test]
    fn defragment_all_dead_resets_to_page_end() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        for i in 0..3 {
            node.insert_key_value_at(&mut cursor, &vec![i as u8; 4], &vec![0xAA; 4], i, i);
        }
        node.set_key_count(&mut cursor, 3);
        for _ in 0..3 {
            let key_count = node.key_count(&cursor);
            node.remove_key_value_at(&mut cursor, 0, key_count);
            node.set_key_count(&mut cursor, key_count - 1);
        }

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.alloc_offset(&mut cursor), PAGE_SIZE);
        assert_eq!(node.dead_space(&mut cursor), 0);
        assert!(heap_blobs(&node, &mut cursor).is_empty());
    }

    #[test]
    fn defragment_skips_live_tail_already_at_page_end() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        // "a" sits against the page end; "b" below it becomes the tombstone.
        node.insert_key_value_at(&mut cursor, &b"a".to_vec(), &b"1".to_vec(), 0, 0);
        node.insert_key_value_at(&mut cursor, &b"b".to_vec(), &b"2".to_vec(), 1, 1);
        node.set_key_count(&mut cursor, 2);
        node.remove_key_value_at(&mut cursor, 1, 2);
        node.set_key_count(&mut cursor, 1);

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.alloc_offset(&mut cursor), PAGE_SIZE - 6);
        let mut key = Vec::new();
        node.key_at(&mut cursor, &mut key, 0, PageType::Leaf);
        assert_eq!(key, b"a");
    }

    #[test]
    fn defragment_interleaved_pattern_preserves_survivors() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        // Distinct sizes so a bad remap would corrupt the walk.
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..5)
            .map(|i| (vec![b'k' + i as u8; 3 + i], vec![b'v'; 5 + 2 * i]))
            .collect();
        for (i, (key, value)) in entries.iter().enumerate() {
            node.insert_key_value_at(&mut cursor, key, value, i, i);
        }
        node.set_key_count(&mut cursor, 5);

        // Drop original entries 0, 2, and 4.
        node.remove_key_value_at(&mut cursor, 0, 5);
        node.set_key_count(&mut cursor, 4);
        node.remove_key_value_at(&mut cursor, 1, 4);
        node.set_key_count(&mut cursor, 3);
        node.remove_key_value_at(&mut cursor, 2, 3);
        node.set_key_count(&mut cursor, 2);

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.dead_space(&mut cursor), 0);
        let blobs = heap_blobs(&node, &mut cursor);
        assert_eq!(blobs.len(), 2);
        assert!(blobs.iter().all(|(_, dead, _)| !dead));

        let mut key = Vec::new();
        let mut value = Vec::new();
        node.key_at(&mut cursor, &mut key, 0, PageType::Leaf);
        node.value_at(&mut cursor, &mut value, 0);
        assert_eq!((key.clone(), value.clone()), entries[1]);
        node.key_at(&mut cursor, &mut key, 1, PageType::Leaf);
        node.value_at(&mut cursor, &mut value, 1);
        assert_eq!((key, value), entries[3]);
        assert!(cursor.check_and_clear_exception().is_ok());
    }

    #[test]
    fn defragment_twice_is_idempotent() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        for i in 0..4 {
            node.insert_key_value_at(&mut cursor, &vec![i as u8; 6], &vec![i as u8; 6], i, i);
        }
        node.set_key_count(&mut cursor, 4);
        node.remove_key_value_at(&mut cursor, 1, 4);
        node.set_key_count(&mut cursor, 3);

        node.defragment_leaf(&mut cursor);
        let alloc_after_first = node.alloc_offset(&mut cursor);
        let blobs_after_first = heap_blobs(&node, &mut cursor);

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.alloc_offset(&mut cursor), alloc_after_first);
        assert_eq!(heap_blobs(&node, &mut cursor), blobs_after_first);
    }

    #[test]
    fn defragment_run_larger_than_gap_slides_in_windows() {
        let node = node();
        let mut page = leaf_page(&node);
        let mut cursor = PageCursor::new(&mut page);

        // One small tombstone above a long run of live blobs forces the
        // window-sliding path: the run is larger than the gap.
        node.insert_key_value_at(&mut cursor, &b"x".to_vec(), &b"y".to_vec(), 0, 0);
        let survivors: Vec<(Vec<u8>, Vec<u8>)> = (0..6)
            .map(|i| (vec![b'a' + i as u8; 8], vec![b'z'; 8]))
            .collect();
        for (i, (key, value)) in survivors.iter().enumerate() {
            node.insert_key_value_at(&mut cursor, key, value, i + 1, i + 1);
        }
        node.set_key_count(&mut cursor, 7);
        node.remove_key_value_at(&mut cursor, 0, 7);
        node.set_key_count(&mut cursor, 6);

        node.defragment_leaf(&mut cursor);

        assert_eq!(node.dead_space(&mut cursor), 0);
        let blobs = heap_blobs(&node, &mut cursor);
        assert_eq!(blobs.len(), 6);

        let mut key = Vec::new();
        let mut value = Vec::new();
        for (i, (expected_key, expected_value)) in survivors.iter().enumerate() {
            node.key_at(&mut cursor, &mut key, i, PageType::Leaf);
            node.value_at(&mut cursor, &mut value, i);
            assert_eq!(&key, expected_key);
            assert_eq!(&value, expected_value);
        }
        assert!(cursor.check_and_clear_exception().is_ok());
    }
}
