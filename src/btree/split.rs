//! # Leaf Split
//!
//! Splitting halves *used space*, not entry count: the split position is
//! chosen by walking the post-insert entry sequence left to right,
//! accumulating per-entry byte costs, and stopping where the accumulated
//! cost is closest to half the node's total space. With variable-length
//! entries this keeps both halves near 50% full whether the node holds many
//! tiny entries or a few huge ones.
//!
//! ## Transfer
//!
//! Entries move to the right sibling as raw blobs: size words and payload
//! are copied below the right page's alloc offset in one memmove per entry,
//! without decoding through the layout. Each transferred source blob is
//! tombstoned; the left page is then defragmented in one pass, and the new
//! entry lands in whichever half owns its position:
//!
//! ```text
//! insert_pos < middle                 insert_pos >= middle
//!                v---v   copy                        v---v   copy
//! before  _,_,_,_,_,_,_,_             before  _,_,_,_,_,_,_,_
//! insert  _,_,X,_,_ | _,_,_,_         insert  _,_,_,_,_ | _,X,_,_
//! middle          ^                   middle          ^
//! ```
//!
//! The key to propagate upward is the smallest key of the right sibling:
//! the new key itself when the split lands exactly on the insert position,
//! otherwise the existing key that becomes right position zero.

use crate::btree::layout::Layout;
use crate::btree::node::DynamicNode;
use crate::encoding::dynsize::{
    put_key_offset, read_key_size, read_value_size, strip_tombstone, put_tombstone,
    BYTE_SIZE_KEY_SIZE, BYTE_SIZE_VALUE_SIZE,
};
use crate::storage::{PageCursor, PageType};

/// Caller-provided holder for the split key bubbled up to the parent.
pub struct SplitPropagation<K> {
    pub right_key: K,
}

impl<K> SplitPropagation<K> {
    pub fn new(right_key: K) -> Self {
        Self { right_key }
    }
}

impl<L: Layout> DynamicNode<L> {
    /// Splits an overflowing leaf into `left_cursor` and the empty page
    /// behind `right_cursor`, inserting the new entry on the correct side
    /// and filling `propagation` with the key for the parent. Both key
    /// counts are written; the right page must already be initialized.
    #[allow(clippy::too_many_arguments)]
    pub fn split_leaf(
        &self,
        left_cursor: &mut PageCursor<'_>,
        left_key_count: usize,
        right_cursor: &mut PageCursor<'_>,
        insert_pos: usize,
        new_key: &L::Key,
        new_value: &L::Value,
        propagation: &mut SplitPropagation<L::Key>,
    ) {
        let middle_pos = self.middle(left_cursor, insert_pos, new_key, new_value);
        let key_count_after_insert = left_key_count + 1;

        if middle_pos == insert_pos {
            self.layout.copy_key(new_key, &mut propagation.right_key);
        } else {
            let pos = if insert_pos < middle_pos {
                middle_pos - 1
            } else {
                middle_pos
            };
            self.key_at(left_cursor, &mut propagation.right_key, pos, PageType::Leaf);
        }
        let right_key_count = key_count_after_insert - middle_pos;

        if insert_pos < middle_pos {
            //                  v-------v       copy
            // before _,_,_,_,_,_,_,_,_,_
            // insert _,_,_,X,_,_,_,_,_,_,_
            // middle           ^
            self.move_keys_and_values(
                left_cursor,
                middle_pos - 1,
                right_cursor,
                0,
                right_key_count,
            );
            self.defragment_leaf(left_cursor);
            self.insert_key_value_at(left_cursor, new_key, new_value, insert_pos, middle_pos - 1);
        } else {
            //                  v---v           first copy
            //                        v-v       second copy
            // before _,_,_,_,_,_,_,_,_,_
            // insert _,_,_,_,_,_,_,_,X,_,_
            // middle           ^
            let new_insert_pos = insert_pos - middle_pos;
            let keys_to_move = left_key_count - middle_pos;
            self.move_keys_and_values(left_cursor, middle_pos, right_cursor, 0, keys_to_move);
            self.defragment_leaf(left_cursor);
            self.insert_key_value_at(right_cursor, new_key, new_value, new_insert_pos, keys_to_move);
        }

        self.set_key_count(left_cursor, middle_pos);
        self.set_key_count(right_cursor, right_key_count);
    }

    /// Finds the position that most evenly halves used space, counting the
    /// incoming entry at `insert_pos`. Walks the post-insert sequence and
    /// stops as soon as another step would grow the distance to half space.
    fn middle(
        &self,
        left_cursor: &mut PageCursor<'_>,
        insert_pos: usize,
        new_key: &L::Key,
        new_value: &L::Value,
    ) -> usize {
        let half_space = self.half_space() as isize;
        let mut middle = 0usize;
        let mut current_pos = 0usize;
        let mut middle_space = 0isize;
        let mut current_delta = half_space;
        let mut included_new = false;

        loop {
            // Keeping one more entry in the left node may come closer to an
            // even split.
            middle += 1;
            current_pos += 1;
            let space = if current_pos == insert_pos && !included_new {
                included_new = true;
                current_pos -= 1;
                self.total_space_of_key_value(new_key, new_value) as isize
            } else {
                self.total_space_of_key_value_at(left_cursor, current_pos) as isize
            };
            middle_space += space;
            let prev_delta = current_delta;
            current_delta = (middle_space - half_space).abs();
            if current_delta >= prev_delta {
                break;
            }
        }
        // Step back to the pos that most equally divides the space in two.
        middle - 1
    }

    /// Transfers `count` entries starting at `from_pos` into the right
    /// page, writing its offset-array slots from `to_pos` upward.
    fn move_keys_and_values(
        &self,
        from_cursor: &mut PageCursor<'_>,
        from_pos: usize,
        to_cursor: &mut PageCursor<'_>,
        to_pos: usize,
        count: usize,
    ) {
        let mut right_alloc_offset = self.alloc_offset(to_cursor);
        for i in 0..count {
            right_alloc_offset =
                self.transfer_raw_key_value(from_cursor, from_pos + i, to_cursor, right_alloc_offset);
            to_cursor.set_offset(self.key_pos_offset_leaf(to_pos + i));
            put_key_offset(to_cursor, right_alloc_offset as u16);
        }
        self.set_alloc_offset(to_cursor, right_alloc_offset);
    }

    /// Copies the raw blob of `from_pos` to immediately below the right
    /// page's alloc offset and tombstones the source. Returns the new right
    /// alloc offset.
    fn transfer_raw_key_value(
        &self,
        from_cursor: &mut PageCursor<'_>,
        from_pos: usize,
        to_cursor: &mut PageCursor<'_>,
        right_alloc_offset: usize,
    ) -> usize {
        self.place_cursor_at_actual_key(from_cursor, from_pos, PageType::Leaf);
        let from_key_offset = from_cursor.offset();
        let key_size = strip_tombstone(read_key_size(from_cursor)) as usize;
        let value_size = read_value_size(from_cursor) as usize;

        let to_copy = BYTE_SIZE_KEY_SIZE + BYTE_SIZE_VALUE_SIZE + key_size + value_size;
        let Some(new_right_alloc_offset) = right_alloc_offset.checked_sub(to_copy) else {
            to_cursor.set_cursor_exception(format!(
                "right sibling heap exhausted: alloc_offset={right_alloc_offset}, blob needs {to_copy} bytes"
            ));
            return right_alloc_offset;
        };
        from_cursor.copy_to(from_key_offset, to_cursor, new_right_alloc_offset, to_copy);

        from_cursor.set_offset(from_key_offset);
        put_tombstone(from_cursor);
        new_right_alloc_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::layout::{BytesLayout, Layout};
    use crate::encoding::dynsize::BYTE_SIZE_TOTAL_OVERHEAD;

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

    /// Ten entries of 20 bytes each (8-byte key, 6-byte value, 6 overhead).
    fn fill_ten_uniform(node: &DynamicNode<BytesLayout>, cursor: &mut PageCursor<'_>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..10)
            .map(|i| (vec![b'a' + i as u8; 8], vec![i as u8; 6]))
            .collect();
        for (i, (key, value)) in entries.iter().enumerate() {
            node.insert_key_value_at(cursor, key, value, i, i);
        }
        node.set_key_count(cursor, 10);
        entries
    }

    fn collect_keys(
        node: &DynamicNode<BytesLayout>,
        cursor: &mut PageCursor<'_>,
    ) -> Vec<Vec<u8>> {
        let key_count = node.key_count(cursor);
        let mut keys = Vec::with_capacity(key_count);
        for pos in 0..key_count {
            let mut key = Vec::new();
            node.key_at(cursor, &mut key, pos, PageType::Leaf);
            keys.push(key);
        }
        keys
    }

    fn used_space(node: &DynamicNode<BytesLayout>, cursor: &mut PageCursor<'_>) -> usize {
        let key_count = node.key_count(cursor);
        (0..key_count)
            .map(|pos| node.total_space_of_key_value_at(cursor, pos))
            .sum()
    }

    #[test]
    fn split_insert_before_middle() {
        let node = node();
        let mut left = leaf_page(&node);
        let mut right = leaf_page(&node);
        let mut left_cursor = PageCursor::new(&mut left);
        let mut right_cursor = PageCursor::new(&mut right);

        let entries = fill_ten_uniform(&node, &mut left_cursor);
        let new_key = vec![b'N'; 8];
        let new_value = vec![0xEE; 6];
        let mut propagation = SplitPropagation::new(node.layout().new_key());

        node.split_leaf(
            &mut left_cursor,
            10,
            &mut right_cursor,
            2,
            &new_key,
            &new_value,
            &mut propagation,
        );

        assert_eq!(node.key_count(&left_cursor), 6);
        assert_eq!(node.key_count(&right_cursor), 5);

        let left_keys = collect_keys(&node, &mut left_cursor);
        let right_keys = collect_keys(&node, &mut right_cursor);
        assert_eq!(
            left_keys,
            vec![
                entries[0].0.clone(),
                entries[1].0.clone(),
                new_key.clone(),
                entries[2].0.clone(),
                entries[3].0.clone(),
                entries[4].0.clone(),
            ]
        );
        assert_eq!(
            right_keys,
            entries[5..10].iter().map(|(k, _)| k.clone()).collect::<Vec<_>>()
        );
        assert_eq!(propagation.right_key, right_keys[0]);

        // Values survived the raw transfer.
        let mut value = Vec::new();
        node.value_at(&mut right_cursor, &mut value, 4);
        assert_eq!(value, entries[9].1);

        assert_eq!(node.dead_space(&mut left_cursor), 0);
        assert!(left_cursor.check_and_clear_exception().is_ok());
        assert!(right_cursor.check_and_clear_exception().is_ok());
    }

    #[test]
    fn split_insert_after_middle() {
        let node = node();
        let mut left = leaf_page(&node);
        let mut right = leaf_page(&node);
        let mut left_cursor = PageCursor::new(&mut left);
        let mut right_cursor = PageCursor::new(&mut right);

        let entries = fill_ten_uniform(&node, &mut left_cursor);
        let new_key = vec![b'N'; 8];
        let new_value = vec![0xEE; 6];
        let mut propagation = SplitPropagation::new(node.layout().new_key());

        node.split_leaf(
            &mut left_cursor,
            10,
            &mut right_cursor,
            8,
            &new_key,
            &new_value,
            &mut propagation,
        );

        assert_eq!(node.key_count(&left_cursor), 6);
        assert_eq!(node.key_count(&right_cursor), 5);

        let left_keys = collect_keys(&node, &mut left_cursor);
        let right_keys = collect_keys(&node, &mut right_cursor);
        assert_eq!(
            left_keys,
            entries[0..6].iter().map(|(k, _)| k.clone()).collect::<Vec<_>>()
        );
        assert_eq!(
            right_keys,
            vec![
                entries[6].0.clone(),
                entries[7].0.clone(),
                new_key.clone(),
                entries[8].0.clone(),
                entries[9].0.clone(),
            ]
        );
        assert_eq!(propagation.right_key, right_keys[0]);
    }

    #[test]
    fn split_at_middle_propagates_new_key() {
        let node = node();
        let mut left = leaf_page(&node);
        let mut right = leaf_page(&node);
        let mut left_cursor = PageCursor::new(&mut left);
        let mut right_cursor = PageCursor::new(&mut right);

        let entries = fill_ten_uniform(&node, &mut left_cursor);
        let new_key = vec![b'N'; 8];
        let new_value = vec![0xEE; 6];
        let mut propagation = SplitPropagation::new(node.layout().new_key());

        node.split_leaf(
            &mut left_cursor,
            10,
            &mut right_cursor,
            6,
            &new_key,
            &new_value,
            &mut propagation,
        );

        assert_eq!(propagation.right_key, new_key);
        let right_keys = collect_keys(&node, &mut right_cursor);
        assert_eq!(right_keys[0], new_key);
        assert_eq!(
            right_keys[1..],
            entries[6..10]
                .iter()
                .map(|(k, _)| k.clone())
                .collect::<Vec<_>>()[..]
        );
    }

    #[test]
    fn split_halves_used_space_with_skewed_sizes() {
        let node = node();
        let mut left = leaf_page(&node);
        let mut right = leaf_page(&node);
        let mut left_cursor = PageCursor::new(&mut left);
        let mut right_cursor = PageCursor::new(&mut right);

        // Two large entries in the middle of a run of small ones, so the
        // split point lands by byte cost, not by entry count.
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..3)
            .map(|i| (vec![b'a' + i as u8; 4], vec![0x22; 4]))
            .chain((0..2).map(|i| (vec![b'A' + i as u8; 20], vec![0x11; 20])))
            .chain((0..3).map(|i| (vec![b'p' + i as u8; 4], vec![0x22; 4])))
            .collect();
        let mut max_footprint = 0;
        for (i, (key, value)) in entries.iter().enumerate() {
            node.insert_key_value_at(&mut left_cursor, key, value, i, i);
            max_footprint =
                max_footprint.max(BYTE_SIZE_TOTAL_OVERHEAD + key.len() + value.len());
        }
        node.set_key_count(&mut left_cursor, entries.len());

        let new_key = vec![b'm'; 4];
        let new_value = vec![0x33; 4];
        let mut propagation = SplitPropagation::new(node.layout().new_key());

        node.split_leaf(
            &mut left_cursor,
            entries.len(),
            &mut right_cursor,
            5,
            &new_key,
            &new_value,
            &mut propagation,
        );

        let left_used = used_space(&node, &mut left_cursor);
        let right_used = used_space(&node, &mut right_cursor);
        assert!(
            left_used.abs_diff(right_used) <= max_footprint,
            "unbalanced split: left={left_used}, right={right_used}, max={max_footprint}"
        );
        assert_eq!(
            node.key_count(&left_cursor) + node.key_count(&right_cursor),
            entries.len() + 1
        );
    }

    #[test]
    fn split_leaves_no_dead_space_on_either_side() {
        let node = node();
        let mut left = leaf_page(&node);
        let mut right = leaf_page(&node);
        let mut left_cursor = PageCursor::new(&mut left);
        let mut right_cursor = PageCursor::new(&mut right);

        fill_ten_uniform(&node, &mut left_cursor);
        let mut propagation = SplitPropagation::new(node.layout().new_key());

        node.split_leaf(
            &mut left_cursor,
            10,
            &mut right_cursor,
            0,
            &vec![b'0'; 8],
            &vec![0; 6],
            &mut propagation,
        );

        assert_eq!(node.dead_space(&mut left_cursor), 0);
        assert_eq!(node.dead_space(&mut right_cursor), 0);

        // Both sides hold the full entry set between them.
        assert_eq!(
            node.key_count(&left_cursor) + node.key_count(&right_cursor),
            11
        );
    }
}
