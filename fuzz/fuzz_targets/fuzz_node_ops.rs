//! Fuzz testing for the dynamic-size node layout.
//!
//! Drives arbitrary operation sequences against one leaf page while
//! mirroring every mutation into a shadow vector, then checks the layout
//! invariants and the byte-for-byte round trip after each step.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use burrowdb::encoding::dynsize::{
    has_tombstone, read_key_size, read_value_size, strip_tombstone, BYTE_SIZE_KEY_SIZE,
    BYTE_SIZE_VALUE_SIZE,
};
use burrowdb::{BytesLayout, DynamicNode, Overflow, PageCursor, PageType};

const PAGE_SIZE: usize = 512;

#[derive(Debug, Arbitrary)]
struct NodeInput {
    operations: Vec<NodeOperation>,
}

#[derive(Debug, Arbitrary)]
enum NodeOperation {
    Insert { key: Vec<u8>, value: Vec<u8>, pos_seed: u8 },
    Remove { pos_seed: u8 },
    SetValue { value: Vec<u8>, pos_seed: u8 },
    Defragment,
}

fn verify(
    node: &DynamicNode<BytesLayout>,
    cursor: &mut PageCursor<'_>,
    model: &[(Vec<u8>, Vec<u8>)],
) {
    assert_eq!(node.key_count(cursor), model.len());

    let alloc_offset = node.alloc_offset(cursor);
    assert!(alloc_offset <= PAGE_SIZE);

    // The heap walk must land exactly on the page end, and dead space must
    // match the tombstoned blobs byte for byte.
    let mut offset = alloc_offset;
    let mut live = 0usize;
    let mut dead_bytes = 0usize;
    while offset < PAGE_SIZE {
        cursor.set_offset(offset);
        let raw = read_key_size(cursor);
        let value_size = read_value_size(cursor) as usize;
        let blob_size =
            BYTE_SIZE_KEY_SIZE + BYTE_SIZE_VALUE_SIZE + strip_tombstone(raw) as usize + value_size;
        if has_tombstone(raw) {
            dead_bytes += blob_size;
        } else {
            live += 1;
        }
        offset += blob_size;
    }
    assert_eq!(offset, PAGE_SIZE);
    assert_eq!(live, model.len());
    assert_eq!(node.dead_space(cursor), dead_bytes);

    let mut key = Vec::new();
    let mut value = Vec::new();
    for (pos, (expected_key, expected_value)) in model.iter().enumerate() {
        node.key_at(cursor, &mut key, pos, PageType::Leaf);
        node.value_at(cursor, &mut value, pos);
        assert_eq!(&key, expected_key);
        assert_eq!(&value, expected_value);
    }
    assert!(cursor.check_and_clear_exception().is_ok());
}

fuzz_target!(|input: NodeInput| {
    let node = DynamicNode::new(PAGE_SIZE, BytesLayout).unwrap();
    let mut page = vec![0u8; PAGE_SIZE];
    let mut cursor = PageCursor::new(&mut page);
    node.initialize(&mut cursor, PageType::Leaf, 1);

    let cap = node.key_value_size_cap();
    let mut model: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();

    for operation in input.operations {
        match operation {
            NodeOperation::Insert {
                mut key,
                mut value,
                pos_seed,
            } => {
                key.truncate(cap);
                value.truncate(cap);
                let pos = pos_seed as usize % (model.len() + 1);
                match node.leaf_overflow(&mut cursor, model.len(), &key, &value) {
                    Overflow::No => {}
                    Overflow::NeedDefrag => node.defragment_leaf(&mut cursor),
                    Overflow::Yes => continue,
                }
                node.insert_key_value_at(&mut cursor, &key, &value, pos, model.len());
                model.insert(pos, (key, value));
                node.set_key_count(&mut cursor, model.len());
            }
            NodeOperation::Remove { pos_seed } => {
                if model.is_empty() {
                    continue;
                }
                let pos = pos_seed as usize % model.len();
                node.remove_key_value_at(&mut cursor, pos, model.len());
                model.remove(pos);
                node.set_key_count(&mut cursor, model.len());
            }
            NodeOperation::SetValue { mut value, pos_seed } => {
                if model.is_empty() {
                    continue;
                }
                value.truncate(cap);
                let pos = pos_seed as usize % model.len();
                let updated = node.set_value_at(&mut cursor, &value, pos);
                assert_eq!(updated, value.len() == model[pos].1.len());
                if updated {
                    model[pos].1 = value;
                }
            }
            NodeOperation::Defragment => {
                node.defragment_leaf(&mut cursor);
                assert_eq!(node.dead_space(&mut cursor), 0);
            }
        }
        verify(&node, &mut cursor, &model);
    }
});
