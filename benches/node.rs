//! Node layout benchmarks for BurrowDB
//!
//! These benchmarks measure the hot operations of the dynamic-size node
//! engine: filling a leaf, reclaiming tombstoned space, and splitting an
//! overflowing leaf into a sibling.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use burrowdb::{BytesLayout, DynamicNode, Layout, Overflow, PageCursor, PageType, SplitPropagation};

const PAGE_SIZE: usize = 4096;

fn fresh_leaf(node: &DynamicNode<BytesLayout>) -> Vec<u8> {
    let mut page = vec![0u8; node.page_size()];
    let mut cursor = PageCursor::new(&mut page);
    node.initialize(&mut cursor, PageType::Leaf, 1);
    page
}

fn fill_leaf(node: &DynamicNode<BytesLayout>, page: &mut [u8], entry_bytes: usize) -> usize {
    let key = vec![0x4B; entry_bytes / 2];
    let value = vec![0x56; entry_bytes / 2];
    let mut cursor = PageCursor::new(page);
    let mut key_count = 0;
    while node.leaf_overflow(&mut cursor, key_count, &key, &value) == Overflow::No {
        node.insert_key_value_at(&mut cursor, &key, &value, key_count, key_count);
        key_count += 1;
        node.set_key_count(&mut cursor, key_count);
    }
    key_count
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_insert");
    let node = DynamicNode::new(PAGE_SIZE, BytesLayout).unwrap();

    for entry_bytes in [16, 64, 256].iter() {
        group.throughput(Throughput::Bytes(*entry_bytes as u64));
        group.bench_with_input(
            BenchmarkId::new("fill_leaf", entry_bytes),
            entry_bytes,
            |b, &entry_bytes| {
                b.iter_with_setup(
                    || fresh_leaf(&node),
                    |mut page| {
                        let filled = fill_leaf(&node, &mut page, entry_bytes);
                        black_box((page, filled))
                    },
                );
            },
        );
    }

    group.finish();
}

fn bench_defragment(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_defragment");
    let node = DynamicNode::new(PAGE_SIZE, BytesLayout).unwrap();

    group.bench_function("every_other_entry_dead", |b| {
        b.iter_with_setup(
            || {
                let mut page = fresh_leaf(&node);
                let mut key_count = fill_leaf(&node, &mut page, 32);
                let mut cursor = PageCursor::new(&mut page);
                let mut pos = 0;
                while pos < key_count {
                    node.remove_key_value_at(&mut cursor, pos, key_count);
                    key_count -= 1;
                    node.set_key_count(&mut cursor, key_count);
                    pos += 1;
                }
                page
            },
            |mut page| {
                let mut cursor = PageCursor::new(&mut page);
                node.defragment_leaf(&mut cursor);
                black_box(page)
            },
        );
    });

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("node_split");
    let node = DynamicNode::new(PAGE_SIZE, BytesLayout).unwrap();

    group.bench_function("split_full_leaf", |b| {
        b.iter_with_setup(
            || {
                let mut left = fresh_leaf(&node);
                let key_count = fill_leaf(&node, &mut left, 32);
                (left, fresh_leaf(&node), key_count)
            },
            |(mut left, mut right, key_count)| {
                let mut left_cursor = PageCursor::new(&mut left);
                let mut right_cursor = PageCursor::new(&mut right);
                let mut propagation = SplitPropagation::new(node.layout().new_key());
                node.split_leaf(
                    &mut left_cursor,
                    key_count,
                    &mut right_cursor,
                    key_count / 2,
                    &vec![0x4B; 16],
                    &vec![0x56; 16],
                    &mut propagation,
                );
                black_box((left, right))
            },
        );
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_defragment, bench_split);
criterion_main!(benches);
