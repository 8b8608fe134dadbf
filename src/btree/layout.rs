//! Key/value layout capability.
//!
//! The node engine never interprets key or value bytes. Everything it needs
//! from the key and value types is bundled in the [`Layout`] trait: measure
//! a serialized size, write at a cursor, read a known number of bytes back,
//! and produce fresh or copied instances for the splitter. Implementations
//! must keep sizes deterministic; the engine writes exactly `key_size` and
//! `value_size` bytes and later reads them back by those counts.

use crate::storage::PageCursor;

pub trait Layout {
    type Key;
    type Value;

    /// Serialized length of `key` in bytes. Must be deterministic and within
    /// the node's `key_value_size_cap`.
    fn key_size(&self, key: &Self::Key) -> usize;

    /// Serialized length of `value` in bytes. Same rules as [`Layout::key_size`].
    fn value_size(&self, value: &Self::Value) -> usize;

    fn write_key(&self, cursor: &mut PageCursor<'_>, key: &Self::Key);

    fn write_value(&self, cursor: &mut PageCursor<'_>, value: &Self::Value);

    /// Reads exactly `key_size` bytes at the cursor into `into`.
    fn read_key(&self, cursor: &mut PageCursor<'_>, into: &mut Self::Key, key_size: usize);

    /// Reads exactly `value_size` bytes at the cursor into `into`.
    fn read_value(&self, cursor: &mut PageCursor<'_>, into: &mut Self::Value, value_size: usize);

    fn copy_key(&self, from: &Self::Key, into: &mut Self::Key);

    fn new_key(&self) -> Self::Key;

    fn new_value(&self) -> Self::Value;
}

/// Reference layout over raw byte strings. Keys and values are stored
/// verbatim; the size words in the blob carry all length information.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesLayout;

impl Layout for BytesLayout {
    type Key = Vec<u8>;
    type Value = Vec<u8>;

    fn key_size(&self, key: &Vec<u8>) -> usize {
        key.len()
    }

    fn value_size(&self, value: &Vec<u8>) -> usize {
        value.len()
    }

    fn write_key(&self, cursor: &mut PageCursor<'_>, key: &Vec<u8>) {
        cursor.write_bytes(key);
    }

    fn write_value(&self, cursor: &mut PageCursor<'_>, value: &Vec<u8>) {
        cursor.write_bytes(value);
    }

    fn read_key(&self, cursor: &mut PageCursor<'_>, into: &mut Vec<u8>, key_size: usize) {
        into.clear();
        into.resize(key_size, 0);
        cursor.read_bytes(into);
    }

    fn read_value(&self, cursor: &mut PageCursor<'_>, into: &mut Vec<u8>, value_size: usize) {
        into.clear();
        into.resize(value_size, 0);
        cursor.read_bytes(into);
    }

    fn copy_key(&self, from: &Vec<u8>, into: &mut Vec<u8>) {
        into.clear();
        into.extend_from_slice(from);
    }

    fn new_key(&self) -> Vec<u8> {
        Vec::new()
    }

    fn new_value(&self) -> Vec<u8> {
        Vec::new()
    }
}
