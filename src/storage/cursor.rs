//! # Page Cursor
//!
//! A [`PageCursor`] is a byte-addressable view over exactly one page. The
//! node engine performs every read and write through it: seek to an offset,
//! read or write fixed-width words or raw byte runs, move ranges within the
//! page, or copy ranges into another page during a split.
//!
//! ## Sticky Exceptions
//!
//! Structural range checks do not return errors from every accessor. An
//! out-of-range access records a *sticky* exception on the cursor (the first
//! one wins), reads yield zeroes, and writes are dropped. The caller runs
//! the operation to completion and then observes the cursor state once:
//!
//! ```text
//! let mut cursor = PageCursor::new(page);
//! node.key_at(&mut cursor, &mut key, pos, PageType::Leaf);
//! cursor.check_and_clear_exception()?;   // corrupt page surfaces here
//! ```
//!
//! This keeps a torn read under an optimistic page cache from crashing the
//! reader; the cache layer retries based on its generation checks.
//!
//! ## Memory Moves
//!
//! `copy_within` has memmove semantics so overlapping ranges are safe, which
//! the defragmenter relies on when sliding live entries over dead ones.

use eyre::{bail, Result};

pub struct PageCursor<'a> {
    data: &'a mut [u8],
    offset: usize,
    exception: Option<String>,
}

impl<'a> PageCursor<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            offset: 0,
            exception: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn advance(&mut self, delta: usize) {
        self.offset = self.offset.saturating_add(delta);
    }

    /// Raw view of the whole page, for the zerocopy header structs.
    pub fn bytes(&self) -> &[u8] {
        self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    fn range_ok(&mut self, offset: usize, len: usize) -> bool {
        match offset.checked_add(len) {
            Some(end) if end <= self.data.len() => true,
            _ => {
                self.set_cursor_exception(format!(
                    "page access out of bounds: offset={}, len={}, page_size={}",
                    offset,
                    len,
                    self.data.len()
                ));
                false
            }
        }
    }

    pub fn get_u16(&mut self) -> u16 {
        if !self.range_ok(self.offset, 2) {
            self.advance(2);
            return 0;
        }
        let value = u16::from_le_bytes([self.data[self.offset], self.data[self.offset + 1]]);
        self.offset += 2;
        value
    }

    pub fn put_u16(&mut self, value: u16) {
        if !self.range_ok(self.offset, 2) {
            self.advance(2);
            return;
        }
        self.data[self.offset..self.offset + 2].copy_from_slice(&value.to_le_bytes());
        self.offset += 2;
    }

    pub fn get_u32(&mut self) -> u32 {
        if !self.range_ok(self.offset, 4) {
            self.advance(4);
            return 0;
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[self.offset..self.offset + 4]);
        self.offset += 4;
        u32::from_le_bytes(buf)
    }

    pub fn put_u32(&mut self, value: u32) {
        if !self.range_ok(self.offset, 4) {
            self.advance(4);
            return;
        }
        self.data[self.offset..self.offset + 4].copy_from_slice(&value.to_le_bytes());
        self.offset += 4;
    }

    /// Reads `into.len()` bytes at the current offset. On a range violation
    /// the destination is zero-filled.
    pub fn read_bytes(&mut self, into: &mut [u8]) {
        let len = into.len();
        if !self.range_ok(self.offset, len) {
            into.fill(0);
            self.advance(len);
            return;
        }
        into.copy_from_slice(&self.data[self.offset..self.offset + len]);
        self.offset += len;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let len = bytes.len();
        if !self.range_ok(self.offset, len) {
            self.advance(len);
            return;
        }
        self.data[self.offset..self.offset + len].copy_from_slice(bytes);
        self.offset += len;
    }

    /// Intra-page move with memmove semantics. The cursor offset is not
    /// touched.
    pub fn copy_within(&mut self, src_offset: usize, dst_offset: usize, len: usize) {
        if !self.range_ok(src_offset, len) || !self.range_ok(dst_offset, len) {
            return;
        }
        self.data.copy_within(src_offset..src_offset + len, dst_offset);
    }

    /// Copies `len` bytes from this page into `target`. Neither cursor's
    /// offset is touched.
    pub fn copy_to(
        &mut self,
        src_offset: usize,
        target: &mut PageCursor<'_>,
        dst_offset: usize,
        len: usize,
    ) {
        if !self.range_ok(src_offset, len) || !target.range_ok(dst_offset, len) {
            return;
        }
        target.data[dst_offset..dst_offset + len]
            .copy_from_slice(&self.data[src_offset..src_offset + len]);
    }

    /// Records a sticky error. The first recorded exception wins; later ones
    /// are dropped so the report names the first detected corruption.
    pub fn set_cursor_exception(&mut self, message: impl Into<String>) {
        if self.exception.is_none() {
            self.exception = Some(message.into());
        }
    }

    pub fn cursor_exception(&self) -> Option<&str> {
        self.exception.as_deref()
    }

    /// Drains the sticky state into a `Result`, clearing it either way.
    pub fn check_and_clear_exception(&mut self) -> Result<()> {
        match self.exception.take() {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }
}
