//! # Storage Module
//!
//! This module provides the byte-level view the node engine operates on: a
//! bounds-checked [`PageCursor`] over one page, and the fixed [`NodeHeader`]
//! at the front of every node page.
//!
//! The page cache, file I/O, and durability live above this crate; they hand
//! the engine one page at a time, borrowed exclusively for the duration of a
//! single node operation. Within that borrow the cursor behaves like a tiny
//! seekable file over the page bytes.
//!
//! ## Safety Model
//!
//! The cursor never panics on a bad offset or length. Out-of-range accesses
//! record a sticky exception on the cursor; reads then yield zeroes and
//! writes are dropped. This mirrors the optimistic-read protocol of the page
//! cache above: a reader racing a writer may observe torn bytes, detect the
//! problem through range checks, and retry under a fresh generation snapshot
//! instead of crashing.

mod cursor;
mod page;

pub use cursor::PageCursor;
pub use page::{validate_page, NodeHeader, PageType, NODE_HEADER_SIZE};
