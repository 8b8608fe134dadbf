//! # BurrowDB - Embedded B+Tree Index Engine
//!
//! BurrowDB implements the node layout of a persistent B+tree index that is
//! generic over keys and values of variable serialized length. Each node
//! occupies one fixed-size page supplied by an external paged-buffer
//! subsystem; the engine packs a variable number of variable-length entries
//! into that page while supporting insertion, deletion, in-place update,
//! split, and deferred space reclamation.
//!
//! ## Architecture
//!
//! The crate is layered around the page bytes:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Tree algorithms (external)         │
//! ├─────────────────────────────────────┤
//! │   Node engine (btree::DynamicNode)   │
//! │   overflow / defragment / split      │
//! ├─────────────────────────────────────┤
//! │   Size & offset words (encoding)     │
//! ├─────────────────────────────────────┤
//! │   Page cursor (storage::PageCursor)  │
//! ├─────────────────────────────────────┤
//! │   Page cache & durability (external) │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Zero-Copy Design
//!
//! A node is never materialized as an owned structure. All operations run
//! directly against the page bytes through a [`storage::PageCursor`], and the
//! fixed node header is viewed in place with `zerocopy`. The engine allocates
//! only small temporary offset tables during defragmentation.
//!
//! ## Error Model
//!
//! Structural corruption (offsets outside the page, size words above the
//! entry cap) is reported through the cursor's sticky exception channel
//! rather than by panicking, preserving the optimistic-read protocol of the
//! page cache above: a reader may observe torn data under a concurrent
//! writer and retries based on generation checks at the cache layer.
//! Construction-time problems (a page too small to hold two entries) are
//! ordinary `eyre` errors.
//!
//! ## Module Overview
//!
//! - [`storage`]: page cursor and the fixed node header
//! - [`encoding`]: fixed-width size and offset words with the tombstone bit
//! - [`btree`]: the dynamic-size node engine, defragmenter, and leaf splitter
//! - [`config`]: crate-wide constants and their relationships

pub mod btree;
pub mod config;
pub mod encoding;
pub mod storage;

pub use btree::{BytesLayout, DynamicNode, Layout, Overflow, SplitPropagation};
pub use storage::{NodeHeader, PageCursor, PageType, NODE_HEADER_SIZE};
