//! # BurrowDB Configuration Constants
//!
//! This module centralizes crate-wide constants and documents how they relate
//! to each other. Constants that depend on one another are co-located to
//! prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! page size (runtime, per index)
//!       │
//!       ├─> MAX_PAGE_SIZE (must be <=)
//!       │     Entry offsets and the alloc offset are stored in 2-byte
//!       │     words, so a page larger than 0xFFFF bytes cannot be
//!       │     addressed by the offset array.
//!       │
//!       └─> key_value_size_cap (derived at node construction)
//!             total_space / LEAST_NUMBER_OF_ENTRIES_PER_PAGE
//!                 - BYTE_SIZE_TOTAL_OVERHEAD
//!             must be >= MINIMUM_ENTRY_SIZE_CAP or construction fails
//!             with a metadata mismatch.
//! ```
//!
//! The fixed word widths themselves (`BYTE_SIZE_KEY_SIZE` and friends) live
//! in [`crate::encoding::dynsize`] because they are part of the on-page
//! format's versioning surface, not tunables.

/// Every leaf page must be able to hold at least this many entries. The
/// per-entry size cap is derived from it at node construction.
pub const LEAST_NUMBER_OF_ENTRIES_PER_PAGE: usize = 2;

/// Lower bound on the derived key/value size cap. A page too small to give
/// each of the minimum entries at least this many bytes is rejected.
pub const MINIMUM_ENTRY_SIZE_CAP: usize = 64;

/// Largest supported page. Offsets into the page are stored in 2-byte words.
pub const MAX_PAGE_SIZE: usize = u16::MAX as usize;
