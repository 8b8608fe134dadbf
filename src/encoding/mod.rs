//! Wire-level encodings for the dynamic-size node layout.
//!
//! The only encoding the layout needs is the fixed-width size and offset
//! words that prefix every entry blob and populate the offset array. Their
//! widths and the position of the tombstone bit are compile-time constants
//! and form the on-page format's versioning surface.

pub mod dynsize;
