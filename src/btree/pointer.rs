//! Generation-safe child pointers.
//!
//! Internal nodes reference children through 8-byte on-page pointers that
//! pair the target page id with the generation the pointer was written
//! under:
//!
//! ```text
//! [ generation : u32 LE ][ page id : u32 LE ]
//! ```
//!
//! Writes stamp the current unstable generation. Reads accept a pointer
//! whose generation is at or below the stable generation (a checkpointed
//! write) or exactly the unstable generation (written in the current epoch).
//! Anything in between belongs to a crashed epoch and anything above is from
//! the future; both record a cursor exception so the tree layer can retry
//! under a fresh generation snapshot or escalate.

use crate::storage::PageCursor;

/// On-page width of one child pointer.
pub const CHILD_POINTER_SIZE: usize = 8;

/// Page id returned for unreadable pointers; page 0 is never a tree node.
pub const NO_CHILD: u32 = 0;

/// Writes `child` at the cursor, stamped with the unstable generation.
pub fn write_child(cursor: &mut PageCursor<'_>, child: u32, unstable_generation: u32) {
    cursor.put_u32(unstable_generation);
    cursor.put_u32(child);
}

/// Reads the child pointer at the cursor, validating its generation against
/// the caller's snapshot. Returns [`NO_CHILD`] and records a cursor
/// exception when the generation is unreadable.
pub fn read_child(
    cursor: &mut PageCursor<'_>,
    stable_generation: u32,
    unstable_generation: u32,
    pos: usize,
) -> u32 {
    let generation = cursor.get_u32();
    let child = cursor.get_u32();

    if generation > stable_generation && generation != unstable_generation {
        cursor.set_cursor_exception(format!(
            "child pointer at pos {pos} carries generation {generation}, \
             expected <= stable {stable_generation} or == unstable {unstable_generation}"
        ));
        return NO_CHILD;
    }
    child
}
