pub mod constants;

pub use constants::{
    LEAST_NUMBER_OF_ENTRIES_PER_PAGE, MAX_PAGE_SIZE, MINIMUM_ENTRY_SIZE_CAP,
};
