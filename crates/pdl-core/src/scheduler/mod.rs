//! Work-stealing part scheduler.
//!
//! Workers call `acquire_next_part` whenever they are idle and take the
//! first eligible part in table order. Assignment, chunk commits, and
//! releases go through one mutex; a worker that stalled past a reclaim
//! finds out on its next commit and drops the part.

mod table;

pub use table::{Assignment, PartTable, Release, TableSnapshot, WorkerId};
