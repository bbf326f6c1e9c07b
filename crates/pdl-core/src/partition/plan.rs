//! Fresh and resumed part tables.

use super::part::{PartRecord, PartStatus};
use crate::job::MAX_PARTS;

/// Smallest part the planner will create when it can choose (1 MiB).
pub const MIN_PART_SIZE: u64 = 1024 * 1024;

/// A planned part table: always `MAX_PARTS` records, of which the first
/// `number_of_parts` carry real work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    pub parts: Vec<PartRecord>,
    pub number_of_parts: usize,
}

impl PartPlan {
    /// Worker count actually worth spawning for `requested` workers.
    pub fn worker_count(&self, requested: usize) -> usize {
        requested.clamp(1, self.number_of_parts.max(1))
    }
}

/// Builds the part table for a fresh download.
///
/// - Unknown size, or a server without range support: one part covering
///   everything.
/// - `size / 64 >= 1 MiB`: 64 equal parts; the last absorbs the remainder.
/// - Otherwise 1 MiB parts, `(size - 1) / 1 MiB + 1` of them; the last is
///   the remainder.
///
/// Slots past `number_of_parts` are pre-marked complete and start at `size`
/// so offsets stay non-decreasing. A zero-length first part is complete too.
pub fn plan_fresh(file_size: Option<u64>, range_support: bool) -> PartPlan {
    let (number_of_parts, part_size) = match file_size {
        None => (1, 0),
        Some(size) if !range_support => (1, size),
        Some(size) => {
            let part_size = size / MAX_PARTS as u64;
            if part_size >= MIN_PART_SIZE {
                (MAX_PARTS, part_size)
            } else {
                let n = (size.saturating_sub(1) / MIN_PART_SIZE + 1) as usize;
                (n.clamp(1, MAX_PARTS), MIN_PART_SIZE)
            }
        }
    };

    let tail_offset = file_size.unwrap_or(0);
    let mut parts = Vec::with_capacity(MAX_PARTS);
    for i in 0..MAX_PARTS {
        if i < number_of_parts {
            parts.push(PartRecord::pending(part_size * i as u64));
        } else {
            parts.push(PartRecord::unused(tail_offset));
        }
    }
    if file_size == Some(0) {
        parts[0].status = PartStatus::Complete;
    }

    PartPlan {
        parts,
        number_of_parts,
    }
}

/// Rebuilds the plan from a persisted table.
///
/// Incomplete parts go back to pending with `retry_count = -1`; their
/// `downloaded_bytes` are kept and become the resume offset. Complete parts
/// are untouched.
pub fn plan_resume(mut parts: Vec<PartRecord>, number_of_parts: usize) -> PartPlan {
    let number_of_parts = number_of_parts.clamp(1, MAX_PARTS);
    if parts.len() > MAX_PARTS {
        parts.truncate(MAX_PARTS);
    }
    let tail_offset = parts.last().map(|p| p.start_offset).unwrap_or(0);
    while parts.len() < MAX_PARTS {
        parts.push(PartRecord::unused(tail_offset));
    }
    for p in parts.iter_mut() {
        if p.status != PartStatus::Complete {
            p.status = PartStatus::Pending;
            p.retry_count = -1;
        }
    }
    PartPlan {
        parts,
        number_of_parts,
    }
}

/// Exclusive end offset of part `index`: the next part's start, or the file
/// size for the last part. None when the size is unknown.
pub fn part_end(
    parts: &[PartRecord],
    index: usize,
    number_of_parts: usize,
    file_size: Option<u64>,
) -> Option<u64> {
    if index + 1 < number_of_parts {
        parts.get(index + 1).map(|p| p.start_offset)
    } else {
        file_size
    }
}
