//! Shared part table with ownership tracking.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::partition::{part_end, PartPlan, PartRecord, PartStatus};
use crate::retry::PartError;

/// Worker identifier (index into the worker pool).
pub type WorkerId = usize;

/// What a worker got from `acquire_next_part`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub index: usize,
    pub start_offset: u64,
    /// Bytes of the part already on disk.
    pub downloaded_bytes: u64,
    /// Exclusive end offset; None in size-unknown mode.
    pub end: Option<u64>,
    /// `retry_count` after this assignment (0 on the first attempt).
    pub attempt: u32,
}

impl Assignment {
    /// Planned length of the part, if known.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|e| e.saturating_sub(self.start_offset))
    }

    /// Absolute offset of the next byte to fetch.
    pub fn resume_offset(&self) -> u64 {
        self.start_offset + self.downloaded_bytes
    }
}

/// How a worker hands a part back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Complete,
    Failed,
    Stopped,
    /// Short chunk or lost pause: back to pending, retry not charged.
    Transient,
}

/// Point-in-time copy of the table for persistence and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub parts: Vec<PartRecord>,
    pub number_of_parts: usize,
    pub file_size: Option<u64>,
}

#[derive(Debug)]
struct Slot {
    record: PartRecord,
    owner: Option<WorkerId>,
    last_progress: Instant,
}

#[derive(Debug)]
struct Inner {
    slots: Vec<Slot>,
    number_of_parts: usize,
    file_size: Option<u64>,
}

/// The part table. One mutex serializes assignment, chunk commits, and
/// releases; a worker must still be the recorded owner for any of its
/// updates to land.
#[derive(Debug)]
pub struct PartTable {
    inner: Mutex<Inner>,
    max_retries: u32,
    range_support: bool,
}

impl PartTable {
    pub fn new(plan: PartPlan, file_size: Option<u64>, max_retries: u32, range_support: bool) -> Self {
        let now = Instant::now();
        let slots = plan
            .parts
            .into_iter()
            .map(|record| Slot {
                record,
                owner: None,
                last_progress: now,
            })
            .collect();
        Self {
            inner: Mutex::new(Inner {
                slots,
                number_of_parts: plan.number_of_parts,
                file_size,
            }),
            max_retries,
            range_support,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A worker that panicked mid-update leaves plain counters behind; keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hands the first pending/error part still under the retry cap to
    /// `worker`, marking it downloading. None when nothing is eligible.
    pub fn acquire_next_part(&self, worker: WorkerId) -> Option<Assignment> {
        let mut inner = self.lock();
        let cap = self.max_retries.min(i32::MAX as u32) as i32;
        let n = inner.number_of_parts;
        let index = inner.slots[..n].iter().position(|s| {
            matches!(s.record.status, PartStatus::Pending | PartStatus::Error)
                && s.record.retry_count < cap
        })?;

        let records: Vec<PartRecord> = inner.slots.iter().map(|s| s.record).collect();
        let end = part_end(&records, index, n, inner.file_size);

        let range_support = self.range_support;
        let slot = &mut inner.slots[index];
        slot.record.status = PartStatus::Downloading;
        slot.record.retry_count = (slot.record.retry_count + 1).max(0);
        if !range_support {
            // Without ranges every attempt starts over at the beginning.
            slot.record.downloaded_bytes = 0;
        }
        slot.owner = Some(worker);
        slot.last_progress = Instant::now();

        Some(Assignment {
            index,
            start_offset: slot.record.start_offset,
            downloaded_bytes: slot.record.downloaded_bytes,
            end,
            attempt: slot.record.retry_count as u32,
        })
    }

    pub fn is_owner(&self, index: usize, worker: WorkerId) -> bool {
        let inner = self.lock();
        inner
            .slots
            .get(index)
            .map(|s| s.owner == Some(worker) && s.record.status == PartStatus::Downloading)
            .unwrap_or(false)
    }

    /// Records `len` more bytes on disk for `index`. Fails if `worker` no
    /// longer owns the part.
    pub fn commit_chunk(&self, index: usize, worker: WorkerId, len: u64) -> Result<u64, PartError> {
        let mut inner = self.lock();
        let slot = inner.slots.get_mut(index).ok_or(PartError::OwnershipLost)?;
        if slot.owner != Some(worker) || slot.record.status != PartStatus::Downloading {
            return Err(PartError::OwnershipLost);
        }
        slot.record.downloaded_bytes += len;
        slot.last_progress = Instant::now();
        Ok(slot.record.downloaded_bytes)
    }

    /// Gives the part back. Ignored unless `worker` still owns it.
    pub fn release(&self, index: usize, worker: WorkerId, how: Release) -> bool {
        let mut inner = self.lock();
        let Some(slot) = inner.slots.get_mut(index) else {
            return false;
        };
        if slot.owner != Some(worker) || slot.record.status != PartStatus::Downloading {
            return false;
        }
        slot.owner = None;
        slot.record.status = match how {
            Release::Complete => PartStatus::Complete,
            Release::Failed => PartStatus::Error,
            Release::Stopped => PartStatus::Stopped,
            Release::Transient => {
                slot.record.retry_count = (slot.record.retry_count - 1).max(-1);
                PartStatus::Pending
            }
        };
        let fixed_size = slot.record.resume_offset();
        if how == Release::Complete && inner.file_size.is_none() {
            // Size-unknown mode: the stream end fixes the file size.
            inner.file_size = Some(fixed_size);
        }
        true
    }

    /// Returns downloading parts that made no progress for `timeout` to
    /// pending and clears their owner. The attempt is not charged against
    /// the retry cap. Returns the reclaimed indices.
    pub fn reclaim_stalled(&self, timeout: Duration) -> Vec<usize> {
        let mut inner = self.lock();
        let now = Instant::now();
        let mut reclaimed = Vec::new();
        for (i, slot) in inner.slots.iter_mut().enumerate() {
            if slot.record.status == PartStatus::Downloading
                && now.duration_since(slot.last_progress) > timeout
            {
                slot.record.status = PartStatus::Pending;
                slot.record.retry_count = (slot.record.retry_count - 1).max(-1);
                slot.owner = None;
                reclaimed.push(i);
            }
        }
        reclaimed
    }

    /// Resets the stall clock of every downloading part (after a pause).
    pub fn touch_active(&self) {
        let mut inner = self.lock();
        let now = Instant::now();
        for slot in inner.slots.iter_mut() {
            if slot.record.status == PartStatus::Downloading {
                slot.last_progress = now;
            }
        }
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let inner = self.lock();
        TableSnapshot {
            parts: inner.slots.iter().map(|s| s.record).collect(),
            number_of_parts: inner.number_of_parts,
            file_size: inner.file_size,
        }
    }

    /// Sum of bytes on disk over all parts.
    pub fn downloaded(&self) -> u64 {
        self.lock()
            .slots
            .iter()
            .map(|s| s.record.downloaded_bytes)
            .sum()
    }

    pub fn all_complete(&self) -> bool {
        self.lock()
            .slots
            .iter()
            .all(|s| s.record.status == PartStatus::Complete)
    }

    /// Parts currently being fetched.
    pub fn active_count(&self) -> usize {
        self.lock()
            .slots
            .iter()
            .filter(|s| s.record.status == PartStatus::Downloading)
            .count()
    }
}
