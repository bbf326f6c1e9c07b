//! Chunk accumulation and commit for one part attempt.

use crate::retry::PartError;
use crate::scheduler::WorkerId;
use crate::storage::PartWriter;

use super::WorkerContext;

/// Buffers response bytes into fixed-size chunks and commits each one.
///
/// For a known-size part every chunk is exactly `chunk_size` bytes except
/// the last, which is exactly the bytes left in the part. A stream that ends
/// before filling the expected chunk is a short chunk; nothing of it is
/// committed. Unsized parts commit whatever is left at stream end.
pub(crate) struct ChunkSink<'a> {
    ctx: &'a WorkerContext,
    writer: &'a PartWriter,
    worker: WorkerId,
    index: usize,
    /// Absolute offset of the next byte to write.
    offset: u64,
    /// Bytes still owed to the part; None when unsized.
    remaining: Option<u64>,
    buf: Vec<u8>,
    paused: bool,
}

impl<'a> ChunkSink<'a> {
    pub fn new(
        ctx: &'a WorkerContext,
        writer: &'a PartWriter,
        worker: WorkerId,
        index: usize,
        offset: u64,
        remaining: Option<u64>,
    ) -> Self {
        Self {
            ctx,
            writer,
            worker,
            index,
            offset,
            remaining,
            buf: Vec::with_capacity(ctx.chunk_size.max(1)),
            paused: false,
        }
    }

    fn want(&self) -> usize {
        let chunk = self.ctx.chunk_size.max(1);
        match self.remaining {
            Some(rem) => usize::try_from(rem).map_or(chunk, |r| r.min(chunk)),
            None => chunk,
        }
    }

    /// All bytes of a known-size part are on disk.
    pub fn is_done(&self) -> bool {
        self.remaining == Some(0)
    }

    /// The attempt blocked in a pause at some point.
    pub fn was_paused(&self) -> bool {
        self.paused
    }

    /// Takes response bytes. Returns `Ok(true)` once the part is complete;
    /// anything after that is ignored.
    pub fn feed(&mut self, mut data: &[u8]) -> Result<bool, PartError> {
        if self.ctx.control.is_stopped() {
            return Err(PartError::Stopped);
        }
        while !data.is_empty() {
            if self.is_done() {
                return Ok(true);
            }
            let want = self.want();
            let take = (want - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buf.len() == want {
                self.commit()?;
            }
        }
        Ok(self.is_done())
    }

    /// The pending chunk as a short-chunk error, if a known-size part still
    /// owes bytes. The buffered tail is discarded, never committed.
    pub fn short_chunk(&self) -> Option<PartError> {
        match self.remaining {
            Some(rem) if rem > 0 => Some(PartError::ShortChunk {
                expected: self.want() as u64,
                actual: self.buf.len() as u64,
            }),
            _ => None,
        }
    }

    /// Clean end of the response stream.
    pub fn finish(&mut self) -> Result<(), PartError> {
        if let Some(short) = self.short_chunk() {
            return Err(short);
        }
        match self.remaining {
            Some(_) => Ok(()),
            None => {
                if !self.buf.is_empty() {
                    self.commit()?;
                }
                Ok(())
            }
        }
    }

    fn commit(&mut self) -> Result<(), PartError> {
        let ctx = self.ctx;
        if ctx.control.is_stopped() {
            return Err(PartError::Stopped);
        }
        if !ctx.table.is_owner(self.index, self.worker) {
            return Err(PartError::OwnershipLost);
        }
        self.writer.write_at(self.offset, &self.buf)?;
        let len = self.buf.len() as u64;
        ctx.table.commit_chunk(self.index, self.worker, len)?;
        ctx.throughput.add(len);
        self.offset += len;
        if let Some(rem) = self.remaining.as_mut() {
            *rem -= len;
        }
        self.buf.clear();

        let delay = ctx.limiter.delay(ctx.active_workers());
        if !delay.is_zero() && !ctx.control.sleep(delay) {
            return Err(PartError::Stopped);
        }
        if ctx.control.is_paused() {
            self.paused = true;
            tracing::debug!(worker = self.worker, part = self.index, "waiting while paused");
        }
        if !ctx.control.wait_while_paused() {
            return Err(PartError::Stopped);
        }
        Ok(())
    }
}
