//! One attempt at one part: a (ranged) GET streamed into a `ChunkSink`.

use std::cell::Cell;
use std::str;

use curl::easy::Easy;

use super::{ChunkSink, WorkerContext};
use crate::retry::PartError;
use crate::scheduler::{Assignment, WorkerId};
use crate::session::parse_status_line;
use crate::storage::PartWriter;

/// Fetches the rest of `part` and writes it at its offsets.
///
/// Requests `bytes=pos-end` for sized parts and `bytes=pos-` for unsized
/// ones; without range support no Range header is sent and the part always
/// starts at 0. A part whose bytes are already all on disk completes
/// without a request.
pub(super) fn fetch_part(
    easy: &mut Easy,
    writer: &PartWriter,
    worker: WorkerId,
    part: &Assignment,
    ctx: &WorkerContext,
) -> Result<(), PartError> {
    let offset = part.resume_offset();
    let remaining = part.end.map(|end| end.saturating_sub(offset));
    if remaining == Some(0) {
        return Ok(());
    }

    let ranged = ctx.range_support;
    if ranged {
        let range = match part.end {
            Some(end) => format!("{}-{}", offset, end - 1),
            None => format!("{}-", offset),
        };
        easy.range(&range)?;
    }

    let mut sink = ChunkSink::new(ctx, writer, worker, part.index, offset, remaining);
    let status = Cell::new(0u32);
    let mut failure: Option<PartError> = None;

    let result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(line) = str::from_utf8(data) {
                if let Some(code) = parse_status_line(line.trim_end()) {
                    status.set(code);
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            let code = status.get();
            if !accepts(code, ranged, offset) {
                failure = Some(PartError::Http(code));
                return Ok(0);
            }
            match sink.feed(data) {
                Ok(false) => Ok(data.len()),
                // Part complete: stop reading.
                Ok(true) => Ok(0),
                Err(e) => {
                    failure = Some(e);
                    Ok(0)
                }
            }
        })?;
        transfer.perform()
    };

    if let Some(e) = failure {
        return Err(e);
    }
    match result {
        Ok(()) => {}
        Err(e) if sink.is_done() && e.is_write_error() => return Ok(()),
        Err(e) if sink.was_paused() => return Err(PartError::Interrupted(e)),
        // Connection dropped mid-body: the unfilled chunk is a short chunk.
        Err(e) if accepts(status.get(), ranged, offset) && is_truncation(&e) => {
            if let Some(short) = sink.short_chunk() {
                return Err(short);
            }
            return Err(PartError::Curl(e));
        }
        Err(e) => return Err(PartError::Curl(e)),
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(PartError::Http(code));
    }
    sink.finish()
}

fn accepts(code: u32, ranged: bool, offset: u64) -> bool {
    match code {
        206 => true,
        // a 200 to a ranged request is the whole body from byte 0
        200 => !ranged || offset == 0,
        _ => false,
    }
}

fn is_truncation(e: &curl::Error) -> bool {
    e.is_partial_file() || e.is_recv_error()
}
