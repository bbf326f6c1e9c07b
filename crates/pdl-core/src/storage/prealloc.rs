//! Zero-fill pre-allocation of the destination file.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::control::DownloadControl;
use crate::download::SetupError;

use super::space::available_space;

/// Block size used when zero-filling (1 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Creates (or truncates) `path` and fills it with `size` zero bytes in
/// `block_size` blocks.
///
/// Checks free space first. If stop is requested mid-way the partial file is
/// removed and `SetupError::Aborted` returned.
pub fn preallocate(
    path: &Path,
    size: u64,
    block_size: usize,
    control: &DownloadControl,
) -> Result<(), SetupError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let available = available_space(dir)?;
    if available < size {
        return Err(SetupError::InsufficientSpace {
            needed: size,
            available,
        });
    }

    let mut file = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;

    let block = vec![0u8; block_size.max(1)];
    let mut remaining = size;
    while remaining > 0 {
        if control.is_stopped() {
            drop(file);
            discard(path);
            tracing::info!(path = %path.display(), "pre-allocation abandoned");
            return Err(SetupError::Aborted);
        }
        let n = remaining.min(block.len() as u64) as usize;
        if let Err(e) = file.write_all(&block[..n]) {
            drop(file);
            discard(path);
            return Err(SetupError::Io(e));
        }
        remaining -= n as u64;
    }
    file.flush()?;
    tracing::debug!(path = %path.display(), size, "destination pre-allocated");
    Ok(())
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "cannot remove partial file");
    }
}
