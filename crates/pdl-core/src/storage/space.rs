//! Free space on the filesystem holding a path.

use std::io;
use std::path::Path;

/// Bytes available to an unprivileged user on the filesystem containing `dir`.
#[cfg(unix)]
pub fn available_space(dir: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(dir.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let r = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if r != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

/// Non-Unix: no portable query; report unlimited and let writes fail.
#[cfg(not(unix))]
pub fn available_space(_dir: &Path) -> io::Result<u64> {
    Ok(u64::MAX)
}
