//! Destination file lifecycle.
//!
//! Checks free space, pre-allocates the destination by writing zero blocks,
//! and gives each worker its own handle for offset writes.

mod prealloc;
mod space;
mod writer;

pub use prealloc::{preallocate, DEFAULT_BLOCK_SIZE};
pub use space::available_space;
pub use writer::PartWriter;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::DownloadControl;
    use std::io::Read;

    #[test]
    fn preallocate_then_write_parts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.bin");
        let control = DownloadControl::new();

        preallocate(&path, 100, 16, &control).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 100);

        let w1 = PartWriter::open(&path).unwrap();
        let w2 = PartWriter::open(&path).unwrap();
        w1.write_at(0, b"hello").unwrap();
        w2.write_at(50, b"world").unwrap();
        w1.write_at(95, b"xy").unwrap();
        drop((w1, w2));

        let mut f = std::fs::File::open(&path).unwrap();
        let mut buf = vec![0u8; 100];
        f.read_exact(&mut buf).unwrap();
        assert_eq!(&buf[0..5], b"hello");
        assert_eq!(&buf[5..50], &[0u8; 45][..]);
        assert_eq!(&buf[50..55], b"world");
        assert_eq!(&buf[95..97], b"xy");
    }

    #[test]
    fn preallocate_stopped_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.bin");
        let control = DownloadControl::new();
        control.stop();

        let err = preallocate(&path, 10 * 1024, 1024, &control).unwrap_err();
        assert!(matches!(err, crate::download::SetupError::Aborted));
        assert!(!path.exists());
    }

    #[test]
    fn preallocate_refuses_when_space_is_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.bin");
        let control = DownloadControl::new();

        let err = preallocate(&path, u64::MAX / 2, DEFAULT_BLOCK_SIZE, &control).unwrap_err();
        assert!(matches!(
            err,
            crate::download::SetupError::InsufficientSpace { .. }
        ));
        assert!(!path.exists());
    }

    #[test]
    fn free_space_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(available_space(dir.path()).unwrap() > 0);
    }
}
