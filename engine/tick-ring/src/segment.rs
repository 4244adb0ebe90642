//! Creating and attaching to shared memory segments.
//!
//! Segments are plain files under `/dev/shm`, mapped with `memmap2`. The
//! producer creates and sizes the file; consumers open it by well-known name.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::RingError;

/// Resolve a well-known segment name to its `/dev/shm` path. A leading `/`
/// is tolerated so POSIX-style names like `/jiffy_ring_0` work unchanged.
pub fn shm_path(name: &str) -> PathBuf {
    Path::new("/dev/shm").join(name.trim_start_matches('/'))
}

/// Create (or truncate) a segment of exactly `size` bytes, zero-filled.
pub(crate) fn create(path: &Path, size: usize) -> Result<MmapMut, RingError> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.set_len(size as u64)?;
    let mut mmap = unsafe { MmapMut::map_mut(&file)? };
    mmap.fill(0);
    Ok(mmap)
}

/// Attach to an existing segment, verifying it holds at least `min_size`.
pub(crate) fn open(path: &Path, min_size: usize) -> Result<MmapMut, RingError> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let mmap = unsafe { MmapMut::map_mut(&file)? };
    if mmap.len() < min_size {
        return Err(RingError::SegmentTruncated { expected: min_size, got: mmap.len() });
    }
    Ok(mmap)
}
