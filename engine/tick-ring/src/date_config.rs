//! The day-configuration segment: session start/end dates published once by
//! the controller, read by consumers at startup only. No live updates.

use std::path::Path;

use chrono::NaiveDate;

use crate::segment::{self, shm_path};
use crate::RingError;

/// Fixed 12-byte field: "YYYY-MM-DD" plus NUL padding.
const DATE_FIELD_LEN: usize = 12;
const SEGMENT_SIZE: usize = 2 * DATE_FIELD_LEN;
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Publishes and reads the textual session date range.
pub struct DateConfig;

impl DateConfig {
    /// Write the session date range to a segment under `/dev/shm`.
    pub fn publish(name: &str, start: NaiveDate, end: NaiveDate) -> Result<(), RingError> {
        Self::publish_at(&shm_path(name), start, end)
    }

    pub fn publish_at(path: &Path, start: NaiveDate, end: NaiveDate) -> Result<(), RingError> {
        let mut mmap = segment::create(path, SEGMENT_SIZE)?;
        write_date(&mut mmap[..DATE_FIELD_LEN], start);
        write_date(&mut mmap[DATE_FIELD_LEN..], end);
        mmap.flush()?;
        tracing::info!(path = %path.display(), %start, %end, "date config published");
        Ok(())
    }

    /// Read the session date range from a segment under `/dev/shm`.
    pub fn read(name: &str) -> Result<(NaiveDate, NaiveDate), RingError> {
        Self::read_at(&shm_path(name))
    }

    pub fn read_at(path: &Path) -> Result<(NaiveDate, NaiveDate), RingError> {
        let mmap = segment::open(path, SEGMENT_SIZE)?;
        let start = parse_date(&mmap[..DATE_FIELD_LEN])?;
        let end = parse_date(&mmap[DATE_FIELD_LEN..SEGMENT_SIZE])?;
        Ok((start, end))
    }
}

fn write_date(field: &mut [u8], date: NaiveDate) {
    let text = date.format(DATE_FORMAT).to_string();
    field.fill(0);
    field[..text.len()].copy_from_slice(text.as_bytes());
}

fn parse_date(field: &[u8]) -> Result<NaiveDate, RingError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..end])
        .map_err(|_| RingError::BadDateConfig("non-UTF8 date field".to_string()))?;
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|e| RingError::BadDateConfig(format!("{text:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_through_a_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dates");
        let start = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 9, 30).unwrap();

        DateConfig::publish_at(&path, start, end).unwrap();
        let (got_start, got_end) = DateConfig::read_at(&path).unwrap();
        assert_eq!((got_start, got_end), (start, end));
    }

    #[test]
    fn garbage_segment_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dates");
        std::fs::write(&path, [b'z'; SEGMENT_SIZE]).unwrap();
        assert!(matches!(DateConfig::read_at(&path), Err(RingError::BadDateConfig(_))));
    }

    #[test]
    fn missing_segment_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let res = DateConfig::read_at(&dir.path().join("missing"));
        assert!(matches!(res, Err(RingError::Io(_))));
    }
}
