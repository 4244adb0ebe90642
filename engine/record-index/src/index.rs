//! Building and querying the jiffy-keyed record index.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::record::{Record, RECORD_SIZE};
use crate::IndexError;

/// Immutable mapping from jiffy key to the records sharing that key, in
/// file order. Built once per input file; read-only during dispatch.
#[derive(Debug, Default)]
pub struct JiffyIndex {
    buckets: HashMap<u64, Vec<Record>>,
    total_records: u64,
}

impl JiffyIndex {
    /// Scan `path` in fixed 88-byte strides until EOF, keying every record
    /// by its own timestamp field. The input need not be sorted; insertion
    /// order within a bucket is file order.
    pub fn build(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut index = JiffyIndex::default();
        let mut offset = 0u64;
        let mut buf = [0u8; RECORD_SIZE];

        loop {
            let got = read_full(&mut reader, &mut buf)?;
            if got == 0 {
                break;
            }
            if got < RECORD_SIZE {
                return Err(IndexError::TruncatedRecord { offset, got });
            }
            let record = Record::new(buf);
            let jiffy = record.jiffy().ok_or(IndexError::BadTimestamp { offset })?;
            index.buckets.entry(jiffy).or_default().push(record);
            index.total_records += 1;
            offset += RECORD_SIZE as u64;
        }

        tracing::info!(
            records = index.total_records,
            buckets = index.buckets.len(),
            path = %path.display(),
            "record index built"
        );
        Ok(index)
    }

    /// Records at `jiffy`, in file order. O(1) expected, side-effect-free.
    #[inline]
    pub fn get(&self, jiffy: u64) -> Option<&[Record]> {
        self.buckets.get(&jiffy).map(Vec::as_slice)
    }

    /// Total records indexed (sum over all buckets).
    pub fn len(&self) -> u64 {
        self.total_records
    }

    pub fn is_empty(&self) -> bool {
        self.total_records == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Smallest and largest jiffy keys present, if any.
    pub fn jiffy_range(&self) -> Option<(u64, u64)> {
        let min = self.buckets.keys().min()?;
        let max = self.buckets.keys().max()?;
        Some((*min, *max))
    }
}

/// Read until `buf` is full or EOF. Returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
