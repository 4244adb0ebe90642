//! The fixed-width record blob and its field accessors.

/// Fixed record length in bytes.
pub const RECORD_SIZE: usize = 88;

/// Byte offset of the 14-digit ASCII jiffy timestamp key.
pub const JIFFY_FIELD_OFFSET: usize = 22;

/// Length of the jiffy timestamp field.
pub const JIFFY_FIELD_LEN: usize = 14;

/// Byte offset of the 10-byte symbol identity field.
pub const SYMBOL_FIELD_OFFSET: usize = 38;

/// Length of the symbol field.
pub const SYMBOL_FIELD_LEN: usize = 10;

/// One raw market record. Owned, fixed-width, opaque beyond the timestamp
/// and symbol fields; the engine forwards the raw bytes unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct Record([u8; RECORD_SIZE]);

impl Record {
    pub fn new(bytes: [u8; RECORD_SIZE]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; RECORD_SIZE] {
        &self.0
    }

    /// Parse the jiffy timestamp key. `None` if any of the 14 field bytes is
    /// not an ASCII digit.
    pub fn jiffy(&self) -> Option<u64> {
        let field = &self.0[JIFFY_FIELD_OFFSET..JIFFY_FIELD_OFFSET + JIFFY_FIELD_LEN];
        let mut value: u64 = 0;
        for &b in field {
            if !b.is_ascii_digit() {
                return None;
            }
            value = value * 10 + (b - b'0') as u64;
        }
        Some(value)
    }

    /// Symbol identity field, trimmed of padding. Lossy: non-UTF8 bytes are
    /// replaced. Used for display only, never by the dispatch path.
    pub fn symbol(&self) -> String {
        let field = &self.0[SYMBOL_FIELD_OFFSET..SYMBOL_FIELD_OFFSET + SYMBOL_FIELD_LEN];
        String::from_utf8_lossy(field).trim_end_matches([' ', '\0']).to_string()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("jiffy", &self.jiffy())
            .field("symbol", &self.symbol())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::record_with;
    use super::*;

    #[test]
    fn jiffy_field_parses() {
        let rec = record_with(92_884_549_632_000, "ADANIENSOL");
        assert_eq!(rec.jiffy(), Some(92_884_549_632_000));
    }

    #[test]
    fn non_digit_timestamp_is_rejected() {
        let mut bytes = *record_with(42, "X").as_bytes();
        bytes[JIFFY_FIELD_OFFSET + 3] = b'x';
        assert_eq!(Record::new(bytes).jiffy(), None);
    }

    #[test]
    fn symbol_is_trimmed() {
        let rec = record_with(1, "BAJAJHIND");
        assert_eq!(rec.symbol(), "BAJAJHIND");
    }
}
