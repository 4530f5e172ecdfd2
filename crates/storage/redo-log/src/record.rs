//! A single redo record: `{target_offset: u64, length: u64, bytes[length]}` (spec.md §6).

/// Fixed size of a record's framing (everything but the payload bytes).
pub const RECORD_FRAME_SIZE: usize = 16;

/// One byte-range update captured inside a transaction's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedoRecord {
    pub target_offset: u64,
    pub bytes: Vec<u8>,
}

impl RedoRecord {
    pub fn new(target_offset: u64, bytes: impl Into<Vec<u8>>) -> Self {
        RedoRecord {
            target_offset,
            bytes: bytes.into(),
        }
    }

    /// Total encoded size of this record.
    pub fn encoded_len(&self) -> usize {
        RECORD_FRAME_SIZE + self.bytes.len()
    }

    /// Appends this record's encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.target_offset.to_le_bytes());
        out.extend_from_slice(&(self.bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.bytes);
    }

    /// Decodes one record starting at `buf[0..]`, returning the record and
    /// the number of bytes consumed. Returns `None` if `buf` is too short
    /// to contain even the framing.
    pub fn decode(buf: &[u8]) -> Option<(RedoRecord, usize)> {
        if buf.len() < RECORD_FRAME_SIZE {
            return None;
        }
        let target_offset = u64::from_le_bytes(buf[0..8].try_into().ok()?);
        let length = u64::from_le_bytes(buf[8..16].try_into().ok()?) as usize;
        let end = RECORD_FRAME_SIZE.checked_add(length)?;
        let bytes = buf.get(RECORD_FRAME_SIZE..end)?.to_vec();
        Some((
            RedoRecord {
                target_offset,
                bytes,
            },
            end,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_record() {
        let record = RedoRecord::new(42, vec![1, 2, 3, 4]);
        let mut buf = Vec::new();
        record.encode_into(&mut buf);
        assert_eq!(buf.len(), record.encoded_len());

        let (decoded, consumed) = RedoRecord::decode(&buf).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded, record);
    }

    #[test]
    fn decode_rejects_truncated_buffer() {
        let record = RedoRecord::new(1, vec![9; 10]);
        let mut buf = Vec::new();
        record.encode_into(&mut buf);
        buf.truncate(buf.len() - 1);
        assert!(RedoRecord::decode(&buf).is_none());
    }
}
