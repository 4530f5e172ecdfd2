//! Redo file header: one page containing `magic`, `o2_first_trx`, and the
//! cached `o2_tail` (spec.md §6).

use crate::errors::RedoError;
use binary_helpers::fixed_str::{read_fixed_str, write_fixed_str};
use binary_helpers::le::{read_le, write_le};
use mapping::PAGE_SIZE;

/// Magic for the redo log file; distinct from the primary file's magic and version-tagged, per spec.md §6.
pub const MAGIC: &str = "STRATAREDO/v1";
const MAGIC_LEN: usize = 31;

/// Size of the redo log's header, one page.
pub const HEADER_SIZE: u64 = PAGE_SIZE as u64;

const O2_FIRST_TRX_OFFSET: usize = MAGIC_LEN;
const O2_TAIL_OFFSET: usize = MAGIC_LEN + 8;

/// Immutable view of the redo log header.
#[derive(Debug)]
pub struct HeaderRef<'a> {
    bytes: &'a [u8],
}

/// Mutable view of the redo log header.
#[derive(Debug)]
pub struct HeaderMut<'a> {
    bytes: &'a mut [u8],
}

impl<'a> HeaderRef<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        HeaderRef { bytes }
    }

    pub fn magic(&self) -> String {
        read_fixed_str(&self.bytes[0..MAGIC_LEN])
    }

    pub fn o2_first_trx(&self) -> Result<u64, RedoError> {
        Ok(read_le::<u64>(self.bytes, O2_FIRST_TRX_OFFSET)?)
    }

    pub fn o2_tail(&self) -> Result<u64, RedoError> {
        Ok(read_le::<u64>(self.bytes, O2_TAIL_OFFSET)?)
    }
}

impl<'a> HeaderMut<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        HeaderMut { bytes }
    }

    pub fn set_magic(&mut self, value: &str) -> Result<(), RedoError> {
        write_fixed_str(&mut self.bytes[0..MAGIC_LEN], value)?;
        Ok(())
    }

    pub fn set_o2_first_trx(&mut self, value: u64) -> Result<(), RedoError> {
        write_le::<u64>(self.bytes, O2_FIRST_TRX_OFFSET, value)?;
        Ok(())
    }

    pub fn set_o2_tail(&mut self, value: u64) -> Result<(), RedoError> {
        write_le::<u64>(self.bytes, O2_TAIL_OFFSET, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_fields() {
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        {
            let mut h = HeaderMut::new(&mut buf);
            h.set_magic(MAGIC).unwrap();
            h.set_o2_first_trx(HEADER_SIZE).unwrap();
            h.set_o2_tail(HEADER_SIZE).unwrap();
        }
        let h = HeaderRef::new(&buf);
        assert_eq!(h.magic(), MAGIC);
        assert_eq!(h.o2_first_trx().unwrap(), HEADER_SIZE);
        assert_eq!(h.o2_tail().unwrap(), HEADER_SIZE);
    }
}
