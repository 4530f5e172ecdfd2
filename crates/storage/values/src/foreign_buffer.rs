//! Reconstructable buffer: a by-reference value recording a byte layout
//! `{len, itemsize, ndim, format, shape[], strides[], bytes[]}` copied
//! C-contiguously from a foreign producer's buffer (spec.md §4.7). Carries
//! no conversion logic — it is a faithful store-and-replay of the producer's
//! shape and item format.

use crate::errors::ValueError;

/// Describes one producer buffer prior to encoding: its item size, shape,
/// and strides (all in bytes), plus the producer's own `bytes`.
#[derive(Debug, Clone)]
pub struct ForeignBuffer {
    pub itemsize: u32,
    pub format: String,
    pub shape: Vec<u64>,
    pub strides: Vec<u64>,
    pub bytes: Vec<u8>,
}

fn c_contiguous_strides(itemsize: u32, shape: &[u64]) -> Vec<u64> {
    let mut strides = vec![0u64; shape.len()];
    let mut acc = itemsize as u64;
    for i in (0..shape.len()).rev() {
        strides[i] = acc;
        acc *= shape[i].max(1);
    }
    strides
}

impl ForeignBuffer {
    /// Builds a buffer by gathering elements out of a producer's
    /// (possibly non-contiguous) `bytes` according to `producer_strides`,
    /// and copying them into a freshly allocated C-contiguous layout. This
    /// is the "copied C-contiguously from a foreign producer's buffer"
    /// step of spec.md §4.7.
    pub fn from_producer(
        itemsize: u32,
        format: impl Into<String>,
        shape: Vec<u64>,
        producer_strides: &[u64],
        producer_bytes: &[u8],
    ) -> Result<Self, ValueError> {
        if shape.len() != producer_strides.len() {
            return Err(ValueError::Type);
        }
        let element_count: u64 = if shape.is_empty() { 1 } else { shape.iter().product() };
        let mut gathered = Vec::with_capacity((element_count * itemsize as u64) as usize);
        let mut index = vec![0u64; shape.len()];

        if shape.is_empty() {
            gathered.extend_from_slice(&producer_bytes[0..itemsize as usize]);
        } else {
            loop {
                let byte_offset: u64 = index
                    .iter()
                    .zip(producer_strides)
                    .map(|(i, s)| i * s)
                    .sum();
                let start = byte_offset as usize;
                gathered.extend_from_slice(&producer_bytes[start..start + itemsize as usize]);

                let mut carry = shape.len();
                loop {
                    if carry == 0 {
                        break;
                    }
                    carry -= 1;
                    index[carry] += 1;
                    if index[carry] < shape[carry] {
                        break;
                    }
                    index[carry] = 0;
                    if carry == 0 {
                        return Ok(ForeignBuffer {
                            itemsize,
                            format: format.into(),
                            strides: c_contiguous_strides(itemsize, &shape),
                            shape,
                            bytes: gathered,
                        });
                    }
                }
            }
        }

        Ok(ForeignBuffer {
            strides: c_contiguous_strides(itemsize, &shape),
            itemsize,
            format: format.into(),
            shape,
            bytes: gathered,
        })
    }

    fn is_c_contiguous(&self) -> bool {
        self.strides == c_contiguous_strides(self.itemsize, &self.shape)
    }

    /// Encodes this buffer's header and bytes into a single allocation.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&(self.bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.itemsize.to_le_bytes());
        out.extend_from_slice(&(self.shape.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.format.len() as u16).to_le_bytes());
        out.extend_from_slice(self.format.as_bytes());
        for dim in &self.shape {
            out.extend_from_slice(&dim.to_le_bytes());
        }
        for stride in &self.strides {
            out.extend_from_slice(&stride.to_le_bytes());
        }
        out.extend_from_slice(&self.bytes);
        out
    }

    pub fn encoded_len(&self) -> usize {
        8 + 4 + 4 + 2 + self.format.len() + 16 * self.shape.len() + self.bytes.len()
    }

    /// Decodes a previously [`ForeignBuffer::encode`]d allocation.
    pub fn decode(buf: &[u8]) -> Result<Self, ValueError> {
        let too_short = || ValueError::SizeMismatch {
            expected: 18,
            actual: buf.len(),
        };
        if buf.len() < 18 {
            return Err(too_short());
        }
        let len = u64::from_le_bytes(buf[0..8].try_into().unwrap()) as usize;
        let itemsize = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let ndim = u32::from_le_bytes(buf[12..16].try_into().unwrap()) as usize;
        let format_len = u16::from_le_bytes(buf[16..18].try_into().unwrap()) as usize;

        let mut cursor = 18usize;
        let format = String::from_utf8_lossy(buf.get(cursor..cursor + format_len).ok_or_else(too_short)?).into_owned();
        cursor += format_len;

        let mut shape = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            let raw = buf.get(cursor..cursor + 8).ok_or_else(too_short)?;
            shape.push(u64::from_le_bytes(raw.try_into().unwrap()));
            cursor += 8;
        }
        let mut strides = Vec::with_capacity(ndim);
        for _ in 0..ndim {
            let raw = buf.get(cursor..cursor + 8).ok_or_else(too_short)?;
            strides.push(u64::from_le_bytes(raw.try_into().unwrap()));
            cursor += 8;
        }
        let bytes = buf.get(cursor..cursor + len).ok_or_else(too_short)?.to_vec();

        Ok(ForeignBuffer {
            itemsize,
            format,
            shape,
            strides,
            bytes,
        })
    }

    /// Returns the stored bytes as a C-contiguous view, failing *Value* if
    /// the stored layout is not actually C-contiguous (spec.md §4.7).
    pub fn as_c_contiguous(&self) -> Result<&[u8], ValueError> {
        if !self.is_c_contiguous() {
            return Err(ValueError::NonContiguous);
        }
        Ok(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_contiguous_buffer() {
        let buf = ForeignBuffer::from_producer(8, "<f8", vec![2, 2], &[16, 8], &(0..32u8).collect::<Vec<_>>()).unwrap();
        let encoded = buf.encode();
        let decoded = ForeignBuffer::decode(&encoded).unwrap();
        assert_eq!(decoded.shape, vec![2, 2]);
        assert_eq!(decoded.as_c_contiguous().unwrap(), buf.bytes.as_slice());
    }

    #[test]
    fn gathers_from_non_contiguous_producer_strides() {
        // A 2x2 "transposed" view: producer strides swapped relative to C order.
        let producer_bytes: Vec<u8> = (0..4u8).map(|i| i * 10).collect();
        let buf = ForeignBuffer::from_producer(1, "<u1", vec![2, 2], &[1, 2], &producer_bytes).unwrap();
        assert_eq!(buf.bytes, vec![0, 20, 10, 30]);
        assert!(buf.is_c_contiguous());
    }

    #[test]
    fn non_contiguous_stored_layout_fails_value() {
        let mut buf = ForeignBuffer::from_producer(8, "<f8", vec![2], &[8], &[0u8; 16]).unwrap();
        buf.strides = vec![16]; // forge a non-contiguous stride after construction
        assert!(matches!(buf.as_c_contiguous(), Err(ValueError::NonContiguous)));
    }
}
