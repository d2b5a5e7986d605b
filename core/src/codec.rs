//! Binary encodings for a postings list and its parallel tf list.
//!
//! Two interchangeable strategies are provided:
//!
//! * [`StandardPostings`]: every integer is a 4-byte little-endian field.
//! * [`VbePostings`]: doc ids are turned into gaps, then gaps and tfs are
//!   written with variable-byte encoding, 7 data bits per byte, most
//!   significant group first. The high bit is set on the **last** byte of
//!   each number and clear on every byte before it.
//!
//! Within an index file the tf bytes of a term directly follow its postings
//! bytes, which is what [`PostingsCodec::encode`] produces.

use crate::error::{IndexError, Result};
use crate::index::DocId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub trait PostingsCodec {
    fn encode_postings(&self, doc_ids: &[DocId], out: &mut Vec<u8>);

    fn encode_tf(&self, tfs: &[u32], out: &mut Vec<u8>);

    /// Decode `count` doc ids from the front of `input`, advancing it.
    fn read_postings(&self, input: &mut &[u8], count: usize) -> Result<Vec<DocId>>;

    /// Decode `count` term frequencies from the front of `input`, advancing it.
    fn read_tf(&self, input: &mut &[u8], count: usize) -> Result<Vec<u32>>;

    /// Postings bytes followed by tf bytes.
    fn encode(&self, doc_ids: &[DocId], tfs: &[u32]) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_postings(doc_ids, &mut out);
        self.encode_tf(tfs, &mut out);
        out
    }

    fn decode(&self, bytes: &[u8], count: usize) -> Result<(Vec<DocId>, Vec<u32>)> {
        let mut input = bytes;
        let doc_ids = self.read_postings(&mut input, count)?;
        let tfs = self.read_tf(&mut input, count)?;
        expect_consumed(input)?;
        Ok((doc_ids, tfs))
    }

    /// Decode a postings blob that must contain exactly `count` doc ids.
    fn decode_postings(&self, bytes: &[u8], count: usize) -> Result<Vec<DocId>> {
        let mut input = bytes;
        let doc_ids = self.read_postings(&mut input, count)?;
        expect_consumed(input)?;
        Ok(doc_ids)
    }

    /// Decode a tf blob that must contain exactly `count` frequencies.
    fn decode_tf(&self, bytes: &[u8], count: usize) -> Result<Vec<u32>> {
        let mut input = bytes;
        let tfs = self.read_tf(&mut input, count)?;
        expect_consumed(input)?;
        Ok(tfs)
    }
}

fn expect_consumed(rest: &[u8]) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(IndexError::corrupt(format!("{} trailing bytes after decode", rest.len())))
    }
}

/// Fixed-width baseline: 4 little-endian bytes per integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPostings;

impl StandardPostings {
    fn write(values: &[u32], out: &mut Vec<u8>) {
        out.reserve(values.len() * 4);
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn read(input: &mut &[u8], count: usize) -> Result<Vec<u32>> {
        let needed = count
            .checked_mul(4)
            .ok_or_else(|| IndexError::corrupt("integer count overflows"))?;
        if input.len() < needed {
            return Err(IndexError::corrupt(format!(
                "expected {needed} bytes for {count} integers, found {}",
                input.len()
            )));
        }
        let (head, rest) = input.split_at(needed);
        let values = head
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        *input = rest;
        Ok(values)
    }
}

impl PostingsCodec for StandardPostings {
    fn encode_postings(&self, doc_ids: &[DocId], out: &mut Vec<u8>) {
        Self::write(doc_ids, out)
    }

    fn encode_tf(&self, tfs: &[u32], out: &mut Vec<u8>) {
        Self::write(tfs, out)
    }

    fn read_postings(&self, input: &mut &[u8], count: usize) -> Result<Vec<DocId>> {
        Self::read(input, count)
    }

    fn read_tf(&self, input: &mut &[u8], count: usize) -> Result<Vec<u32>> {
        Self::read(input, count)
    }
}

/// Gap + variable-byte encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct VbePostings;

const VB_TERMINATOR: u8 = 0x80;
// ceil(32 / 7)
const VB_MAX_BYTES: usize = 5;

impl VbePostings {
    pub fn encode_number(mut n: u32, out: &mut Vec<u8>) {
        let mut buf = [0u8; VB_MAX_BYTES];
        let mut start = VB_MAX_BYTES;
        loop {
            start -= 1;
            buf[start] = (n % 128) as u8;
            if n < 128 {
                break;
            }
            n /= 128;
        }
        buf[VB_MAX_BYTES - 1] |= VB_TERMINATOR;
        out.extend_from_slice(&buf[start..]);
    }

    /// Decode one number from the front of `input`, advancing it.
    pub fn read_number(input: &mut &[u8]) -> Result<u32> {
        let mut n: u64 = 0;
        for (i, &byte) in input.iter().enumerate() {
            if i == VB_MAX_BYTES {
                break;
            }
            n = n * 128 + (byte & 0x7F) as u64;
            if byte & VB_TERMINATOR != 0 {
                let value = u32::try_from(n)
                    .map_err(|_| IndexError::corrupt(format!("variable-byte value {n} exceeds u32")))?;
                *input = &input[i + 1..];
                return Ok(value);
            }
        }
        if input.len() >= VB_MAX_BYTES {
            Err(IndexError::corrupt("variable-byte number longer than 5 bytes"))
        } else {
            Err(IndexError::corrupt("variable-byte stream ends without a terminator byte"))
        }
    }

    fn read_numbers(input: &mut &[u8], count: usize) -> Result<Vec<u32>> {
        let mut values = Vec::with_capacity(count.min(input.len()));
        for _ in 0..count {
            values.push(Self::read_number(input)?);
        }
        Ok(values)
    }
}

impl PostingsCodec for VbePostings {
    fn encode_postings(&self, doc_ids: &[DocId], out: &mut Vec<u8>) {
        let mut prev: Option<DocId> = None;
        for &doc_id in doc_ids {
            let gap = match prev {
                None => doc_id,
                Some(p) => {
                    debug_assert!(doc_id > p, "doc ids must be strictly increasing");
                    doc_id - p
                }
            };
            Self::encode_number(gap, out);
            prev = Some(doc_id);
        }
    }

    fn encode_tf(&self, tfs: &[u32], out: &mut Vec<u8>) {
        for &tf in tfs {
            Self::encode_number(tf, out);
        }
    }

    fn read_postings(&self, input: &mut &[u8], count: usize) -> Result<Vec<DocId>> {
        let gaps = Self::read_numbers(input, count)?;
        let mut doc_ids = Vec::with_capacity(gaps.len());
        let mut running: DocId = 0;
        for (i, gap) in gaps.into_iter().enumerate() {
            if i > 0 && gap == 0 {
                return Err(IndexError::corrupt("zero doc id gap"));
            }
            running = running
                .checked_add(gap)
                .ok_or_else(|| IndexError::corrupt("doc id gaps overflow u32"))?;
            doc_ids.push(running);
        }
        Ok(doc_ids)
    }

    fn read_tf(&self, input: &mut &[u8], count: usize) -> Result<Vec<u32>> {
        Self::read_numbers(input, count)
    }
}

/// Codec selector persisted in the index header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "standard")]
    Standard,
    #[default]
    #[serde(rename = "vbe")]
    VariableByte,
}

impl Encoding {
    pub fn tag(self) -> u8 {
        match self {
            Encoding::Standard => 0,
            Encoding::VariableByte => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Encoding::Standard),
            1 => Ok(Encoding::VariableByte),
            other => Err(IndexError::InvalidFormat(format!("unknown encoding tag {other}"))),
        }
    }

    fn codec(self) -> &'static dyn PostingsCodec {
        match self {
            Encoding::Standard => &StandardPostings,
            Encoding::VariableByte => &VbePostings,
        }
    }
}

impl PostingsCodec for Encoding {
    fn encode_postings(&self, doc_ids: &[DocId], out: &mut Vec<u8>) {
        self.codec().encode_postings(doc_ids, out)
    }

    fn encode_tf(&self, tfs: &[u32], out: &mut Vec<u8>) {
        self.codec().encode_tf(tfs, out)
    }

    fn read_postings(&self, input: &mut &[u8], count: usize) -> Result<Vec<DocId>> {
        self.codec().read_postings(input, count)
    }

    fn read_tf(&self, input: &mut &[u8], count: usize) -> Result<Vec<u32>> {
        self.codec().read_tf(input, count)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Standard => f.write_str("standard"),
            Encoding::VariableByte => f.write_str("vbe"),
        }
    }
}

impl FromStr for Encoding {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "fixed" => Ok(Encoding::Standard),
            "vbe" | "vbyte" | "variable-byte" => Ok(Encoding::VariableByte),
            other => Err(IndexError::InvalidArgument(format!("unknown encoding '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODINGS: [Encoding; 2] = [Encoding::Standard, Encoding::VariableByte];

    fn roundtrip(doc_ids: &[u32], tfs: &[u32]) {
        for enc in ENCODINGS {
            let bytes = enc.encode(doc_ids, tfs);
            let (d, t) = enc.decode(&bytes, doc_ids.len()).unwrap();
            assert_eq!(d, doc_ids, "{enc}");
            assert_eq!(t, tfs, "{enc}");
        }
    }

    #[test]
    fn single_element_lists() {
        roundtrip(&[0], &[1]);
        roundtrip(&[34], &[3]);
        roundtrip(&[u32::MAX], &[u32::MAX]);
    }

    #[test]
    fn long_list_spanning_the_u32_range() {
        let mut doc_ids: Vec<u32> = (0..1200u32).map(|i| i * 7 + (i % 3)).collect();
        doc_ids.push(1 << 21);
        doc_ids.push(1 << 28);
        doc_ids.push(u32::MAX - 1);
        doc_ids.push(u32::MAX);
        let tfs: Vec<u32> = (0..doc_ids.len() as u32).map(|i| 1 + (i * 131) % 10_000).collect();
        roundtrip(&doc_ids, &tfs);
    }

    #[test]
    fn empty_lists() {
        roundtrip(&[], &[]);
    }

    #[test]
    fn vbe_sets_high_bit_on_last_byte() {
        let mut out = Vec::new();
        VbePostings::encode_number(824, &mut out);
        assert_eq!(out, vec![0b0000_0110, 0b1011_1000]);
        out.clear();
        VbePostings::encode_number(5, &mut out);
        assert_eq!(out, vec![0x85]);
        out.clear();
        VbePostings::encode_number(0, &mut out);
        assert_eq!(out, vec![0x80]);
    }

    #[test]
    fn vbe_stores_gaps() {
        let bytes = VbePostings.encode(&[824, 829, 215_406], &[1, 1, 1]);
        let expected_postings = [0x06, 0xB8, 0x85, 0x0D, 0x0C, 0xB1];
        assert_eq!(&bytes[..6], &expected_postings);
        assert_eq!(&bytes[6..], &[0x81, 0x81, 0x81]);
    }

    #[test]
    fn vbe_tf_may_be_zero() {
        let enc = VbePostings;
        let mut out = Vec::new();
        enc.encode_tf(&[0, 3, 0], &mut out);
        assert_eq!(enc.decode_tf(&out, 3).unwrap(), vec![0, 3, 0]);
    }

    #[test]
    fn truncated_vbe_stream_is_corruption() {
        let bytes = VbePostings.encode(&[1000, 5000], &[2, 2]);
        let err = VbePostings.decode(&bytes[..3], 2).unwrap_err();
        assert!(matches!(err, IndexError::CodecCorruption(_)));
        // last byte lost its terminator bit
        let err = VbePostings.decode_postings(&[0x01, 0x02], 1).unwrap_err();
        assert!(matches!(err, IndexError::CodecCorruption(_)));
    }

    #[test]
    fn vbe_rejects_overlong_and_overflowing_numbers() {
        assert!(VbePostings.decode_tf(&[0x7F, 0x7F, 0x7F, 0x7F, 0xFF], 1).is_err());
        assert!(VbePostings.decode_tf(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x81], 1).is_err());
        // two gaps that overflow a u32 doc id
        let mut bytes = Vec::new();
        VbePostings::encode_number(u32::MAX, &mut bytes);
        VbePostings::encode_number(1, &mut bytes);
        assert!(VbePostings.decode_postings(&bytes, 2).is_err());
    }

    #[test]
    fn vbe_rejects_duplicate_doc_ids() {
        let bytes = [0x83, 0x80];
        assert!(matches!(
            VbePostings.decode_postings(&bytes, 2),
            Err(IndexError::CodecCorruption(_))
        ));
    }

    #[test]
    fn standard_rejects_short_and_trailing_input() {
        let bytes = StandardPostings.encode(&[1, 2], &[3, 4]);
        assert_eq!(bytes.len(), 16);
        assert!(StandardPostings.decode(&bytes[..15], 2).is_err());
        assert!(StandardPostings.decode(&bytes, 1).is_err());
    }

    #[test]
    fn encoding_parses_and_tags() {
        assert_eq!("vbe".parse::<Encoding>().unwrap(), Encoding::VariableByte);
        assert_eq!("Standard".parse::<Encoding>().unwrap(), Encoding::Standard);
        assert!("gamma".parse::<Encoding>().is_err());
        for enc in ENCODINGS {
            assert_eq!(Encoding::from_tag(enc.tag()).unwrap(), enc);
            assert_eq!(enc.to_string().parse::<Encoding>().unwrap(), enc);
        }
        assert!(Encoding::from_tag(9).is_err());
    }
}
