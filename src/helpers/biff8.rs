//! Record reader for the BIFF8 workbook stream of `.xls` files.
//!
//! A record is a type, a length and a body of at most 8224 bytes; longer
//! payloads spill into `CONTINUE` records, which the reader stitches back
//! onto the record they follow.

use crate::error::SheetError;
use crate::helpers::bytes::le_u16;
use encoding_rs::Encoding;
use encoding_rs::UTF_16LE;
use encoding_rs::WINDOWS_1252;
use std::ops::Range;
use thiserror::Error;

const CONTINUE: u16 = 0x003C;

#[derive(Error, Debug)]
pub(crate) enum RecordError {
    #[error("Record 0x{0:04X} is truncated")]
    Truncated(u16),

    #[error("Record 0x{0:04X} ends before {1} more bytes")]
    NotEnoughData(u16, usize),
}

pub(crate) struct RecordReader {
    /// Decoding of 8-bit strings, taken from the workbook code page
    pub(crate) encoding: &'static Encoding,
    data: Vec<u8>,
    /// Offset of the next record header
    next: usize,
    kind: u16,
    /// Body of the current record followed by its continuations
    chunks: Vec<Range<usize>>,
    chunk: usize,
    position: usize,
}

impl RecordReader {
    pub(crate) fn new(data: Vec<u8>) -> RecordReader {
        RecordReader {
            encoding: WINDOWS_1252,
            data,
            next: 0,
            kind: 0,
            chunks: Vec::new(),
            chunk: 0,
            position: 0,
        }
    }

    /// Advances to the next record and returns its type, or `None` at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, SheetError> {
        if self.next + 4 > self.data.len() {
            return Ok(None);
        }
        self.kind = le_u16(&self.data, self.next);
        self.chunks.clear();
        let body = self.body()?;
        self.chunks.push(body);
        while self.next + 4 <= self.data.len() && le_u16(&self.data, self.next) == CONTINUE {
            let body = self.body()?;
            self.chunks.push(body);
        }
        self.chunk = 0;
        self.position = self.chunks[0].start;
        Ok(Some(self.kind))
    }

    /// Consumes the record header at `next` and returns its body range.
    fn body(&mut self) -> Result<Range<usize>, SheetError> {
        let start = self.next + 4;
        let end = start + le_u16(&self.data, self.next + 2) as usize;
        if end > self.data.len() {
            Err(RecordError::Truncated(self.kind))?
        }
        self.next = end;
        Ok(start..end)
    }

    /// Body length of the current record including its continuations.
    pub(crate) fn record_size(&self) -> usize {
        self.chunks.iter().map(|range| range.len()).sum()
    }

    /// Continues reading at the record header found at `offset`.
    pub(crate) fn seek(&mut self, offset: usize) {
        self.next = offset;
        self.chunks.clear();
    }

    /// Up to `length` bytes from the current chunk; empty once the record is exhausted.
    fn take(&mut self, length: usize) -> &[u8] {
        while let Some(range) = self.chunks.get(self.chunk) {
            if self.position < range.end {
                break;
            }
            self.chunk += 1;
            if let Some(next) = self.chunks.get(self.chunk) {
                self.position = next.start;
            }
        }
        let end = match self.chunks.get(self.chunk) {
            Some(range) => range.end.min(self.position.saturating_add(length)),
            None => return &[],
        };
        let start = self.position;
        self.position = end;
        &self.data[start..end]
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SheetError> {
        let kind = self.kind;
        let mut bytes = [0u8; N];
        let mut filled = 0;
        while filled < N {
            let part = self.take(N - filled);
            if part.is_empty() {
                Err(RecordError::NotEnoughData(kind, N - filled))?
            }
            bytes[filled..filled + part.len()].copy_from_slice(part);
            filled += part.len();
        }
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, mut length: usize) -> Result<(), SheetError> {
        while length > 0 {
            let skipped = self.take(length).len();
            if skipped == 0 {
                Err(RecordError::NotEnoughData(self.kind, length))?
            }
            length -= skipped;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, SheetError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, SheetError> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, SheetError> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, SheetError> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, SheetError> {
        self.read_array().map(f64::from_le_bytes)
    }

    /// Reads an RK value: a 30-bit integer or the high 30 bits of a
    /// double, optionally scaled down by 100.
    pub(crate) fn read_rk(&mut self) -> Result<f64, SheetError> {
        let rk = self.read_u32()?;
        let mut value = if rk & 0x02 != 0 {
            f64::from((rk as i32) >> 2)
        } else {
            f64::from_bits(u64::from(rk & 0xFFFF_FFFC) << 32)
        };
        if rk & 0x01 != 0 {
            value /= 100.0;
        }
        Ok(value)
    }

    /// String with an 8-bit character count, as used for sheet names.
    pub(crate) fn read_short_string(&mut self) -> Result<String, SheetError> {
        let chars = self.read_u8()? as usize;
        self.read_characters(chars, false)
    }

    /// String with a 16-bit character count.
    pub(crate) fn read_string(&mut self) -> Result<String, SheetError> {
        let chars = self.read_u16()? as usize;
        self.read_characters(chars, false)
    }

    /// Shared string table entry; formatting runs and phonetic data are skipped.
    pub(crate) fn read_rich_string(&mut self) -> Result<String, SheetError> {
        let chars = self.read_u16()? as usize;
        self.read_characters(chars, true)
    }

    fn read_characters(&mut self, chars: usize, is_rich: bool) -> Result<String, SheetError> {
        let flags = self.read_u8()?;
        let runs = if is_rich && flags & 0x08 != 0 { self.read_u16()? as usize } else { 0 };
        let phonetic = if is_rich && flags & 0x04 != 0 { self.read_u32()? as usize } else { 0 };

        let mut string = String::with_capacity(chars);
        let mut is_wide = flags & 0x01 != 0;
        let mut remaining = chars;
        while remaining > 0 {
            remaining -= self.read_fragment(remaining, is_wide, &mut string)?;
            if remaining > 0 {
                // the rest continues in the next record behind a fresh option byte
                is_wide = self.read_u8()? & 0x01 != 0;
            }
        }
        self.skip(runs * 4)?;
        self.skip(phonetic)?;
        Ok(string)
    }

    /// Decodes up to `chars` characters from the current chunk and returns how many were read.
    fn read_fragment(&mut self, chars: usize, is_wide: bool, string: &mut String) -> Result<usize, SheetError> {
        let kind = self.kind;
        let encoding = self.encoding;
        let bytes = self.take(if is_wide { chars * 2 } else { chars });
        if bytes.is_empty() {
            Err(RecordError::NotEnoughData(kind, chars))?
        }
        if is_wide {
            string.push_str(&UTF_16LE.decode_without_bom_handling(bytes).0);
            Ok(bytes.len() / 2)
        } else {
            string.push_str(&encoding.decode_without_bom_handling(bytes).0);
            Ok(bytes.len())
        }
    }
}

/// Dispatches every remaining record of `reader` to the match arms.
#[macro_export]
macro_rules! match_records {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
