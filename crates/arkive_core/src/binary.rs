//! Low level readers and writers shared by the format drivers.
//!
//! Fixed layout records are described with `binrw`; the helpers here cover the variable length
//! parts that sit between them: 4 byte length prefixed strings, optionally XOR masked with a single
//! byte.
//!
//! Stored names use a single byte code page. [`decode_name`] maps every byte to the char with the
//! same value, so any name read from an archive is written back with the same bytes.

use byteorder::{ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Longest string accepted from a length prefix
///
/// Anything longer is treated as a corrupt table rather than allocated.
pub const MAX_STRING_LEN: u32 = 0x1_0000;

/// Extra read operations for archive tables
pub trait ReadArchiveExt: Read {
    /// Reads a `u32` length followed by that many raw bytes
    fn read_prefixed_bytes<B: ByteOrder>(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32::<B>()?;
        if len > MAX_STRING_LEN {
            return Err(Error::format(format!("string length {len} is out of range")));
        }

        let mut buffer = vec![0u8; len as usize];
        self.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Reads a length prefixed string, unmasking every byte with `mask` when one is given
    fn read_prefixed_string<B: ByteOrder>(&mut self, mask: Option<u8>) -> Result<String> {
        let mut raw = self.read_prefixed_bytes::<B>()?;
        if let Some(mask) = mask {
            raw.iter_mut().for_each(|b| *b ^= mask);
        }
        Ok(decode_name(&raw))
    }
}

impl<R: Read + ?Sized> ReadArchiveExt for R {}

/// Extra write operations for archive tables
pub trait WriteArchiveExt: Write {
    /// Writes `value` as a `u32` length followed by its bytes, masked with `mask` when one is given
    fn write_prefixed_string<B: ByteOrder>(&mut self, value: &str, mask: Option<u8>) -> Result<()> {
        let mut raw = encode_name(value)?;
        let len = u32::try_from(raw.len())
            .ok()
            .filter(|len| *len <= MAX_STRING_LEN)
            .ok_or_else(|| Error::format(format!("string '{value}' is too long")))?;

        if let Some(mask) = mask {
            raw.iter_mut().for_each(|b| *b ^= mask);
        }
        self.write_u32::<B>(len)?;
        self.write_all(&raw)?;
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteArchiveExt for W {}

/// Number of bytes a length prefixed string occupies on disk
pub fn prefixed_len(value: &str) -> u64 {
    4 + value.chars().count() as u64
}

/// Decodes stored name bytes, one char per byte
pub fn decode_name(raw: &[u8]) -> String {
    raw.iter().copied().map(char::from).collect()
}

/// Encodes a name into its stored bytes
///
/// Fails with [`Error::Format`] on chars above `U+00FF`.
pub fn encode_name(value: &str) -> Result<Vec<u8>> {
    value
        .chars()
        .map(|c| {
            u8::try_from(c)
                .map_err(|_| Error::format(format!("'{value}' contains '{c}', which can't be stored in one byte")))
        })
        .collect()
}
