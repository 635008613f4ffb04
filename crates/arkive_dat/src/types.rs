//! Fixed layout records of a DAT archive.

use arkive_core::binary;
use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};

/// Size of [`DatHeader`] on disk
pub const HEADER_LEN: u64 = 5;

/// Size of [`DatRecord`] on disk
pub const RECORD_LEN: u64 = 20;

/// Width of the name field; names use at most one byte less
pub const NAME_LEN: usize = 10;

/// Header flag set when records carry content checksums
pub const FLAG_CHECKSUMS: u8 = 0x01;

/// DAT file header
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct DatHeader {
    /// Number of records
    pub file_count: u32,

    /// Bit field, see [`FLAG_CHECKSUMS`]
    pub flags: u8,
}

impl DatHeader {
    /// Whether records carry content checksums
    pub fn has_checksums(&self) -> bool {
        self.flags & FLAG_CHECKSUMS != 0
    }
}

/// One file of a DAT archive
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct DatRecord {
    /// NUL padded file name
    pub name: [u8; NAME_LEN],

    /// Single byte XOR key, applied as `[k, k, k, k]`
    pub xor_key: u8,

    /// Wrapping sum of the decoded content bytes
    pub checksum: u8,

    /// Offset of the content from the start of the archive
    pub pointer: u32,

    /// Number of stored bytes
    pub size: u32,
}

impl DatRecord {
    /// The name up to its first NUL
    pub fn name(&self) -> String {
        let end = self.name.iter().position(|b| *b == 0).unwrap_or(NAME_LEN);
        binary::decode_name(&self.name[..end])
    }
}

/// Pads a name into the fixed width field
pub fn encode_name(name: &str) -> Result<[u8; NAME_LEN]> {
    let raw = binary::encode_name(name)?;
    if raw.is_empty() || raw.len() >= NAME_LEN || raw.contains(&0) {
        return Err(Error::format(format!(
            "'{name}' can't be stored as a DAT name of 1 to {} bytes",
            NAME_LEN - 1
        )));
    }

    let mut field = [0u8; NAME_LEN];
    field[..raw.len()].copy_from_slice(&raw);
    Ok(field)
}
