//! Fixed layout records of a CNT container.

use binrw::{BinRead, BinWrite};

/// Size of [`CntHeader`] on disk
pub const HEADER_LEN: u64 = 11;

/// Size of [`CntFileRecord`] on disk
pub const FILE_RECORD_LEN: u64 = 16;

fn parse_flag(value: u8) -> core::result::Result<bool, String> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("flag has invalid value {other}")),
    }
}

/// CNT file header
///
/// Counts are stored signed, as the directory index of root entries is `-1`.
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct CntHeader {
    /// Number of entries in the directory table
    pub directory_count: i32,

    /// Number of entries in the file table
    pub file_count: i32,

    /// Whether directory and file names are masked with `xor_seed`
    #[br(try_map = parse_flag)]
    #[bw(map = |v: &bool| u8::from(*v))]
    pub xor_enabled: bool,

    /// Whether the directory table and file contents carry checksums
    #[br(try_map = parse_flag)]
    #[bw(map = |v: &bool| u8::from(*v))]
    pub checksum_enabled: bool,

    /// Mask applied to every byte of every stored name
    pub xor_seed: u8,
}

impl CntHeader {
    /// The name mask, if names are masked
    pub fn name_mask(&self) -> Option<u8> {
        self.xor_enabled.then_some(self.xor_seed)
    }
}

/// The fixed tail of a file table entry, stored after its directory index and name
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct CntFileRecord {
    /// Per-file XOR key applied to the content
    pub xor_key: [u8; 4],

    /// Wrapping sum of the decoded content bytes, 0 when checksums are disabled
    pub checksum: u32,

    /// Offset of the content from the start of the container
    pub pointer: u32,

    /// Number of stored bytes
    pub size: u32,
}
