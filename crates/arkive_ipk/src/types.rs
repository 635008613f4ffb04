//! Fixed layout records of an IPK bundle.

use binrw::{BinRead, BinWrite};

/// Size of [`IpkHeader`] on disk, magic included
pub const HEADER_LEN: u64 = 28;

/// Oldest and newest bundle versions that can be read
pub const SUPPORTED_VERSIONS: std::ops::RangeInclusive<u32> = 3..=5;

/// First version whose entries end with a flags field
pub const FLAGS_VERSION: u32 = 5;

fn parse_flag(value: u32) -> core::result::Result<bool, String> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("flag has invalid value {other}")),
    }
}

/// IPK bundle header
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(big, magic = 0x50EC_12BAu32)]
pub struct IpkHeader {
    /// Layout revision of the entry table
    pub version: u32,

    /// Target platform identifier, kept as loaded
    pub platform: u32,

    /// Offset of the content block; entry offsets are relative to it
    pub base_offset: u32,

    /// Number of entries in the file table
    pub file_count: u32,

    /// Whether any entry is zlib compressed
    #[br(try_map = parse_flag)]
    #[bw(map = |v: &bool| u32::from(*v))]
    pub compressed: bool,

    /// Engine build the bundle was made for, kept as loaded
    pub engine_version: u32,
}

/// The fixed head of a file table entry, up to and including its offsets
#[derive(BinRead, BinWrite, Debug, Default, Clone, PartialEq)]
#[brw(big)]
pub struct IpkRecord {
    /// Number of entries in `offsets`
    #[br(assert((1..=64).contains(&offset_count), "entry has {} offsets", offset_count))]
    pub offset_count: u32,

    /// Size of the decoded content
    pub size: u32,

    /// Size of the stored content when compressed, 0 when stored as is
    pub compressed_size: u32,

    /// Modification time, kept as loaded
    pub timestamp: u64,

    /// Content offsets relative to the base offset; only the first one is used
    #[br(count = offset_count)]
    pub offsets: Vec<u64>,
}

impl IpkRecord {
    /// Size on disk of a record holding `offset_count` offsets
    pub fn stored_len(offset_count: u32) -> u64 {
        20 + 8 * u64::from(offset_count)
    }
}

#[cfg(test)]
mod test {
    use binrw::{BinRead, BinWrite};
    use pretty_assertions::{assert_eq, assert_str_eq};
    use std::io::Cursor;

    use super::{IpkHeader, IpkRecord};
    use crate::error::Result;

    #[test]
    fn read_header() -> Result<()> {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0x50, 0xEC, 0x12, 0xBA,
            0x00, 0x00, 0x00, 0x05,
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x00, 0x00, 0x40,
            0x00, 0x00, 0x00, 0x02,
            0x00, 0x00, 0x00, 0x01,
            0x00, 0x01, 0x86, 0xA0,
        ]);

        let expected = IpkHeader {
            version: 5,
            platform: 1,
            base_offset: 0x40,
            file_count: 2,
            compressed: true,
            engine_version: 100_000,
        };

        assert_eq!(IpkHeader::read(&mut input)?, expected);
        Ok(())
    }

    #[test]
    fn reject_bad_magic() {
        #[rustfmt::skip]
        let mut input = Cursor::new(vec![
            0xBA, 0x12, 0xEC, 0x50,
            0x00, 0x00, 0x00, 0x05,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x1C,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ]);

        assert!(IpkHeader::read(&mut input).is_err());
    }

    #[test]
    fn write_record_with_two_offsets() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x02,
            0x00, 0x00, 0x00, 0x0B,
            0x00, 0x00, 0x00, 0x13,
            0x00, 0x00, 0x00, 0x00, 0x65, 0x43, 0x21, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20,
        ];

        let record = IpkRecord {
            offset_count: 2,
            size: 11,
            compressed_size: 19,
            timestamp: 0x6543_2100,
            offsets: vec![0x10, 0x20],
        };

        let mut actual = Vec::new();
        record.write(&mut Cursor::new(&mut actual))?;

        assert_eq!(actual.len() as u64, IpkRecord::stored_len(2));
        assert_str_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));
        Ok(())
    }

    #[test]
    fn reject_record_without_offsets() {
        let mut input = Cursor::new(vec![0u8; 20]);
        assert!(IpkRecord::read(&mut input).is_err());
    }
}
