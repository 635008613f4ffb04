//! This library reads, edits and repacks **IPK** bundles.
//!
//! # IPK Bundle Format
//!
//! An IPK bundle is a header, a file table in which every entry carries its own directory path, and
//! a content block. Files may be individually zlib compressed. All integers are big-endian.
//!
//! ## Header
//!
//! | Offset (bytes) | Field          | Description                                                 |
//! |----------------|----------------|-------------------------------------------------------------|
//! | 0x0000         | Magic number   | 4 bytes: `0x50EC12BA`                                       |
//! | 0x0004         | Version        | 4 bytes: `3`, `4` or `5`                                    |
//! | 0x0008         | Platform       | 4 bytes: target platform identifier                         |
//! | 0x000C         | Base Offset    | 4 bytes: offset of the content block                        |
//! | 0x0010         | File Count     | 4 bytes: number of file table entries                       |
//! | 0x0014         | Compressed     | 4 bytes: `1` when any entry is compressed                   |
//! | 0x0018         | Engine Version | 4 bytes: engine build the bundle was made for               |
//!
//! ## File Table
//!
//! | Field           | Description                                                        |
//! |-----------------|--------------------------------------------------------------------|
//! | Offset Count    | 4 bytes: number of offsets that follow, at least one               |
//! | Size            | 4 bytes: size of the decoded content                               |
//! | Compressed Size | 4 bytes: size of the stored content, `0` when stored as is         |
//! | Timestamp       | 8 bytes: modification time                                         |
//! | Offsets         | 8 bytes each: content offsets relative to the base offset          |
//! | Name            | 4 byte length and the name bytes                                   |
//! | Directory       | 4 byte length and the `/` separated directory, empty for the root  |
//! | String Id       | 4 bytes: [`crc::CRC_32_BZIP2`] of the lower cased full path        |
//! | Flags           | 4 bytes, version 5 and later only                                  |
//!
//! ## Additional Information
//!
//! - **File Extension**: `.ipk`
//! - Only the first offset of an entry is read; repacked bundles store exactly one.
//! - String id mismatches are reported as warnings and never stop a read.

pub mod compression;
pub mod error;
pub mod manager;
pub mod types;

pub use manager::{IpkArchive, IpkEntry, IpkManager, IpkOptions};
