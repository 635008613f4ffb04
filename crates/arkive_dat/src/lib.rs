//! This library reads, edits and repacks flat **DAT** archives.
//!
//! # DAT Archive Format
//!
//! A DAT file is a short header, a table of fixed width records and the concatenated file contents.
//! There are no directories. All integers are little-endian.
//!
//! ## Header
//!
//! | Offset (bytes) | Field      | Description                                         |
//! |----------------|------------|-----------------------------------------------------|
//! | 0x0000         | File Count | 4 bytes: number of records                          |
//! | 0x0004         | Flags      | 1 byte: bit `0` set when records carry checksums    |
//!
//! ## Record
//!
//! | Offset (bytes) | Field    | Description                                                 |
//! |----------------|----------|-------------------------------------------------------------|
//! | 0x0000         | Name     | 10 bytes: NUL padded, at most 9 bytes of name               |
//! | 0x000A         | XOR Key  | 1 byte: repeated into a 4 byte key applied to the content   |
//! | 0x000B         | Checksum | 1 byte: wrapping sum of the decoded content bytes           |
//! | 0x000C         | Pointer  | 4 bytes: offset of the content from the start of the file   |
//! | 0x0010         | Size     | 4 bytes: number of stored bytes                             |
//!
//! ## Additional Information
//!
//! - **File Extension**: `.dat`
//! - The content block starts right after the records, at `5 + 20 * file_count`.
//! - Checksum mismatches are reported as warnings and never stop a read.
//! - Repacked files are always written without encryption or checksums.

pub mod error;
pub mod manager;
pub mod types;

pub use manager::{DatArchive, DatEntry, DatManager};
