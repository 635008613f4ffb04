//! This library reads, edits and repacks **CNT** texture containers.
//!
//! # CNT Container Format
//!
//! A CNT file holds a flat directory table, a file table and the concatenated file contents. Names
//! may be masked with a single byte, contents may be XOR encrypted with a per-file key, and both
//! tables may carry checksums.
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field              | Description                                                  |
//! |----------------|--------------------|--------------------------------------------------------------|
//! | 0x0000         | Directory Count    | 4 bytes: signed number of directory table entries            |
//! | 0x0004         | File Count         | 4 bytes: signed number of file table entries                 |
//! | 0x0008         | XOR Enabled        | 1 byte: `1` when names are masked with the XOR seed          |
//! | 0x0009         | Checksum Enabled   | 1 byte: `1` when checksums are filled in                     |
//! | 0x000A         | XOR Seed           | 1 byte: mask applied to every byte of every name             |
//!
//! ### Directory Table
//!
//! Each directory is a 4 byte length followed by that many bytes of its `\` separated path,
//! masked with the XOR seed when enabled. The table is followed by a single byte holding the
//! wrapping sum of every unmasked path byte, or `0` when checksums are disabled.
//!
//! ### File Table
//!
//! | Field           | Description                                                       |
//! |-----------------|-------------------------------------------------------------------|
//! | Directory Index | 4 bytes: signed index into the directory table, `-1` for the root |
//! | Name            | 4 byte length and the (masked) name bytes                         |
//! | XOR Key         | 4 bytes: key applied cyclically to the content, zero when plain   |
//! | Checksum        | 4 bytes: wrapping sum of the decoded content bytes                |
//! | Pointer         | 4 bytes: offset of the content from the start of the file         |
//! | Size            | 4 bytes: number of stored bytes                                   |
//!
//! ## Additional Information
//!
//! - **File Extension**: `.cnt`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - Checksum mismatches are reported as warnings and never stop a read.
//! - Repacked files are always written without masking, encryption or checksums.
//!
//! ```no_run
//! use arkive_cnt::CntManager;
//! use arkive_core::ArchiveEditor;
//!
//! fn list_cnt_contents(reader: std::fs::File) -> arkive_cnt::error::Result<()> {
//!     let editor = ArchiveEditor::open(CntManager, reader)?;
//!     for item in editor.items() {
//!         println!("{}", editor.item_path(item));
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod manager;
pub mod types;

pub use manager::{CntArchive, CntEntry, CntManager};
