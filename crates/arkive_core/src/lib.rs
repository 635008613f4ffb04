//! The format agnostic half of **arkive**: loading, browsing, editing and repacking game archive
//! containers.
//!
//! # Overview
//!
//! Every supported container family is handled by a driver implementing [`ArchiveDataManager`].
//! A driver knows how to read its header and entry table, how stored bytes are turned into file
//! content ([`ArchiveDataManager::decode_file`]) and back, and how the header is laid out when the
//! archive is written again. Everything else lives here:
//!
//! - [`ArchiveTree`] groups the flat entry table into directories and binds it to the
//!   [`DataBlock`] holding the content.
//! - [`ArchiveEditor`] queues additions, replacements and removals against a loaded archive.
//! - [`ContentGenerator`] defers reading or converting each file's bytes until the writer asks
//!   for them, so a repack never holds the whole archive in memory.
//! - [`RepackPlan`] and [`TwoPassWriter`] implement the shared write sequence: content first,
//!   then the header with the final pointers.
//! - [`FileTypeRegistry`] picks a [`FileTypePlugin`] for previews and conversion.
//!
//! ## Conventions shared by all drivers
//!
//! | Concept            | Representation                                                          |
//! |--------------------|-------------------------------------------------------------------------|
//! | Root directory     | Directory index `-1`, empty path                                        |
//! | Directory table    | Ordered list of paths, entries refer to it by index                     |
//! | Pointer            | Offset of the stored bytes relative to [`DataBlock::base`]              |
//! | Size               | Number of stored (encoded) bytes                                        |
//! | XOR key            | 4 bytes applied cyclically by absolute position within a file           |
//! | Checksum           | Byte sum of the decoded data; mismatches are logged, never fatal        |
//!
//! Repacking always writes archives with checksums and XOR encryption disabled.

pub mod binary;
pub mod cancel;
pub mod cipher;
pub mod editor;
pub mod error;
pub mod generator;
pub mod manager;
pub mod plugin;
pub mod repack;
pub mod tree;

pub use cancel::CancellationToken;
pub use cipher::XorKey;
pub use editor::{ArchiveEditor, RepackSummary};
pub use error::{ConversionError, Error, Result};
pub use generator::ContentGenerator;
pub use manager::{ArchiveDataManager, ManagerInfo};
pub use plugin::{convert_batch, BatchReport, FileTypePlugin, FileTypeRegistry, Thumbnail};
pub use repack::{ArchiveFileItem, FileSource, RepackPlan, TwoPassWriter};
pub use tree::{ArchiveEntry, ArchiveTree, DataBlock, DirectoryNode};
