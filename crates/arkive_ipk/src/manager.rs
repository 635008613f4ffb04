//! Loading and writing IPK bundles

use arkive_core::{
    binary::{prefixed_len, ReadArchiveExt, WriteArchiveExt},
    generator::ContentGenerator,
    manager::{ArchiveDataManager, ManagerInfo},
    repack::{ArchiveFileItem, RepackPlan, TwoPassWriter},
    tree::{join_path, ArchiveEntry, ArchiveTree, DataBlock, ROOT_DIRECTORY_INDEX},
};
use binrw::{BinRead, BinWrite};
use bon::Builder;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crc::{Crc, CRC_32_BZIP2};
use indexmap::IndexSet;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use tracing::{debug, instrument, warn};

use crate::{
    compression::{compress, decompress},
    error::{Error, Result},
    types::{IpkHeader, IpkRecord, FLAGS_VERSION, HEADER_LEN, SUPPORTED_VERSIONS},
};

/// Separator used by directory paths stored in IPK bundles
pub const PATH_SEPARATOR: char = '/';

const PATH_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_BZIP2);

/// The id the engine looks files up by: a [`crc::CRC_32_BZIP2`] of the lower cased full path, as
/// stored bytes
pub fn string_id(directory: &str, name: &str) -> u32 {
    let path = join_path(directory, name, PATH_SEPARATOR)
        .to_lowercase()
        .chars()
        .map(|c| u8::try_from(c).unwrap_or(b'?'))
        .collect::<Vec<_>>();
    PATH_CRC.checksum(&path)
}

/// Options for how new bundles and new files are written
#[derive(Debug, Clone, Copy, Builder)]
pub struct IpkOptions {
    /// Version of newly created bundles
    #[builder(default = 5)]
    pub version: u32,

    /// Whether files added to a bundle are zlib compressed
    #[builder(default)]
    pub compress_new_files: bool,
}

impl Default for IpkOptions {
    fn default() -> Self {
        IpkOptions::builder().build()
    }
}

/// A file stored in an IPK bundle
#[derive(Debug, Clone, PartialEq)]
pub struct IpkEntry {
    /// File name without its directory
    pub name: String,
    /// Index into the derived directory list, `-1` for the root
    pub directory_index: i32,
    /// Whether the stored content is zlib compressed
    pub compressed: bool,
    /// Size of the decoded content
    pub size: u64,
    /// Number of stored bytes
    pub stored_size: u64,
    /// Modification time, kept as loaded
    pub timestamp: u64,
    /// Offset of the stored content relative to the bundle's base offset
    pub offset: u64,
    /// Reserved flags of version 5 bundles, kept as loaded
    pub flags: u32,
}

impl IpkEntry {
    /// A root entry with no content yet
    pub fn new(name: impl Into<String>, compressed: bool) -> Self {
        IpkEntry {
            name: name.into(),
            directory_index: ROOT_DIRECTORY_INDEX,
            compressed,
            size: 0,
            stored_size: 0,
            timestamp: 0,
            offset: 0,
            flags: 0,
        }
    }
}

impl ArchiveEntry for IpkEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn directory_index(&self) -> i32 {
        self.directory_index
    }

    fn set_directory_index(&mut self, index: i32) {
        self.directory_index = index;
    }

    fn pointer(&self) -> u64 {
        self.offset
    }

    fn size(&self) -> u64 {
        self.stored_size
    }

    fn set_location(&mut self, pointer: u64, size: u64) {
        self.offset = pointer;
        self.stored_size = size;
    }
}

/// Header and file table of an IPK bundle
///
/// IPK bundles have no directory table; every entry stores its directory path and the list here
/// is derived from them in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IpkArchive {
    /// Header fields; counts, base offset and the compressed flag are derived when writing
    pub header: IpkHeader,
    /// Distinct directory paths in first-seen order
    pub directories: Vec<String>,
    /// File table in stored order
    pub entries: Vec<IpkEntry>,
    origin: u64,
}

fn stored_u32(value: u64, field: &str, name: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::format(format!("{field} of '{name}' exceeds 4 GiB")))
}

impl IpkArchive {
    fn directory_of(&self, entry: &IpkEntry) -> Result<&str> {
        if entry.directory_index == ROOT_DIRECTORY_INDEX {
            return Ok("");
        }
        usize::try_from(entry.directory_index)
            .ok()
            .and_then(|index| self.directories.get(index))
            .map(|d| d.as_str())
            .ok_or_else(|| {
                Error::format(format!(
                    "'{}' refers to missing directory {}",
                    entry.name, entry.directory_index
                ))
            })
    }

    fn has_flags(&self) -> bool {
        self.header.version >= FLAGS_VERSION
    }

    /// Number of bytes the header and file table occupy when written
    ///
    /// Every entry is written with a single offset.
    pub fn tables_len(&self) -> u64 {
        let flags = if self.has_flags() { 4 } else { 0 };
        let entries: u64 = self
            .entries
            .iter()
            .map(|entry| {
                let directory = self.directory_of(entry).unwrap_or_default();
                IpkRecord::stored_len(1)
                    + prefixed_len(&entry.name)
                    + prefixed_len(directory)
                    + 4
                    + flags
            })
            .sum();
        HEADER_LEN + entries
    }

    /// The header as it will be written for the current tables
    pub fn stored_header(&self) -> Result<IpkHeader> {
        Ok(IpkHeader {
            base_offset: u32::try_from(self.tables_len())
                .map_err(|_| Error::format("file table exceeds 4 GiB"))?,
            file_count: u32::try_from(self.entries.len())
                .map_err(|_| Error::format("too many entries in the file table"))?,
            compressed: self.entries.iter().any(|e| e.compressed),
            ..self.header
        })
    }

    /// Reads the header and file table
    ///
    /// String id mismatches are logged and otherwise ignored.
    #[instrument(skip_all, err)]
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let origin = reader.stream_position()?;
        let header = IpkHeader::read(reader).map_err(Error::from_record)?;
        if !SUPPORTED_VERSIONS.contains(&header.version) {
            return Err(Error::UnsupportedVersion(header.version));
        }

        let mut directories = IndexSet::new();
        let mut entries = Vec::with_capacity((header.file_count as usize).min(4096));
        for _ in 0..header.file_count {
            let record = IpkRecord::read(reader).map_err(Error::from_record)?;
            let name = reader.read_prefixed_string::<BigEndian>(None)?;
            let directory = reader.read_prefixed_string::<BigEndian>(None)?;
            let stored_id = reader.read_u32::<BigEndian>()?;
            let flags = if header.version >= FLAGS_VERSION {
                reader.read_u32::<BigEndian>()?
            } else {
                0
            };

            let actual_id = string_id(&directory, &name);
            if stored_id != actual_id {
                let error = Error::ChecksumMismatch {
                    region: format!("string id of '{}'", join_path(&directory, &name, PATH_SEPARATOR)),
                    expected: stored_id,
                    actual: actual_id,
                };
                warn!(%error, "ignoring bad string id");
            }

            let directory_index = if directory.is_empty() {
                ROOT_DIRECTORY_INDEX
            } else {
                let (index, _) = directories.insert_full(directory);
                i32::try_from(index).map_err(|_| Error::format("too many directories"))?
            };

            let offset = record
                .offsets
                .first()
                .copied()
                .ok_or_else(|| Error::format(format!("'{name}' has no content offset")))?;
            let compressed = record.compressed_size != 0;
            entries.push(IpkEntry {
                name,
                directory_index,
                compressed,
                size: record.size.into(),
                stored_size: if compressed {
                    record.compressed_size.into()
                } else {
                    record.size.into()
                },
                timestamp: record.timestamp,
                offset,
                flags,
            });
        }

        debug!(
            version = header.version,
            directories = directories.len(),
            files = entries.len(),
            "read ipk tables"
        );

        Ok(IpkArchive {
            header,
            directories: directories.into_iter().collect(),
            entries,
            origin,
        })
    }

    /// Serializes the header and file table
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        self.stored_header()?.write(writer)?;

        for entry in &self.entries {
            let directory = self.directory_of(entry)?;
            IpkRecord {
                offset_count: 1,
                size: stored_u32(entry.size, "size", &entry.name)?,
                compressed_size: if entry.compressed {
                    stored_u32(entry.stored_size, "compressed size", &entry.name)?
                } else {
                    0
                },
                timestamp: entry.timestamp,
                offsets: vec![entry.offset],
            }
            .write(writer)?;

            writer.write_prefixed_string::<BigEndian>(&entry.name, None)?;
            writer.write_prefixed_string::<BigEndian>(directory, None)?;
            writer.write_u32::<BigEndian>(string_id(directory, &entry.name))?;
            if self.has_flags() {
                writer.write_u32::<BigEndian>(entry.flags)?;
            }
        }
        Ok(())
    }
}

/// The IPK driver
#[derive(Debug, Default, Clone, Copy)]
pub struct IpkManager {
    options: IpkOptions,
}

impl IpkManager {
    /// A driver that creates bundles and files as `options` describe
    pub fn new(options: IpkOptions) -> Self {
        IpkManager { options }
    }

    /// The options new bundles and files are created with
    pub fn options(&self) -> IpkOptions {
        self.options
    }
}

impl ManagerInfo for IpkManager {
    fn id(&self) -> &'static str {
        "ipk"
    }

    fn path_separator(&self) -> char {
        PATH_SEPARATOR
    }

    fn archive_file_extension(&self) -> &'static str {
        "ipk"
    }

    fn default_archive_file_name(&self) -> &'static str {
        "bundle_pc.ipk"
    }
}

impl ArchiveDataManager for IpkManager {
    type Archive = IpkArchive;
    type Entry = IpkEntry;

    fn load_archive<R: Read + Seek>(&self, reader: &mut R) -> Result<IpkArchive> {
        IpkArchive::read(reader)
    }

    fn load_archive_data<R: Read + Seek>(
        &self,
        archive: &IpkArchive,
        reader: &mut R,
    ) -> Result<ArchiveTree<IpkEntry>> {
        let end = reader.seek(SeekFrom::End(0))?;
        let base = archive.origin + u64::from(archive.header.base_offset);
        let data = DataBlock {
            base,
            start: base,
            end,
        };
        ArchiveTree::from_flat(archive.directories.clone(), archive.entries.clone(), data)
    }

    fn create_archive(&self) -> IpkArchive {
        IpkArchive {
            header: IpkHeader {
                version: self.options.version,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn create_entry(&self, item: &ArchiveFileItem<IpkEntry>) -> Result<IpkEntry> {
        if item.name.is_empty() || item.name.contains(PATH_SEPARATOR) {
            return Err(Error::format(format!("'{}' is not a valid file name", item.name)));
        }
        Ok(IpkEntry::new(
            item.name.clone(),
            self.options.compress_new_files,
        ))
    }

    fn encode_file(&self, input: Vec<u8>, entry: &mut IpkEntry) -> Result<Vec<u8>> {
        entry.size = input.len() as u64;
        if entry.compressed {
            compress(&input)
        } else {
            Ok(input)
        }
    }

    fn decode_file(&self, input: Vec<u8>, entry: &IpkEntry) -> Result<Vec<u8>> {
        if entry.compressed {
            decompress(&input, entry.size)
        } else {
            Ok(input)
        }
    }

    #[instrument(skip_all, fields(files = files.len()), err)]
    fn write_archive<W: Write + Seek>(
        &self,
        mut generator: ContentGenerator<'_>,
        archive: &mut IpkArchive,
        writer: &mut W,
        files: &[ArchiveFileItem<IpkEntry>],
    ) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&archive.header.version) {
            return Err(Error::UnsupportedVersion(archive.header.version));
        }

        let mut plan = RepackPlan::new(files, |item| self.create_entry(item))?;
        archive.directories = plan.directories().map(String::from).collect();
        archive.entries = plan.entries().to_vec();

        let pass = TwoPassWriter::begin(writer, archive.tables_len())?;
        let start = pass.content_start();
        let end = plan.write_content(&mut generator, writer, start, start, |bytes, entry| {
            self.encode_file(bytes, entry)
        })?;
        drop(generator);

        archive.entries = plan.into_entries();
        archive.header = archive.stored_header()?;
        let mut tables = Cursor::new(Vec::new());
        archive.write(&mut tables)?;
        pass.write_header(writer, tables.get_ref())?;

        debug!(size = end, compressed = archive.header.compressed, "wrote ipk bundle");
        Ok(())
    }
}
