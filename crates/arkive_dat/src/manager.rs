//! Loading and writing DAT archives

use arkive_core::{
    cipher::{byte_sum, XorKey},
    generator::ContentGenerator,
    manager::{ArchiveDataManager, ManagerInfo},
    repack::{ArchiveFileItem, RepackPlan, TwoPassWriter},
    tree::{ArchiveEntry, ArchiveTree, DataBlock, ROOT_DIRECTORY_INDEX},
};
use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    types::{encode_name, DatHeader, DatRecord, FLAG_CHECKSUMS, HEADER_LEN, RECORD_LEN},
};

/// A file stored in a DAT archive
#[derive(Debug, Clone, PartialEq)]
pub struct DatEntry {
    /// File name, at most 9 bytes
    pub name: String,
    /// Single byte XOR key of the stored content
    pub xor_key: u8,
    /// Expected sum of the decoded bytes, `None` when the archive doesn't verify content
    pub checksum: Option<u8>,
    /// Offset of the stored content from the start of the archive
    pub pointer: u64,
    /// Number of stored bytes
    pub size: u64,
}

impl DatEntry {
    /// An unencrypted entry with no content yet
    pub fn new(name: impl Into<String>) -> Self {
        DatEntry {
            name: name.into(),
            xor_key: 0,
            checksum: None,
            pointer: 0,
            size: 0,
        }
    }
}

impl ArchiveEntry for DatEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn directory_index(&self) -> i32 {
        ROOT_DIRECTORY_INDEX
    }

    fn set_directory_index(&mut self, _index: i32) {}

    fn pointer(&self) -> u64 {
        self.pointer
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn set_location(&mut self, pointer: u64, size: u64) {
        self.pointer = pointer;
        self.size = size;
    }

    fn xor_key(&self) -> XorKey {
        XorKey::repeat(self.xor_key)
    }

    fn reset_xor_key(&mut self) {
        self.xor_key = 0;
    }

    fn checksum(&self) -> u32 {
        self.checksum.map_or(0, u32::from)
    }
}

/// Header and records of a DAT archive
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatArchive {
    /// Header flags; the count is derived from the records when writing
    pub header: DatHeader,
    /// Records in stored order
    pub entries: Vec<DatEntry>,
    origin: u64,
}

fn stored_u32(value: u64, field: &str, name: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::format(format!("{field} of '{name}' exceeds 4 GiB")))
}

impl DatArchive {
    /// Number of bytes the header and records occupy, known from the file count alone
    pub fn tables_len(&self) -> u64 {
        HEADER_LEN + RECORD_LEN * self.entries.len() as u64
    }

    /// Reads the header and records
    #[instrument(skip_all, err)]
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let origin = reader.stream_position()?;
        let end = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(origin))?;

        let header = DatHeader::read(reader).map_err(Error::from_record)?;
        let records_len = u64::from(header.file_count) * RECORD_LEN;
        if origin + HEADER_LEN + records_len > end {
            return Err(Error::format(format!(
                "{} records don't fit in a {} byte file",
                header.file_count,
                end - origin
            )));
        }

        let entries = (0..header.file_count)
            .map(|_| {
                let record = DatRecord::read(reader).map_err(Error::from_record)?;
                Ok(DatEntry {
                    name: record.name(),
                    xor_key: record.xor_key,
                    checksum: header.has_checksums().then_some(record.checksum),
                    pointer: record.pointer.into(),
                    size: record.size.into(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(files = entries.len(), checksums = header.has_checksums(), "read dat records");
        Ok(DatArchive {
            header,
            entries,
            origin,
        })
    }

    /// Serializes the header and records
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        DatHeader {
            file_count: u32::try_from(self.entries.len())
                .map_err(|_| Error::format("too many records"))?,
            ..self.header
        }
        .write(writer)?;

        for entry in &self.entries {
            DatRecord {
                name: encode_name(&entry.name)?,
                xor_key: entry.xor_key,
                checksum: if self.header.has_checksums() {
                    entry.checksum.unwrap_or(0)
                } else {
                    0
                },
                pointer: stored_u32(entry.pointer, "pointer", &entry.name)?,
                size: stored_u32(entry.size, "size", &entry.name)?,
            }
            .write(writer)?;
        }
        Ok(())
    }
}

/// The DAT driver
#[derive(Debug, Default, Clone, Copy)]
pub struct DatManager;

impl ManagerInfo for DatManager {
    fn id(&self) -> &'static str {
        "dat"
    }

    fn path_separator(&self) -> char {
        '\\'
    }

    fn archive_file_extension(&self) -> &'static str {
        "dat"
    }

    fn default_archive_file_name(&self) -> &'static str {
        "Archive.dat"
    }
}

impl ArchiveDataManager for DatManager {
    type Archive = DatArchive;
    type Entry = DatEntry;

    fn load_archive<R: Read + Seek>(&self, reader: &mut R) -> Result<DatArchive> {
        DatArchive::read(reader)
    }

    fn load_archive_data<R: Read + Seek>(
        &self,
        archive: &DatArchive,
        reader: &mut R,
    ) -> Result<ArchiveTree<DatEntry>> {
        let end = reader.seek(SeekFrom::End(0))?;
        let data = DataBlock {
            base: archive.origin,
            start: archive.origin + archive.tables_len(),
            end,
        };
        ArchiveTree::from_flat(Vec::new(), archive.entries.clone(), data)
    }

    fn create_archive(&self) -> DatArchive {
        DatArchive::default()
    }

    fn create_entry(&self, item: &ArchiveFileItem<DatEntry>) -> Result<DatEntry> {
        encode_name(&item.name)?;
        Ok(DatEntry::new(item.name.clone()))
    }

    fn encode_file(&self, mut input: Vec<u8>, entry: &mut DatEntry) -> Result<Vec<u8>> {
        XorKey::repeat(entry.xor_key).apply(&mut input);
        entry.checksum = None;
        Ok(input)
    }

    fn decode_file(&self, mut input: Vec<u8>, entry: &DatEntry) -> Result<Vec<u8>> {
        XorKey::repeat(entry.xor_key).apply(&mut input);

        if let Some(expected) = entry.checksum {
            let actual = byte_sum(&input);
            if actual != expected {
                let error = Error::ChecksumMismatch {
                    region: format!("file '{}'", entry.name),
                    expected: expected.into(),
                    actual: actual.into(),
                };
                warn!(%error, "ignoring bad checksum");
            }
        }
        Ok(input)
    }

    #[instrument(skip_all, fields(files = files.len()), err)]
    fn write_archive<W: Write + Seek>(
        &self,
        mut generator: ContentGenerator<'_>,
        archive: &mut DatArchive,
        writer: &mut W,
        files: &[ArchiveFileItem<DatEntry>],
    ) -> Result<()> {
        if let Some(item) = files.iter().find(|item| !item.is_root()) {
            return Err(Error::format(format!(
                "DAT archives have no directories, can't store '{}\\{}'",
                item.directory, item.name
            )));
        }

        let mut plan = RepackPlan::new(files, |item| self.create_entry(item))?;
        archive.header.flags &= !FLAG_CHECKSUMS;
        archive.entries = plan.entries().to_vec();

        let pass = TwoPassWriter::begin(writer, archive.tables_len())?;
        let end = plan.write_content(&mut generator, writer, pass.content_start(), 0, |bytes, entry| {
            self.encode_file(bytes, entry)
        })?;
        drop(generator);

        archive.entries = plan.into_entries();
        let mut tables = Cursor::new(Vec::new());
        archive.write(&mut tables)?;
        pass.write_header(writer, tables.get_ref())?;

        debug!(size = end, "wrote dat archive");
        Ok(())
    }
}
