//! Loading and writing CNT containers

use arkive_core::{
    binary::{decode_name, encode_name, prefixed_len, ReadArchiveExt, WriteArchiveExt},
    cipher::{byte_sum, byte_sum_u32, XorKey},
    generator::ContentGenerator,
    manager::{ArchiveDataManager, ManagerInfo},
    repack::{ArchiveFileItem, RepackPlan, TwoPassWriter},
    tree::{ArchiveEntry, ArchiveTree, DataBlock, ROOT_DIRECTORY_INDEX},
};
use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    types::{CntFileRecord, CntHeader, FILE_RECORD_LEN, HEADER_LEN},
};

/// Separator used by directory paths stored in CNT files
pub const PATH_SEPARATOR: char = '\\';

/// A file stored in a CNT container
#[derive(Debug, Clone, PartialEq)]
pub struct CntEntry {
    /// File name without its directory
    pub name: String,
    /// Index into the directory table, `-1` for the root
    pub directory_index: i32,
    /// Key the stored content is XOR encrypted with
    pub xor_key: XorKey,
    /// Expected sum of the decoded bytes, `None` when the container doesn't verify content
    pub checksum: Option<u32>,
    /// Offset of the stored content from the start of the container
    pub pointer: u64,
    /// Number of stored bytes
    pub size: u64,
}

impl CntEntry {
    /// An unencrypted root entry with no content yet
    pub fn new(name: impl Into<String>) -> Self {
        CntEntry {
            name: name.into(),
            directory_index: ROOT_DIRECTORY_INDEX,
            xor_key: XorKey::NONE,
            checksum: None,
            pointer: 0,
            size: 0,
        }
    }
}

impl ArchiveEntry for CntEntry {
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
        self.xor_key
    }

    fn reset_xor_key(&mut self) {
        self.xor_key = XorKey::NONE;
    }

    fn checksum(&self) -> u32 {
        self.checksum.unwrap_or(0)
    }
}

/// Header and tables of a CNT container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CntArchive {
    /// Header flags; the counts are derived from the tables when writing
    pub header: CntHeader,
    /// Directory paths in table order
    pub directories: Vec<String>,
    /// File table in stored order
    pub entries: Vec<CntEntry>,
    origin: u64,
    tables_end: u64,
}

fn table_len(count: i32, table: &str) -> Result<usize> {
    usize::try_from(count).map_err(|_| Error::format(format!("{table} count {count} is negative")))
}

fn stored_count(len: usize, table: &str) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::format(format!("too many entries in the {table} table")))
}

fn stored_u32(value: u64, field: &str, name: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::format(format!("{field} of '{name}' exceeds 4 GiB")))
}

impl CntArchive {
    /// Number of bytes the header and tables occupy
    ///
    /// Only depends on the counts and the names, so it's known before any content is placed.
    pub fn tables_len(&self) -> u64 {
        let directories: u64 = self.directories.iter().map(|d| prefixed_len(d)).sum();
        let files: u64 = self
            .entries
            .iter()
            .map(|e| 4 + prefixed_len(&e.name) + FILE_RECORD_LEN)
            .sum();
        HEADER_LEN + directories + 1 + files
    }

    /// Absolute position just past the tables, as read
    pub fn content_start(&self) -> u64 {
        self.tables_end
    }

    /// Reads the header and both tables
    ///
    /// Checksum mismatches are logged and otherwise ignored.
    #[instrument(skip_all, err)]
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let origin = reader.stream_position()?;
        let header = CntHeader::read(reader).map_err(Error::from_record)?;
        let directory_count = table_len(header.directory_count, "directory")?;
        let file_count = table_len(header.file_count, "file")?;
        let mask = header.name_mask();

        let mut directories = Vec::with_capacity(directory_count.min(4096));
        let mut sum = 0u8;
        for _ in 0..directory_count {
            let mut raw = reader.read_prefixed_bytes::<LittleEndian>()?;
            if let Some(mask) = mask {
                raw.iter_mut().for_each(|b| *b ^= mask);
            }
            sum = sum.wrapping_add(byte_sum(&raw));
            directories.push(decode_name(&raw));
        }

        let stored_sum = reader.read_u8()?;
        if header.checksum_enabled && stored_sum != sum {
            let error = Error::ChecksumMismatch {
                region: "directory table".into(),
                expected: stored_sum.into(),
                actual: sum.into(),
            };
            warn!(%error, "ignoring bad checksum");
        }

        let mut entries = Vec::with_capacity(file_count.min(4096));
        for _ in 0..file_count {
            let directory_index = reader.read_i32::<LittleEndian>()?;
            let name = reader.read_prefixed_string::<LittleEndian>(mask)?;
            let record = CntFileRecord::read(reader).map_err(Error::from_record)?;
            entries.push(CntEntry {
                name,
                directory_index,
                xor_key: record.xor_key.into(),
                checksum: header.checksum_enabled.then_some(record.checksum),
                pointer: record.pointer.into(),
                size: record.size.into(),
            });
        }

        let tables_end = reader.stream_position()?;
        debug!(
            directories = directories.len(),
            files = entries.len(),
            xor = header.xor_enabled,
            checksums = header.checksum_enabled,
            "read cnt tables"
        );

        Ok(CntArchive {
            header,
            directories,
            entries,
            origin,
            tables_end,
        })
    }

    /// Serializes the header and both tables, masking names and filling checksums as the header
    /// flags request
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let header = CntHeader {
            directory_count: stored_count(self.directories.len(), "directory")?,
            file_count: stored_count(self.entries.len(), "file")?,
            ..self.header
        };
        header.write(writer)?;

        let mask = header.name_mask();
        let mut sum = 0u8;
        for directory in &self.directories {
            writer.write_prefixed_string::<LittleEndian>(directory, mask)?;
            sum = sum.wrapping_add(byte_sum(&encode_name(directory)?));
        }
        writer.write_u8(if header.checksum_enabled { sum } else { 0 })?;

        for entry in &self.entries {
            writer.write_i32::<LittleEndian>(entry.directory_index)?;
            writer.write_prefixed_string::<LittleEndian>(&entry.name, mask)?;
            CntFileRecord {
                xor_key: entry.xor_key.0,
                checksum: if header.checksum_enabled {
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

/// The CNT driver
#[derive(Debug, Default, Clone, Copy)]
pub struct CntManager;

impl ManagerInfo for CntManager {
    fn id(&self) -> &'static str {
        "cnt"
    }

    fn path_separator(&self) -> char {
        PATH_SEPARATOR
    }

    fn archive_file_extension(&self) -> &'static str {
        "cnt"
    }

    fn default_archive_file_name(&self) -> &'static str {
        "Textures.cnt"
    }
}

impl ArchiveDataManager for CntManager {
    type Archive = CntArchive;
    type Entry = CntEntry;

    fn load_archive<R: Read + Seek>(&self, reader: &mut R) -> Result<CntArchive> {
        CntArchive::read(reader)
    }

    fn load_archive_data<R: Read + Seek>(
        &self,
        archive: &CntArchive,
        reader: &mut R,
    ) -> Result<ArchiveTree<CntEntry>> {
        let end = reader.seek(SeekFrom::End(0))?;
        let data = DataBlock {
            base: archive.origin,
            start: archive.tables_end,
            end,
        };
        ArchiveTree::from_flat(archive.directories.clone(), archive.entries.clone(), data)
    }

    fn create_archive(&self) -> CntArchive {
        CntArchive::default()
    }

    fn create_entry(&self, item: &ArchiveFileItem<CntEntry>) -> Result<CntEntry> {
        if item.name.is_empty() || item.name.contains(PATH_SEPARATOR) {
            return Err(Error::format(format!("'{}' is not a valid file name", item.name)));
        }
        Ok(CntEntry::new(item.name.clone()))
    }

    fn encode_file(&self, mut input: Vec<u8>, entry: &mut CntEntry) -> Result<Vec<u8>> {
        entry.xor_key.apply(&mut input);
        entry.checksum = None;
        Ok(input)
    }

    fn decode_file(&self, mut input: Vec<u8>, entry: &CntEntry) -> Result<Vec<u8>> {
        entry.xor_key.apply(&mut input);

        if let Some(expected) = entry.checksum {
            let actual = byte_sum_u32(&input);
            if actual != expected {
                let error = Error::ChecksumMismatch {
                    region: format!("file '{}'", entry.name),
                    expected,
                    actual,
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
        archive: &mut CntArchive,
        writer: &mut W,
        files: &[ArchiveFileItem<CntEntry>],
    ) -> Result<()> {
        let mut plan = RepackPlan::new(files, |item| self.create_entry(item))?;

        archive.header.xor_enabled = false;
        archive.header.checksum_enabled = false;
        archive.header.xor_seed = 0;
        archive.directories = plan.directories().map(String::from).collect();
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

        archive.tables_end = archive.origin + archive.tables_len();
        debug!(size = end, "wrote cnt archive");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use arkive_core::{
        cipher::{byte_sum_u32, XorKey},
        editor::ArchiveEditor,
        repack::FileSource,
    };
    use pretty_assertions::{assert_eq, assert_str_eq};
    use std::io::Cursor;
    use tracing_test::traced_test;

    use super::{CntArchive, CntEntry, CntManager};
    use crate::{
        error::{Error, Result},
        types::CntHeader,
    };

    fn protected_archive(content: &[u8], checksum: u32) -> Result<Vec<u8>> {
        let mut entry = CntEntry::new("fix.gf");
        entry.directory_index = 0;
        entry.xor_key = XorKey([0x01, 0x02, 0x03, 0x04]);
        entry.checksum = Some(checksum);
        entry.size = content.len() as u64;

        let mut archive = CntArchive {
            header: CntHeader {
                xor_enabled: true,
                checksum_enabled: true,
                xor_seed: 0x5A,
                ..Default::default()
            },
            directories: vec!["world\\maps".into()],
            entries: vec![entry],
            ..Default::default()
        };
        archive.entries[0].pointer = archive.tables_len();

        let mut output = Cursor::new(Vec::new());
        archive.write(&mut output)?;
        let mut output = output.into_inner();
        output.extend(archive.entries[0].xor_key.transform(content));
        Ok(output)
    }

    #[traced_test]
    #[test]
    fn write_single_root_file() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            // Header
            0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00,
            // Directory checksum
            0x00,
            // Files
            0xFF, 0xFF, 0xFF, 0xFF,
            0x05, 0x00, 0x00, 0x00, 0x61, 0x2E, 0x74, 0x78, 0x74,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x29, 0x00, 0x00, 0x00,
            0x05, 0x00, 0x00, 0x00,
            // Content
            0x68, 0x65, 0x6C, 0x6C, 0x6F,
        ];

        let mut editor = ArchiveEditor::create(CntManager);
        editor.add_file("", "a.txt", FileSource::Memory(b"hello".to_vec()));

        let mut actual = Cursor::new(Vec::new());
        editor.repack(&mut actual)?;

        assert_str_eq!(
            format!("{:02X?}", actual.get_ref()),
            format!("{:02X?}", expected)
        );
        Ok(())
    }

    #[traced_test]
    #[test]
    fn read_masked_names_and_encrypted_content() -> Result<()> {
        let input = protected_archive(b"texture", byte_sum_u32(b"texture"))?;
        let editor = ArchiveEditor::open(CntManager, Cursor::new(input))?;

        let directory = editor.tree().directory(0).map(|d| d.path.clone());
        assert_eq!(directory.as_deref(), Some("world\\maps"));
        assert_eq!(editor.read_file("world\\maps", "fix.gf")?, b"texture".to_vec());
        assert!(!logs_contain("checksum mismatch"));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn bad_checksum_is_only_a_warning() -> Result<()> {
        let input = protected_archive(b"texture", 0xDEAD)?;
        let editor = ArchiveEditor::open(CntManager, Cursor::new(input))?;

        assert_eq!(editor.read_file("world\\maps", "fix.gf")?, b"texture".to_vec());
        assert!(logs_contain("checksum mismatch in file 'fix.gf'"));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn repack_drops_protection() -> Result<()> {
        let input = protected_archive(b"texture", byte_sum_u32(b"texture"))?;
        let editor = ArchiveEditor::open(CntManager, Cursor::new(input))?;

        let mut output = Cursor::new(Vec::new());
        editor.repack(&mut output)?;
        output.set_position(0);

        let archive = CntArchive::read(&mut output)?;
        assert!(!archive.header.xor_enabled);
        assert!(!archive.header.checksum_enabled);
        assert_eq!(archive.header.xor_seed, 0);
        assert_eq!(archive.entries[0].xor_key, XorKey::NONE);
        assert_eq!(archive.entries[0].checksum, None);

        let tables_len = archive.tables_len() as usize;
        let content = &output.get_ref()[tables_len..];
        assert_eq!(content, b"texture");
        Ok(())
    }

    #[test]
    fn negative_counts_are_rejected() {
        #[rustfmt::skip]
        let input = vec![
            0xFF, 0xFF, 0xFF, 0xFF,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00,
            0x00,
        ];

        let result = CntArchive::read(&mut Cursor::new(input));
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn names_may_not_contain_separators() {
        let mut editor = ArchiveEditor::create(CntManager);
        editor.add_file("", "bad\\name", FileSource::Memory(Vec::new()));
        let result = editor.repack(&mut Cursor::new(Vec::new()));
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[traced_test]
    #[test]
    fn untouched_names_keep_their_bytes() -> Result<()> {
        #[rustfmt::skip]
        let input: Vec<u8> = vec![
            // Header
            0x00, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00,
            // Directory checksum
            0x00,
            // Files
            0xFF, 0xFF, 0xFF, 0xFF,
            0x04, 0x00, 0x00, 0x00, 0xE9, 0x2E, 0x67, 0x66,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x28, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            // Content
            0x68, 0x69,
        ];

        let editor = ArchiveEditor::open(CntManager, Cursor::new(input.clone()))?;
        assert_eq!(editor.read_file("", "\u{e9}.gf")?, b"hi".to_vec());

        let mut output = Cursor::new(Vec::new());
        editor.repack(&mut output)?;
        assert_str_eq!(format!("{:02X?}", output.get_ref()), format!("{:02X?}", input));
        Ok(())
    }
}
