//! The shared half of writing a modified archive.
//!
//! Drivers own their header layout, but every driver repacks the same way:
//!
//! 1. [`RepackPlan::new`] derives the directory table from the final item list (first-seen order),
//!    materializes an entry per item and points it at its new directory slot. Per-file XOR keys
//!    are cleared, since content reaches the writer already decoded.
//! 2. The driver computes its header size from the plan's tables alone and calls
//!    [`TwoPassWriter::begin`], which leaves the header area unwritten.
//! 3. [`RepackPlan::write_content`] streams each file from the [`ContentGenerator`] through the
//!    driver's encode hook, recording `pointer` and `size` as it goes.
//! 4. With every pointer known, the driver serializes its header and hands it to
//!    [`TwoPassWriter::write_header`], which seeks back and fills the reserved area.
//!
//! Nothing is retried or rolled back. A failed write leaves a partial stream behind, so callers
//! should write to a temporary file and only replace the original on success.

use indexmap::IndexSet;
use std::{
    io::{Seek, SeekFrom, Write},
    path::PathBuf,
};
use tracing::{debug, instrument};

use crate::{
    error::{Error, Result},
    generator::ContentGenerator,
    tree::{ArchiveEntry, ArchiveTree, ROOT_DIRECTORY_INDEX},
};

/// Where an item's bytes come from during a repack
#[derive(Debug, Clone, PartialEq)]
pub enum FileSource {
    /// The stored bytes of the item's entry in the archive being rewritten
    Archive,
    /// A file on disk that is being imported
    Pending(PathBuf),
    /// Bytes already in memory, such as the output of a converter
    Memory(Vec<u8>),
}

/// One file of the archive as it should look after a repack
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveFileItem<E> {
    /// Directory path relative to the archive root, empty for the root
    pub directory: String,
    /// File name without its directory
    pub name: String,
    /// The entry loaded from the archive, `None` for a new file
    pub entry: Option<E>,
    /// Where the file's bytes come from
    pub source: FileSource,
}

impl<E: ArchiveEntry> ArchiveFileItem<E> {
    /// An item backed by an entry already stored in the archive
    pub fn stored(directory: impl Into<String>, entry: E) -> Self {
        ArchiveFileItem {
            directory: directory.into(),
            name: entry.name().to_owned(),
            entry: Some(entry),
            source: FileSource::Archive,
        }
    }

    /// A brand new file
    pub fn new_file(directory: impl Into<String>, name: impl Into<String>, source: FileSource) -> Self {
        ArchiveFileItem {
            directory: directory.into(),
            name: name.into(),
            entry: None,
            source,
        }
    }

    /// Whether the item lives in the archive root
    pub fn is_root(&self) -> bool {
        self.directory.is_empty()
    }
}

impl<E: ArchiveEntry> ArchiveTree<E> {
    /// Lists every stored file as an item, root first, then in directory table order
    pub fn to_items(&self) -> Vec<ArchiveFileItem<E>> {
        self.files()
            .map(|(directory, entry)| ArchiveFileItem::stored(directory.path.clone(), entry.clone()))
            .collect()
    }
}

/// The tables of an archive about to be written
#[derive(Debug, Clone)]
pub struct RepackPlan<E> {
    directories: IndexSet<String>,
    entries: Vec<E>,
}

impl<E: ArchiveEntry> RepackPlan<E> {
    /// Derives directories and entries from the final item list
    ///
    /// Stored items keep their entry; `create` builds one for each new item.
    #[instrument(skip_all, fields(items = items.len()))]
    pub fn new(
        items: &[ArchiveFileItem<E>],
        mut create: impl FnMut(&ArchiveFileItem<E>) -> Result<E>,
    ) -> Result<Self> {
        let directories = items
            .iter()
            .filter(|item| !item.is_root())
            .map(|item| item.directory.clone())
            .collect::<IndexSet<_>>();

        let entries = items
            .iter()
            .map(|item| {
                let mut entry = match &item.entry {
                    Some(entry) => entry.clone(),
                    None => create(item)?,
                };

                let index = if item.is_root() {
                    ROOT_DIRECTORY_INDEX
                } else {
                    directories
                        .get_index_of(&item.directory)
                        .and_then(|index| i32::try_from(index).ok())
                        .ok_or_else(|| Error::format("directory table is too large"))?
                };
                entry.set_directory_index(index);
                entry.reset_xor_key();
                Ok(entry)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(directories = directories.len(), files = entries.len(), "planned repack");
        Ok(RepackPlan {
            directories,
            entries,
        })
    }

    /// Directory paths in table order, root excluded
    pub fn directories(&self) -> impl ExactSizeIterator<Item = &str> {
        self.directories.iter().map(|d| d.as_str())
    }

    /// Number of directories, root excluded
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// Entries in the same order as the items
    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    /// Takes the entries, with their final locations once content has been written
    pub fn into_entries(self) -> Vec<E> {
        self.entries
    }

    /// Streams every file's content to `writer`
    ///
    /// `writer` must be positioned at `start`, the offset of the content block from the start of
    /// the archive. Entry pointers are recorded relative to `base`. Returns the offset just past
    /// the last byte written.
    #[instrument(skip(self, generator, writer, encode), err)]
    pub fn write_content<W: Write>(
        &mut self,
        generator: &mut ContentGenerator<'_>,
        writer: &mut W,
        start: u64,
        base: u64,
        mut encode: impl FnMut(Vec<u8>, &mut E) -> Result<Vec<u8>>,
    ) -> Result<u64> {
        let mut offset = start;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let bytes = generator.get_bytes(index)?;
            let encoded = encode(bytes, entry)?;

            let pointer = offset
                .checked_sub(base)
                .ok_or_else(|| Error::format("content starts before its base offset"))?;
            entry.set_location(pointer, encoded.len() as u64);
            writer.write_all(&encoded)?;

            offset += encoded.len() as u64;
        }
        Ok(offset)
    }
}

/// Reserves header space, then fills it in once the content has been written
///
/// Positions handed out are relative to where the archive starts in the stream.
#[derive(Debug, Clone, Copy)]
pub struct TwoPassWriter {
    origin: u64,
    header_len: u64,
}

impl TwoPassWriter {
    /// Records the archive start and skips past `header_len` bytes
    pub fn begin<W: Write + Seek>(writer: &mut W, header_len: u64) -> Result<Self> {
        let origin = writer.stream_position()?;
        writer.seek(SeekFrom::Start(origin + header_len))?;
        Ok(TwoPassWriter { origin, header_len })
    }

    /// Offset of the first content byte from the start of the archive
    pub fn content_start(&self) -> u64 {
        self.header_len
    }

    /// Writes the serialized header into the reserved area and returns to the end of the archive
    pub fn write_header<W: Write + Seek>(self, writer: &mut W, header: &[u8]) -> Result<()> {
        if header.len() as u64 != self.header_len {
            return Err(Error::format(format!(
                "header is {} bytes but {} were reserved",
                header.len(),
                self.header_len
            )));
        }

        let end = writer.stream_position()?;
        writer.seek(SeekFrom::Start(self.origin))?;
        writer.write_all(header)?;
        writer.seek(SeekFrom::Start(end.max(self.origin + self.header_len)))?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::io::Cursor;

    use super::{ArchiveFileItem, FileSource, RepackPlan, TwoPassWriter};
    use crate::{
        error::Result,
        generator::ContentGenerator,
        tree::{test::TestEntry, ArchiveEntry},
    };

    fn items() -> Vec<ArchiveFileItem<TestEntry>> {
        vec![
            ArchiveFileItem::stored("b", TestEntry::new("one", 4)),
            ArchiveFileItem::new_file("", "two", FileSource::Memory(b"22".to_vec())),
            ArchiveFileItem::new_file("a", "three", FileSource::Memory(b"333".to_vec())),
            ArchiveFileItem::stored("b", TestEntry::new("four", 0)),
        ]
    }

    #[test]
    fn directories_keep_first_seen_order() -> Result<()> {
        let plan = RepackPlan::new(&items(), |item| Ok(TestEntry::new(&item.name, 99)))?;

        assert_eq!(plan.directories().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(
            plan.entries()
                .iter()
                .map(|e| (e.name.as_str(), e.directory))
                .collect::<Vec<_>>(),
            vec![("one", 0), ("two", -1), ("three", 1), ("four", 0)]
        );
        Ok(())
    }

    #[test]
    fn content_pointers_follow_write_order() -> Result<()> {
        let mut plan = RepackPlan::new(&items(), |item| Ok(TestEntry::new(&item.name, 0)))?;
        let mut generator = ContentGenerator::new();
        let contents: [&[u8]; 4] = [b"1", b"22", b"333", b"4444"];
        for (index, data) in contents.iter().enumerate() {
            generator.add_bytes(index, data.to_vec());
        }

        let mut output = Cursor::new(Vec::new());
        let pass = TwoPassWriter::begin(&mut output, 4)?;
        let end = plan.write_content(&mut generator, &mut output, pass.content_start(), 0, |b, _| Ok(b))?;
        pass.write_header(&mut output, b"HEAD")?;

        assert_eq!(end, 14);
        assert_eq!(output.into_inner(), b"HEAD1223334444".to_vec());
        assert_eq!(
            plan.entries().iter().map(|e| (e.pointer(), e.size())).collect::<Vec<_>>(),
            vec![(4, 1), (5, 2), (7, 3), (10, 4)]
        );
        Ok(())
    }

    #[test]
    fn header_size_must_match_reservation() -> Result<()> {
        let mut output = Cursor::new(Vec::new());
        let pass = TwoPassWriter::begin(&mut output, 4)?;
        assert!(pass.write_header(&mut output, b"TOO LONG").is_err());
        Ok(())
    }

    proptest! {
        #[test]
        fn written_ranges_are_disjoint_and_exact(
            files in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..16),
            header_len in 0u64..32,
        ) {
            let items = files
                .iter()
                .enumerate()
                .map(|(i, data)| ArchiveFileItem::new_file("", format!("f{i}"), FileSource::Memory(data.clone())))
                .collect::<Vec<ArchiveFileItem<TestEntry>>>();
            let mut plan = RepackPlan::new(&items, |item| Ok(TestEntry::new(&item.name, 0)))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let mut generator = ContentGenerator::new();
            for (index, data) in files.iter().enumerate() {
                generator.add_bytes(index, data.clone());
            }

            let mut output = Cursor::new(Vec::new());
            let pass = TwoPassWriter::begin(&mut output, header_len)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            plan.write_content(&mut generator, &mut output, pass.content_start(), 0, |b, _| Ok(b))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            pass.write_header(&mut output, &vec![0xAA; header_len as usize])
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let output = output.into_inner();
            let mut previous_end = header_len;
            for (entry, data) in plan.entries().iter().zip(&files) {
                let start = entry.pointer() as usize;
                let end = start + entry.size() as usize;
                prop_assert!(entry.pointer() >= previous_end);
                prop_assert_eq!(&output[start..end], data.as_slice());
                previous_end = end as u64;
            }
        }
    }
}
