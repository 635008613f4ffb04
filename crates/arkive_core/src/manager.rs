//! The contract every container format driver implements.

use std::io::{Read, Seek, Write};

use crate::{
    error::Result,
    generator::ContentGenerator,
    repack::ArchiveFileItem,
    tree::{ArchiveEntry, ArchiveTree},
};

/// Format capabilities that can be queried without knowing the driver's concrete type
///
/// File type plugins use this to decide whether they can handle files from an archive.
pub trait ManagerInfo: Send + Sync {
    /// Short identifier of the container family, such as `"cnt"`
    fn id(&self) -> &'static str;

    /// Separator used by paths stored in this format
    fn path_separator(&self) -> char;

    /// Extension of archive files, without the dot
    fn archive_file_extension(&self) -> &'static str;

    /// File name suggested for newly created archives
    fn default_archive_file_name(&self) -> &'static str;
}

/// Reads, transforms and writes one family of archive containers
///
/// The opaque container (`Archive`) holds the format's header fields and entry table exactly as
/// loaded; the engine only reaches it through this trait.
pub trait ArchiveDataManager: ManagerInfo {
    /// Header fields and entry table of a loaded or created container
    type Archive: Send + Sync;

    /// One stored file's metadata
    type Entry: ArchiveEntry;

    /// Deserializes the header and entry table
    ///
    /// Fails with [`crate::error::Error::Format`] for bad magic or tables and
    /// [`crate::error::Error::UnsupportedVersion`] for versions the driver can't read.
    fn load_archive<R: Read + Seek>(&self, reader: &mut R) -> Result<Self::Archive>;

    /// Groups the entry table into directories and binds the content block
    fn load_archive_data<R: Read + Seek>(
        &self,
        archive: &Self::Archive,
        reader: &mut R,
    ) -> Result<ArchiveTree<Self::Entry>>;

    /// A fresh, empty container with encryption and checksums disabled
    fn create_archive(&self) -> Self::Archive;

    /// Builds the entry for a file that isn't stored in the archive yet
    fn create_entry(&self, item: &ArchiveFileItem<Self::Entry>) -> Result<Self::Entry>;

    /// Turns decoded file bytes into the bytes stored in the archive
    ///
    /// May update size related fields of `entry`; the engine records the final pointer and
    /// stored size afterwards.
    fn encode_file(&self, input: Vec<u8>, entry: &mut Self::Entry) -> Result<Vec<u8>>;

    /// Turns stored bytes back into the file's content
    fn decode_file(&self, input: Vec<u8>, entry: &Self::Entry) -> Result<Vec<u8>>;

    /// Rewrites the container from `files` into `writer`
    ///
    /// `generator` holds one producer per file, keyed by the file's position in `files`, and
    /// is dropped when this returns. `archive` has its checksum and XOR state reset as part of
    /// the write; it should be discarded or reloaded afterwards rather than written again.
    fn write_archive<W: Write + Seek>(
        &self,
        generator: ContentGenerator<'_>,
        archive: &mut Self::Archive,
        writer: &mut W,
        files: &[ArchiveFileItem<Self::Entry>],
    ) -> Result<()>;

    /// Reads a stored file's raw bytes and decodes them
    fn read_file<R: Read + Seek>(
        &self,
        tree: &ArchiveTree<Self::Entry>,
        entry: &Self::Entry,
        reader: &mut R,
    ) -> Result<Vec<u8>> {
        let position = tree.data_block().locate(entry)?;
        reader.seek(std::io::SeekFrom::Start(position))?;

        let mut raw = vec![0u8; entry.size() as usize];
        reader.read_exact(&mut raw)?;
        self.decode_file(raw, entry)
    }
}
