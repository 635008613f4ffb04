//! An editing session over one archive.

use parking_lot::Mutex;
use std::{
    fs,
    io::{self, Cursor, Read, Seek, Write},
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    cancel::CancellationToken,
    error::{Error, FileNotFoundError, Result},
    generator::ContentGenerator,
    manager::ArchiveDataManager,
    plugin::{run_batch, BatchReport, FileTypeRegistry, Thumbnail},
    repack::{ArchiveFileItem, FileSource},
    tree::{join_path, ArchiveTree},
};

/// What a repack wrote
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RepackSummary {
    /// Number of files in the new archive
    pub files: usize,
    /// Import paths that had disappeared and were left out
    pub skipped: Vec<PathBuf>,
    /// Size of the new archive in bytes
    pub bytes: u64,
}

/// A loaded archive plus the changes queued against it
///
/// Reads go through a lock on the source stream, so an editor can be shared between threads. Put it
/// behind a `parking_lot::RwLock`: previews and extraction only need the read lock, while queuing
/// changes and repacking need the write lock, which keeps structural changes exclusive.
///
/// [`ArchiveEditor::repack`] consumes the editor; reopen the written archive to keep editing.
pub struct ArchiveEditor<M: ArchiveDataManager, R> {
    manager: M,
    archive: M::Archive,
    tree: ArchiveTree<M::Entry>,
    source: Mutex<R>,
    items: Vec<ArchiveFileItem<M::Entry>>,
}

impl<M: ArchiveDataManager> ArchiveEditor<M, Cursor<Vec<u8>>> {
    /// Starts a new, empty archive
    pub fn create(manager: M) -> Self {
        let archive = manager.create_archive();
        ArchiveEditor {
            manager,
            archive,
            tree: ArchiveTree::empty(),
            source: Mutex::new(Cursor::new(Vec::new())),
            items: Vec::new(),
        }
    }
}

impl<M: ArchiveDataManager, R: Read + Seek + Send> ArchiveEditor<M, R> {
    /// Loads the archive stored in `reader`
    #[instrument(skip_all, fields(format = manager.id()), err)]
    pub fn open(manager: M, mut reader: R) -> Result<Self> {
        let archive = manager.load_archive(&mut reader)?;
        let tree = manager.load_archive_data(&archive, &mut reader)?;
        let items = tree.to_items();
        info!(
            directories = tree.directories().len() - 1,
            files = items.len(),
            "opened archive"
        );

        Ok(ArchiveEditor {
            manager,
            archive,
            tree,
            source: Mutex::new(reader),
            items,
        })
    }

    /// The driver handling this archive
    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// The container as loaded or created
    pub fn archive(&self) -> &M::Archive {
        &self.archive
    }

    /// The archive as it was loaded, without queued changes
    pub fn tree(&self) -> &ArchiveTree<M::Entry> {
        &self.tree
    }

    /// The files the archive will contain after a repack
    pub fn items(&self) -> &[ArchiveFileItem<M::Entry>] {
        &self.items
    }

    /// Full path of an item using the format's separator
    pub fn item_path(&self, item: &ArchiveFileItem<M::Entry>) -> String {
        join_path(&item.directory, &item.name, self.manager.path_separator())
    }

    fn position(&self, directory: &str, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.directory == directory && i.name == name)
    }

    fn not_found(&self, directory: &str, name: &str) -> Error {
        Error::FileNotFound(FileNotFoundError::Name(join_path(
            directory,
            name,
            self.manager.path_separator(),
        )))
    }

    /// Reads the current content of a file
    pub fn read_file(&self, directory: &str, name: &str) -> Result<Vec<u8>> {
        let index = self
            .position(directory, name)
            .ok_or_else(|| self.not_found(directory, name))?;
        self.read_item(&self.items[index])
    }

    fn read_item(&self, item: &ArchiveFileItem<M::Entry>) -> Result<Vec<u8>> {
        match &item.source {
            FileSource::Archive => {
                let entry = item
                    .entry
                    .as_ref()
                    .ok_or_else(|| self.not_found(&item.directory, &item.name))?;
                let mut reader = self.source.lock();
                self.manager.read_file(&self.tree, entry, &mut *reader)
            }
            FileSource::Pending(path) => read_pending(path),
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }

    /// Adds a file, or replaces the content of an existing one
    ///
    /// A replaced file keeps its entry so format specific settings carry over.
    pub fn add_file(&mut self, directory: impl Into<String>, name: impl Into<String>, source: FileSource) {
        let directory = directory.into();
        let name = name.into();
        match self.position(&directory, &name) {
            Some(index) => {
                debug!(%directory, %name, "replacing file");
                self.items[index].source = source;
            }
            None => {
                debug!(%directory, %name, "adding file");
                self.items
                    .push(ArchiveFileItem::new_file(directory, name, source));
            }
        }
    }

    /// Removes a file, returning the item that described it
    pub fn remove_file(&mut self, directory: &str, name: &str) -> Result<ArchiveFileItem<M::Entry>> {
        let index = self
            .position(directory, name)
            .ok_or_else(|| self.not_found(directory, name))?;
        debug!(%directory, %name, "removing file");
        Ok(self.items.remove(index))
    }

    /// Writes every file below `destination`, mirroring the archive's directories
    ///
    /// Stops between files when `cancel` is triggered.
    #[instrument(skip(self, cancel), err)]
    pub fn extract_all(&self, destination: &Path, cancel: &CancellationToken) -> Result<BatchReport> {
        let separator = self.manager.path_separator();
        let jobs = self.items.iter().map(|item| (self.item_path(item), item));

        run_batch(jobs, cancel, |path, item| {
            let target = destination.join(safe_relative_path(path, separator)?);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let bytes = self.read_item(item)?;
            debug!(file = %target.display(), size = bytes.len(), "extracting");
            fs::write(&target, bytes)?;
            Ok(())
        })
    }

    /// Decodes previews for every file a registered plugin understands
    ///
    /// Files are matched by extension, then by content when a plugin sniffs. Files without a
    /// matching plugin are left out. Decoding failures are reported per file.
    pub fn thumbnails(
        &self,
        registry: &FileTypeRegistry,
        width: Option<u32>,
        cancel: &CancellationToken,
        mut on_thumbnail: impl FnMut(&ArchiveFileItem<M::Entry>, Thumbnail),
    ) -> Result<BatchReport> {
        let sniffing = registry.sniffs(&self.manager);
        let jobs = self.items.iter().filter_map(|item| {
            if registry.find(&self.manager, &item.name, None).is_some() {
                return Some((self.item_path(item), (item, None)));
            }
            if !sniffing {
                return None;
            }
            match self.read_item(item) {
                Ok(bytes) => registry
                    .find(&self.manager, &item.name, Some(bytes.as_slice()))
                    .is_some()
                    .then(|| (self.item_path(item), (item, Some(Ok(bytes))))),
                Err(error) => Some((self.item_path(item), (item, Some(Err(error))))),
            }
        });

        run_batch(jobs, cancel, |_, (item, content)| {
            let bytes = match content {
                Some(content) => content?,
                None => self.read_item(item)?,
            };
            let Some(plugin) = registry.find(&self.manager, &item.name, Some(bytes.as_slice())) else {
                return Ok(());
            };
            let thumbnail = plugin.load_thumbnail(&mut bytes.as_slice(), width)?;
            on_thumbnail(item, thumbnail);
            Ok(())
        })
    }

    /// Writes the archive with all queued changes to `writer`
    ///
    /// Files queued from disk that no longer exist are skipped with a warning. Any other failure
    /// aborts the write, leaving `writer` with partial content.
    #[instrument(skip_all, fields(format = self.manager.id()), err)]
    pub fn repack<W: Write + Seek>(mut self, writer: &mut W) -> Result<RepackSummary> {
        let start = writer.stream_position()?;

        let mut skipped = Vec::new();
        let mut items = std::mem::take(&mut self.items);
        items.retain(|item| match &item.source {
            FileSource::Pending(path) if !path.is_file() => {
                warn!(error = %Error::MissingFile(path.clone()), "skipping file");
                skipped.push(path.clone());
                false
            }
            _ => true,
        });

        let manager = &self.manager;
        let tree = &self.tree;
        let source = &self.source;

        let mut generator = ContentGenerator::new();
        for (index, item) in items.iter_mut().enumerate() {
            match &mut item.source {
                FileSource::Archive => {
                    let entry = item.entry.clone().ok_or_else(|| {
                        Error::format(format!("stored file '{}' has no entry", item.name))
                    })?;
                    generator.add(index, move || {
                        let mut reader = source.lock();
                        manager.read_file(tree, &entry, &mut *reader)
                    });
                }
                FileSource::Pending(path) => {
                    let path = path.clone();
                    generator.add(index, move || read_pending(&path));
                }
                FileSource::Memory(bytes) => generator.add_bytes(index, std::mem::take(bytes)),
            }
        }

        manager.write_archive(generator, &mut self.archive, writer, &items)?;

        let end = writer.stream_position()?;
        let summary = RepackSummary {
            files: items.len(),
            skipped,
            bytes: end.saturating_sub(start),
        };
        info!(files = summary.files, bytes = summary.bytes, "repacked archive");
        Ok(summary)
    }
}

fn read_pending(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::MissingFile(path.to_path_buf()),
        _ => Error::IOError(e),
    })
}

/// Turns a stored archive path into a relative path that can't leave the extraction directory
pub fn safe_relative_path(path: &str, separator: char) -> Result<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in path.split([separator, '/']).filter(|s| !s.is_empty()) {
        match Path::new(segment).components().next() {
            Some(Component::Normal(_)) if Path::new(segment).components().count() == 1 => {
                relative.push(segment)
            }
            Some(Component::CurDir) => {}
            _ => {
                return Err(Error::format(format!(
                    "refusing to extract '{path}' outside the target directory"
                )))
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(Error::format(format!("'{path}' has no file name")));
    }
    Ok(relative)
}
