//! Format agnostic in-memory representation of a loaded archive.

use indexmap::IndexMap;
use std::fmt::Debug;

use crate::{
    cipher::XorKey,
    error::{Error, FileNotFoundError, Result},
};

/// Directory index used by entries stored in the archive root
pub const ROOT_DIRECTORY_INDEX: i32 = -1;

/// Metadata every driver's file entry exposes to the engine
///
/// Entries describe where a file's bytes live; they never own the content itself.
pub trait ArchiveEntry: Clone + Debug + Send + Sync {
    /// File name without its directory
    fn name(&self) -> &str;

    /// Index into the archive's directory table, [`ROOT_DIRECTORY_INDEX`] for the root
    fn directory_index(&self) -> i32;

    /// Moves the entry to another directory table slot
    fn set_directory_index(&mut self, index: i32);

    /// Offset of the stored bytes, relative to [`DataBlock::base`]
    fn pointer(&self) -> u64;

    /// Number of stored (encoded) bytes
    fn size(&self) -> u64;

    /// Records where the stored bytes were written
    fn set_location(&mut self, pointer: u64, size: u64);

    /// The per-file XOR key, [`XorKey::NONE`] when the format has no encryption
    fn xor_key(&self) -> XorKey {
        XorKey::NONE
    }

    /// Clears the per-file XOR key
    fn reset_xor_key(&mut self) {}

    /// The per-file checksum as stored, 0 when the format has none
    fn checksum(&self) -> u32 {
        0
    }
}

/// The region of the source stream holding file content
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// Absolute stream position that entry pointers are relative to
    pub base: u64,
    /// Absolute position of the first content byte
    pub start: u64,
    /// Absolute position one past the last content byte
    pub end: u64,
}

impl DataBlock {
    /// Length of the content block in bytes
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Whether the content block holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Absolute position of an entry's bytes, checked against the block bounds
    pub fn locate(&self, entry: &impl ArchiveEntry) -> Result<u64> {
        let start = self.base.checked_add(entry.pointer());
        let end = start.and_then(|s| s.checked_add(entry.size()));
        match (start, end) {
            (Some(start), Some(end)) if start >= self.start && end <= self.end => Ok(start),
            _ => Err(Error::format(format!(
                "'{}' spans {:#X}+{:#X} which is outside the content block {:#X}..{:#X}",
                entry.name(),
                entry.pointer(),
                entry.size(),
                self.start,
                self.end
            ))),
        }
    }
}

/// A directory and the entries stored directly under it
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveDirectory<E> {
    /// Position in the directory table, [`ROOT_DIRECTORY_INDEX`] for the root
    pub index: i32,
    /// Path relative to the archive root as stored, empty for the root
    pub path: String,
    /// Entries whose directory index matches this directory
    pub files: Vec<E>,
}

impl<E> ArchiveDirectory<E> {
    /// Whether this is the archive root
    pub fn is_root(&self) -> bool {
        self.index == ROOT_DIRECTORY_INDEX
    }
}

/// A loaded archive: its directories, their entries, and the content block they point into
#[derive(Debug, Clone)]
pub struct ArchiveTree<E> {
    directories: Vec<ArchiveDirectory<E>>,
    data: DataBlock,
}

impl<E: ArchiveEntry> ArchiveTree<E> {
    /// Builds the tree from the flat tables stored by a container
    ///
    /// `directory_paths[i]` is directory `i`; every entry is placed under the directory its
    /// index names. Directory strings are never merged, even if they look the same.
    pub fn from_flat(directory_paths: Vec<String>, files: Vec<E>, data: DataBlock) -> Result<Self> {
        let mut directories = Vec::with_capacity(directory_paths.len() + 1);
        directories.push(ArchiveDirectory {
            index: ROOT_DIRECTORY_INDEX,
            path: String::new(),
            files: Vec::new(),
        });
        for (index, path) in directory_paths.into_iter().enumerate() {
            let index = i32::try_from(index)
                .map_err(|_| Error::format("directory table is too large"))?;
            directories.push(ArchiveDirectory {
                index,
                path,
                files: Vec::new(),
            });
        }

        for file in files {
            data.locate(&file)?;

            let slot = file.directory_index() + 1;
            let directory = usize::try_from(slot)
                .ok()
                .and_then(|slot| directories.get_mut(slot))
                .ok_or_else(|| {
                    Error::format(format!(
                        "'{}' refers to missing directory {}",
                        file.name(),
                        file.directory_index()
                    ))
                })?;
            directory.files.push(file);
        }

        Ok(ArchiveTree { directories, data })
    }

    /// An archive with an empty root and no content
    pub fn empty() -> Self {
        ArchiveTree {
            directories: vec![ArchiveDirectory {
                index: ROOT_DIRECTORY_INDEX,
                path: String::new(),
                files: Vec::new(),
            }],
            data: DataBlock::default(),
        }
    }

    /// All directories, root first, then in table order
    pub fn directories(&self) -> &[ArchiveDirectory<E>] {
        &self.directories
    }

    /// The archive root
    pub fn root(&self) -> &ArchiveDirectory<E> {
        &self.directories[0]
    }

    /// Look up a directory by its table index
    pub fn directory(&self, index: i32) -> Option<&ArchiveDirectory<E>> {
        usize::try_from(index + 1)
            .ok()
            .and_then(|slot| self.directories.get(slot))
    }

    /// The content block the entries point into
    pub fn data_block(&self) -> DataBlock {
        self.data
    }

    /// Number of file entries across all directories
    pub fn len(&self) -> usize {
        self.directories.iter().map(|d| d.files.len()).sum()
    }

    /// Whether the archive holds no files
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry paired with the directory holding it
    pub fn files(&self) -> impl Iterator<Item = (&ArchiveDirectory<E>, &E)> {
        self.directories
            .iter()
            .flat_map(|d| d.files.iter().map(move |f| (d, f)))
    }

    /// Find the first entry stored under `directory` with the given name
    pub fn find(&self, directory: &str, name: &str) -> Result<&E> {
        self.files()
            .find(|(d, f)| d.path == directory && f.name() == name)
            .map(|(_, f)| f)
            .ok_or_else(|| {
                Error::FileNotFound(FileNotFoundError::Name(join_path(directory, name, '/')))
            })
    }

    /// Builds a nested view by splitting directory paths on `separator`
    pub fn hierarchy(&self, separator: char) -> DirectoryNode {
        let mut root = DirectoryNode::default();
        for directory in &self.directories {
            let mut node = &mut root;
            for segment in directory.path.split(separator).filter(|s| !s.is_empty()) {
                let path = join_path(&node.path, segment, separator);
                node = node
                    .children
                    .entry(segment.to_owned())
                    .or_insert_with(|| DirectoryNode {
                        name: segment.to_owned(),
                        path,
                        ..Default::default()
                    });
            }
            node.directories.push(directory.index);
        }
        root
    }
}

/// A node of the nested directory view
///
/// Intermediate nodes that no stored directory names have an empty `directories` list. Two stored
/// directories with the same path both point at one node.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DirectoryNode {
    /// Last path segment, empty for the root
    pub name: String,
    /// Full path from the root using the archive's separator
    pub path: String,
    /// Directory table indices stored at exactly this path
    pub directories: Vec<i32>,
    /// Child nodes in first-seen order
    pub children: IndexMap<String, DirectoryNode>,
}

impl DirectoryNode {
    /// Walks to the node at `path`
    pub fn get(&self, path: &str, separator: char) -> Option<&DirectoryNode> {
        path.split(separator)
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, segment| node.children.get(segment))
    }
}

/// Joins a directory and a name with `separator`, leaving root names untouched
pub fn join_path(directory: &str, name: &str, separator: char) -> String {
    if directory.is_empty() {
        name.to_owned()
    } else {
        format!("{directory}{separator}{name}")
    }
}

#[cfg(test)]
pub(crate) mod test {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::{ArchiveEntry, ArchiveTree, DataBlock, ROOT_DIRECTORY_INDEX};
    use crate::error::{Error, Result};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct TestEntry {
        pub name: String,
        pub directory: i32,
        pub pointer: u64,
        pub size: u64,
    }

    impl TestEntry {
        pub(crate) fn new(name: &str, directory: i32) -> Self {
            TestEntry {
                name: name.into(),
                directory,
                pointer: 0,
                size: 0,
            }
        }
    }

    impl ArchiveEntry for TestEntry {
        fn name(&self) -> &str {
            &self.name
        }

        fn directory_index(&self) -> i32 {
            self.directory
        }

        fn set_directory_index(&mut self, index: i32) {
            self.directory = index;
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
    }

    #[test]
    fn files_land_in_declared_directories() -> Result<()> {
        let tree = ArchiveTree::from_flat(
            vec!["textures".into(), "sounds".into()],
            vec![
                TestEntry::new("a.gf", 0),
                TestEntry::new("root.txt", ROOT_DIRECTORY_INDEX),
                TestEntry::new("b.wav", 1),
            ],
            DataBlock::default(),
        )?;

        assert_eq!(tree.directories().len(), 3);
        assert_eq!(tree.root().files, vec![TestEntry::new("root.txt", -1)]);
        assert_eq!(tree.directory(0).map(|d| d.path.as_str()), Some("textures"));
        assert_eq!(tree.find("sounds", "b.wav")?.name, "b.wav");
        Ok(())
    }

    #[test]
    fn missing_directory_is_a_format_error() {
        let tree = ArchiveTree::from_flat(
            vec![],
            vec![TestEntry::new("a.gf", 3)],
            DataBlock::default(),
        );
        assert!(matches!(tree, Err(Error::Format(_))));
    }

    #[test]
    fn entry_outside_content_block_is_rejected() {
        let mut entry = TestEntry::new("a.gf", -1);
        entry.set_location(10, 20);
        let data = DataBlock {
            base: 0,
            start: 8,
            end: 16,
        };
        assert!(ArchiveTree::from_flat(vec![], vec![entry], data).is_err());
    }

    #[test]
    fn hierarchy_interns_intermediate_nodes_and_keeps_duplicates() -> Result<()> {
        let tree: ArchiveTree<TestEntry> = ArchiveTree::from_flat(
            vec![
                "world\\levels\\fix".into(),
                "world\\levels".into(),
                "world\\levels\\fix".into(),
            ],
            vec![],
            DataBlock::default(),
        )?;

        let root = tree.hierarchy('\\');
        assert_eq!(root.directories, vec![-1]);

        let world = root.get("world", '\\').ok_or(Error::CustomError("world".into()))?;
        assert!(world.directories.is_empty());

        let fix = root
            .get("world\\levels\\fix", '\\')
            .ok_or(Error::CustomError("fix".into()))?;
        assert_eq!(fix.path, "world\\levels\\fix");
        assert_eq!(fix.directories, vec![0, 2]);
        Ok(())
    }

    proptest! {
        #[test]
        fn every_file_is_placed_by_its_index(
            directory_count in 0usize..8,
            picks in prop::collection::vec(any::<prop::sample::Index>(), 0..32)
        ) {
            let paths = (0..directory_count).map(|i| format!("dir{i}")).collect::<Vec<_>>();
            let files = picks
                .iter()
                .enumerate()
                .map(|(i, pick)| TestEntry::new(&format!("f{i}"), pick.index(directory_count + 1) as i32 - 1))
                .collect::<Vec<_>>();

            let tree = ArchiveTree::from_flat(paths, files.clone(), DataBlock::default())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(tree.len(), files.len());
            for directory in tree.directories() {
                prop_assert!(directory.files.iter().all(|f| f.directory == directory.index));
            }
            let root_expected = files.iter().filter(|f| f.directory == ROOT_DIRECTORY_INDEX).count();
            prop_assert_eq!(tree.root().files.len(), root_expected);
        }
    }
}
