pub mod create;
pub mod extract;
pub mod list;
pub mod repack;

use arkive_cnt::CntManager;
use arkive_core::{
    editor::{ArchiveEditor, RepackSummary},
    manager::{ArchiveDataManager, ManagerInfo},
    repack::FileSource,
};
use arkive_dat::DatManager;
use arkive_ipk::{IpkManager, IpkOptions};
use clap::{Args, ValueEnum};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

#[derive(clap::Subcommand)]
pub enum ArchiveCommands {
    /// List the files of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into a new archive
    Create(create::CreateArgs),
    /// Rewrite an archive, optionally adding or removing files
    Repack(repack::RepackArgs),
}

impl ArchiveCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            ArchiveCommands::List(list) => list.handle(),
            ArchiveCommands::Extract(extract) => extract.handle(),
            ArchiveCommands::Create(create) => create.handle(),
            ArchiveCommands::Repack(repack) => repack.handle(),
        }
    }
}

/// Archive families understood by the tool
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Cnt,
    Ipk,
    Dat,
}

impl Format {
    fn extension(self) -> &'static str {
        match self {
            Format::Cnt => CntManager.archive_file_extension(),
            Format::Ipk => IpkManager::default().archive_file_extension(),
            Format::Dat => DatManager.archive_file_extension(),
        }
    }

    /// The explicit choice, or the format whose extension `path` carries
    pub fn resolve(explicit: Option<Format>, path: &Path) -> Result<Format> {
        if let Some(format) = explicit {
            return Ok(format);
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        Format::value_variants()
            .iter()
            .copied()
            .find(|f| extension.as_deref() == Some(f.extension()))
            .ok_or_else(|| {
                miette!(
                    help = "pass --format to choose one",
                    "can't tell the archive format of {}",
                    path.display()
                )
            })
    }

    /// Runs `task` with this format's driver
    pub fn run<T: ArchiveTask>(self, task: &T, ipk: IpkOptions) -> Result<()> {
        debug!(format = ?self, "selected driver");
        match self {
            Format::Cnt => task.run(CntManager),
            Format::Ipk => task.run(IpkManager::new(ipk)),
            Format::Dat => task.run(DatManager),
        }
    }
}

/// A command that works the same way for every driver
pub trait ArchiveTask {
    fn run<M: ArchiveDataManager>(&self, manager: M) -> Result<()>;
}

/// Settings for IPK bundles being written
#[derive(Args, Debug, Clone, Copy)]
pub struct IpkArgs {
    /// Compress files added to IPK bundles
    #[arg(long, default_value_t = false)]
    compress: bool,

    /// Version of newly created IPK bundles
    #[arg(long, default_value_t = 5)]
    ipk_version: u32,
}

impl From<IpkArgs> for IpkOptions {
    fn from(args: IpkArgs) -> Self {
        IpkOptions::builder()
            .version(args.ipk_version)
            .compress_new_files(args.compress)
            .build()
    }
}

pub(crate) fn open<M: ArchiveDataManager>(manager: M, path: &Path) -> Result<ArchiveEditor<M, BufReader<File>>> {
    let file = File::open(path)
        .into_diagnostic()
        .context(format!("opening {}", path.display()))?;
    Ok(ArchiveEditor::open(manager, BufReader::new(file))?)
}

/// Queues every file below `root`, stored under the same relative path
pub(crate) fn queue_directory<M, R>(editor: &mut ArchiveEditor<M, R>, root: &Path) -> Result<usize>
where
    M: ArchiveDataManager,
    R: Read + Seek + Send,
{
    let separator = editor.manager().path_separator().to_string();
    let mut queued = 0;

    for file in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
    {
        let relative = file.path().strip_prefix(root).into_diagnostic()?;
        let mut segments = relative
            .iter()
            .map(|s| {
                s.to_str()
                    .map(String::from)
                    .ok_or(miette!("unable to convert {} to a string", relative.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        let name = segments
            .pop()
            .ok_or(miette!("{} has no file name", file.path().display()))?;

        editor.add_file(
            segments.join(&separator),
            name,
            FileSource::Pending(file.path().to_path_buf()),
        );
        queued += 1;
    }
    Ok(queued)
}

/// Repacks `editor` into a temporary file beside `destination` and moves it into place on success
///
/// Without `overwrite` an existing `destination` is left alone and reported as an error.
pub(crate) fn write_archive<M, R>(
    editor: ArchiveEditor<M, R>,
    destination: &Path,
    overwrite: bool,
) -> Result<RepackSummary>
where
    M: ArchiveDataManager,
    R: Read + Seek + Send,
{
    if !overwrite && destination.exists() {
        return Err(miette!(
            help = "pass --overwrite to replace it",
            "{} already exists",
            destination.display()
        ));
    }

    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(parent)
        .into_diagnostic()
        .context(format!("creating a temporary file in {}", parent.display()))?;

    let mut writer = BufWriter::new(temp.as_file_mut());
    let summary = editor.repack(&mut writer)?;
    writer.flush().into_diagnostic()?;
    drop(writer);

    if overwrite {
        temp.persist(destination)
    } else {
        temp.persist_noclobber(destination)
    }
    .into_diagnostic()
    .context(format!("writing {}", destination.display()))?;
    Ok(summary)
}

/// Splits a stored path into its directory and file name
pub(crate) fn split_path(path: &str, separator: char) -> (&str, &str) {
    path.rsplit_once([separator, '/']).unwrap_or(("", path))
}
