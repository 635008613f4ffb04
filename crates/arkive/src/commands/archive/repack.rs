use arkive_core::manager::ArchiveDataManager;
use clap::Args;
use miette::Result;
use std::path::PathBuf;
use tracing::info;

use super::{open, queue_directory, split_path, write_archive, ArchiveTask, Format, IpkArgs};

#[derive(Args)]
pub struct RepackArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Where to write the result, the input is replaced when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Archive format, detected from the extension when omitted
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Add or replace files from this directory, keeping their relative paths
    #[arg(long, value_name = "DIR")]
    add: Option<PathBuf>,

    /// Stored path of a file to leave out
    #[arg(long, value_name = "PATH")]
    remove: Vec<String>,

    #[command(flatten)]
    ipk: IpkArgs,
}

impl RepackArgs {
    pub fn handle(&self) -> Result<()> {
        Format::resolve(self.format, &self.file)?.run(self, self.ipk.into())
    }
}

impl ArchiveTask for RepackArgs {
    fn run<M: ArchiveDataManager>(&self, manager: M) -> Result<()> {
        let mut editor = open(manager, &self.file)?;
        let separator = editor.manager().path_separator();

        for path in &self.remove {
            let (directory, name) = split_path(path, separator);
            editor.remove_file(directory, name)?;
        }
        if let Some(directory) = &self.add {
            let queued = queue_directory(&mut editor, directory)?;
            info!(files = queued, "queued {}", directory.display());
        }

        let destination = self.output.as_deref().unwrap_or(&self.file);
        let summary = write_archive(editor, destination, true)?;
        info!(
            files = summary.files,
            skipped = summary.skipped.len(),
            bytes = summary.bytes,
            "repacked {}",
            destination.display()
        );
        Ok(())
    }
}
