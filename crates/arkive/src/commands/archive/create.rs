use arkive_core::{editor::ArchiveEditor, manager::ArchiveDataManager};
use clap::Args;
use miette::{miette, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use super::{queue_directory, write_archive, ArchiveTask, Format, IpkArgs};

#[derive(Args)]
pub struct CreateArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Archive format, detected from the extension when omitted
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    #[command(flatten)]
    ipk: IpkArgs,
}

impl CreateArgs {
    pub fn handle(&self) -> Result<()> {
        Format::resolve(self.format, &self.file)?.run(self, self.ipk.into())
    }
}

impl ArchiveTask for CreateArgs {
    fn run<M: ArchiveDataManager>(&self, manager: M) -> Result<()> {
        info!("creating {}", self.file.display());

        let mut editor = ArchiveEditor::create(manager);
        if queue_directory(&mut editor, &self.directory)? == 0 {
            return Err(miette!("directory is empty"));
        }

        let summary = write_archive(editor, &self.file, self.overwrite)?;
        for path in &summary.skipped {
            warn!("{} disappeared before it could be packed", path.display());
        }
        info!(files = summary.files, bytes = summary.bytes, "created archive");
        Ok(())
    }
}
