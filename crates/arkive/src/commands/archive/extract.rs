use arkive_core::{cancel::CancellationToken, manager::ArchiveDataManager};
use arkive_ipk::IpkOptions;
use clap::Args;
use miette::{miette, IntoDiagnostic, Result};
use std::{fs, path::PathBuf};
use tracing::{info, warn};

use super::{open, ArchiveTask, Format};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Archive format, detected from the extension when omitted
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// Allow extracting into a directory that isn't empty
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        if !self.overwrite && fs::read_dir(&self.directory).is_ok_and(|mut d| d.next().is_some()) {
            return Err(miette!(
                help = "pass --overwrite to extract anyway",
                "{} is not empty",
                self.directory.display()
            ));
        }
        fs::create_dir_all(&self.directory).into_diagnostic()?;

        Format::resolve(self.format, &self.file)?.run(self, IpkOptions::default())
    }
}

impl ArchiveTask for ExtractArgs {
    fn run<M: ArchiveDataManager>(&self, manager: M) -> Result<()> {
        let editor = open(manager, &self.file)?;
        info!("extracting {} into {}", self.file.display(), self.directory.display());

        let report = editor.extract_all(&self.directory, &CancellationToken::new())?;
        for (name, error) in &report.failed {
            warn!(file = %name, %error, "not extracted");
        }

        if !report.is_complete() {
            return Err(miette!("{} of {} files could not be extracted", report.failed.len(), editor.items().len()));
        }
        info!(files = report.succeeded.len(), "extracted archive");
        Ok(())
    }
}
