use arkive_core::{cancel::CancellationToken, plugin::convert_batch};
use arkive_gf::GfPlugin;
use clap::{Args, ValueEnum};
use miette::{miette, IntoDiagnostic, Result};
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum BitmapFormat {
    Png,
    Jpg,
    Bmp,
}

impl BitmapFormat {
    fn extension(self) -> &'static str {
        match self {
            BitmapFormat::Png => "png",
            BitmapFormat::Jpg => "jpg",
            BitmapFormat::Bmp => "bmp",
        }
    }
}

#[derive(Args)]
pub struct ExportArgs {
    /// GF textures to convert
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = BitmapFormat::Png)]
    to: BitmapFormat,

    /// Directory for the converted images, next to each input when omitted
    #[arg(short, long, value_name = "DIR")]
    directory: Option<PathBuf>,
}

impl ExportArgs {
    pub fn handle(&self) -> Result<()> {
        if let Some(directory) = &self.directory {
            fs::create_dir_all(directory).into_diagnostic()?;
        }

        let extension = self.to.extension();
        let jobs = self.files.iter().map(|source| {
            let destination = match &self.directory {
                Some(directory) => directory.join(source.file_name().unwrap_or_default()),
                None => source.clone(),
            }
            .with_extension(extension);
            (source.clone(), destination)
        });

        let report = convert_batch(&GfPlugin::default(), extension, jobs, &CancellationToken::new())?;
        for (name, error) in &report.failed {
            warn!(file = %name, %error, "not converted");
        }

        if !report.is_complete() {
            return Err(miette!("{} of {} textures could not be converted", report.failed.len(), self.files.len()));
        }
        info!(files = report.succeeded.len(), "exported textures");
        Ok(())
    }
}
