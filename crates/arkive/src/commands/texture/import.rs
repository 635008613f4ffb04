use arkive_core::plugin::{extension_of, FileTypePlugin};
use arkive_gf::{ForcedFormat, GfImportOptions, GfPlugin, TransparencyMode};
use clap::{Args, ValueEnum};
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::info;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ForceArg {
    Bgra8888,
    Bgr888,
}

impl From<ForceArg> for ForcedFormat {
    fn from(arg: ForceArg) -> Self {
        match arg {
            ForceArg::Bgra8888 => ForcedFormat::Bgra8888,
            ForceArg::Bgr888 => ForcedFormat::Bgr888,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum TransparencyArg {
    /// Keep the current texture's format
    Preserve,
    /// Transparent when the image has an alpha channel
    PixelFormat,
    /// Transparent when some pixel isn't fully opaque
    #[default]
    Usage,
}

impl From<TransparencyArg> for TransparencyMode {
    fn from(arg: TransparencyArg) -> Self {
        match arg {
            TransparencyArg::Preserve => TransparencyMode::Preserve,
            TransparencyArg::PixelFormat => TransparencyMode::UpdateBasedOnPixelFormat,
            TransparencyArg::Usage => TransparencyMode::UpdateBasedOnUsage,
        }
    }
}

#[derive(Args)]
pub struct ImportArgs {
    /// A PNG, JPEG or BMP image
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// The GF texture to write
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Texture whose format is reused, defaults to the output when it exists
    #[arg(long, value_name = "FILE")]
    current: Option<PathBuf>,

    /// Always store in this format
    #[arg(long, value_enum)]
    force_format: Option<ForceArg>,

    /// How to decide whether the texture needs alpha
    #[arg(long, value_enum, default_value_t)]
    transparency: TransparencyArg,

    /// Don't regenerate mipmaps
    #[arg(long, default_value_t = false)]
    no_mipmaps: bool,
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .into_diagnostic()
        .context(format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

impl ImportArgs {
    pub fn handle(&self) -> Result<()> {
        let plugin = GfPlugin::new(
            GfImportOptions::builder()
                .maybe_force_format(self.force_format.map(ForcedFormat::from))
                .transparency(self.transparency.into())
                .generate_mipmaps(!self.no_mipmaps)
                .build(),
        );

        let input_format = self
            .file
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(extension_of)
            .ok_or(miette!("can't tell the image format of {}", self.file.display()))?;

        let current = match &self.current {
            Some(path) => Some(path.as_path()),
            None => Some(self.output.as_path()).filter(|p| p.is_file()),
        };
        let mut current = current.map(open).transpose()?;
        let mut input = open(&self.file)?;

        let parent = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(parent).into_diagnostic()?;
        let mut writer = BufWriter::new(temp.as_file_mut());
        plugin
            .convert_from(
                &input_format,
                plugin.native_extension(),
                current.as_mut().map(|c| c as &mut dyn Read),
                &mut input,
                &mut writer,
            )
            .context(format!("converting {}", self.file.display()))?;
        writer.flush().into_diagnostic()?;
        drop(writer);
        drop(current);

        temp.persist(&self.output)
            .into_diagnostic()
            .context(format!("writing {}", self.output.display()))?;
        info!("imported {} into {}", self.file.display(), self.output.display());
        Ok(())
    }
}
