//! File type plugins: per content type detection, previews and conversion.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::PathBuf,
};

use tracing::{debug, info, warn};

use crate::{
    cancel::CancellationToken,
    error::{Error, Result},
    manager::ManagerInfo,
};

/// One line of human readable metadata shown next to a preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    /// What the value describes, e.g. `"Size"`
    pub label: &'static str,
    /// The formatted value
    pub value: String,
}

impl DisplayInfo {
    /// Pairs a label with anything displayable
    pub fn new(label: &'static str, value: impl ToString) -> Self {
        DisplayInfo {
            label,
            value: value.to_string(),
        }
    }
}

/// A decoded preview of a file
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    /// Width of `rgba` in pixels
    pub width: u32,
    /// Height of `rgba` in pixels
    pub height: u32,
    /// Row-major RGBA pixels
    pub rgba: Vec<u8>,
    /// Metadata about the full-size file
    pub info: Vec<DisplayInfo>,
}

/// Detects, previews and converts one type of file content
///
/// Several plugins can be registered at once; [`FileTypeRegistry`] picks one per file using the
/// capability queries.
pub trait FileTypePlugin: Send + Sync {
    /// Human readable name of the content type
    fn type_name(&self) -> &'static str;

    /// Whether files stored by this archive format can hold this content type
    fn is_supported(&self, manager: &dyn ManagerInfo) -> bool;

    /// Whether a file with this extension (lower case, no dot) is of this type
    fn is_of_type(&self, extension: &str) -> bool;

    /// Whether this plugin may be picked by looking at file content when the extension doesn't match
    fn sniffs_content(&self) -> bool {
        false
    }

    /// Whether the first bytes of a file look like this type
    fn is_of_content(&self, _header: &[u8]) -> bool {
        false
    }

    /// Extension of the native format, without the dot
    fn native_extension(&self) -> &'static str;

    /// Extensions that [`FileTypePlugin::convert_from`] accepts
    fn import_formats(&self) -> &'static [&'static str];

    /// Extensions that [`FileTypePlugin::convert_to`] produces
    fn export_formats(&self) -> &'static [&'static str];

    /// Decodes a preview `width` pixels wide (full size when `None`) along with display metadata
    fn load_thumbnail(&self, input: &mut dyn Read, width: Option<u32>) -> Result<Thumbnail>;

    /// Converts a native file into `output_format`
    fn convert_to(
        &self,
        input_format: &str,
        output_format: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()>;

    /// Converts a file of `input_format` into the native format
    ///
    /// `current` is the file currently stored in the slot being replaced; its format metadata is
    /// reused where possible.
    fn convert_from(
        &self,
        input_format: &str,
        output_format: &str,
        current: Option<&mut dyn Read>,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()>;
}

/// Lower case extension of a file name, without the dot
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// The set of plugins available to an application
#[derive(Default)]
pub struct FileTypeRegistry {
    plugins: Vec<Box<dyn FileTypePlugin>>,
}

impl FileTypeRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin; earlier registrations win ties
    pub fn register(&mut self, plugin: impl FileTypePlugin + 'static) -> &mut Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugin is registered
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Whether any plugin for `manager`'s format can be picked by content
    pub fn sniffs(&self, manager: &dyn ManagerInfo) -> bool {
        self.plugins
            .iter()
            .any(|p| p.is_supported(manager) && p.sniffs_content())
    }

    /// Picks the plugin for a file stored in `manager`'s format
    ///
    /// Matches by extension first. Only plugins that opt into sniffing are tried against `header`.
    pub fn find(
        &self,
        manager: &dyn ManagerInfo,
        file_name: &str,
        header: Option<&[u8]>,
    ) -> Option<&dyn FileTypePlugin> {
        let supported = move || self.plugins.iter().filter(move |p| p.is_supported(manager));

        if let Some(extension) = extension_of(file_name) {
            if let Some(plugin) = supported().find(|p| p.is_of_type(&extension)) {
                return Some(&**plugin);
            }
        }

        let header = header?;
        supported()
            .filter(|p| p.sniffs_content())
            .find(|p| p.is_of_content(header))
            .map(|p| &**p)
    }
}

/// Outcome of a multi-file operation that continues past per-file failures
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Names of the items that were processed
    pub succeeded: Vec<String>,
    /// Names of the items that failed, with the reason
    pub failed: Vec<(String, Error)>,
    /// Whether the batch stopped early because it was cancelled
    pub cancelled: bool,
}

impl BatchReport {
    /// Whether every item was processed
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Runs `operation` over every job, checking `cancel` between jobs
///
/// Per-file failures ([`Error::is_per_file`]) are logged and recorded; any other error stops
/// the batch and is returned.
pub fn run_batch<T>(
    jobs: impl IntoIterator<Item = (String, T)>,
    cancel: &CancellationToken,
    mut operation: impl FnMut(&str, T) -> Result<()>,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for (name, job) in jobs {
        if cancel.is_cancelled() {
            info!(remaining_from = %name, "batch cancelled");
            report.cancelled = true;
            break;
        }

        match operation(&name, job) {
            Ok(()) => report.succeeded.push(name),
            Err(error) if error.is_per_file() => {
                warn!(file = %name, %error, "skipping file");
                report.failed.push((name, error));
            }
            Err(error) => return Err(error),
        }
    }
    Ok(report)
}

/// Converts each `(source, destination)` pair with `plugin`
///
/// When `output_format` is the plugin's native extension the sources are imported with
/// [`FileTypePlugin::convert_from`], using each source's extension as the input format. Otherwise
/// native sources are exported with [`FileTypePlugin::convert_to`]. A destination is removed again
/// when its conversion fails.
pub fn convert_batch(
    plugin: &dyn FileTypePlugin,
    output_format: &str,
    jobs: impl IntoIterator<Item = (PathBuf, PathBuf)>,
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    let native = plugin.native_extension();
    let importing = output_format.eq_ignore_ascii_case(native);
    let jobs = jobs
        .into_iter()
        .map(|(source, destination)| (source.display().to_string(), (source, destination)));

    run_batch(jobs, cancel, |name, (source, destination)| {
        let mut input = match File::open(&source) {
            Ok(file) => BufReader::new(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::MissingFile(source)),
            Err(e) => return Err(e.into()),
        };
        let mut output = BufWriter::new(File::create(&destination)?);

        let result = if importing {
            let input_format = source
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(extension_of)
                .unwrap_or_default();
            plugin.convert_from(&input_format, native, None, &mut input, &mut output)
        } else {
            plugin.convert_to(native, output_format, &mut input, &mut output)
        }
        .and_then(|()| output.flush().map_err(Error::from));

        if result.is_err() {
            drop(output);
            if let Err(error) = fs::remove_file(&destination) {
                debug!(%error, "leaving partial output behind");
            }
        } else {
            debug!(file = name, to = %destination.display(), "converted");
        }
        result
    })
}
