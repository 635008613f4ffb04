//! Error types that can be emitted from the archive engine and its drivers

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// The container header or entry table is malformed
    #[error("invalid archive: {0}")]
    #[diagnostic(help("the file may be truncated or belong to a different archive format"))]
    Format(String),

    /// The container declares a version this driver can't read
    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u32),

    /// A checksum did not match the region it covers
    ///
    /// Reads never fail with this; it's logged as a warning so that archives produced by tools
    /// which disable checksums stay readable.
    #[error("checksum mismatch in {region}: expected {expected:#X}, found {actual:#X}")]
    ChecksumMismatch {
        /// Which part of the container the checksum covers
        region: String,
        /// The stored value
        expected: u32,
        /// The recomputed value
        actual: u32,
    },

    /// A file could not be converted between formats
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// A file queued for import no longer exists
    #[error("file to import no longer exists: {}", .0.display())]
    MissingFile(PathBuf),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// The content generator has no producer for the file at this position, or it was already used
    #[error("no content available for file {0}")]
    ContentUnavailable(usize),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

impl Error {
    /// Shorthand for a [`Error::Format`] error
    pub fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }

    /// Classifies a `binrw` failure while parsing a fixed layout record
    ///
    /// Stream failures stay [`Error::IOError`]; bad magic or field values mean the input isn't a
    /// valid container.
    pub fn from_record(error: binrw::Error) -> Self {
        match error {
            binrw::Error::Io(e) => Error::IOError(e),
            other => Error::Format(other.to_string()),
        }
    }

    /// Whether a batch operation may skip the file that caused this error and carry on
    pub fn is_per_file(&self) -> bool {
        matches!(self, Error::Conversion(_) | Error::MissingFile(_))
    }
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Failures while converting a single file's content
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The pixel format byte is not one the codec understands
    #[error("unsupported pixel format {0:#04X}")]
    UnsupportedPixelFormat(u8),

    /// Conversion to or from this file type isn't available
    #[error("unsupported file format '{0}'")]
    UnsupportedFileFormat(String),

    /// More colors than a palette can hold
    #[error("image uses {0} colors which doesn't fit in a 256 entry palette")]
    PaletteOverflow(usize),

    /// Width or height is zero or doesn't match the pixel data
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },

    /// The underlying image codec failed
    #[error("image codec error: {0}")]
    Codec(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
