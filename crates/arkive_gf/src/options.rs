//! How imported bitmaps pick their stored pixel format.

use bon::Builder;

/// A pixel format every import is forced into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedFormat {
    /// 32-bit with alpha
    Bgra8888,
    /// 24-bit without alpha
    Bgr888,
}

/// How an import decides whether the stored format needs alpha
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransparencyMode {
    /// Keep the pixel format of the texture being replaced
    Preserve,
    /// Any source with an alpha channel is transparent
    UpdateBasedOnPixelFormat,
    /// A source is transparent only when some pixel isn't fully opaque
    #[default]
    UpdateBasedOnUsage,
}

/// Settings for [`crate::GfPlugin`] imports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct GfImportOptions {
    /// Overrides the format choice entirely
    pub force_format: Option<ForcedFormat>,

    #[builder(default)]
    pub transparency: TransparencyMode,

    /// Regenerate the full mipmap chain when the replaced texture had mipmaps
    #[builder(default = true)]
    pub generate_mipmaps: bool,
}

impl Default for GfImportOptions {
    fn default() -> Self {
        GfImportOptions::builder().build()
    }
}
