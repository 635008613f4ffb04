//! GF textures as a [`FileTypePlugin`]: previews and PNG/JPEG/BMP conversion.

use arkive_core::{
    manager::ManagerInfo,
    plugin::{FileTypePlugin, Thumbnail},
};
use image::{imageops, imageops::FilterType, DynamicImage, ImageFormat};
use std::io::{Cursor, Read, Write};
use tracing::{debug, instrument, warn};

use crate::{
    error::{ConversionError, Error, Result},
    options::{ForcedFormat, GfImportOptions, TransparencyMode},
    pixel::PixelFormat,
    texture::{Texture, MAGIC},
};

/// Extension of GF files
pub const NATIVE_EXTENSION: &str = "gf";

const BITMAP_FORMATS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gf"];

fn bitmap_format(extension: &str) -> Result<ImageFormat> {
    match extension {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "bmp" => Ok(ImageFormat::Bmp),
        other => Err(ConversionError::UnsupportedFileFormat(other.to_string()).into()),
    }
}

fn codec(error: image::ImageError) -> Error {
    ConversionError::Codec(error.to_string()).into()
}

/// A malformed texture only fails the file it was read from
fn read_texture(input: &mut dyn Read) -> Result<Texture> {
    Texture::read(input).map_err(|error| match error {
        Error::Format(message) => ConversionError::Codec(message).into(),
        other => other,
    })
}

/// Converts GF textures to and from common bitmap formats
#[derive(Debug, Clone, Copy, Default)]
pub struct GfPlugin {
    options: GfImportOptions,
}

impl GfPlugin {
    pub fn new(options: GfImportOptions) -> Self {
        GfPlugin { options }
    }

    pub fn options(&self) -> &GfImportOptions {
        &self.options
    }

    /// Whether `image` needs alpha, `None` when its format doesn't say
    fn source_transparency(&self, image: &DynamicImage) -> Option<bool> {
        match (self.options.transparency, image) {
            (TransparencyMode::Preserve, _) => None,
            (TransparencyMode::UpdateBasedOnPixelFormat, DynamicImage::ImageRgba8(_)) => Some(true),
            (TransparencyMode::UpdateBasedOnUsage, DynamicImage::ImageRgba8(pixels)) => {
                Some(pixels.pixels().any(|p| p[3] != u8::MAX))
            }
            (_, DynamicImage::ImageRgb8(_)) => Some(false),
            _ => None,
        }
    }

    /// Builds the texture that replaces `current` with the content of `image`
    ///
    /// The stored format of `current` is kept unless the options force one or the transparency
    /// check decides otherwise. Textures with fewer than 3 channels always keep their format.
    pub fn import(&self, image: &DynamicImage, current: Option<&Texture>) -> Result<Texture> {
        let (current_format, channels, had_mipmaps) = current.map_or((PixelFormat::Bgra8888, 4, false), |t| {
            (t.format, t.channels, t.mipmap_count() > 0)
        });

        let format = match self.options.force_format {
            Some(ForcedFormat::Bgra8888) => PixelFormat::Bgra8888,
            Some(ForcedFormat::Bgr888) => PixelFormat::Bgr888,
            None if channels >= 3 => match self.source_transparency(image) {
                Some(transparent) => current_format.with_transparency(transparent),
                None => current_format,
            },
            None => current_format,
        };

        let rgba = image.to_rgba8();
        let mipmaps = self.options.generate_mipmaps && had_mipmaps;
        debug!(from = %current_format, to = %format, mipmaps, "importing bitmap");

        match Texture::from_image(&rgba, format, mipmaps) {
            Err(Error::Conversion(ConversionError::PaletteOverflow(colors))) => {
                let fallback = PixelFormat::Bgr888.with_transparency(format.has_alpha());
                warn!(colors, %format, %fallback, "too many colors for a palette");
                Texture::from_image(&rgba, fallback, mipmaps)
            }
            result => result,
        }
    }
}

impl FileTypePlugin for GfPlugin {
    fn type_name(&self) -> &'static str {
        "GF texture"
    }

    fn is_supported(&self, manager: &dyn ManagerInfo) -> bool {
        matches!(manager.id(), "cnt" | "dat")
    }

    fn is_of_type(&self, extension: &str) -> bool {
        extension.eq_ignore_ascii_case(NATIVE_EXTENSION)
    }

    fn sniffs_content(&self) -> bool {
        true
    }

    fn is_of_content(&self, header: &[u8]) -> bool {
        header.starts_with(&MAGIC)
    }

    fn native_extension(&self) -> &'static str {
        NATIVE_EXTENSION
    }

    fn import_formats(&self) -> &'static [&'static str] {
        BITMAP_FORMATS
    }

    fn export_formats(&self) -> &'static [&'static str] {
        BITMAP_FORMATS
    }

    fn load_thumbnail(&self, input: &mut dyn Read, width: Option<u32>) -> Result<Thumbnail> {
        let texture = read_texture(input)?;
        let info = texture.info();

        let Some(width) = width else {
            let image = texture.to_image(0)?;
            return Ok(Thumbnail {
                width: image.width(),
                height: image.height(),
                rgba: image.into_raw(),
                info,
            });
        };
        if width == 0 {
            return Err(ConversionError::InvalidDimensions { width, height: 0 }.into());
        }

        // The smallest level still at least as wide as the preview
        let level = (0..texture.levels.len())
            .rev()
            .find(|level| texture.dimensions(*level).0 >= width)
            .unwrap_or(0);
        let height = ((u64::from(texture.height) * u64::from(width) + u64::from(texture.width) / 2)
            / u64::from(texture.width))
        .clamp(1, u64::from(u32::MAX)) as u32;

        let source = texture.to_image(level)?;
        let image = if source.dimensions() == (width, height) {
            source
        } else {
            imageops::resize(&source, width, height, FilterType::Triangle)
        };

        Ok(Thumbnail {
            width,
            height,
            rgba: image.into_raw(),
            info,
        })
    }

    #[instrument(skip(self, input, output), err)]
    fn convert_to(
        &self,
        input_format: &str,
        output_format: &str,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        if !input_format.eq_ignore_ascii_case(NATIVE_EXTENSION) {
            return Err(ConversionError::UnsupportedFileFormat(input_format.to_string()).into());
        }
        let texture = read_texture(input)?;

        let output_format = output_format.to_ascii_lowercase();
        if output_format == NATIVE_EXTENSION {
            return texture.write(output);
        }
        let format = bitmap_format(&output_format)?;

        let base = DynamicImage::ImageRgba8(texture.to_image(0)?);
        let image = if format == ImageFormat::Jpeg || !texture.is_transparent() {
            DynamicImage::ImageRgb8(base.to_rgb8())
        } else {
            base
        };

        let mut encoded = Cursor::new(Vec::new());
        image.write_to(&mut encoded, format).map_err(codec)?;
        output.write_all(encoded.get_ref())?;
        Ok(())
    }

    #[instrument(skip(self, current, input, output), err)]
    fn convert_from(
        &self,
        input_format: &str,
        output_format: &str,
        current: Option<&mut dyn Read>,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        if !output_format.eq_ignore_ascii_case(NATIVE_EXTENSION) {
            return Err(ConversionError::UnsupportedFileFormat(output_format.to_string()).into());
        }

        let input_format = input_format.to_ascii_lowercase();
        if input_format == NATIVE_EXTENSION {
            return read_texture(input)?.write(output);
        }
        let format = bitmap_format(&input_format)?;

        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let image = image::load_from_memory_with_format(&bytes, format).map_err(codec)?;

        let current = current.map(read_texture).transpose()?;
        self.import(&image, current.as_ref())?.write(output)
    }
}
