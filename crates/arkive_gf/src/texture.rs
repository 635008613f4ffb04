//! The GF texture: header, optional palette and one pixel buffer per mipmap level.

use arkive_core::plugin::DisplayInfo;
use binrw::{BinRead, BinWrite};
use byteorder::{LittleEndian, WriteBytesExt};
use image::{imageops, imageops::FilterType, RgbaImage};
use std::io::{Read, Write};
use tracing::{debug, instrument};

use crate::{
    error::{ConversionError, Error, Result},
    pixel::{build_palette, Color, PixelFormat},
};

/// File signature of every GF texture
pub const MAGIC: [u8; 4] = *b"GF\x00\x01";

/// Size of [`GfHeader`] on disk
pub const HEADER_LEN: usize = 16;

/// Fixed part of a GF file
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq)]
#[brw(little, magic = b"GF\x00\x01")]
pub struct GfHeader {
    pub width: u32,
    pub height: u32,
    /// Raw [`PixelFormat`] byte
    pub pixel_format: u8,
    pub channels: u8,
    /// Levels stored after the base level
    pub mipmap_count: u8,
    pub repeat_byte: u8,
}

/// Dimensions of mipmap `level` of a `width` x `height` texture
///
/// Each level halves the previous one, rounding down, and never drops below 1.
pub fn level_dimensions(width: u32, height: u32, level: u32) -> (u32, u32) {
    let halve = |v: u32| v.checked_shr(level).unwrap_or(0).max(1);
    (halve(width), halve(height))
}

/// Number of levels in a complete chain down to 1x1
pub fn full_chain_len(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// The least frequent byte of `data`, the lowest value on ties
pub fn repeat_byte(data: &[u8]) -> u8 {
    let mut counts = [0usize; 256];
    for byte in data {
        counts[usize::from(*byte)] += 1;
    }
    // `min_by_key` keeps the first minimum, which is the lowest byte value
    (0..=u8::MAX).min_by_key(|b| counts[usize::from(*b)]).unwrap_or(0)
}

/// A decoded GF file
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Channel count as stored, which older files don't always derive from the format
    pub channels: u8,
    pub repeat_byte: u8,
    /// RGBA colors, empty unless the format is paletted
    pub palette: Vec<Color>,
    /// Stored pixel buffers, base level first
    pub levels: Vec<Vec<u8>>,
}

fn read_section<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8], section: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::format(format!("texture {section} is truncated")),
        _ => e.into(),
    })
}

fn level_len(format: PixelFormat, (width, height): (u32, u32)) -> u64 {
    u64::from(width) * u64::from(height) * format.bytes_per_pixel() as u64
}

impl Texture {
    /// Number of levels after the base level
    pub fn mipmap_count(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Dimensions of one level
    pub fn dimensions(&self, level: usize) -> (u32, u32) {
        level_dimensions(self.width, self.height, level as u32)
    }

    /// Whether the stored format carries alpha
    pub fn is_transparent(&self) -> bool {
        self.format.has_alpha()
    }

    /// Parses a texture, validating the magic, pixel format and level sizes
    #[instrument(skip_all, err)]
    pub fn read<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut fixed = [0u8; HEADER_LEN];
        read_section(reader, &mut fixed, "header")?;
        let header = GfHeader::read(&mut std::io::Cursor::new(fixed)).map_err(Error::from_record)?;

        let format = PixelFormat::try_from(header.pixel_format)?;
        if header.width == 0 || header.height == 0 {
            return Err(ConversionError::InvalidDimensions {
                width: header.width,
                height: header.height,
            }
            .into());
        }
        if u32::from(header.mipmap_count) >= full_chain_len(header.width, header.height) {
            return Err(Error::format(format!(
                "{} mipmaps don't fit a {}x{} texture",
                header.mipmap_count, header.width, header.height
            )));
        }

        let palette = if format.is_paletted() {
            let mut len = [0u8; 2];
            read_section(reader, &mut len, "palette")?;
            (0..u16::from_le_bytes(len))
                .map(|_| {
                    let mut bgra = [0u8, 0, 0, 0xFF];
                    read_section(reader, &mut bgra[..format.palette_entry_len()], "palette")?;
                    Ok([bgra[2], bgra[1], bgra[0], bgra[3]])
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let levels = (0..=u32::from(header.mipmap_count))
            .map(|level| {
                let expected = level_len(format, level_dimensions(header.width, header.height, level));
                let mut data = Vec::new();
                (&mut *reader).take(expected).read_to_end(&mut data)?;
                if data.len() as u64 != expected {
                    return Err(Error::format(format!(
                        "mipmap {level} is truncated: {} of {expected} bytes",
                        data.len()
                    )));
                }
                Ok(data)
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(width = header.width, height = header.height, %format, levels = levels.len(), "read texture");
        Ok(Texture {
            width: header.width,
            height: header.height,
            format,
            channels: header.channels,
            repeat_byte: header.repeat_byte,
            palette,
            levels,
        })
    }

    /// Serializes the texture
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let mipmap_count = u8::try_from(self.mipmap_count())
            .map_err(|_| Error::format(format!("{} mipmaps can't be stored", self.mipmap_count())))?;

        let mut fixed = std::io::Cursor::new(Vec::with_capacity(HEADER_LEN));
        GfHeader {
            width: self.width,
            height: self.height,
            pixel_format: self.format.into(),
            channels: self.channels,
            mipmap_count,
            repeat_byte: self.repeat_byte,
        }
        .write(&mut fixed)?;
        writer.write_all(fixed.get_ref())?;

        if self.format.is_paletted() {
            let len = u16::try_from(self.palette.len())
                .map_err(|_| ConversionError::PaletteOverflow(self.palette.len()))?;
            writer.write_u16::<LittleEndian>(len)?;
            for [r, g, b, a] in &self.palette {
                writer.write_all(&[*b, *g, *r, *a][..self.format.palette_entry_len()])?;
            }
        }

        for level in &self.levels {
            writer.write_all(level)?;
        }
        Ok(())
    }

    /// Decodes one level into an RGBA image
    pub fn to_image(&self, level: usize) -> Result<RgbaImage> {
        let data = self
            .levels
            .get(level)
            .ok_or_else(|| Error::format(format!("texture has no mipmap level {level}")))?;
        let (width, height) = self.dimensions(level);
        let rgba = self.format.decode(data, &self.palette)?;
        RgbaImage::from_raw(width, height, rgba)
            .ok_or(ConversionError::InvalidDimensions { width, height }.into())
    }

    /// Encodes an image as a texture of `format`
    ///
    /// With `mipmaps` the full chain down to 1x1 is generated. Paletted formats resample mipmaps
    /// with nearest neighbour so that every level stays within the base level's colors.
    pub fn from_image(image: &RgbaImage, format: PixelFormat, mipmaps: bool) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions { width, height }.into());
        }

        let filter = if format.is_paletted() {
            FilterType::Nearest
        } else {
            FilterType::Triangle
        };
        let chain_len = if mipmaps { full_chain_len(width, height) } else { 1 };
        let images = (0..chain_len)
            .map(|level| match level {
                0 => image.clone(),
                _ => {
                    let (w, h) = level_dimensions(width, height, level);
                    imageops::resize(image, w, h, filter)
                }
            })
            .collect::<Vec<_>>();

        let palette = if format.is_paletted() {
            build_palette(format, images.iter().map(|i| i.as_raw().as_slice()))?
        } else {
            Default::default()
        };
        let levels = images
            .iter()
            .map(|i| format.encode(i.as_raw(), &palette))
            .collect::<Result<Vec<_>>>()?;

        Ok(Texture {
            width,
            height,
            format,
            channels: format.channels(),
            repeat_byte: repeat_byte(&levels[0]),
            palette: palette.into_iter().collect(),
            levels,
        })
    }

    /// Human readable metadata
    pub fn info(&self) -> Vec<DisplayInfo> {
        vec![
            DisplayInfo::new("Size", format!("{}x{}", self.width, self.height)),
            DisplayInfo::new("Format", self.format),
            DisplayInfo::new("Transparent", if self.is_transparent() { "yes" } else { "no" }),
            DisplayInfo::new("Mipmaps", self.mipmap_count()),
        ]
    }
}

#[cfg(test)]
mod test {
    use image::{Rgba, RgbaImage};
    use pretty_assertions::{assert_eq, assert_str_eq};
    use proptest::prelude::*;
    use std::io::Cursor;

    use super::{full_chain_len, level_dimensions, repeat_byte, Texture};
    use crate::{
        error::{ConversionError, Error, Result},
        pixel::PixelFormat,
    };

    #[test]
    fn write_paletted_texture() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            // Header
            0x47, 0x46, 0x00, 0x01,
            0x02, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            0x03,
            0x03,
            0x00,
            0x02,
            // Palette
            0x02, 0x00,
            0x00, 0x00, 0xFF,
            0xFF, 0x00, 0x00,
            // Base level
            0x00, 0x01,
        ];

        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([0xFF, 0x00, 0x00, 0xFF]));
        image.put_pixel(1, 0, Rgba([0x00, 0x00, 0xFF, 0xFF]));

        let texture = Texture::from_image(&image, PixelFormat::Palette8Bgr, false)?;
        let mut actual = Vec::new();
        texture.write(&mut actual)?;
        assert_str_eq!(format!("{:02X?}", actual), format!("{:02X?}", expected));

        let read = Texture::read(&mut Cursor::new(actual))?;
        assert_eq!(read, texture);
        assert_eq!(read.to_image(0)?, image);
        Ok(())
    }

    #[test]
    fn generated_mipmaps() -> Result<()> {
        let image = RgbaImage::from_fn(8, 4, |x, _| {
            if x % 2 == 0 {
                Rgba([0x10, 0x20, 0x30, 0xFF])
            } else {
                Rgba([0xF0, 0xE0, 0xD0, 0xFF])
            }
        });

        let paletted = Texture::from_image(&image, PixelFormat::Palette8Bgr, true)?;
        assert_eq!(paletted.mipmap_count(), 3);
        assert_eq!(paletted.palette.len(), 2);
        assert_eq!(paletted.levels.iter().map(Vec::len).collect::<Vec<_>>(), vec![32, 8, 2, 1]);

        let direct = Texture::from_image(&image, PixelFormat::Bgr565, true)?;
        assert_eq!(direct.levels.iter().map(Vec::len).collect::<Vec<_>>(), vec![64, 16, 4, 2]);
        assert_eq!(direct.to_image(3)?.dimensions(), (1, 1));
        Ok(())
    }

    #[test]
    fn read_rejects_bad_input() {
        #[rustfmt::skip]
        let header = |format: u8, mipmaps: u8| vec![
            0x47, 0x46, 0x00, 0x01,
            0x01, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00,
            format, 0x03, mipmaps, 0x00,
            0x10, 0x20, 0x30,
        ];

        assert!(Texture::read(&mut Cursor::new(header(0x01, 0))).is_ok());
        assert!(matches!(
            Texture::read(&mut Cursor::new(header(0x0A, 0))),
            Err(Error::Conversion(ConversionError::UnsupportedPixelFormat(0x0A)))
        ));
        assert!(matches!(Texture::read(&mut Cursor::new(header(0x01, 1))), Err(Error::Format(_))));
        assert!(matches!(Texture::read(&mut Cursor::new(header(0x02, 0))), Err(Error::Format(_))));

        let mut bad_magic = header(0x01, 0);
        bad_magic[0] = b'X';
        assert!(matches!(Texture::read(&mut Cursor::new(bad_magic)), Err(Error::Format(_))));
    }

    #[test]
    fn repeat_byte_is_least_frequent() {
        let all = (0..=255u8).chain([0, 1, 2]).collect::<Vec<_>>();
        assert_eq!(repeat_byte(&all), 3);
        assert_eq!(repeat_byte(&[0xFF; 8]), 0x00);
    }

    #[test]
    fn chain_length() {
        assert_eq!(full_chain_len(1, 1), 1);
        assert_eq!(full_chain_len(256, 64), 9);
        assert_eq!(full_chain_len(5, 3), 3);
        assert_eq!(level_dimensions(5, 3, 2), (1, 1));
    }

    proptest! {
        #[test]
        fn mipmap_chain_ends_at_one_pixel(width in 1u32..4096, height in 1u32..4096) {
            let len = full_chain_len(width, height);
            let mut previous = (width, height);
            prop_assert_eq!(level_dimensions(width, height, 0), previous);
            for level in 1..len {
                let (w, h) = level_dimensions(width, height, level);
                prop_assert!(w >= 1 && h >= 1);
                prop_assert_eq!((w, h), ((previous.0 / 2).max(1), (previous.1 / 2).max(1)));
                previous = (w, h);
            }
            prop_assert_eq!(previous, (1, 1));
        }
    }
}
