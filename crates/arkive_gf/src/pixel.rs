//! Pixel formats a GF texture can be stored in and their conversion to and from RGBA.

use byteorder::{ByteOrder, LittleEndian};
use indexmap::IndexSet;
use std::fmt;

use crate::error::{ConversionError, Result};

/// Largest number of colors a paletted texture can index
pub const MAX_PALETTE_LEN: usize = 256;

/// An RGBA color
pub type Color = [u8; 4];

/// Layout of one stored pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelFormat {
    /// 24-bit blue, green, red
    Bgr888 = 0x01,
    /// 32-bit blue, green, red, alpha
    Bgra8888 = 0x02,
    /// 8-bit index into a BGR palette
    Palette8Bgr = 0x03,
    /// 8-bit index into a BGRA palette
    Palette8Bgra = 0x04,
    /// 8-bit luminance
    Gray8 = 0x05,
    /// 8-bit luminance followed by 8-bit alpha
    GrayAlpha88 = 0x06,
    /// 16-bit, 4 bits per channel, blue in the low bits
    Bgra4444 = 0x07,
    /// 16-bit, 5 bits blue, 6 bits green, 5 bits red
    Bgr565 = 0x08,
    /// 16-bit, 5 bits per color and a 1-bit alpha in the high bit
    Bgra1555 = 0x09,
}

impl TryFrom<u8> for PixelFormat {
    type Error = ConversionError;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        use PixelFormat::*;
        Ok(match value {
            0x01 => Bgr888,
            0x02 => Bgra8888,
            0x03 => Palette8Bgr,
            0x04 => Palette8Bgra,
            0x05 => Gray8,
            0x06 => GrayAlpha88,
            0x07 => Bgra4444,
            0x08 => Bgr565,
            0x09 => Bgra1555,
            other => return Err(ConversionError::UnsupportedPixelFormat(other)),
        })
    }
}

impl From<PixelFormat> for u8 {
    fn from(format: PixelFormat) -> u8 {
        format as u8
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PixelFormat {
    /// Number of stored bytes per pixel; paletted formats store one index byte
    pub fn bytes_per_pixel(self) -> usize {
        use PixelFormat::*;
        match self {
            Palette8Bgr | Palette8Bgra | Gray8 => 1,
            GrayAlpha88 | Bgra4444 | Bgr565 | Bgra1555 => 2,
            Bgr888 => 3,
            Bgra8888 => 4,
        }
    }

    /// Channel count recorded in the header for this format
    pub fn channels(self) -> u8 {
        use PixelFormat::*;
        match self {
            Gray8 => 1,
            GrayAlpha88 => 2,
            Bgr888 | Palette8Bgr | Bgr565 => 3,
            Bgra8888 | Palette8Bgra | Bgra4444 | Bgra1555 => 4,
        }
    }

    /// Whether pixels carry transparency
    pub fn has_alpha(self) -> bool {
        use PixelFormat::*;
        matches!(self, Bgra8888 | Palette8Bgra | GrayAlpha88 | Bgra4444 | Bgra1555)
    }

    /// Whether pixels are indices into a palette
    pub fn is_paletted(self) -> bool {
        matches!(self, PixelFormat::Palette8Bgr | PixelFormat::Palette8Bgra)
    }

    /// Stored size of one palette color
    pub fn palette_entry_len(self) -> usize {
        if self.has_alpha() {
            4
        } else {
            3
        }
    }

    /// Raw format name as shown to users
    pub fn name(self) -> &'static str {
        use PixelFormat::*;
        match self {
            Bgr888 => "BGR888",
            Bgra8888 => "BGRA8888",
            Palette8Bgr => "PALETTE8_BGR",
            Palette8Bgra => "PALETTE8_BGRA",
            Gray8 => "GRAY8",
            GrayAlpha88 => "GRAYALPHA88",
            Bgra4444 => "BGRA4444",
            Bgr565 => "BGR565",
            Bgra1555 => "BGRA1555",
        }
    }

    /// The closest format of the same family with or without an alpha channel
    pub fn with_transparency(self, transparent: bool) -> Self {
        use PixelFormat::*;
        match (self, transparent) {
            (Bgr888 | Bgra8888, true) => Bgra8888,
            (Bgr888 | Bgra8888, false) => Bgr888,
            (Palette8Bgr | Palette8Bgra, true) => Palette8Bgra,
            (Palette8Bgr | Palette8Bgra, false) => Palette8Bgr,
            (Gray8 | GrayAlpha88, true) => GrayAlpha88,
            (Gray8 | GrayAlpha88, false) => Gray8,
            (Bgr565, true) => Bgra1555,
            (Bgra4444 | Bgra1555, true) => self,
            (Bgr565 | Bgra4444 | Bgra1555, false) => Bgr565,
        }
    }

    /// Drops what this format can't store from a color
    fn normalize(self, [r, g, b, a]: Color) -> Color {
        if self.has_alpha() {
            [r, g, b, a]
        } else {
            [r, g, b, 0xFF]
        }
    }

    /// Expands stored pixels into RGBA
    pub fn decode(self, data: &[u8], palette: &[Color]) -> Result<Vec<u8>> {
        use PixelFormat::*;
        let mut rgba = Vec::with_capacity(data.len() / self.bytes_per_pixel() * 4);
        for px in data.chunks_exact(self.bytes_per_pixel()) {
            let color = match self {
                Bgr888 => [px[2], px[1], px[0], 0xFF],
                Bgra8888 => [px[2], px[1], px[0], px[3]],
                Palette8Bgr | Palette8Bgra => *palette.get(usize::from(px[0])).ok_or_else(|| {
                    ConversionError::Codec(format!(
                        "palette index {} out of range for {} colors",
                        px[0],
                        palette.len()
                    ))
                })?,
                Gray8 => [px[0], px[0], px[0], 0xFF],
                GrayAlpha88 => [px[0], px[0], px[0], px[1]],
                Bgra4444 => {
                    let v = LittleEndian::read_u16(px);
                    [expand4(v >> 8), expand4(v >> 4), expand4(v), expand4(v >> 12)]
                }
                Bgr565 => {
                    let v = LittleEndian::read_u16(px);
                    [expand5(v >> 11), expand6(v >> 5), expand5(v), 0xFF]
                }
                Bgra1555 => {
                    let v = LittleEndian::read_u16(px);
                    let alpha = if v & 0x8000 != 0 { 0xFF } else { 0x00 };
                    [expand5(v >> 10), expand5(v >> 5), expand5(v), alpha]
                }
            };
            rgba.extend_from_slice(&color);
        }
        Ok(rgba)
    }

    /// Packs RGBA pixels into this format
    ///
    /// Paletted formats look every color up in `palette`, which must come from [`build_palette`].
    pub fn encode(self, rgba: &[u8], palette: &IndexSet<Color>) -> Result<Vec<u8>> {
        use PixelFormat::*;
        let mut data = Vec::with_capacity(rgba.len() / 4 * self.bytes_per_pixel());
        for px in rgba.chunks_exact(4) {
            let [r, g, b, a] = [px[0], px[1], px[2], px[3]];
            match self {
                Bgr888 => data.extend_from_slice(&[b, g, r]),
                Bgra8888 => data.extend_from_slice(&[b, g, r, a]),
                Palette8Bgr | Palette8Bgra => {
                    let color = self.normalize([r, g, b, a]);
                    let index = palette.get_index_of(&color).ok_or_else(|| {
                        ConversionError::Codec(format!("color {color:02X?} missing from palette"))
                    })?;
                    // build_palette never yields more than MAX_PALETTE_LEN colors
                    data.push(index as u8);
                }
                Gray8 => data.push(luma(r, g, b)),
                GrayAlpha88 => data.extend_from_slice(&[luma(r, g, b), a]),
                Bgra4444 => push_u16(
                    &mut data,
                    u16::from(a >> 4) << 12 | u16::from(r >> 4) << 8 | u16::from(g >> 4) << 4 | u16::from(b >> 4),
                ),
                Bgr565 => push_u16(
                    &mut data,
                    u16::from(r >> 3) << 11 | u16::from(g >> 2) << 5 | u16::from(b >> 3),
                ),
                Bgra1555 => push_u16(
                    &mut data,
                    u16::from(a >= 0x80) << 15
                        | u16::from(r >> 3) << 10
                        | u16::from(g >> 3) << 5
                        | u16::from(b >> 3),
                ),
            }
        }
        Ok(data)
    }
}

/// Collects the distinct colors of every level, in first-seen order
pub fn build_palette<'a>(format: PixelFormat, levels: impl IntoIterator<Item = &'a [u8]>) -> Result<IndexSet<Color>> {
    let mut palette = IndexSet::new();
    for level in levels {
        for px in level.chunks_exact(4) {
            palette.insert(format.normalize([px[0], px[1], px[2], px[3]]));
        }
    }

    if palette.len() > MAX_PALETTE_LEN {
        return Err(ConversionError::PaletteOverflow(palette.len()).into());
    }
    Ok(palette)
}

fn push_u16(data: &mut Vec<u8>, value: u16) {
    let mut buf = [0u8; 2];
    LittleEndian::write_u16(&mut buf, value);
    data.extend_from_slice(&buf);
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114 + 500) / 1000) as u8
}

fn expand4(v: u16) -> u8 {
    ((v & 0x0F) * 17) as u8
}

fn expand5(v: u16) -> u8 {
    let v = v & 0x1F;
    ((v << 3) | (v >> 2)) as u8
}

fn expand6(v: u16) -> u8 {
    let v = v & 0x3F;
    ((v << 2) | (v >> 4)) as u8
}
