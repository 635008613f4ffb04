//! This library reads and writes **GF** textures and converts them to and from PNG, JPEG and BMP.
//!
//! # GF Texture Format
//!
//! A GF file is a fixed header, a palette for paletted formats, and one pixel buffer per mipmap
//! level. All integers are little-endian.
//!
//! ## Header
//!
//! | Offset (bytes) | Field         | Description                                                  |
//! |----------------|---------------|--------------------------------------------------------------|
//! | 0x0000         | Magic number  | 4 bytes: `GF\x00\x01`                                        |
//! | 0x0004         | Width         | 4 bytes                                                      |
//! | 0x0008         | Height        | 4 bytes                                                      |
//! | 0x000C         | Pixel Format  | 1 byte: see [`PixelFormat`]                                  |
//! | 0x000D         | Channels      | 1 byte: `1` to `4`                                           |
//! | 0x000E         | Mipmap Count  | 1 byte: levels stored after the base level                   |
//! | 0x000F         | Repeat Byte   | 1 byte: least frequent byte of the base level, used as fill  |
//!
//! ## Palette
//!
//! Paletted formats follow the header with a 2 byte color count and that many BGR (3 byte) or
//! BGRA (4 byte) colors.
//!
//! ## Levels
//!
//! The base level is `width * height * bytes_per_pixel` bytes. Each mipmap halves both dimensions,
//! rounding down, and never goes below 1.
//!
//! | Value  | Format          | Bytes per pixel |
//! |--------|-----------------|-----------------|
//! | `0x01` | BGR888          | 3               |
//! | `0x02` | BGRA8888        | 4               |
//! | `0x03` | Palette8 BGR    | 1               |
//! | `0x04` | Palette8 BGRA   | 1               |
//! | `0x05` | Gray8           | 1               |
//! | `0x06` | GrayAlpha88     | 2               |
//! | `0x07` | BGRA4444        | 2               |
//! | `0x08` | BGR565          | 2               |
//! | `0x09` | BGRA1555        | 2               |
//!
//! ## Additional Information
//!
//! - **File Extension**: `.gf`
//! - Any other pixel format byte fails with [`ConversionError::UnsupportedPixelFormat`].

pub mod error;
pub mod options;
pub mod pixel;
pub mod plugin;
pub mod texture;

pub use error::ConversionError;
pub use options::{ForcedFormat, GfImportOptions, TransparencyMode};
pub use pixel::PixelFormat;
pub use plugin::GfPlugin;
pub use texture::Texture;
