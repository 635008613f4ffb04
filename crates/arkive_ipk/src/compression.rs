//! Per-file zlib compression.

use flate2::{read::ZlibDecoder, write::ZlibEncoder, Compression};
use std::io::{Read, Write};
use tracing::instrument;

use crate::error::{Error, Result};

/// Compresses a whole file with zlib at the default level
#[instrument(skip_all, fields(size = data.len()), err)]
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflates a zlib stream that should produce exactly `expected` bytes
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn decompress(data: &[u8], expected: u64) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected.min(1 << 24) as usize);
    ZlibDecoder::new(data)
        .take(expected.saturating_add(1))
        .read_to_end(&mut output)
        .map_err(|e| Error::format(format!("corrupt compressed content: {e}")))?;

    if output.len() as u64 != expected {
        return Err(Error::format(format!(
            "compressed content inflates to {} bytes instead of {expected}",
            output.len()
        )));
    }
    Ok(output)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{compress, decompress};
    use crate::error::{Error, Result};

    #[rustfmt::skip]
    const HELLO_WORLD: [u8; 19] = [
        0x78, 0x9C, 0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x57, 0x08, 0xCF,
        0x2F, 0xCA, 0x49, 0x01, 0x00, 0x18, 0x0B, 0x04, 0x1D,
    ];

    #[test]
    fn inflate_known_stream() -> Result<()> {
        assert_eq!(decompress(&HELLO_WORLD, 11)?, b"Hello World".to_vec());
        Ok(())
    }

    #[test]
    fn size_mismatch_is_a_format_error() {
        assert!(matches!(decompress(&HELLO_WORLD, 5), Err(Error::Format(_))));
        assert!(matches!(decompress(&HELLO_WORLD, 20), Err(Error::Format(_))));
    }

    #[test]
    fn corrupt_stream_is_a_format_error() {
        let bad_block = [0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(matches!(decompress(&bad_block, 11), Err(Error::Format(_))));
        assert!(matches!(decompress(&HELLO_WORLD[..8], 11), Err(Error::Format(_))));
    }

    #[test]
    fn compress_then_inflate() -> Result<()> {
        let data = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".repeat(8);
        let packed = compress(&data)?;
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed, data.len() as u64)?, data);
        Ok(())
    }
}
