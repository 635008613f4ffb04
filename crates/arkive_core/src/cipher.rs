//! Per-file XOR cipher and the checksums stored alongside archive records.

/// A cyclic 4 byte XOR key
///
/// Byte `i` of a payload is combined with `key[i % 4]`. Applying the key twice restores the
/// original data, so encoding and decoding are the same operation. An all-zero key means the
/// payload isn't encrypted.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct XorKey(pub [u8; 4]);

impl XorKey {
    /// The key of an unencrypted file
    pub const NONE: XorKey = XorKey([0; 4]);

    /// Builds a key that repeats a single byte, as used by formats with 1 byte keys
    pub const fn repeat(byte: u8) -> Self {
        XorKey([byte; 4])
    }

    /// Whether applying this key leaves data unchanged
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    /// Applies the key in place from the start of the payload
    pub fn apply(&self, buf: &mut [u8]) {
        if self.is_zero() {
            return;
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte ^= self.0[i % 4];
        }
    }

    /// Returns an encoded (or decoded) copy of `input`
    pub fn transform(&self, input: &[u8]) -> Vec<u8> {
        let mut output = input.to_vec();
        self.apply(&mut output);
        output
    }
}

impl From<[u8; 4]> for XorKey {
    fn from(value: [u8; 4]) -> Self {
        XorKey(value)
    }
}

/// Wrapping sum of every byte, truncated to a byte
pub fn byte_sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Wrapping sum of every byte, kept as a 32 bit value
pub fn byte_sum_u32(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |acc, b| acc.wrapping_add(*b as u32))
}
