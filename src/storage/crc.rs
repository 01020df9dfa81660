//! CRC-32 (IEEE 802.3, reflected polynomial 0xEDB88320)

const POLY: u32 = 0xEDB8_8320;

/// Incremental CRC-32, fed in whatever chunks the codec produces
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32 {
    pub const fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u32::from(byte);
            for _ in 0..8 {
                if self.state & 1 != 0 {
                    self.state = (self.state >> 1) ^ POLY;
                } else {
                    self.state >>= 1;
                }
            }
        }
    }

    pub fn finish(&self) -> u32 {
        !self.state
    }
}

/// One-shot checksum of a byte slice
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn empty_input() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn single_zero_byte() {
        assert_eq!(crc32(&[0x00]), 0xD202_EF8D);
    }

    #[test]
    fn chunking_does_not_matter() {
        let mut crc = Crc32::new();
        crc.update(b"1234");
        crc.update(b"");
        crc.update(b"56789");
        assert_eq!(crc.finish(), 0xCBF4_3926);
    }
}
