//! Deterministic 64-bit hashing.

/// MurmurHash3 x64-128 with seed 0, truncated to its first 64-bit half.
pub fn hash64(bytes: &[u8]) -> u64 {
    mur3::murmurhash3_x64_128(bytes, 0).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_values() {
        assert_eq!(hash64(b""), 0);
        assert_eq!(hash64(b"a"), 0x8555_5565_f659_7889);
        assert_eq!(hash64(b"hello"), 0xcbd8_a7b3_41bd_9b02);
        assert_eq!(
            hash64(b"The quick brown fox jumps over the lazy dog"),
            0xe34b_bc7b_bc07_1b6c
        );
    }

    #[test]
    fn test_distinct_inputs() {
        assert_ne!(hash64(b"a"), hash64(b"b"));
    }
}
