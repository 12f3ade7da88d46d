//! Multihash digests over a registered algorithm table.
//!
//! A multihash string is a 4-hex-char algorithm prefix followed by the hex
//! digest, e.g. `1220` + 64 hex chars for SHA2-256.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Digest size in bytes for every registered algorithm.
pub const DIGEST_SIZE: usize = 32;

/// Length of the algorithm prefix in hex characters.
pub const PREFIX_LEN: usize = 4;

/// Registered hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Algorithm {
    /// SHA2-256, multihash code 0x12.
    #[default]
    Sha2_256,
    /// BLAKE3 with 256-bit output, multihash code 0x1e.
    Blake3,
}

impl Algorithm {
    /// Every registered algorithm.
    pub const ALL: [Algorithm; 2] = [Algorithm::Sha2_256, Algorithm::Blake3];

    /// Returns the string representation of the algorithm (for config files).
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha2_256 => "sha2-256",
            Algorithm::Blake3 => "blake3",
        }
    }

    /// Parse algorithm from its config name.
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|algo| algo.as_str() == s)
            .ok_or_else(|| Error::unsupported_algorithm(s))
    }

    /// Name used in the legacy `{type, value}` hash struct.
    pub fn legacy_name(&self) -> &'static str {
        match self {
            Algorithm::Sha2_256 => "SHA256",
            Algorithm::Blake3 => "BLAKE3",
        }
    }

    /// Parse algorithm from its legacy hash struct name.
    pub fn from_legacy_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|algo| algo.legacy_name() == name)
            .ok_or_else(|| Error::unsupported_algorithm(name))
    }

    /// The 4-hex-char multihash prefix (code byte + length byte).
    pub fn prefix(&self) -> &'static str {
        match self {
            Algorithm::Sha2_256 => "1220",
            Algorithm::Blake3 => "1e20",
        }
    }

    /// Look up a registered prefix.
    pub fn from_prefix(prefix: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|algo| algo.prefix() == prefix)
            .ok_or_else(|| Error::unsupported_algorithm(format!("prefix {}", prefix)))
    }

    /// Length of a full multihash string for this algorithm.
    pub fn multihash_len(&self) -> usize {
        PREFIX_LEN + DIGEST_SIZE * 2
    }

    /// Digest raw bytes.
    pub fn digest(&self, data: &[u8]) -> Multihash {
        let mut hasher = Hasher::new(*self);
        hasher.update(data);
        hasher.finalize()
    }

    /// Digest data from a reader.
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> Result<Multihash> {
        let mut hasher = Hasher::new(*self);
        std::io::copy(&mut reader, &mut hasher)?;
        Ok(hasher.finalize())
    }

    /// Digest a local file.
    pub fn digest_file(&self, path: &Path) -> Result<Multihash> {
        let file = std::fs::File::open(path)?;
        self.digest_reader(file)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest bytes with the default algorithm (SHA2-256).
pub fn digest(data: &[u8]) -> Multihash {
    Algorithm::default().digest(data)
}

/// Incremental hasher for any registered algorithm.
pub enum Hasher {
    Sha2_256(sha2::Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl Hasher {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha2_256 => Hasher::Sha2_256(sha2::Sha256::new()),
            Algorithm::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha2_256(h) => h.update(data),
            Hasher::Blake3(h) => {
                h.update(data);
            }
        }
    }

    pub fn finalize(self) -> Multihash {
        match self {
            Hasher::Sha2_256(h) => {
                let mut digest = [0u8; DIGEST_SIZE];
                digest.copy_from_slice(&h.finalize());
                Multihash {
                    algorithm: Algorithm::Sha2_256,
                    digest,
                }
            }
            Hasher::Blake3(h) => Multihash {
                algorithm: Algorithm::Blake3,
                digest: *h.finalize().as_bytes(),
            },
        }
    }
}

impl Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// An algorithm-tagged 32-byte digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Multihash {
    algorithm: Algorithm,
    digest: [u8; DIGEST_SIZE],
}

impl Multihash {
    /// Create a Multihash from raw digest bytes.
    pub fn from_digest(algorithm: Algorithm, digest: [u8; DIGEST_SIZE]) -> Self {
        Self { algorithm, digest }
    }

    /// Create a Multihash from an algorithm and a hex digest without prefix.
    pub fn from_hex_digest(algorithm: Algorithm, hex_str: &str) -> Result<Self> {
        if hex_str.len() != DIGEST_SIZE * 2 {
            return Err(Error::invalid_hash(format!(
                "Expected {} hex characters, got {}",
                DIGEST_SIZE * 2,
                hex_str.len()
            )));
        }

        let bytes =
            hex::decode(hex_str).map_err(|e| Error::invalid_hash(format!("Invalid hex: {}", e)))?;

        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&bytes);
        Ok(Self { algorithm, digest })
    }

    /// Parse a full multihash string (prefix + hex digest).
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() < PREFIX_LEN || !s.is_char_boundary(PREFIX_LEN) {
            return Err(Error::invalid_hash(format!("Multihash too short: {}", s)));
        }
        let (prefix, hex_str) = s.split_at(PREFIX_LEN);
        let algorithm = Algorithm::from_prefix(&prefix.to_ascii_lowercase())?;
        Self::from_hex_digest(algorithm, hex_str)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8; DIGEST_SIZE] {
        &self.digest
    }

    /// Hex digest without the algorithm prefix.
    pub fn hex_digest(&self) -> String {
        hex::encode(self.digest)
    }

    /// Full multihash string (prefix + lowercase hex digest).
    pub fn to_hex(&self) -> String {
        format!("{}{}", self.algorithm.prefix(), self.hex_digest())
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({})", self.to_hex())
    }
}

impl FromStr for Multihash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Multihash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Multihash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Multihash::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_empty_sha256() {
        let hash = digest(b"");
        assert_eq!(
            hash.to_hex(),
            "1220e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_hello_world_blake3() {
        let hash = Algorithm::Blake3.digest(b"hello world");
        assert_eq!(
            hash.to_hex(),
            "1e20d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn test_multihash_len() {
        let hash = digest(b"test");
        assert_eq!(hash.to_hex().len(), Algorithm::Sha2_256.multihash_len());
        assert_eq!(hash.hex_digest().len(), 64);
    }

    #[test]
    fn test_parse_roundtrip() {
        let original = Algorithm::Blake3.digest(b"test data");
        let parsed = Multihash::parse(&original.to_hex()).unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_parse_unregistered_prefix() {
        let s = format!("9999{}", "ab".repeat(32));
        assert!(matches!(
            Multihash::parse(&s),
            Err(Error::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Multihash::parse("").is_err());
        assert!(Multihash::parse("1220abcd").is_err());
        assert!(Multihash::parse(&format!("1220{}", "z".repeat(64))).is_err());
    }

    #[test]
    fn test_digest_reader_matches_bytes() {
        let data = b"streamed content".to_vec();
        let from_reader = Algorithm::Sha2_256.digest_reader(&data[..]).unwrap();
        assert_eq!(from_reader, digest(&data));
    }

    #[test]
    fn test_algorithm_conversions() {
        for algo in Algorithm::ALL {
            assert_eq!(Algorithm::parse(algo.as_str()).unwrap(), algo);
            assert_eq!(Algorithm::from_prefix(algo.prefix()).unwrap(), algo);
            assert_eq!(Algorithm::from_legacy_name(algo.legacy_name()).unwrap(), algo);
        }
        assert!(Algorithm::parse("md5").is_err());
        assert!(Algorithm::from_legacy_name("MD5").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let hash = digest(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: Multihash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    // Property-based tests
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Hashing the same data always produces the same multihash
        #[test]
        fn prop_digest_deterministic(data: Vec<u8>) {
            prop_assert_eq!(digest(&data), digest(&data));
            prop_assert_eq!(
                Algorithm::Blake3.digest(&data),
                Algorithm::Blake3.digest(&data)
            );
        }

        /// Every multihash string starts with its registered prefix
        #[test]
        fn prop_prefix_registered(bytes in prop::array::uniform32(any::<u8>())) {
            for algo in Algorithm::ALL {
                let hash = Multihash::from_digest(algo, bytes);
                let hex = hash.to_hex();
                prop_assert!(hex.starts_with(algo.prefix()));
                prop_assert_eq!(Multihash::parse(&hex)?, hash);
            }
        }

        /// Invalid digest length always fails
        #[test]
        fn prop_invalid_hex_length_fails(
            s in "[0-9a-f]{0,63}|[0-9a-f]{65,128}"
        ) {
            prop_assert!(Multihash::from_hex_digest(Algorithm::Sha2_256, &s).is_err());
        }
    }
}
