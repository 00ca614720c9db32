//! Core types for scrypt-jane mining
//!
//! Block header, nonce and target types with explicit, endian-documented
//! accessors. Header fields are read at fixed byte offsets; nothing here
//! relies on struct layout or packing.

use crate::{Error, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// Mining target representing the difficulty threshold
///
/// Stored as eight 32-bit words in little-endian word order: word 7 is the
/// most significant. A hash meets the target when, read the same way, it is
/// numerically less than or equal to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    words: [u32; 8],
}

impl Target {
    /// Create a new target from eight words (word 7 most significant)
    pub fn new(words: [u32; 8]) -> Self {
        Self { words }
    }

    /// Create target from bytes (32 bytes, little-endian words)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::target(format!(
                "Invalid target length: expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let mut words = [0u32; 8];
        for word in &mut words {
            *word = cursor.read_u32::<LittleEndian>()?;
        }
        Ok(Self::new(words))
    }

    /// Convert target to bytes (32 bytes, little-endian words)
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for (i, word) in self.words.iter().enumerate() {
            LittleEndian::write_u32(&mut bytes[i * 4..(i + 1) * 4], *word);
        }
        bytes
    }

    /// Most significant word, used as the cheap pre-filter before a full
    /// 256-bit comparison
    pub fn htarg(&self) -> u32 {
        self.words[7]
    }

    /// Full 256-bit comparison: true when `hash <= target`
    ///
    /// Hash words are read little-endian, most significant word first.
    pub fn meets(&self, hash: &[u8; 32]) -> bool {
        for i in (0..8).rev() {
            let hash_word = LittleEndian::read_u32(&hash[i * 4..(i + 1) * 4]);
            if hash_word < self.words[i] {
                return true;
            } else if hash_word > self.words[i] {
                return false;
            }
        }
        true
    }

    /// How far below target the hash falls, as `target / hash`
    ///
    /// Reported back to the caller for share-difficulty accounting. Both
    /// values are approximated as f64; a (theoretical) all-zero hash yields
    /// infinity.
    pub fn ratio(&self, hash: &[u8; 32]) -> f64 {
        fn value(words: impl Iterator<Item = u32>) -> f64 {
            words
                .enumerate()
                .map(|(i, w)| w as f64 * 2f64.powi(32 * i as i32))
                .sum()
        }

        let target_value = value(self.words.iter().copied());
        let hash_value = value(
            hash.chunks_exact(4)
                .map(|c| LittleEndian::read_u32(c)),
        );
        if hash_value == 0.0 {
            f64::INFINITY
        } else {
            target_value / hash_value
        }
    }

    /// Maximum possible target (easiest difficulty)
    pub fn max() -> Self {
        Self::new([u32::MAX; 8])
    }

    /// Minimum possible target (hardest difficulty)
    pub fn min() -> Self {
        Self::new([0; 8])
    }

    /// Convert to hexadecimal string (big-endian for display)
    pub fn to_hex_be(&self) -> String {
        let mut s = String::with_capacity(64);
        for word in self.words.iter().rev() {
            s.push_str(&format!("{:08x}", word));
        }
        s
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 64 {
            return Err(Error::target(format!(
                "Invalid target hex length: expected 64 chars, got {}",
                s.len()
            )));
        }

        // Parse as big-endian hex string
        let mut words = [0u32; 8];
        for i in 0..8 {
            let start = i * 8;
            words[7 - i] = u32::from_str_radix(&s[start..start + 8], 16)
                .map_err(|e| Error::target(format!("Invalid hex in target: {}", e)))?;
        }
        Ok(Self::new(words))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_be())
    }
}

impl Serialize for Target {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex_be())
    }
}

impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Target::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Proof-of-work nonce (4 bytes, big-endian on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nonce(pub u32);

impl Nonce {
    /// Create a new nonce
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the nonce value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Convert to wire bytes (big-endian)
    pub fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Create from wire bytes (big-endian)
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    /// Nonce offset by `lanes`, wrapping
    pub fn offset(&self, lanes: u32) -> Self {
        Self(self.0.wrapping_add(lanes))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Candidate block header under search
///
/// Legacy headers (version < 7) are 80 bytes with a 4-byte big-endian
/// timestamp at offset 68; post-fork headers are 84 bytes with an 8-byte
/// timestamp in the same place. Both end in a 4-byte big-endian nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    bytes: Vec<u8>,
    version: u32,
}

impl Work {
    /// Legacy header size in bytes (version < 7)
    pub const LEGACY_SIZE: usize = 80;
    /// Post-fork header size in bytes (version >= 7)
    pub const EXTENDED_SIZE: usize = 84;
    /// Byte offset of the timestamp field
    pub const TIMESTAMP_OFFSET: usize = 68;

    /// Header size for a given block version
    pub fn header_size(version: u32) -> usize {
        if version < 7 {
            Self::LEGACY_SIZE
        } else {
            Self::EXTENDED_SIZE
        }
    }

    /// Create new work from header bytes and a block version
    pub fn new(bytes: Vec<u8>, version: u32) -> Result<Self> {
        let expected = Self::header_size(version);
        if bytes.len() != expected {
            return Err(Error::work(format!(
                "Invalid header size for version {}: expected {} bytes, got {}",
                version,
                expected,
                bytes.len()
            )));
        }
        Ok(Self { bytes, version })
    }

    /// Block version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// True for headers that embed the legacy 4-byte timestamp and take
    /// their N-factor from the difficulty schedule
    pub fn is_legacy(&self) -> bool {
        self.version < 7
    }

    /// Header bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Block timestamp (big-endian u32 at offset 68, legacy headers)
    pub fn timestamp(&self) -> u32 {
        BigEndian::read_u32(&self.bytes[Self::TIMESTAMP_OFFSET..Self::TIMESTAMP_OFFSET + 4])
    }

    /// Byte offset of the nonce field (last 4 bytes)
    pub fn nonce_offset(&self) -> usize {
        self.bytes.len() - 4
    }

    /// Current nonce (big-endian, last 4 bytes)
    pub fn nonce(&self) -> Nonce {
        let off = self.nonce_offset();
        Nonce(BigEndian::read_u32(&self.bytes[off..]))
    }

    /// Overwrite the nonce field (big-endian, last 4 bytes)
    pub fn inject_nonce(&mut self, nonce: Nonce) {
        let off = self.nonce_offset();
        self.bytes[off..].copy_from_slice(&nonce.to_be_bytes());
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Work {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Work", 2)?;
        s.serialize_field("header", &self.to_hex())?;
        s.serialize_field("version", &self.version)?;
        s.end()
    }
}
