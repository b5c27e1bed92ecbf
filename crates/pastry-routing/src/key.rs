//! Fixed-length identifiers for the overlay key space

use crate::error::{Result, RoutingError};
use blake2::digest::{Update, VariableOutput};
use blake2::Blake2bVar;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Largest identifier BLAKE2b can produce in one pass
pub const MAX_DERIVED_LEN: usize = 64;

/// An identifier in the overlay key space.
///
/// Each byte is one digit of a 256-ary trie. All keys stored in one table
/// share the same length; the containers enforce that, not `Key` itself.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key(Vec<u8>);

impl Key {
    /// Create a key from raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Key(bytes.into())
    }

    /// Derive a `len`-byte key from arbitrary data with BLAKE2b
    pub fn derive(data: &[u8], len: usize) -> Result<Self> {
        if len == 0 || len > MAX_DERIVED_LEN {
            return Err(RoutingError::KeyDerivation(format!(
                "length {} outside 1..={}",
                len, MAX_DERIVED_LEN
            )));
        }

        let mut hasher =
            Blake2bVar::new(len).map_err(|e| RoutingError::KeyDerivation(e.to_string()))?;
        hasher.update(data);

        let mut out = vec![0u8; len];
        hasher
            .finalize_variable(&mut out)
            .map_err(|e| RoutingError::KeyDerivation(e.to_string()))?;
        Ok(Key(out))
    }

    /// Get the bytes of this key
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of digits (bytes)
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if key is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Consume the key, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Zero-pad `key` on the right up to `len` bytes.
///
/// Keys already `len` bytes long are returned unchanged; longer keys are
/// rejected since they cannot belong to the key space.
pub fn pad_key(key: &[u8], len: usize) -> Result<Vec<u8>> {
    if key.len() > len {
        return Err(RoutingError::KeyTooLong {
            key: Key::from(key),
            max: len,
        });
    }
    let mut padded = Vec::with_capacity(len);
    padded.extend_from_slice(key);
    padded.resize(len, 0);
    Ok(padded)
}

/// XOR distance between two equal-length keys.
///
/// Read as a big-endian unsigned integer, so comparing two distances
/// byte-wise gives the numeric order.
pub fn xor_distance(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b.iter()).map(|(x, y)| x ^ y).collect()
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.to_hex())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Key(bytes)
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Key(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Key {
    fn from(bytes: &[u8; N]) -> Self {
        Key(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for Key {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_key() {
        assert_eq!(pad_key(b"12", 4).unwrap(), b"12\0\0".to_vec());
        assert_eq!(pad_key(b"1234", 4).unwrap(), b"1234".to_vec());
    }

    #[test]
    fn test_pad_key_too_long() {
        let err = pad_key(b"12345", 4).unwrap_err();
        assert_eq!(
            err,
            RoutingError::KeyTooLong {
                key: Key::from(b"12345"),
                max: 4
            }
        );
    }

    #[test]
    fn test_xor_distance() {
        assert_eq!(xor_distance(&[0x0f, 0xff], &[0xf0, 0xff]), vec![0xff, 0x00]);
        assert_eq!(xor_distance(b"same", b"same"), vec![0; 4]);
    }

    #[test]
    fn test_derive_length_and_determinism() {
        let a = Key::derive(b"10.0.0.1:4001", 16).unwrap();
        let b = Key::derive(b"10.0.0.1:4001", 16).unwrap();
        let c = Key::derive(b"10.0.0.2:4001", 16).unwrap();

        assert_eq!(a.len(), 16);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_derive_rejects_bad_length() {
        assert!(Key::derive(b"x", 0).is_err());
        assert!(Key::derive(b"x", MAX_DERIVED_LEN + 1).is_err());
        assert!(Key::derive(b"x", MAX_DERIVED_LEN).is_ok());
    }

    #[test]
    fn test_display_is_hex() {
        let key = Key::from(b"\x01\xab");
        assert_eq!(key.to_string(), "01ab");
        assert_eq!(format!("{:?}", key), "Key(01ab)");
    }
}
