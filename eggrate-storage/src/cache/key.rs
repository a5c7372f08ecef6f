//! Derived cache keys with canonical parameter serialization.
//!
//! Two requests that mean the same thing must collide on the same key, no
//! matter what order their parameters were supplied in. [`CacheParams`]
//! keeps parameters in a sorted map, and [`CacheKey::derive`] hashes the
//! canonical form down to a fixed 128-bit digest.
//!
//! # Binary Format
//!
//! A key encodes to a fixed 17-byte array:
//! - Byte 0: dataset discriminant
//! - Bytes 1-16: truncated SHA-256 digest of `logical_name` + params
//!
//! Keys for one dataset share a 1-byte prefix, so an LMDB scan can delete a
//! whole dataset without touching the others.

use std::collections::BTreeMap;
use std::fmt;

use eggrate_core::Dataset;
use sha2::{Digest, Sha256};

/// Separator between name and parameter components in the hash input. Unit
/// separator, cannot appear in `key=value` text produced by callers.
const COMPONENT_SEPARATOR: u8 = 0x1F;

/// Encoded key length: dataset byte + 128-bit digest.
pub const ENCODED_KEY_LEN: usize = 17;

/// An ordered string-to-string parameter set.
///
/// Backed by a `BTreeMap`, so canonical serialization falls out of the key
/// order and insertion order never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheParams(BTreeMap<String, String>);

impl CacheParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous value for the same key.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical serialization: `key=value` pairs in key order, joined by
    /// the unit separator.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (key, value) in &self.0 {
            bytes.push(COMPONENT_SEPARATOR);
            bytes.extend_from_slice(key.as_bytes());
            bytes.push(b'=');
            bytes.extend_from_slice(value.as_bytes());
        }
        bytes
    }
}

/// A derived cache key: dataset prefix plus content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    dataset: Dataset,
    digest: [u8; 16],
}

impl CacheKey {
    /// Derive a key from a logical name and its parameter set.
    ///
    /// Deterministic: the same dataset, name, and parameters (in any
    /// insertion order) always derive the same key.
    pub fn derive(dataset: Dataset, logical_name: &str, params: &CacheParams) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(logical_name.as_bytes());
        hasher.update(params.canonical_bytes());
        let full = hasher.finalize();

        let mut digest = [0u8; 16];
        digest.copy_from_slice(&full[0..16]);
        Self { dataset, digest }
    }

    /// The dataset this key belongs to.
    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Encode to the fixed 17-byte storage form.
    pub fn encode(&self) -> [u8; ENCODED_KEY_LEN] {
        let mut bytes = [0u8; ENCODED_KEY_LEN];
        bytes[0] = self.dataset.as_byte();
        bytes[1..].copy_from_slice(&self.digest);
        bytes
    }

    /// Decode a key from its storage form.
    ///
    /// Returns `None` if the length or dataset byte is wrong.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ENCODED_KEY_LEN {
            return None;
        }
        let dataset = Dataset::from_byte(bytes[0])?;
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&bytes[1..]);
        Some(Self { dataset, digest })
    }

    /// Scan prefix matching every key in a dataset.
    pub fn dataset_prefix(dataset: Dataset) -> [u8; 1] {
        [dataset.as_byte()]
    }

    /// Identifier-safe hex form, for logs and error messages.
    pub fn as_hex(&self) -> String {
        hex::encode(self.encode())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn dataset_strategy() -> impl Strategy<Value = Dataset> {
        prop_oneof![
            Just(Dataset::Rates),
            Just(Dataset::Cities),
            Just(Dataset::States),
        ]
    }

    fn params_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
        proptest::collection::vec(("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}"), 0..6)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: derivation is invariant under parameter insertion order.
        #[test]
        fn prop_derivation_order_invariant(
            dataset in dataset_strategy(),
            name in "[a-z_]{1,16}",
            pairs in params_strategy(),
        ) {
            let forward = pairs.iter().fold(CacheParams::new(), |p, (k, v)| p.with(k, v));
            let reverse = pairs.iter().rev().fold(CacheParams::new(), |p, (k, v)| p.with(k, v));

            prop_assert_eq!(
                CacheKey::derive(dataset, &name, &forward),
                CacheKey::derive(dataset, &name, &reverse)
            );
        }

        /// Property: encoded keys are always exactly 17 bytes and roundtrip.
        #[test]
        fn prop_encode_decode_roundtrip(
            dataset in dataset_strategy(),
            name in "[a-z_]{1,16}",
            pairs in params_strategy(),
        ) {
            let params = pairs.iter().fold(CacheParams::new(), |p, (k, v)| p.with(k, v));
            let key = CacheKey::derive(dataset, &name, &params);
            let encoded = key.encode();

            prop_assert_eq!(encoded.len(), ENCODED_KEY_LEN);
            prop_assert_eq!(CacheKey::decode(&encoded), Some(key));
        }

        /// Property: the dataset prefix is a prefix of every key in it.
        #[test]
        fn prop_dataset_prefix_is_prefix(
            dataset in dataset_strategy(),
            name in "[a-z_]{1,16}",
        ) {
            let key = CacheKey::derive(dataset, &name, &CacheParams::new());
            let encoded = key.encode();
            let prefix = CacheKey::dataset_prefix(dataset);
            prop_assert_eq!(&encoded[0..1], &prefix[..]);
        }
    }
}
