// /////////////////////////////////////////////////////////////////////////////
// Blockhaul
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Object Uid Value Object
//!
//! The 32-character key a stored block's bytes live under in the object
//! store. A uid is built from two parts:
//!
//! 1. a 22-character base57 encoding of a random UUIDv4 (the alphabet skips
//!    the visually ambiguous `0 O 1 I l`), and
//! 2. a 10-character prefix: the first ten hex characters of the MD5 digest
//!    of that suffix.
//!
//! The prefix exists purely to scatter keys uniformly across the store's
//! partitioning - S3-style backends shard by leading key bytes, and
//! timestamp-ish or sequential prefixes would pile every object of a backup
//! onto one partition. The suffix alone carries the 122 bits of entropy;
//! two identical uids in the lifetime of a backup are treated as a
//! programming error, not a condition to handle.

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::TransferError;

/// Base57 alphabet: `0 O 1 I l` removed from the alphanumerics.
const BASE57_ALPHABET: &[u8; 57] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

static UID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{10}[0-9A-Za-z]{22}$").expect("uid shape regex is valid")
});

/// 32-character object-store key uniquely naming a stored block's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectUid(String);

impl ObjectUid {
    /// Length of the scatter prefix (hex chars of the suffix's MD5).
    pub const PREFIX_LEN: usize = 10;

    /// Length of the base57-encoded UUID suffix.
    pub const SUFFIX_LEN: usize = 22;

    /// Total uid length.
    pub const LEN: usize = Self::PREFIX_LEN + Self::SUFFIX_LEN;

    /// Generates a fresh uid.
    ///
    /// Thread-safe; entropy comes from the operating system via UUIDv4.
    pub fn generate() -> Self {
        let suffix = encode_base57(Uuid::new_v4().as_u128());
        let digest = hex::encode(Md5::digest(suffix.as_bytes()));
        Self(format!("{}{}", &digest[..Self::PREFIX_LEN], suffix))
    }

    /// Validates and wraps a uid read back from an index or a key listing.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidConfiguration`] when `s` does not
    /// have the `[0-9a-f]{10}[0-9A-Za-z]{22}` shape.
    pub fn parse(s: &str) -> Result<Self, TransferError> {
        if !UID_SHAPE.is_match(s) {
            return Err(TransferError::invalid_config(format!(
                "not a well-formed object uid: {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// The uid as the object key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encodes a 128-bit value as exactly 22 base57 digits, most significant
/// first, left-padded with the alphabet's zero digit. 57^22 exceeds 2^128,
/// so 22 digits always suffice.
fn encode_base57(mut value: u128) -> String {
    let mut out = [BASE57_ALPHABET[0]; ObjectUid::SUFFIX_LEN];
    for slot in out.iter_mut().rev() {
        *slot = BASE57_ALPHABET[(value % 57) as usize];
        value /= 57;
        if value == 0 {
            break;
        }
    }
    out.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_uid_shape() {
        let uid = ObjectUid::generate();
        assert_eq!(uid.as_str().len(), ObjectUid::LEN);
        assert!(UID_SHAPE.is_match(uid.as_str()));
    }

    #[test]
    fn test_prefix_is_md5_of_suffix() {
        let uid = ObjectUid::generate();
        let (prefix, suffix) = uid.as_str().split_at(ObjectUid::PREFIX_LEN);
        let digest = hex::encode(Md5::digest(suffix.as_bytes()));
        assert_eq!(prefix, &digest[..ObjectUid::PREFIX_LEN]);
    }

    #[test]
    fn test_parse_round_trip_and_rejects() {
        let uid = ObjectUid::generate();
        assert_eq!(ObjectUid::parse(uid.as_str()).unwrap(), uid);

        assert!(ObjectUid::parse("").is_err());
        assert!(ObjectUid::parse("too-short").is_err());
        // Prefix must be lowercase hex.
        assert!(ObjectUid::parse(&format!("XXXXXXXXXX{}", "a".repeat(22))).is_err());
        // 0/O/1/I/l never appear in a generated suffix, but any alphanumeric
        // suffix is accepted on parse for compatibility with foreign keys.
        assert!(ObjectUid::parse(&format!("0123456789{}", "O".repeat(22))).is_ok());
    }

    #[test]
    fn test_no_collisions_in_bulk_generation() {
        let mut seen = HashSet::new();
        for _ in 0..100_000 {
            assert!(seen.insert(ObjectUid::generate().0));
        }
    }

    #[test]
    fn test_encode_base57_padding_and_extremes() {
        assert_eq!(encode_base57(0), "2".repeat(22));
        let max = encode_base57(u128::MAX);
        assert_eq!(max.len(), 22);
        assert_ne!(max, "2".repeat(22));
    }

    proptest! {
        #[test]
        fn prop_encoded_suffix_is_22_alphabet_chars(value: u128) {
            let suffix = encode_base57(value);
            prop_assert_eq!(suffix.len(), 22);
            prop_assert!(suffix.bytes().all(|b| BASE57_ALPHABET.contains(&b)));
        }
    }
}
