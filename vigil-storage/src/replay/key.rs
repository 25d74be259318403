//! Composite replay keys.
//!
//! Plain concatenation of issuer and message ID is ambiguous: issuer "ab"
//! with message "c" and issuer "a" with message "bc" both give "abc". The
//! issuer's byte length is therefore written in front of it.

use sha2::{Digest, Sha256};
use vigil_core::KeyEncoding;

/// Separator between the length prefix and the identifiers.
const LENGTH_SEPARATOR: char = ':';

/// The `(issuer, message)` pair a replay decision is made for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplayKey {
    issuer_id: String,
    message_id: String,
}

impl ReplayKey {
    pub fn new(issuer_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            issuer_id: issuer_id.into(),
            message_id: message_id.into(),
        }
    }

    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Encode as `{issuer_byte_len}:{issuer}{message}`.
    pub fn encode(&self) -> String {
        let mut out =
            String::with_capacity(self.issuer_id.len() + self.message_id.len() + 8);
        out.push_str(&self.issuer_id.len().to_string());
        out.push(LENGTH_SEPARATOR);
        out.push_str(&self.issuer_id);
        out.push_str(&self.message_id);
        out
    }

    /// Lowercase hex SHA-256 of the length-prefixed encoding.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.encode().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The storage key under the given encoding.
    pub fn storage_key(&self, encoding: KeyEncoding) -> String {
        match encoding {
            KeyEncoding::LengthPrefixed => self.encode(),
            KeyEncoding::Sha256 => self.digest(),
        }
    }

    /// Decode a length-prefixed key.
    ///
    /// Returns `None` if:
    /// - The length prefix or its separator is missing
    /// - The prefix is not a canonical decimal number (no sign, no leading zeros)
    /// - The declared length overruns the input or splits a UTF-8 character
    pub fn decode(encoded: &str) -> Option<Self> {
        let (len, rest) = encoded.split_once(LENGTH_SEPARATOR)?;

        if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if len.len() > 1 && len.starts_with('0') {
            return None;
        }

        let issuer_len: usize = len.parse().ok()?;
        if !rest.is_char_boundary(issuer_len) {
            return None;
        }

        let (issuer_id, message_id) = rest.split_at(issuer_len);
        Some(Self::new(issuer_id, message_id))
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        /// Property: Decoding an encoded key returns the original pair.
        #[test]
        fn prop_encode_decode_roundtrip(issuer in ".*", message in ".*") {
            let key = ReplayKey::new(issuer, message);
            prop_assert_eq!(ReplayKey::decode(&key.encode()), Some(key));
        }

        /// Property: Distinct pairs never share a storage key, even when
        /// their plain concatenations coincide.
        #[test]
        fn prop_encoding_is_injective(
            i1 in "[ab:0-9]{0,4}",
            m1 in "[ab:0-9]{0,4}",
            i2 in "[ab:0-9]{0,4}",
            m2 in "[ab:0-9]{0,4}",
        ) {
            let key1 = ReplayKey::new(i1, m1);
            let key2 = ReplayKey::new(i2, m2);

            if key1 == key2 {
                prop_assert_eq!(key1.encode(), key2.encode());
            } else {
                prop_assert_ne!(key1.encode(), key2.encode());
                prop_assert_ne!(key1.digest(), key2.digest());
            }
        }
    }
}
