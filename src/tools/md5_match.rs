//! Recover single characters from their MD5 digests.
//!
//! Every character of a known alphabet is hashed once; each supplied digest
//! is then a table lookup.

use crate::error::{Error, Result};
use md5::{Digest, Md5};
use std::collections::HashMap;

pub const DEFAULT_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Digests used when none are given on the command line
pub const SAMPLE_DIGESTS: [&str; 7] = [
    "69691c7bdcc3ce6d5d8a1361f22d04ac",
    "d95679752134a2d9eb61dbd7b91c4bcc",
    "7b8b965ad4bca0e41ab51de7b31363a1",
    "b2f5ff47436671b6e533d8dc3614845d",
    "d95679752134a2d9eb61dbd7b91c4bcc",
    "f623e75af30e62bbd73d6df5b50bb7b5",
    "9d5ed678fe57bcca610140957afab571",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestMatch {
    Matched { digest: String, character: char },
    Unmatched { digest: String },
}

impl DigestMatch {
    pub fn character(&self) -> Option<char> {
        match self {
            DigestMatch::Matched { character, .. } => Some(*character),
            DigestMatch::Unmatched { .. } => None,
        }
    }
}

pub fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

#[derive(Debug)]
pub struct DigestTable {
    by_digest: HashMap<String, char>,
}

impl DigestTable {
    pub fn from_alphabet(alphabet: &str) -> Self {
        let by_digest = alphabet
            .chars()
            .map(|c| (md5_hex(c.encode_utf8(&mut [0; 4])), c))
            .collect();
        Self { by_digest }
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }

    pub fn lookup(&self, digest: &str) -> Result<DigestMatch> {
        let normalized = digest.trim().to_ascii_lowercase();
        if normalized.len() != 32 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!(
                "'{}' is not a 32-character hex MD5 digest",
                digest
            )));
        }

        Ok(match self.by_digest.get(&normalized) {
            Some(&character) => DigestMatch::Matched {
                digest: normalized,
                character,
            },
            None => DigestMatch::Unmatched { digest: normalized },
        })
    }

    /// Look up each digest in order; one malformed digest fails the batch
    pub fn resolve<S: AsRef<str>>(&self, digests: &[S]) -> Result<Vec<DigestMatch>> {
        digests.iter().map(|d| self.lookup(d.as_ref())).collect()
    }
}

/// Join recovered characters, using `?` for digests outside the alphabet
pub fn recovered_text(matches: &[DigestMatch]) -> String {
    matches
        .iter()
        .map(|m| m.character().unwrap_or('?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn known_digests() {
        assert_eq!(md5_hex("a"), "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(md5_hex("z"), "fbade9e36a3f36d3d676c1b808451dd7");
    }

    #[test]
    fn table_covers_alphabet() {
        let table = DigestTable::from_alphabet(DEFAULT_ALPHABET);
        assert_eq!(table.len(), 62);
    }

    #[test]
    fn sample_digests_spell_a_word() {
        let table = DigestTable::from_alphabet(DEFAULT_ALPHABET);
        let matches = table.resolve(&SAMPLE_DIGESTS).unwrap();
        assert_eq!(recovered_text(&matches), "MongoDB");
    }

    #[test]
    fn digest_outside_alphabet_is_unmatched() {
        let table = DigestTable::from_alphabet("abc");
        let matches = table
            .resolve(&["0CC175B9C0F1B6A831C399E269772661", md5_hex("!").as_str()])
            .unwrap();
        assert_eq!(matches[0].character(), Some('a'));
        assert!(matches!(matches[1], DigestMatch::Unmatched { .. }));
        assert_eq!(recovered_text(&matches), "a?");
    }

    #[test]
    fn malformed_digest_is_invalid_input() {
        let table = DigestTable::from_alphabet(DEFAULT_ALPHABET);
        let err = table.lookup("xyz").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(table.lookup(&"g".repeat(32)).is_err());
    }
}
