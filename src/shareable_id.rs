//! Deterministic, reversible encryption of account IDs so that users can
//! share them for transfers without exposing the aggregator's IDs.
//!
//! The construction is synthetic-IV style: a keyed SHA-512 tag over the
//! plaintext doubles as the IV for a SHA-512 keystream. The same account ID
//! therefore always encrypts to the same shareable ID, and decryption checks
//! the tag so that altered IDs are rejected.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha512};

use crate::Error;

const TAG_LENGTH: usize = 16;

/// Encrypts account IDs into shareable IDs and back.
#[derive(Clone)]
pub struct ShareableIdCipher {
    key: [u8; 64],
}

/// Compare two tags in time that does not depend on where they differ.
fn tags_match(expected: &[u8], actual: &[u8]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .fold(0, |difference, (a, b)| difference | (a ^ b))
            == 0
}

impl std::fmt::Debug for ShareableIdCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareableIdCipher").finish_non_exhaustive()
    }
}

impl ShareableIdCipher {
    /// Derive the cipher key from `secret`.
    pub fn new(secret: &str) -> Self {
        let mut key = [0; 64];
        key.copy_from_slice(&Sha512::digest(secret.as_bytes()));

        Self { key }
    }

    /// Encrypt `account_id` into a URL-safe shareable ID.
    pub fn encrypt(&self, account_id: &str) -> String {
        let plaintext = account_id.as_bytes();
        let tag = self.tag(plaintext);

        let mut output = Vec::with_capacity(TAG_LENGTH + plaintext.len());
        output.extend_from_slice(&tag);
        output.extend(self.apply_keystream(&tag, plaintext));

        URL_SAFE_NO_PAD.encode(output)
    }

    /// Recover the account ID from `shareable_id`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidShareableId] if `shareable_id` is malformed or
    /// was not produced with this cipher's key.
    pub fn decrypt(&self, shareable_id: &str) -> Result<String, Error> {
        let bytes = URL_SAFE_NO_PAD
            .decode(shareable_id.trim())
            .map_err(|_| Error::InvalidShareableId)?;

        if bytes.len() < TAG_LENGTH {
            return Err(Error::InvalidShareableId);
        }

        let (tag, ciphertext) = bytes.split_at(TAG_LENGTH);
        let plaintext = self.apply_keystream(tag, ciphertext);

        if !tags_match(&self.tag(&plaintext), tag) {
            tracing::debug!("rejected shareable ID with a mismatched tag");
            return Err(Error::InvalidShareableId);
        }

        String::from_utf8(plaintext).map_err(|_| Error::InvalidShareableId)
    }

    fn tag(&self, plaintext: &[u8]) -> [u8; TAG_LENGTH] {
        let digest = Sha512::new()
            .chain_update(self.key)
            .chain_update(b"tag")
            .chain_update(plaintext)
            .finalize();

        let mut tag = [0; TAG_LENGTH];
        tag.copy_from_slice(&digest[..TAG_LENGTH]);
        tag
    }

    fn apply_keystream(&self, tag: &[u8], input: &[u8]) -> Vec<u8> {
        input
            .chunks(64)
            .enumerate()
            .flat_map(|(counter, chunk)| {
                let block = Sha512::new()
                    .chain_update(self.key)
                    .chain_update(b"stream")
                    .chain_update(tag)
                    .chain_update((counter as u64).to_be_bytes())
                    .finalize();

                chunk
                    .iter()
                    .zip(block)
                    .map(|(byte, key_byte)| byte ^ key_byte)
                    .collect::<Vec<u8>>()
            })
            .collect()
    }
}
