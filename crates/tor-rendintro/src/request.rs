//! The record that a single INTRODUCE cell accumulates as it is handled.

use std::fmt;

use safelog::Redactable as _;
use tor_bytes::{Reader, SecretBuf};
use tor_error::{ErrorReport as _, bad_api_usage};
use tor_llcrypto::pk::rsa::RsaIdentity;
use tracing::trace;

use crate::{DIGEST_LEN, DecryptError, Error, HybridDecrypt, IntroPlaintext, Result};

/// An INTRODUCE cell, partway through being handled.
///
/// Handling happens in three phases, each of which adds to the record:
///
///  1. [`IntroRequest::begin_parse`] splits the raw cell into a key digest
///     and a ciphertext.
///  2. [`IntroRequest::decrypt`] (or [`IntroRequest::decrypt_with_candidates`])
///     recovers the plaintext.
///  3. [`IntroRequest::parse_plaintext`] decodes the plaintext into an
///     [`IntroPlaintext`].
///
/// A caller may stop after any phase.  A failed phase leaves the record as it
/// was, except that [`diagnostic_message`](IntroRequest::diagnostic_message)
/// then describes the failure.  The plaintext buffer is wiped when the record
/// is dropped.
pub struct IntroRequest {
    /// Digest of the key that can decrypt this cell.
    key_digest: RsaIdentity,
    /// Everything in the cell after the digest.
    ciphertext: Vec<u8>,
    /// Length of the handshake data at the end of the plaintext.
    handshake_len: usize,
    /// The decrypted contents, once we have them.
    ///
    /// Never empty.
    plaintext: Option<SecretBuf>,
    /// The decoded plaintext, once we have it.
    ///
    /// Only set if `plaintext` is set.
    parsed: Option<IntroPlaintext>,
    /// A description of the last failed phase, if the last phase failed.
    diagnostic: Option<String>,
}

impl fmt::Debug for IntroRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntroRequest")
            .field("key_digest", &self.key_digest.redacted())
            .field("ciphertext_len", &self.ciphertext.len())
            .field("handshake_len", &self.handshake_len)
            .field("decrypted", &self.plaintext.is_some())
            .field("version", &self.parsed.as_ref().map(|p| p.version()))
            .field("diagnostic", &self.diagnostic)
            .finish()
    }
}

impl IntroRequest {
    /// Split a raw INTRODUCE cell into its key digest and ciphertext.
    ///
    /// `handshake_len` is the length of handshake data that the plaintext
    /// should end with; it is used by [`parse_plaintext`](Self::parse_plaintext).
    pub fn begin_parse(cell: &[u8], handshake_len: usize) -> Result<Self> {
        let mut r = Reader::from_slice(cell);
        let key_digest: RsaIdentity = r
            .extract()
            .map_err(|_| Error::MalformedCell("too short to hold a key digest"))?;
        let ciphertext = r.into_rest();
        if ciphertext.is_empty() {
            return Err(Error::MalformedCell("no encrypted part"));
        }
        debug_assert_eq!(cell.len(), DIGEST_LEN + ciphertext.len());
        trace!(
            "INTRODUCE cell for {} with {} encrypted bytes",
            key_digest.redacted(),
            ciphertext.len()
        );
        Ok(IntroRequest {
            key_digest,
            ciphertext: ciphertext.to_vec(),
            handshake_len,
            plaintext: None,
            parsed: None,
            diagnostic: None,
        })
    }

    /// Decrypt this cell with `key`.
    ///
    /// Fails with [`Error::DecryptionFailed`] if `key` is not the one the cell
    /// names, or if decryption fails.  It is an error to call this on a cell
    /// that is already decrypted.
    pub fn decrypt<K: HybridDecrypt + ?Sized>(&mut self, key: &K) -> Result<()> {
        self.check_not_decrypted()?;
        let outcome = self.try_decrypt(key);
        self.finish_decrypt(outcome)
    }

    /// Decrypt this cell with whichever of `keys` works, and return that key.
    ///
    /// We only try the keys whose digest matches the one in the cell.  If
    /// none of them match, we fail with [`DecryptError::NoMatchingKey`];
    /// if they all fail, we report the last failure.
    pub fn decrypt_with_candidates<'k, K, I>(&mut self, keys: I) -> Result<&'k K>
    where
        K: HybridDecrypt + ?Sized + 'k,
        I: IntoIterator<Item = &'k K>,
    {
        self.check_not_decrypted()?;
        let mut outcome = Err(DecryptError::NoMatchingKey);
        let mut chosen = None;
        for key in keys {
            if key.key_digest() != self.key_digest {
                continue;
            }
            outcome = self.try_decrypt(key);
            if outcome.is_ok() {
                chosen = Some(key);
                break;
            }
        }
        self.finish_decrypt(outcome)?;
        chosen.ok_or_else(|| tor_error::internal!("decrypted without a key").into())
    }

    /// Decode the plaintext of this cell.
    ///
    /// Calling this on a cell that is already decoded does nothing.  It is an
    /// error to call this on a cell that is not yet decrypted.
    pub fn parse_plaintext(&mut self) -> Result<()> {
        if self.parsed.is_some() {
            return Ok(());
        }
        let Some(plaintext) = &self.plaintext else {
            return Err(
                bad_api_usage!("Tried to parse an INTRODUCE cell before decrypting it").into(),
            );
        };
        match IntroPlaintext::parse(plaintext, self.handshake_len) {
            Ok(parsed) => {
                trace!(
                    "Decoded INTRODUCE plaintext for {} ({:?})",
                    self.key_digest.redacted(),
                    parsed.version()
                );
                self.parsed = Some(parsed);
                self.diagnostic = None;
                Ok(())
            }
            Err(e) => Err(self.note_failure(e)),
        }
    }

    /// Return the digest of the key that can decrypt this cell.
    pub fn key_digest(&self) -> &RsaIdentity {
        &self.key_digest
    }
    /// Return the encrypted part of this cell.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext[..]
    }
    /// Return the handshake data length this cell was parsed with.
    pub fn handshake_len(&self) -> usize {
        self.handshake_len
    }
    /// Return the decrypted contents of this cell, if we have them.
    pub fn plaintext(&self) -> Option<&[u8]> {
        self.plaintext.as_deref().map(|p| &p[..])
    }
    /// Return the decoded plaintext of this cell, if we have it.
    pub fn parsed(&self) -> Option<&IntroPlaintext> {
        self.parsed.as_ref()
    }
    /// Consume this record, and return its decoded plaintext, if we have it.
    pub fn into_parsed(self) -> Option<IntroPlaintext> {
        self.parsed
    }
    /// Return a description of why the last phase failed, if it did.
    pub fn diagnostic_message(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Fail if this cell is already decrypted.
    fn check_not_decrypted(&self) -> Result<()> {
        if self.plaintext.is_some() {
            return Err(bad_api_usage!("Tried to decrypt an INTRODUCE cell twice").into());
        }
        Ok(())
    }

    /// Try to decrypt this cell with `key`, without changing the record.
    fn try_decrypt<K: HybridDecrypt + ?Sized>(
        &self,
        key: &K,
    ) -> std::result::Result<SecretBuf, DecryptError> {
        if key.key_digest() != self.key_digest {
            return Err(DecryptError::KeyMismatch);
        }
        let key_len = key.key_len();
        if self.ciphertext.len() < key_len {
            return Err(DecryptError::TruncatedPkPart {
                len: self.ciphertext.len(),
                key_len,
            });
        }
        let plaintext = key.hybrid_decrypt(&self.ciphertext)?;
        if plaintext.is_empty() {
            return Err(DecryptError::EmptyPlaintext);
        }
        Ok(plaintext)
    }

    /// Record the outcome of a decryption attempt.
    fn finish_decrypt(
        &mut self,
        outcome: std::result::Result<SecretBuf, DecryptError>,
    ) -> Result<()> {
        match outcome {
            Ok(plaintext) => {
                trace!(
                    "Decrypted {} bytes of INTRODUCE plaintext for {}",
                    plaintext.len(),
                    self.key_digest.redacted()
                );
                self.plaintext = Some(plaintext);
                self.diagnostic = None;
                Ok(())
            }
            Err(e) => Err(self.note_failure(e.into())),
        }
    }

    /// Remember `err` as the reason the last phase failed, and return it.
    fn note_failure(&mut self, err: Error) -> Error {
        let msg = err.report().to_string();
        trace!("INTRODUCE cell for {}: {}", self.key_digest.redacted(), msg);
        self.diagnostic = Some(msg);
        err
    }
}
