//! Define error types for the tor-rendintro crate.

use thiserror::Error;
use tor_error::{ErrorKind, HasKind};

use crate::IntroAuthType;

/// An error that occurred while handling a legacy INTRODUCE cell.
///
/// Each pipeline phase fails with one of these.  Callers should distinguish
/// failures by variant; the `Display` text is for humans only.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The raw cell was too short to hold a key digest and some ciphertext,
    /// or too long to be a relay payload.
    #[error("Malformed INTRODUCE cell: {0}")]
    MalformedCell(&'static str),

    /// The encrypted part of the cell could not be decrypted.
    ///
    /// The caller may want to try another candidate key.
    #[error("Unable to decrypt INTRODUCE cell")]
    DecryptionFailed(#[source] DecryptError),

    /// The plaintext did not start with a version we know, and its length did
    /// not match the legacy (unversioned) format either.
    #[error("Unrecognized INTRODUCE plaintext version {version:#04x} ({len} bytes)")]
    UnsupportedVersion {
        /// The leading byte of the plaintext.
        version: u8,
        /// The total length of the plaintext.
        len: usize,
    },

    /// A field of the plaintext ran past the end of the buffer, was not
    /// terminated, or bytes were left over after the last field.
    #[error("Truncated INTRODUCE plaintext: {problem} in {field}")]
    TruncatedCell {
        /// The field we were decoding when we hit the problem.
        field: &'static str,
        /// What went wrong.
        problem: &'static str,
    },

    /// A v3 plaintext declared an authorization type whose data has a fixed
    /// length, but gave some other length.
    #[error("Wrong authorization data length {len} for {auth_type} (expected {expected})")]
    InvalidAuthLength {
        /// The declared authorization type.
        auth_type: IntroAuthType,
        /// The length the plaintext declared.
        len: u16,
        /// The length this authorization type requires.
        expected: u16,
    },

    /// There was a programming error somewhere in our code, or the caller
    /// invoked a pipeline phase out of order.
    #[error("Internal error")]
    Bug(#[from] tor_error::Bug),
}

impl Error {
    /// Return a closure that turns any decoding error into
    /// [`Error::TruncatedCell`] for `field`.
    ///
    /// Every [`tor_bytes::Reader`] failure while decoding a plaintext means
    /// that we ran out of bytes, so we don't look at the error itself.
    pub(crate) fn truncated(field: &'static str) -> impl FnOnce(tor_bytes::Error) -> Error {
        move |_| Error::TruncatedCell {
            field,
            problem: "not enough bytes",
        }
    }
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        use Error as E;
        use ErrorKind as EK;
        match self {
            E::MalformedCell(_) => EK::RemoteProtocolViolation,
            E::DecryptionFailed(e) => e.kind(),
            E::UnsupportedVersion { .. } => EK::RemoteProtocolViolation,
            E::TruncatedCell { .. } => EK::RemoteProtocolViolation,
            E::InvalidAuthLength { .. } => EK::RemoteProtocolViolation,
            E::Bug(e) => e.kind(),
        }
    }
}

/// The reason a ciphertext could not be decrypted.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum DecryptError {
    /// The cell names a key digest that does not belong to the key we were
    /// given.
    #[error("INTRODUCE cell is for a different service key")]
    KeyMismatch,

    /// None of the candidate keys matched the cell's key digest.
    #[error("No key available for this INTRODUCE cell")]
    NoMatchingKey,

    /// The ciphertext is shorter than one public-key block.
    #[error("Public-key encrypted part truncated ({len} bytes, key is {key_len} bytes)")]
    TruncatedPkPart {
        /// Length of the ciphertext we got.
        len: usize,
        /// Length of one public-key block.
        key_len: usize,
    },

    /// The public-key block did not decrypt.
    ///
    /// Most often this means bad padding: either the wrong key, or a corrupt
    /// ciphertext.
    #[error("Public-key decryption failed")]
    PkDecrypt,

    /// The public-key block decrypted, but was too short to hold a symmetric key.
    #[error("No room for a symmetric key in public-key block")]
    NoSymmetricKey,

    /// Decryption succeeded, but gave us nothing.
    #[error("Decrypted plaintext was empty")]
    EmptyPlaintext,

    /// Internal error.
    #[error("Internal error")]
    Bug(#[from] tor_error::Bug),
}

impl HasKind for DecryptError {
    fn kind(&self) -> ErrorKind {
        use DecryptError as E;
        use ErrorKind as EK;
        match self {
            E::KeyMismatch | E::NoMatchingKey => EK::RemoteProtocolViolation,
            E::TruncatedPkPart { .. } => EK::RemoteProtocolViolation,
            E::PkDecrypt | E::NoSymmetricKey | E::EmptyPlaintext => EK::RemoteProtocolViolation,
            E::Bug(e) => e.kind(),
        }
    }
}

impl From<DecryptError> for Error {
    fn from(e: DecryptError) -> Error {
        Error::DecryptionFailed(e)
    }
}
