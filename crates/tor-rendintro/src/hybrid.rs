//! The hybrid public-key encryption used for legacy INTRODUCE cells.
//!
//! A client encrypts the INTRODUCE plaintext to the service's RSA key.  Since
//! the plaintext is usually longer than one RSA block can hold, the scheme
//! is hybrid:
//!
//! ```text
//!   RSA-OAEP(K || M1) || AES-CTR_K(M2)
//! ```
//!
//! where `K` is a fresh 16-byte AES-128 key, `M1` is as much of the message as
//! fits in the rest of the RSA block, and `M2` is everything else.  The AES
//! counter starts at zero.  OAEP uses SHA-1 and an empty label.
//!
//! A message short enough to fit in a single RSA block is encrypted with
//! RSA-OAEP alone.
//!
//! The rest of this crate only needs the [`HybridDecrypt`] trait; the RSA
//! types here are the implementation used by deployed services.

use cipher::{KeyIvInit as _, StreamCipher as _};
use digest::Digest as _;
use rsa::Oaep;
use rsa::pkcs1::{DecodeRsaPrivateKey as _, DecodeRsaPublicKey as _, EncodeRsaPublicKey as _};
use rsa::rand_core::CryptoRngCore;
use rsa::traits::PublicKeyParts as _;
use std::fmt;
use tor_bytes::{SecretBuf, Writer as _};
use tor_error::{Bug, internal};
use tor_llcrypto::cipher::aes::Aes128Ctr;
use tor_llcrypto::d::Sha1;
use tor_llcrypto::pk::rsa::RsaIdentity;

use crate::{DIGEST_LEN, DecryptError};

/// Number of bytes of each RSA block used up by OAEP padding.
pub const PK_OAEP_OVERHEAD: usize = 42;

/// Length of the symmetric key carried in the RSA block.
pub const CIPHER_KEY_LEN: usize = 16;

/// The AES-CTR initial counter value: all zero.
const ZERO_IV: [u8; 16] = [0; 16];

/// A private key that can decrypt the encrypted part of an INTRODUCE cell.
///
/// This is the boundary between the cell pipeline and whatever holds the
/// service's long-term keys.
pub trait HybridDecrypt {
    /// Return the digest that identifies this key in an INTRODUCE cell.
    fn key_digest(&self) -> RsaIdentity;

    /// Return the length in bytes of one public-key block for this key.
    fn key_len(&self) -> usize;

    /// Decrypt `ciphertext`, returning the recovered plaintext.
    ///
    /// Fails on bad padding, on a key mismatch that the padding check
    /// detects, or on a public-key block too short to hold a symmetric key.
    fn hybrid_decrypt(&self, ciphertext: &[u8]) -> Result<SecretBuf, DecryptError>;
}

/// Compute the digest that names `key` in an INTRODUCE cell: the SHA-1 of its
/// PKCS#1 DER encoding.
fn rsa_identity(key: &rsa::RsaPublicKey) -> Option<RsaIdentity> {
    let der = key.to_pkcs1_der().ok()?;
    let id: [u8; DIGEST_LEN] = Sha1::digest(der.as_bytes()).into();
    Some(RsaIdentity::from(id))
}

/// An RSA private key, used to decrypt INTRODUCE cells.
pub struct RsaHybridKey {
    /// The key itself.
    key: rsa::RsaPrivateKey,
    /// The digest of the public part of `key`.
    digest: RsaIdentity,
}

impl fmt::Debug for RsaHybridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaHybridKey")
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

impl RsaHybridKey {
    /// Wrap an RSA private key.
    ///
    /// Returns None if the public part of the key can't be encoded.
    pub fn from_rsa(key: rsa::RsaPrivateKey) -> Option<Self> {
        let digest = rsa_identity(&key.to_public_key())?;
        Some(RsaHybridKey { key, digest })
    }
    /// Construct a key from its PKCS#1 DER encoding.
    pub fn from_der(der: &[u8]) -> Option<Self> {
        Self::from_rsa(rsa::RsaPrivateKey::from_pkcs1_der(der).ok()?)
    }
    /// Construct a key from a PEM-encoded PKCS#1 `RSA PRIVATE KEY`.
    pub fn from_pem(pem: &str) -> Option<Self> {
        Self::from_rsa(rsa::RsaPrivateKey::from_pkcs1_pem(pem).ok()?)
    }
    /// Return the public part of this key.
    pub fn to_public_key(&self) -> RsaHybridPublicKey {
        RsaHybridPublicKey {
            key: self.key.to_public_key(),
            digest: self.digest,
        }
    }
    /// Decrypt one public-key block.
    fn pk_decrypt(&self, block: &[u8]) -> Result<SecretBuf, DecryptError> {
        self.key
            .decrypt(Oaep::new::<Sha1>(), block)
            .map(SecretBuf::from)
            .map_err(|_| DecryptError::PkDecrypt)
    }
}

impl HybridDecrypt for RsaHybridKey {
    fn key_digest(&self) -> RsaIdentity {
        self.digest
    }

    fn key_len(&self) -> usize {
        self.key.size()
    }

    fn hybrid_decrypt(&self, ciphertext: &[u8]) -> Result<SecretBuf, DecryptError> {
        let key_len = self.key_len();
        if ciphertext.len() <= key_len {
            return self.pk_decrypt(ciphertext);
        }

        let (pk_part, sym_part) = ciphertext.split_at(key_len);
        let block = self.pk_decrypt(pk_part)?;
        if block.len() < CIPHER_KEY_LEN {
            return Err(DecryptError::NoSymmetricKey);
        }
        let (sym_key, head) = block.split_at(CIPHER_KEY_LEN);
        let mut cipher = Aes128Ctr::new_from_slices(sym_key, &ZERO_IV)
            .map_err(|_| internal!("AES key had the wrong length"))?;

        let mut plaintext = SecretBuf::with_capacity(key_len + sym_part.len());
        plaintext.extend_from_slice(head);
        plaintext.extend_from_slice(sym_part);
        cipher.apply_keystream(&mut plaintext.as_mut()[head.len()..]);
        Ok(plaintext)
    }
}

/// An RSA public key, used by clients to encrypt INTRODUCE cells.
#[derive(Clone, Debug)]
pub struct RsaHybridPublicKey {
    /// The key itself.
    key: rsa::RsaPublicKey,
    /// The digest of `key`.
    digest: RsaIdentity,
}

impl RsaHybridPublicKey {
    /// Wrap an RSA public key.
    ///
    /// Returns None if the key can't be encoded.
    pub fn from_rsa(key: rsa::RsaPublicKey) -> Option<Self> {
        let digest = rsa_identity(&key)?;
        Some(RsaHybridPublicKey { key, digest })
    }
    /// Construct a key from its PKCS#1 DER encoding (an `RSAPublicKey`, not a
    /// `SubjectPublicKeyInfo`).
    pub fn from_der(der: &[u8]) -> Option<Self> {
        Self::from_rsa(rsa::RsaPublicKey::from_pkcs1_der(der).ok()?)
    }
    /// Return the digest that names this key in an INTRODUCE cell.
    pub fn key_digest(&self) -> RsaIdentity {
        self.digest
    }
    /// Return the length in bytes of one public-key block for this key.
    pub fn key_len(&self) -> usize {
        self.key.size()
    }

    /// Encrypt `plaintext` with the hybrid scheme.
    pub fn hybrid_encrypt<R: CryptoRngCore>(
        &self,
        rng: &mut R,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, Bug> {
        let key_len = self.key_len();
        if plaintext.len() + PK_OAEP_OVERHEAD <= key_len {
            return self
                .key
                .encrypt(rng, Oaep::new::<Sha1>(), plaintext)
                .map_err(|_| internal!("RSA-OAEP encryption failed"));
        }

        let head_len = key_len
            .checked_sub(PK_OAEP_OVERHEAD + CIPHER_KEY_LEN)
            .ok_or_else(|| internal!("RSA key too small for hybrid encryption"))?;
        let (head, tail) = plaintext.split_at(head_len);

        let mut sym_key = SecretBuf::with_capacity(key_len);
        sym_key.write_zeros(CIPHER_KEY_LEN);
        rng.fill_bytes(sym_key.as_mut());

        let mut block = SecretBuf::with_capacity(key_len);
        block.extend_from_slice(&sym_key[..]);
        block.extend_from_slice(head);
        let mut ciphertext = self
            .key
            .encrypt(rng, Oaep::new::<Sha1>(), &block[..])
            .map_err(|_| internal!("RSA-OAEP encryption failed"))?;

        let mut cipher = Aes128Ctr::new_from_slices(&sym_key[..], &ZERO_IV)
            .map_err(|_| internal!("AES key had the wrong length"))?;
        let mut sym_part = tail.to_vec();
        cipher.apply_keystream(&mut sym_part[..]);
        ciphertext.extend_from_slice(&sym_part[..]);
        Ok(ciphertext)
    }
}

/// Build a legacy INTRODUCE cell body: the key digest of `key`, followed by
/// `plaintext` encrypted to `key`.
pub fn encode_intro_cell<R: CryptoRngCore>(
    key: &RsaHybridPublicKey,
    rng: &mut R,
    plaintext: &[u8],
) -> crate::Result<Vec<u8>> {
    let encrypted = key.hybrid_encrypt(rng, plaintext)?;
    let mut cell = Vec::with_capacity(DIGEST_LEN + encrypted.len());
    cell.write(&key.key_digest())
        .map_err(|e| crate::Error::Bug(Bug::from(e)))?;
    cell.write_all(&encrypted[..]);
    Ok(cell)
}
