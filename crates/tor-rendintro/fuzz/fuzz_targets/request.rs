#![no_main]
use libfuzzer_sys::fuzz_target;
use tor_bytes::SecretBuf;
use tor_llcrypto::pk::rsa::RsaIdentity;
use tor_rendintro::{DecryptError, HybridDecrypt, IntroRequest};

/// A "key" whose decryption is the identity function.
struct Cleartext(RsaIdentity);

impl HybridDecrypt for Cleartext {
    fn key_digest(&self) -> RsaIdentity {
        self.0
    }
    fn key_len(&self) -> usize {
        1
    }
    fn hybrid_decrypt(&self, ciphertext: &[u8]) -> Result<SecretBuf, DecryptError> {
        Ok(ciphertext.to_vec().into())
    }
}

fuzz_target!(|data: &[u8]| {
    if let Ok(mut req) = IntroRequest::begin_parse(data, 128) {
        let key = Cleartext(*req.key_digest());
        if req.decrypt(&key).is_ok() {
            let _ = req.parse_plaintext();
        }
    }
});
