//! AES-256-GCM crypto provider for credential envelopes at rest.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use tl_domain::entities::EncryptedData;
use tl_domain::error::{Error, Result};
use tl_domain::ports::CryptoProvider;

/// AES-256-GCM provider; the key comes from configuration and never leaves
/// this struct.
pub struct AesGcmCryptoProvider {
    cipher: Aes256Gcm,
}

impl AesGcmCryptoProvider {
    /// Build from a 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a key of the wrong length.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(Error::config(format!(
                "AES-256-GCM needs a 32-byte key, got {} bytes",
                key.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid base64 or a wrong-length key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        use base64::Engine;
        let key = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::config(format!("invalid base64 crypto key: {e}")))?;
        Self::new(&key)
    }
}

impl CryptoProvider for AesGcmCryptoProvider {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedData> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| Error::validation("encryption failed"))?;
        Ok(EncryptedData::new(ciphertext, nonce.to_vec()))
    }

    fn decrypt(&self, encrypted_data: &EncryptedData) -> Result<Vec<u8>> {
        if encrypted_data.nonce.len() != 12 {
            return Err(Error::validation("malformed auth envelope nonce"));
        }
        let nonce = Nonce::from_slice(&encrypted_data.nonce);
        self.cipher
            .decrypt(nonce, encrypted_data.ciphertext.as_ref())
            .map_err(|_| Error::validation("auth envelope decryption failed"))
    }

    fn provider_name(&self) -> &str {
        "aes-gcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> AesGcmCryptoProvider {
        AesGcmCryptoProvider::new(&[7u8; 32]).map_or_else(|_| panic!("key"), |p| p)
    }

    #[test]
    fn round_trip() {
        let p = provider();
        let secret = br#"{"api_key":"sk-123"}"#;
        let encrypted = p.encrypt(secret).map_or_else(|_| panic!("encrypt"), |e| e);
        assert_ne!(encrypted.ciphertext, secret.to_vec());
        let decrypted = p.decrypt(&encrypted).unwrap_or_default();
        assert_eq!(decrypted, secret.to_vec());
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let p = provider();
        let mut encrypted = p
            .encrypt(b"secret")
            .map_or_else(|_| panic!("encrypt"), |e| e);
        encrypted.ciphertext[0] ^= 0xFF;
        assert!(p.decrypt(&encrypted).is_err());
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        assert!(AesGcmCryptoProvider::new(&[0u8; 16]).is_err());
    }
}
