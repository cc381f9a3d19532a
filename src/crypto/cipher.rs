//! ChaCha20-Poly1305 AEAD Encryption

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use super::error::{CryptoError, CryptoResult};

/// Size of the encryption key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Symmetric cipher for encryption/decryption
pub struct Cipher;

impl Cipher {
    /// Encrypt data with associated data (AAD)
    ///
    /// Returns: nonce || ciphertext || tag
    pub fn encrypt_with_aad(
        key: &[u8; KEY_SIZE],
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt data with associated data (AAD)
    ///
    /// The AAD must match what was used during encryption
    pub fn decrypt_with_aad(
        key: &[u8; KEY_SIZE],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        // Minimum size: nonce + tag
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let cipher = ChaCha20Poly1305::new(key.into());
        let nonce = Nonce::from_slice(&ciphertext[..NONCE_SIZE]);

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &ciphertext[NONCE_SIZE..],
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = [42u8; KEY_SIZE];
        let ciphertext = Cipher::encrypt_with_aad(&key, b"reading", b"hdr").unwrap();
        let decrypted = Cipher::decrypt_with_aad(&key, &ciphertext, b"hdr").unwrap();
        assert_eq!(decrypted, b"reading");
    }

    #[test]
    fn test_ciphertext_different_each_time() {
        let key = [42u8; KEY_SIZE];
        let ct1 = Cipher::encrypt_with_aad(&key, b"Hello", &[]).unwrap();
        let ct2 = Cipher::encrypt_with_aad(&key, b"Hello", &[]).unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = [42u8; KEY_SIZE];
        let mut ciphertext = Cipher::encrypt_with_aad(&key, b"Hello", &[]).unwrap();

        if let Some(byte) = ciphertext.get_mut(NONCE_SIZE + 1) {
            *byte ^= 0xFF;
        }

        assert!(Cipher::decrypt_with_aad(&key, &ciphertext, &[]).is_err());
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = [42u8; KEY_SIZE];
        let ciphertext = Cipher::encrypt_with_aad(&key, b"Secret", b"public header").unwrap();

        assert!(Cipher::decrypt_with_aad(&key, &ciphertext, b"wrong").is_err());
        assert!(Cipher::decrypt_with_aad(&key, &ciphertext, &[]).is_err());
    }
}
