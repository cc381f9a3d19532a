//! Ed25519 signing identities
//!
//! Key material layout used by the default crypto facet:
//!
//! - `key_data`: the 32-byte Ed25519 seed
//! - `public_key`: Ed25519 verifying key (32) followed by the X25519
//!   exchange key derived from the same seed (32)

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::ZeroizeOnDrop;

use super::error::{CryptoError, CryptoResult};
use super::exchange::{ExchangePublicKey, KeyExchange};

/// Size of a public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a secret key in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of a signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Size of the combined public material (verifying + exchange key)
pub const PUBLIC_MATERIAL_SIZE: usize = PUBLIC_KEY_SIZE * 2;

/// An Ed25519 verifying key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(PublicKey(arr))
    }

    /// Extract the verifying key from combined public material
    pub fn from_material(material: &[u8]) -> CryptoResult<Self> {
        if material.len() != PUBLIC_MATERIAL_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: PUBLIC_MATERIAL_SIZE,
                actual: material.len(),
            });
        }
        Self::from_bytes(&material[..PUBLIC_KEY_SIZE])
    }

    /// Convert to hex string for display
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature against this public key
    pub fn verify(&self, message: &[u8], signature: &SignatureBytes) -> CryptoResult<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = Signature::from_bytes(&signature.0);

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}...)", &self.to_hex()[..16])
    }
}

/// A detached Ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SignatureBytes(pub [u8; SIGNATURE_SIZE]);

impl SignatureBytes {
    /// Create from raw bytes; any length other than 64 is malformed
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignatureLength {
                expected: SIGNATURE_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SIGNATURE_SIZE];
        arr.copy_from_slice(bytes);
        Ok(SignatureBytes(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SignatureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", &hex::encode(self.0)[..16])
    }
}

/// A signing keypair
///
/// The secret key is automatically zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct Identity {
    #[zeroize(skip)]
    public_key: PublicKey,
    secret_key: [u8; SECRET_KEY_SIZE],
}

impl Identity {
    /// Generate a new random identity
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(&signing_key)
    }

    /// Create from a seed (deterministic generation)
    pub fn from_seed(seed: &[u8; SECRET_KEY_SIZE]) -> Self {
        Self::from_signing_key(&SigningKey::from_bytes(seed))
    }

    /// Create from a key record's opaque `key_data`
    pub fn from_key_data(key_data: &[u8]) -> CryptoResult<Self> {
        let seed: [u8; SECRET_KEY_SIZE] = key_data
            .try_into()
            .map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    fn from_signing_key(signing_key: &SigningKey) -> Self {
        Identity {
            public_key: PublicKey(signing_key.verifying_key().to_bytes()),
            secret_key: signing_key.to_bytes(),
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Exchange key paired with this identity
    pub fn exchange_public_key(&self) -> ExchangePublicKey {
        KeyExchange::identity_to_exchange(&self.secret_key)
    }

    /// Verifying key followed by exchange key
    pub fn public_material(&self) -> Vec<u8> {
        let mut material = Vec::with_capacity(PUBLIC_MATERIAL_SIZE);
        material.extend_from_slice(&self.public_key.0);
        material.extend_from_slice(self.exchange_public_key().as_bytes());
        material
    }

    /// Get the secret key bytes
    ///
    /// # Security Warning
    /// Handle with extreme care! The secret key should never be logged.
    pub fn secret_key_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.secret_key
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        let signing_key = SigningKey::from_bytes(&self.secret_key);
        SignatureBytes(signing_key.sign(message).to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_generation() {
        let id1 = Identity::generate();
        let id2 = Identity::generate();
        assert_ne!(id1.public_key().0, id2.public_key().0);
    }

    #[test]
    fn test_key_data_matches_seed() {
        let seed = [42u8; 32];
        let id1 = Identity::from_seed(&seed);
        let id2 = Identity::from_key_data(&seed).unwrap();
        assert_eq!(id1.public_key(), id2.public_key());

        assert_eq!(
            Identity::from_key_data(&[1u8; 31]).err(),
            Some(CryptoError::InvalidSecretKey)
        );
    }

    #[test]
    fn test_sign_verify() {
        let id = Identity::generate();
        let message = b"device-reading-42";

        let signature = id.sign(message);
        assert!(id.public_key().verify(message, &signature).is_ok());
        assert!(id.public_key().verify(b"other", &signature).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let id1 = Identity::generate();
        let id2 = Identity::generate();

        let signature = id1.sign(b"message");
        assert!(id2.public_key().verify(b"message", &signature).is_err());
    }

    #[test]
    fn test_public_material_layout() {
        let id = Identity::generate();
        let material = id.public_material();

        assert_eq!(material.len(), PUBLIC_MATERIAL_SIZE);
        assert_eq!(PublicKey::from_material(&material).unwrap(), *id.public_key());
        assert_eq!(&material[PUBLIC_KEY_SIZE..], id.exchange_public_key().as_bytes());
    }

    #[test]
    fn test_signature_length_checked() {
        assert_eq!(
            SignatureBytes::from_bytes(&[0u8; 10]).err(),
            Some(CryptoError::InvalidSignatureLength {
                expected: SIGNATURE_SIZE,
                actual: 10
            })
        );
    }
}
