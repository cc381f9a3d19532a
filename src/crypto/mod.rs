//! Default cryptographic facet
//!
//! - `identity`: Ed25519 signatures over envelope layers
//! - `exchange`: X25519 sealed payloads for encrypt/decrypt steps
//! - `cipher`: ChaCha20-Poly1305 AEAD encryption
//! - `hash`: BLAKE3 hashing and key derivation
//!
//! [`Ed25519Crypto`] ties these together behind the [`Crypto`] facet trait.

pub mod cipher;
pub mod error;
pub mod exchange;
pub mod hash;
pub mod identity;

use async_trait::async_trait;
use tracing::debug;

pub use cipher::Cipher;
pub use error::{CryptoError, CryptoResult};
pub use exchange::{EphemeralKeypair, ExchangePublicKey, KeyExchange, SharedSecret};
pub use hash::Hash;
pub use identity::{Identity, PublicKey, SignatureBytes};

use crate::error::TrustResult;
use crate::key::{KeyData, KeyModel};
use crate::platform::{Crypto, KeyMaterial};

/// Algorithm name written into protected headers
pub const ED25519_ALG: &str = "EdDSA";

/// Ed25519 signing plus X25519/ChaCha20-Poly1305 sealing
#[derive(Clone, Debug, Default)]
pub struct Ed25519Crypto;

impl Ed25519Crypto {
    /// Create the facet
    pub fn new() -> Self {
        Ed25519Crypto
    }

    fn identity(key: &KeyModel) -> CryptoResult<Identity> {
        if key.key_data.is_empty() {
            return Err(CryptoError::MissingKeyMaterial(key.key_id.clone()));
        }
        Identity::from_key_data(key.key_data.as_bytes())
    }

    fn verifying_key(key: &KeyModel) -> CryptoResult<PublicKey> {
        match &key.public_key {
            Some(material) => PublicKey::from_material(material),
            None => Ok(*Self::identity(key)?.public_key()),
        }
    }

    fn exchange_key(key: &KeyModel) -> CryptoResult<ExchangePublicKey> {
        match &key.public_key {
            Some(material) => {
                let verifying = PublicKey::from_material(material)?;
                ExchangePublicKey::from_bytes(&material[verifying.0.len()..])
            }
            None => Ok(Self::identity(key)?.exchange_public_key()),
        }
    }
}

#[async_trait]
impl Crypto for Ed25519Crypto {
    fn algorithm(&self) -> &str {
        ED25519_ALG
    }

    async fn generate_key(&self) -> TrustResult<KeyMaterial> {
        let identity = Identity::generate();
        let public = identity.public_material();
        debug!("Generated Ed25519 key {}", Hash::fingerprint(&public));

        Ok(KeyMaterial {
            key_data: KeyData::new(identity.secret_key_bytes().to_vec()),
            public_key: Some(public),
        })
    }

    async fn sign(&self, key: &KeyModel, payload: &[u8]) -> TrustResult<Vec<u8>> {
        if !key.can_sign() {
            return Err(CryptoError::SigningNotPermitted(key.key_id.clone()).into());
        }
        let identity = Self::identity(key)?;
        Ok(identity.sign(payload).as_bytes().to_vec())
    }

    async fn verify(&self, key: &KeyModel, payload: &[u8], signature: &[u8]) -> TrustResult<bool> {
        let public_key = Self::verifying_key(key)?;
        let signature = SignatureBytes::from_bytes(signature)?;

        match public_key.verify(payload, &signature) {
            Ok(()) => Ok(true),
            Err(CryptoError::SignatureVerificationFailed) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn encrypt(&self, key: &KeyModel, plaintext: &[u8]) -> TrustResult<Vec<u8>> {
        let recipient = Self::exchange_key(key)?;
        Ok(KeyExchange::seal(&recipient, plaintext)?)
    }

    async fn decrypt(&self, key: &KeyModel, ciphertext: &[u8]) -> TrustResult<Vec<u8>> {
        let identity = Self::identity(key)?;
        Ok(KeyExchange::open(identity.secret_key_bytes(), ciphertext)?)
    }
}
