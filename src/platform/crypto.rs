//! Crypto facet contract

use async_trait::async_trait;

use crate::error::TrustResult;
use crate::key::{KeyData, KeyModel};

/// Freshly generated key material
#[derive(Debug)]
pub struct KeyMaterial {
    /// Private half, stored as the record's `key_data`
    pub key_data: KeyData,
    /// Public half, stored as the record's `public_key`
    pub public_key: Option<Vec<u8>>,
}

/// Cryptographic primitives the trust-flow core delegates to
///
/// Implementations decide the algorithm and the layout of `key_data` /
/// `public_key`; the core never looks inside them.
#[async_trait]
pub trait Crypto: Send + Sync {
    /// Algorithm name recorded in protected headers (`alg`)
    fn algorithm(&self) -> &str;

    /// Produce new key material
    async fn generate_key(&self) -> TrustResult<KeyMaterial>;

    /// Sign `payload`; keys that cannot sign must be refused
    async fn sign(&self, key: &KeyModel, payload: &[u8]) -> TrustResult<Vec<u8>>;

    /// Check a signature
    ///
    /// A signature that simply does not match is `Ok(false)`. Errors are
    /// reserved for inputs the facet cannot interpret at all.
    async fn verify(&self, key: &KeyModel, payload: &[u8], signature: &[u8]) -> TrustResult<bool>;

    /// Encrypt towards the holder of `key`
    async fn encrypt(&self, key: &KeyModel, plaintext: &[u8]) -> TrustResult<Vec<u8>>;

    /// Decrypt with the private half of `key`
    async fn decrypt(&self, key: &KeyModel, ciphertext: &[u8]) -> TrustResult<Vec<u8>>;
}
